pub mod agent;
pub mod config;
pub mod context;
pub mod events;
pub mod execution;
pub mod llm;
pub mod logger;
pub mod prompts;

pub use agent::{AgentError, GeminiAgent};
pub use config::AgentConfig;
pub use execution::{
    AgentResponse, ExecutionLevel, ExecutionMethod, QueryOutput, QueryParams, StreamItem,
};
