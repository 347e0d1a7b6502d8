use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::LlmError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid agent configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Could not start a runtime for run_sync: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("run_sync worker did not finish: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Stream ended before the response was complete")]
    StreamIncomplete,
}
