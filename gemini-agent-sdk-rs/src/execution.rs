use chrono::{DateTime, Local};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::agent::AgentError;

/// Per-call parameters passed alongside a query.
pub type QueryParams = BTreeMap<String, Value>;

/// Scope a query executes in.
///
/// * `AgentLevel` - agent-specific context and conversation memory.
/// * `RunLevel` - a single isolated execution with its own parameters.
/// * `GlobalLevel` - system-wide context and state shared by every agent.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionLevel {
    AgentLevel,
    RunLevel,
    GlobalLevel,
}

impl ExecutionLevel {
    pub fn value(&self) -> &'static str {
        self.into()
    }
}

/// Calling convention used to execute a query.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionMethod {
    /// Awaited on the caller's task.
    Run,
    /// Executed by blocking a thread.
    RunSync,
    /// Chunks are yielded as the model produces them.
    Streaming,
}

impl ExecutionMethod {
    pub fn value(&self) -> &'static str {
        self.into()
    }
}

/// Every level × method pair, level-major.
pub fn combinations() -> impl Iterator<Item = (ExecutionLevel, ExecutionMethod)> {
    ExecutionLevel::iter()
        .flat_map(|level| ExecutionMethod::iter().map(move |method| (level, method)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub content: String,
    pub agent: String,
    pub model: String,
    pub level: ExecutionLevel,
    pub method: ExecutionMethod,
    pub run_id: Uuid,
    pub started_at: DateTime<Local>,
    pub elapsed_ms: u64,
    pub chunks: usize,
}

/// Items yielded by a streaming query.
#[derive(Debug, Clone)]
pub enum StreamItem {
    Chunk(String),
    /// Final item, emitted once the model finished and state was recorded.
    Done(AgentResponse),
}

pub type ResponseStream = BoxStream<'static, Result<StreamItem, AgentError>>;

/// Result of [`crate::agent::GeminiAgent::execute_query`].
pub enum QueryOutput {
    Complete(AgentResponse),
    Stream(ResponseStream),
}

impl QueryOutput {
    pub fn is_stream(&self) -> bool {
        matches!(self, QueryOutput::Stream(_))
    }

    /// Waits for the full response, draining the stream if there is one.
    pub async fn into_response(self) -> Result<AgentResponse, AgentError> {
        match self {
            QueryOutput::Complete(response) => Ok(response),
            QueryOutput::Stream(mut stream) => {
                let mut done = None;
                while let Some(item) = stream.next().await {
                    if let StreamItem::Done(response) = item? {
                        done = Some(response);
                    }
                }
                done.ok_or(AgentError::StreamIncomplete)
            }
        }
    }
}

impl fmt::Debug for QueryOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutput::Complete(response) => f.debug_tuple("Complete").field(response).finish(),
            QueryOutput::Stream(_) => f.debug_tuple("Stream").finish_non_exhaustive(),
        }
    }
}
