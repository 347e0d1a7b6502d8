use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use genai::Client;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent};
use serde::Deserialize;
use std::env;
use thiserror::Error;

pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Model request failed: {0}")]
    Provider(#[from] genai::Error),
    #[error("Model returned an empty response")]
    EmptyResponse,
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<PromptMessage> for ChatMessage {
    fn from(message: PromptMessage) -> Self {
        match message.role {
            PromptRole::System => ChatMessage::system(message.content),
            PromptRole::User => ChatMessage::user(message.content),
            PromptRole::Assistant => ChatMessage::assistant(message.content),
        }
    }
}

pub type ChunkStream = BoxStream<'static, Result<String, LlmError>>;

/// Model access used by the agent.
///
/// [`LLM`] talks to Gemini through genai; tests substitute scripted backends.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn model(&self) -> &str;

    /// Returns the whole completion once the model is done.
    async fn complete(&self, messages: Vec<PromptMessage>) -> Result<String, LlmError>;

    /// Returns text chunks as the model produces them.
    async fn stream(&self, messages: Vec<PromptMessage>) -> Result<ChunkStream, LlmError>;
}

#[derive(Clone)]
pub struct LLM {
    pub model: String,
    pub client: Client,
    pub api_key: Option<String>,
    pub temperature: Option<f64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct LLMConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f64>,
}

impl LLM {
    pub fn new(config: LLMConfig) -> Self {
        let client = Client::default();
        Self {
            model: config.model,
            client,
            api_key: config.api_key,
            temperature: config.temperature,
        }
    }

    fn chat_request(&self, messages: Vec<PromptMessage>) -> ChatRequest {
        // genai resolves Gemini credentials from the environment.
        if let Some(key) = &self.api_key {
            if env::var(GEMINI_API_KEY_VAR).is_err() {
                unsafe {
                    env::set_var(GEMINI_API_KEY_VAR, key);
                }
            }
        }

        ChatRequest::new(messages.into_iter().map(ChatMessage::from).collect())
    }

    fn chat_options(&self) -> Option<ChatOptions> {
        self.temperature
            .map(|t| ChatOptions::default().with_temperature(t))
    }
}

#[async_trait]
impl ChatBackend for LLM {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: Vec<PromptMessage>) -> Result<String, LlmError> {
        let chat_req = self.chat_request(messages);
        let options = self.chat_options();

        let output = self
            .client
            .exec_chat(&self.model, chat_req, options.as_ref())
            .await?;

        let text: String = output.content.texts().join("");
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }

    async fn stream(&self, messages: Vec<PromptMessage>) -> Result<ChunkStream, LlmError> {
        let chat_req = self.chat_request(messages);
        let options = self.chat_options();

        let response = self
            .client
            .exec_chat_stream(&self.model, chat_req, options.as_ref())
            .await?;

        // Reasoning and tool-call events are not part of the answer text.
        let chunks = response.stream.filter_map(|event| async move {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) if !chunk.content.is_empty() => {
                    Some(Ok(chunk.content))
                }
                Ok(_) => None,
                Err(e) => Some(Err(LlmError::from(e))),
            }
        });
        Ok(chunks.boxed())
    }
}
