use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

use crate::prompts::DEFAULT_SYSTEM_INSTRUCTION;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_MAX_HISTORY_MESSAGES: usize = 20;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Agent name must not be empty")]
    EmptyName,
    #[error("Model name must not be empty")]
    EmptyModel,
    #[error("Temperature {0} is outside 0.0..=2.0")]
    TemperatureOutOfRange(f64),
    #[error("Invalid value for {key}: '{value}'")]
    InvalidEnv { key: String, value: String },
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,
    /// Print responses and streamed chunks to stdout as they arrive.
    #[serde(default = "default_echo_output")]
    pub echo_output: bool,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_system_instruction() -> String {
    DEFAULT_SYSTEM_INSTRUCTION.to_string()
}

fn default_max_history_messages() -> usize {
    DEFAULT_MAX_HISTORY_MESSAGES
}

fn default_echo_output() -> bool {
    true
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: default_model(),
            system_instruction: default_system_instruction(),
            api_key: None,
            temperature: None,
            max_history_messages: default_max_history_messages(),
            echo_output: default_echo_output(),
        }
    }

    /// Builds a config from `GEMINI_MODEL`, `GEMINI_API_KEY` and `GEMINI_TEMPERATURE`.
    pub fn from_env(name: impl Into<String>) -> Result<Self, ConfigError> {
        Self::from_lookup(name, |key| env::var(key).ok())
    }

    pub fn from_lookup<F>(name: impl Into<String>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(name);

        if let Some(model) = lookup("GEMINI_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        config.api_key = lookup("GEMINI_API_KEY").filter(|k| !k.is_empty());

        if let Some(raw) = lookup("GEMINI_TEMPERATURE") {
            let temperature = raw.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnv {
                key: "GEMINI_TEMPERATURE".to_string(),
                value: raw.clone(),
            })?;
            config.temperature = Some(temperature);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_history_messages(mut self, max: usize) -> Self {
        self.max_history_messages = max;
        self
    }

    pub fn with_echo_output(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::TemperatureOutOfRange(t));
            }
        }
        Ok(())
    }
}
