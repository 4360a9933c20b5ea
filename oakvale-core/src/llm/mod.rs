//! LLM boundary: provider trait, request/response types and the decision client

mod client;
pub mod factory;
pub mod ollama;
pub mod retry;
pub mod scripted;

pub use client::DecisionClient;
pub use factory::LLMProviderFactory;
pub use ollama::OllamaProvider;
pub use retry::{RetryPolicy, with_retry};
pub use scripted::ScriptedProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Failures at the LLM boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum QueryError {
    /// No reply within the request bound
    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),

    /// Reply did not fit the decision schema
    #[error("Malformed LLM output: {0}")]
    MalformedOutput(String),

    /// Service unreachable or returned a server error
    #[error("LLM service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl QueryError {
    /// Only transport-level failures are worth a retry
    pub fn is_transient(&self) -> bool {
        matches!(self, QueryError::ServiceUnavailable(_))
    }
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Request to an LLM provider
#[derive(Debug, Clone, PartialEq)]
pub struct LLMRequest {
    /// Messages in the conversation
    pub messages: Vec<Message>,

    /// Temperature for generation (0.0-2.0)
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<usize>,
}

impl LLMRequest {
    /// Create a request with system prompt
    pub fn with_system_prompt(
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            messages: vec![
                Message {
                    role: MessageRole::System,
                    content: system_prompt.into(),
                },
                Message {
                    role: MessageRole::User,
                    content: user_prompt.into(),
                },
            ],
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Content of the last user message
    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// Generated content
    pub content: String,

    /// Token usage information
    pub usage: Option<TokenUsage>,
}

/// Token usage information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Model information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// Trait for LLM provider implementations.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion for a chat request
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse, QueryError>;

    /// Check that the service is reachable and the model is available
    async fn health_check(&self) -> Result<(), QueryError> {
        Ok(())
    }

    /// Get model information
    fn model_info(&self) -> ModelInfo;
}
