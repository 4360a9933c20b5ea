//! Ollama LLM provider implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LLMProvider, LLMRequest, LLMResponse, MessageRole, ModelInfo, QueryError, TokenUsage};

/// Ollama LLM provider (local, runs on your machine).
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    base_url: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider.
    ///
    /// # Arguments
    ///
    /// * `model` - Model name (e.g., "llama3")
    /// * `base_url` - Base URL for Ollama API (e.g., "http://localhost:11434")
    pub fn new(model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn transport_error(&self, err: reqwest::Error) -> QueryError {
        QueryError::ServiceUnavailable(format!(
            "Failed to reach Ollama at {}: {}. Make sure Ollama is running.",
            self.base_url, err
        ))
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessageResponse,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
    #[serde(default)]
    eval_count: Option<usize>,
}

impl OllamaResponse {
    fn usage(&self) -> Option<TokenUsage> {
        match (self.prompt_eval_count, self.eval_count) {
            (Some(prompt_tokens), Some(completion_tokens)) => Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    content: String,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

/// `llama3` matches `llama3` and `llama3:latest`
fn model_matches(available: &str, wanted: &str) -> bool {
    available == wanted
        || available
            .strip_prefix(wanted)
            .is_some_and(|rest| rest.starts_with(':'))
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse, QueryError> {
        let ollama_messages: Vec<OllamaMessage> = request
            .messages
            .iter()
            .map(|m| OllamaMessage {
                role: match m.role {
                    MessageRole::System => "system".to_string(),
                    MessageRole::User => "user".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();

        let options = OllamaOptions {
            temperature: request.temperature,
            num_predict: request.max_tokens,
        };

        let ollama_request = OllamaRequest {
            model: self.model.clone(),
            messages: ollama_messages,
            stream: false,
            options: Some(options),
        };

        let url = format!("{}/api/chat", self.base_url);
        debug!("Sending chat request to {} (model {})", url, self.model);

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(QueryError::ServiceUnavailable(format!(
                "Ollama API error ({}): {}",
                status, text
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        let ollama_response: OllamaResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                QueryError::MalformedOutput(format!("Failed to parse Ollama response: {}", e))
            })?;

        let mut content = ollama_response.message.content.trim().to_string();
        if content.is_empty() {
            if let Some(thinking) = &ollama_response.message.thinking {
                content = thinking.trim().to_string();
            }
        }

        let usage = ollama_response.usage();
        Ok(LLMResponse { content, usage })
    }

    async fn health_check(&self) -> Result<(), QueryError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(QueryError::ServiceUnavailable(format!(
                "Ollama API error ({})",
                response.status()
            )));
        }

        let tags: OllamaTags = response
            .json()
            .await
            .map_err(|e| QueryError::ServiceUnavailable(format!("Unreadable model list: {}", e)))?;

        if tags.models.iter().any(|m| model_matches(&m.name, &self.model)) {
            Ok(())
        } else {
            Err(QueryError::ServiceUnavailable(format!(
                "Model '{}' is not available in Ollama (try `ollama pull {}`)",
                self.model, self.model
            )))
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "ollama".to_string(),
            model_name: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_provider_creation() {
        let provider = OllamaProvider::new("llama3", "http://localhost:11434/");
        assert_eq!(provider.model(), "llama3");
        assert_eq!(provider.base_url, "http://localhost:11434");
        assert_eq!(provider.model_info().provider, "ollama");
    }

    #[test]
    fn test_model_matching() {
        assert!(model_matches("llama3", "llama3"));
        assert!(model_matches("llama3:latest", "llama3"));
        assert!(!model_matches("llama3.1:8b", "llama3"));
        assert!(!model_matches("mistral", "llama3"));
    }

    #[test]
    fn test_usage_from_eval_counts() {
        let body = r#"{"message": {"content": "ACTION: wait"}, "prompt_eval_count": 412, "eval_count": 38}"#;
        let response: OllamaResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            response.usage(),
            Some(TokenUsage {
                prompt_tokens: 412,
                completion_tokens: 38,
                total_tokens: 450,
            })
        );

        let response: OllamaResponse =
            serde_json::from_str(r#"{"message": {"content": "ACTION: wait"}}"#).unwrap();
        assert_eq!(response.usage(), None);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        // Port 9 (discard) is not an HTTP server
        let provider = OllamaProvider::new("llama3", "http://127.0.0.1:9");
        let err = provider.health_check().await.unwrap_err();
        assert!(err.is_transient());
    }
}
