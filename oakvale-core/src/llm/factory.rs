//! Factory for creating LLM providers from configuration

use std::sync::Arc;
use tracing::info;

use crate::config::{LLMProviderConfig, LLMProviderKind};
use crate::llm::{LLMProvider, OllamaProvider, ScriptedProvider};

/// Factory for creating LLM providers
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration
    pub fn create(config: &LLMProviderConfig) -> Arc<dyn LLMProvider> {
        match config.provider {
            LLMProviderKind::Ollama => {
                info!(
                    "Using Ollama provider (model: {}, url: {})",
                    config.model, config.base_url
                );
                Arc::new(OllamaProvider::new(
                    config.model.clone(),
                    config.base_url.clone(),
                ))
            }
            LLMProviderKind::Scripted => {
                info!("Using scripted offline provider");
                Arc::new(ScriptedProvider::offline())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_selects_provider() {
        let mut config = LLMProviderConfig::default();
        assert_eq!(LLMProviderFactory::create(&config).model_info().provider, "ollama");

        config.provider = LLMProviderKind::Scripted;
        assert_eq!(LLMProviderFactory::create(&config).model_info().provider, "scripted");
    }
}
