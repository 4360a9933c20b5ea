//! Decision client: one bounded, validated model query per decision cycle

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::retry::{RetryPolicy, with_retry};
use super::{LLMProvider, ModelInfo, QueryError};
use crate::config::LLMProviderConfig;
use crate::decision::{DecisionResponse, parse_decision};
use crate::request::DecisionRequest;

/// Stateless adapter between decision requests and an [`LLMProvider`]
#[derive(Clone)]
pub struct DecisionClient {
    provider: Arc<dyn LLMProvider>,
    request_timeout: Duration,
    retry: RetryPolicy,
    temperature: f32,
    max_tokens: usize,
}

impl DecisionClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &LLMProviderConfig) -> Self {
        Self {
            provider,
            request_timeout: config.request_timeout,
            retry: RetryPolicy::default().with_delay(config.retry_delay),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Query the model and parse its reply.
    ///
    /// Each attempt is bounded by the request timeout. Only
    /// `ServiceUnavailable` is retried; parsing failures are never retried.
    pub async fn query(&self, request: &DecisionRequest) -> Result<DecisionResponse, QueryError> {
        let content = self.generate(request).await?;

        let parsed = parse_decision(&content).inspect_err(|e| {
            let preview: String = content.chars().take(100).collect();
            warn!("{} for {}: {}...", e, request.character(), preview);
        })?;

        Ok(DecisionResponse::from_parsed(
            request.character().clone(),
            request.turn(),
            parsed,
        ))
    }

    /// Ask for a free-form spoken line. Surrounding quotes are removed.
    /// A reply in the decision format contributes its DIALOG field only;
    /// blank replies and decisions without dialog are malformed.
    pub async fn reply(&self, request: &DecisionRequest) -> Result<String, QueryError> {
        let content = self.generate(request).await?;
        let content = match parse_decision(&content) {
            Ok(parsed) => parsed.dialog.unwrap_or_default(),
            Err(_) => content,
        };
        let line = content.trim();
        let line = line
            .strip_prefix('"')
            .and_then(|l| l.strip_suffix('"'))
            .unwrap_or(line)
            .trim();
        if line.is_empty() {
            return Err(QueryError::MalformedOutput(format!(
                "empty reply from {}",
                request.character()
            )));
        }
        Ok(line.to_string())
    }

    async fn generate(&self, request: &DecisionRequest) -> Result<String, QueryError> {
        let llm_request = request.to_llm_request(self.temperature, self.max_tokens);
        let provider = &self.provider;
        let llm_request = &llm_request;
        let bound = self.request_timeout;

        let response = with_retry(&self.retry, || async move {
            tokio::time::timeout(bound, provider.generate(llm_request))
                .await
                .map_err(|_| QueryError::Timeout(bound))?
        })
        .await?;

        match response.usage {
            Some(usage) => debug!(
                "Model reply for {} ({} chars, {} prompt + {} completion tokens)",
                request.character(),
                response.content.len(),
                usage.prompt_tokens,
                usage.completion_tokens
            ),
            None => debug!(
                "Model reply for {} ({} chars)",
                request.character(),
                response.content.len()
            ),
        }
        Ok(response.content)
    }

    pub async fn health_check(&self) -> Result<(), QueryError> {
        self.provider.health_check().await
    }

    pub fn model_info(&self) -> ModelInfo {
        self.provider.model_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{Character, CharacterClass, CharacterRace};
    use crate::config::{OakvaleConfig, PerceptionConfig};
    use crate::decision::Decision;
    use crate::llm::scripted::{ScriptStep, ScriptedProvider};
    use crate::perception::PerceptionBuilder;
    use crate::request::DecisionRequestBuilder;
    use crate::world::{Position, World, WorldMap};

    fn request() -> DecisionRequest {
        let mut world = World::new(WorldMap::new(5, 5), &OakvaleConfig::default());
        world
            .add_character(
                Character::new("npc", "Bran", CharacterClass::Guard, CharacterRace::Human, 1)
                    .with_position(Position::new(2, 2)),
            )
            .unwrap();
        let snapshot = PerceptionBuilder::new(PerceptionConfig::default())
            .build(&world, &"npc".into(), Vec::new())
            .unwrap();
        DecisionRequestBuilder::new(6000).build(&snapshot)
    }

    fn client(provider: ScriptedProvider) -> DecisionClient {
        DecisionClient::new(Arc::new(provider), &LLMProviderConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_parses_reply() {
        let client = client(ScriptedProvider::replies(["ACTION: attack\nTARGET: Player"]));
        let response = client.query(&request()).await.unwrap();
        assert_eq!(response.character.as_str(), "npc");
        assert_eq!(
            response.decision,
            Decision::Attack {
                target: "Player".to_string()
            }
        );
        assert!(!response.is_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_retried_exactly_once() {
        let provider = ScriptedProvider::new(vec![ScriptStep::Fail(
            QueryError::ServiceUnavailable("connection refused".into()),
        )]);
        let calls = provider.call_counter();
        let err = client(provider).query(&request()).await.unwrap_err();
        assert!(matches!(err, QueryError::ServiceUnavailable(_)));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_never_retried() {
        let provider = ScriptedProvider::replies(["I refuse to follow the format."]);
        let calls = provider.call_counter();
        let err = client(provider).query(&request()).await.unwrap_err();
        assert!(matches!(err, QueryError::MalformedOutput(_)));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let provider = ScriptedProvider::replies(["ACTION: wait"]).with_delay(Duration::from_secs(60));
        let calls = provider.call_counter();
        let client = client(provider).with_request_timeout(Duration::from_secs(1));
        let err = client.query(&request()).await.unwrap_err();
        assert_eq!(err, QueryError::Timeout(Duration::from_secs(1)));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_strips_quotes() {
        let client = client(ScriptedProvider::replies([
            "  \"Aye, goblins by the mill.\"\n",
            "ACTION: talk\nTARGET: Player\nDIALOG: Mind the road.",
            "   ",
            "ACTION: wait\nTARGET: quietly",
        ]));
        let line = client.reply(&request()).await.unwrap();
        assert_eq!(line, "Aye, goblins by the mill.");
        assert_eq!(client.reply(&request()).await.unwrap(), "Mind the road.");

        for _ in 0..2 {
            let err = client.reply(&request()).await.unwrap_err();
            assert!(matches!(err, QueryError::MalformedOutput(_)));
        }
    }
}
