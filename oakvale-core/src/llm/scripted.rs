//! Deterministic provider used for offline play and tests

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{LLMProvider, LLMRequest, LLMResponse, ModelInfo, QueryError};

/// One scripted outcome
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Reply(String),
    Fail(QueryError),
}

/// Replays a fixed script, cycling when it runs out
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    steps: Arc<Vec<ScriptStep>>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: Arc::new(steps),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script made only of replies
    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            replies
                .into_iter()
                .map(|r| ScriptStep::Reply(r.into()))
                .collect(),
        )
    }

    /// Harmless village routine for playing without a model
    pub fn offline() -> Self {
        Self::replies([
            "ACTION: wait\nTARGET: and watches the road\nTHOUGHTS: Another quiet day.\nEMOTION: calm",
            "ACTION: move\nTARGET: toward the Player\nTHOUGHTS: Who is that stranger?\nEMOTION: curious",
            "ACTION: talk\nTARGET: Player\nDIALOG: Well met, traveler. Oakvale welcomes you.\nEMOTION: friendly",
            "ACTION: wait\nTARGET: and hums a tune\nEMOTION: content",
        ])
    }

    /// Sleep before every step
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `generate` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared call counter, usable after the provider is moved
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(&self, _request: &LLMRequest) -> Result<LLMResponse, QueryError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.steps.is_empty() {
            return Err(QueryError::MalformedOutput("empty script".to_string()));
        }
        match &self.steps[index % self.steps.len()] {
            ScriptStep::Reply(content) => Ok(LLMResponse {
                content: content.clone(),
                usage: None,
            }),
            ScriptStep::Fail(err) => Err(err.clone()),
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "scripted".to_string(),
            model_name: format!("{} steps", self.steps.len()),
        }
    }
}
