//! Retry policy for LLM calls
//!
//! Only `ServiceUnavailable` is retried. Timeouts and malformed output are
//! surfaced immediately so a slow or confused model never delays a turn
//! twice.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::QueryError;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Pause before each retry
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Builder: set retry count
    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    /// Builder: set delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Whether a failure on the given (0-indexed) attempt should be retried
    pub fn should_retry(&self, error: &QueryError, attempt: usize) -> bool {
        error.is_transient() && attempt < self.max_retries
    }
}

/// Execute an async operation, retrying transient failures per the policy
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T, QueryError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, QueryError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if policy.should_retry(&e, attempt) => {
                warn!("{} (retrying in {:?})", e, policy.delay);
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(RetryPolicy::no_retry().max_retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_retried_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::default();

        let counter = Arc::clone(&calls);
        let result: Result<(), _> = with_retry(&policy, || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(QueryError::ServiceUnavailable("down".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(QueryError::ServiceUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventual_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result = with_retry(&RetryPolicy::default(), || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(QueryError::ServiceUnavailable("blip".into()))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_malformed_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), _> = with_retry(&RetryPolicy::default(), || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(QueryError::MalformedOutput("garbage".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
