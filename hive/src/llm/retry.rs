//! Retry policy for transient provider failures.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use super::{CompletionRequest, CompletionResponse, LlmError, Provider};

/// Exponential backoff applied to [`LlmError::retryable`] failures.
///
/// Defaults match the transport contract: initial delay 0.5 s, factor 2,
/// 3 attempts total, jitter fraction 0.5. The jitter is derived from a hash
/// of the attempt counter so backoff timing is reproducible in tests.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub factor: f64,
    pub max_attempts: u32,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            factor: 2.0,
            max_attempts: 3,
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before the given retry (1-based: the delay after attempt
    /// `attempt` failed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial.as_secs_f64() * self.factor.powi(attempt.saturating_sub(1) as i32);
        let mut hasher = DefaultHasher::new();
        attempt.hash(&mut hasher);
        let fraction = (hasher.finish() % 1000) as f64 / 1000.0;
        Duration::from_secs_f64(base * (1.0 + self.jitter * fraction))
    }
}

/// Calls `provider.complete`, retrying retryable failures per `policy`.
/// Non-retryable errors and exhaustion surface the last error unchanged.
pub async fn complete_with_retry(
    provider: &dyn Provider,
    request: CompletionRequest,
    policy: &RetryPolicy,
) -> Result<CompletionResponse, LlmError> {
    let mut attempt = 1;
    loop {
        match provider.complete(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(err) if err.retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(attempt, ?delay, error = %err, "retrying provider call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
