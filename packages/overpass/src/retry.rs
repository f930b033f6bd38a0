//! Bounded retry with exponential backoff for rate-limited requests.
//!
//! The public Overpass instances answer HTTP 429 freely under load. Every
//! query goes through [`retry_rate_limited`], which re-issues the request
//! with doubling delays up to a fixed ceiling. The loop is explicit — a
//! retry storm can never grow the call stack.

use std::future::Future;
use std::time::Duration;

use crate::OverpassError;

/// How rate-limited requests are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
    /// Fixed offset added to every delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given retry ceiling and default delays.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Returns the backoff delay before retry number `attempt` (0-based):
    /// `base_delay * 2^attempt + jitter`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt) + self.jitter
    }
}

/// Runs `op`, retrying on [`OverpassError::RateLimited`] with exponential
/// backoff up to the policy's ceiling.
///
/// Any other outcome — success or a different error — is returned
/// immediately without retrying.
///
/// # Errors
///
/// Returns [`OverpassError::RateLimited`] once the ceiling is exhausted, or
/// whatever non-rate-limit error `op` produced.
pub async fn retry_rate_limited<T, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, OverpassError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OverpassError>>,
{
    let mut attempt = 0u32;

    loop {
        match op().await {
            Err(OverpassError::RateLimited) if attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                log::warn!(
                    "HTTP 429, retrying in {delay:?} (attempt {}/{})",
                    attempt + 1,
                    policy.max_retries
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
