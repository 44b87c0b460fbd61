//! Bounded retry with exponential backoff for transient provider failures.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::Result;

/// How often and how patiently to retry a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one. Zero means a single attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles after each attempt.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub const NONE: Self = Self {
        max_retries: 0,
        initial_backoff: Duration::ZERO,
    };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::NONE
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }
}

/// Run `f` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. The last error is returned.
pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, label: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = policy.initial_backoff;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(
                    call = label,
                    attempt,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "call failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
