//! Rate-limit aware retry around a single remote call.
//!
//! [`call_with_retry`] retries only when the failure looks like throttling
//! (see [`is_rate_limited`]), sleeping `backoff_base * attempt` between tries.
//! Every other error is returned on the spot. Running out of attempts yields
//! [`Error::RetriesExhausted`], which is never itself classified as a rate
//! limit.

use std::future::Future;
use std::time::Duration;

use crate::core::progress::{Progress, ProgressEvent};
use crate::error::{Error, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(20);

const RATE_LIMIT_MARKERS: &[&str] = &["quota", "resource_exhausted", "rate limit", "rate_limit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Wait applied after the `attempt`-th (1-based) throttled try.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BACKOFF_BASE)
    }
}

/// Returns `true` when `err` signals quota or rate-limit exhaustion.
pub fn is_rate_limited(err: &Error) -> bool {
    match err {
        Error::RateLimited(_) => true,
        Error::Api { status: 429, .. } => true,
        Error::Api { message, .. } => mentions_rate_limit(message),
        Error::RetriesExhausted { .. } => false,
        other => {
            let description = other.to_string();
            description.contains("429") || mentions_rate_limit(&description)
        }
    }
}

fn mentions_rate_limit(text: &str) -> bool {
    let text = text.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| text.contains(marker))
}

pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    progress: &Progress,
    label: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_rate_limited(&err) => return Err(err),
            Err(err) => {
                if attempt >= max_attempts {
                    tracing::error!(
                        label,
                        attempts = attempt,
                        error = %err,
                        "giving up after repeated rate limiting"
                    );
                    return Err(Error::RetriesExhausted {
                        attempts: attempt,
                        last_error: err.to_string(),
                    });
                }

                let wait = policy.backoff_for(attempt);
                tracing::warn!(
                    label,
                    attempt,
                    max_attempts,
                    wait_secs = wait.as_secs(),
                    error = %err,
                    "rate limited; retrying after back-off"
                );
                progress.emit(ProgressEvent::RetryScheduled {
                    label: label.to_string(),
                    attempt,
                    max_attempts,
                    wait,
                });

                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}
