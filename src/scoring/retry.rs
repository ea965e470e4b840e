//! Exponential backoff around rate-limited completion requests.

use std::time::Duration;

use tracing::warn;

use super::client::{CompletionClient, LlmError};
use crate::config::LlmConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total requests per run, the first one included.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &LlmConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay_ms: cfg.backoff_base_ms,
        }
    }

    /// Wait after the rate-limited request numbered `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff_delay(attempt, self.base_delay_ms)
    }
}

/// `2^attempt * base_ms`, saturating.
pub fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Reported around each backoff sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// About to sleep for `delay` after rate-limited request `attempt` (0-based).
    Waiting { attempt: u32, delay: Duration },
    /// The sleep is over; the next request goes out immediately.
    Resumed { attempt: u32 },
}

/// Sends `prompt`, retrying only on [`LlmError::RateLimited`].
///
/// At most `policy.max_attempts` requests are issued.
pub async fn complete_with_backoff<F>(
    client: &dyn CompletionClient,
    prompt: &str,
    policy: RetryPolicy,
    mut on_backoff: F,
) -> Result<String, LlmError>
where
    F: FnMut(Backoff),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match client.complete(prompt).await {
            Err(LlmError::RateLimited) => {
                if attempt + 1 >= max_attempts {
                    warn!(attempts = attempt + 1, "rate limit retries exhausted");
                    return Err(LlmError::RateLimited);
                }
                let wait = policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    wait_ms = wait.as_millis() as u64,
                    "completion rate limited, backing off"
                );
                on_backoff(Backoff::Waiting {
                    attempt,
                    delay: wait,
                });
                tokio::time::sleep(wait).await;
                on_backoff(Backoff::Resumed { attempt });
                attempt += 1;
            }
            other => return other,
        }
    }
}
