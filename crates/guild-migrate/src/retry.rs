//! Backoff policy wrapped around every platform call.
//!
//! A retryable failure (rate limit, timeout, 5xx) is retried with an
//! exponentially growing delay until `max_attempts` calls have been made.
//! When the platform names its own wait (`retry_after`), that wait is used
//! as-is instead of the computed delay.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{AdapterError, AdapterResult};

/// Retry and backoff settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls allowed, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failure; doubled for each further failure.
    pub base_delay: Duration,
    /// Upper bound for the computed delay. Does not cap `retry_after`.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Computed delay after the `attempt`-th failed call (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before the next call, honouring an explicit platform wait.
    pub fn delay_for(&self, attempt: u32, err: &AdapterError) -> Duration {
        err.retry_after.unwrap_or_else(|| self.backoff(attempt))
    }

    /// Run `op` until it succeeds, fails non-retryably, or the attempt budget
    /// is spent. `what` labels log lines.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> AdapterResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AdapterResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt, &e);
                    warn!(
                        "{}: {} (attempt {}/{}), retrying in {:?}",
                        what, e, attempt, max_attempts, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(mut e) if e.is_retryable() => {
                    e.message = format!("{} (gave up after {} attempts)", e.message, attempt);
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
