//! Bounded retry with linear backoff for rate-limited requests.
//!
//! Only [`ScraperError::RateLimited`] (HTTP 429) is retried. Everything else,
//! including 404, auth failures, and transport errors, is handed back to the
//! caller unchanged: the caller decides what is terminal and what is fatal.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(10);

/// Retry budget for one logical request.
///
/// With `max_attempts = 5` and `base_delay = 10s`, sustained rate limiting
/// sleeps for
///
/// | Attempt | Sleep after the 429 |
/// |---------|---------------------|
/// | 1       | 10 s                |
/// | 2       | 20 s                |
/// | 3       | 30 s                |
/// | 4       | 40 s                |
/// | 5       | 50 s                |
///
/// for a total of 150 s before [`ScraperError::RateLimitExhausted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Sleep applied after the `attempt`-th consecutive 429 (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Runs `operation` until it returns something other than
    /// [`ScraperError::RateLimited`] or the attempt budget is spent.
    ///
    /// Each rate-limited attempt sleeps `base_delay * attempt` before the next
    /// call, so `operation` must re-issue the identical request.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::RateLimitExhausted`] after `max_attempts` consecutive
    ///   rate-limit responses.
    /// - Any other error from `operation`, returned on first occurrence.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, ScraperError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ScraperError>>,
    {
        // A zero budget still makes one call.
        let max_attempts = self.max_attempts.max(1);
        let mut last_context = String::new();

        for attempt in 1..=max_attempts {
            match operation().await {
                Err(ScraperError::RateLimited { context }) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        context = %context,
                        "rate limited; backing off before retrying the same request"
                    );
                    tokio::time::sleep(delay).await;
                    last_context = context;
                }
                other => return other,
            }
        }

        Err(ScraperError::RateLimitExhausted {
            context: last_context,
            attempts: max_attempts,
        })
    }
}
