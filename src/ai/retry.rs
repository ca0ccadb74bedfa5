//! Retry with exponential backoff
//!
//! Recoverable failures are retried after a delay that doubles with every
//! attempt. The wait is a tokio timer, so a retrying call parks its task
//! instead of holding a worker thread.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::error::BackendError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before retry number `retry` (0-based): `base * 2^retry`, capped
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn delay_for(&self, retry: u32, error: &BackendError) -> Duration {
        let backoff = self.backoff_delay(retry);
        match error {
            BackendError::RateLimitError {
                retry_after: Some(seconds),
            } => backoff.max(Duration::from_secs(*seconds)).min(self.max_delay),
            _ => backoff,
        }
    }

    /// Runs `operation` until it succeeds, fails non-recoverably, or the
    /// retry budget is spent. Returns the last error in the latter cases.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut retry = 0u32;

        loop {
            match operation().await {
                Ok(value) => {
                    if retry > 0 {
                        debug!(label, retries = retry, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_recoverable() => {
                    debug!(label, error = %error, "Non-recoverable error, not retrying");
                    return Err(error);
                }
                Err(error) if retry >= self.max_retries => {
                    warn!(
                        label,
                        attempts = retry + 1,
                        error = %error,
                        "Retries exhausted"
                    );
                    return Err(error);
                }
                Err(error) => {
                    let delay = self.delay_for(retry, &error);
                    warn!(
                        label,
                        attempt = retry + 1,
                        max_attempts = self.max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Recoverable error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }
}
