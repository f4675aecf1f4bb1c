//! Bounded exponential backoff for service calls

use crate::services::ServiceError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 8_000;

/// The last error of a unit that ran out of attempts
#[derive(Debug, Clone, PartialEq)]
pub struct Exhausted {
    pub error: ServiceError,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_INITIAL_BACKOFF_MS,
            DEFAULT_MAX_BACKOFF_MS,
        )
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first call; it is clamped to at least one
    pub fn new(max_attempts: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms.max(initial_backoff_ms)),
        }
    }

    /// Single attempt, no waiting
    pub fn no_retry() -> Self {
        Self::new(1, 0, 0)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt `attempt + 1`, doubling up to the ceiling
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or the
    /// attempt ceiling is reached
    pub async fn run<F, Fut, T>(&self, operation: &str, unit: &str, mut f: F) -> Result<T, Exhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, unit, attempts = attempt, "Succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_retryable() || attempt >= self.max_attempts => {
                    warn!(
                        operation,
                        unit,
                        attempts = attempt,
                        kind = error.kind(),
                        error = %error,
                        "Giving up"
                    );
                    return Err(Exhausted {
                        error,
                        attempts: attempt,
                    });
                }
                Err(error) => {
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        operation,
                        unit,
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        kind = error.kind(),
                        error = %error,
                        "Attempt failed, retrying"
                    );
                    sleep(backoff).await;
                }
            }
        }
    }
}
