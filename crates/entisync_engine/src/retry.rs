//! Retry executor for remote calls.

use crate::config::RetryConfig;
use entisync_core::{RemoteError, RemoteResult};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

/// A remote call that failed for good.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{last} (after {attempts} attempt(s))")]
pub struct RetryError {
    /// Attempts made before giving up.
    pub attempts: u32,
    /// The final failure.
    pub last: RemoteError,
}

/// Runs remote calls with bounded, jittered exponential backoff.
///
/// Only categories that [`is_retryable`](entisync_core::ErrorCategory::is_retryable)
/// are repeated. Permanent failures return after the first attempt.
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    retries: AtomicU64,
}

impl RetryExecutor {
    /// Creates an executor.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            retries: AtomicU64::new(0),
        }
    }

    /// Returns the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns how many retries have been scheduled in total.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Calls `operation` until it succeeds, fails permanently, or runs out
    /// of attempts.
    ///
    /// At least one attempt is always made.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "remote call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                debug!(attempt, category = %err.category(), "permanent remote failure");
                return Err(RetryError {
                    attempts: attempt,
                    last: err,
                });
            }
            if attempt >= max_attempts {
                warn!(attempt, error = %err, "retry budget exhausted");
                return Err(RetryError {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.config.sample_delay(attempt);
            self.retries.fetch_add(1, Ordering::Relaxed);
            debug!(attempt, ?delay, category = %err.category(), "retrying remote call");
            tokio::time::sleep(delay).await;
        }
    }
}
