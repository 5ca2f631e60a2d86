//! Retry wrapper for fallible async operations
//!
//! Generic over the operation and its error type, so it can wrap a single
//! statement, a whole `bulk_insert` call or anything else that may fail
//! transiently.
//!
//! ```ignore
//! use bulkql_connection::retry::{retry_if, BackoffStrategy};
//!
//! let rows = retry_if(
//!     || bulk_insert(&*conn, &request, &config),
//!     3,
//!     &BackoffStrategy::new(200, 5_000),
//!     BulkqlError::is_transient,
//! )
//! .await?;
//! ```

mod backoff;

#[cfg(test)]
mod tests;

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use backoff::BackoffStrategy;

/// Delay to wait before a retry
pub trait DelayStrategy: Send + Sync {
    /// `attempt` is the 1-based number of the attempt that just failed
    fn delay(&self, attempt: u32) -> Duration;
}

impl<F> DelayStrategy for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

/// The same delay after every failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantDelay(pub Duration);

impl ConstantDelay {
    pub fn new(delay: Duration) -> Self {
        Self(delay)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }
}

impl DelayStrategy for ConstantDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Attempt count and constant delay for [`retry_with`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
        }
    }

    pub fn delay(&self) -> ConstantDelay {
        ConstantDelay::from_millis(self.delay_ms)
    }
}

impl Default for RetryConfig {
    /// 2 attempts, 1 second apart
    fn default() -> Self {
        Self::new(2, 1000)
    }
}

/// Run `operation` up to `max_attempts` times.
///
/// Between attempts the failure is logged and `strategy.delay(attempt)` is
/// awaited. The last attempt's error is returned as is. A `max_attempts` of
/// 0 or 1 runs the operation once.
pub async fn retry<T, E, F, Fut, D>(operation: F, max_attempts: u32, strategy: &D) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    D: DelayStrategy + ?Sized,
{
    retry_if(operation, max_attempts, strategy, |_| true).await
}

/// Like [`retry`], but only errors matching `should_retry` are retried;
/// any other error is returned immediately.
pub async fn retry_if<T, E, F, Fut, D, P>(
    mut operation: F,
    max_attempts: u32,
    strategy: &D,
    should_retry: P,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    D: DelayStrategy + ?Sized,
    P: Fn(&E) -> bool,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts && should_retry(&e) => {
                let delay = strategy.delay(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt > 1 {
                    tracing::error!(attempt, error = %e, "operation failed, giving up");
                }
                return Err(e);
            }
        }
    }
}

/// [`retry`] with the attempt count and constant delay from `config`
pub async fn retry_with<T, E, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry(operation, config.max_attempts, &config.delay()).await
}

/// [`retry_with`] using `RetryConfig::default()`
pub async fn attempt_with_retry<T, E, F, Fut>(operation: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with(&RetryConfig::default(), operation).await
}
