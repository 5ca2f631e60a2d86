//! Exponential backoff between retry attempts

use std::time::Duration;

use super::DelayStrategy;

/// Exponential backoff delay strategy.
///
/// The first retry waits `initial_ms`; each following one multiplies the
/// delay by `multiplier`, capped at `max_ms`. With jitter enabled the delay
/// is moved by up to ±25%.
///
/// ```
/// use bulkql_connection::retry::{BackoffStrategy, DelayStrategy};
/// use std::time::Duration;
///
/// let backoff = BackoffStrategy::new(100, 30_000);
/// assert_eq!(backoff.delay(1), Duration::from_millis(100));
/// assert_eq!(backoff.delay(2), Duration::from_millis(200));
/// assert!(backoff.delay(20) <= Duration::from_millis(30_000));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffStrategy {
    initial_ms: u64,
    max_ms: u64,
    multiplier: f64,
    jitter: bool,
}

impl BackoffStrategy {
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        let initial_ms = initial_ms.max(1);
        Self {
            initial_ms,
            max_ms: max_ms.max(initial_ms),
            multiplier: 2.0,
            jitter: false,
        }
    }

    /// Growth factor per attempt, at least 1.0 (default 2.0)
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `retry` (0-based)
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let delay_ms = (self.initial_ms as f64) * self.multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.max_ms as f64) as u64;

        let final_ms = if self.jitter {
            let jitter_range = capped_ms / 4;
            let jitter = (rand_simple() * (jitter_range * 2) as f64) as u64;
            capped_ms
                .saturating_sub(jitter_range)
                .saturating_add(jitter)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn has_jitter(&self) -> bool {
        self.jitter
    }
}

impl Default for BackoffStrategy {
    /// 100 ms initial, 30 s cap, doubling
    fn default() -> Self {
        Self::new(100, 30_000)
    }
}

impl DelayStrategy for BackoffStrategy {
    fn delay(&self, attempt: u32) -> Duration {
        self.calculate_delay(attempt.saturating_sub(1))
    }
}

/// Value in [0.0, 1.0) from the clock's sub-second nanos
fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}
