//! Tests for the retry wrapper

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bulkql_core::BulkqlError;
use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;

/// Delay strategy that records which attempts it was asked about
#[derive(Default)]
struct RecordingDelay {
    calls: parking_lot::Mutex<Vec<u32>>,
}

impl DelayStrategy for RecordingDelay {
    fn delay(&self, attempt: u32) -> Duration {
        self.calls.lock().push(attempt);
        Duration::from_millis(50)
    }
}

#[tokio::test(start_paused = true)]
async fn test_fails_twice_then_succeeds() {
    let calls = AtomicU32::new(0);
    let delay = RecordingDelay::default();

    let result = retry(
        || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(BulkqlError::Connection(format!("reset #{}", n)))
            } else {
                Ok(n)
            }
        },
        3,
        &delay,
    )
    .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(*delay.calls.lock(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_last_error_is_returned_unchanged() {
    let calls = AtomicU32::new(0);
    let delay = RecordingDelay::default();

    let err = retry(
        || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err::<(), _>(BulkqlError::Timeout(format!("attempt {}", n)))
        },
        4,
        &delay,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, BulkqlError::Timeout(ref msg) if msg == "attempt 4"));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(delay.calls.lock().len(), 3);
}

#[rstest]
#[case(0)]
#[case(1)]
#[tokio::test(start_paused = true)]
async fn test_single_attempt_does_not_retry(#[case] max_attempts: u32) {
    let calls = AtomicU32::new(0);
    let delay = RecordingDelay::default();

    let result = retry(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("boom")
        },
        max_attempts,
        &delay,
    )
    .await;

    assert_eq!(result, Err("boom"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(delay.calls.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retry_if_skips_non_matching_errors() {
    let calls = AtomicU32::new(0);

    let err = retry_if(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(BulkqlError::InvalidIdentifier("users; --".into()))
        },
        5,
        &ConstantDelay::from_millis(10),
        BulkqlError::is_transient,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, BulkqlError::InvalidIdentifier(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_waits_between_attempts() {
    let start = tokio::time::Instant::now();
    let calls = AtomicU32::new(0);

    let _ = retry(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("boom")
        },
        3,
        &ConstantDelay::from_millis(1000),
    )
    .await;

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(2000));
    assert!(elapsed < Duration::from_millis(2100));
}

#[tokio::test(start_paused = true)]
async fn test_closure_as_delay_strategy() {
    let calls = AtomicU32::new(0);
    let linear = |attempt: u32| Duration::from_millis(100 * u64::from(attempt));
    let start = tokio::time::Instant::now();

    let result = retry(
        || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 { Err("not yet") } else { Ok("done") }
        },
        3,
        &linear,
    )
    .await;

    assert_eq!(result, Ok("done"));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn test_retry_with_config() {
    let calls = AtomicU32::new(0);
    let config = RetryConfig::new(3, 5);

    let result = retry_with(&config, || async {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n < 3 { Err("flaky") } else { Ok(n) }
    })
    .await;

    assert_eq!(result, Ok(3));
}

#[tokio::test(start_paused = true)]
async fn test_attempt_with_retry_tries_twice() {
    let calls = AtomicU32::new(0);

    let result = attempt_with_retry(|| async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>("down")
    })
    .await;

    assert_eq!(result, Err("down"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_retry_config_defaults() {
    let config = RetryConfig::default();
    assert_eq!(config.max_attempts, 2);
    assert_eq!(config.delay(), ConstantDelay::from_millis(1000));
}

#[test]
fn test_retry_config_serialization() {
    let config = RetryConfig::new(5, 250);
    let json = serde_json::to_string(&config).expect("serialize");
    assert_eq!(json, r#"{"max_attempts":5,"delay_ms":250}"#);
    let deserialized: RetryConfig = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(deserialized, config);
}

#[test]
fn test_backoff_grows_and_caps() {
    let backoff = BackoffStrategy::new(100, 1000);
    assert_eq!(backoff.delay(1), Duration::from_millis(100));
    assert_eq!(backoff.delay(2), Duration::from_millis(200));
    assert_eq!(backoff.delay(3), Duration::from_millis(400));
    assert_eq!(backoff.delay(5), Duration::from_millis(1000));
    assert_eq!(backoff.delay(64), Duration::from_millis(1000));
}

#[test]
fn test_backoff_multiplier() {
    let backoff = BackoffStrategy::new(100, 10_000).with_multiplier(3.0);
    assert_eq!(backoff.calculate_delay(0), Duration::from_millis(100));
    assert_eq!(backoff.calculate_delay(2), Duration::from_millis(900));

    let clamped = BackoffStrategy::new(100, 10_000).with_multiplier(0.5);
    assert_eq!(clamped.multiplier(), 1.0);
}

#[test]
fn test_backoff_jitter_stays_in_range() {
    let backoff = BackoffStrategy::new(1000, 1000).with_jitter(true);
    assert!(backoff.has_jitter());
    for _ in 0..20 {
        let delay = backoff.delay(1);
        assert!(delay >= Duration::from_millis(750));
        assert!(delay <= Duration::from_millis(1250));
    }
}

#[test]
fn test_backoff_new_normalizes_bounds() {
    let backoff = BackoffStrategy::new(0, 0);
    assert_eq!(backoff.initial_delay(), Duration::from_millis(1));
    assert_eq!(backoff.max_delay(), Duration::from_millis(1));
}
