//! Retry with jittered exponential backoff.
//!
//! The policy is a plain value and sleeping goes through [`Sleeper`], so the loop
//! can be driven by tests without real delays.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How often and how patiently to retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound (exclusive) of the multiplicative jitter.
    #[serde(default = "default_max_jitter")]
    pub max_jitter: f64,
}

fn default_max_retries() -> u32 {
    4
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_jitter() -> f64 {
    0.25
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter: default_max_jitter(),
        }
    }
}

impl RetryPolicy {
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// `base * 2^retry * (1 + jitter)`; `retry` counts from 0.
    pub fn delay_for(&self, retry: u32, jitter: f64) -> Duration {
        let factor = 2f64.powi(retry.min(30) as i32) * (1.0 + jitter.max(0.0));
        Duration::from_millis((self.base_delay_ms as f64 * factor).round() as u64)
    }

    /// Draw jitter uniformly from `[0, max_jitter)`.
    pub fn sample_jitter(&self) -> f64 {
        if self.max_jitter <= 0.0 {
            return 0.0;
        }
        rand::thread_rng().gen_range(0.0..self.max_jitter)
    }
}

/// Source of delays between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeping on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Outcome of a retried operation that never succeeded.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or the policy is spent.
///
/// `op` receives the zero-based attempt number. Sleeping happens between calls
/// to `op`, so anything `op` holds for the duration of an attempt is already
/// released while waiting.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    label: &str,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < max_attempts => {
                let backoff = policy.delay_for(attempt, policy.sample_jitter());
                warn!(
                    error = %e,
                    label = label,
                    retry = attempt + 1,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "retrying backend call"
                );
                sleeper.sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(RetryExhausted {
                    attempts: attempt + 1,
                    last_error: e,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy {
            max_retries: 4,
            base_delay_ms: 100,
            max_jitter: 0.25,
        };
        assert_eq!(policy.delay_for(0, 0.0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1, 0.0), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3, 0.0), Duration::from_millis(800));
        assert_eq!(policy.delay_for(2, 0.25), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_range() {
        let policy = RetryPolicy::default();
        for _ in 0..200 {
            let j = policy.sample_jitter();
            assert!((0.0..0.25).contains(&j));
        }
        let flat = RetryPolicy {
            max_jitter: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(flat.sample_jitter(), 0.0);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let policy = RetryPolicy {
            max_retries: 4,
            base_delay_ms: 10,
            max_jitter: 0.25,
        };
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result = retry_with_backoff(&policy, &sleeper, "test", |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("503 slow down".to_string())
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
        let slept = sleeper.slept.lock().unwrap();
        assert_eq!(slept.len(), 2);
        assert!(slept[0] >= Duration::from_millis(10) && slept[0] < Duration::from_millis(13));
        assert!(slept[1] >= Duration::from_millis(20) && slept[1] < Duration::from_millis(26));
    }

    #[tokio::test]
    async fn test_exhausts_budget() {
        let policy = RetryPolicy {
            max_retries: 4,
            base_delay_ms: 1,
            max_jitter: 0.0,
        };
        let sleeper = RecordingSleeper::default();
        let err = retry_with_backoff(&policy, &sleeper, "test", |attempt| async move {
            Err::<(), _>(format!("fail {attempt}"))
        })
        .await
        .unwrap_err();

        assert_eq!(err.attempts, 5);
        assert_eq!(err.last_error, "fail 4");
        assert_eq!(sleeper.slept.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_no_retries_means_single_attempt() {
        let sleeper = RecordingSleeper::default();
        let err = retry_with_backoff(&RetryPolicy::no_retries(), &sleeper, "test", |_| async {
            Err::<(), _>("down")
        })
        .await
        .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }
}
