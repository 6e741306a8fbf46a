//! Bounded retry for store calls.

use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use metrics::counter;
use tracing::{error, warn};

use crate::application::repos::RepoError;
use crate::config::{DatabaseSettings, RetrySettings};

pub(crate) const METRIC_STORE_RETRY: &str = "talkback_store_retry_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: NonZeroU32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Deadline applied to each attempt.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: NonZeroU32::new(3).unwrap_or(NonZeroU32::MIN),
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
            call_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(retry: &RetrySettings, database: &DatabaseSettings) -> Self {
        Self {
            max_attempts: retry.max_attempts,
            initial_backoff: retry.initial_backoff,
            max_backoff: retry.max_backoff,
            call_timeout: database.request_timeout,
        }
    }

    /// Same deadline, one attempt. Used for inserts: a timed-out insert may
    /// still have committed.
    pub fn single_attempt(&self) -> Self {
        Self {
            max_attempts: NonZeroU32::MIN,
            ..*self
        }
    }

    /// Delay after the `attempt`-th failure (1-based): doubles from
    /// `initial_backoff`, capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1_u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Run `call` until it succeeds, fails with a non-transient error, or the
/// policy's attempts are spent. Each attempt is bounded by `call_timeout`;
/// an elapsed deadline counts as [`RepoError::Timeout`].
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    op: &'static str,
    mut call: F,
) -> Result<T, RepoError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RepoError>>,
{
    let max_attempts = policy.max_attempts.get();
    let mut attempt = 1;

    loop {
        let result = match tokio::time::timeout(policy.call_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(RepoError::Timeout),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff_for(attempt);
                counter!(METRIC_STORE_RETRY, "op" => op).increment(1);
                warn!(
                    target = "talkback::db",
                    op,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient store failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    error!(
                        target = "talkback::db",
                        op,
                        attempts = attempt,
                        error = %err,
                        "store call failed after retries"
                    );
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: NonZeroU32::new(max_attempts).expect("attempts"),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            call_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(300),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(50));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(300));
        assert_eq!(policy.backoff_for(u32::MAX), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(RepoError::Unavailable("connection reset".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.expect("third attempt succeeds"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(2), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RepoError::Timeout)
        })
        .await;

        assert!(matches!(result, Err(RepoError::Timeout)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(5), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RepoError::InvalidInput {
                message: "violates foreign key constraint".into(),
            })
        })
        .await;

        assert!(matches!(result, Err(RepoError::InvalidInput { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let policy = RetryPolicy {
            call_timeout: Duration::from_millis(5),
            ..fast_policy(1)
        };
        let result: Result<(), _> = with_retry(&policy, "test", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(RepoError::Timeout)));
    }

    #[test]
    fn single_attempt_keeps_deadline() {
        let policy = fast_policy(4).single_attempt();
        assert_eq!(policy.max_attempts.get(), 1);
        assert_eq!(policy.call_timeout, Duration::from_millis(200));
    }
}
