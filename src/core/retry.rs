//! Bounded retry for transient store failures.
//!
//! Only errors for which [`Error::is_transient`] holds are retried; business
//! failures are handed straight back to the caller. Each attempt re-runs the
//! whole operation, so it opens a fresh transaction.

use crate::errors::{Error, Result};
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Jittered exponential backoff policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_pct: f64,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: usize, base_delay_ms: u64, max_delay_ms: u64, jitter_pct: f64) -> Self {
        let clamped_base = base_delay_ms.max(1);
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: clamped_base,
            max_delay_ms: max_delay_ms.max(clamped_base),
            jitter_pct: jitter_pct.clamp(0.0, 1.0),
        }
    }

    /// A policy that runs the operation exactly once.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, 1, 1, 0.0)
    }

    fn next_delay(&self, attempt: usize) -> Duration {
        let exp = 2_u64.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX));
        let delay = self.base_delay_ms.saturating_mul(exp).min(self.max_delay_ms);
        if self.jitter_pct <= 0.0 {
            return Duration::from_millis(delay);
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let spread = (delay as f64 * self.jitter_pct) as i64;
        let delta = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis(delay.saturating_add_signed(delta))
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// attempts are used up. The closure receives the zero-based attempt number.
    pub async fn retry_async<F, Fut, T>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.next_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient store failure, retrying"
                    );
                    attempt += 1;
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, 25 ms doubling to at most 400 ms, 20% jitter.
    fn default() -> Self {
        Self::new(3, 25, 400, 0.2)
    }
}

/// Guard for `UPDATE ... WHERE <state read earlier>` writes.
///
/// Zero affected rows means another writer changed the row between our read and
/// our write; the operation is aborted as a [`Error::Conflict`] and retried.
pub(crate) fn expect_single_row(rows_affected: u64, what: &str) -> Result<()> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(Error::Conflict {
            message: format!("{what} changed concurrently"),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn conflict() -> Error {
        Error::Conflict {
            message: "test".to_string(),
        }
    }

    #[test]
    fn test_default_policy_matches_runtime_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 25);
        assert_eq!(policy.max_delay_ms, 400);
        assert_eq!(policy.jitter_pct, 0.2);

        // a zero-attempt or zero-delay setting still runs once with a 1 ms floor,
        // and a cap below the base is lifted to the base
        let degenerate = RetryPolicy::new(0, 0, 0, -0.5);
        assert_eq!(degenerate, RetryPolicy::no_retry());
        let capped = RetryPolicy::new(3, 25, 10, 0.2);
        assert_eq!(capped.max_delay_ms, 25);
    }

    #[test]
    fn test_backoff_from_base_reaches_cap_on_fifth_retry() {
        let policy = RetryPolicy {
            jitter_pct: 0.0,
            ..RetryPolicy::default()
        };
        let delays: Vec<u128> = (0..7)
            .map(|attempt| policy.next_delay(attempt).as_millis())
            .collect();
        assert_eq!(delays, vec![25, 50, 100, 200, 400, 400, 400]);
    }

    #[test]
    fn test_jitter_stays_within_band() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.next_delay(2).as_millis();
            assert!((80..=120).contains(&delay), "delay {delay} outside 100ms +/- 20%");
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let policy = RetryPolicy::new(3, 1, 1, 0.0);
        let attempts = Arc::new(AtomicUsize::new(0));

        let result = policy
            .retry_async(|attempt| {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 { Err(conflict()) } else { Ok("ok") }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_after_max_attempts() {
        let policy = RetryPolicy::new(3, 1, 1, 0.0);
        let attempts = Arc::new(AtomicUsize::new(0));

        let result: Result<()> = policy
            .retry_async(|_| {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(Error::StoreUnavailable {
                        message: "down".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(Error::StoreUnavailable { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_business_errors_are_not_retried() {
        let policy = RetryPolicy::new(3, 1, 1, 0.0);
        let attempts = Arc::new(AtomicUsize::new(0));

        let result: Result<()> = policy
            .retry_async(|_| {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(Error::InvalidAmount { amount: 0 })
                }
            })
            .await;

        assert!(matches!(result, Err(Error::InvalidAmount { amount: 0 })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expect_single_row() {
        assert!(expect_single_row(1, "plate p1").is_ok());
        assert!(matches!(
            expect_single_row(0, "plate p1"),
            Err(Error::Conflict { .. })
        ));
    }
}
