//! Backoff for hot-shard commands and cold-store calls
//!
//! A cold read during fetch, a cold write during flush and every Redis
//! command share this policy. Only failures whose [`StorageError`] kind is
//! retriable (I/O, throttling, timeouts) are attempted again; a missing
//! table or a decode failure surfaces on the first try.

use crate::error::StorageError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How many times, and how far apart, a failed backend call is repeated
///
/// The wait before retry `n` (0-based) is `first_backoff * growth^n`,
/// clamped to `backoff_cap`, plus up to a quarter of that when `jitter`
/// is set. The defaults give three retries at roughly 100, 200 and 400 ms.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Wait before the first retry
    pub first_backoff: Duration,
    /// Factor applied to the wait after every retry
    pub growth: u32,
    /// Longest single wait
    pub backoff_cap: Duration,
    /// Spread concurrent retries against one backend
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            first_backoff: Duration::from_millis(100),
            growth: 2,
            backoff_cap: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Same policy with another retry budget
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Wait before retry number `attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let wait = self
            .first_backoff
            .saturating_mul(self.growth.saturating_pow(attempt))
            .min(self.backoff_cap);
        if self.jitter {
            wait.mul_f64(1.0 + rand::random::<f64>() * 0.25)
        } else {
            wait
        }
    }

    /// Whether retry number `attempt` is still within budget
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.retries
    }

    /// Drive `call` until it succeeds, fails for good, or the budget runs out
    ///
    /// Each attempt is bounded by `timeout`; an attempt that runs over counts
    /// as a retriable timeout. `label` names the call in log lines.
    pub async fn run<F, Fut, T>(
        &self,
        label: &str,
        timeout: Duration,
        mut call: F,
    ) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut attempt = 0;
        loop {
            let failure = match tokio::time::timeout(timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => StorageError::timeout(format!("{label} exceeded {timeout:?}")),
            };
            if !failure.is_retriable() || !self.allows_retry(attempt) {
                return Err(failure);
            }

            let wait = self.backoff(attempt);
            warn!(
                call = label,
                retry = attempt + 1,
                of = self.retries,
                ?wait,
                error = %failure,
                "backend call failed, backing off"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn steady() -> RetryPolicy {
        RetryPolicy {
            jitter: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_backoff_doubles_until_cap() {
        let policy = steady();
        let waits: Vec<u128> = (0..4).map(|n| policy.backoff(n).as_millis()).collect();
        assert_eq!(waits, vec![100, 200, 400, 800]);
        assert_eq!(policy.backoff(10), Duration::from_secs(5));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_within_a_quarter() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let wait = policy.backoff(1);
            assert!(wait >= Duration::from_millis(200));
            assert!(wait <= Duration::from_millis(250));
        }
    }

    #[test]
    fn test_budget() {
        let policy = RetryPolicy::default().with_retries(2);
        assert!(policy.allows_retry(1));
        assert!(!policy.allows_retry(2));
        assert!(!steady().with_retries(0).allows_retry(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_cold_write_eventually_lands() {
        let calls = AtomicU32::new(0);
        let result = steady()
            .run("cold put", Duration::from_secs(10), || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StorageError::throttled("slow down"))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_io_failures_exhaust_the_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = steady()
            .run("cold get", Duration::from_secs(10), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StorageError::io("connection reset"))
            })
            .await;
        assert_eq!(result.unwrap_err().kind, StorageErrorKind::Io);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_table_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = steady()
            .run("cold get", Duration::from_secs(10), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StorageError::not_found("no table"))
            })
            .await;
        assert_eq!(result.unwrap_err().kind, StorageErrorKind::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let result: Result<(), _> = steady()
            .with_retries(0)
            .run("cold get", Duration::from_secs(10), || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        assert_eq!(result.unwrap_err().kind, StorageErrorKind::Timeout);
    }
}
