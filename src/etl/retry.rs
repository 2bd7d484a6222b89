//! Resilient wrapper for single remote calls.
//!
//! The upstream stats source throttles aggressively with long cool-down
//! windows, so the backoff schedule is long and hand-tunable (a point lookup
//! per attempt, not an exponential computation). A wall-clock budget caps
//! worst-case per-call latency so one stuck game cannot stall a multi-hour
//! backfill: when waiting again would exceed the budget, the failure is
//! propagated immediately and the caller decides to skip and move on.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::warn;

use crate::constants::retry;
use crate::error::AppError;

/// Retry policy for one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first
    pub max_retries: u32,
    /// Backoff schedule in seconds, indexed by attempt and clamped to the
    /// last entry
    pub backoff_seconds: Vec<u64>,
    /// Total wall-clock budget for the call, sleeps included
    pub max_total_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: retry::MAX_RETRIES,
            backoff_seconds: retry::BACKOFF_SECONDS.to_vec(),
            max_total_wait: Duration::from_secs(retry::MAX_TOTAL_WAIT_SECONDS),
        }
    }
}

impl RetryPolicy {
    /// Builds a policy from the configured ETL tuning knobs.
    pub fn from_config(etl: &crate::config::EtlConfig) -> Self {
        RetryPolicy {
            max_retries: etl.max_retries,
            backoff_seconds: etl.backoff_seconds.clone(),
            max_total_wait: Duration::from_secs(etl.max_total_wait_seconds),
        }
    }

    /// Wait time for a given zero-based attempt index.
    fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let idx = (attempt as usize).min(self.backoff_seconds.len().saturating_sub(1));
        Duration::from_secs(*self.backoff_seconds.get(idx).unwrap_or(&0))
    }
}

/// Invoke `call` with bounded retries under `policy`.
///
/// Only transient failures (`AppError::is_retryable`) are retried; a shape
/// or data problem will look exactly the same on the next attempt, so it is
/// propagated immediately. The last allowed attempt propagates its failure
/// without sleeping, as does any attempt whose backoff would push the call
/// past the wall-clock budget.
pub async fn call_with_retries<T, F, Fut>(mut call: F, policy: &RetryPolicy) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let start = Instant::now();

    for attempt in 0..policy.max_retries {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt + 1 == policy.max_retries || !e.is_retryable() {
                    return Err(e);
                }

                let wait = policy.backoff_for_attempt(attempt);

                // If we'd exceed the budget, give up so the caller can log and skip
                if start.elapsed() + wait > policy.max_total_wait {
                    return Err(e);
                }

                warn!(
                    "API call failed ({}: {e}). Retrying in {}s (attempt {}/{})",
                    e.kind(),
                    wait.as_secs(),
                    attempt + 1,
                    policy.max_retries
                );
                sleep(wait).await;
            }
        }
    }

    // max_retries == 0 never invokes the call
    Err(AppError::config_error("retry policy allows zero attempts"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> AppError {
        AppError::api_rate_limit("throttled", "https://stats.example.com")
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt_sleeps_never() {
        let policy = RetryPolicy::default();
        let start = Instant::now();
        let result = call_with_retries(|| async { Ok::<_, AppError>(7) }, &policy).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let result = call_with_retries(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(transient())
                    } else {
                        Ok(n)
                    }
                }
            },
            &policy,
        )
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_sleeps_twice_within_budget() {
        // backoff [120, 200, 250], budget 400: sleep 120, sleep 200, then the
        // third attempt is the last allowed and propagates without sleeping.
        let policy = RetryPolicy {
            max_retries: 3,
            backoff_seconds: vec![120, 200, 250],
            max_total_wait: Duration::from_secs(400),
        };
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result: Result<(), _> = call_with_retries(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            },
            &policy,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Total elapsed sleep stays within the budget
        assert_eq!(start.elapsed(), Duration::from_secs(320));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_cuts_schedule_short() {
        // With more attempts allowed, the third wait (250s) would land at
        // 320 + 250 = 570 > 400, so the call gives up after two sleeps.
        let policy = RetryPolicy {
            max_retries: 5,
            backoff_seconds: vec![120, 200, 250],
            max_total_wait: Duration::from_secs(400),
        };
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result: Result<(), _> = call_with_retries(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            },
            &policy,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(320));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_boundary_is_inclusive() {
        // elapsed + wait exactly equal to the budget still sleeps: the cap
        // only triggers when the wait would exceed it.
        let policy = RetryPolicy {
            max_retries: 3,
            backoff_seconds: vec![100, 200],
            max_total_wait: Duration::from_secs(300),
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = call_with_retries(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            },
            &policy,
        )
        .await;
        assert!(result.is_err());
        // 100 slept, then 100 + 200 == 300 is allowed, then last attempt fails
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result: Result<(), _> = call_with_retries(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::extraction("0022400123", "no rows")) }
            },
            &policy,
        )
        .await;
        assert!(matches!(result, Err(AppError::Extraction { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_clamps_to_last_entry() {
        let policy = RetryPolicy {
            max_retries: 4,
            backoff_seconds: vec![1],
            max_total_wait: Duration::from_secs(600),
        };
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result: Result<(), _> = call_with_retries(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            },
            &policy,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
