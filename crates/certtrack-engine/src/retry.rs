//! Task-level retry with bounded exponential backoff.
//!
//! A job run that fails on a transient store error is retried with a delay
//! of `base * 2^attempt`, capped, up to a maximum attempt count. Non-transient
//! errors and exhausted retries surface as a failed run for manual
//! inspection — jobs leave no partial state behind, so a later trigger can
//! simply run again.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use certtrack_core::config::RetryConfig;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_secs(cfg.base_secs),
            max_delay: Duration::from_secs(cfg.cap_secs),
        }
    }

    /// Delay before retrying after a failed `attempt` (0-based):
    /// `base * 2^attempt`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Run `attempt_fn` until it succeeds, fails non-transiently, or exhausts
/// the policy's attempts.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    job: &str,
    request_id: &str,
    mut attempt_fn: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 0;
    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    %job,
                    %request_id,
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use certtrack_store::StoreError;

    fn transient() -> EngineError {
        EngineError::Store(StoreError::Database(
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                Some("database is locked".into()),
            ),
        ))
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
        }
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(600),
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(60));
        assert_eq!(policy.delay_for(1), Duration::from_secs(120));
        assert_eq!(policy.delay_for(2), Duration::from_secs(240));
        // 60 * 2^4 = 960 — capped at ten minutes.
        assert_eq!(policy.delay_for(4), Duration::from_secs(600));
        assert_eq!(policy.delay_for(31), Duration::from_secs(600));
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, EngineError> =
            with_backoff(&fast_policy(3), "test", "req-1", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(transient())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), EngineError> =
            with_backoff(&fast_policy(3), "test", "req-2", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_fail_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), EngineError> =
            with_backoff(&fast_policy(3), "test", "req-3", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(EngineError::Store(StoreError::NotFound {
                        entity: "schedule",
                        id: "missing".into(),
                    }))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
