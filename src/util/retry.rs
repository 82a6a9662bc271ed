//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::SwarmError;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// `retries` attempts beyond the first.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            ..Self::default()
        }
    }

    /// Execute an async operation with retry.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, SwarmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SwarmError>>,
    {
        self.execute_with_cancel(&CancellationToken::new(), operation)
            .await
    }

    /// Execute with retry, giving up with [`SwarmError::Canceled`] as soon as
    /// `cancel` fires, including while backing off.
    pub async fn execute_with_cancel<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, SwarmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SwarmError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;

        for attempt in 0..max_attempts {
            if cancel.is_cancelled() {
                return Err(SwarmError::Canceled);
            }
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !err.is_retryable() || attempt + 1 >= max_attempts {
                return Err(err);
            }

            // Jitter: 75%-125% of backoff, unless the server named a delay.
            let sleep_duration = match err {
                SwarmError::RateLimited {
                    retry_after_ms: Some(ms),
                } => Duration::from_millis(ms).min(self.max_backoff),
                _ => Duration::from_secs_f64(backoff.as_secs_f64() * (0.75 + rand_factor() * 0.5)),
            };

            tracing::warn!(
                attempt = attempt + 1,
                max_attempts,
                delay_ms = u64::try_from(sleep_duration.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Retrying after error"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(SwarmError::Canceled),
                _ = tokio::time::sleep(sleep_duration) => {}
            }

            backoff = Duration::from_secs_f64(
                (backoff.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
            );
        }

        Err(SwarmError::Timeout(0))
    }
}

/// Pseudo-random factor in [0, 1) from the clock, the thread id and a fresh uuid.
fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);
    uuid::Uuid::new_v4().hash(&mut hasher);

    (hasher.finish() % 10_000) as f64 / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn retries_retryable_errors_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = fast_policy(3)
            .execute(|| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(SwarmError::api(503, "unavailable"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result.expect("eventually succeeds"), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_return_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), _> = fast_policy(5)
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(SwarmError::Authentication("bad key".into())) }
            })
            .await;
        assert!(matches!(result, Err(SwarmError::Authentication(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_backoff() {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy {
            initial_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(60),
            ..fast_policy(3)
        };
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let result: Result<(), _> = policy
            .execute_with_cancel(&cancel, || async { Err(SwarmError::Timeout(1)) })
            .await;
        assert!(matches!(result, Err(SwarmError::Canceled)));
    }
}
