//! Retry with backoff for the execution closure

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{RetryConfig, RetryStrategy};
use crate::error::EngineError;

/// Runs a fallible operation up to `max_retries` times
#[derive(Debug, Clone)]
pub struct RecoveryManager {
    config: RetryConfig,
}

impl RecoveryManager {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Wait after failed attempt `attempt` (1-based), capped at `max_delay_ms`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay_ms;
        let delay_ms = match self.config.strategy {
            RetryStrategy::Immediate => 0,
            RetryStrategy::Linear => base.saturating_mul(u64::from(attempt)),
            RetryStrategy::Exponential => {
                base.saturating_mul(2_u64.checked_pow(attempt).unwrap_or(u64::MAX))
            }
        };
        Duration::from_millis(delay_ms.min(self.config.max_delay_ms))
    }

    /// Call `operation` with the attempt number until it succeeds or attempts run
    /// out. The last error is returned after exhaustion.
    ///
    /// `cancel` is checked before each attempt and after each backoff wait, and
    /// aborts a wait in progress.
    pub async fn execute<T, F, Fut>(&self, cancel: &CancellationToken, mut operation: F) -> Result<T, EngineError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                debug!(attempt, "execution cancelled before attempt");
                return Err(EngineError::Cancelled);
            }

            let err = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "execution succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if attempt >= max_attempts {
                warn!(attempts = attempt, error = %err, "execution failed, retries exhausted");
                return Err(EngineError::Execution {
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = self.delay_for(attempt);
            warn!(
                "Execution attempt {}/{} failed: {:#}. Retrying in {}ms",
                attempt,
                max_attempts,
                err,
                delay.as_millis()
            );
            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(attempt, "backoff wait cancelled");
                        return Err(EngineError::Cancelled);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn recovery(strategy: RetryStrategy, max_retries: u32) -> RecoveryManager {
        RecoveryManager::new(RetryConfig {
            max_retries,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            strategy,
        })
    }

    #[test]
    fn test_delay_strategies() {
        let immediate = recovery(RetryStrategy::Immediate, 3);
        assert_eq!(immediate.delay_for(3), Duration::ZERO);

        let linear = recovery(RetryStrategy::Linear, 3);
        assert_eq!(linear.delay_for(1), Duration::from_millis(100));
        assert_eq!(linear.delay_for(3), Duration::from_millis(300));
        assert_eq!(linear.delay_for(20), Duration::from_millis(1_000));

        let exponential = recovery(RetryStrategy::Exponential, 3);
        assert_eq!(exponential.delay_for(1), Duration::from_millis(200));
        assert_eq!(exponential.delay_for(3), Duration::from_millis(800));
        assert_eq!(exponential.delay_for(4), Duration::from_millis(1_000));
        assert_eq!(exponential.delay_for(100), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = recovery(RetryStrategy::Exponential, 3)
            .execute(&CancellationToken::new(), move |attempt| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if attempt < 3 {
                        anyhow::bail!("attempt {} failed", attempt)
                    }
                    Ok(attempt)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_surfaces_last_error() {
        let err = recovery(RetryStrategy::Linear, 3)
            .execute(&CancellationToken::new(), |attempt| async move {
                Err::<(), _>(anyhow::anyhow!("exchange error on attempt {}", attempt))
            })
            .await
            .unwrap_err();
        match err {
            EngineError::Execution { attempts, source } => {
                assert_eq!(attempts, 3);
                assert_eq!(source.to_string(), "exchange error on attempt 3");
            }
            other => panic!("expected execution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut invoked = false;
        let result = recovery(RetryStrategy::Immediate, 3)
            .execute(&cancel, |_| {
                invoked = true;
                async { Ok(()) }
            })
            .await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert!(!invoked);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff_wait() {
        let manager = RecoveryManager::new(RetryConfig {
            max_retries: 5,
            base_delay_ms: 60_000,
            max_delay_ms: 600_000,
            strategy: RetryStrategy::Exponential,
        });
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result: Result<(), _> = manager
            .execute(&cancel, |_| async { Err(anyhow::anyhow!("down")) })
            .await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
