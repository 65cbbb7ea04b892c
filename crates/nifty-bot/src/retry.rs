//! Exponential backoff for flaky upstream calls (Yahoo, Alpha Vantage, Telegram)

use crate::error::{BotError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How often and how patiently to retry
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt count and first delay
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            ..Self::default()
        }
    }

    /// Single attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Millisecond delays for tests
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(50),
            backoff_multiplier: 2.0,
        }
    }

    /// Delay before retry number `retry` (1-based)
    fn backoff_duration(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.powi((retry - 1) as i32);
        let delay = self.initial_backoff.mul_f64(factor);
        delay.min(self.max_backoff)
    }

    /// Server-provided wait wins over the computed backoff
    fn delay_for(&self, retry: u32, error: &BotError) -> Duration {
        match error {
            BotError::RateLimitExceeded {
                retry_after: Some(wait),
                ..
            } => *wait,
            _ => self.backoff_duration(retry),
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => {
                    debug!(operation = operation_name, error = %e, "permanent failure");
                    return Err(e);
                }
                Err(e) if attempt >= self.max_attempts => {
                    warn!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %e,
                        "giving up"
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for(attempt, &e);
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "retrying in {delay:?}"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn transient() -> BotError {
        BotError::YahooFinanceError("connection reset".to_string())
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_new_clamps_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_duration(0), Duration::ZERO);
        assert_eq!(policy.backoff_duration(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_duration(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_duration(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_duration(10), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_after_overrides_backoff() {
        let policy = RetryPolicy::default();
        let err = BotError::RateLimitExceeded {
            provider: "Telegram".to_string(),
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(policy.delay_for(1, &err), Duration::from_secs(7));
        assert_eq!(policy.delay_for(1, &transient()), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_execute_success_after_retry() {
        let policy = RetryPolicy::fast();
        let calls = Arc::new(Mutex::new(0));
        let count = Arc::clone(&calls);

        let result = policy
            .execute("quote", || {
                let count = Arc::clone(&count);
                async move {
                    let mut n = count.lock().await;
                    *n += 1;
                    if *n < 2 { Err(transient()) } else { Ok(101.5) }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 101.5);
        assert_eq!(*calls.lock().await, 2);
    }

    #[tokio::test]
    async fn test_execute_all_attempts_fail() {
        let policy = RetryPolicy::fast();
        let calls = Arc::new(Mutex::new(0));
        let count = Arc::clone(&calls);

        let result: Result<f64> = policy
            .execute("quote", || {
                let count = Arc::clone(&count);
                async move {
                    *count.lock().await += 1;
                    Err(transient())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(*calls.lock().await, 3);
    }

    #[tokio::test]
    async fn test_execute_permanent_error_not_retried() {
        let policy = RetryPolicy::fast();
        let calls = Arc::new(Mutex::new(0));
        let count = Arc::clone(&calls);

        let result: Result<f64> = policy
            .execute("quote", || {
                let count = Arc::clone(&count);
                async move {
                    *count.lock().await += 1;
                    Err(BotError::InvalidSymbol("???".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(BotError::InvalidSymbol(_))));
        assert_eq!(*calls.lock().await, 1);
    }
}
