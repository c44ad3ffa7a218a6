//! Retry with exponential backoff for transient transport errors

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};

use crate::error::{Result, ServiceError};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 means no retries)
    pub max_retries: u32,

    pub initial_interval: Duration,

    pub max_interval: Duration,

    pub multiplier: f64,

    /// Jitter applied to each interval (0.0 disables it)
    pub randomization_factor: f64,

    /// Maximum total time to spend retrying
    pub max_elapsed_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
            randomization_factor: 0.2,
            max_elapsed_time: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryConfig {
    /// A policy that makes exactly one attempt
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            randomization_factor: self.randomization_factor,
            max_elapsed_time: self.max_elapsed_time,
            ..ExponentialBackoff::default()
        }
    }
}

impl fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max_retries={} initial={:?} max={:?} multiplier={}",
            self.max_retries, self.initial_interval, self.max_interval, self.multiplier
        )
    }
}

/// Executor for retry operations with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute a fallible operation, retrying while the error is retryable
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut backoff = self.config.backoff();
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if Self::should_retry(&err) && retries < self.config.max_retries => {
                    match backoff.next_backoff() {
                        Some(wait) => {
                            log::warn!(
                                "transient failure, retrying in {:?} ({}/{}): {}",
                                wait,
                                retries + 1,
                                self.config.max_retries,
                                err
                            );
                            tokio::time::sleep(wait).await;
                            retries += 1;
                        }
                        None => return Err(err.with_context_value("retries", retries)),
                    }
                }
                Err(err) if retries > 0 => return Err(err.with_context_value("retries", retries)),
                Err(err) => return Err(err),
            }
        }
    }

    fn should_retry(error: &ServiceError) -> bool {
        error.is_retryable()
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(20),
            randomization_factor: 0.0,
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let retry = RetryExecutor::new(fast(2));

        let counter = Arc::clone(&attempts);
        let result = retry
            .execute(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ServiceError::network("connection reset"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_authentication() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let retry = RetryExecutor::new(fast(3));

        let counter = Arc::clone(&attempts);
        let result: Result<()> = retry
            .execute(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ServiceError::authentication("invalid key"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let retry = RetryExecutor::new(fast(2));

        let counter = Arc::clone(&attempts);
        let result: Result<()> = retry
            .execute(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ServiceError::rate_limit("slow down"))
                }
            })
            .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn none_makes_a_single_attempt() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let retry = RetryExecutor::new(RetryConfig::none());

        let counter = Arc::clone(&attempts);
        let _: Result<()> = retry
            .execute(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ServiceError::timeout("deadline"))
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
