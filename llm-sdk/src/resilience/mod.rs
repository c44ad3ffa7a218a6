//! Resilience patterns for the completion client
//!
//! - Retry with exponential backoff for transient transport errors
//! - Circuit breaker shared by all calls of one client
//! - `Resilience` facade composing both

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use retry::{RetryConfig, RetryExecutor};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::Result;

/// Status of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitBreakerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Retry and circuit breaking applied together around one operation
#[derive(Debug, Clone)]
pub struct Resilience {
    retry: RetryExecutor,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl Default for Resilience {
    fn default() -> Self {
        Self::new(RetryConfig::default(), CircuitBreakerConfig::default())
    }
}

impl Resilience {
    pub fn new(retry_config: RetryConfig, circuit_breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            retry: RetryExecutor::new(retry_config),
            circuit_breaker: Arc::new(CircuitBreaker::new(circuit_breaker_config)),
        }
    }

    /// Execute an operation under retry, checking the breaker before every attempt
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let breaker = &self.circuit_breaker;
        let operation = &operation;
        self.retry
            .execute(move || async move {
                if let Err(err) = breaker.check() {
                    return Err(err);
                }
                match operation().await {
                    Ok(value) => {
                        breaker.record_success();
                        Ok(value)
                    }
                    Err(err) => {
                        // Caller mistakes (bad request, bad key) say nothing about upstream health
                        if err.is_retryable() {
                            breaker.record_failure();
                        }
                        Err(err)
                    }
                }
            })
            .await
    }

    pub fn circuit_breaker_status(&self) -> CircuitBreakerStatus {
        self.circuit_breaker.status()
    }

    pub fn reset_circuit_breaker(&self) {
        self.circuit_breaker.reset();
    }

    pub fn retry_config(&self) -> &RetryConfig {
        self.retry.config()
    }
}
