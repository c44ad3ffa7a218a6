//! Circuit breaker that stops hammering an upstream which keeps failing
//!
//! A long classification run issues hundreds of calls; once the provider is
//! clearly down, further calls fail fast until `reset_timeout` elapses.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Result, ServiceError};

use super::CircuitBreakerStatus;

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive retryable failures before the circuit opens
    pub failure_threshold: usize,

    /// How long the circuit stays open before letting a trial call through
    pub reset_timeout: Duration,

    /// Successful trial calls needed to close the circuit again
    pub success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 10,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

#[derive(Debug)]
struct State {
    status: CircuitBreakerStatus,
    opened_at: Option<Instant>,
    failures: usize,
    successes: usize,
}

/// A thread-safe circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<State>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Mutex::new(State {
                status: CircuitBreakerStatus::Closed,
                opened_at: None,
                failures: 0,
                successes: 0,
            }),
            config,
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Check whether a request may go through
    pub fn check(&self) -> Result<()> {
        let reset_timeout = self.config.reset_timeout;
        self.with_state(|state| match state.status {
            CircuitBreakerStatus::Closed | CircuitBreakerStatus::HalfOpen => Ok(()),
            CircuitBreakerStatus::Open => {
                let elapsed = state.opened_at.map(|at| at.elapsed()).unwrap_or(reset_timeout);
                if elapsed >= reset_timeout {
                    log::info!("circuit half-open, allowing a trial request");
                    state.status = CircuitBreakerStatus::HalfOpen;
                    state.successes = 0;
                    Ok(())
                } else {
                    Err(ServiceError::circuit_broken(format!(
                        "upstream failing, retry in {}s",
                        (reset_timeout - elapsed).as_secs()
                    )))
                }
            }
        })
    }

    pub fn record_success(&self) {
        let success_threshold = self.config.success_threshold;
        self.with_state(|state| match state.status {
            CircuitBreakerStatus::Closed => state.failures = 0,
            CircuitBreakerStatus::HalfOpen => {
                state.successes += 1;
                if state.successes >= success_threshold {
                    log::info!("circuit closed");
                    state.status = CircuitBreakerStatus::Closed;
                    state.opened_at = None;
                    state.failures = 0;
                    state.successes = 0;
                }
            }
            CircuitBreakerStatus::Open => {}
        })
    }

    pub fn record_failure(&self) {
        let failure_threshold = self.config.failure_threshold;
        self.with_state(|state| {
            let open = match state.status {
                CircuitBreakerStatus::Closed => {
                    state.failures += 1;
                    state.failures >= failure_threshold
                }
                CircuitBreakerStatus::HalfOpen => true,
                CircuitBreakerStatus::Open => false,
            };
            if open {
                log::warn!("circuit opened after {} consecutive failures", state.failures);
                state.status = CircuitBreakerStatus::Open;
                state.opened_at = Some(Instant::now());
                state.successes = 0;
            }
        })
    }

    pub fn reset(&self) {
        self.with_state(|state| {
            state.status = CircuitBreakerStatus::Closed;
            state.opened_at = None;
            state.failures = 0;
            state.successes = 0;
        })
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        self.with_state(|state| state.status)
    }
}
