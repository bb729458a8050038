//! Circuit breaker guarding event processing.
//!
//! Closed until `threshold` consecutive-window failures, then open for
//! `timeout`; the first call at or after the deadline probes in half-open.
//! A half-open success closes the circuit, a half-open failure re-opens it
//! with a fresh deadline.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub threshold: u32,
    pub timeout: Duration,
}

/// Error result of a guarded call.
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// Short-circuited: the breaker is open and the deadline has not passed.
    #[error("circuit breaker is open")]
    Open,

    /// The underlying operation ran and failed.
    #[error("{0}")]
    Inner(E),
}

/// Closed/open/half-open circuit breaker.
///
/// Not internally synchronized; the processor keeps it behind a mutex.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    next_retry_time: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            next_retry_time: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Run `op` under the breaker.
    pub fn call<T, E>(&mut self, op: impl FnOnce() -> Result<T, E>) -> Result<T, CircuitError<E>> {
        self.call_at(Instant::now(), op)
    }

    pub fn call_at<T, E>(
        &mut self,
        now: Instant,
        op: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, CircuitError<E>> {
        if self.state == CircuitState::Open {
            match self.next_retry_time {
                Some(deadline) if now < deadline => return Err(CircuitError::Open),
                _ => {
                    info!("circuit breaker probing in half-open");
                    self.state = CircuitState::HalfOpen;
                }
            }
        }

        match op() {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure(now);
                Err(CircuitError::Inner(e))
            }
        }
    }

    /// Clear all state back to closed.
    pub fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.last_failure_time = None;
        self.next_retry_time = None;
    }

    fn on_success(&mut self) {
        if self.state == CircuitState::HalfOpen {
            info!("circuit breaker closing after half-open success");
        }
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.next_retry_time = None;
    }

    fn on_failure(&mut self, now: Instant) {
        self.failure_count += 1;
        self.last_failure_time = Some(now);

        match self.state {
            CircuitState::HalfOpen => {
                warn!("circuit breaker re-opening after half-open failure");
                self.trip(now);
            }
            CircuitState::Closed if self.failure_count >= self.config.threshold => {
                warn!(
                    failures = self.failure_count,
                    threshold = self.config.threshold,
                    "circuit breaker opening"
                );
                self.trip(now);
            }
            _ => {}
        }
    }

    fn trip(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.next_retry_time = Some(now + self.config.timeout);
        metrics::increment_counter!("railview_circuit_open_total");
    }
}
