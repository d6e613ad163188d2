//! Circuit breaker guarding order execution
//!
//! ```text
//! CLOSED ──max_failures──> OPEN ──reset_timeout──> HALF_OPEN
//!   ^                       ^                        │
//!   └─────── success ───────┼──────── failure ───────┘
//! ```
//!
//! While OPEN, calls are refused without running the wrapped operation. The first
//! call after the timeout moves the breaker to HALF_OPEN and runs exactly once;
//! other calls are refused until that trial finishes.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;
use crate::error::{EngineError, SafetyRejection};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failing; calls rejected until the reset timeout passes
    Open,
    /// One trial call allowed
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        })
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerState {
    fn transition_to(&mut self, new_state: CircuitState) {
        if self.state != new_state {
            tracing::info!("Circuit breaker state transition: {} -> {}", self.state, new_state);
            self.state = new_state;
            if new_state == CircuitState::Closed {
                self.consecutive_failures = 0;
            }
        }
    }

    fn retry_in(&self, timeout: Duration, now: Instant) -> Duration {
        self.last_failure
            .map(|at| timeout.saturating_sub(now.saturating_duration_since(at)))
            .unwrap_or_default()
    }

    fn timeout_elapsed(&self, timeout: Duration, now: Instant) -> bool {
        self.last_failure
            .map_or(true, |at| now.saturating_duration_since(at) > timeout)
    }
}

/// Consecutive-failure circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    max_failures: u32,
    reset_timeout: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            max_failures: config.max_failures.max(1),
            reset_timeout: config.reset_timeout(),
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Current state, without applying the timeout
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    /// Whether a call would be admitted now. Does not change state.
    pub fn check(&self) -> Result<(), SafetyRejection> {
        self.check_at(Instant::now())
    }

    pub fn check_at(&self, now: Instant) -> Result<(), SafetyRejection> {
        let inner = self.state.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open if inner.timeout_elapsed(self.reset_timeout, now) => Ok(()),
            CircuitState::Open => Err(SafetyRejection::CircuitOpen {
                retry_in: inner.retry_in(self.reset_timeout, now),
            }),
            CircuitState::HalfOpen if inner.trial_in_flight => Err(SafetyRejection::HalfOpenBusy),
            CircuitState::HalfOpen => Ok(()),
        }
    }

    /// Admit a call, moving OPEN to HALF_OPEN once the timeout has passed
    pub fn try_acquire(&self) -> Result<(), SafetyRejection> {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> Result<(), SafetyRejection> {
        self.admit_at(now).map(|_| ())
    }

    /// Admit a call and hand back a permit that settles it. A permit dropped
    /// without an outcome frees the HALF_OPEN trial slot.
    pub fn acquire(&self) -> Result<CallPermit<'_>, SafetyRejection> {
        self.acquire_at(Instant::now())
    }

    pub fn acquire_at(&self, now: Instant) -> Result<CallPermit<'_>, SafetyRejection> {
        let trial = self.admit_at(now)?;
        Ok(CallPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    /// Returns whether the admitted call is the HALF_OPEN trial
    fn admit_at(&self, now: Instant) -> Result<bool, SafetyRejection> {
        let mut inner = self.state.lock();
        match inner.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open => {
                if !inner.timeout_elapsed(self.reset_timeout, now) {
                    return Err(SafetyRejection::CircuitOpen {
                        retry_in: inner.retry_in(self.reset_timeout, now),
                    });
                }
                inner.transition_to(CircuitState::HalfOpen);
                inner.trial_in_flight = true;
                Ok(true)
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(SafetyRejection::HalfOpenBusy);
                }
                inner.trial_in_flight = true;
                Ok(true)
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self.state.lock();
        inner.trial_in_flight = false;
        inner.consecutive_failures = 0;
        inner.transition_to(CircuitState::Closed);
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now())
    }

    pub fn record_failure_at(&self, now: Instant) {
        let mut inner = self.state.lock();
        inner.trial_in_flight = false;
        inner.consecutive_failures += 1;
        inner.last_failure = Some(now);
        match inner.state {
            CircuitState::HalfOpen => inner.transition_to(CircuitState::Open),
            CircuitState::Closed if inner.consecutive_failures >= self.max_failures => {
                tracing::warn!(
                    failures = inner.consecutive_failures,
                    "circuit breaker tripped after consecutive failures"
                );
                inner.transition_to(CircuitState::Open)
            }
            _ => {}
        }
    }

    /// Forget an admitted call that neither succeeded nor failed (cancelled)
    pub fn release(&self) {
        self.state.lock().trial_in_flight = false;
    }

    /// Run `operation` under the breaker. A cancelled operation does not count as
    /// a failure.
    pub async fn call<T, Fut>(&self, operation: Fut) -> Result<T, EngineError>
    where
        Fut: Future<Output = Result<T, EngineError>>,
    {
        self.acquire()?.run(operation).await
    }

    /// Back to CLOSED with no failures
    pub fn reset(&self) {
        let mut inner = self.state.lock();
        inner.transition_to(CircuitState::Closed);
        inner.consecutive_failures = 0;
        inner.last_failure = None;
        inner.trial_in_flight = false;
    }
}

/// An admitted call. Settle it with [`CallPermit::succeed`] or
/// [`CallPermit::fail`]; dropping it unsettled counts as neither.
#[derive(Debug)]
#[must_use = "dropping the permit releases the admitted call"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CallPermit<'_> {
    /// Whether this call is the single HALF_OPEN trial
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }

    /// Await `operation` and settle the permit from its result. If the returned
    /// future is dropped before completion the permit is released.
    pub async fn run<T, Fut>(self, operation: Fut) -> Result<T, EngineError>
    where
        Fut: Future<Output = Result<T, EngineError>>,
    {
        match operation.await {
            Ok(value) => {
                self.succeed();
                Ok(value)
            }
            // released on drop
            Err(EngineError::Cancelled) => Err(EngineError::Cancelled),
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            tracing::debug!("half-open trial abandoned, releasing slot");
            self.breaker.release();
        }
    }
}
