//! Error taxonomy for the engine
//!
//! Configuration problems are fatal at construction. Everything else is a runtime
//! outcome the caller can act on: not enough data yet, a safety denial, or an
//! execution failure that survived the retry policy.

use std::time::Duration;
use thiserror::Error;

use crate::data::OrderSide;

/// Engine error
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid parameters supplied at construction
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed runtime input; the receiver's state is left unmodified
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Not enough data accumulated yet
    #[error("not ready: {0}")]
    NotReady(String),

    /// Trade denied by the safety layer
    #[error("trade rejected: {0}")]
    Rejected(#[from] SafetyRejection),

    /// The caller-supplied execution closure failed on every attempt
    #[error("execution failed after {attempts} attempt(s): {source:#}")]
    Execution {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// A stop signal aborted a pending attempt or backoff wait
    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    /// Shorthand for a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Shorthand for an invalid-input error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error is a safety denial
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Reason a candidate trade was denied by the safety layer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SafetyRejection {
    #[error("circuit breaker open, retry in {}ms", retry_in.as_millis())]
    CircuitOpen { retry_in: Duration },

    #[error("circuit breaker half-open, trial call already in flight")]
    HalfOpenBusy,

    #[error("rate limit reached ({capacity} calls per {}ms), window resets in {}ms", window.as_millis(), retry_in.as_millis())]
    RateLimited {
        capacity: u32,
        window: Duration,
        retry_in: Duration,
    },

    #[error("order book too thin on {side} side: {levels} levels < {min} required")]
    InsufficientDepth {
        side: &'static str,
        levels: usize,
        min: usize,
    },

    #[error("spread {spread_percent:.4}% exceeds maximum {max_percent:.4}%")]
    SpreadTooWide { spread_percent: f64, max_percent: f64 },

    #[error("opposite-side volume {available:.8} below minimum {min:.8}")]
    InsufficientVolume { available: f64, min: f64 },

    #[error("{side} quantity {quantity:.8} exceeds allowed {allowed:.8} of available liquidity")]
    QuantityExceedsLiquidity {
        side: OrderSide,
        quantity: f64,
        allowed: f64,
    },

    #[error("position value {value:.2} exceeds cap {cap:.2}")]
    PositionValueCap { value: f64, cap: f64 },

    #[error("position is {percent:.2}% of portfolio, cap is {cap_percent:.2}%")]
    PortfolioPercentCap { percent: f64, cap_percent: f64 },

    #[error("daily loss {loss:.2} reached cap {cap:.2}")]
    DailyLossCap { loss: f64, cap: f64 },

    #[error("{open} open positions, cap is {cap}")]
    MaxOpenPositions { open: usize, cap: usize },
}
