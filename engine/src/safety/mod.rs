//! Safety layer
//!
//! Gates and protects order execution: circuit breaker, fixed-window rate limit,
//! liquidity and exposure limits, and retry with backoff. [`SafetyManager`] owns
//! the shared counters and is meant to be shared as `Arc<SafetyManager>` between
//! the candle pipeline and external triggers such as a daily rollover timer.

pub mod circuit_breaker;
pub mod limits;
pub mod rate_limiter;
pub mod recovery;

pub use circuit_breaker::*;
pub use limits::*;
pub use rate_limiter::*;
pub use recovery::*;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SafetyConfig;
use crate::data::{OrderBook, OrderSide};
use crate::error::EngineError;

/// Read-only view of the safety counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyStatus {
    pub circuit_state: CircuitState,
    pub consecutive_failures: u32,
    pub available_tokens: u32,
    pub daily_loss: f64,
    pub open_positions: usize,
}

#[derive(Debug, Default)]
struct Counters {
    exposure: Exposure,
    order_books: HashMap<String, OrderBook>,
}

/// Circuit breaker + rate limiter + gating + recovery
#[derive(Debug)]
pub struct SafetyManager {
    config: SafetyConfig,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
    recovery: RecoveryManager,
    counters: Mutex<Counters>,
}

impl SafetyManager {
    pub fn new(config: SafetyConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            breaker: CircuitBreaker::new(&config.circuit_breaker),
            limiter: RateLimiter::new(&config.rate_limit),
            recovery: RecoveryManager::new(config.retry.clone()),
            counters: Mutex::new(Counters::default()),
            config,
        })
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Decide whether a trade may be attempted now. Consumes nothing.
    ///
    /// Liquidity is checked against the last book supplied for `symbol` and skipped
    /// when there is none. Position limits apply to BUY orders only.
    pub fn check_trade_allowed(
        &self,
        symbol: &str,
        quantity: f64,
        price: f64,
        side: OrderSide,
    ) -> Result<(), EngineError> {
        if !(quantity.is_finite() && quantity > 0.0) || !(price.is_finite() && price > 0.0) {
            return Err(EngineError::invalid(format!(
                "trade for {} needs positive quantity and price (quantity={}, price={})",
                symbol, quantity, price
            )));
        }

        let result = self.check_gates(symbol, quantity, price, side);
        if let Err(err) = &result {
            warn!(symbol, side = %side, quantity, price, "Trade rejected: {}", err);
        }
        result
    }

    fn check_gates(&self, symbol: &str, quantity: f64, price: f64, side: OrderSide) -> Result<(), EngineError> {
        self.breaker.check()?;
        self.limiter.check()?;

        let counters = self.counters.lock();
        if self.config.liquidity.enabled {
            match counters.order_books.get(symbol) {
                Some(book) => check_liquidity(&self.config.liquidity, book, side, quantity)?,
                None => debug!(symbol, "no order book supplied, liquidity check skipped"),
            }
        }
        if side == OrderSide::Buy {
            check_position_limits(&self.config.position_limits, &counters.exposure, quantity, price)?;
        }
        Ok(())
    }

    /// Run `operation` as circuit-breaker(recovery(operation)). The breaker admits
    /// the call before a rate limit token is taken, and a denied token hands the
    /// admission back. Exhausted retries count as a single circuit failure.
    pub async fn execute_with_safety<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, EngineError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let permit = self.breaker.acquire()?;
        self.limiter.try_acquire()?;
        permit.run(self.recovery.execute(cancel, operation)).await
    }

    /// Count a newly opened position
    pub fn record_position_opened(&self) {
        let mut counters = self.counters.lock();
        counters.exposure.open_positions += 1;
        debug!(open_positions = counters.exposure.open_positions, "position opened");
    }

    /// Count a closed position and add any realized loss to the daily counter
    pub fn record_position_closed(&self, realized_pnl: f64) {
        let mut counters = self.counters.lock();
        counters.exposure.open_positions = counters.exposure.open_positions.saturating_sub(1);
        if realized_pnl < 0.0 {
            counters.exposure.daily_loss += -realized_pnl;
            if counters.exposure.daily_loss >= self.config.position_limits.max_daily_loss {
                warn!(
                    daily_loss = counters.exposure.daily_loss,
                    cap = self.config.position_limits.max_daily_loss,
                    "daily loss cap reached, new positions refused until reset"
                );
            }
        }
    }

    /// Clear the daily loss counter (day rollover)
    pub fn reset_daily(&self) {
        let mut counters = self.counters.lock();
        info!(daily_loss = counters.exposure.daily_loss, "resetting daily loss counter");
        counters.exposure.daily_loss = 0.0;
    }

    /// Latest order book for `symbol`
    pub fn update_order_book(&self, symbol: impl Into<String>, book: OrderBook) {
        self.counters.lock().order_books.insert(symbol.into(), book);
    }

    /// Portfolio value for the percent-of-portfolio cap
    pub fn set_portfolio_value(&self, value: f64) {
        if value.is_finite() && value > 0.0 {
            self.counters.lock().exposure.portfolio_value = Some(value);
        } else {
            warn!(value, "ignoring non-positive portfolio value");
        }
    }

    pub fn status(&self) -> SafetyStatus {
        let exposure = self.counters.lock().exposure;
        SafetyStatus {
            circuit_state: self.breaker.state(),
            consecutive_failures: self.breaker.consecutive_failures(),
            available_tokens: self.limiter.available_tokens(),
            daily_loss: exposure.daily_loss,
            open_positions: exposure.open_positions,
        }
    }
}
