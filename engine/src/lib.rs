//! Confluence engine: a real-time decision core that turns a stream of closed
//! price candles into risk-bounded trade signals.
//!
//! The crate is organised leaf-first:
//! - **Indicators**: streaming RSI, MACD and Bollinger Bands behind one [`Indicator`](indicators::Indicator) contract
//! - **Timeframes**: 1m candles folded into 5m/1h/1d candles, one indicator set per timeframe
//! - **Strategy**: five-phase multi-timeframe confirmation plus a market condition filter
//! - **Portfolio**: position sizing, stop-loss/take-profit and trailing stops
//! - **Safety**: circuit breaker, rate limiter, liquidity/position gating and retry with backoff
//!
//! The engine never opens network connections or touches storage. Candles come in through
//! [`TradingEngine::on_candle`](engine::TradingEngine::on_candle); orders go out as
//! [`OrderIntent`](engine::OrderIntent)s that the caller executes through
//! [`SafetyManager::execute_with_safety`](safety::SafetyManager::execute_with_safety).
//!
//! # Example
//!
//! ```no_run
//! use engine::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run(candles: Vec<Candle>) -> engine::Result<()> {
//! let config = EngineConfig::default();
//! let safety = Arc::new(SafetyManager::new(config.safety.clone())?);
//! let mut engine = TradingEngine::new("BTC/USDT", config)?;
//! let cancel = CancellationToken::new();
//!
//! for candle in candles {
//!     let outcome = engine.on_candle(&candle)?;
//!     for intent in outcome.intents {
//!         safety.check_trade_allowed(&intent.symbol, intent.quantity, intent.price, intent.side)?;
//!         let fill = safety
//!             .execute_with_safety(&cancel, |_attempt| async move { Ok(intent.price) })
//!             .await?;
//!         engine.confirm(&intent, fill, candle.close_time(), &safety)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod events;
pub mod indicators;
pub mod portfolio;
pub mod safety;
pub mod strategy;
pub mod timeframe;

// Re-export commonly used types
pub mod prelude {
    pub use crate::config::*;
    pub use crate::data::*;
    pub use crate::engine::*;
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::indicators::*;
    pub use crate::portfolio::*;
    pub use crate::safety::*;
    pub use crate::strategy::*;
    pub use crate::timeframe::*;

    pub use tokio_util::sync::CancellationToken;
}

/// Result type alias
pub type Result<T> = std::result::Result<T, error::EngineError>;
