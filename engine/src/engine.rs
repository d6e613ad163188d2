//! Per-symbol trading pipeline
//!
//! Each closed base candle flows through aggregation, indicators, exit checks and,
//! when the signal timeframe closes, the signal generator and risk sizing. The
//! result is a list of [`OrderIntent`]s; nothing changes position state until the
//! caller confirms a fill.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::data::{Candle, MarketQuote, OrderSide, RingBuffer, Timeframe};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventQueue};
use crate::indicators::IndicatorSnapshot;
use crate::portfolio::{ClosedPosition, ExitReason, Position, PositionSizing, RiskManager};
use crate::safety::SafetyManager;
use crate::strategy::{Signal, SignalGenerator, SignalInputs, SignalKind};
use crate::timeframe::MultiTimeframeManager;
use crate::Result;

/// An order the caller should place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    /// Reference price the intent was computed at
    pub price: f64,
    pub reason: String,
    /// Set for SELL intents
    pub exit_reason: Option<ExitReason>,
    /// Set for BUY intents
    pub sizing: Option<PositionSizing>,
    pub created_at: DateTime<Utc>,
}

/// What one base candle produced
#[derive(Debug, Clone, Default)]
pub struct CycleOutcome {
    /// Timeframe candles that closed, shortest timeframe first
    pub closed: Vec<Candle>,
    /// Present when the signal timeframe closed
    pub signal: Option<Signal>,
    pub exit: Option<ExitReason>,
    pub intents: Vec<OrderIntent>,
}

/// Single-symbol pipeline. Candle delivery must be serialized by the caller.
#[derive(Debug)]
pub struct TradingEngine {
    symbol: String,
    config: EngineConfig,
    manager: MultiTimeframeManager,
    generator: SignalGenerator,
    risk: RiskManager,
    position: Option<Position>,
    last_signal: Option<Signal>,
    quote: Option<MarketQuote>,
    portfolio_value: Option<f64>,
    events: EventQueue,
}

impl TradingEngine {
    pub fn new(symbol: impl Into<String>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let symbol = symbol.into();
        let manager = MultiTimeframeManager::new(symbol.clone(), &config.timeframes, &config.indicators)?;
        let generator = SignalGenerator::new(
            config.strategy.clone(),
            config.timeframes.clone(),
            config.market_filter.clone(),
        )?;
        let risk = RiskManager::new(config.risk.clone())?;
        info!(symbol = %symbol, signal_timeframe = %config.timeframes.signal, "trading engine created");
        Ok(Self {
            symbol,
            config,
            manager,
            generator,
            risk,
            position: None,
            last_signal: None,
            quote: None,
            portfolio_value: None,
            events: EventQueue::default(),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process one closed base candle. A rejected candle leaves all state as it was.
    pub fn on_candle(&mut self, candle: &Candle) -> Result<CycleOutcome> {
        let closed = self.manager.on_base_candle(candle)?;
        let mut outcome = CycleOutcome::default();

        for aggregate in &closed {
            self.events.push(EngineEvent::CandleClosed {
                candle: aggregate.clone(),
            });
        }

        if let Some(position) = self.position.as_mut() {
            if let Some(reason) = self.risk.check_exit(position, candle.close) {
                self.events.push(EngineEvent::ExitTriggered {
                    symbol: self.symbol.clone(),
                    reason,
                    price: candle.close,
                    time: candle.close_time(),
                });
                outcome.exit = Some(reason);
                outcome.intents.push(OrderIntent {
                    symbol: self.symbol.clone(),
                    side: OrderSide::Sell,
                    quantity: position.quantity,
                    price: candle.close,
                    reason: format!("{} at {}", reason, candle.close),
                    exit_reason: Some(reason),
                    sizing: None,
                    created_at: candle.close_time(),
                });
            }
        }

        let signal_tf = self.generator.signal_timeframe();
        if closed.iter().any(|c| c.timeframe == signal_tf) {
            let signal = self.generate_signal();
            if outcome.exit.is_none() {
                if let Some(intent) = self.intent_for(&signal, candle.close_time()) {
                    outcome.intents.push(intent);
                }
            }
            outcome.signal = Some(signal);
        }

        outcome.closed = closed;
        Ok(outcome)
    }

    /// Evaluate the signal generator over the latest snapshots
    pub fn generate_signal(&mut self) -> Signal {
        let inputs = SignalInputs::from_manager(
            &self.manager,
            &self.config.timeframes,
            self.position.is_some(),
            self.quote,
        );
        let signal = self.generator.generate(&inputs);
        self.events.push(EngineEvent::SignalEvaluated { signal: signal.clone() });
        self.last_signal = Some(signal.clone());
        signal
    }

    fn intent_for(&mut self, signal: &Signal, time: DateTime<Utc>) -> Option<OrderIntent> {
        match signal.kind {
            SignalKind::None => None,
            SignalKind::Buy => match self.size_entry(signal.price) {
                Ok(sizing) => Some(OrderIntent {
                    symbol: self.symbol.clone(),
                    side: OrderSide::Buy,
                    quantity: sizing.quantity,
                    price: signal.price,
                    reason: signal.reason.clone(),
                    exit_reason: None,
                    sizing: Some(sizing),
                    created_at: time,
                }),
                Err(err) => {
                    warn!(symbol = %self.symbol, "BUY signal dropped, sizing failed: {}", err);
                    self.events.push(EngineEvent::TradeRejected {
                        symbol: self.symbol.clone(),
                        side: OrderSide::Buy,
                        reason: err.to_string(),
                    });
                    None
                }
            },
            SignalKind::Sell => self.position.as_ref().map(|position| OrderIntent {
                symbol: self.symbol.clone(),
                side: OrderSide::Sell,
                quantity: position.quantity,
                price: signal.price,
                reason: signal.reason.clone(),
                exit_reason: Some(ExitReason::Signal),
                sizing: None,
                created_at: time,
            }),
        }
    }

    fn size_entry(&self, price: f64) -> Result<PositionSizing> {
        let portfolio_value = self
            .portfolio_value
            .ok_or_else(|| EngineError::NotReady("portfolio value not set".to_string()))?;
        let atr = self
            .manager
            .snapshot(self.config.timeframes.signal)
            .and_then(|s| s.atr);
        self.risk.calculate_position_size(portfolio_value, price, atr)
    }

    /// Latest best bid/ask, used by the spread check
    pub fn set_market_quote(&mut self, bid: f64, ask: f64) -> Result<()> {
        self.quote = Some(MarketQuote::new(bid, ask)?);
        Ok(())
    }

    /// Portfolio value used for position sizing
    pub fn set_portfolio_value(&mut self, value: f64) -> Result<()> {
        if !(value.is_finite() && value > 0.0) {
            return Err(EngineError::invalid(format!("portfolio value must be positive, got {}", value)));
        }
        self.portfolio_value = Some(value);
        Ok(())
    }

    /// Open the position for a filled BUY intent. Stop and target keep the
    /// distances sized for the intent, measured from the fill.
    pub fn confirm_entry(&mut self, intent: &OrderIntent, fill_price: f64, time: DateTime<Utc>) -> Result<Position> {
        if intent.side != OrderSide::Buy {
            return Err(EngineError::invalid("confirm_entry needs a BUY intent"));
        }
        if self.position.is_some() {
            return Err(EngineError::invalid(format!("{} already has an open position", self.symbol)));
        }
        if !(fill_price.is_finite() && fill_price > 0.0) {
            return Err(EngineError::invalid(format!("fill price must be positive, got {}", fill_price)));
        }

        let (stop, target) = match &intent.sizing {
            Some(sizing) => (
                fill_price - (sizing.entry_price - sizing.stop_loss_price),
                fill_price + (sizing.take_profit_price - sizing.entry_price),
            ),
            None => {
                let atr = self.manager.snapshot(self.config.timeframes.signal).and_then(|s| s.atr);
                let stop = self.risk.stop_loss_price(fill_price, atr)?;
                (stop, self.risk.take_profit_price(fill_price, stop))
            }
        };
        let position = Position::new(self.symbol.clone(), intent.quantity, fill_price, time, stop, target)?;
        info!(
            symbol = %self.symbol,
            quantity = position.quantity,
            entry = fill_price,
            stop_loss = stop,
            take_profit = target,
            "position opened"
        );
        self.events.push(EngineEvent::PositionOpened {
            position: position.clone(),
        });
        self.position = Some(position.clone());
        Ok(position)
    }

    /// Close the open position at `fill_price`
    pub fn confirm_exit(&mut self, fill_price: f64, reason: ExitReason, time: DateTime<Utc>) -> Result<ClosedPosition> {
        if !(fill_price.is_finite() && fill_price > 0.0) {
            return Err(EngineError::invalid(format!("fill price must be positive, got {}", fill_price)));
        }
        let position = self
            .position
            .take()
            .ok_or_else(|| EngineError::invalid(format!("{} has no open position", self.symbol)))?;
        let closed = ClosedPosition::new(position, fill_price, time, reason);
        info!(
            symbol = %self.symbol,
            exit = fill_price,
            reason = %reason,
            pnl = closed.realized_pnl,
            "position closed"
        );
        self.events.push(EngineEvent::PositionClosed { closed: closed.clone() });
        Ok(closed)
    }

    /// Commit a filled intent and update the shared safety counters
    pub fn confirm(
        &mut self,
        intent: &OrderIntent,
        fill_price: f64,
        time: DateTime<Utc>,
        safety: &SafetyManager,
    ) -> Result<()> {
        match intent.side {
            OrderSide::Buy => {
                self.confirm_entry(intent, fill_price, time)?;
                safety.record_position_opened();
            }
            OrderSide::Sell => {
                let reason = intent.exit_reason.unwrap_or(ExitReason::Signal);
                let closed = self.confirm_exit(fill_price, reason, time)?;
                safety.record_position_closed(closed.realized_pnl);
            }
        }
        Ok(())
    }

    /// Record that an intent was not executed
    pub fn record_rejection(&mut self, intent: &OrderIntent, error: &EngineError) {
        warn!(symbol = %self.symbol, side = %intent.side, "order intent not executed: {}", error);
        self.events.push(EngineEvent::TradeRejected {
            symbol: intent.symbol.clone(),
            side: intent.side,
            reason: error.to_string(),
        });
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn last_signal(&self) -> Option<&Signal> {
        self.last_signal.as_ref()
    }

    pub fn last_reason(&self) -> Option<&str> {
        self.generator.last_reason()
    }

    pub fn snapshot(&self, timeframe: Timeframe) -> Option<IndicatorSnapshot> {
        self.manager.snapshot(timeframe)
    }

    pub fn history(&self, timeframe: Timeframe) -> Option<&RingBuffer<Candle>> {
        self.manager.history(timeframe)
    }

    pub fn timeframes(&self) -> &MultiTimeframeManager {
        &self.manager
    }

    /// Take every queued event, oldest first
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain()
    }
}
