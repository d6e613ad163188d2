//! Multi-phase signal generator
//!
//! Phases run in order and each one is a hard gate:
//! 1. trend bias on the trend timeframe
//! 2. confluence on the signal timeframe
//! 3. alignment of the candidate with the bias (then the position-state check)
//! 4. entry confirmation on the entry timeframe
//! 5. market condition filter

use tracing::{debug, info};

use crate::config::{MarketFilterConfig, StrategyConfig, TimeframeConfig};
use crate::data::{MarketQuote, Timeframe};
use crate::error::EngineError;
use crate::indicators::IndicatorSnapshot;
use crate::strategy::{
    MarketConditionFilter, Signal, SignalKind, SignalPhase, TrendBias, TrendVotes,
};
use crate::timeframe::MultiTimeframeManager;

/// Everything the generator looks at for one evaluation
#[derive(Debug, Clone, Default)]
pub struct SignalInputs {
    pub trend: Option<IndicatorSnapshot>,
    pub signal: Option<IndicatorSnapshot>,
    pub entry: Option<IndicatorSnapshot>,
    /// Whether a position is open for the symbol
    pub has_position: bool,
    pub quote: Option<MarketQuote>,
}

impl SignalInputs {
    /// Pull the role snapshots out of a manager
    pub fn from_manager(
        manager: &MultiTimeframeManager,
        roles: &TimeframeConfig,
        has_position: bool,
        quote: Option<MarketQuote>,
    ) -> Self {
        Self {
            trend: manager.snapshot(roles.trend),
            signal: manager.snapshot(roles.signal),
            entry: manager.snapshot(roles.entry),
            has_position,
            quote,
        }
    }
}

/// Counts of the three confluence conditions per direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Confluence {
    buy: usize,
    sell: usize,
}

/// Stateless apart from the last reason string
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    config: StrategyConfig,
    roles: TimeframeConfig,
    filter: MarketConditionFilter,
    last_reason: Option<String>,
}

impl SignalGenerator {
    pub fn new(
        config: StrategyConfig,
        roles: TimeframeConfig,
        market_filter: MarketFilterConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        roles.validate()?;
        Ok(Self {
            config,
            roles,
            filter: MarketConditionFilter::new(market_filter)?,
            last_reason: None,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Reason attached to the most recent evaluation
    pub fn last_reason(&self) -> Option<&str> {
        self.last_reason.as_deref()
    }

    /// Evaluate all phases and remember the reason
    pub fn generate(&mut self, inputs: &SignalInputs) -> Signal {
        let signal = self.evaluate(inputs);
        match signal.kind {
            SignalKind::None => debug!(reason = %signal.reason, "no signal"),
            kind => info!(signal = %kind, price = signal.price, reason = %signal.reason, "signal generated"),
        }
        self.last_reason = Some(signal.reason.clone());
        signal
    }

    fn evaluate(&self, inputs: &SignalInputs) -> Signal {
        let cfg = &self.config;

        let hourly = match inputs.signal.as_ref().filter(|s| s.ready) {
            Some(snapshot) => snapshot.clone(),
            None => {
                return Signal::rejected(
                    SignalPhase::Data,
                    format!("{} indicators not ready", self.roles.signal),
                    inputs.signal.iter().cloned().collect(),
                )
            }
        };
        let mut contributing = vec![hourly.clone()];

        // Phase 1: trend bias
        let bias = if cfg.use_trend_filter {
            match inputs.trend.as_ref().filter(|s| s.ready) {
                Some(daily) => {
                    contributing.push(daily.clone());
                    let votes = TrendVotes::count(daily, cfg);
                    let bias = votes.bias();
                    debug!(bias = %bias, votes = %votes, "trend bias");
                    if bias == TrendBias::Neutral && cfg.require_trend_confirmation {
                        return Signal::rejected(
                            SignalPhase::TrendBias,
                            format!("{} bias NEUTRAL ({}), trend confirmation required", self.roles.trend, votes),
                            contributing,
                        )
                        .with_trend_bias(Some(bias));
                    }
                    Some(bias)
                }
                None if cfg.require_trend_confirmation => {
                    return Signal::rejected(
                        SignalPhase::TrendBias,
                        format!("insufficient {} data for trend confirmation", self.roles.trend),
                        contributing,
                    )
                }
                None => Some(TrendBias::Neutral),
            }
        } else {
            None
        };

        // Phase 2: confluence
        let confluence = self.confluence(&hourly);
        let buy_ok = confluence.buy >= cfg.min_confluence;
        let sell_ok = confluence.sell >= cfg.min_confluence;
        let candidate = match (buy_ok, sell_ok) {
            (true, false) => SignalKind::Buy,
            (false, true) => SignalKind::Sell,
            (true, true) => {
                return Signal::rejected(
                    SignalPhase::Confluence,
                    format!(
                        "conflicting {} conditions (buy {}/3, sell {}/3)",
                        self.roles.signal, confluence.buy, confluence.sell
                    ),
                    contributing,
                )
                .with_trend_bias(bias)
            }
            (false, false) => {
                return Signal::rejected(
                    SignalPhase::Confluence,
                    format!(
                        "no {} candidate (buy {}/3, sell {}/3, need {})",
                        self.roles.signal, confluence.buy, confluence.sell, cfg.min_confluence
                    ),
                    contributing,
                )
                .with_trend_bias(bias)
            }
        };

        // Phase 3: alignment with the trend
        if let Some(bias) = bias {
            let aligned = match bias {
                TrendBias::Bullish => candidate == SignalKind::Buy,
                TrendBias::Bearish => candidate == SignalKind::Sell,
                TrendBias::Neutral => !cfg.require_trend_confirmation,
            };
            if !aligned {
                return Signal::rejected(
                    SignalPhase::Alignment,
                    format!("trend misalignment: {} bias {} vs {} candidate", self.roles.trend, bias, candidate),
                    contributing,
                )
                .with_trend_bias(Some(bias));
            }
        }

        match (candidate, inputs.has_position) {
            (SignalKind::Buy, true) => {
                return Signal::rejected(SignalPhase::Position, "position already open", contributing)
                    .with_trend_bias(bias)
            }
            (SignalKind::Sell, false) => {
                return Signal::rejected(SignalPhase::Position, "no open position to sell", contributing)
                    .with_trend_bias(bias)
            }
            _ => {}
        }

        // Phase 4: entry confirmation
        let entry = match inputs.entry.as_ref().filter(|s| s.ready) {
            Some(entry) => entry,
            None => {
                return Signal::rejected(
                    SignalPhase::EntryConfirmation,
                    format!("{} indicators not ready", self.roles.entry),
                    contributing,
                )
                .with_trend_bias(bias)
            }
        };
        contributing.push(entry.clone());
        let confirmed = match candidate {
            SignalKind::Buy => entry.rsi < cfg.entry_max_rsi && entry.macd_histogram >= 0.0,
            _ => entry.rsi > cfg.entry_min_rsi && entry.macd_histogram <= 0.0,
        };
        if !confirmed {
            return Signal::rejected(
                SignalPhase::EntryConfirmation,
                format!(
                    "{} {} not confirmed (RSI {:.2}, histogram {:.6})",
                    self.roles.entry, candidate, entry.rsi, entry.macd_histogram
                ),
                contributing,
            )
            .with_trend_bias(bias);
        }

        // Phase 5: market conditions
        let assessment = self.filter.assess(&hourly, inputs.quote);
        if !assessment.is_tradeable() {
            return Signal::rejected(SignalPhase::MarketFilter, assessment.reason(), contributing)
                .with_trend_bias(bias);
        }

        let confluence_count = if candidate == SignalKind::Buy { confluence.buy } else { confluence.sell };
        let reason = format!(
            "{} confirmed: {}/3 {} conditions, trend {}, {} RSI {:.2}, {}",
            candidate,
            confluence_count,
            self.roles.signal,
            bias.map_or_else(|| "filter off".to_string(), |b| b.to_string()),
            self.roles.entry,
            entry.rsi,
            assessment.reason()
        );
        Signal::new(candidate, reason, contributing).with_trend_bias(bias)
    }

    fn confluence(&self, snapshot: &IndicatorSnapshot) -> Confluence {
        let cfg = &self.config;
        let buy = [
            snapshot.rsi <= cfg.oversold,
            snapshot.macd_bullish(),
            snapshot.price <= snapshot.bb_lower * cfg.lower_band_tolerance,
        ];
        let sell = [
            snapshot.rsi >= cfg.overbought,
            snapshot.macd_bearish(),
            snapshot.price >= snapshot.bb_upper * cfg.upper_band_tolerance,
        ];
        Confluence {
            buy: buy.iter().filter(|c| **c).count(),
            sell: sell.iter().filter(|c| **c).count(),
        }
    }

    /// Timeframe whose close triggers an evaluation
    pub fn signal_timeframe(&self) -> Timeframe {
        self.roles.signal
    }
}
