//! Multi-timeframe manager

use std::collections::BTreeMap;

use crate::config::{IndicatorConfig, TimeframeConfig};
use crate::data::{Candle, RingBuffer, Timeframe};
use crate::error::EngineError;
use crate::indicators::{IndicatorSet, IndicatorSnapshot};
use crate::timeframe::TimeframeAggregator;

/// Aggregator, indicators and bounded raw history for one timeframe
#[derive(Debug)]
struct TimeframeState {
    aggregator: TimeframeAggregator,
    indicators: IndicatorSet,
    history: RingBuffer<Candle>,
}

/// Owns one aggregator + indicator set pair per tracked timeframe of a symbol
#[derive(Debug)]
pub struct MultiTimeframeManager {
    symbol: String,
    base: Timeframe,
    timeframes: BTreeMap<Timeframe, TimeframeState>,
}

impl MultiTimeframeManager {
    pub fn new(
        symbol: impl Into<String>,
        timeframes: &TimeframeConfig,
        indicators: &IndicatorConfig,
    ) -> Result<Self, EngineError> {
        timeframes.validate()?;
        let symbol = symbol.into();
        let mut states = BTreeMap::new();
        for tf in timeframes.tracked() {
            states.insert(
                tf,
                TimeframeState {
                    aggregator: TimeframeAggregator::new(symbol.clone(), timeframes.base, tf)?,
                    indicators: IndicatorSet::new(tf, indicators)?,
                    history: RingBuffer::new(timeframes.history_capacity),
                },
            );
        }
        tracing::debug!(symbol = %symbol, timeframes = ?states.keys().collect::<Vec<_>>(), "timeframe manager created");
        Ok(Self {
            symbol,
            base: timeframes.base,
            timeframes: states,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Timeframe of the incoming stream
    pub fn base(&self) -> Timeframe {
        self.base
    }

    /// Tracked timeframes, shortest first
    pub fn timeframes(&self) -> impl Iterator<Item = Timeframe> + '_ {
        self.timeframes.keys().copied()
    }

    /// Fold a closed base candle into every timeframe.
    ///
    /// Returns the timeframe candles that closed, shortest timeframe first. A
    /// rejected candle leaves every timeframe untouched.
    pub fn on_base_candle(&mut self, candle: &Candle) -> Result<Vec<Candle>, EngineError> {
        for state in self.timeframes.values() {
            state.aggregator.check(candle)?;
        }

        let mut closed = Vec::new();
        for (tf, state) in self.timeframes.iter_mut() {
            for aggregate in state.aggregator.push(candle)? {
                state.indicators.update_candle(&aggregate)?;
                if state.history.push(aggregate.clone()).is_some() {
                    tracing::trace!(symbol = %self.symbol, timeframe = %tf, "history full, evicted oldest candle");
                }
                tracing::debug!(
                    symbol = %self.symbol,
                    timeframe = %tf,
                    open_time = %aggregate.open_time,
                    close = aggregate.close,
                    ready = state.indicators.snapshot().ready,
                    "candle closed"
                );
                closed.push(aggregate);
            }
        }
        Ok(closed)
    }

    /// Latest indicator readings for `timeframe`
    pub fn snapshot(&self, timeframe: Timeframe) -> Option<IndicatorSnapshot> {
        self.timeframes.get(&timeframe).map(|s| s.indicators.snapshot())
    }

    /// Snapshots of every tracked timeframe
    pub fn snapshots(&self) -> BTreeMap<Timeframe, IndicatorSnapshot> {
        self.timeframes
            .iter()
            .map(|(tf, s)| (*tf, s.indicators.snapshot()))
            .collect()
    }

    /// Whether `timeframe` has enough closed candles for all indicators
    pub fn is_ready(&self, timeframe: Timeframe) -> bool {
        self.snapshot(timeframe).map_or(false, |s| s.ready)
    }

    /// Closed candles retained for `timeframe`, oldest first
    pub fn history(&self, timeframe: Timeframe) -> Option<&RingBuffer<Candle>> {
        self.timeframes.get(&timeframe).map(|s| &s.history)
    }

    /// Most recent closed candle of `timeframe`
    pub fn latest(&self, timeframe: Timeframe) -> Option<&Candle> {
        self.history(timeframe)?.last()
    }

    /// The still-open aggregate of `timeframe`
    pub fn partial(&self, timeframe: Timeframe) -> Option<&Candle> {
        self.timeframes.get(&timeframe)?.aggregator.partial()
    }

    /// Clear every aggregator, indicator and history buffer
    pub fn reset(&mut self) {
        for state in self.timeframes.values_mut() {
            state.aggregator.reset();
            crate::indicators::Indicator::reset(&mut state.indicators);
            state.history.clear();
        }
        tracing::info!(symbol = %self.symbol, "timeframe manager reset");
    }
}
