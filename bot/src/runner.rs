//! Candle feed loop: one pipeline, paper execution through the safety layer

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use engine::prelude::*;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// One closed candle as delivered by the market-data feed
#[derive(Debug, Deserialize)]
pub struct FeedCandle {
    pub symbol: String,
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl FeedCandle {
    pub fn into_candle(self, timeframe: Timeframe) -> Candle {
        Candle::new(
            self.symbol,
            timeframe,
            self.open_time,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )
    }
}

/// Fills orders at the reference price moved against us by a fixed slippage
#[derive(Debug, Clone, Copy)]
pub struct PaperExecutor {
    slippage_percent: f64,
}

impl PaperExecutor {
    pub fn new(slippage_percent: f64) -> Self {
        Self {
            slippage_percent: slippage_percent.max(0.0),
        }
    }

    pub fn fill_price(&self, side: OrderSide, price: f64) -> f64 {
        let slip = self.slippage_percent / 100.0;
        match side {
            OrderSide::Buy => price * (1.0 + slip),
            OrderSide::Sell => price * (1.0 - slip),
        }
    }
}

/// Counters reported at shutdown
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub candles: usize,
    pub skipped: usize,
    pub fills: usize,
    pub rejections: usize,
}

pub struct Runner<'a> {
    engine: &'a mut TradingEngine,
    safety: &'a SafetyManager,
    executor: PaperExecutor,
    cancel: CancellationToken,
    summary: RunSummary,
}

impl<'a> Runner<'a> {
    pub fn new(
        engine: &'a mut TradingEngine,
        safety: &'a SafetyManager,
        executor: PaperExecutor,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            engine,
            safety,
            executor,
            cancel,
            summary: RunSummary::default(),
        }
    }

    /// Consume newline-delimited JSON candles until EOF or cancellation, writing
    /// every engine event to `out` as one JSON line
    pub async fn run<R, W>(mut self, input: R, mut out: W) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let base = self.engine.config().timeframes.base;
        let mut lines = input.lines();
        loop {
            let line = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Shutdown requested, stopping candle feed");
                    break;
                }
                line = lines.next_line() => line.context("Failed to read candle feed")?,
            };
            let Some(line) = line else {
                info!("Candle feed closed");
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let candle = match serde_json::from_str::<FeedCandle>(line) {
                Ok(feed) => feed.into_candle(base),
                Err(err) => {
                    warn!("Skipping malformed candle line: {}", err);
                    self.summary.skipped += 1;
                    continue;
                }
            };
            self.process(&candle).await?;

            for event in self.engine.drain_events() {
                let mut json = serde_json::to_vec(&event).context("Failed to encode event")?;
                json.push(b'\n');
                out.write_all(&json).await.context("Failed to write event")?;
            }
        }
        out.flush().await.context("Failed to flush events")?;
        Ok(self.summary)
    }

    async fn process(&mut self, candle: &Candle) -> Result<()> {
        let outcome = match self.engine.on_candle(candle) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(symbol = %candle.symbol, open_time = %candle.open_time, "Candle rejected: {}", err);
                self.summary.skipped += 1;
                return Ok(());
            }
        };
        self.summary.candles += 1;
        if let Some(signal) = &outcome.signal {
            debug!(signal = %signal.kind, reason = %signal.reason, "signal evaluated");
        }

        for intent in outcome.intents {
            self.execute(&intent, candle.close_time()).await?;
        }
        Ok(())
    }

    async fn execute(&mut self, intent: &OrderIntent, time: DateTime<Utc>) -> Result<()> {
        if let Err(err) = self
            .safety
            .check_trade_allowed(&intent.symbol, intent.quantity, intent.price, intent.side)
        {
            self.engine.record_rejection(intent, &err);
            self.summary.rejections += 1;
            return Ok(());
        }

        let fill = self.executor.fill_price(intent.side, intent.price);
        let result = self
            .safety
            .execute_with_safety(&self.cancel, |attempt| async move {
                debug!(attempt, fill, "paper order filled");
                Ok(fill)
            })
            .await;

        match result {
            Ok(fill) => {
                self.engine
                    .confirm(intent, fill, time, self.safety)
                    .context("Failed to commit fill")?;
                self.summary.fills += 1;
                info!(side = %intent.side, quantity = intent.quantity, fill, "order executed");
            }
            Err(EngineError::Cancelled) => info!(side = %intent.side, "order cancelled by shutdown"),
            Err(err) => {
                self.engine.record_rejection(intent, &err);
                self.summary.rejections += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(minute: i64, close: f64) -> String {
        let open_time = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 6, 1, 0, 0, 0).unwrap()
            + chrono::Duration::minutes(minute);
        serde_json::json!({
            "symbol": "BTC/USDT",
            "open_time": open_time,
            "open": close,
            "high": close + 1.0,
            "low": close - 1.0,
            "close": close,
            "volume": 3.0,
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_feed_produces_events_and_skips_bad_lines() {
        let config = EngineConfig::default();
        let safety = SafetyManager::new(config.safety.clone()).unwrap();
        let mut engine = TradingEngine::new("BTC/USDT", config).unwrap();

        let mut input = String::new();
        for minute in 0..10 {
            input.push_str(&line(minute, 100.0 + minute as f64));
            input.push('\n');
        }
        input.push_str("not json\n\n");
        input.push_str(&line(3, 100.0));
        input.push('\n');

        let mut out = Vec::new();
        let summary = Runner::new(&mut engine, &safety, PaperExecutor::new(0.0), CancellationToken::new())
            .run(input.as_bytes(), &mut out)
            .await
            .unwrap();

        assert_eq!(summary.candles, 10);
        assert_eq!(summary.skipped, 2);
        let events: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        // two 5m candles closed
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e["type"] == "candle_closed"));
    }

    #[tokio::test]
    async fn test_cancelled_runner_stops_immediately() {
        let config = EngineConfig::default();
        let safety = SafetyManager::new(config.safety.clone()).unwrap();
        let mut engine = TradingEngine::new("BTC/USDT", config).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let input = format!("{}\n", line(0, 100.0));
        let summary = Runner::new(&mut engine, &safety, PaperExecutor::new(0.0), cancel)
            .run(input.as_bytes(), Vec::new())
            .await
            .unwrap();
        assert_eq!(summary, RunSummary::default());
    }

    #[test]
    fn test_slippage_is_adverse() {
        let executor = PaperExecutor::new(0.1);
        assert!((executor.fill_price(OrderSide::Buy, 100.0) - 100.1).abs() < 1e-9);
        assert!((executor.fill_price(OrderSide::Sell, 100.0) - 99.9).abs() < 1e-9);
    }
}
