//! Per-timeframe indicator bundle

use chrono::{DateTime, Utc};
use ta::indicators::{AverageTrueRange, SimpleMovingAverage};
use ta::Next;

use crate::config::IndicatorConfig;
use crate::data::{Candle, Timeframe};
use crate::error::EngineError;
use crate::indicators::{
    check_price, BollingerBands, Indicator, IndicatorSnapshot, IndicatorValues, Macd, Rsi,
};

/// RSI, MACD and Bollinger Bands for one timeframe, plus ATR and average volume
/// when fed whole candles.
#[derive(Debug)]
pub struct IndicatorSet {
    timeframe: Timeframe,
    rsi: Rsi,
    macd: Macd,
    bands: BollingerBands,
    atr: AverageTrueRange,
    atr_period: usize,
    volume_sma: SimpleMovingAverage,
    volume_period: usize,
    candle_count: usize,
    last_atr: Option<f64>,
    last_average_volume: Option<f64>,
    last_price: Option<f64>,
    last_volume: f64,
    last_update: Option<DateTime<Utc>>,
    ready: bool,
}

impl IndicatorSet {
    /// Create the indicator set for `timeframe`
    pub fn new(timeframe: Timeframe, config: &IndicatorConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            timeframe,
            rsi: Rsi::new(config.rsi_period)?,
            macd: Macd::new(config.macd_fast, config.macd_slow, config.macd_signal)?,
            bands: BollingerBands::new(config.bb_period, config.bb_std_dev)?,
            atr: AverageTrueRange::new(config.atr_period)
                .map_err(|e| EngineError::config(format!("Failed to create ATR: {}", e)))?,
            atr_period: config.atr_period,
            volume_sma: SimpleMovingAverage::new(config.volume_period)
                .map_err(|e| EngineError::config(format!("Failed to create volume SMA: {}", e)))?,
            volume_period: config.volume_period,
            candle_count: 0,
            last_atr: None,
            last_average_volume: None,
            last_price: None,
            last_volume: 0.0,
            last_update: None,
            ready: false,
        })
    }

    /// Timeframe this set tracks
    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Feed a closed candle: its close drives RSI/MACD/bands, the whole bar drives
    /// ATR and the volume average. Invalid candles leave every calculator untouched.
    pub fn update_candle(&mut self, candle: &Candle) -> Result<(), EngineError> {
        candle.validate()?;
        self.update(candle.close, candle.close_time())?;

        let atr = self.atr.next(candle);
        let average_volume = self.volume_sma.next(candle.volume);
        self.candle_count += 1;
        self.last_volume = candle.volume;
        if self.candle_count >= self.atr_period {
            self.last_atr = Some(atr);
        }
        if self.candle_count >= self.volume_period {
            self.last_average_volume = Some(average_volume);
        }
        Ok(())
    }

    /// Current readings
    pub fn snapshot(&self) -> IndicatorSnapshot {
        let mut snapshot = IndicatorSnapshot::empty(self.timeframe);
        snapshot.timestamp = self.last_update;
        snapshot.price = self.last_price.unwrap_or_default();
        snapshot.volume = self.last_volume;
        snapshot.atr = self.last_atr;
        snapshot.average_volume = self.last_average_volume;
        snapshot.ready = self.ready;

        if let Some(rsi) = self.rsi.rsi() {
            snapshot.rsi = rsi;
        }
        if let Some(macd) = self.macd.output() {
            snapshot.macd = macd.macd;
            snapshot.macd_signal = macd.signal;
            snapshot.macd_histogram = macd.histogram;
        }
        if let Some(bands) = self.bands.output() {
            snapshot.bb_upper = bands.upper;
            snapshot.bb_middle = bands.middle;
            snapshot.bb_lower = bands.lower;
            snapshot.band_width_percent = bands.band_width_percent;
            snapshot.percent_b = bands.percent_b;
        }
        snapshot
    }

    /// Latest ATR, once `atr_period` candles have been seen
    pub fn atr(&self) -> Option<f64> {
        self.last_atr
    }
}

impl Indicator for IndicatorSet {
    fn name(&self) -> &str {
        "IndicatorSet"
    }

    fn update(&mut self, price: f64, timestamp: DateTime<Utc>) -> Result<(), EngineError> {
        // Validate once up front so a bad price cannot leave the calculators out of step
        check_price(self.name(), price)?;
        self.rsi.update(price, timestamp)?;
        self.macd.update(price, timestamp)?;
        self.bands.update(price, timestamp)?;
        self.last_price = Some(price);
        self.last_update = Some(timestamp);
        if !self.ready && self.rsi.is_ready() && self.macd.is_ready() && self.bands.is_ready() {
            self.ready = true;
            tracing::debug!(timeframe = %self.timeframe, "indicator set ready");
        }
        Ok(())
    }

    fn value(&self) -> (IndicatorValues, bool) {
        let mut values = IndicatorValues::new();
        if let Some(rsi) = self.rsi.rsi() {
            values.insert("rsi", rsi);
        }
        if let Some(macd) = self.macd.output() {
            values.insert("macd", macd.macd);
            values.insert("macd_signal", macd.signal);
            values.insert("macd_histogram", macd.histogram);
        }
        if let Some(bands) = self.bands.output() {
            values.insert("bb_upper", bands.upper);
            values.insert("bb_middle", bands.middle);
            values.insert("bb_lower", bands.lower);
            values.insert("band_width_percent", bands.band_width_percent);
            values.insert("percent_b", bands.percent_b);
        }
        if let Some(atr) = self.last_atr {
            values.insert("atr", atr);
        }
        (values, self.ready)
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn reset(&mut self) {
        self.rsi.reset();
        self.macd.reset();
        self.bands.reset();
        ta::Reset::reset(&mut self.atr);
        ta::Reset::reset(&mut self.volume_sma);
        self.candle_count = 0;
        self.last_atr = None;
        self.last_average_volume = None;
        self.last_price = None;
        self.last_volume = 0.0;
        self.last_update = None;
        self.ready = false;
    }

    fn data_count(&self) -> usize {
        self.rsi.data_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn small_config() -> IndicatorConfig {
        IndicatorConfig {
            rsi_period: 3,
            macd_fast: 2,
            macd_slow: 4,
            macd_signal: 2,
            bb_period: 4,
            bb_std_dev: 2.0,
            atr_period: 3,
            volume_period: 3,
        }
    }

    fn candle(i: i64, close: f64, volume: f64) -> Candle {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Candle::new(
            "ETH/USDT",
            Timeframe::OneHour,
            t0 + Duration::hours(i),
            close,
            close + 1.0,
            close - 1.0,
            close,
            volume,
        )
    }

    #[test]
    fn test_ready_once_all_components_ready() {
        let mut set = IndicatorSet::new(Timeframe::OneHour, &small_config()).unwrap();
        for i in 0..5 {
            set.update_candle(&candle(i, 100.0 + i as f64, 10.0)).unwrap();
        }
        // MACD needs slow + signal = 6
        assert!(!set.is_ready());
        set.update_candle(&candle(5, 99.0, 10.0)).unwrap();
        assert!(set.is_ready());

        let snap = set.snapshot();
        assert!(snap.ready);
        assert_eq!(snap.price, 99.0);
        assert_eq!(snap.timeframe, Timeframe::OneHour);
        assert_eq!(snap.timestamp, Some(candle(5, 99.0, 10.0).close_time()));
        assert!(snap.atr.unwrap() > 0.0);
        assert_eq!(snap.average_volume, Some(10.0));
        assert_eq!(snap.volume_ratio(), Some(1.0));
        assert!(snap.bb_upper > snap.bb_middle && snap.bb_middle > snap.bb_lower);
    }

    #[test]
    fn test_ready_is_sticky_and_reset_clears() {
        let mut set = IndicatorSet::new(Timeframe::OneHour, &small_config()).unwrap();
        for i in 0..10 {
            set.update_candle(&candle(i, 100.0 + (i % 3) as f64, 5.0)).unwrap();
        }
        assert!(set.is_ready());
        set.update_candle(&candle(10, 101.0, 5.0)).unwrap();
        assert!(set.is_ready());

        set.reset();
        assert!(!set.is_ready());
        assert_eq!(set.data_count(), 0);
        assert!(set.snapshot().atr.is_none());
    }

    #[test]
    fn test_invalid_candle_leaves_state_unmodified() {
        let mut set = IndicatorSet::new(Timeframe::OneHour, &small_config()).unwrap();
        set.update_candle(&candle(0, 100.0, 5.0)).unwrap();
        let mut bad = candle(1, 100.0, 5.0);
        bad.close = 0.0;
        assert!(set.update_candle(&bad).is_err());
        assert_eq!(set.data_count(), 1);
        assert_eq!(set.snapshot().price, 100.0);
    }

    #[test]
    fn test_value_map_names() {
        let mut set = IndicatorSet::new(Timeframe::OneHour, &small_config()).unwrap();
        for i in 0..8 {
            set.update_candle(&candle(i, 100.0 + i as f64, 5.0)).unwrap();
        }
        let (values, ready) = set.value();
        assert!(ready);
        for key in ["rsi", "macd", "macd_signal", "macd_histogram", "bb_upper", "bb_middle", "bb_lower", "atr"] {
            assert!(values.contains_key(key), "missing {}", key);
        }
    }
}
