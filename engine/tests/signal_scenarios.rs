//! End-to-end decisions of the signal generator over hand-built snapshots.

use engine::prelude::*;

fn snapshot(timeframe: Timeframe) -> IndicatorSnapshot {
    let mut snap = IndicatorSnapshot::empty(timeframe);
    snap.ready = true;
    snap.price = 100.0;
    snap.rsi = 50.0;
    snap.bb_upper = 110.0;
    snap.bb_middle = 100.0;
    snap.bb_lower = 90.0;
    snap.band_width_percent = 3.2;
    snap.volume = 10.0;
    snap.average_volume = Some(10.0);
    snap
}

/// RSI above 60, positive histogram and price above the middle band: three bullish votes
fn bullish_daily() -> IndicatorSnapshot {
    let mut snap = snapshot(Timeframe::OneDay);
    snap.rsi = 66.0;
    snap.macd_histogram = 2.0;
    snap.price = 104.0;
    snap
}

fn bearish_daily() -> IndicatorSnapshot {
    let mut snap = snapshot(Timeframe::OneDay);
    snap.rsi = 34.0;
    snap.macd_histogram = -2.0;
    snap.price = 96.0;
    snap
}

/// RSI 28 and a bullish MACD crossover: two of three BUY conditions
fn hourly_buy_candidate(band_width_percent: f64) -> IndicatorSnapshot {
    let mut snap = snapshot(Timeframe::OneHour);
    snap.rsi = 28.0;
    snap.macd = 0.8;
    snap.macd_signal = 0.5;
    snap.macd_histogram = 0.3;
    snap.band_width_percent = band_width_percent;
    snap
}

fn entry(rsi: f64, histogram: f64) -> IndicatorSnapshot {
    let mut snap = snapshot(Timeframe::FiveMinutes);
    snap.rsi = rsi;
    snap.macd_histogram = histogram;
    snap
}

fn generator(strategy: StrategyConfig, filter: MarketFilterConfig) -> SignalGenerator {
    SignalGenerator::new(strategy, TimeframeConfig::default(), filter).unwrap()
}

fn inputs(daily: IndicatorSnapshot, hourly: IndicatorSnapshot, five_minute: IndicatorSnapshot) -> SignalInputs {
    SignalInputs {
        trend: Some(daily),
        signal: Some(hourly),
        entry: Some(five_minute),
        has_position: false,
        quote: None,
    }
}

#[test]
fn test_bullish_confluence_produces_buy() {
    let mut gen = generator(StrategyConfig::default(), MarketFilterConfig::default());
    let signal = gen.generate(&inputs(bullish_daily(), hourly_buy_candidate(3.2), entry(45.0, 0.0)));

    assert_eq!(signal.kind, SignalKind::Buy, "{}", signal.reason);
    assert!(signal.is_actionable());
    assert_eq!(signal.rejected_at, None);
    assert_eq!(signal.trend_bias, Some(TrendBias::Bullish));
    assert!(signal.reason.starts_with("BUY confirmed"));
    let timeframes: Vec<Timeframe> = signal.snapshots.iter().map(|s| s.timeframe).collect();
    assert_eq!(timeframes, vec![Timeframe::OneHour, Timeframe::OneDay, Timeframe::FiveMinutes]);
}

#[test]
fn test_excessive_volatility_rejects_with_reason() {
    let mut gen = generator(StrategyConfig::default(), MarketFilterConfig::default());
    let signal = gen.generate(&inputs(bullish_daily(), hourly_buy_candidate(12.5), entry(45.0, 0.0)));

    assert_eq!(signal.kind, SignalKind::None);
    assert_eq!(signal.rejected_at, Some(SignalPhase::MarketFilter));
    assert!(signal.reason.contains("volatility"), "{}", signal.reason);
    assert_eq!(gen.last_reason(), Some(signal.reason.as_str()));
}

#[test]
fn test_bearish_trend_blocks_hourly_buy() {
    let mut gen = generator(StrategyConfig::default(), MarketFilterConfig::default());
    let signal = gen.generate(&inputs(bearish_daily(), hourly_buy_candidate(3.2), entry(45.0, 0.0)));

    assert_eq!(signal.kind, SignalKind::None);
    assert_eq!(signal.rejected_at, Some(SignalPhase::Alignment));
    assert!(signal.reason.contains("trend misalignment"), "{}", signal.reason);
    assert_eq!(signal.trend_bias, Some(TrendBias::Bearish));
}

#[test]
fn test_open_position_blocks_second_buy() {
    let mut gen = generator(StrategyConfig::default(), MarketFilterConfig::default());
    let mut inputs = inputs(bullish_daily(), hourly_buy_candidate(3.2), entry(45.0, 0.0));
    inputs.has_position = true;
    let signal = gen.generate(&inputs);

    assert_eq!(signal.rejected_at, Some(SignalPhase::Position));
    assert!(signal.reason.contains("position already open"));
}

#[test]
fn test_overheated_entry_timeframe_rejects_buy() {
    let mut gen = generator(StrategyConfig::default(), MarketFilterConfig::default());
    let signal = gen.generate(&inputs(bullish_daily(), hourly_buy_candidate(3.2), entry(65.0, 0.1)));
    assert_eq!(signal.rejected_at, Some(SignalPhase::EntryConfirmation));

    let signal = gen.generate(&inputs(bullish_daily(), hourly_buy_candidate(3.2), entry(45.0, -0.1)));
    assert_eq!(signal.rejected_at, Some(SignalPhase::EntryConfirmation));
}

#[test]
fn test_bearish_confluence_sells_open_position() {
    let mut hourly = snapshot(Timeframe::OneHour);
    hourly.rsi = 75.0;
    hourly.macd = -0.8;
    hourly.macd_signal = -0.5;
    hourly.macd_histogram = -0.3;

    let mut gen = generator(StrategyConfig::default(), MarketFilterConfig::default());
    let mut inputs = inputs(bearish_daily(), hourly, entry(55.0, -0.2));
    inputs.has_position = true;
    let signal = gen.generate(&inputs);
    assert_eq!(signal.kind, SignalKind::Sell, "{}", signal.reason);

    inputs.has_position = false;
    let signal = gen.generate(&inputs);
    assert_eq!(signal.rejected_at, Some(SignalPhase::Position));
}

#[test]
fn test_wide_spread_and_thin_volume_are_both_reported() {
    let filter = MarketFilterConfig {
        check_liquidity: true,
        check_spread: true,
        ..MarketFilterConfig::default()
    };
    let mut hourly = hourly_buy_candidate(3.2);
    hourly.volume = 2.0;

    let mut gen = generator(StrategyConfig::default(), filter);
    let mut inputs = inputs(bullish_daily(), hourly, entry(45.0, 0.0));
    inputs.quote = Some(MarketQuote::new(99.0, 101.0).unwrap());
    let signal = gen.generate(&inputs);

    assert_eq!(signal.rejected_at, Some(SignalPhase::MarketFilter));
    assert!(signal.reason.contains("volume"), "{}", signal.reason);
    assert!(signal.reason.contains("spread"), "{}", signal.reason);
}

#[test]
fn test_disabled_trend_filter_skips_daily_data() {
    let strategy = StrategyConfig {
        use_trend_filter: false,
        require_trend_confirmation: false,
        ..StrategyConfig::default()
    };
    let mut gen = generator(strategy, MarketFilterConfig::default());
    let signal = gen.generate(&SignalInputs {
        trend: None,
        signal: Some(hourly_buy_candidate(3.2)),
        entry: Some(entry(45.0, 0.0)),
        has_position: false,
        quote: None,
    });

    assert_eq!(signal.kind, SignalKind::Buy, "{}", signal.reason);
    assert_eq!(signal.trend_bias, None);
}

#[test]
fn test_every_rejection_names_its_phase() {
    let mut gen = generator(StrategyConfig::default(), MarketFilterConfig::default());
    let cases = [
        (inputs(bullish_daily(), snapshot(Timeframe::OneHour), entry(45.0, 0.0)), SignalPhase::Confluence),
        (inputs(snapshot(Timeframe::OneDay), hourly_buy_candidate(3.2), entry(45.0, 0.0)), SignalPhase::TrendBias),
        (inputs(bullish_daily(), hourly_buy_candidate(0.5), entry(45.0, 0.0)), SignalPhase::MarketFilter),
    ];
    for (inputs, phase) in cases {
        let signal = gen.generate(&inputs);
        assert_eq!(signal.rejected_at, Some(phase));
        assert!(signal.reason.starts_with(phase.label()), "{}", signal.reason);
    }
}
