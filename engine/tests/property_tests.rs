//! Property tests for indicator, risk and safety invariants.

use chrono::{TimeZone, Utc};
use engine::prelude::*;
use proptest::prelude::*;
use std::time::{Duration, Instant};

fn arb_price() -> impl Strategy<Value = f64> {
    (0.01..10_000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0 + 0.01)
}

fn arb_prices(min: usize, max: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(arb_price(), min..max)
}

fn feed(indicator: &mut dyn Indicator, prices: &[f64]) {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for (i, price) in prices.iter().enumerate() {
        indicator
            .update(*price, t0 + chrono::Duration::minutes(i as i64))
            .unwrap();
    }
}

// ── Indicators ───────────────────────────────────────────────────────

proptest! {
    /// Strictly rising closes read 100 once the window is full.
    #[test]
    fn rsi_of_rising_series_is_100(
        period in 1usize..30,
        start in 1.0..1_000.0_f64,
        steps in prop::collection::vec(0.01..50.0_f64, 30..60),
    ) {
        let mut rsi = Rsi::new(period).unwrap();
        let mut price = start;
        let mut prices = vec![price];
        for step in steps {
            price += step;
            prices.push(price);
        }
        feed(&mut rsi, &prices);
        prop_assert_eq!(rsi.rsi(), Some(100.0));
    }

    /// No losses in the window, including no movement at all, reads 100.
    #[test]
    fn rsi_without_losses_is_100(
        period in 1usize..20,
        start in 1.0..1_000.0_f64,
        steps in prop::collection::vec(prop_oneof![Just(0.0), 0.0..5.0_f64], 20..40),
    ) {
        let mut rsi = Rsi::new(period).unwrap();
        let mut price = start;
        let mut prices = vec![price];
        for step in steps {
            price += step;
            prices.push(price);
        }
        feed(&mut rsi, &prices);
        prop_assert_eq!(rsi.rsi(), Some(100.0));
    }

    #[test]
    fn rsi_is_bounded(period in 1usize..30, prices in arb_prices(2, 200)) {
        let mut rsi = Rsi::new(period).unwrap();
        feed(&mut rsi, &prices);
        if let Some(value) = rsi.rsi() {
            prop_assert!((0.0..=100.0).contains(&value));
        }
        prop_assert_eq!(rsi.is_ready(), prices.len() > period);
    }

    /// Ready exactly after slow + signal prices.
    #[test]
    fn macd_warmup(
        fast in 1usize..15,
        gap in 1usize..20,
        signal in 1usize..12,
        prices in arb_prices(60, 80),
    ) {
        let slow = fast + gap;
        let mut macd = Macd::new(fast, slow, signal).unwrap();
        let warmup = slow + signal;
        feed(&mut macd, &prices[..warmup - 1]);
        prop_assert!(!macd.is_ready());
        feed(&mut macd, &prices[warmup - 1..warmup]);
        prop_assert!(macd.is_ready());
    }

    #[test]
    fn band_width_never_negative(
        period in 2usize..30,
        multiplier in 0.1..4.0_f64,
        prices in arb_prices(30, 120),
    ) {
        let mut bands = BollingerBands::new(period, multiplier).unwrap();
        let t0 = Utc::now();
        for price in prices {
            bands.update(price, t0).unwrap();
            if let Some(out) = bands.output() {
                prop_assert!(out.band_width_percent >= 0.0);
                prop_assert!(out.upper >= out.middle && out.middle >= out.lower);
            }
        }
    }

    /// Ready never reverts once reached.
    #[test]
    fn indicator_set_ready_is_monotonic(prices in arb_prices(40, 120)) {
        let config = IndicatorConfig {
            rsi_period: 5,
            macd_fast: 3,
            macd_slow: 6,
            macd_signal: 3,
            bb_period: 5,
            ..IndicatorConfig::default()
        };
        let mut set = IndicatorSet::new(Timeframe::OneHour, &config).unwrap();
        let mut was_ready = false;
        let t0 = Utc::now();
        for price in prices {
            set.update(price, t0).unwrap();
            prop_assert!(!was_ready || set.is_ready());
            was_ready = set.is_ready();
        }
    }

    #[test]
    fn ring_buffer_never_exceeds_capacity(capacity in 1usize..50, pushes in 0usize..200) {
        let mut ring = RingBuffer::new(capacity);
        for i in 0..pushes {
            let evicted = ring.push(i);
            prop_assert_eq!(evicted, i.checked_sub(capacity));
            prop_assert!(ring.len() <= capacity);
        }
        prop_assert_eq!(ring.last().copied(), pushes.checked_sub(1));
    }
}

// ── Risk ─────────────────────────────────────────────────────────────

proptest! {
    /// The dual cap holds: neither the loss at the stop nor the notional exceed
    /// their limits, and one of them binds.
    #[test]
    fn sizing_respects_both_caps(
        portfolio in 100.0..1_000_000.0_f64,
        entry in 0.000_001..100_000.0_f64,
        risk_pct in 0.1..5.0_f64,
        max_pct in 1.0..100.0_f64,
        stop_pct in 0.5..20.0_f64,
    ) {
        let risk = RiskManager::new(RiskConfig {
            risk_per_trade_percent: risk_pct,
            max_position_percent: max_pct,
            stop_loss: StopLossRule::Percent { percent: stop_pct },
            ..RiskConfig::default()
        }).unwrap();
        let sizing = risk.calculate_position_size(portfolio, entry, None).unwrap();
        let tolerance = 1e-9 * portfolio;

        prop_assert!(sizing.stop_loss_price < entry);
        prop_assert!(sizing.take_profit_price > entry);
        prop_assert!(sizing.quantity * (entry - sizing.stop_loss_price) <= sizing.risk_amount + tolerance);
        prop_assert!(sizing.position_value() <= portfolio * max_pct / 100.0 + tolerance);
        prop_assert_eq!(sizing.quantity, sizing.quantity_by_risk.min(sizing.quantity_by_value));
    }

    /// The trailing stop only moves up.
    #[test]
    fn trailing_stop_only_tightens(moves in prop::collection::vec(-3.0..3.0_f64, 1..200)) {
        let risk = RiskManager::new(RiskConfig::default()).unwrap();
        let mut position = Position::new("BTC/USDT", 1.0, 100.0, Utc::now(), 97.0, 1e9).unwrap();
        let mut price = 100.0;
        let mut last_stop: Option<f64> = None;
        for step in moves {
            price = (price + step).max(1.0);
            let exit = risk.check_exit(&mut position, price);
            if let (Some(previous), Some(current)) = (last_stop, position.trailing_stop) {
                prop_assert!(current >= previous);
            }
            if last_stop.is_some() {
                prop_assert!(position.trailing_stop.is_some());
            }
            last_stop = position.trailing_stop;
            if exit.is_some() {
                break;
            }
        }
    }
}

// ── Safety ───────────────────────────────────────────────────────────

proptest! {
    /// Within one window exactly `capacity` calls pass.
    #[test]
    fn rate_limiter_caps_calls_per_window(capacity in 1u32..20, calls in 0u32..60) {
        let t0 = Instant::now();
        let limiter = RateLimiter::with_start(
            &RateLimitConfig { max_calls: capacity, interval_ms: 1_000 },
            t0,
        );
        let allowed = (0..calls)
            .filter(|i| limiter.try_acquire_at(t0 + Duration::from_millis(u64::from(*i) * 10)).is_ok())
            .count() as u32;
        prop_assert_eq!(allowed, calls.min(capacity));
        prop_assert_eq!(limiter.available_tokens_at(t0 + Duration::from_millis(1_001)), capacity);
    }

    /// After max_failures failures the breaker refuses until the timeout passes.
    #[test]
    fn breaker_opens_after_max_failures(max_failures in 1u32..10, timeout_ms in 1u64..10_000) {
        let breaker = CircuitBreaker::new(&CircuitBreakerConfig {
            max_failures,
            reset_timeout_ms: timeout_ms,
        });
        let t0 = Instant::now();
        for _ in 0..max_failures {
            prop_assert_eq!(breaker.state(), CircuitState::Closed);
            breaker.try_acquire_at(t0).unwrap();
            breaker.record_failure_at(t0);
        }
        prop_assert_eq!(breaker.state(), CircuitState::Open);
        prop_assert!(breaker.try_acquire_at(t0 + Duration::from_millis(timeout_ms)).is_err());
        prop_assert!(breaker.try_acquire_at(t0 + Duration::from_millis(timeout_ms + 1)).is_ok());
        prop_assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }
}
