use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use common::{Candle, LogNotifier};
use strategy::{CandleBatcher, Rsi, RsiFallParams, SignalEngine, StrategyConfig};

fn base_candles(bars: &[(f64, f64, f64, f64, f64)]) -> Vec<Candle> {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    bars.iter()
        .enumerate()
        .map(|(i, &(o, h, l, c, v))| Candle::new(t0 + Duration::minutes(i as i64), o, h, l, c, v))
        .collect()
}

fn bar() -> impl Strategy<Value = (f64, f64, f64, f64, f64)> {
    (1.0f64..1000.0, 1.0f64..1000.0, 1.0f64..1000.0, 1.0f64..1000.0, 0.0f64..50.0)
}

fn engine_cfg() -> StrategyConfig {
    StrategyConfig {
        name: "prop".into(),
        pair: "TESTUSDT".into(),
        asset: "TEST".into(),
        params: RsiFallParams {
            fast_bucket: 2,
            slow_bucket: 5,
            period: 3,
            history_size: Some(0),
            ..Default::default()
        },
    }
}

proptest! {
    /// A batcher of size B emits floor(N / B) candles, each folded from B consecutive inputs.
    #[test]
    fn batcher_emits_one_candle_per_full_bucket(
        bars in prop::collection::vec(bar(), 0..200),
        bucket in 1usize..20,
    ) {
        let input = base_candles(&bars);
        let mut batcher = CandleBatcher::new(bucket, Vec::new());
        for c in &input {
            batcher.write(*c);
        }
        prop_assert_eq!(batcher.pending_len(), input.len() % bucket);

        let derived = batcher.into_sink();
        prop_assert_eq!(derived.len(), input.len() / bucket);

        for (chunk, d) in input.chunks_exact(bucket).zip(&derived) {
            prop_assert_eq!(d.open_time, chunk[0].open_time);
            prop_assert_eq!(d.open, chunk[0].open);
            prop_assert_eq!(d.close, chunk[bucket - 1].close);
            let high = chunk.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let low = chunk.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            let volume: f64 = chunk.iter().map(|c| c.volume).sum();
            prop_assert_eq!(d.high, high);
            prop_assert_eq!(d.low, low);
            prop_assert!((d.volume - volume).abs() < 1e-9);
        }
    }

    /// Once warmed up, RSI stays within [0, 100] for any close sequence.
    #[test]
    fn rsi_is_bounded(
        closes in prop::collection::vec(0.01f64..100_000.0, 0..300),
        period in 2usize..30,
    ) {
        let mut rsi = Rsi::new(period);
        for (i, &c) in closes.iter().enumerate() {
            let value = rsi.update(c);
            prop_assert_eq!(value.is_some(), i + 1 >= period);
            prop_assert_eq!(rsi.samples(), i + 1);
            if let Some(v) = value {
                prop_assert!((0.0..=100.0).contains(&v), "RSI out of range: {}", v);
            }
        }
    }

    /// Strictly rising closes read 100, strictly falling closes read 0, from `period` closes on.
    #[test]
    fn rsi_monotone_series_hits_the_limits(
        start in 10.0f64..1000.0,
        steps in prop::collection::vec(0.01f64..5.0, 13..60),
    ) {
        let mut up = Rsi::new(14);
        let mut down = Rsi::new(14);
        let mut rising = start;
        let mut falling = start + 1000.0;
        up.update(rising);
        down.update(falling);
        for step in &steps {
            rising += step;
            falling -= step;
            up.update(rising);
            down.update(falling);
        }
        prop_assert_eq!(up.value(), Some(100.0));
        prop_assert_eq!(down.value(), Some(0.0));
    }

    /// Two fresh engines fed the same stream end in the same state with the same advice.
    #[test]
    fn engine_is_deterministic(closes in prop::collection::vec(50.0f64..150.0, 0..400)) {
        let bars: Vec<_> = closes.iter().map(|&c| (c, c, c, c, 1.0)).collect();
        let input = base_candles(&bars);

        let mut a = SignalEngine::new(&engine_cfg(), Box::new(LogNotifier)).unwrap();
        let mut b = SignalEngine::new(&engine_cfg(), Box::new(LogNotifier)).unwrap();

        let advices_a: Vec<_> = input.iter().filter_map(|c| a.on_candle(c)).collect();
        let advices_b: Vec<_> = input.iter().filter_map(|c| b.on_candle(c)).collect();

        prop_assert_eq!(advices_a, advices_b);
        prop_assert_eq!(a.state(), b.state());
    }

    /// Advice alternates long/short, and flat engines hold no entry price or latch.
    #[test]
    fn engine_advice_alternates(closes in prop::collection::vec(50.0f64..150.0, 0..400)) {
        let bars: Vec<_> = closes.iter().map(|&c| (c, c, c, c, 1.0)).collect();
        let mut engine = SignalEngine::new(&engine_cfg(), Box::new(LogNotifier)).unwrap();

        let mut expect_long = true;
        for c in base_candles(&bars) {
            if let Some(advice) = engine.on_candle(&c) {
                let expected = if expect_long {
                    common::Direction::Long
                } else {
                    common::Direction::Short
                };
                prop_assert_eq!(advice.direction, expected);
                expect_long = !expect_long;
            }
            let state = engine.state();
            if state.position == strategy::Position::Flat {
                prop_assert_eq!(state.entry_price, 0.0);
                prop_assert!(!state.passed_fall_point);
            }
            prop_assert_eq!(state.last_price, c.close);
        }
    }
}
