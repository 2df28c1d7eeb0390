//! Property tests for indicator, risk, scoring and simulation invariants.
//!
//! 1. RSI stays within 0..=100
//! 2. Bollinger bands stay ordered
//! 3. Stops and targets sit on the correct side of entry
//! 4. Lot sizes are whole multiples of the lot step
//! 5. A signal always clears the scoring gate
//! 6. Backtests are deterministic and never overlap positions

mod common;

use common::*;
use proptest::prelude::*;
use signalforge::domain::analysis::{analyze, AnalysisConfig};
use signalforge::domain::backtest::{run_backtest_with, BacktestConfig};
use signalforge::domain::candle::Candle;
use signalforge::domain::execution::EntryOrder;
use signalforge::domain::indicator::bollinger::calculate_bollinger_default;
use signalforge::domain::indicator::{calculate_rsi, IndicatorValue};
use signalforge::domain::risk::{position_size, size_position, AccountState, RiskConfig, SetupRequest};
use signalforge::domain::scorer::{Direction, MIN_SCORE, MIN_SCORE_GAP};
use std::collections::BTreeMap;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_steps(min: usize, max: usize) -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-0.0020..0.0020_f64, 0.0..0.0008_f64), min..max)
}

fn random_walk(steps: &[(f64, f64)]) -> Vec<Candle> {
    let mut close = 1.1000;
    steps
        .iter()
        .enumerate()
        .map(|(i, &(step, wick))| {
            let open = close;
            close = open + step;
            Candle {
                time: START_TIME + i as i64 * HOUR,
                open,
                high: open.max(close) + wick,
                low: open.min(close) - wick,
                close,
                volume: 100.0 + (i % 7) as f64 * 20.0,
            }
        })
        .collect()
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Buy), Just(Direction::Sell)]
}

// ── 1-2. Indicators ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_is_bounded(steps in arb_steps(20, 120)) {
        let candles = random_walk(&steps);
        let series = calculate_rsi(&candles, 14).unwrap();
        for value in series.valid_simple() {
            prop_assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn bollinger_bands_are_ordered(steps in arb_steps(20, 120)) {
        let candles = random_walk(&steps);
        let series = calculate_bollinger_default(&candles).unwrap();
        for value in series.valid_values() {
            if let IndicatorValue::Bollinger { upper, middle, lower } = value {
                prop_assert!(lower <= middle);
                prop_assert!(middle <= upper);
            }
        }
    }
}

// ── 3-4. Risk ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn stop_and_target_sides(
        direction in arb_direction(),
        entry in 1.0..1.2_f64,
        support_offset in prop::option::of(0.0..0.02_f64),
        resistance_offset in prop::option::of(0.0..0.02_f64),
        confidence in 40.0..95.0_f64,
    ) {
        let request = SetupRequest {
            direction,
            entry,
            support: support_offset.map(|o| entry - o),
            resistance: resistance_offset.map(|o| entry + o),
            confidence,
        };
        let account = AccountState { balance: 10_000.0, equity: 10_000.0, leverage: 100.0 };
        let setup = size_position(&request, &account, &eurusd(), &RiskConfig::default()).unwrap();
        match direction {
            Direction::Buy => {
                prop_assert!(setup.stop_loss < entry);
                prop_assert!(setup.take_profit > entry);
            }
            Direction::Sell => {
                prop_assert!(setup.stop_loss > entry);
                prop_assert!(setup.take_profit < entry);
            }
        }
        prop_assert!(setup.risk_reward >= 1.0 - 1e-9);
    }

    #[test]
    fn lots_are_step_multiples(
        step_index in 0usize..3,
        balance in 100.0..1_000_000.0_f64,
        sl_pips in 5.0..300.0_f64,
        risk_percent in 0.1..5.0_f64,
    ) {
        let step = [0.01, 0.1, 1.0][step_index];
        let mut meta = eurusd();
        meta.lot_step = step;
        meta.lot_min = step;
        meta.lot_max = 100.0;
        let size = position_size(&meta, balance, balance, 100.0, 1.1, 1.1 - sl_pips * 0.0001, risk_percent)
            .unwrap();
        let steps = size.lot_size / step;
        prop_assert!((steps - steps.round()).abs() < 1e-6);
        prop_assert!(size.lot_size >= meta.lot_min && size.lot_size <= meta.lot_max);
    }
}

// ── 5-6. Scoring and simulation ──────────────────────────────────────

fn buy_on_rise(window: &[Candle], _balance: f64) -> Option<EntryOrder> {
    let last = window.last()?;
    let prev = window.get(window.len().checked_sub(2)?)?;
    (last.close > prev.close).then(|| EntryOrder {
        direction: Direction::Buy,
        confidence: 75.0,
        stop_loss: last.close - 0.0025,
        take_profit: last.close + 0.0050,
        lot_size: 0.1,
        risk_reward: 2.0,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn signals_clear_the_gate(steps in arb_steps(60, 130)) {
        let candles = random_walk(&steps);
        let config = AnalysisConfig { symbol: "EURUSD".into(), ..AnalysisConfig::default() };
        let analysis = analyze(&candles, &config, &BTreeMap::new()).unwrap();
        if let Some(signal) = &analysis.signal {
            let (winner, loser) = match signal.direction {
                Direction::Buy => (analysis.bullish_score, analysis.bearish_score),
                Direction::Sell => (analysis.bearish_score, analysis.bullish_score),
            };
            prop_assert!(winner >= MIN_SCORE);
            prop_assert!(winner - loser >= MIN_SCORE_GAP);
            prop_assert!(signal.confidence <= 95.0);
        }
    }

    #[test]
    fn backtest_is_deterministic_without_overlap(steps in arb_steps(100, 180)) {
        let candles = random_walk(&steps);
        let config = BacktestConfig::default();
        let first = run_backtest_with(&candles, &eurusd(), &config, &mut buy_on_rise, None);
        let second = run_backtest_with(&candles, &eurusd(), &config, &mut buy_on_rise, None);
        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        for pair in first.trades.windows(2) {
            prop_assert!(pair[1].entry_time > pair[0].exit_time);
        }
        prop_assert_eq!(first.metrics.total_trades, first.trades.len());
    }
}
