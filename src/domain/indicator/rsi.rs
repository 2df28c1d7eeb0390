//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n deltas
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Minimum lookback: n + 1 candles. The first n points are padding.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_rsi(candles: &[Candle], period: usize) -> Option<IndicatorSeries> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = candles
        .windows(2)
        .map(|w| {
            let change = w[1].close - w[0].close;
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let mut values = Vec::with_capacity(candles.len());
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        if i < period {
            values.push(IndicatorPoint {
                time: candle.time,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            });
            continue;
        }

        let delta_idx = i - 1;
        if i == period {
            avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
            avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gains[delta_idx]) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + losses[delta_idx]) / period as f64;
        }

        values.push(IndicatorPoint {
            time: candle.time,
            valid: true,
            value: IndicatorValue::Simple(rsi_from_averages(avg_gain, avg_loss)),
        });
    }

    Some(IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    })
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candle(i: usize, close: f64) -> Candle {
        Candle {
            time: i as i64 * 3600,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    fn make_candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| make_candle(i, c))
            .collect()
    }

    #[test]
    fn rsi_insufficient_data() {
        let candles: Vec<Candle> = (0..14).map(|i| make_candle(i, 100.0 + i as f64)).collect();
        assert!(calculate_rsi(&candles, 14).is_none());
        assert!(calculate_rsi(&[], 14).is_none());
    }

    #[test]
    fn rsi_zero_period() {
        let candles = make_candles(&[100.0, 101.0]);
        assert!(calculate_rsi(&candles, 0).is_none());
    }

    #[test]
    fn rsi_warmup_period() {
        let candles: Vec<Candle> = (0..15)
            .map(|i| make_candle(i, 100.0 + (i as f64 % 5.0) * 2.0))
            .collect();

        let series = calculate_rsi(&candles, 14).unwrap();

        assert_eq!(series.values.len(), 15);
        for i in 0..14 {
            assert!(!series.values[i].valid, "candle {} should be padding", i);
        }
        assert!(series.values[14].valid);
    }

    #[test]
    fn rsi_all_gains_no_losses() {
        let candles: Vec<Candle> = (0..15).map(|i| make_candle(i, 100.0 + i as f64)).collect();
        let rsi = calculate_rsi(&candles, 14).unwrap().latest_simple().unwrap();
        assert!((rsi - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses_no_gains() {
        let candles: Vec<Candle> = (0..15).map(|i| make_candle(i, 100.0 - i as f64)).collect();
        let rsi = calculate_rsi(&candles, 14).unwrap().latest_simple().unwrap();
        assert!(rsi.abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_in_range() {
        let candles: Vec<Candle> = (0..40)
            .map(|i| make_candle(i, 100.0 + (i as f64 % 7.0 - 3.0) * 2.0))
            .collect();

        let series = calculate_rsi(&candles, 14).unwrap();
        for rsi in series.valid_simple() {
            assert!((0.0..=100.0).contains(&rsi), "RSI {} out of range", rsi);
        }
    }

    #[test]
    fn rsi_known_calculation() {
        let candles = make_candles(&[
            44.0, 44.25, 44.50, 43.75, 44.50, 44.25, 44.75, 45.25, 45.50, 45.25, 45.50, 46.0,
            46.25, 46.0, 46.50,
        ]);

        let series = calculate_rsi(&candles, 14).unwrap();
        // gains 4.0, losses 1.5 over 14 deltas → RS = 8/3
        let rsi = series.latest_simple().unwrap();
        assert!((rsi - (100.0 - 300.0 / 11.0)).abs() < 1e-9);
    }

    #[test]
    fn rsi_wilder_smoothing_step() {
        let candles = make_candles(&[10.0, 11.0, 10.0, 12.0]);
        let series = calculate_rsi(&candles, 2).unwrap();
        // seed: gain 0.5, loss 0.5 → 50; next: gain (0.5+2)/2 = 1.25, loss 0.25 → RS 5
        let vals = series.valid_simple();
        assert!((vals[0] - 50.0).abs() < 1e-9);
        assert!((vals[1] - (100.0 - 100.0 / 6.0)).abs() < 1e-9);
    }
}
