//! Stochastic oscillator.
//!
//! Raw %K = (close - lowest low) / (highest high - lowest low) * 100 over k
//! candles (50 when the window has no range). %K is smoothed by SMA(smooth)
//! and %D = SMA(d) of the smoothed %K.
//!
//! Minimum lookback: k + d + smooth candles.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::sma_of_sparse;

pub const DEFAULT_K: usize = 14;
pub const DEFAULT_D: usize = 3;
pub const DEFAULT_SMOOTH: usize = 3;

pub fn calculate_stochastic(
    candles: &[Candle],
    k_period: usize,
    d_period: usize,
    smooth: usize,
) -> Option<IndicatorSeries> {
    if k_period == 0 || d_period == 0 || smooth == 0 {
        return None;
    }
    if candles.len() < k_period + d_period + smooth {
        return None;
    }

    let raw_k: Vec<Option<f64>> = (0..candles.len())
        .map(|i| {
            if i + 1 < k_period {
                return None;
            }
            let window = &candles[i + 1 - k_period..=i];
            let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            if highest == lowest {
                Some(50.0)
            } else {
                Some((candles[i].close - lowest) / (highest - lowest) * 100.0)
            }
        })
        .collect();

    let smoothed_k = sma_of_sparse(&raw_k, smooth);
    let d_line = sma_of_sparse(&smoothed_k, d_period);

    let values = candles
        .iter()
        .zip(smoothed_k.iter().zip(d_line.iter()))
        .map(|(candle, (k, d))| match (k, d) {
            (Some(k), Some(d)) => IndicatorPoint {
                time: candle.time,
                valid: true,
                value: IndicatorValue::Stochastic { k: *k, d: *d },
            },
            _ => IndicatorPoint {
                time: candle.time,
                valid: false,
                value: IndicatorValue::Stochastic { k: 0.0, d: 0.0 },
            },
        })
        .collect();

    Some(IndicatorSeries {
        indicator_type: IndicatorType::Stochastic {
            k_period,
            d_period,
            smooth,
        },
        values,
    })
}

pub fn calculate_stochastic_default(candles: &[Candle]) -> Option<IndicatorSeries> {
    calculate_stochastic(candles, DEFAULT_K, DEFAULT_D, DEFAULT_SMOOTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candle(i: usize, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            time: i as i64 * 3600,
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn stochastic_insufficient_data() {
        let candles: Vec<Candle> = (0..19).map(|i| make_candle(i, 2.0, 1.0, 1.5)).collect();
        assert!(calculate_stochastic_default(&candles).is_none());
    }

    #[test]
    fn stochastic_flat_window_is_fifty() {
        let candles: Vec<Candle> = (0..25).map(|i| make_candle(i, 1.0, 1.0, 1.0)).collect();
        let series = calculate_stochastic_default(&candles).unwrap();
        match series.latest() {
            Some(IndicatorValue::Stochastic { k, d }) => {
                assert!((k - 50.0).abs() < f64::EPSILON);
                assert!((d - 50.0).abs() < f64::EPSILON);
            }
            other => panic!("expected stochastic value, got {:?}", other),
        }
    }

    #[test]
    fn stochastic_close_at_high() {
        let candles: Vec<Candle> = (0..25)
            .map(|i| {
                let p = 100.0 + i as f64;
                make_candle(i, p, p - 1.0, p)
            })
            .collect();
        let series = calculate_stochastic_default(&candles).unwrap();
        if let Some(IndicatorValue::Stochastic { k, .. }) = series.latest() {
            assert!((k - 100.0).abs() < 1e-9);
        } else {
            panic!("expected stochastic value");
        }
    }

    #[test]
    fn stochastic_warmup() {
        let candles: Vec<Candle> = (0..20)
            .map(|i| make_candle(i, 2.0 + i as f64, 1.0, 1.5 + i as f64))
            .collect();
        let series = calculate_stochastic_default(&candles).unwrap();
        // raw K from 13, smoothed from 15, D from 17
        assert!(!series.values[16].valid);
        assert!(series.values[17].valid);
    }

    #[test]
    fn stochastic_values_bounded() {
        let candles: Vec<Candle> = (0..60)
            .map(|i| {
                let mid = 100.0 + (i as f64 * 0.4).sin() * 5.0;
                make_candle(i, mid + 1.0, mid - 1.0, mid + 0.3)
            })
            .collect();
        let series = calculate_stochastic_default(&candles).unwrap();
        for v in series.valid_values() {
            if let IndicatorValue::Stochastic { k, d } = v {
                assert!((0.0..=100.0).contains(k));
                assert!((0.0..=100.0).contains(d));
            }
        }
    }
}
