//! Average True Range: SMA(n) of the true range.
//!
//! True range needs a previous close, so the first candle has none.
//! Minimum lookback: n + 1 candles.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::{sma_values, true_ranges};

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<IndicatorSeries> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let atr = sma_values(&true_ranges(candles), period);

    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let value = i.checked_sub(1).and_then(|j| atr[j]);
            IndicatorPoint {
                time: candle.time,
                valid: value.is_some(),
                value: IndicatorValue::Simple(value.unwrap_or(0.0)),
            }
        })
        .collect();

    Some(IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    })
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
    fn atr_insufficient_data() {
        let candles: Vec<Candle> = (0..14).map(|i| make_candle(i, 2.0, 1.0, 1.5)).collect();
        assert!(calculate_atr(&candles, 14).is_none());
    }

    #[test]
    fn atr_constant_range() {
        let candles: Vec<Candle> = (0..15).map(|i| make_candle(i, 2.0, 1.0, 1.5)).collect();
        let series = calculate_atr(&candles, 14).unwrap();
        assert!(!series.values[13].valid);
        assert!(series.values[14].valid);
        assert!((series.latest_simple().unwrap() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn atr_simple_average_of_true_range() {
        let candles = vec![
            make_candle(0, 11.0, 9.0, 10.0),
            make_candle(1, 12.0, 10.0, 11.0), // TR 2
            make_candle(2, 15.0, 12.0, 14.0), // TR 4
            make_candle(3, 14.5, 13.5, 14.0), // TR 1
        ];
        let series = calculate_atr(&candles, 2).unwrap();
        assert_eq!(series.valid_simple(), vec![3.0, 2.5]);
    }
}
