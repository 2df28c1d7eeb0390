//! Exponential Moving Average over closes.
//!
//! k = 2/(n+1), seed with the SMA of the first n closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Minimum lookback: n candles. The first (n-1) points are padding.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_ema(candles: &[Candle], period: usize) -> Option<IndicatorSeries> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut values = Vec::with_capacity(candles.len());
    let mut ema = 0.0;
    let mut seed_sum = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        let valid = i + 1 >= period;
        if i + 1 < period {
            seed_sum += candle.close;
        } else if i + 1 == period {
            seed_sum += candle.close;
            ema = seed_sum / period as f64;
        } else {
            ema = candle.close * k + ema * (1.0 - k);
        }
        values.push(IndicatorPoint {
            time: candle.time,
            valid,
            value: IndicatorValue::Simple(if valid { ema } else { 0.0 }),
        });
    }

    Some(IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    })
}
