//! Bollinger Bands indicator.
//!
//! - Middle: SMA of closes over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the population standard deviation (divides by N, not N-1).
//! Bandwidth = (upper - lower) / middle × 100.
//!
//! Default parameters: period=20, multiplier=2.0
//! Minimum lookback: n candles.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::{mean, population_std};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

pub fn calculate_bollinger(
    candles: &[Candle],
    period: usize,
    stddev_mult_x100: u32,
) -> Option<IndicatorSeries> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let mult = stddev_mult_x100 as f64 / 100.0;
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let warmup = period - 1;

    let mut values = Vec::with_capacity(candles.len());
    for (i, candle) in candles.iter().enumerate() {
        let valid = i >= warmup;
        let (upper, middle, lower) = if valid {
            let window = &closes[i - warmup..=i];
            let middle = mean(window);
            let stddev = population_std(window);
            (middle + mult * stddev, middle, middle - mult * stddev)
        } else {
            (0.0, 0.0, 0.0)
        };

        values.push(IndicatorPoint {
            time: candle.time,
            valid,
            value: IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            },
        });
    }

    Some(IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        values,
    })
}

pub fn calculate_bollinger_default(candles: &[Candle]) -> Option<IndicatorSeries> {
    calculate_bollinger(candles, DEFAULT_PERIOD, DEFAULT_MULT_X100)
}

/// Band width as a percentage of the middle band; 0 when middle is not positive.
pub fn bandwidth(upper: f64, middle: f64, lower: f64) -> f64 {
    if middle > 0.0 {
        (upper - lower) / middle * 100.0
    } else {
        0.0
    }
}
