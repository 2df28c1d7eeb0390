//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Minimum lookback: slow + 1 candles. Points stay padding until the signal
//! line exists, i.e. the first (slow - 1 + signal - 1) candles.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::ema_values;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    candles: &[Candle],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Option<IndicatorSeries> {
    if fast == 0 || slow == 0 || signal_period == 0 || candles.len() < slow + 1 {
        return None;
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let ema_fast = ema_values(&closes, fast);
    let ema_slow = ema_values(&closes, slow);

    let line_start = fast.max(slow) - 1;
    let macd_line: Vec<f64> = (line_start..candles.len())
        .filter_map(|i| Some(ema_fast[i]? - ema_slow[i]?))
        .collect();
    let signal_line = ema_values(&macd_line, signal_period);

    let mut values = Vec::with_capacity(candles.len());
    for (i, candle) in candles.iter().enumerate() {
        let point = i
            .checked_sub(line_start)
            .and_then(|j| Some((macd_line[j], signal_line[j]?)));
        values.push(match point {
            Some((line, signal)) => IndicatorPoint {
                time: candle.time,
                valid: true,
                value: IndicatorValue::Macd {
                    line,
                    signal,
                    histogram: line - signal,
                },
            },
            None => IndicatorPoint {
                time: candle.time,
                valid: false,
                value: IndicatorValue::Macd {
                    line: 0.0,
                    signal: 0.0,
                    histogram: 0.0,
                },
            },
        });
    }

    Some(IndicatorSeries {
        indicator_type: IndicatorType::Macd {
            fast,
            slow,
            signal: signal_period,
        },
        values,
    })
}

pub fn calculate_macd_default(candles: &[Candle]) -> Option<IndicatorSeries> {
    calculate_macd(candles, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}
