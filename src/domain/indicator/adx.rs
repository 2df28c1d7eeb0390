//! ADX / directional indicators.
//!
//! TR, +DM and -DM are smoothed with a plain SMA(n) rather than Wilder's
//! running smoothing. This deviates from the textbook ADX and is kept for
//! compatibility with existing signal thresholds.
//!
//! +DI = SMA(+DM) / SMA(TR) × 100, -DI likewise
//! DX = |+DI - -DI| / (+DI + -DI) × 100
//! ADX = SMA(n) of DX
//!
//! Minimum lookback: 2n candles.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::{sma_of_sparse, sma_values, true_ranges};

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_adx(candles: &[Candle], period: usize) -> Option<IndicatorSeries> {
    if period == 0 || candles.len() < period * 2 {
        return None;
    }

    let tr = true_ranges(candles);
    let (plus_dm, minus_dm): (Vec<f64>, Vec<f64>) = candles
        .windows(2)
        .map(|w| {
            let up_move = w[1].high - w[0].high;
            let down_move = w[0].low - w[1].low;
            let plus = if up_move > down_move && up_move > 0.0 {
                up_move
            } else {
                0.0
            };
            let minus = if down_move > up_move && down_move > 0.0 {
                down_move
            } else {
                0.0
            };
            (plus, minus)
        })
        .unzip();

    let tr_smooth = sma_values(&tr, period);
    let plus_smooth = sma_values(&plus_dm, period);
    let minus_smooth = sma_values(&minus_dm, period);

    let di: Vec<Option<(f64, f64)>> = (0..tr.len())
        .map(|j| {
            let (t, p, m) = (tr_smooth[j]?, plus_smooth[j]?, minus_smooth[j]?);
            if t > 0.0 {
                Some((p / t * 100.0, m / t * 100.0))
            } else {
                Some((0.0, 0.0))
            }
        })
        .collect();
    let dx: Vec<Option<f64>> = di
        .iter()
        .map(|v| {
            v.map(|(p, m)| {
                let sum = p + m;
                if sum > 0.0 { (p - m).abs() / sum * 100.0 } else { 0.0 }
            })
        })
        .collect();
    let adx = sma_of_sparse(&dx, period);

    // Delta index j belongs to candle j + 1.
    let mut values = Vec::with_capacity(candles.len());
    for (i, candle) in candles.iter().enumerate() {
        let reading = i
            .checked_sub(1)
            .and_then(|j| Some((adx[j]?, di[j]?)));
        values.push(match reading {
            Some((adx, (plus_di, minus_di))) => IndicatorPoint {
                time: candle.time,
                valid: true,
                value: IndicatorValue::Adx {
                    adx,
                    plus_di,
                    minus_di,
                },
            },
            None => IndicatorPoint {
                time: candle.time,
                valid: false,
                value: IndicatorValue::Adx {
                    adx: 0.0,
                    plus_di: 0.0,
                    minus_di: 0.0,
                },
            },
        });
    }

    Some(IndicatorSeries {
        indicator_type: IndicatorType::Adx(period),
        values,
    })
}
