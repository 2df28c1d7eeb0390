//! Shared numeric helpers for indicator calculations.
//!
//! These work on plain `f64` slices and return vectors aligned with their
//! input, `None` marking positions without enough lookback.

use crate::domain::candle::Candle;

/// Rolling simple moving average.
pub fn sma_values(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return out;
    }
    let mut sum: f64 = data[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);
    for i in period..data.len() {
        sum += data[i] - data[i - period];
        out[i] = Some(sum / period as f64);
    }
    out
}

/// SMA over a left-padded series. The window starts at the first `Some`.
pub fn sma_of_sparse(data: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let first = data.iter().position(Option::is_some);
    let mut out = vec![None; data.len()];
    let Some(start) = first else {
        return out;
    };
    let dense: Vec<f64> = data[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
    for (i, v) in sma_values(&dense, period).into_iter().enumerate() {
        out[start + i] = v;
    }
    out
}

/// EMA seeded with the SMA of the first `period` values, k = 2/(n+1).
pub fn ema_values(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = data[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema);
    for i in period..data.len() {
        ema = data[i] * k + ema * (1.0 - k);
        out[i] = Some(ema);
    }
    out
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation (divides by N).
pub fn population_std(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// True range for each candle after the first (length = len - 1).
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|w| w[1].true_range(w[0].close))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candle(high: f64, low: f64, close: f64) -> Candle {
        Candle {
            time: 0,
            open: close,
            high,
            low,
            close,
            volume: 0.0,
        }
    }

    #[test]
    fn sma_alignment() {
        let out = sma_values(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(out, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn sma_short_input() {
        assert_eq!(sma_values(&[1.0], 2), vec![None]);
    }

    #[test]
    fn sparse_sma_starts_after_gap() {
        let out = sma_of_sparse(&[None, Some(2.0), Some(4.0), Some(6.0)], 2);
        assert_eq!(out, vec![None, None, Some(3.0), Some(5.0)]);
    }

    #[test]
    fn ema_seed_and_step() {
        let out = ema_values(&[10.0, 20.0, 30.0, 40.0], 3);
        assert_eq!(out[1], None);
        assert!((out[2].unwrap() - 20.0).abs() < f64::EPSILON);
        // k = 0.5 → 40*0.5 + 20*0.5 = 30
        assert!((out[3].unwrap() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn population_std_known() {
        // mean 5, squared deviations sum 32, /8 = 4 → 2
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std(&v) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn true_ranges_use_previous_close() {
        let candles = vec![make_candle(11.0, 9.0, 10.0), make_candle(15.0, 12.0, 14.0)];
        // max(3, 5, 2) = 5
        assert_eq!(true_ranges(&candles), vec![5.0]);
    }
}
