//! OHLC candle representation.
//!
//! Times are unix seconds (UTC). Volume is a float so tick volume and real
//! volume share one type.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }

    /// UTC hour of the candle open, 0 when the timestamp is out of range.
    pub fn hour_utc(&self) -> u32 {
        self.datetime().map(|dt| dt.hour()).unwrap_or(0)
    }
}

/// Checks ordering and OHLC consistency. Returns the index and a description
/// of the first offending candle.
pub fn validate_series(candles: &[Candle]) -> Result<(), (usize, String)> {
    for (i, c) in candles.iter().enumerate() {
        let values = [c.open, c.high, c.low, c.close, c.volume];
        if values.iter().any(|v| !v.is_finite()) {
            return Err((i, "non-finite value".to_string()));
        }
        if c.volume < 0.0 {
            return Err((i, "negative volume".to_string()));
        }
        if c.low > c.open.min(c.close) || c.high < c.open.max(c.close) {
            return Err((i, "open/close outside high-low range".to_string()));
        }
        if i > 0 && c.time <= candles[i - 1].time {
            return Err((i, "time not strictly increasing".to_string()));
        }
    }
    Ok(())
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}
