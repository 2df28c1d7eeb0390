//! Candle timeframes and resampling between them.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::error::SignalforgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Timeframe {
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

const HIERARCHY: [Timeframe; 6] = [
    Timeframe::M5,
    Timeframe::M15,
    Timeframe::M30,
    Timeframe::H1,
    Timeframe::H4,
    Timeframe::D1,
];

impl Timeframe {
    pub fn minutes(self) -> i64 {
        match self {
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    pub fn seconds(self) -> i64 {
        self.minutes() * 60
    }

    fn position(self) -> usize {
        HIERARCHY.iter().position(|&tf| tf == self).unwrap_or(0)
    }

    /// Next smaller timeframe, `None` for M5.
    pub fn lower(self) -> Option<Timeframe> {
        self.position().checked_sub(1).map(|i| HIERARCHY[i])
    }

    /// Next larger timeframe, `None` for D1.
    pub fn higher(self) -> Option<Timeframe> {
        HIERARCHY.get(self.position() + 1).copied()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Timeframe {
    type Err = SignalforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HIERARCHY
            .iter()
            .copied()
            .find(|tf| tf.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SignalforgeError::Configuration {
                reason: format!("unknown timeframe '{}': expected M5, M15, M30, H1, H4 or D1", s),
            })
    }
}

/// Aggregates `from` candles into `to` candles aligned to epoch multiples of
/// the target period. Only buckets holding every constituent candle are
/// emitted. `None` when `to` is not a whole multiple of `from`.
pub fn resample(candles: &[Candle], from: Timeframe, to: Timeframe) -> Option<Vec<Candle>> {
    if to.minutes() < from.minutes() || to.minutes() % from.minutes() != 0 {
        return None;
    }
    let per_bucket = (to.minutes() / from.minutes()) as usize;
    let period = to.seconds();

    let mut out = Vec::new();
    let mut current: Option<(i64, Candle, usize)> = None;
    for c in candles {
        let bucket = c.time.div_euclid(period) * period;
        match current.as_mut() {
            Some((start, agg, count)) if *start == bucket => {
                agg.high = agg.high.max(c.high);
                agg.low = agg.low.min(c.low);
                agg.close = c.close;
                agg.volume += c.volume;
                *count += 1;
            }
            _ => {
                if let Some((_, agg, count)) = current.take() {
                    if count == per_bucket {
                        out.push(agg);
                    }
                }
                current = Some((bucket, Candle { time: bucket, ..*c }, 1));
            }
        }
    }
    if let Some((_, agg, count)) = current {
        if count == per_bucket {
            out.push(agg);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly(n: usize, start: i64) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let base = 100.0 + i as f64;
                Candle {
                    time: start + i as i64 * 3600,
                    open: base,
                    high: base + 2.0,
                    low: base - 1.0,
                    close: base + 1.0,
                    volume: 10.0,
                }
            })
            .collect()
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("h4".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert_eq!(" D1 ".parse::<Timeframe>().unwrap(), Timeframe::D1);
        assert_eq!(Timeframe::M15.to_string(), "M15");
        assert!(matches!(
            "W1".parse::<Timeframe>(),
            Err(SignalforgeError::Configuration { .. })
        ));
    }

    #[test]
    fn neighbours_in_hierarchy() {
        assert_eq!(Timeframe::H1.lower(), Some(Timeframe::M30));
        assert_eq!(Timeframe::H1.higher(), Some(Timeframe::H4));
        assert_eq!(Timeframe::M5.lower(), None);
        assert_eq!(Timeframe::D1.higher(), None);
    }

    #[test]
    fn resample_hourly_to_four_hour() {
        let candles = hourly(8, 0);
        let h4 = resample(&candles, Timeframe::H1, Timeframe::H4).unwrap();
        assert_eq!(h4.len(), 2);
        assert_eq!(h4[0].time, 0);
        assert_eq!(h4[0].open, 100.0);
        assert_eq!(h4[0].high, 105.0);
        assert_eq!(h4[0].low, 99.0);
        assert_eq!(h4[0].close, 104.0);
        assert_eq!(h4[0].volume, 40.0);
        assert_eq!(h4[1].time, 4 * 3600);
    }

    #[test]
    fn resample_drops_partial_buckets() {
        // Starts two hours into a bucket and ends one hour into another.
        let candles = hourly(7, 2 * 3600);
        let h4 = resample(&candles, Timeframe::H1, Timeframe::H4).unwrap();
        assert_eq!(h4.len(), 1);
        assert_eq!(h4[0].time, 4 * 3600);
    }

    #[test]
    fn resample_rejects_downsampling() {
        assert!(resample(&hourly(4, 0), Timeframe::H4, Timeframe::H1).is_none());
        assert!(resample(&hourly(4, 0), Timeframe::H1, Timeframe::H1).is_some());
    }
}
