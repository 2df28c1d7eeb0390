//! Market structure: swing classification, Fibonacci levels, supply and
//! demand zones, pivot points.
//!
//! Reported alongside the signal for context; it does not contribute to the
//! composite score.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::error::ExtractorError;
use crate::domain::feature::{Bias, Category, Zone};
use crate::domain::indicator_helpers::mean;
use crate::domain::swing::{DEFAULT_LOOKBACK, find_swings};

pub const MIN_CANDLES: usize = 20;
const FIB_WINDOW: usize = 50;
const PIVOT_WINDOW: usize = 24;
const ZONE_MAX_AGE: usize = 40;

pub const RETRACEMENT_RATIOS: [f64; 9] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0, 1.272, 1.618];
pub const EXTENSION_RATIOS: [f64; 4] = [1.272, 1.618, 2.0, 2.618];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwingLabel {
    #[serde(rename = "HH")]
    HigherHigh,
    #[serde(rename = "LH")]
    LowerHigh,
    #[serde(rename = "EH")]
    EqualHigh,
    #[serde(rename = "HL")]
    HigherLow,
    #[serde(rename = "LL")]
    LowerLow,
    #[serde(rename = "EL")]
    EqualLow,
}

impl SwingLabel {
    fn bias(self) -> Bias {
        match self {
            SwingLabel::HigherHigh | SwingLabel::HigherLow => Bias::Bullish,
            SwingLabel::LowerHigh | SwingLabel::LowerLow => Bias::Bearish,
            SwingLabel::EqualHigh | SwingLabel::EqualLow => Bias::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedSwing {
    pub label: SwingLabel,
    pub price: f64,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructureTrend {
    StrongUptrend,
    Uptrend,
    StrongDowntrend,
    Downtrend,
    Ranging,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FibDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FibLevel {
    pub ratio: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fibonacci {
    pub direction: FibDirection,
    pub swing_high: f64,
    pub swing_low: f64,
    pub retracements: Vec<FibLevel>,
    pub extensions: Vec<FibLevel>,
    pub nearest: FibLevel,
    pub nearest_distance_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PivotPosition {
    AboveR1,
    AbovePp,
    BelowPp,
    BelowS1,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotPoints {
    pub pp: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
    pub position: PivotPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketStructure {
    pub swings: Vec<ClassifiedSwing>,
    pub trend: StructureTrend,
    pub fibonacci: Option<Fibonacci>,
    pub supply: Vec<Zone>,
    pub demand: Vec<Zone>,
    pub pivots: PivotPoints,
}

pub fn analyze_structure(candles: &[Candle]) -> Result<MarketStructure, ExtractorError> {
    if candles.len() < MIN_CANDLES {
        return Err(ExtractorError::insufficient(
            Category::MarketStructure,
            candles.len(),
            MIN_CANDLES,
        ));
    }
    let pivots = pivot_points(candles).ok_or_else(|| ExtractorError {
        category: Category::MarketStructure,
        reason: "no pivot window".to_string(),
    })?;

    let swings = classify_swings(candles);
    let trend = structure_trend(&swings);
    let (supply, demand) = supply_demand(candles);
    Ok(MarketStructure {
        trend,
        fibonacci: fibonacci(candles),
        supply,
        demand,
        pivots,
        swings,
    })
}

/// Labels each swing against the previous swing of the same kind and keeps
/// the ten most recent by candle index.
pub fn classify_swings(candles: &[Candle]) -> Vec<ClassifiedSwing> {
    let swings = find_swings(candles, DEFAULT_LOOKBACK);
    let mut classified = Vec::new();

    for pair in swings.highs.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        let label = if curr.price > prev.price {
            SwingLabel::HigherHigh
        } else if curr.price < prev.price {
            SwingLabel::LowerHigh
        } else {
            SwingLabel::EqualHigh
        };
        classified.push(ClassifiedSwing {
            label,
            price: curr.price,
            index: curr.index,
        });
    }
    for pair in swings.lows.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        let label = if curr.price > prev.price {
            SwingLabel::HigherLow
        } else if curr.price < prev.price {
            SwingLabel::LowerLow
        } else {
            SwingLabel::EqualLow
        };
        classified.push(ClassifiedSwing {
            label,
            price: curr.price,
            index: curr.index,
        });
    }

    classified.sort_by_key(|s| s.index);
    let start = classified.len().saturating_sub(10);
    classified.split_off(start)
}

pub fn structure_trend(swings: &[ClassifiedSwing]) -> StructureTrend {
    if swings.len() < 4 {
        return StructureTrend::Neutral;
    }
    let recent = &swings[swings.len().saturating_sub(6)..];
    let bullish = recent.iter().filter(|s| s.label.bias() == Bias::Bullish).count();
    let bearish = recent.iter().filter(|s| s.label.bias() == Bias::Bearish).count();

    if bullish >= 3 && bullish > bearish {
        StructureTrend::StrongUptrend
    } else if bearish >= 3 && bearish > bullish {
        StructureTrend::StrongDowntrend
    } else if bullish > bearish {
        StructureTrend::Uptrend
    } else if bearish > bullish {
        StructureTrend::Downtrend
    } else {
        StructureTrend::Ranging
    }
}

/// Levels anchored on the extreme high and low of the last 50 candles.
/// Direction is UP when the high printed after the low.
pub fn fibonacci(candles: &[Candle]) -> Option<Fibonacci> {
    let recent = &candles[candles.len().saturating_sub(FIB_WINDOW)..];
    if recent.len() < MIN_CANDLES {
        return None;
    }
    let (mut high_idx, mut low_idx) = (0, 0);
    for (i, c) in recent.iter().enumerate() {
        if c.high > recent[high_idx].high {
            high_idx = i;
        }
        if c.low < recent[low_idx].low {
            low_idx = i;
        }
    }
    let swing_high = recent[high_idx].high;
    let swing_low = recent[low_idx].low;
    if swing_high == swing_low {
        return None;
    }
    let range = swing_high - swing_low;

    let direction = if high_idx > low_idx {
        FibDirection::Up
    } else {
        FibDirection::Down
    };
    let level = |ratio: f64, from: f64, sign: f64| FibLevel {
        ratio,
        price: from + sign * range * ratio,
    };
    let (retracements, extensions): (Vec<FibLevel>, Vec<FibLevel>) = match direction {
        FibDirection::Up => (
            RETRACEMENT_RATIOS.iter().map(|&r| level(r, swing_high, -1.0)).collect(),
            EXTENSION_RATIOS.iter().map(|&r| level(r, swing_low, 1.0)).collect(),
        ),
        FibDirection::Down => (
            RETRACEMENT_RATIOS.iter().map(|&r| level(r, swing_low, 1.0)).collect(),
            EXTENSION_RATIOS.iter().map(|&r| level(r, swing_high, -1.0)).collect(),
        ),
    };

    let price = recent[recent.len() - 1].close;
    let nearest = retracements.iter().copied().fold(retracements[0], |best, l| {
        if (l.price - price).abs() < (best.price - price).abs() {
            l
        } else {
            best
        }
    });
    let nearest_distance_pct = if price != 0.0 {
        (nearest.price - price).abs() / price * 100.0
    } else {
        0.0
    };

    Some(Fibonacci {
        direction,
        swing_high,
        swing_low,
        retracements,
        extensions,
        nearest,
        nearest_distance_pct,
    })
}

/// Base candle (body under half the local average) followed by an
/// explosive candle (body over twice the average). Untested zones younger
/// than 40 candles are kept, the three strongest per side.
pub fn supply_demand(candles: &[Candle]) -> (Vec<Zone>, Vec<Zone>) {
    let mut supply = Vec::new();
    let mut demand = Vec::new();
    let n = candles.len();

    for i in 3..n.saturating_sub(1) {
        let bodies: Vec<f64> = candles[i.saturating_sub(10)..i].iter().map(Candle::body).collect();
        let avg_body = mean(&bodies);
        if avg_body == 0.0 {
            continue;
        }
        let base = &candles[i - 1];
        let impulse = &candles[i];
        if !(base.body() < avg_body * 0.5 && impulse.body() > avg_body * 2.0) {
            continue;
        }

        let age = n - 1 - i;
        let strength = ((impulse.body() / avg_body * 25.0) as u32).min(100);
        let later = &candles[i + 1..];
        let mut zone = Zone {
            bias: Bias::Neutral,
            low: base.low,
            high: base.high,
            index: i - 1,
            age,
            strength,
            tested: false,
        };
        if impulse.is_bullish() {
            zone.bias = Bias::Bullish;
            zone.tested = later.iter().any(|c| c.low <= zone.high);
            if age <= ZONE_MAX_AGE && !zone.tested {
                demand.push(zone);
            }
        } else if impulse.is_bearish() {
            zone.bias = Bias::Bearish;
            zone.tested = later.iter().any(|c| c.high >= zone.low);
            if age <= ZONE_MAX_AGE && !zone.tested {
                supply.push(zone);
            }
        }
    }

    supply.sort_by(|a, b| b.strength.cmp(&a.strength));
    demand.sort_by(|a, b| b.strength.cmp(&a.strength));
    supply.truncate(3);
    demand.truncate(3);
    (supply, demand)
}

/// Classic floor pivots over the trailing 24 candles as a proxy day.
pub fn pivot_points(candles: &[Candle]) -> Option<PivotPoints> {
    if candles.len() < 2 {
        return None;
    }
    let recent = &candles[candles.len().saturating_sub(PIVOT_WINDOW)..];
    let high = recent.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = recent.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let close = candles[candles.len() - 1].close;

    let pp = (high + low + close) / 3.0;
    let r1 = 2.0 * pp - low;
    let s1 = 2.0 * pp - high;
    let position = if close > r1 {
        PivotPosition::AboveR1
    } else if close > pp {
        PivotPosition::AbovePp
    } else if close > s1 {
        PivotPosition::BelowPp
    } else {
        PivotPosition::BelowS1
    };

    Some(PivotPoints {
        pp,
        r1,
        r2: pp + (high - low),
        r3: high + 2.0 * (pp - low),
        s1,
        s2: pp - (high - low),
        s3: low - 2.0 * (high - pp),
        position,
    })
}
