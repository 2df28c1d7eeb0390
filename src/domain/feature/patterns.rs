//! Candlestick and chart pattern recognition.
//!
//! Candlestick patterns look at the last one to three candles; chart
//! patterns look at the last 10–30. Each detection carries a fixed strength.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::error::ExtractorError;
use crate::domain::feature::{Bias, Category, CategoryScore, Pattern, PatternKind, Reason, ReasonCode};
use crate::domain::indicator_helpers::{mean, population_std};

pub const MIN_CANDLES: usize = 10;
const CHART_MIN_CANDLES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternSignal {
    pub direction: Bias,
    pub confidence: f64,
    pub patterns: Vec<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternReport {
    pub bullish: Vec<Pattern>,
    pub bearish: Vec<Pattern>,
    pub signal: Option<PatternSignal>,
}

impl PatternReport {
    pub fn total_strength(&self, bias: Bias) -> u32 {
        let side = match bias {
            Bias::Bullish => &self.bullish,
            Bias::Bearish => &self.bearish,
            Bias::Neutral => return 0,
        };
        side.iter().map(|p| p.strength).sum()
    }

    /// Average strength per side, with the two leading patterns of each side
    /// as reasons.
    pub fn score(&self) -> CategoryScore {
        let mut score = CategoryScore::new(average(&self.bullish), average(&self.bearish));
        for pattern in self.bullish.iter().take(2).chain(self.bearish.iter().take(2)) {
            score.reasons.push(
                Reason::new(
                    Category::Patterns,
                    ReasonCode::Pattern,
                    pattern.bias,
                    format!("Pattern: {} ({}%)", pattern.name, pattern.strength),
                )
                .with_value("strength", pattern.strength as f64),
            );
        }
        score
    }
}

fn average(patterns: &[Pattern]) -> f64 {
    if patterns.is_empty() {
        return 0.0;
    }
    let total: u32 = patterns.iter().map(|p| p.strength).sum();
    (total as f64 / patterns.len() as f64).min(100.0)
}

pub fn detect_patterns(candles: &[Candle]) -> Result<PatternReport, ExtractorError> {
    if candles.len() < MIN_CANDLES {
        return Err(ExtractorError::insufficient(
            Category::Patterns,
            candles.len(),
            MIN_CANDLES,
        ));
    }

    let mut report = PatternReport::default();
    for pattern in candlestick_patterns(candles)
        .into_iter()
        .chain(chart_patterns(candles))
    {
        match pattern.bias {
            Bias::Bullish => report.bullish.push(pattern),
            Bias::Bearish => report.bearish.push(pattern),
            Bias::Neutral => {}
        }
    }
    report.signal = pattern_signal(&report);
    Ok(report)
}

fn pattern(name: &'static str, kind: PatternKind, bias: Bias, strength: u32) -> Pattern {
    Pattern {
        name,
        kind,
        bias,
        strength,
    }
}

fn candlestick_patterns(candles: &[Candle]) -> Vec<Pattern> {
    use PatternKind::{Continuation, Reversal};

    let mut found = Vec::new();
    let n = candles.len();
    let last = &candles[n - 1];
    let prev = &candles[n - 2];
    let prev2 = &candles[n - 3];

    if is_doji(last) {
        if prev.is_bearish() {
            found.push(pattern("Doji", Reversal, Bias::Bullish, 60));
        } else if prev.is_bullish() {
            found.push(pattern("Doji", Reversal, Bias::Bearish, 60));
        }
    }
    if is_hammer(last) {
        found.push(pattern("Hammer", Reversal, Bias::Bullish, 75));
    }
    if is_inverted_hammer(last) {
        found.push(pattern("Inverted Hammer", Reversal, Bias::Bullish, 70));
    }
    if candles[n - 5].close < last.close && is_hammer(last) {
        found.push(pattern("Hanging Man", Reversal, Bias::Bearish, 70));
    }
    if is_shooting_star(last) {
        found.push(pattern("Shooting Star", Reversal, Bias::Bearish, 75));
    }
    if prev.is_bearish() && last.is_bullish() && last.open < prev.close && last.close > prev.open {
        found.push(pattern("Bullish Engulfing", Reversal, Bias::Bullish, 85));
    }
    if prev.is_bullish() && last.is_bearish() && last.open > prev.close && last.close < prev.open {
        found.push(pattern("Bearish Engulfing", Reversal, Bias::Bearish, 85));
    }

    let first_mid = (prev2.open + prev2.close) / 2.0;
    let small_middle = prev.body() < prev2.body() * 0.3;
    if prev2.is_bearish() && small_middle && last.is_bullish() && last.close > first_mid {
        found.push(pattern("Morning Star", Reversal, Bias::Bullish, 90));
    }
    if prev2.is_bullish() && small_middle && last.is_bearish() && last.close < first_mid {
        found.push(pattern("Evening Star", Reversal, Bias::Bearish, 90));
    }

    let three = &candles[n - 3..];
    let soldiers = three.iter().all(Candle::is_bullish)
        && three[0].close < three[1].close
        && three[1].close < three[2].close
        && three.iter().all(|c| c.high - c.close < (c.close - c.open) * 0.3);
    if soldiers {
        found.push(pattern("Three White Soldiers", Continuation, Bias::Bullish, 85));
    }
    let crows = three.iter().all(Candle::is_bearish)
        && three[0].close > three[1].close
        && three[1].close > three[2].close
        && three.iter().all(|c| c.close - c.low < (c.open - c.close) * 0.3);
    if crows {
        found.push(pattern("Three Black Crows", Continuation, Bias::Bearish, 85));
    }

    let prev_mid = (prev.open + prev.close) / 2.0;
    if prev.is_bearish() && last.is_bullish() && last.close > prev_mid && last.open < prev.close {
        found.push(pattern("Piercing Line", Reversal, Bias::Bullish, 75));
    }
    if prev.is_bullish() && last.is_bearish() && last.close < prev_mid && last.open > prev.close {
        found.push(pattern("Dark Cloud Cover", Reversal, Bias::Bearish, 75));
    }

    found
}

fn is_doji(c: &Candle) -> bool {
    let range = c.range();
    range != 0.0 && c.body() / range < 0.1
}

fn is_hammer(c: &Candle) -> bool {
    let (body, range) = (c.body(), c.range());
    range != 0.0 && c.lower_wick() >= body * 2.0 && c.upper_wick() < body && body / range < 0.3
}

fn is_inverted_hammer(c: &Candle) -> bool {
    let (body, range) = (c.body(), c.range());
    range != 0.0 && c.upper_wick() >= body * 2.0 && c.lower_wick() < body && body / range < 0.3
}

fn is_shooting_star(c: &Candle) -> bool {
    let (body, range) = (c.body(), c.range());
    range != 0.0
        && c.upper_wick() >= body * 2.0
        && c.lower_wick() < body * 0.5
        && body / range < 0.3
}

fn chart_patterns(candles: &[Candle]) -> Vec<Pattern> {
    use PatternKind::{Continuation, Reversal};

    let mut found = Vec::new();
    if candles.len() < CHART_MIN_CANDLES {
        return found;
    }
    if is_double_bottom(candles) {
        found.push(pattern("Double Bottom", Reversal, Bias::Bullish, 85));
    }
    if is_double_top(candles) {
        found.push(pattern("Double Top", Reversal, Bias::Bearish, 85));
    }
    if is_head_and_shoulders(candles) {
        found.push(pattern("Head and Shoulders", Reversal, Bias::Bearish, 90));
    }
    if is_inverse_head_and_shoulders(candles) {
        found.push(pattern("Inverse Head and Shoulders", Reversal, Bias::Bullish, 90));
    }
    if let Some(bias) = triangle(candles) {
        let name = match bias {
            Bias::Bullish => "Ascending Triangle",
            _ => "Descending Triangle",
        };
        found.push(pattern(name, Continuation, bias, 75));
    }
    if let Some(bias) = flag(candles) {
        let name = match bias {
            Bias::Bullish => "Bull Flag",
            _ => "Bear Flag",
        };
        found.push(pattern(name, Continuation, bias, 70));
    }
    found
}

fn tail(candles: &[Candle], n: usize) -> &[Candle] {
    &candles[candles.len().saturating_sub(n)..]
}

/// First index of the extreme value, with `better(a, b)` true when `a`
/// should replace `b`.
fn first_extreme(values: &[f64], better: impl Fn(f64, f64) -> bool) -> Option<(usize, f64)> {
    values.iter().copied().enumerate().fold(None, |best, (i, v)| match best {
        Some((_, b)) if !better(v, b) => best,
        _ => Some((i, v)),
    })
}

fn is_double_bottom(candles: &[Candle]) -> bool {
    let lows: Vec<f64> = tail(candles, 20).iter().map(|c| c.low).collect();
    let Some((idx, min_low)) = first_extreme(&lows, |a, b| a < b) else {
        return false;
    };
    if idx <= 5 || idx + 5 >= lows.len() || min_low == 0.0 {
        return false;
    }
    let second = lows[idx + 5..].iter().copied().fold(f64::INFINITY, f64::min);
    (second - min_low).abs() / min_low < 0.01
}

fn is_double_top(candles: &[Candle]) -> bool {
    let highs: Vec<f64> = tail(candles, 20).iter().map(|c| c.high).collect();
    let Some((idx, max_high)) = first_extreme(&highs, |a, b| a > b) else {
        return false;
    };
    if idx <= 5 || idx + 5 >= highs.len() || max_high == 0.0 {
        return false;
    }
    let second = highs[idx + 5..].iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (second - max_high).abs() / max_high < 0.01
}

/// Indices whose value is the extreme of the surrounding 11-bar window.
fn window_extremes(values: &[f64], is_extreme: impl Fn(f64, &[f64]) -> bool) -> Vec<usize> {
    if values.len() < 11 {
        return Vec::new();
    }
    (5..values.len() - 5)
        .filter(|&i| is_extreme(values[i], &values[i - 5..=i + 5]))
        .collect()
}

fn is_head_and_shoulders(candles: &[Candle]) -> bool {
    if candles.len() < 30 {
        return false;
    }
    let highs: Vec<f64> = tail(candles, 30).iter().map(|c| c.high).collect();
    let peaks = window_extremes(&highs, |v, w| w.iter().all(|&x| v >= x));
    let [.., l, h, r] = peaks[..] else {
        return false;
    };
    let (left, head, right) = (highs[l], highs[h], highs[r]);
    head > left && head > right && left != 0.0 && (left - right).abs() / left < 0.02
}

fn is_inverse_head_and_shoulders(candles: &[Candle]) -> bool {
    if candles.len() < 30 {
        return false;
    }
    let lows: Vec<f64> = tail(candles, 30).iter().map(|c| c.low).collect();
    let valleys = window_extremes(&lows, |v, w| w.iter().all(|&x| v <= x));
    let [.., l, h, r] = valleys[..] else {
        return false;
    };
    let (left, head, right) = (lows[l], lows[h], lows[r]);
    head < left && head < right && left != 0.0 && (left - right).abs() / left < 0.02
}

/// Ascending: flat highs with rising lows. Descending: flat lows with
/// falling highs.
fn triangle(candles: &[Candle]) -> Option<Bias> {
    let window = tail(candles, 15);
    let highs: Vec<f64> = window.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = window.iter().map(|c| c.low).collect();
    let flatness = |values: &[f64]| {
        let m = mean(values);
        if m == 0.0 { f64::INFINITY } else { population_std(values) / m }
    };

    let first = window.first()?;
    let last = window.last()?;
    if flatness(&highs) < 0.005 && last.low > first.low {
        Some(Bias::Bullish)
    } else if flatness(&lows) < 0.005 && last.high < first.high {
        Some(Bias::Bearish)
    } else {
        None
    }
}

/// Impulse over the first five of the trailing ten candles, then a
/// consolidation that retraces less than 30% of it.
fn flag(candles: &[Candle]) -> Option<Bias> {
    let window = tail(candles, 10);
    if window.len() < 10 {
        return None;
    }
    let impulse = window[4].close - window[0].open;
    let consolidation = window[9].close - window[5].open;
    if impulse > 0.0 && consolidation.abs() < impulse * 0.3 {
        Some(Bias::Bullish)
    } else if impulse < 0.0 && consolidation.abs() < impulse.abs() * 0.3 {
        Some(Bias::Bearish)
    } else {
        None
    }
}

fn pattern_signal(report: &PatternReport) -> Option<PatternSignal> {
    let bull = report.total_strength(Bias::Bullish);
    let bear = report.total_strength(Bias::Bearish);
    let (direction, side, total) = if bull > bear && bull >= 100 {
        (Bias::Bullish, &report.bullish, bull)
    } else if bear > bull && bear >= 100 {
        (Bias::Bearish, &report.bearish, bear)
    } else {
        return None;
    };
    Some(PatternSignal {
        direction,
        confidence: (total as f64 / side.len() as f64).min(95.0),
        patterns: side.iter().map(|p| p.name).collect(),
    })
}
