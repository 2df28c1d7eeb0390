//! Multi-timeframe confluence.
//!
//! The primary timeframe and its two neighbours are each reduced to a trend
//! vote; the share of timeframes agreeing on a direction is the alignment
//! score the composite scorer consumes. When only one timeframe has enough
//! history it must confirm its own vote before it counts.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::feature::patterns::{PatternReport, detect_patterns};
use crate::domain::feature::{Bias, Category, CategoryScore, Pattern, Reason, ReasonCode};
use crate::domain::indicator::{IndicatorValue, calculate_macd_default, calculate_rsi, rsi};
use crate::domain::support_resistance::{SrLevels, detect_levels};
use crate::domain::technical::{EmaReading, ema_reading};
use crate::domain::timeframe::{Timeframe, resample};

pub const MIN_CANDLES: usize = 30;
/// Trailing candles analysed per timeframe.
pub const WINDOW: usize = 100;
const AGREEMENT: f64 = 0.6;
const LEVEL_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Momentum {
    pub value: f64,
    pub direction: Bias,
    pub price_change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeAnalysis {
    pub timeframe: Timeframe,
    pub trend: Bias,
    pub momentum: Momentum,
    pub signal_strength: u32,
    pub price: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub histogram: f64,
    pub ema: EmaReading,
    pub patterns: Option<PatternReport>,
    pub levels: Option<SrLevels>,
    pub candles: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfluenceDirection {
    Bullish,
    Bearish,
    Mixed,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Confluence {
    pub bullish_count: usize,
    pub bearish_count: usize,
    pub neutral_count: usize,
    /// Largest agreeing share, 0–100.
    pub alignment_score: f64,
    pub direction: ConfluenceDirection,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframePattern {
    pub timeframe: Timeframe,
    #[serde(flatten)]
    pub pattern: Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyLevel {
    pub level: f64,
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeyLevels {
    pub resistance: Vec<KeyLevel>,
    pub support: Vec<KeyLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MtfAnalysis {
    pub primary: Timeframe,
    pub timeframes: Vec<TimeframeAnalysis>,
    pub confluence: Confluence,
    pub bullish_patterns: Vec<TimeframePattern>,
    pub bearish_patterns: Vec<TimeframePattern>,
    pub key_levels: KeyLevels,
}

/// Analyses `primary` plus the timeframe below and above it, lowest first.
///
/// Neighbour candles come from `others`; a missing higher neighbour is
/// resampled from the primary candles. Timeframes with fewer than
/// [`MIN_CANDLES`] candles are skipped.
pub fn analyze_timeframes(
    primary: Timeframe,
    primary_candles: &[Candle],
    others: &BTreeMap<Timeframe, Vec<Candle>>,
) -> MtfAnalysis {
    let mut timeframes = Vec::new();
    let wanted = [primary.lower(), Some(primary), primary.higher()];
    for tf in wanted.into_iter().flatten() {
        let resampled;
        let candles: &[Candle] = if tf == primary {
            primary_candles
        } else if let Some(c) = others.get(&tf) {
            c
        } else if tf > primary {
            resampled = resample(primary_candles, primary, tf).unwrap_or_default();
            &resampled
        } else {
            continue;
        };
        match analyze_single(tf, candles) {
            Some(analysis) => timeframes.push(analysis),
            None => tracing::debug!(timeframe = %tf, candles = candles.len(), "timeframe skipped"),
        }
    }

    let confluence = confluence(&timeframes);
    let (bullish_patterns, bearish_patterns) = collect_patterns(&timeframes);
    let key_levels = collect_key_levels(&timeframes);
    MtfAnalysis {
        primary,
        timeframes,
        confluence,
        bullish_patterns,
        bearish_patterns,
        key_levels,
    }
}

pub fn analyze_single(timeframe: Timeframe, candles: &[Candle]) -> Option<TimeframeAnalysis> {
    if candles.len() < MIN_CANDLES {
        return None;
    }
    let candles = &candles[candles.len().saturating_sub(WINDOW)..];
    let price = candles[candles.len() - 1].close;

    let rsi_values = calculate_rsi(candles, rsi::DEFAULT_PERIOD)
        .map(|s| s.valid_simple())
        .unwrap_or_default();
    let macd_values: Vec<(f64, f64, f64)> = calculate_macd_default(candles)
        .map(|s| {
            s.valid_values()
                .filter_map(|v| match v {
                    IndicatorValue::Macd {
                        line,
                        signal,
                        histogram,
                    } => Some((*line, *signal, *histogram)),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let rsi = rsi_values.last().copied().unwrap_or(50.0);
    let (macd, macd_signal, histogram) = macd_values.last().copied().unwrap_or((0.0, 0.0, 0.0));
    let histograms: Vec<f64> = macd_values.iter().map(|m| m.2).collect();
    let ema = ema_reading(candles, price);

    Some(TimeframeAnalysis {
        timeframe,
        trend: trend_vote(price, &ema, rsi, histogram),
        momentum: momentum(candles, &rsi_values, &histograms),
        signal_strength: signal_strength(rsi, histogram, &ema),
        price,
        rsi,
        macd,
        macd_signal,
        histogram,
        ema,
        patterns: detect_patterns(candles).ok(),
        levels: detect_levels(candles),
        candles: candles.len(),
    })
}

/// Five-point vote: EMA stack (2, or 1 for a partial stack), price vs
/// EMA21, MACD histogram sign and RSI vs 50. Four points decide.
pub fn trend_vote(price: f64, ema: &EmaReading, rsi: f64, histogram: f64) -> Bias {
    let mut bull = 0;
    let mut bear = 0;

    if ema.ema9 > ema.ema21 && ema.ema21 > ema.ema50 {
        bull += 2;
    } else if ema.ema9 < ema.ema21 && ema.ema21 < ema.ema50 {
        bear += 2;
    } else if ema.ema9 > ema.ema21 {
        bull += 1;
    } else if ema.ema9 < ema.ema21 {
        bear += 1;
    }

    if price > ema.ema21 {
        bull += 1;
    } else {
        bear += 1;
    }
    if histogram > 0.0 {
        bull += 1;
    } else {
        bear += 1;
    }
    if rsi > 50.0 {
        bull += 1;
    } else {
        bear += 1;
    }

    if bull >= 4 {
        Bias::Bullish
    } else if bear >= 4 {
        Bias::Bearish
    } else {
        Bias::Neutral
    }
}

fn nth_back(values: &[f64], n: usize) -> Option<f64> {
    values.len().checked_sub(n).map(|i| values[i])
}

pub fn momentum(candles: &[Candle], rsi_values: &[f64], histograms: &[f64]) -> Momentum {
    let neutral = Momentum {
        value: 0.0,
        direction: Bias::Neutral,
        price_change_pct: 0.0,
    };
    if candles.len() < 10 {
        return neutral;
    }
    let last = candles[candles.len() - 1].close;
    let base = candles[candles.len() - 5].close;
    if base == 0.0 {
        return neutral;
    }
    let price_change_pct = (last - base) / base * 100.0;
    let rsi_change = match (nth_back(rsi_values, 1), nth_back(rsi_values, 5)) {
        (Some(a), Some(b)) => a - b,
        _ => 0.0,
    };
    let hist_change = match (nth_back(histograms, 1), nth_back(histograms, 3)) {
        (Some(a), Some(b)) => a - b,
        _ => 0.0,
    };

    let value = price_change_pct * 10.0 + rsi_change * 0.5 + hist_change * 1000.0;
    let direction = if value > 1.0 {
        Bias::Bullish
    } else if value < -1.0 {
        Bias::Bearish
    } else {
        Bias::Neutral
    };
    Momentum {
        value,
        direction,
        price_change_pct,
    }
}

/// 0–100 around a base of 50.
pub fn signal_strength(rsi: f64, histogram: f64, ema: &EmaReading) -> u32 {
    let mut strength = 50.0;
    if rsi < 30.0 {
        strength += 20.0;
    } else if rsi > 70.0 {
        strength -= 20.0;
    } else if rsi > 60.0 {
        strength += 10.0;
    } else if rsi < 40.0 {
        strength -= 10.0;
    }

    match ema.trend {
        Bias::Bullish => strength += 15.0,
        Bias::Bearish => strength -= 15.0,
        Bias::Neutral => {}
    }

    strength += (histogram * 1000.0).clamp(-15.0, 15.0);
    strength.clamp(0.0, 100.0) as u32
}

/// Agreement across the analysed timeframes.
///
/// Two or more timeframes are directional when more than 60% share a vote.
/// A lone timeframe has nothing to agree with: it only counts when its EMA
/// stack and momentum both confirm the vote, otherwise it is neutral.
pub fn confluence(timeframes: &[TimeframeAnalysis]) -> Confluence {
    let count = |bias| timeframes.iter().filter(|t| t.trend == bias).count();
    let (bullish_count, bearish_count, neutral_count) =
        (count(Bias::Bullish), count(Bias::Bearish), count(Bias::Neutral));
    let neutral = Confluence {
        bullish_count,
        bearish_count,
        neutral_count,
        alignment_score: 0.0,
        direction: ConfluenceDirection::Neutral,
        confidence: 0.0,
    };

    let total = timeframes.len();
    match timeframes {
        [] => return neutral,
        [lone] if !is_confirmed(lone) => return neutral,
        _ => {}
    }
    let bull = bullish_count as f64 / total as f64;
    let bear = bearish_count as f64 / total as f64;
    let (direction, confidence) = if bull > AGREEMENT {
        (ConfluenceDirection::Bullish, bull * 100.0)
    } else if bear > AGREEMENT {
        (ConfluenceDirection::Bearish, bear * 100.0)
    } else {
        (ConfluenceDirection::Mixed, 50.0)
    };
    Confluence {
        bullish_count,
        bearish_count,
        neutral_count,
        alignment_score: bull.max(bear) * 100.0,
        direction,
        confidence,
    }
}

fn is_confirmed(tf: &TimeframeAnalysis) -> bool {
    tf.trend != Bias::Neutral && tf.ema.trend == tf.trend && tf.momentum.direction == tf.trend
}

fn collect_patterns(
    timeframes: &[TimeframeAnalysis],
) -> (Vec<TimeframePattern>, Vec<TimeframePattern>) {
    let mut bullish = Vec::new();
    let mut bearish = Vec::new();
    for tf in timeframes {
        let Some(report) = &tf.patterns else {
            continue;
        };
        let tag = |p: &Pattern| TimeframePattern {
            timeframe: tf.timeframe,
            pattern: p.clone(),
        };
        bullish.extend(report.bullish.iter().map(tag));
        bearish.extend(report.bearish.iter().map(tag));
    }
    (bullish, bearish)
}

fn collect_key_levels(timeframes: &[TimeframeAnalysis]) -> KeyLevels {
    let mut resistance = Vec::new();
    let mut support = Vec::new();
    for tf in timeframes {
        let Some(levels) = &tf.levels else {
            continue;
        };
        let tag = |&level: &f64| KeyLevel {
            level,
            timeframe: tf.timeframe,
        };
        resistance.extend(levels.resistance.iter().map(tag));
        support.extend(levels.support.iter().map(tag));
    }
    KeyLevels {
        resistance: dedupe_levels(resistance),
        support: dedupe_levels(support),
    }
}

/// Ascending, dropping any level within 0.1% of the previously kept one.
pub fn dedupe_levels(mut levels: Vec<KeyLevel>) -> Vec<KeyLevel> {
    levels.sort_by(|a, b| a.level.total_cmp(&b.level));
    let mut kept: Vec<KeyLevel> = Vec::with_capacity(levels.len());
    for level in levels {
        match kept.last() {
            Some(prev) if prev.level != 0.0
                && (level.level - prev.level).abs() / prev.level <= LEVEL_TOLERANCE => {}
            _ => kept.push(level),
        }
    }
    kept
}

impl MtfAnalysis {
    /// Agreeing share for the confluence direction; a mixed picture scores
    /// 30 on both sides.
    pub fn score(&self) -> CategoryScore {
        let alignment = self.confluence.alignment_score.min(100.0);
        let directional = |bias: Bias, label: &str| {
            Reason::new(
                Category::Mtf,
                ReasonCode::MtfConfluence,
                bias,
                format!("MTF {} Confluence ({:.0}%)", label, alignment),
            )
            .with_value("alignment", alignment)
        };
        match self.confluence.direction {
            ConfluenceDirection::Bullish => {
                let mut score = CategoryScore::new(alignment, 0.0);
                score.reasons.push(directional(Bias::Bullish, "Bullish"));
                score
            }
            ConfluenceDirection::Bearish => {
                let mut score = CategoryScore::new(0.0, alignment);
                score.reasons.push(directional(Bias::Bearish, "Bearish"));
                score
            }
            ConfluenceDirection::Mixed => CategoryScore::neutral(30.0),
            ConfluenceDirection::Neutral => CategoryScore::neutral(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending(n: usize, step: f64, start_time: i64, seconds: i64) -> Vec<Candle> {
        let mut close = 100.0;
        (0..n)
            .map(|i| {
                let open = close;
                close = open * step;
                let (hi, lo) = if close >= open { (close, open) } else { (open, close) };
                Candle {
                    time: start_time + i as i64 * seconds,
                    open,
                    high: hi + 0.05,
                    low: lo - 0.05,
                    close,
                    volume: 100.0,
                }
            })
            .collect()
    }

    fn ema(ema9: f64, ema21: f64, ema50: f64) -> EmaReading {
        EmaReading {
            ema9,
            ema21,
            ema50,
            trend: if ema9 > ema21 && ema21 > ema50 {
                Bias::Bullish
            } else if ema9 < ema21 && ema21 < ema50 {
                Bias::Bearish
            } else {
                Bias::Neutral
            },
            price_above_ema21: false,
        }
    }

    #[test]
    fn trend_vote_needs_four_points() {
        let stack = ema(1.3, 1.2, 1.1);
        assert_eq!(trend_vote(1.35, &stack, 60.0, 0.001), Bias::Bullish);
        // Stack (2) + price (1) but MACD and RSI against.
        assert_eq!(trend_vote(1.35, &stack, 40.0, -0.001), Bias::Neutral);
        let down = ema(1.1, 1.2, 1.3);
        assert_eq!(trend_vote(1.05, &down, 40.0, -0.001), Bias::Bearish);
    }

    #[test]
    fn signal_strength_bounds() {
        let stack = ema(1.3, 1.2, 1.1);
        assert_eq!(signal_strength(25.0, 1.0, &stack), 100);
        let down = ema(1.1, 1.2, 1.3);
        assert_eq!(signal_strength(80.0, -1.0, &down), 0);
        assert_eq!(signal_strength(50.0, 0.0, &ema(1.0, 1.0, 1.0)), 50);
    }

    #[test]
    fn confluence_requires_more_than_sixty_percent() {
        let base = analyze_single(Timeframe::H1, &trending(60, 1.002, 0, 3600)).unwrap();
        assert_eq!(base.trend, Bias::Bullish);
        let mut bear = base.clone();
        bear.trend = Bias::Bearish;
        let mut flat = base.clone();
        flat.trend = Bias::Neutral;

        let c = confluence(&[base.clone(), base.clone(), bear.clone()]);
        assert_eq!(c.direction, ConfluenceDirection::Bullish);
        assert!((c.alignment_score - 200.0 / 3.0).abs() < 1e-9);

        let c = confluence(&[base.clone(), bear, flat]);
        assert_eq!(c.direction, ConfluenceDirection::Mixed);
        assert_eq!(c.confidence, 50.0);

        let c = confluence(&[]);
        assert_eq!(c.direction, ConfluenceDirection::Neutral);
        assert_eq!(c.alignment_score, 0.0);
    }

    #[test]
    fn short_higher_resample_is_skipped() {
        let candles = trending(60, 1.002, 0, 3600);
        let mtf = analyze_timeframes(Timeframe::H1, &candles, &BTreeMap::new());
        assert_eq!(mtf.timeframes.len(), 1);
        assert_eq!(mtf.timeframes[0].timeframe, Timeframe::H1);
        assert_eq!(mtf.confluence.direction, ConfluenceDirection::Bullish);
        assert_eq!(mtf.confluence.alignment_score, 100.0);

        let score = mtf.score();
        assert_eq!(score.bullish, 100.0);
        assert_eq!(score.bearish, 0.0);
        assert_eq!(score.reasons[0].text, "MTF Bullish Confluence (100%)");
    }

    #[test]
    fn lone_timeframe_needs_confirmation() {
        let base = analyze_single(Timeframe::H1, &trending(60, 1.002, 0, 3600)).unwrap();
        assert_eq!(confluence(&[base.clone()]).direction, ConfluenceDirection::Bullish);

        let mut fading = base.clone();
        fading.momentum.direction = Bias::Neutral;
        let c = confluence(&[fading]);
        assert_eq!(c.direction, ConfluenceDirection::Neutral);
        assert_eq!(c.bullish_count, 1);
        assert_eq!(c.alignment_score, 0.0);

        let mut loose = base.clone();
        loose.ema.trend = Bias::Neutral;
        let mtf = MtfAnalysis {
            primary: Timeframe::H1,
            timeframes: vec![loose.clone()],
            confluence: confluence(&[loose]),
            bullish_patterns: Vec::new(),
            bearish_patterns: Vec::new(),
            key_levels: KeyLevels::default(),
        };
        let score = mtf.score();
        assert_eq!((score.bullish, score.bearish), (0.0, 0.0));
        assert!(score.reasons.is_empty());

        // Two timeframes fall back to the share rule.
        let mut other = base.clone();
        other.ema.trend = Bias::Neutral;
        assert_eq!(confluence(&[base, other]).direction, ConfluenceDirection::Bullish);
    }

    #[test]
    fn neighbours_from_caller_map() {
        let candles = trending(60, 1.002, 0, 3600);
        let mut others = BTreeMap::new();
        others.insert(Timeframe::M30, trending(60, 0.998, 0, 1800));
        others.insert(Timeframe::H4, trending(40, 0.998, 0, 4 * 3600));
        let mtf = analyze_timeframes(Timeframe::H1, &candles, &others);
        let order: Vec<Timeframe> = mtf.timeframes.iter().map(|t| t.timeframe).collect();
        assert_eq!(order, vec![Timeframe::M30, Timeframe::H1, Timeframe::H4]);
        assert_eq!(mtf.confluence.bearish_count, 2);
        assert_eq!(mtf.confluence.direction, ConfluenceDirection::Bearish);
        assert_eq!(mtf.score().bearish, mtf.confluence.alignment_score);
    }

    #[test]
    fn key_levels_deduplicated_within_tolerance() {
        let levels = vec![
            KeyLevel { level: 1.1000, timeframe: Timeframe::H1 },
            KeyLevel { level: 1.2000, timeframe: Timeframe::H4 },
            KeyLevel { level: 1.10005, timeframe: Timeframe::H4 },
        ];
        let kept = dedupe_levels(levels);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].timeframe, Timeframe::H1);
        assert_eq!(kept[1].level, 1.2);
    }

    #[test]
    fn momentum_direction_follows_price() {
        let up = trending(20, 1.002, 0, 3600);
        assert_eq!(momentum(&up, &[], &[]).direction, Bias::Bullish);
        let down = trending(20, 0.998, 0, 3600);
        assert_eq!(momentum(&down, &[], &[]).direction, Bias::Bearish);
        assert_eq!(momentum(&up[..9], &[], &[]).value, 0.0);
    }
}
