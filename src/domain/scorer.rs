//! Weighted composite scoring.
//!
//! Every category arrives as a `Result<CategoryScore, ExtractorError>`. A
//! failed category contributes its neutral default, so one broken extractor
//! never aborts the analysis. The weighted sum is scaled by the session
//! multiplier and gated before a [`CompositeSignal`] is emitted.

use std::fmt;

use serde::Serialize;

use crate::domain::error::ExtractorError;
use crate::domain::feature::{Bias, Category, CategoryScore, Reason, ReasonCode};
use crate::domain::session::SessionQuality;
use crate::domain::support_resistance::SrLevels;
use crate::domain::technical::{BandPosition, Crossover, OscillatorStatus, TechnicalSnapshot};
use crate::ports::commentary_port::CommentaryProvider;

pub const MIN_SCORE: f64 = 45.0;
pub const MIN_SCORE_GAP: f64 = 10.0;
pub const MAX_CONFIDENCE: f64 = 95.0;
pub const MAX_REASONS: usize = 8;
pub const SR_PROXIMITY_PCT: f64 = 0.3;
const MAX_COMMENTARY_ADJUSTMENT: f64 = 20.0;
const MIN_COMMENTARY_CONFIDENCE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// +1 for BUY, −1 for SELL.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }

    pub fn bias(self) -> Bias {
        match self {
            Direction::Buy => Bias::Bullish,
            Direction::Sell => Bias::Bearish,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "LONG" => Ok(Direction::Buy),
            "SELL" | "SHORT" => Ok(Direction::Sell),
            other => Err(format!("unknown direction '{}': expected BUY or SELL", other)),
        }
    }
}

/// Category weights. Session quality is multiplicative and not listed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Weights {
    pub mtf: f64,
    pub technical: f64,
    pub smart_money: f64,
    pub patterns: f64,
    pub volume: f64,
    pub support_resistance: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Weights {
            mtf: 0.25,
            technical: 0.20,
            smart_money: 0.15,
            patterns: 0.15,
            volume: 0.10,
            support_resistance: 0.10,
        }
    }
}

/// Per-category results fed to [`score`].
#[derive(Debug, Clone)]
pub struct CategoryInputs {
    pub technical: Result<CategoryScore, ExtractorError>,
    pub mtf: Result<CategoryScore, ExtractorError>,
    pub patterns: Result<CategoryScore, ExtractorError>,
    pub support_resistance: Result<CategoryScore, ExtractorError>,
    pub smart_money: Result<CategoryScore, ExtractorError>,
    pub volume: Result<CategoryScore, ExtractorError>,
    pub session: Option<SessionQuality>,
}

/// Score a category takes when its extractor failed.
pub fn neutral_score(category: Category) -> CategoryScore {
    match category {
        Category::SupportResistance | Category::Volume => CategoryScore::neutral(50.0),
        _ => CategoryScore::neutral(0.0),
    }
}

fn resolve(category: Category, result: &Result<CategoryScore, ExtractorError>) -> CategoryScore {
    match result {
        Ok(score) => score.clone(),
        Err(_) => neutral_score(category),
    }
}

/// Winning side's contribution per category, session multiplier ×100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub mtf: f64,
    pub technical: f64,
    pub smart_money: f64,
    pub patterns: f64,
    pub volume: f64,
    pub support_resistance: f64,
    pub session_quality: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeSignal {
    pub direction: Direction,
    pub confidence: f64,
    pub bullish_score: f64,
    pub bearish_score: f64,
    pub breakdown: ScoreBreakdown,
    pub reasons: Vec<Reason>,
}

/// Weighted totals and reasons whether or not the gate passes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSheet {
    pub bullish_score: f64,
    pub bearish_score: f64,
    pub session_multiplier: f64,
    pub reasons: Vec<Reason>,
    #[serde(skip)]
    categories: [CategoryScore; 6],
}

impl ScoreSheet {
    /// Applies the emission gate.
    pub fn signal(&self) -> Option<CompositeSignal> {
        let (bull, bear) = (self.bullish_score, self.bearish_score);
        let direction = if bull > bear && bull >= MIN_SCORE && bull - bear >= MIN_SCORE_GAP {
            Direction::Buy
        } else if bear > bull && bear >= MIN_SCORE && bear - bull >= MIN_SCORE_GAP {
            Direction::Sell
        } else {
            return None;
        };
        let winner = |s: &CategoryScore| match direction {
            Direction::Buy => s.bullish,
            Direction::Sell => s.bearish,
        };
        let [mtf, technical, smart_money, patterns, volume, support_resistance] = &self.categories;
        Some(CompositeSignal {
            direction,
            confidence: bull.max(bear).min(MAX_CONFIDENCE),
            bullish_score: bull,
            bearish_score: bear,
            breakdown: ScoreBreakdown {
                mtf: winner(mtf),
                technical: winner(technical),
                smart_money: winner(smart_money),
                patterns: winner(patterns),
                volume: winner(volume),
                support_resistance: winner(support_resistance),
                session_quality: (self.session_multiplier * 100.0).round(),
            },
            reasons: self.reasons.clone(),
        })
    }
}

pub fn score_sheet(inputs: &CategoryInputs, weights: &Weights) -> ScoreSheet {
    let technical = resolve(Category::Technical, &inputs.technical);
    let mtf = resolve(Category::Mtf, &inputs.mtf);
    let patterns = resolve(Category::Patterns, &inputs.patterns);
    let sr = resolve(Category::SupportResistance, &inputs.support_resistance);
    let smc = resolve(Category::SmartMoney, &inputs.smart_money);
    let volume = resolve(Category::Volume, &inputs.volume);
    let multiplier = inputs.session.map_or(1.0, SessionQuality::multiplier);

    let mut reasons: Vec<Reason> = Vec::new();
    reasons.extend(technical.reasons.iter().cloned());
    reasons.extend(mtf.reasons.iter().cloned());
    reasons.extend(patterns.reasons.iter().cloned());
    reasons.extend(sr.reasons.iter().cloned());
    reasons.extend(inputs.session.and_then(session_reason));
    reasons.extend(smc.reasons.iter().take(2).cloned());
    reasons.extend(volume.reasons.iter().take(1).cloned());
    reasons.truncate(MAX_REASONS);

    let weighted = |side: fn(&CategoryScore) -> f64| {
        side(&mtf) * weights.mtf
            + side(&technical) * weights.technical
            + side(&smc) * weights.smart_money
            + side(&patterns) * weights.patterns
            + side(&volume) * weights.volume
            + side(&sr) * weights.support_resistance
    };
    let bullish_score = (weighted(|s| s.bullish) * multiplier).clamp(0.0, 100.0);
    let bearish_score = (weighted(|s| s.bearish) * multiplier).clamp(0.0, 100.0);

    ScoreSheet {
        bullish_score,
        bearish_score,
        session_multiplier: multiplier,
        reasons,
        categories: [mtf, technical, smc, patterns, volume, sr],
    }
}

/// `None` is the no-signal outcome, not a failure.
pub fn score(inputs: &CategoryInputs, weights: &Weights) -> Option<CompositeSignal> {
    score_sheet(inputs, weights).signal()
}

fn session_reason(quality: SessionQuality) -> Option<Reason> {
    match quality {
        SessionQuality::High => Some(Reason::new(
            Category::Session,
            ReasonCode::SessionHigh,
            Bias::Neutral,
            "High Quality Session",
        )),
        SessionQuality::Low => Some(Reason::new(
            Category::Session,
            ReasonCode::SessionLow,
            Bias::Neutral,
            "Low Quality Session",
        )),
        SessionQuality::Medium => None,
    }
}

/// Indicator points as a percentage of the attainable maximum (100, or 145
/// once stochastic, Bollinger or ADX readings exist).
///
/// Oscillator extremes and band breaks that agree with a confirmed EMA stack
/// score in full as trend momentum rather than as reversal signals.
pub fn technical_score(t: &TechnicalSnapshot) -> CategoryScore {
    let mut bull = 0.0_f64;
    let mut bear = 0.0_f64;
    let mut reasons = Vec::new();
    let reason = |code, bias, text: String| Reason::new(Category::Technical, code, bias, text);
    let trend = t.ema.trend;

    if let Some(rsi) = &t.rsi {
        let v = rsi.value;
        match rsi.status {
            OscillatorStatus::Oversold if trend == Bias::Bearish => {
                bear += 25.0;
                reasons.push(
                    reason(
                        ReasonCode::RsiTrendMomentum,
                        Bias::Bearish,
                        format!("RSI Oversold in Downtrend ({:.1})", v),
                    )
                    .with_value("rsi", v),
                );
            }
            OscillatorStatus::Oversold => {
                bull += 25.0;
                reasons.push(
                    reason(ReasonCode::RsiOversold, Bias::Bullish, format!("RSI Oversold ({:.1})", v))
                        .with_value("rsi", v),
                );
            }
            OscillatorStatus::Overbought if trend == Bias::Bullish => {
                bull += 25.0;
                reasons.push(
                    reason(
                        ReasonCode::RsiTrendMomentum,
                        Bias::Bullish,
                        format!("RSI Overbought in Uptrend ({:.1})", v),
                    )
                    .with_value("rsi", v),
                );
            }
            OscillatorStatus::Overbought => {
                bear += 25.0;
                reasons.push(
                    reason(
                        ReasonCode::RsiOverbought,
                        Bias::Bearish,
                        format!("RSI Overbought ({:.1})", v),
                    )
                    .with_value("rsi", v),
                );
            }
            _ if v > 55.0 => bull += 8.0,
            _ if v < 45.0 => bear += 8.0,
            _ => {}
        }
    }

    if let Some(macd) = &t.macd {
        match macd.crossover {
            Crossover::BullishCross => {
                bull += 25.0;
                reasons.push(reason(
                    ReasonCode::MacdCross,
                    Bias::Bullish,
                    "MACD Bullish Crossover".to_string(),
                ));
            }
            Crossover::BearishCross => {
                bear += 25.0;
                reasons.push(reason(
                    ReasonCode::MacdCross,
                    Bias::Bearish,
                    "MACD Bearish Crossover".to_string(),
                ));
            }
            // A histogram that agrees with the EMA stack counts in full.
            // Anything short of a bullish histogram leans bearish.
            Crossover::NoCross => match (macd.status, trend) {
                (Bias::Bullish, Bias::Bullish) => bull += 25.0,
                (Bias::Bullish, _) => bull += 12.0,
                (Bias::Bearish, Bias::Bearish) => bear += 25.0,
                _ => bear += 12.0,
            },
        }
    }

    match trend {
        Bias::Bullish => {
            bull += 25.0;
            reasons.push(reason(
                ReasonCode::EmaAlignment,
                Bias::Bullish,
                "EMA Bullish Alignment".to_string(),
            ));
        }
        Bias::Bearish => {
            bear += 25.0;
            reasons.push(reason(
                ReasonCode::EmaAlignment,
                Bias::Bearish,
                "EMA Bearish Alignment".to_string(),
            ));
        }
        Bias::Neutral => {}
    }

    match t.divergence {
        Some(Bias::Bullish) => {
            bull += 25.0;
            reasons.push(reason(
                ReasonCode::RsiDivergence,
                Bias::Bullish,
                "Bullish Divergence".to_string(),
            ));
        }
        Some(Bias::Bearish) => {
            bear += 25.0;
            reasons.push(reason(
                ReasonCode::RsiDivergence,
                Bias::Bearish,
                "Bearish Divergence".to_string(),
            ));
        }
        _ => {}
    }

    if let Some(stoch) = &t.stochastic {
        match stoch.crossover {
            Crossover::BullishCross => {
                bull += 15.0;
                reasons.push(
                    reason(
                        ReasonCode::StochasticCross,
                        Bias::Bullish,
                        format!("Stochastic Bullish Cross ({:.0})", stoch.k),
                    )
                    .with_value("k", stoch.k),
                );
            }
            Crossover::BearishCross => {
                bear += 15.0;
                reasons.push(
                    reason(
                        ReasonCode::StochasticCross,
                        Bias::Bearish,
                        format!("Stochastic Bearish Cross ({:.0})", stoch.k),
                    )
                    .with_value("k", stoch.k),
                );
            }
            Crossover::NoCross => match stoch.status {
                OscillatorStatus::Oversold if trend == Bias::Bearish => bear += 15.0,
                OscillatorStatus::Oversold => bull += 10.0,
                OscillatorStatus::Overbought if trend == Bias::Bullish => bull += 15.0,
                OscillatorStatus::Overbought => bear += 10.0,
                _ => {}
            },
        }
    }

    if let Some(bb) = &t.bollinger {
        match bb.position {
            BandPosition::BelowLower if trend == Bias::Bearish => {
                bear += 15.0;
                reasons.push(reason(
                    ReasonCode::BollingerBreak,
                    Bias::Bearish,
                    "Price Walking Lower BB (Downtrend)".to_string(),
                ));
            }
            BandPosition::AboveUpper if trend == Bias::Bullish => {
                bull += 15.0;
                reasons.push(reason(
                    ReasonCode::BollingerBreak,
                    Bias::Bullish,
                    "Price Walking Upper BB (Uptrend)".to_string(),
                ));
            }
            BandPosition::BelowLower => {
                bull += 15.0;
                reasons.push(reason(
                    ReasonCode::BollingerBreak,
                    Bias::Bullish,
                    "Price Below Lower BB (Oversold)".to_string(),
                ));
            }
            BandPosition::AboveUpper => {
                bear += 15.0;
                reasons.push(reason(
                    ReasonCode::BollingerBreak,
                    Bias::Bearish,
                    "Price Above Upper BB (Overbought)".to_string(),
                ));
            }
            _ if bb.squeeze => {
                reasons.push(
                    reason(
                        ReasonCode::BollingerSqueeze,
                        Bias::Neutral,
                        "BB Squeeze - Breakout Imminent".to_string(),
                    )
                    .with_value("bandwidth", bb.bandwidth),
                );
            }
            _ => {}
        }
    }

    if let Some(adx) = &t.adx {
        if adx.adx > 25.0 {
            match adx.direction {
                Bias::Bullish => {
                    bull += 15.0;
                    reasons.push(
                        reason(
                            ReasonCode::AdxTrend,
                            Bias::Bullish,
                            format!("ADX Strong Bullish Trend ({:.0})", adx.adx),
                        )
                        .with_value("adx", adx.adx),
                    );
                }
                Bias::Bearish => {
                    bear += 15.0;
                    reasons.push(
                        reason(
                            ReasonCode::AdxTrend,
                            Bias::Bearish,
                            format!("ADX Strong Bearish Trend ({:.0})", adx.adx),
                        )
                        .with_value("adx", adx.adx),
                    );
                }
                Bias::Neutral => {}
            }
        } else if adx.adx < 15.0 {
            bull = (bull * 0.7).trunc();
            bear = (bear * 0.7).trunc();
        }
    }

    let max = if t.has_advanced() { 145.0 } else { 100.0 };
    CategoryScore {
        bullish: (bull / max * 100.0).min(100.0),
        bearish: (bear / max * 100.0).min(100.0),
        reasons,
    }
}

/// 85 for a side whose closest level lies within 0.3% of price, else 50.
pub fn support_resistance_score(levels: &SrLevels, price: f64) -> CategoryScore {
    let mut score = CategoryScore::neutral(50.0);
    if price <= 0.0 {
        return score;
    }
    let closest = |side: &[f64]| {
        side.iter()
            .copied()
            .min_by(|a, b| (a - price).abs().total_cmp(&(b - price).abs()))
    };
    let within = |level: f64| (price - level).abs() / price * 100.0 < SR_PROXIMITY_PCT;

    if let Some(level) = closest(&levels.support).filter(|&l| within(l)) {
        score.bullish = 85.0;
        score.reasons.push(
            Reason::new(
                Category::SupportResistance,
                ReasonCode::NearSupport,
                Bias::Bullish,
                "Near Strong Support",
            )
            .with_value("level", level),
        );
    }
    if let Some(level) = closest(&levels.resistance).filter(|&l| within(l)) {
        score.bearish = 85.0;
        score.reasons.push(
            Reason::new(
                Category::SupportResistance,
                ReasonCode::NearResistance,
                Bias::Bearish,
                "Near Strong Resistance",
            )
            .with_value("level", level),
        );
    }
    score
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    StrongBuy,
    StrongSell,
    Buy,
    Sell,
    CautiousBuy,
    CautiousSell,
    Wait,
}

pub fn recommend(direction: Direction, confidence: f64, risk_reward: f64) -> Recommendation {
    use Recommendation::*;
    let buy = direction == Direction::Buy;
    if confidence >= 80.0 && risk_reward >= 2.0 {
        if buy { StrongBuy } else { StrongSell }
    } else if confidence >= 70.0 && risk_reward >= 1.5 {
        if buy { Buy } else { Sell }
    } else if confidence >= 60.0 {
        if buy { CautiousBuy } else { CautiousSell }
    } else {
        Wait
    }
}

/// Lets an optional commentary provider nudge confidence by at most ±20.
///
/// Agreement raises confidence up to 95, disagreement lowers it to no less
/// than 40. Provider errors leave the signal unchanged.
pub fn apply_commentary(signal: &mut CompositeSignal, provider: &dyn CommentaryProvider) {
    let commentary = match provider.comment(signal) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "commentary provider failed; signal unchanged");
            return;
        }
    };
    let adjustment = commentary
        .adjustment
        .abs()
        .min(MAX_COMMENTARY_ADJUSTMENT);
    let before = signal.confidence;
    let (bias, verdict) = if commentary.agrees {
        signal.confidence = (before + adjustment).min(MAX_CONFIDENCE);
        (signal.direction.bias(), "agrees")
    } else {
        signal.confidence = (before - adjustment).max(MIN_COMMENTARY_CONFIDENCE);
        (signal.direction.bias().opposite(), "disagrees")
    };
    tracing::debug!(before, after = signal.confidence, agrees = commentary.agrees, "commentary applied");
    signal.reasons.push(
        Reason::new(
            Category::Commentary,
            ReasonCode::Commentary,
            bias,
            format!("Commentary {}: {}", verdict, commentary.note),
        )
        .with_value("adjustment", signal.confidence - before),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::SignalforgeError;
    use crate::domain::technical::{
        AdxReading, BollingerReading, EmaReading, MacdReading, RsiReading, StochasticReading,
        TrendStrength,
    };
    use crate::ports::commentary_port::Commentary;

    fn inputs(
        technical: CategoryScore,
        mtf: CategoryScore,
        patterns: CategoryScore,
        sr: CategoryScore,
        smc: CategoryScore,
        volume: CategoryScore,
        session: SessionQuality,
    ) -> CategoryInputs {
        CategoryInputs {
            technical: Ok(technical),
            mtf: Ok(mtf),
            patterns: Ok(patterns),
            support_resistance: Ok(sr),
            smart_money: Ok(smc),
            volume: Ok(volume),
            session: Some(session),
        }
    }

    fn all_failed() -> CategoryInputs {
        let fail = |category| {
            Err(ExtractorError {
                category,
                reason: "boom".to_string(),
            })
        };
        CategoryInputs {
            technical: fail(Category::Technical),
            mtf: fail(Category::Mtf),
            patterns: fail(Category::Patterns),
            support_resistance: fail(Category::SupportResistance),
            smart_money: fail(Category::SmartMoney),
            volume: fail(Category::Volume),
            session: None,
        }
    }

    fn snapshot(rsi: f64, trend: Bias) -> TechnicalSnapshot {
        TechnicalSnapshot {
            price: 1.1,
            rsi: Some(RsiReading {
                value: rsi,
                status: crate::domain::technical::oscillator_status(rsi, 30.0, 70.0),
            }),
            macd: None,
            ema: EmaReading {
                ema9: 1.1,
                ema21: 1.1,
                ema50: 1.1,
                trend,
                price_above_ema21: false,
            },
            divergence: None,
            stochastic: None,
            bollinger: None,
            adx: None,
            atr: None,
        }
    }

    #[test]
    fn failed_extractors_degrade_to_neutral_defaults() {
        let sheet = score_sheet(&all_failed(), &Weights::default());
        // Only S/R and volume have non-zero defaults: 50×0.1 + 50×0.1.
        assert!((sheet.bullish_score - 10.0).abs() < 1e-9);
        assert!((sheet.bearish_score - 10.0).abs() < 1e-9);
        assert!(sheet.signal().is_none());
    }

    #[test]
    fn strong_bullish_inputs_emit_buy() {
        let i = inputs(
            CategoryScore::new(80.0, 10.0),
            CategoryScore::new(100.0, 0.0),
            CategoryScore::new(85.0, 0.0),
            CategoryScore::neutral(50.0),
            CategoryScore::new(60.0, 0.0),
            CategoryScore::new(100.0, 0.0),
            SessionQuality::Medium,
        );
        let signal = score(&i, &Weights::default()).unwrap();
        assert_eq!(signal.direction, Direction::Buy);
        // 25 + 16 + 9 + 12.75 + 10 + 5
        assert!((signal.bullish_score - 77.75).abs() < 1e-9);
        assert!((signal.confidence - 77.75).abs() < 1e-9);
        assert_eq!(signal.breakdown.mtf, 100.0);
        assert_eq!(signal.breakdown.session_quality, 100.0);
    }

    #[test]
    fn gap_below_ten_is_no_signal() {
        let i = inputs(
            CategoryScore::new(90.0, 60.0),
            CategoryScore::new(90.0, 60.0),
            CategoryScore::new(90.0, 60.0),
            CategoryScore::new(90.0, 60.0),
            CategoryScore::new(90.0, 60.0),
            CategoryScore::new(90.0, 60.0),
            SessionQuality::Medium,
        );
        // 90 vs 60 raw, weights sum to 0.95: 85.5 vs 57 passes.
        assert!(score(&i, &Weights::default()).is_some());

        let close = inputs(
            CategoryScore::new(70.0, 62.0),
            CategoryScore::new(70.0, 62.0),
            CategoryScore::new(70.0, 62.0),
            CategoryScore::new(70.0, 62.0),
            CategoryScore::new(70.0, 62.0),
            CategoryScore::new(70.0, 62.0),
            SessionQuality::Medium,
        );
        assert!(score(&close, &Weights::default()).is_none());
    }

    #[test]
    fn session_multiplier_scales_and_clamps() {
        let full = CategoryScore::new(100.0, 0.0);
        let i = inputs(
            full.clone(),
            full.clone(),
            full.clone(),
            full.clone(),
            full.clone(),
            full,
            SessionQuality::High,
        );
        let sheet = score_sheet(&i, &Weights::default());
        assert_eq!(sheet.bullish_score, 100.0);
        let signal = sheet.signal().unwrap();
        assert_eq!(signal.confidence, MAX_CONFIDENCE);
        assert_eq!(signal.breakdown.session_quality, 115.0);
        assert_eq!(signal.reasons[0].code, ReasonCode::SessionHigh);
    }

    #[test]
    fn reasons_follow_category_order_and_cap() {
        let with_reasons = |category, n: usize| {
            let mut s = CategoryScore::new(100.0, 0.0);
            for i in 0..n {
                s.reasons.push(Reason::new(
                    category,
                    ReasonCode::Pattern,
                    Bias::Bullish,
                    format!("{} {}", category, i),
                ));
            }
            s
        };
        let i = inputs(
            with_reasons(Category::Technical, 3),
            with_reasons(Category::Mtf, 1),
            with_reasons(Category::Patterns, 2),
            CategoryScore::neutral(50.0),
            with_reasons(Category::SmartMoney, 4),
            with_reasons(Category::Volume, 3),
            SessionQuality::Medium,
        );
        let sheet = score_sheet(&i, &Weights::default());
        let cats: Vec<Category> = sheet.reasons.iter().map(|r| r.category).collect();
        assert_eq!(
            cats,
            vec![
                Category::Technical,
                Category::Technical,
                Category::Technical,
                Category::Mtf,
                Category::Patterns,
                Category::Patterns,
                Category::SmartMoney,
                Category::SmartMoney,
            ]
        );
    }

    #[test]
    fn rsi_extremes_respect_trend() {
        let counter = technical_score(&snapshot(75.0, Bias::Neutral));
        assert_eq!(counter.bearish, 25.0);
        assert_eq!(counter.reasons[0].code, ReasonCode::RsiOverbought);

        let momentum = technical_score(&snapshot(75.0, Bias::Bullish));
        // 25 (RSI momentum) + 25 (EMA stack) over 100.
        assert!((momentum.bullish - 50.0).abs() < 1e-9);
        assert_eq!(momentum.bearish, 0.0);
        assert_eq!(momentum.reasons[0].code, ReasonCode::RsiTrendMomentum);
    }

    fn macd(histogram: f64, status: Bias) -> MacdReading {
        MacdReading {
            line: histogram,
            signal: 0.0,
            histogram,
            status,
            crossover: Crossover::NoCross,
        }
    }

    #[test]
    fn zero_histogram_leans_bearish() {
        let mut t = snapshot(50.0, Bias::Neutral);
        t.macd = Some(macd(0.0, Bias::Neutral));
        let s = technical_score(&t);
        assert_eq!((s.bullish, s.bearish), (0.0, 12.0));
    }

    #[test]
    fn histogram_with_the_trend_scores_in_full() {
        let mut t = snapshot(50.0, Bias::Bullish);
        t.macd = Some(macd(0.0002, Bias::Bullish));
        // 25 (histogram) + 25 (EMA stack).
        assert_eq!(technical_score(&t).bullish, 50.0);

        let mut t = snapshot(50.0, Bias::Neutral);
        t.macd = Some(macd(0.0002, Bias::Bullish));
        assert_eq!(technical_score(&t).bullish, 12.0);

        let mut t = snapshot(50.0, Bias::Bearish);
        t.macd = Some(macd(-0.0002, Bias::Bearish));
        assert_eq!(technical_score(&t).bearish, 50.0);
    }

    #[test]
    fn band_walk_follows_the_trend() {
        let mut t = snapshot(50.0, Bias::Bullish);
        t.bollinger = Some(BollingerReading {
            upper: 1.09,
            middle: 1.08,
            lower: 1.07,
            bandwidth: 0.02,
            avg_bandwidth: 0.02,
            position: BandPosition::AboveUpper,
            squeeze: false,
            squeeze_alert: false,
        });
        let walk = technical_score(&t);
        // (25 + 15) over 145.
        assert!((walk.bullish - 40.0 / 145.0 * 100.0).abs() < 1e-9);
        assert_eq!(walk.bearish, 0.0);
        assert!(walk.reasons.iter().any(|r| r.text == "Price Walking Upper BB (Uptrend)"));

        t.ema.trend = Bias::Neutral;
        let stretched = technical_score(&t);
        assert!((stretched.bearish - 15.0 / 145.0 * 100.0).abs() < 1e-9);
        assert_eq!(stretched.bullish, 0.0);
    }

    #[test]
    fn stochastic_extreme_with_the_trend_is_momentum() {
        let mut t = snapshot(50.0, Bias::Bearish);
        t.stochastic = Some(StochasticReading {
            k: 8.0,
            d: 9.0,
            status: OscillatorStatus::Oversold,
            crossover: Crossover::NoCross,
        });
        // 25 (EMA stack) + 15 (stochastic) over 145.
        let s = technical_score(&t);
        assert!((s.bearish - 40.0 / 145.0 * 100.0).abs() < 1e-9);
        assert_eq!(s.bullish, 0.0);

        t.ema.trend = Bias::Neutral;
        let s = technical_score(&t);
        assert!((s.bullish - 10.0 / 145.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn weak_adx_dampens_with_truncation() {
        let mut t = snapshot(60.0, Bias::Bullish);
        t.adx = Some(AdxReading {
            adx: 12.0,
            plus_di: 20.0,
            minus_di: 18.0,
            strength: TrendStrength::Weak,
            direction: Bias::Bullish,
        });
        // (8 + 25) × 0.7 = 23.1 → 23, over 145.
        let s = technical_score(&t);
        assert!((s.bullish - 23.0 / 145.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn support_proximity() {
        let levels = SrLevels {
            resistance: vec![1.2000],
            support: vec![1.0950, 1.0990],
        };
        let s = support_resistance_score(&levels, 1.1000);
        assert_eq!(s.bullish, 85.0);
        assert_eq!(s.bearish, 50.0);
        assert_eq!(s.reasons[0].values, vec![("level", 1.0990)]);
        let far = support_resistance_score(&levels, 1.1500);
        assert_eq!((far.bullish, far.bearish), (50.0, 50.0));
    }

    #[test]
    fn recommendation_thresholds() {
        assert_eq!(recommend(Direction::Buy, 85.0, 2.0), Recommendation::StrongBuy);
        assert_eq!(recommend(Direction::Sell, 85.0, 1.6), Recommendation::Sell);
        assert_eq!(recommend(Direction::Buy, 72.0, 1.0), Recommendation::CautiousBuy);
        assert_eq!(recommend(Direction::Sell, 55.0, 3.0), Recommendation::Wait);
    }

    struct FixedCommentary(Result<Commentary, ()>);

    impl CommentaryProvider for FixedCommentary {
        fn comment(&self, _signal: &CompositeSignal) -> Result<Commentary, SignalforgeError> {
            self.0.clone().map_err(|_| SignalforgeError::DataSource {
                reason: "offline".to_string(),
            })
        }
    }

    fn buy_signal(confidence: f64) -> CompositeSignal {
        CompositeSignal {
            direction: Direction::Buy,
            confidence,
            bullish_score: confidence,
            bearish_score: 10.0,
            breakdown: ScoreBreakdown {
                mtf: 0.0,
                technical: 0.0,
                smart_money: 0.0,
                patterns: 0.0,
                volume: 0.0,
                support_resistance: 0.0,
                session_quality: 100.0,
            },
            reasons: Vec::new(),
        }
    }

    #[test]
    fn commentary_adjusts_within_bounds() {
        let mut signal = buy_signal(85.0);
        let agree = FixedCommentary(Ok(Commentary {
            agrees: true,
            adjustment: 50.0,
            note: "trend intact".to_string(),
        }));
        apply_commentary(&mut signal, &agree);
        assert_eq!(signal.confidence, 95.0);
        assert_eq!(signal.reasons.len(), 1);

        let mut signal = buy_signal(50.0);
        let disagree = FixedCommentary(Ok(Commentary {
            agrees: false,
            adjustment: 15.0,
            note: "overextended".to_string(),
        }));
        apply_commentary(&mut signal, &disagree);
        assert_eq!(signal.confidence, 40.0);
        assert_eq!(signal.reasons[0].bias, Bias::Bearish);
    }

    #[test]
    fn commentary_failure_is_ignored() {
        let mut signal = buy_signal(72.0);
        apply_commentary(&mut signal, &FixedCommentary(Err(())));
        assert_eq!(signal, buy_signal(72.0));
    }
}
