//! Feature extractors and the shared result vocabulary.
//!
//! Each extractor is a pure function from a candle window to a typed report.
//! Reports expose a [`CategoryScore`] that the composite scorer consumes; a
//! failing extractor returns an [`ExtractorError`](crate::domain::error::ExtractorError)
//! instead and the scorer substitutes the category's neutral default.

pub mod market_structure;
pub mod patterns;
pub mod smart_money;
pub mod volume;

use std::fmt;

use serde::Serialize;

/// Directional lean of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    pub fn opposite(self) -> Bias {
        match self {
            Bias::Bullish => Bias::Bearish,
            Bias::Bearish => Bias::Bullish,
            Bias::Neutral => Bias::Neutral,
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bias::Bullish => write!(f, "BULLISH"),
            Bias::Bearish => write!(f, "BEARISH"),
            Bias::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Scoring category. Declaration order is the order the scorer evaluates
/// categories and therefore the order reasons are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Technical,
    Mtf,
    Patterns,
    SupportResistance,
    Session,
    SmartMoney,
    Volume,
    MarketStructure,
    Commentary,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Technical => "technical",
            Category::Mtf => "mtf",
            Category::Patterns => "patterns",
            Category::SupportResistance => "support_resistance",
            Category::Session => "session",
            Category::SmartMoney => "smart_money",
            Category::Volume => "volume",
            Category::MarketStructure => "market_structure",
            Category::Commentary => "commentary",
        };
        write!(f, "{}", name)
    }
}

/// Machine-readable identity of a reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    RsiOversold,
    RsiOverbought,
    RsiTrendMomentum,
    MacdCross,
    EmaAlignment,
    RsiDivergence,
    StochasticCross,
    BollingerBreak,
    BollingerSqueeze,
    AdxTrend,
    MtfConfluence,
    Pattern,
    NearSupport,
    NearResistance,
    SessionHigh,
    SessionLow,
    StructureTrend,
    ChangeOfCharacter,
    OrderBlock,
    FairValueGap,
    LiquiditySweep,
    PremiumDiscount,
    Vwap,
    ObvTrend,
    VolumeDivergence,
    VolumeConfirmation,
    Commentary,
}

/// Structured explanation of one scoring contribution.
///
/// `text` is a rendered default; consumers that need their own wording use
/// `code`, `bias` and `values`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reason {
    pub category: Category,
    pub code: ReasonCode,
    pub bias: Bias,
    pub text: String,
    pub values: Vec<(&'static str, f64)>,
}

impl Reason {
    pub fn new(category: Category, code: ReasonCode, bias: Bias, text: impl Into<String>) -> Self {
        Reason {
            category,
            code,
            bias,
            text: text.into(),
            values: Vec::new(),
        }
    }

    pub fn with_value(mut self, name: &'static str, value: f64) -> Self {
        self.values.push((name, value));
        self
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Bullish/bearish percentages (0–100) for one category plus its reasons
/// in evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub bullish: f64,
    pub bearish: f64,
    pub reasons: Vec<Reason>,
}

impl CategoryScore {
    pub fn new(bullish: f64, bearish: f64) -> Self {
        CategoryScore {
            bullish,
            bearish,
            reasons: Vec::new(),
        }
    }

    /// Same value on both sides with no reasons.
    pub fn neutral(value: f64) -> Self {
        CategoryScore::new(value, value)
    }

    pub fn lean(&self) -> Bias {
        if self.bullish > self.bearish {
            Bias::Bullish
        } else if self.bearish > self.bullish {
            Bias::Bearish
        } else {
            Bias::Neutral
        }
    }
}

/// Chart or candlestick pattern classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Reversal,
    Continuation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub name: &'static str,
    pub kind: PatternKind,
    pub bias: Bias,
    pub strength: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBlock {
    pub bias: Bias,
    pub low: f64,
    pub high: f64,
    pub index: usize,
    pub age: usize,
    pub strength: u32,
    pub mitigated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FairValueGap {
    pub bias: Bias,
    pub top: f64,
    pub bottom: f64,
    pub mid: f64,
    pub index: usize,
    pub age: usize,
    pub filled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    pub bias: Bias,
    pub low: f64,
    pub high: f64,
    pub index: usize,
    pub age: usize,
    pub strength: u32,
    pub tested: bool,
}

/// Closed set of atomic observations an extractor can emit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureSignal {
    Pattern(Pattern),
    OrderBlock(OrderBlock),
    FairValueGap(FairValueGap),
    Zone(Zone),
}

impl FeatureSignal {
    /// Candles since formation; patterns describe the latest candle.
    pub fn age(&self) -> usize {
        match self {
            FeatureSignal::Pattern(_) => 0,
            FeatureSignal::OrderBlock(ob) => ob.age,
            FeatureSignal::FairValueGap(fvg) => fvg.age,
            FeatureSignal::Zone(zone) => zone.age,
        }
    }

    pub fn bias(&self) -> Bias {
        match self {
            FeatureSignal::Pattern(p) => p.bias,
            FeatureSignal::OrderBlock(ob) => ob.bias,
            FeatureSignal::FairValueGap(fvg) => fvg.bias,
            FeatureSignal::Zone(zone) => zone.bias,
        }
    }

    /// True once price has traded through the observation.
    pub fn is_spent(&self) -> bool {
        match self {
            FeatureSignal::Pattern(_) => false,
            FeatureSignal::OrderBlock(ob) => ob.mitigated,
            FeatureSignal::FairValueGap(fvg) => fvg.filled,
            FeatureSignal::Zone(zone) => zone.tested,
        }
    }
}

/// Percentage distance of `level` from `price`; infinite when price is not
/// positive.
pub(crate) fn distance_pct(price: f64, level: f64) -> f64 {
    if price > 0.0 {
        (price - level).abs() / price * 100.0
    } else {
        f64::INFINITY
    }
}
