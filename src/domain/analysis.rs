//! End-to-end analysis of one candle window.
//!
//! Runs every extractor, scores the results and optionally sizes a trade.
//! Each category result is kept in an audit so callers can tell a degraded
//! extractor from one that legitimately found nothing.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::error::{ExtractorError, SignalforgeError};
use crate::domain::feature::market_structure::{analyze_structure, MarketStructure};
use crate::domain::feature::patterns::detect_patterns;
use crate::domain::feature::smart_money::analyze_smart_money;
use crate::domain::feature::volume::analyze_volume;
use crate::domain::feature::{Category, CategoryScore};
use crate::domain::mtf::{analyze_timeframes, MtfAnalysis};
use crate::domain::risk::{size_position, AccountState, RiskConfig, SetupRequest, SymbolMeta, TradeSetup};
use crate::domain::scorer::{
    self, neutral_score, recommend, score_sheet, support_resistance_score, technical_score,
    CategoryInputs, CompositeSignal, Recommendation, Weights,
};
use crate::domain::session::{session_info, SessionInfo};
use crate::domain::support_resistance::{self, detect_levels};
use crate::domain::technical::{TechnicalSnapshot, DEFAULT_DIVERGENCE_THRESHOLD};
use crate::domain::timeframe::Timeframe;
use crate::ports::commentary_port::CommentaryProvider;

pub const DEFAULT_MIN_CANDLES: usize = 50;
pub const DEFAULT_WINDOW: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub min_candles: usize,
    /// Trailing candles handed to the extractors.
    pub window: usize,
    pub divergence_threshold: f64,
    pub weights: Weights,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            symbol: String::new(),
            timeframe: Timeframe::H1,
            min_candles: DEFAULT_MIN_CANDLES,
            window: DEFAULT_WINDOW,
            divergence_threshold: DEFAULT_DIVERGENCE_THRESHOLD,
            weights: Weights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Signal,
    NoSignal,
}

/// Outcome of one scoring category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAudit {
    pub category: Category,
    /// Score the scorer used: the extractor's own, or the neutral default.
    pub score: CategoryScore,
    pub error: Option<ExtractorError>,
}

impl CategoryAudit {
    pub fn degraded(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub time: i64,
    pub price: f64,
    pub decision: Decision,
    pub signal: Option<CompositeSignal>,
    pub bullish_score: f64,
    pub bearish_score: f64,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub session: SessionInfo,
    pub technical: TechnicalSnapshot,
    pub market_structure: Option<MarketStructure>,
    pub mtf: MtfAnalysis,
    pub audit: Vec<CategoryAudit>,
    pub setup: Option<TradeSetup>,
    pub recommendation: Option<Recommendation>,
    pub setup_error: Option<String>,
}

/// Analyses the trailing `config.window` candles.
///
/// `others` may hold candles for the neighbouring timeframes. Returns
/// `InsufficientData` below `config.min_candles`; a window that scores
/// below the gate is `Ok` with [`Decision::NoSignal`].
pub fn analyze(
    candles: &[Candle],
    config: &AnalysisConfig,
    others: &BTreeMap<Timeframe, Vec<Candle>>,
) -> Result<Analysis, SignalforgeError> {
    let need = config.min_candles.max(1);
    if candles.len() < need {
        return Err(SignalforgeError::insufficient("analysis", candles.len(), need));
    }
    let window = &candles[candles.len().saturating_sub(config.window.max(need))..];
    let (time, price, hour) = match window.last() {
        Some(last) => (last.time, last.close, last.hour_utc()),
        None => return Err(SignalforgeError::insufficient("analysis", 0, need)),
    };

    let technical = TechnicalSnapshot::compute(window, config.divergence_threshold)
        .ok_or_else(|| SignalforgeError::insufficient("analysis", 0, need))?;
    let mtf = analyze_timeframes(config.timeframe, window, others);
    let levels = detect_levels(window);
    let session = session_info(hour);

    let mtf_score = if mtf.timeframes.is_empty() {
        Err(ExtractorError {
            category: Category::Mtf,
            reason: "no timeframe had enough candles".into(),
        })
    } else {
        Ok(mtf.score())
    };
    let sr_score = levels
        .as_ref()
        .map(|l| support_resistance_score(l, price))
        .ok_or_else(|| {
            ExtractorError::insufficient(
                Category::SupportResistance,
                window.len(),
                support_resistance::MIN_CANDLES,
            )
        });

    let inputs = CategoryInputs {
        technical: Ok(technical_score(&technical)),
        mtf: mtf_score,
        patterns: detect_patterns(window).map(|r| r.score()),
        support_resistance: sr_score,
        smart_money: analyze_smart_money(window).map(|r| r.score()),
        volume: analyze_volume(window).map(|r| r.score()),
        session: Some(session.quality),
    };
    let audit = audit(&inputs);
    for entry in audit.iter().filter(|a| a.degraded()) {
        if let Some(err) = &entry.error {
            tracing::warn!(category = %entry.category, reason = %err.reason, "extractor degraded");
        }
    }

    let market_structure = match analyze_structure(window) {
        Ok(ms) => Some(ms),
        Err(e) => {
            tracing::debug!(reason = %e.reason, "market structure unavailable");
            None
        }
    };

    let sheet = score_sheet(&inputs, &config.weights);
    let signal = sheet.signal();
    let decision = if signal.is_some() {
        Decision::Signal
    } else {
        Decision::NoSignal
    };
    tracing::debug!(
        bullish = sheet.bullish_score,
        bearish = sheet.bearish_score,
        ?decision,
        "window scored"
    );

    Ok(Analysis {
        symbol: config.symbol.clone(),
        timeframe: config.timeframe,
        time,
        price,
        decision,
        signal,
        bullish_score: sheet.bullish_score,
        bearish_score: sheet.bearish_score,
        support: levels.as_ref().and_then(|l| l.nearest_support(price)),
        resistance: levels.as_ref().and_then(|l| l.nearest_resistance(price)),
        session,
        technical,
        market_structure,
        mtf,
        audit,
        setup: None,
        recommendation: None,
        setup_error: None,
    })
}

fn audit(inputs: &CategoryInputs) -> Vec<CategoryAudit> {
    let entries = [
        (Category::Technical, &inputs.technical),
        (Category::Mtf, &inputs.mtf),
        (Category::Patterns, &inputs.patterns),
        (Category::SupportResistance, &inputs.support_resistance),
        (Category::SmartMoney, &inputs.smart_money),
        (Category::Volume, &inputs.volume),
    ];
    entries
        .into_iter()
        .map(|(category, result)| match result {
            Ok(score) => CategoryAudit {
                category,
                score: score.clone(),
                error: None,
            },
            Err(e) => CategoryAudit {
                category,
                score: neutral_score(category),
                error: Some(e.clone()),
            },
        })
        .collect()
}

impl Analysis {
    /// Sizes a trade for the signal, if any, and derives the recommendation.
    ///
    /// Sizing errors leave the analysis itself untouched.
    pub fn attach_setup(
        &mut self,
        account: &AccountState,
        meta: &SymbolMeta,
        risk: &RiskConfig,
    ) -> Result<(), SignalforgeError> {
        let Some(signal) = &self.signal else {
            return Ok(());
        };
        let request = SetupRequest {
            direction: signal.direction,
            entry: self.price,
            support: self.support,
            resistance: self.resistance,
            confidence: signal.confidence,
        };
        let setup = size_position(&request, account, meta, risk)?;
        self.recommendation = Some(recommend(signal.direction, signal.confidence, setup.risk_reward));
        self.setup = Some(setup);
        Ok(())
    }

    /// Lets a commentary provider adjust the signal's confidence.
    pub fn apply_commentary(&mut self, provider: &dyn CommentaryProvider) {
        if let Some(signal) = self.signal.as_mut() {
            scorer::apply_commentary(signal, provider);
        }
    }

    pub fn degraded_categories(&self) -> Vec<Category> {
        self.audit
            .iter()
            .filter(|a| a.degraded())
            .map(|a| a.category)
            .collect()
    }
}
