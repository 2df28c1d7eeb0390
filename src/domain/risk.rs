//! Risk and trade-setup calculation.
//!
//! Turns a direction, entry price and optional support/resistance into a
//! concrete stop, target and lot size under an account-risk configuration.
//! Symbol metadata comes from the broker side; nothing here touches I/O.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::error::SignalforgeError;
use crate::domain::scorer::Direction;

pub const MAX_RISK_PERCENT: f64 = 5.0;
pub const MAX_DAILY_LOSS_PERCENT: f64 = 10.0;
pub const MAX_DRAWDOWN_PERCENT: f64 = 20.0;
pub const DEFAULT_TP_RATIOS: [f64; 3] = [1.0, 2.0, 3.0];
/// Minimum R:R when an explicit risk percentage replaces the risk level.
pub const EXPLICIT_RISK_MIN_RR: f64 = 1.5;
const SL_BUFFER_PIPS: f64 = 10.0;
const TP_BUFFER_PIPS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLevelParams {
    pub risk_percent: f64,
    pub min_rr: f64,
    pub min_confidence: f64,
}

impl RiskLevel {
    pub fn params(self) -> RiskLevelParams {
        match self {
            RiskLevel::Conservative => RiskLevelParams {
                risk_percent: 0.5,
                min_rr: 2.0,
                min_confidence: 80.0,
            },
            RiskLevel::Moderate => RiskLevelParams {
                risk_percent: 1.0,
                min_rr: 1.5,
                min_confidence: 70.0,
            },
            RiskLevel::Aggressive => RiskLevelParams {
                risk_percent: 2.0,
                min_rr: 1.0,
                min_confidence: 60.0,
            },
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Conservative => write!(f, "conservative"),
            RiskLevel::Moderate => write!(f, "moderate"),
            RiskLevel::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl FromStr for RiskLevel {
    type Err = SignalforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(RiskLevel::Conservative),
            "moderate" => Ok(RiskLevel::Moderate),
            "aggressive" => Ok(RiskLevel::Aggressive),
            other => Err(SignalforgeError::Configuration {
                reason: format!(
                    "unknown risk level '{}': expected conservative, moderate or aggressive",
                    other
                ),
            }),
        }
    }
}

/// Account-risk settings for one sizing call.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RiskConfig {
    pub level: RiskLevel,
    /// Overrides the level's base risk and disables confidence scaling.
    pub risk_percent: Option<f64>,
    pub min_rr: Option<f64>,
    /// Replaces the account balance as the sizing base.
    pub capital: Option<f64>,
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), SignalforgeError> {
        if let Some(capital) = self.capital {
            if !(capital > 0.0) {
                return Err(SignalforgeError::Configuration {
                    reason: format!("capital must be positive, got {}", capital),
                });
            }
        }
        if let Some(pct) = self.risk_percent {
            if !(pct > 0.0 && pct <= MAX_RISK_PERCENT) {
                return Err(SignalforgeError::Configuration {
                    reason: format!("risk percent must be in (0, {}], got {}", MAX_RISK_PERCENT, pct),
                });
            }
        }
        if let Some(rr) = self.min_rr {
            if !(rr > 0.0) {
                return Err(SignalforgeError::Configuration {
                    reason: format!("minimum R:R must be positive, got {}", rr),
                });
            }
        }
        Ok(())
    }

    pub fn min_rr(&self) -> f64 {
        match (self.min_rr, self.risk_percent) {
            (Some(rr), _) => rr,
            (None, Some(_)) => EXPLICIT_RISK_MIN_RR,
            (None, None) => self.level.params().min_rr,
        }
    }

    /// Risk percentage after confidence scaling. An explicit percentage is
    /// used as given.
    pub fn effective_risk_percent(&self, confidence: f64) -> f64 {
        if let Some(pct) = self.risk_percent {
            return pct;
        }
        let multiplier = if confidence >= 90.0 {
            1.2
        } else if confidence >= 80.0 {
            1.0
        } else if confidence >= 70.0 {
            0.8
        } else {
            0.5
        };
        self.level.params().risk_percent * multiplier
    }
}

/// Instrument family inferred from the symbol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolClass {
    Forex,
    Jpy,
    Metal,
    Index,
}

const INDEX_SYMBOLS: [&str; 5] = ["US30", "US500", "US100", "DE30", "UK100"];

impl SymbolClass {
    pub fn of(symbol: &str) -> SymbolClass {
        let upper = symbol.to_ascii_uppercase();
        if upper.contains("JPY") {
            SymbolClass::Jpy
        } else if upper.contains("XAU") || upper.contains("XAG") {
            SymbolClass::Metal
        } else if INDEX_SYMBOLS.iter().any(|idx| upper.contains(idx)) {
            SymbolClass::Index
        } else {
            SymbolClass::Forex
        }
    }

    pub fn pip_size(self) -> f64 {
        match self {
            SymbolClass::Forex => 0.0001,
            SymbolClass::Jpy => 0.01,
            SymbolClass::Metal => 0.1,
            SymbolClass::Index => 1.0,
        }
    }

    pub fn default_sl_pips(self) -> f64 {
        match self {
            SymbolClass::Forex => 30.0,
            SymbolClass::Jpy => 50.0,
            SymbolClass::Metal => 300.0,
            SymbolClass::Index => 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolMeta {
    pub name: String,
    pub point: f64,
    pub digits: u32,
    pub contract_size: f64,
    pub tick_value: f64,
    pub tick_size: f64,
    pub lot_min: f64,
    pub lot_max: f64,
    pub lot_step: f64,
}

impl SymbolMeta {
    pub fn validate(&self) -> Result<(), SignalforgeError> {
        let invalid = |reason: String| SignalforgeError::InvalidSymbolMetadata {
            symbol: self.name.clone(),
            reason,
        };
        let positive = [
            ("point", self.point),
            ("contract_size", self.contract_size),
            ("tick_value", self.tick_value),
            ("tick_size", self.tick_size),
            ("lot_min", self.lot_min),
            ("lot_max", self.lot_max),
            ("lot_step", self.lot_step),
        ];
        for (field, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(invalid(format!("{} must be positive, got {}", field, value)));
            }
        }
        if self.lot_min > self.lot_max {
            return Err(invalid(format!(
                "lot_min {} exceeds lot_max {}",
                self.lot_min, self.lot_max
            )));
        }
        Ok(())
    }

    pub fn class(&self) -> SymbolClass {
        SymbolClass::of(&self.name)
    }

    pub fn pip_size(&self) -> f64 {
        self.class().pip_size()
    }

    /// Account-currency value of one point for one lot.
    pub fn pip_value_per_lot(&self) -> f64 {
        self.tick_value / self.tick_size * self.point
    }

    /// Profit or loss of `lots` for a price move of `distance`.
    pub fn money(&self, distance: f64, lots: f64) -> f64 {
        distance * lots * self.tick_value / self.tick_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccountState {
    pub balance: f64,
    pub equity: f64,
    pub leverage: f64,
}

impl AccountState {
    /// Open-position drawdown as a percentage of balance.
    pub fn drawdown_pct(&self) -> f64 {
        if self.balance > 0.0 {
            (self.balance - self.equity) / self.balance * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSize {
    pub lot_size: f64,
    pub risk_amount: f64,
    pub risk_percent: f64,
    pub sl_distance_pips: f64,
    pub sl_distance_points: f64,
    pub margin_required: f64,
    pub free_margin_after: f64,
    pub can_open: bool,
}

/// Rounds to two decimals, or to the step's own precision when it is finer.
fn round_lots(lots: f64, step: f64) -> f64 {
    let decimals = if step >= 0.01 {
        2
    } else {
        (-step.log10()).ceil() as i32
    };
    let factor = 10f64.powi(decimals);
    (lots * factor).round() / factor
}

/// `lot = risk amount / (SL points × point value)`, floored to the lot step
/// and clamped to the symbol's limits.
pub fn position_size(
    meta: &SymbolMeta,
    balance: f64,
    equity: f64,
    leverage: f64,
    entry: f64,
    stop_loss: f64,
    risk_percent: f64,
) -> Result<PositionSize, SignalforgeError> {
    meta.validate()?;
    if !(balance > 0.0) {
        return Err(SignalforgeError::Configuration {
            reason: format!("capital must be positive, got {}", balance),
        });
    }
    let risk_percent = risk_percent.min(MAX_RISK_PERCENT);
    let risk_amount = balance * risk_percent / 100.0;
    let sl_distance = (entry - stop_loss).abs();
    let sl_points = sl_distance / meta.point;
    let pip_value = meta.pip_value_per_lot();

    let raw = if sl_points > 0.0 && pip_value > 0.0 {
        risk_amount / (sl_points * pip_value)
    } else {
        meta.lot_min
    };
    // The epsilon keeps 0.3 / 0.01 from flooring to 29 steps.
    let stepped = (raw / meta.lot_step + 1e-9).floor() * meta.lot_step;
    let lot_size = round_lots(stepped.clamp(meta.lot_min, meta.lot_max), meta.lot_step);

    let actual_risk = lot_size * sl_points * pip_value;
    let actual_pct = actual_risk / balance * 100.0;
    let leverage = if leverage > 0.0 { leverage } else { 1.0 };
    let margin_required = lot_size * meta.contract_size * entry / leverage;
    let free_margin_after = equity - margin_required;

    Ok(PositionSize {
        lot_size,
        risk_amount: actual_risk,
        risk_percent: actual_pct,
        sl_distance_pips: sl_distance / meta.pip_size(),
        sl_distance_points: sl_points,
        margin_required,
        free_margin_after,
        can_open: free_margin_after > 0.0 && actual_pct <= MAX_RISK_PERCENT,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RrQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReward {
    pub ratio: f64,
    pub risk: f64,
    pub reward: f64,
    pub is_favorable: bool,
    pub quality: RrQuality,
}

pub fn risk_reward(entry: f64, stop_loss: f64, take_profit: f64) -> RiskReward {
    let risk = (entry - stop_loss).abs();
    let reward = (take_profit - entry).abs();
    let ratio = if risk > 0.0 { reward / risk } else { 0.0 };
    let quality = if ratio >= 3.0 {
        RrQuality::Excellent
    } else if ratio >= 2.0 {
        RrQuality::Good
    } else if ratio >= 1.5 {
        RrQuality::Fair
    } else {
        RrQuality::Poor
    };
    RiskReward {
        ratio,
        risk,
        reward,
        is_favorable: ratio >= 1.5,
        quality,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TakeProfitLevel {
    pub level: usize,
    pub price: f64,
    pub risk_reward: f64,
    pub distance: f64,
}

pub fn take_profit_levels(
    entry: f64,
    stop_loss: f64,
    direction: Direction,
    ratios: &[f64],
) -> Vec<TakeProfitLevel> {
    let risk = (entry - stop_loss).abs();
    ratios
        .iter()
        .enumerate()
        .map(|(i, &rr)| TakeProfitLevel {
            level: i + 1,
            price: entry + direction.sign() * risk * rr,
            risk_reward: rr,
            distance: risk * rr,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskGrade {
    Low,
    Moderate,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskWarning {
    PoorRiskReward { ratio: f64 },
    HighRisk { risk_percent: f64 },
    LowFreeMargin { free_margin: f64 },
    AccountDrawdown { drawdown_pct: f64 },
}

impl RiskWarning {
    pub fn recommendation(&self) -> &'static str {
        match self {
            RiskWarning::PoorRiskReward { .. } => {
                "Consider wider take profit or tighter stop loss"
            }
            RiskWarning::HighRisk { .. } => "Reduce position size",
            RiskWarning::LowFreeMargin { .. } => "Reduce lot size or wait for more margin",
            RiskWarning::AccountDrawdown { .. } => {
                "Consider reducing risk until equity recovers"
            }
        }
    }
}

impl fmt::Display for RiskWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskWarning::PoorRiskReward { ratio } => {
                write!(f, "Risk/Reward ratio {:.2} is below 1.5", ratio)
            }
            RiskWarning::HighRisk { risk_percent } => {
                write!(f, "Risk {:.2}% is above recommended 2%", risk_percent)
            }
            RiskWarning::LowFreeMargin { .. } => write!(f, "Low free margin after trade"),
            RiskWarning::AccountDrawdown { drawdown_pct } => {
                write!(f, "Account drawdown is {:.1}%", drawdown_pct)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub grade: RiskGrade,
    /// 0–100, higher is safer.
    pub score: u32,
    pub can_proceed: bool,
    pub warnings: Vec<RiskWarning>,
    pub recommendations: Vec<&'static str>,
    pub drawdown_pct: f64,
}

pub fn assess_risk(
    rr: &RiskReward,
    size: &PositionSize,
    balance: f64,
    drawdown_pct: f64,
) -> RiskAssessment {
    let mut score: i32 = 100;
    let mut warnings = Vec::new();

    if rr.ratio < 1.5 {
        score -= 20;
        warnings.push(RiskWarning::PoorRiskReward { ratio: rr.ratio });
    }
    if size.risk_percent > 2.0 {
        score -= 15;
        warnings.push(RiskWarning::HighRisk {
            risk_percent: size.risk_percent,
        });
    }
    if size.free_margin_after < balance * 0.1 {
        score -= 25;
        warnings.push(RiskWarning::LowFreeMargin {
            free_margin: size.free_margin_after,
        });
    }
    if drawdown_pct > 10.0 {
        score -= 20;
        warnings.push(RiskWarning::AccountDrawdown { drawdown_pct });
    }

    let grade = if score >= 80 {
        RiskGrade::Low
    } else if score >= 60 {
        RiskGrade::Moderate
    } else if score >= 40 {
        RiskGrade::High
    } else {
        RiskGrade::VeryHigh
    };
    RiskAssessment {
        grade,
        score: score.max(0) as u32,
        can_proceed: score >= 40 && drawdown_pct < MAX_DRAWDOWN_PERCENT,
        recommendations: warnings.iter().map(RiskWarning::recommendation).collect(),
        warnings,
        drawdown_pct,
    }
}

/// Inputs of one setup calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupRequest {
    pub direction: Direction,
    pub entry: f64,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeSetup {
    pub symbol: String,
    pub direction: Direction,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub lot_size: f64,
    /// Realised risk of the rounded lot size.
    pub risk_percent: f64,
    pub risk_amount: f64,
    pub risk_reward: f64,
    /// Risk percentage requested after confidence scaling.
    pub effective_risk_percent: f64,
    pub take_profit_levels: Vec<TakeProfitLevel>,
    pub position: PositionSize,
    pub assessment: RiskAssessment,
    pub custom_capital_used: bool,
}

/// Stop beyond a level on the correct side of entry, else the symbol-class
/// default distance. Always strictly on the loss side.
pub fn stop_loss(direction: Direction, entry: f64, level: Option<f64>, class: SymbolClass) -> f64 {
    let pip = class.pip_size();
    let default = entry - direction.sign() * class.default_sl_pips() * pip;
    let candidate = match (direction, level) {
        (Direction::Buy, Some(support)) if support > 0.0 && support < entry => {
            support - SL_BUFFER_PIPS * pip
        }
        (Direction::Sell, Some(resistance)) if resistance > entry => {
            resistance + SL_BUFFER_PIPS * pip
        }
        _ => default,
    };
    let on_loss_side = match direction {
        Direction::Buy => candidate < entry,
        Direction::Sell => candidate > entry,
    };
    if on_loss_side { candidate } else { default }
}

/// Target at `min_rr` times the risk, pulled in to just before an opposing
/// level when that still pays at least 1:1.
pub fn take_profit(
    direction: Direction,
    entry: f64,
    stop_loss: f64,
    level: Option<f64>,
    min_rr: f64,
    class: SymbolClass,
) -> f64 {
    let risk = (entry - stop_loss).abs();
    let sign = direction.sign();
    let base = entry + sign * risk * min_rr;
    let Some(level) = level else {
        return base;
    };
    // Level must lie between entry and the base target.
    let between = match direction {
        Direction::Buy => level > entry && level < base,
        Direction::Sell => level < entry && level > base && level > 0.0,
    };
    if !between || risk <= 0.0 {
        return base;
    }
    let candidate = level - sign * TP_BUFFER_PIPS * class.pip_size();
    if (candidate - entry) * sign / risk >= 1.0 {
        candidate
    } else {
        base
    }
}

/// Entry, stop, target and size for one signal.
pub fn size_position(
    request: &SetupRequest,
    account: &AccountState,
    meta: &SymbolMeta,
    config: &RiskConfig,
) -> Result<TradeSetup, SignalforgeError> {
    config.validate()?;
    meta.validate()?;
    if !(request.entry > 0.0 && request.entry.is_finite()) {
        return Err(SignalforgeError::Configuration {
            reason: format!("entry price must be positive, got {}", request.entry),
        });
    }
    let balance = config.capital.unwrap_or(account.balance);
    let equity = config.capital.unwrap_or(account.equity);
    if !(balance > 0.0) {
        return Err(SignalforgeError::Configuration {
            reason: format!("capital must be positive, got {}", balance),
        });
    }

    let class = meta.class();
    let direction = request.direction;
    let entry = request.entry;
    let (loss_level, target_level) = match direction {
        Direction::Buy => (request.support, request.resistance),
        Direction::Sell => (request.resistance, request.support),
    };
    let sl = stop_loss(direction, entry, loss_level, class);
    let tp = take_profit(direction, entry, sl, target_level, config.min_rr(), class);

    let effective_risk_percent = config.effective_risk_percent(request.confidence);
    let position = position_size(
        meta,
        balance,
        equity,
        account.leverage,
        entry,
        sl,
        effective_risk_percent,
    )?;
    let rr = risk_reward(entry, sl, tp);
    let assessment = assess_risk(&rr, &position, balance, account.drawdown_pct());

    tracing::debug!(
        symbol = %meta.name,
        direction = %direction,
        entry,
        stop_loss = sl,
        take_profit = tp,
        lots = position.lot_size,
        "trade setup sized"
    );

    Ok(TradeSetup {
        symbol: meta.name.clone(),
        direction,
        entry,
        stop_loss: sl,
        take_profit: tp,
        lot_size: position.lot_size,
        risk_percent: position.risk_percent,
        risk_amount: position.risk_amount,
        risk_reward: rr.ratio,
        effective_risk_percent,
        take_profit_levels: take_profit_levels(entry, sl, direction, &DEFAULT_TP_RATIOS),
        position,
        assessment,
        custom_capital_used: config.capital.is_some(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyLimits {
    pub can_trade: bool,
    pub daily_pnl: f64,
    pub daily_pnl_percent: f64,
    pub max_daily_loss_percent: f64,
    pub warnings: Vec<String>,
}

/// Uses equity against balance as the day's running P&L.
pub fn check_daily_limits(account: &AccountState) -> DailyLimits {
    let daily_pnl = account.equity - account.balance;
    let daily_pnl_percent = if account.balance > 0.0 {
        daily_pnl / account.balance * 100.0
    } else {
        0.0
    };
    let mut warnings = Vec::new();
    let can_trade = daily_pnl_percent >= -MAX_DAILY_LOSS_PERCENT;
    if !can_trade {
        warnings.push(format!("Daily loss limit reached: {:.1}%", daily_pnl_percent));
    }
    if daily_pnl_percent < -MAX_DAILY_LOSS_PERCENT / 2.0 {
        warnings.push(format!("Approaching daily loss limit: {:.1}%", daily_pnl_percent));
    }
    DailyLimits {
        can_trade,
        daily_pnl,
        daily_pnl_percent,
        max_daily_loss_percent: MAX_DAILY_LOSS_PERCENT,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn eurusd() -> SymbolMeta {
        SymbolMeta {
            name: "EURUSD".into(),
            point: 0.00001,
            digits: 5,
            contract_size: 100_000.0,
            tick_value: 1.0,
            tick_size: 0.00001,
            lot_min: 0.01,
            lot_max: 100.0,
            lot_step: 0.01,
        }
    }

    fn account() -> AccountState {
        AccountState {
            balance: 10_000.0,
            equity: 10_000.0,
            leverage: 100.0,
        }
    }

    fn buy(entry: f64) -> SetupRequest {
        SetupRequest {
            direction: Direction::Buy,
            entry,
            support: None,
            resistance: None,
            confidence: 85.0,
        }
    }

    mod levels {
        use super::*;

        #[test]
        fn parse_risk_level() {
            assert_eq!("Aggressive".parse::<RiskLevel>().unwrap(), RiskLevel::Aggressive);
            assert!("reckless".parse::<RiskLevel>().is_err());
            assert_eq!(RiskLevel::Conservative.params().min_rr, 2.0);
            assert_eq!(RiskLevel::Moderate.to_string(), "moderate");
        }

        #[test]
        fn confidence_scales_level_risk() {
            let config = RiskConfig::default();
            assert_relative_eq!(config.effective_risk_percent(92.0), 1.2);
            assert_relative_eq!(config.effective_risk_percent(85.0), 1.0);
            assert_relative_eq!(config.effective_risk_percent(75.0), 0.8);
            assert_relative_eq!(config.effective_risk_percent(50.0), 0.5);
        }

        #[test]
        fn explicit_risk_skips_confidence_scaling() {
            let config = RiskConfig {
                risk_percent: Some(2.0),
                ..RiskConfig::default()
            };
            assert_eq!(config.effective_risk_percent(50.0), 2.0);
            assert_eq!(config.min_rr(), EXPLICIT_RISK_MIN_RR);
        }

        #[test]
        fn config_rejects_contradictions() {
            let bad = [
                RiskConfig {
                    capital: Some(0.0),
                    ..RiskConfig::default()
                },
                RiskConfig {
                    risk_percent: Some(6.0),
                    ..RiskConfig::default()
                },
                RiskConfig {
                    min_rr: Some(-1.0),
                    ..RiskConfig::default()
                },
            ];
            for config in bad {
                assert!(matches!(
                    config.validate(),
                    Err(SignalforgeError::Configuration { .. })
                ));
            }
        }
    }

    mod symbols {
        use super::*;

        #[test]
        fn class_from_name() {
            assert_eq!(SymbolClass::of("USDJPY"), SymbolClass::Jpy);
            assert_eq!(SymbolClass::of("xauusd"), SymbolClass::Metal);
            assert_eq!(SymbolClass::of("US500.cash"), SymbolClass::Index);
            assert_eq!(SymbolClass::of("GBPUSD"), SymbolClass::Forex);
        }

        #[test]
        fn invalid_metadata() {
            let mut meta = eurusd();
            meta.lot_step = 0.0;
            assert!(matches!(
                meta.validate(),
                Err(SignalforgeError::InvalidSymbolMetadata { .. })
            ));
            let mut meta = eurusd();
            meta.lot_min = 200.0;
            assert!(meta.validate().is_err());
        }

        #[test]
        fn pip_value_per_lot() {
            assert_relative_eq!(eurusd().pip_value_per_lot(), 1.0);
            assert_relative_eq!(eurusd().money(0.0010, 1.0), 100.0, epsilon = 1e-9);
        }
    }

    mod placement {
        use super::*;

        #[test]
        fn default_stop_when_no_support() {
            let sl = stop_loss(Direction::Buy, 1.1000, None, SymbolClass::Forex);
            assert_relative_eq!(sl, 1.0970, epsilon = 1e-12);
            let sl = stop_loss(Direction::Sell, 150.00, None, SymbolClass::Jpy);
            assert_relative_eq!(sl, 150.50, epsilon = 1e-9);
        }

        #[test]
        fn stop_below_valid_support() {
            let sl = stop_loss(Direction::Buy, 1.1000, Some(1.0950), SymbolClass::Forex);
            assert_relative_eq!(sl, 1.0940, epsilon = 1e-12);
        }

        #[test]
        fn support_above_entry_is_ignored() {
            let sl = stop_loss(Direction::Buy, 1.1000, Some(1.1050), SymbolClass::Forex);
            assert_relative_eq!(sl, 1.0970, epsilon = 1e-12);
        }

        #[test]
        fn target_tightened_only_above_one_to_one() {
            let tp = take_profit(Direction::Buy, 1.1000, 1.0970, None, 1.5, SymbolClass::Forex);
            assert_relative_eq!(tp, 1.1045, epsilon = 1e-12);

            let tp = take_profit(
                Direction::Buy,
                1.1000,
                1.0970,
                Some(1.1040),
                1.5,
                SymbolClass::Forex,
            );
            assert_relative_eq!(tp, 1.1035, epsilon = 1e-12);

            let tp = take_profit(
                Direction::Buy,
                1.1000,
                1.0970,
                Some(1.1020),
                1.5,
                SymbolClass::Forex,
            );
            assert_relative_eq!(tp, 1.1045, epsilon = 1e-12);
        }

        #[test]
        fn sell_target_below_entry() {
            let tp = take_profit(Direction::Sell, 1.1000, 1.1030, None, 2.0, SymbolClass::Forex);
            assert_relative_eq!(tp, 1.0940, epsilon = 1e-12);
        }
    }

    mod sizing {
        use super::*;

        #[test]
        fn one_percent_of_ten_thousand() {
            let size = position_size(&eurusd(), 10_000.0, 10_000.0, 100.0, 1.1000, 1.0970, 1.0)
                .unwrap();
            assert_eq!(size.lot_size, 0.33);
            assert_relative_eq!(size.risk_amount, 99.0, epsilon = 1e-6);
            assert_relative_eq!(size.sl_distance_pips, 30.0, epsilon = 1e-6);
            assert_relative_eq!(size.margin_required, 363.0, epsilon = 1e-6);
            assert!(size.can_open);
        }

        #[test]
        fn lot_clamped_to_symbol_limits() {
            let mut meta = eurusd();
            meta.lot_max = 1.0;
            let size = position_size(&meta, 1_000_000.0, 1_000_000.0, 100.0, 1.1, 1.097, 5.0)
                .unwrap();
            assert_eq!(size.lot_size, 1.0);

            let size = position_size(&eurusd(), 10.0, 10.0, 100.0, 1.1, 1.097, 1.0).unwrap();
            assert_eq!(size.lot_size, 0.01);
        }

        #[test]
        fn risk_percent_capped() {
            let size = position_size(&eurusd(), 10_000.0, 10_000.0, 100.0, 1.1, 1.097, 10.0)
                .unwrap();
            assert!(size.risk_percent <= MAX_RISK_PERCENT);
        }

        #[test]
        fn non_positive_capital_is_configuration_error() {
            let err = position_size(&eurusd(), 0.0, 0.0, 100.0, 1.1, 1.097, 1.0).unwrap_err();
            assert!(matches!(err, SignalforgeError::Configuration { .. }));
        }
    }

    mod setup {
        use super::*;

        #[test]
        fn buy_setup_sides_and_levels() {
            let setup = size_position(&buy(1.1000), &account(), &eurusd(), &RiskConfig::default())
                .unwrap();
            assert!(setup.stop_loss < setup.entry && setup.entry < setup.take_profit);
            assert_relative_eq!(setup.risk_reward, 1.5, epsilon = 1e-9);
            assert_eq!(setup.take_profit_levels.len(), 3);
            assert_relative_eq!(setup.take_profit_levels[2].price, 1.1090, epsilon = 1e-12);
            assert_eq!(setup.effective_risk_percent, 1.0);
            assert!(!setup.custom_capital_used);
        }

        #[test]
        fn sell_setup_uses_resistance() {
            let request = SetupRequest {
                direction: Direction::Sell,
                entry: 1.1000,
                support: Some(1.0900),
                resistance: Some(1.1020),
                confidence: 75.0,
            };
            let setup =
                size_position(&request, &account(), &eurusd(), &RiskConfig::default()).unwrap();
            assert_relative_eq!(setup.stop_loss, 1.1030, epsilon = 1e-12);
            assert!(setup.take_profit < setup.entry && setup.entry < setup.stop_loss);
            assert_relative_eq!(setup.effective_risk_percent, 0.8);
        }

        #[test]
        fn custom_capital_overrides_balance() {
            let config = RiskConfig {
                capital: Some(50_000.0),
                risk_percent: Some(1.0),
                ..RiskConfig::default()
            };
            let setup = size_position(&buy(1.1), &account(), &eurusd(), &config).unwrap();
            assert!(setup.custom_capital_used);
            assert_eq!(setup.lot_size, 1.66);
        }

        #[test]
        fn bad_metadata_fails_sizing_only() {
            let mut meta = eurusd();
            meta.tick_size = 0.0;
            let err =
                size_position(&buy(1.1), &account(), &meta, &RiskConfig::default()).unwrap_err();
            assert!(matches!(err, SignalforgeError::InvalidSymbolMetadata { .. }));
        }
    }

    mod assessment {
        use super::*;

        fn size(risk_percent: f64, free_margin_after: f64) -> PositionSize {
            PositionSize {
                lot_size: 1.0,
                risk_amount: 0.0,
                risk_percent,
                sl_distance_pips: 30.0,
                sl_distance_points: 300.0,
                margin_required: 0.0,
                free_margin_after,
                can_open: true,
            }
        }

        #[test]
        fn rr_quality_bands() {
            assert_eq!(risk_reward(1.0, 0.9, 1.3).quality, RrQuality::Excellent);
            assert_eq!(risk_reward(1.0, 0.9, 1.2).quality, RrQuality::Good);
            assert_eq!(risk_reward(1.0, 0.9, 1.16).quality, RrQuality::Fair);
            assert_eq!(risk_reward(1.0, 1.0, 1.2).ratio, 0.0);
        }

        #[test]
        fn clean_trade_is_low_risk() {
            let a = assess_risk(&risk_reward(1.0, 0.9, 1.2), &size(1.0, 9_000.0), 10_000.0, 0.0);
            assert_eq!(a.grade, RiskGrade::Low);
            assert_eq!(a.score, 100);
            assert!(a.can_proceed);
            assert!(a.warnings.is_empty());
        }

        #[test]
        fn penalties_accumulate() {
            let a = assess_risk(&risk_reward(1.0, 0.9, 1.1), &size(3.0, 500.0), 10_000.0, 12.0);
            assert_eq!(a.score, 20);
            assert_eq!(a.grade, RiskGrade::VeryHigh);
            assert!(!a.can_proceed);
            assert_eq!(a.warnings.len(), 4);
            assert_eq!(a.recommendations[1], "Reduce position size");
        }

        #[test]
        fn daily_limits() {
            let ok = check_daily_limits(&account());
            assert!(ok.can_trade && ok.warnings.is_empty());

            let warn = check_daily_limits(&AccountState {
                equity: 9_400.0,
                ..account()
            });
            assert!(warn.can_trade);
            assert_eq!(warn.warnings.len(), 1);

            let blocked = check_daily_limits(&AccountState {
                equity: 8_500.0,
                ..account()
            });
            assert!(!blocked.can_trade);
            assert_eq!(blocked.warnings.len(), 2);
        }
    }
}
