//! Configuration validation and typed config builders.
//!
//! Every builder validates the fields it reads, so a config that builds is
//! safe to run. `validate_config` builds everything once and discards the
//! result.

use crate::domain::analysis::{AnalysisConfig, DEFAULT_MIN_CANDLES, DEFAULT_WINDOW};
use crate::domain::backtest::{BacktestConfig, DEFAULT_MAX_TRADES, DEFAULT_MIN_CANDLES as BACKTEST_MIN_CANDLES};
use crate::domain::error::SignalforgeError;
use crate::domain::execution::TieBreak;
use crate::domain::risk::{AccountState, RiskConfig, RiskLevel, SymbolMeta};
use crate::domain::technical::DEFAULT_DIVERGENCE_THRESHOLD;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;

const DEFAULT_LEVERAGE: f64 = 100.0;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> SignalforgeError {
    SignalforgeError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> SignalforgeError {
    SignalforgeError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn optional_string(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn optional_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, SignalforgeError> {
    match optional_string(config, section, key) {
        None => Ok(None),
        Some(raw) => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(invalid(section, key, format!("'{}' is not a number", raw))),
        },
    }
}

fn required_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, SignalforgeError> {
    optional_f64(config, section, key)?.ok_or_else(|| missing(section, key))
}

fn positive_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, SignalforgeError> {
    let value = required_f64(config, section, key)?;
    if value <= 0.0 {
        return Err(invalid(section, key, format!("{} must be positive", key)));
    }
    Ok(value)
}

fn optional_i64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<i64>, SignalforgeError> {
    match optional_string(config, section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{}' is not an integer", raw))),
    }
}

fn count_or(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
    min: usize,
) -> Result<usize, SignalforgeError> {
    match optional_i64(config, section, key)? {
        None => Ok(default),
        Some(v) if v >= min as i64 => Ok(v as usize),
        Some(_) => Err(invalid(section, key, format!("{} must be at least {}", key, min))),
    }
}

/// `[analysis]`: symbol, timeframe, min_candles, window, divergence_threshold.
pub fn build_analysis_config(config: &dyn ConfigPort) -> Result<AnalysisConfig, SignalforgeError> {
    let symbol = optional_string(config, "analysis", "symbol").ok_or_else(|| missing("analysis", "symbol"))?;
    let timeframe = match optional_string(config, "analysis", "timeframe") {
        Some(raw) => raw
            .parse::<Timeframe>()
            .map_err(|e| invalid("analysis", "timeframe", e.to_string()))?,
        None => Timeframe::H1,
    };
    let min_candles = count_or(config, "analysis", "min_candles", DEFAULT_MIN_CANDLES, 1)?;
    let window = count_or(config, "analysis", "window", DEFAULT_WINDOW, 1)?;
    if window < min_candles {
        return Err(invalid("analysis", "window", "window must not be smaller than min_candles"));
    }
    let divergence_threshold =
        optional_f64(config, "analysis", "divergence_threshold")?.unwrap_or(DEFAULT_DIVERGENCE_THRESHOLD);
    if divergence_threshold < 0.0 {
        return Err(invalid(
            "analysis",
            "divergence_threshold",
            "divergence_threshold must be non-negative",
        ));
    }
    Ok(AnalysisConfig {
        symbol,
        timeframe,
        min_candles,
        window,
        divergence_threshold,
        ..AnalysisConfig::default()
    })
}

/// `[risk]`: level, risk_percent, min_rr, capital. Contradictory values are
/// configuration errors.
pub fn build_risk_config(config: &dyn ConfigPort) -> Result<RiskConfig, SignalforgeError> {
    let level = match optional_string(config, "risk", "level") {
        Some(raw) => raw.parse::<RiskLevel>()?,
        None => RiskLevel::default(),
    };
    let risk = RiskConfig {
        level,
        risk_percent: optional_f64(config, "risk", "risk_percent")?,
        min_rr: optional_f64(config, "risk", "min_rr")?,
        capital: optional_f64(config, "risk", "capital")?,
    };
    risk.validate()?;
    Ok(risk)
}

/// `[backtest]` on top of the analysis and risk settings.
pub fn build_backtest_config(
    config: &dyn ConfigPort,
    analysis: AnalysisConfig,
    risk: RiskConfig,
) -> Result<BacktestConfig, SignalforgeError> {
    let defaults = BacktestConfig::default();
    let initial_capital = optional_f64(config, "backtest", "initial_capital")?.unwrap_or(defaults.initial_capital);
    if initial_capital <= 0.0 {
        return Err(SignalforgeError::Configuration {
            reason: format!("initial capital must be positive, got {}", initial_capital),
        });
    }
    let non_negative = |key: &str, default: f64| -> Result<f64, SignalforgeError> {
        let value = optional_f64(config, "backtest", key)?.unwrap_or(default);
        if value < 0.0 {
            return Err(invalid("backtest", key, format!("{} must be non-negative", key)));
        }
        Ok(value)
    };
    let slippage_pips = non_negative("slippage_pips", defaults.slippage_pips)?;
    let spread_pips = non_negative("spread_pips", defaults.spread_pips)?;
    let min_confidence = non_negative("min_confidence", defaults.min_confidence)?;
    if min_confidence > 100.0 {
        return Err(invalid("backtest", "min_confidence", "min_confidence must be at most 100"));
    }

    let tie_break = match optional_string(config, "backtest", "tie_break") {
        Some(raw) => raw
            .parse::<TieBreak>()
            .map_err(|e| invalid("backtest", "tie_break", e.to_string()))?,
        None => TieBreak::default(),
    };
    let range = match (
        optional_i64(config, "backtest", "start")?,
        optional_i64(config, "backtest", "end")?,
    ) {
        (None, None) => None,
        (start, end) => {
            let start = start.unwrap_or(i64::MIN);
            let end = end.unwrap_or(i64::MAX);
            if start > end {
                return Err(invalid("backtest", "start", "start must not be after end"));
            }
            Some((start, end))
        }
    };

    Ok(BacktestConfig {
        initial_capital,
        risk,
        window: count_or(config, "backtest", "window", analysis.window, 1)?,
        analysis,
        slippage_pips,
        spread_pips,
        min_confidence,
        max_trades: count_or(config, "backtest", "max_trades", DEFAULT_MAX_TRADES, 1)?,
        min_candles: count_or(config, "backtest", "min_candles", BACKTEST_MIN_CANDLES, 1)?,
        tie_break,
        progress_interval: count_or(config, "backtest", "progress_interval", defaults.progress_interval, 1)?,
        range,
    })
}

/// `[symbol]`: every field except `digits` must be positive and the lot
/// range must be ordered.
pub fn build_symbol_meta(config: &dyn ConfigPort) -> Result<SymbolMeta, SignalforgeError> {
    let name = optional_string(config, "symbol", "name")
        .or_else(|| optional_string(config, "analysis", "symbol"))
        .ok_or_else(|| missing("symbol", "name"))?;
    let digits = match optional_i64(config, "symbol", "digits")? {
        Some(d) if (0..=10).contains(&d) => d as u32,
        Some(_) => return Err(invalid("symbol", "digits", "digits must be between 0 and 10")),
        None => return Err(missing("symbol", "digits")),
    };
    let meta = SymbolMeta {
        name,
        point: positive_f64(config, "symbol", "point")?,
        digits,
        contract_size: positive_f64(config, "symbol", "contract_size")?,
        tick_value: positive_f64(config, "symbol", "tick_value")?,
        tick_size: positive_f64(config, "symbol", "tick_size")?,
        lot_min: positive_f64(config, "symbol", "lot_min")?,
        lot_max: positive_f64(config, "symbol", "lot_max")?,
        lot_step: positive_f64(config, "symbol", "lot_step")?,
    };
    if meta.lot_min > meta.lot_max {
        return Err(SignalforgeError::Configuration {
            reason: format!("lot_min {} exceeds lot_max {}", meta.lot_min, meta.lot_max),
        });
    }
    Ok(meta)
}

/// `[account]`: balance is required, equity defaults to balance and
/// leverage to 100.
pub fn build_account_state(config: &dyn ConfigPort) -> Result<AccountState, SignalforgeError> {
    let balance = required_f64(config, "account", "balance")?;
    if balance <= 0.0 {
        return Err(SignalforgeError::Configuration {
            reason: format!("account balance must be positive, got {}", balance),
        });
    }
    let equity = optional_f64(config, "account", "equity")?.unwrap_or(balance);
    if equity < 0.0 {
        return Err(invalid("account", "equity", "equity must be non-negative"));
    }
    let leverage = optional_f64(config, "account", "leverage")?.unwrap_or(DEFAULT_LEVERAGE);
    if leverage <= 0.0 {
        return Err(invalid("account", "leverage", "leverage must be positive"));
    }
    Ok(AccountState {
        balance,
        equity,
        leverage,
    })
}

/// `[data] candles`, if configured.
pub fn candles_path(config: &dyn ConfigPort) -> Option<String> {
    optional_string(config, "data", "candles")
}

/// Builds every section. `[account]` is only checked when it has a balance.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), SignalforgeError> {
    let analysis = build_analysis_config(config)?;
    let risk = build_risk_config(config)?;
    build_backtest_config(config, analysis, risk)?;
    build_symbol_meta(config)?;
    if config.get_string("account", "balance").is_some() {
        build_account_state(config)?;
    }
    Ok(())
}
