//! Candle-by-candle backtest simulator.
//!
//! One symbol per run, at most one open position. Each candle first checks
//! the open position against its high/low; when flat, the decision function
//! sees only the candles up to and including the current one.

use std::collections::BTreeMap;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::domain::analysis::{analyze, AnalysisConfig};
use crate::domain::candle::Candle;
use crate::domain::error::SignalforgeError;
use crate::domain::execution::{
    check_exit, close_position, open_position, EntryOrder, ExecutionConfig, TieBreak,
};
use crate::domain::metrics::BacktestMetrics;
use crate::domain::position::{ExitReason, Position, TradeRecord};
use crate::domain::risk::{size_position, AccountState, RiskConfig, SetupRequest, SymbolMeta};

pub const DEFAULT_MAX_TRADES: usize = 1000;
pub const DEFAULT_MIN_CANDLES: usize = 100;
/// Candles the decision function needs before it is consulted.
pub const MIN_DECISION_CANDLES: usize = 50;
const SIMULATION_LEVERAGE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub risk: RiskConfig,
    pub analysis: AnalysisConfig,
    pub slippage_pips: f64,
    pub spread_pips: f64,
    pub min_confidence: f64,
    pub max_trades: usize,
    pub min_candles: usize,
    /// Trailing candles handed to the decision function.
    pub window: usize,
    pub tie_break: TieBreak,
    pub progress_interval: usize,
    /// Inclusive unix-second bounds.
    pub range: Option<(i64, i64)>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 10_000.0,
            risk: RiskConfig::default(),
            analysis: AnalysisConfig::default(),
            slippage_pips: 1.0,
            spread_pips: 1.0,
            min_confidence: 70.0,
            max_trades: DEFAULT_MAX_TRADES,
            min_candles: DEFAULT_MIN_CANDLES,
            window: 200,
            tie_break: TieBreak::StopFirst,
            progress_interval: 50,
            range: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbortReason {
    MaxTrades,
}

/// Run-level outcome. A completed run with no trades is a quiet market,
/// not a failure.
#[derive(Debug)]
pub enum RunStatus {
    Completed,
    Aborted { reason: AbortReason },
    Failed(SignalforgeError),
}

impl RunStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, RunStatus::Failed(_))
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("RunStatus", 2)?;
        match self {
            RunStatus::Completed => {
                s.serialize_field("state", "COMPLETED")?;
                s.serialize_field("detail", &Option::<String>::None)?;
            }
            RunStatus::Aborted { reason } => {
                s.serialize_field("state", "ABORTED")?;
                s.serialize_field("detail", reason)?;
            }
            RunStatus::Failed(err) => {
                s.serialize_field("state", "FAILED")?;
                s.serialize_field("detail", &err.to_string())?;
            }
        }
        s.end()
    }
}

#[derive(Debug, Serialize)]
pub struct BacktestReport {
    pub status: RunStatus,
    pub candles: usize,
    pub trades: Vec<TradeRecord>,
    pub metrics: BacktestMetrics,
}

impl BacktestReport {
    fn failed(err: SignalforgeError, initial_capital: f64) -> Self {
        BacktestReport {
            status: RunStatus::Failed(err),
            candles: 0,
            trades: Vec::new(),
            metrics: BacktestMetrics::compute(&[], initial_capital),
        }
    }
}

/// Fire-and-forget progress callback: percentage and a short message.
pub type Progress<'a> = &'a mut dyn FnMut(u8, &str);

fn validate(config: &BacktestConfig, meta: &SymbolMeta) -> Result<(), SignalforgeError> {
    if !(config.initial_capital > 0.0) {
        return Err(SignalforgeError::Configuration {
            reason: format!("initial capital must be positive, got {}", config.initial_capital),
        });
    }
    if config.slippage_pips < 0.0 || config.spread_pips < 0.0 {
        return Err(SignalforgeError::Configuration {
            reason: "slippage and spread must not be negative".into(),
        });
    }
    if config.max_trades == 0 {
        return Err(SignalforgeError::Configuration {
            reason: "max trades must be at least 1".into(),
        });
    }
    if let Some((start, end)) = config.range {
        if start > end {
            return Err(SignalforgeError::Configuration {
                reason: format!("backtest range start {} is after end {}", start, end),
            });
        }
    }
    config.risk.validate()?;
    meta.validate()
}

/// Runs the full analysis and risk pipeline as the decision function.
pub fn run_backtest(
    candles: &[Candle],
    meta: &SymbolMeta,
    config: &BacktestConfig,
    progress: Option<Progress<'_>>,
) -> BacktestReport {
    let others = BTreeMap::new();
    let mut decide = |window: &[Candle], balance: f64| -> Option<EntryOrder> {
        let analysis = match analyze(window, &config.analysis, &others) {
            Ok(a) => a,
            Err(e) => {
                tracing::debug!(error = %e, "analysis skipped");
                return None;
            }
        };
        let signal = analysis.signal.as_ref()?;
        if signal.confidence < config.min_confidence {
            return None;
        }
        let risk = RiskConfig {
            capital: Some(balance),
            ..config.risk.clone()
        };
        let account = AccountState {
            balance,
            equity: balance,
            leverage: SIMULATION_LEVERAGE,
        };
        let request = SetupRequest {
            direction: signal.direction,
            entry: analysis.price,
            support: analysis.support,
            resistance: analysis.resistance,
            confidence: signal.confidence,
        };
        match size_position(&request, &account, meta, &risk) {
            Ok(setup) => Some(EntryOrder {
                direction: setup.direction,
                confidence: signal.confidence,
                stop_loss: setup.stop_loss,
                take_profit: setup.take_profit,
                lot_size: setup.lot_size,
                risk_reward: setup.risk_reward,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "setup rejected");
                None
            }
        }
    };
    run_backtest_with(candles, meta, config, &mut decide, progress)
}

/// Simulation loop over an arbitrary decision function.
///
/// `decide` receives the trailing window ending at the current candle and
/// the running balance.
pub fn run_backtest_with<F>(
    candles: &[Candle],
    meta: &SymbolMeta,
    config: &BacktestConfig,
    decide: &mut F,
    mut progress: Option<Progress<'_>>,
) -> BacktestReport
where
    F: FnMut(&[Candle], f64) -> Option<EntryOrder>,
{
    if let Err(e) = validate(config, meta) {
        tracing::warn!(error = %e, "backtest rejected");
        return BacktestReport::failed(e, config.initial_capital);
    }

    let candles: Vec<Candle> = match config.range {
        Some((start, end)) => candles
            .iter()
            .filter(|c| c.time >= start && c.time <= end)
            .copied()
            .collect(),
        None => candles.to_vec(),
    };
    let need = config.min_candles.max(1);
    if candles.len() < need {
        let err = SignalforgeError::insufficient("backtest", candles.len(), need);
        tracing::warn!(error = %err, "backtest rejected");
        return BacktestReport::failed(err, config.initial_capital);
    }

    tracing::info!(
        symbol = %meta.name,
        candles = candles.len(),
        capital = config.initial_capital,
        "backtest started"
    );

    let exec = ExecutionConfig {
        slippage_pips: config.slippage_pips,
        spread_pips: config.spread_pips,
        pip_size: meta.pip_size(),
        tie_break: config.tie_break,
    };
    let mut balance = config.initial_capital;
    let mut trades: Vec<TradeRecord> = Vec::new();
    let mut open: Option<Position> = None;
    let mut status = RunStatus::Completed;
    let total = candles.len();
    let last = total - 1;
    let window = config.window.max(MIN_DECISION_CANDLES);

    for (i, candle) in candles.iter().enumerate() {
        if config.progress_interval > 0 && i % config.progress_interval == 0 {
            if let Some(report) = progress.as_mut() {
                let pct = (i * 90 / total) as u8 + 5;
                report(pct, &format!("Simulating candle {}/{}", i, total));
            }
        }

        if let Some(position) = &open {
            if let Some((reason, price)) = check_exit(position, candle, &exec) {
                let trade = close_position(position, price, candle.time, reason, meta, exec.pip_size);
                tracing::debug!(
                    reason = ?trade.exit_reason,
                    pnl = trade.pnl,
                    index = i,
                    "trade closed"
                );
                balance += trade.pnl;
                trades.push(trade);
                open = None;
                if trades.len() >= config.max_trades {
                    tracing::warn!(max_trades = config.max_trades, "trade cap reached, aborting run");
                    status = RunStatus::Aborted {
                        reason: AbortReason::MaxTrades,
                    };
                    break;
                }
                continue;
            }
        }

        if open.is_some() || i == last || i + 1 < MIN_DECISION_CANDLES {
            continue;
        }
        let start = (i + 1).saturating_sub(window);
        if let Some(order) = decide(&candles[start..=i], balance) {
            let position = open_position(&order, candle, i, &exec);
            tracing::debug!(
                direction = %position.direction,
                entry = position.entry_price,
                lots = position.lot_size,
                index = i,
                "trade opened"
            );
            open = Some(position);
        }
    }

    if let Some(position) = open.take() {
        let final_candle = &candles[last];
        let trade = close_position(
            &position,
            final_candle.close,
            final_candle.time,
            ExitReason::Timeout,
            meta,
            exec.pip_size,
        );
        balance += trade.pnl;
        trades.push(trade);
    }

    let metrics = BacktestMetrics::compute(&trades, config.initial_capital);
    if let Some(report) = progress.as_mut() {
        report(100, "Backtest complete");
    }
    tracing::info!(
        trades = trades.len(),
        net_profit = metrics.net_profit,
        balance,
        "backtest complete"
    );

    BacktestReport {
        status,
        candles: total,
        trades,
        metrics,
    }
}
