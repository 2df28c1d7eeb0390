//! Backtest performance metrics.
//!
//! Everything is recomputed from the closed trade list. Risk-adjusted ratios
//! use per-trade returns on initial capital, annualised with √252.

use serde::Serialize;

use super::position::{ExitReason, TradeRecord};

const ANNUALISATION_PERIODS: f64 = 252.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    /// Percentage, 0–100.
    pub win_rate: f64,
    pub profit_factor: f64,

    pub total_profit: f64,
    /// Sum of losing trades, negative or zero.
    pub total_loss: f64,
    pub net_profit: f64,
    pub net_profit_pct: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub expectancy: f64,
    pub expectancy_pct: f64,

    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,

    pub avg_rr: f64,
    pub best_rr: f64,
    pub worst_rr: f64,
    pub avg_win_pips: f64,
    pub avg_loss_pips: f64,
    pub avg_duration_minutes: f64,

    pub longest_winning_streak: usize,
    pub longest_losing_streak: usize,

    pub tp_hits: usize,
    pub sl_hits: usize,
    pub timeout_exits: usize,
    pub manual_exits: usize,

    pub initial_capital: f64,
    pub final_balance: f64,
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl BacktestMetrics {
    pub fn compute(trades: &[TradeRecord], initial_capital: f64) -> Self {
        let final_balance = initial_capital + trades.iter().map(|t| t.pnl).sum::<f64>();
        if trades.is_empty() {
            return BacktestMetrics {
                initial_capital,
                final_balance,
                ..BacktestMetrics::default()
            };
        }

        let wins: Vec<&TradeRecord> = trades.iter().filter(|t| t.is_win()).collect();
        let losses: Vec<&TradeRecord> = trades.iter().filter(|t| t.is_loss()).collect();
        let total_trades = trades.len();

        let total_profit: f64 = wins.iter().map(|t| t.pnl).sum();
        let total_loss: f64 = losses.iter().map(|t| t.pnl).sum();
        let net_profit = total_profit + total_loss;
        let pct_of_capital = |x: f64| {
            if initial_capital > 0.0 {
                x / initial_capital * 100.0
            } else {
                0.0
            }
        };

        let profit_factor = if total_loss < 0.0 {
            total_profit / total_loss.abs()
        } else {
            0.0
        };

        let win_pnls: Vec<f64> = wins.iter().map(|t| t.pnl).collect();
        let loss_pnls: Vec<f64> = losses.iter().map(|t| t.pnl).collect();
        let expectancy = net_profit / total_trades as f64;

        let rrs: Vec<f64> = trades.iter().map(|t| t.achieved_rr).collect();
        let (max_drawdown, max_drawdown_pct) = compute_drawdown(&balance_curve(trades, initial_capital));
        let returns: Vec<f64> = if initial_capital > 0.0 {
            trades.iter().map(|t| t.pnl / initial_capital).collect()
        } else {
            Vec::new()
        };
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(&returns);
        let (longest_winning_streak, longest_losing_streak) = compute_streaks(trades);
        let exits = |reason: ExitReason| trades.iter().filter(|t| t.exit_reason == reason).count();

        BacktestMetrics {
            total_trades,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            breakeven_trades: total_trades - wins.len() - losses.len(),
            win_rate: wins.len() as f64 / total_trades as f64 * 100.0,
            profit_factor,
            total_profit,
            total_loss,
            net_profit,
            net_profit_pct: pct_of_capital(net_profit),
            avg_win: average(&win_pnls),
            avg_loss: average(&loss_pnls),
            largest_win: win_pnls.iter().copied().fold(0.0, f64::max),
            largest_loss: loss_pnls.iter().copied().fold(0.0, f64::min),
            expectancy,
            expectancy_pct: pct_of_capital(expectancy),
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio,
            sortino_ratio,
            avg_rr: average(&rrs),
            best_rr: rrs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            worst_rr: rrs.iter().copied().fold(f64::INFINITY, f64::min),
            avg_win_pips: average(&wins.iter().map(|t| t.pips).collect::<Vec<_>>()),
            avg_loss_pips: average(&losses.iter().map(|t| t.pips).collect::<Vec<_>>()),
            avg_duration_minutes: average(
                &trades.iter().map(|t| t.duration_minutes).collect::<Vec<_>>(),
            ),
            longest_winning_streak,
            longest_losing_streak,
            tp_hits: exits(ExitReason::TpHit),
            sl_hits: exits(ExitReason::SlHit),
            timeout_exits: exits(ExitReason::Timeout),
            manual_exits: exits(ExitReason::Manual),
            initial_capital,
            final_balance,
        }
    }
}

/// Balance after each trade, starting with the initial capital.
fn balance_curve(trades: &[TradeRecord], initial_capital: f64) -> Vec<f64> {
    let mut balance = initial_capital;
    let mut curve = Vec::with_capacity(trades.len() + 1);
    curve.push(balance);
    for t in trades {
        balance += t.pnl;
        curve.push(balance);
    }
    curve
}

/// Largest peak-to-trough fall, absolute and as a percentage of the peak.
fn compute_drawdown(curve: &[f64]) -> (f64, f64) {
    let Some(&first) = curve.first() else {
        return (0.0, 0.0);
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_dd_pct = 0.0_f64;
    for &balance in curve {
        if balance > peak {
            peak = balance;
        } else if peak > 0.0 {
            let dd = peak - balance;
            if dd > max_dd {
                max_dd = dd;
                max_dd_pct = dd / peak * 100.0;
            }
        }
    }
    (max_dd, max_dd_pct)
}

/// Sharpe and Sortino over per-trade returns. Downside deviation is taken
/// over the losing returns alone. Without losing trades the Sortino ratio
/// equals the Sharpe ratio.
fn compute_risk_adjusted(returns: &[f64]) -> (f64, f64) {
    if returns.len() < 2 {
        return (0.0, 0.0);
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let sharpe = if stddev > 0.0 {
        mean / stddev * ANNUALISATION_PERIODS.sqrt()
    } else {
        0.0
    };

    let downside: Vec<f64> = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).collect();
    if downside.is_empty() {
        return (sharpe, sharpe);
    }
    let downside_stddev = (downside.iter().sum::<f64>() / downside.len() as f64).sqrt();
    let sortino = if downside_stddev > 0.0 {
        mean / downside_stddev * ANNUALISATION_PERIODS.sqrt()
    } else {
        0.0
    };
    (sharpe, sortino)
}

/// Longest runs of wins and losses. A breakeven trade resets both.
fn compute_streaks(trades: &[TradeRecord]) -> (usize, usize) {
    let (mut win_run, mut loss_run) = (0usize, 0usize);
    let (mut longest_win, mut longest_loss) = (0usize, 0usize);
    for t in trades {
        if t.is_win() {
            win_run += 1;
            loss_run = 0;
            longest_win = longest_win.max(win_run);
        } else if t.is_loss() {
            loss_run += 1;
            win_run = 0;
            longest_loss = longest_loss.max(loss_run);
        } else {
            win_run = 0;
            loss_run = 0;
        }
    }
    (longest_win, longest_loss)
}
