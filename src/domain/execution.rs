//! Fill simulation for the backtest.
//!
//! Spread is paid on entry only. Slippage is applied against the trader on
//! entry and on stop/target exits; a forced close at the end of the data
//! fills at the candle close.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Timelike};
use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::error::SignalforgeError;
use crate::domain::position::{ExitReason, Position, TradeRecord};
use crate::domain::risk::SymbolMeta;
use crate::domain::scorer::Direction;
use crate::domain::session::trading_session;

/// Which trigger wins when one candle touches both stop and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    StopFirst,
    TargetFirst,
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TieBreak::StopFirst => write!(f, "stop_first"),
            TieBreak::TargetFirst => write!(f, "target_first"),
        }
    }
}

impl FromStr for TieBreak {
    type Err = SignalforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop_first" => Ok(TieBreak::StopFirst),
            "target_first" => Ok(TieBreak::TargetFirst),
            other => Err(SignalforgeError::Configuration {
                reason: format!("unknown tie break '{}': expected stop_first or target_first", other),
            }),
        }
    }
}

/// Fill parameters for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionConfig {
    pub slippage_pips: f64,
    pub spread_pips: f64,
    pub pip_size: f64,
    pub tie_break: TieBreak,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            slippage_pips: 1.0,
            spread_pips: 1.0,
            pip_size: 0.0001,
            tie_break: TieBreak::StopFirst,
        }
    }
}

/// Sizing decided for a new position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryOrder {
    pub direction: Direction,
    pub confidence: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub lot_size: f64,
    pub risk_reward: f64,
}

/// Entry fill.
/// BUY: close + (spread + slippage) × pip, SELL: close − (spread + slippage) × pip
pub fn entry_price(direction: Direction, close: f64, config: &ExecutionConfig) -> f64 {
    close + direction.sign() * (config.spread_pips + config.slippage_pips) * config.pip_size
}

/// Exit fill moved against the trader.
/// BUY: price − slippage × pip, SELL: price + slippage × pip
pub fn exit_price_with_slippage(direction: Direction, price: f64, config: &ExecutionConfig) -> f64 {
    price - direction.sign() * config.slippage_pips * config.pip_size
}

pub fn open_position(
    order: &EntryOrder,
    candle: &Candle,
    index: usize,
    config: &ExecutionConfig,
) -> Position {
    Position {
        direction: order.direction,
        lot_size: order.lot_size,
        entry_price: entry_price(order.direction, candle.close, config),
        stop_loss: order.stop_loss,
        take_profit: order.take_profit,
        entry_time: candle.time,
        entry_index: index,
        entry_confidence: order.confidence,
        planned_rr: order.risk_reward,
    }
}

/// Stop or target touched within the candle, with its slipped fill price.
///
/// When both are touched the configured tie-break decides.
pub fn check_exit(
    position: &Position,
    candle: &Candle,
    config: &ExecutionConfig,
) -> Option<(ExitReason, f64)> {
    let stop = position.should_stop_loss(candle);
    let target = position.should_take_profit(candle);
    let reason = match (stop, target, config.tie_break) {
        (true, true, TieBreak::StopFirst) | (true, false, _) => ExitReason::SlHit,
        (true, true, TieBreak::TargetFirst) | (false, true, _) => ExitReason::TpHit,
        (false, false, _) => return None,
    };
    let level = match reason {
        ExitReason::SlHit => position.stop_loss,
        _ => position.take_profit,
    };
    Some((
        reason,
        exit_price_with_slippage(position.direction, level, config),
    ))
}

/// Closes a position into a trade record.
///
/// `pnl = price move × lots × tick_value / tick_size`
pub fn close_position(
    position: &Position,
    exit_price: f64,
    exit_time: i64,
    reason: ExitReason,
    meta: &SymbolMeta,
    pip_size: f64,
) -> TradeRecord {
    let favourable = position.favourable_move(exit_price);
    let pnl = meta.money(favourable, position.lot_size);
    let pips = favourable / pip_size;
    let sl_distance_pips = (position.entry_price - position.stop_loss).abs() / pip_size;
    let tp_distance_pips = (position.take_profit - position.entry_price).abs() / pip_size;
    let achieved_rr = if sl_distance_pips > 0.0 {
        pips / sl_distance_pips
    } else {
        0.0
    };

    let opened = DateTime::from_timestamp(position.entry_time, 0);
    let hour = opened.map(|dt| dt.hour()).unwrap_or(0);
    let day_of_week = opened
        .map(|dt| dt.weekday().num_days_from_monday())
        .unwrap_or(0);

    TradeRecord {
        direction: position.direction,
        lot_size: position.lot_size,
        entry_price: position.entry_price,
        exit_price,
        stop_loss: position.stop_loss,
        take_profit: position.take_profit,
        entry_time: position.entry_time,
        exit_time,
        pnl,
        pips,
        exit_reason: reason,
        entry_confidence: position.entry_confidence,
        planned_rr: position.planned_rr,
        achieved_rr,
        sl_distance_pips,
        tp_distance_pips,
        session: trading_session(hour),
        day_of_week,
        hour_of_day: hour,
        duration_minutes: (exit_time - position.entry_time) as f64 / 60.0,
    }
}
