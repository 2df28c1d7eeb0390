//! Simulated positions and the records they close into.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::scorer::Direction;
use crate::domain::session::TradingSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    SlHit,
    TpHit,
    Timeout,
    Manual,
}

/// An open simulated position. Never mutated; closing produces a
/// [`TradeRecord`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub direction: Direction,
    pub lot_size: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub entry_time: i64,
    pub entry_index: usize,
    pub entry_confidence: f64,
    pub planned_rr: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Buy
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Sell
    }

    /// Touched when the candle's range reaches the stop.
    pub fn should_stop_loss(&self, candle: &Candle) -> bool {
        if self.is_long() {
            candle.low <= self.stop_loss
        } else {
            candle.high >= self.stop_loss
        }
    }

    pub fn should_take_profit(&self, candle: &Candle) -> bool {
        if self.is_long() {
            candle.high >= self.take_profit
        } else {
            candle.low <= self.take_profit
        }
    }

    /// Price move in the position's favour.
    pub fn favourable_move(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.direction.sign()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub direction: Direction,
    pub lot_size: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub entry_time: i64,
    pub exit_time: i64,
    pub pnl: f64,
    pub pips: f64,
    pub exit_reason: ExitReason,
    pub entry_confidence: f64,
    pub planned_rr: f64,
    /// Realised pips over the stop distance; negative for losers.
    pub achieved_rr: f64,
    pub sl_distance_pips: f64,
    pub tp_distance_pips: f64,
    pub session: TradingSession,
    /// 0 = Monday.
    pub day_of_week: u32,
    pub hour_of_day: u32,
    pub duration_minutes: f64,
}

impl TradeRecord {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }
}
