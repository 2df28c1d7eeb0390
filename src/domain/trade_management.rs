//! Helpers for managing an open trade: volatility stops, trailing stops and
//! scaling out.

use serde::Serialize;

use crate::domain::scorer::Direction;

pub const DEFAULT_ATR_MULTIPLIER: f64 = 1.5;
/// Offset past entry when a stop moves to breakeven, as a fraction of R.
const BREAKEVEN_LOCK: f64 = 0.1;
const PARTIAL_SPLIT: [(f64, f64); 3] = [(0.40, 1.0), (0.30, 2.0), (0.30, 3.0)];
const PARTIAL_LOT_STEP: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtrTarget {
    pub price: f64,
    pub risk_reward: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtrStop {
    pub entry: f64,
    pub stop_loss: f64,
    pub sl_distance: f64,
    pub atr: f64,
    pub multiplier: f64,
    pub take_profits: [AtrTarget; 3],
}

/// Stop `atr × multiplier` from entry with targets at 1R, 2R and 3R.
pub fn atr_stop_loss(entry: f64, direction: Direction, atr: f64, multiplier: f64) -> AtrStop {
    let sl_distance = atr * multiplier;
    let sign = direction.sign();
    let target = |rr: f64| AtrTarget {
        price: entry + sign * sl_distance * rr,
        risk_reward: rr,
    };
    AtrStop {
        entry,
        stop_loss: entry - sign * sl_distance,
        sl_distance,
        atr,
        multiplier,
        take_profits: [target(1.0), target(2.0), target(3.0)],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum TrailMethod {
    /// One ATR behind price. A non-positive ATR trails by half the risk.
    Atr { atr: f64 },
    Pips { pips: f64, pip_size: f64 },
    Percent { percent: f64 },
    /// Lock in a small profit once the trade has run 1R.
    Breakeven,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrailAction {
    Hold,
    Trail,
    MoveToBreakeven,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailingStop {
    pub new_stop: f64,
    pub action: TrailAction,
    pub profit_distance: f64,
    /// Open profit in multiples of the initial risk.
    pub profit_rr: f64,
}

pub fn trailing_stop(
    entry: f64,
    current: f64,
    direction: Direction,
    initial_stop: f64,
    method: TrailMethod,
) -> TrailingStop {
    let sign = direction.sign();
    let risk = (entry - initial_stop).abs();
    let profit_distance = (current - entry) * sign;
    let profit_rr = if risk > 0.0 { profit_distance / risk } else { 0.0 };
    let hold = TrailingStop {
        new_stop: initial_stop,
        action: TrailAction::Hold,
        profit_distance,
        profit_rr,
    };
    if profit_distance <= 0.0 {
        return hold;
    }

    let trail_distance = match method {
        TrailMethod::Atr { atr } if atr > 0.0 => atr,
        TrailMethod::Atr { .. } => risk * 0.5,
        TrailMethod::Pips { pips, pip_size } => pips * pip_size,
        TrailMethod::Percent { percent } => current * percent / 100.0,
        TrailMethod::Breakeven => {
            if profit_distance < risk {
                return hold;
            }
            let locked = entry + sign * risk * BREAKEVEN_LOCK;
            // A stop already past the lock level stays where it is.
            if (locked - initial_stop) * sign <= 0.0 {
                return hold;
            }
            return TrailingStop {
                new_stop: locked,
                action: TrailAction::MoveToBreakeven,
                ..hold
            };
        }
    };

    let candidate = current - sign * trail_distance;
    let new_stop = match direction {
        Direction::Buy => candidate.max(initial_stop),
        Direction::Sell => candidate.min(initial_stop),
    };
    let action = if (new_stop - initial_stop).abs() < 1e-5 {
        TrailAction::Hold
    } else {
        TrailAction::Trail
    };
    TrailingStop {
        new_stop,
        action,
        ..hold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartialStatus {
    Pending,
    Hit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialTakeProfit {
    pub level: usize,
    pub price: f64,
    pub lots: f64,
    pub percent: u32,
    pub risk_reward: f64,
    pub status: PartialStatus,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Scale-out plan of 40/30/30% at 1R/2R/3R. The last tranche takes the
/// remainder so the lots add up to the position.
pub fn partial_take_profits(
    entry: f64,
    stop_loss: f64,
    direction: Direction,
    lots: f64,
    current_price: Option<f64>,
) -> Vec<PartialTakeProfit> {
    let risk = (entry - stop_loss).abs();
    let sign = direction.sign();
    let step = PARTIAL_LOT_STEP;
    let first = ((lots * PARTIAL_SPLIT[0].0 / step).round() * step).max(step);
    let second = ((lots * PARTIAL_SPLIT[1].0 / step).round() * step).max(step);
    let third = (lots - first - second).max(step);
    let allocations = [first, second, third];

    PARTIAL_SPLIT
        .iter()
        .zip(allocations)
        .enumerate()
        .map(|(i, (&(share, rr), lots))| {
            let price = entry + sign * risk * rr;
            let hit = current_price.is_some_and(|p| (p - price) * sign >= 0.0);
            PartialTakeProfit {
                level: i + 1,
                price,
                lots: round2(lots),
                percent: (share * 100.0).round() as u32,
                risk_reward: rr,
                status: if hit {
                    PartialStatus::Hit
                } else {
                    PartialStatus::Pending
                },
            }
        })
        .collect()
}
