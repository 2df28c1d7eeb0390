//! Forex trading sessions by UTC hour.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSession {
    Sydney,
    Tokyo,
    London,
    NewYork,
}

const SESSION_HOURS: [(MarketSession, u32, u32); 4] = [
    (MarketSession::Sydney, 22, 7),
    (MarketSession::Tokyo, 0, 9),
    (MarketSession::London, 8, 17),
    (MarketSession::NewYork, 13, 22),
];

/// Asia/Europe handover and the London/New York overlap.
const BEST_HOURS: [(u32, u32); 2] = [(8, 9), (13, 17)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionQuality {
    High,
    Medium,
    Low,
}

impl SessionQuality {
    /// Factor applied to both composite scores.
    pub fn multiplier(self) -> f64 {
        match self {
            SessionQuality::High => 1.15,
            SessionQuality::Medium => 1.0,
            SessionQuality::Low => 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub hour_utc: u32,
    pub active_sessions: Vec<MarketSession>,
    pub is_best_time: bool,
    pub quality: SessionQuality,
}

fn in_window(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        start <= hour && hour < end
    } else {
        hour >= start || hour < end
    }
}

pub fn session_info(hour_utc: u32) -> SessionInfo {
    let active_sessions: Vec<MarketSession> = SESSION_HOURS
        .iter()
        .filter(|(_, start, end)| in_window(hour_utc, *start, *end))
        .map(|(s, _, _)| *s)
        .collect();
    let is_best_time = BEST_HOURS
        .iter()
        .any(|&(start, end)| in_window(hour_utc, start, end));
    let quality = if is_best_time {
        SessionQuality::High
    } else if !active_sessions.is_empty() {
        SessionQuality::Medium
    } else {
        SessionQuality::Low
    };
    SessionInfo {
        hour_utc,
        active_sessions,
        is_best_time,
        quality,
    }
}

/// Single session label used to bucket backtest trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingSession {
    Sydney,
    Tokyo,
    London,
    NewYork,
    Overlap,
}

pub fn trading_session(hour_utc: u32) -> TradingSession {
    match hour_utc {
        22..=23 | 0..=6 => TradingSession::Sydney,
        7..=8 => TradingSession::Tokyo,
        9..=12 => TradingSession::London,
        13..=16 => TradingSession::Overlap,
        _ => TradingSession::NewYork,
    }
}
