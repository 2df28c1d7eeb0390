//! Support/resistance level detection.
//!
//! Scans the most recent `window` highs (resp. lows) for single-bar peaks
//! (resp. troughs) whose step from the previous bar exceeds half the
//! population standard deviation of that series.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::indicator_helpers::population_std;

pub const MIN_CANDLES: usize = 100;
pub const DEFAULT_WINDOW: usize = 50;
pub const DEFAULT_LEVELS: usize = 5;

/// Resistance sorted highest first, support lowest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SrLevels {
    pub resistance: Vec<f64>,
    pub support: Vec<f64>,
}

impl SrLevels {
    /// Closest support strictly below `price`.
    pub fn nearest_support(&self, price: f64) -> Option<f64> {
        self.support
            .iter()
            .copied()
            .filter(|&level| level < price)
            .fold(None, |best: Option<f64>, level| {
                Some(best.map_or(level, |b| b.max(level)))
            })
    }

    /// Closest resistance strictly above `price`.
    pub fn nearest_resistance(&self, price: f64) -> Option<f64> {
        self.resistance
            .iter()
            .copied()
            .filter(|&level| level > price)
            .fold(None, |best: Option<f64>, level| {
                Some(best.map_or(level, |b| b.min(level)))
            })
    }

    pub fn is_empty(&self) -> bool {
        self.resistance.is_empty() && self.support.is_empty()
    }
}

/// `None` when fewer than [`MIN_CANDLES`] candles are available.
pub fn detect_levels(candles: &[Candle]) -> Option<SrLevels> {
    detect_levels_with(candles, DEFAULT_WINDOW, DEFAULT_LEVELS)
}

pub fn detect_levels_with(candles: &[Candle], window: usize, count: usize) -> Option<SrLevels> {
    if candles.len() < MIN_CANDLES {
        return None;
    }
    let recent = &candles[candles.len().saturating_sub(window)..];
    let highs: Vec<f64> = recent.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = recent.iter().map(|c| c.low).collect();

    let mut resistance = find_peaks(&highs);
    resistance.sort_by(|a, b| b.total_cmp(a));
    resistance.truncate(count);

    let mut support = find_troughs(&lows);
    support.sort_by(|a, b| a.total_cmp(b));
    support.truncate(count);

    Some(SrLevels {
        resistance,
        support,
    })
}

fn find_peaks(prices: &[f64]) -> Vec<f64> {
    let threshold = population_std(prices) * 0.5;
    prices
        .windows(3)
        .filter(|w| w[1] > w[0] && w[1] > w[2] && w[1] - w[0] > threshold)
        .map(|w| w[1])
        .collect()
}

fn find_troughs(prices: &[f64]) -> Vec<f64> {
    let threshold = population_std(prices) * 0.5;
    prices
        .windows(3)
        .filter(|w| w[1] < w[0] && w[1] < w[2] && w[0] - w[1] > threshold)
        .map(|w| w[1])
        .collect()
}
