//! Swing-point detection shared by market structure and smart money.
//!
//! A swing high is a candle whose high is at least every high within
//! `lookback` candles on either side; swing lows mirror this on lows.
//! Comparisons are inclusive so flat tops produce a swing at each bar.

use crate::domain::candle::Candle;

pub const DEFAULT_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Swings {
    pub highs: Vec<SwingPoint>,
    pub lows: Vec<SwingPoint>,
}

pub fn find_swings(candles: &[Candle], lookback: usize) -> Swings {
    let mut swings = Swings::default();
    if lookback == 0 || candles.len() < 2 * lookback + 1 {
        return swings;
    }

    for i in lookback..candles.len() - lookback {
        let window = &candles[i - lookback..=i + lookback];
        let high = candles[i].high;
        let low = candles[i].low;
        if window.iter().all(|c| high >= c.high) {
            swings.highs.push(SwingPoint { index: i, price: high });
        }
        if window.iter().all(|c| low <= c.low) {
            swings.lows.push(SwingPoint { index: i, price: low });
        }
    }
    swings
}
