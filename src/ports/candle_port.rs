//! Candle source port.

use crate::domain::candle::Candle;
use crate::domain::error::SignalforgeError;
use crate::domain::timeframe::Timeframe;

/// Supplies oldest-first candles with strictly increasing times.
pub trait CandleSource {
    fn candles(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>, SignalforgeError>;

    /// Number of candles the source guarantees when it has any data at all.
    fn min_history(&self) -> usize {
        0
    }
}
