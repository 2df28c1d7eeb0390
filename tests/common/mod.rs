#![allow(dead_code)]

use signalforge::domain::candle::Candle;
use signalforge::domain::error::SignalforgeError;
use signalforge::domain::risk::{AccountState, SymbolMeta};
use signalforge::domain::scorer::CompositeSignal;
use signalforge::domain::timeframe::Timeframe;
use signalforge::ports::candle_port::CandleSource;
use signalforge::ports::commentary_port::{Commentary, CommentaryProvider};
use signalforge::ports::market_port::{AccountProvider, SymbolMetaProvider};
use std::collections::HashMap;

/// 2023-11-14 22:00 UTC.
pub const START_TIME: i64 = 1_699_999_200;
pub const HOUR: i64 = 3600;

pub struct MockCandleSource {
    pub data: HashMap<Timeframe, Vec<Candle>>,
    pub errors: HashMap<Timeframe, String>,
}

impl MockCandleSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_candles(mut self, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        self.data.insert(timeframe, candles);
        self
    }

    pub fn with_error(mut self, timeframe: Timeframe, reason: &str) -> Self {
        self.errors.insert(timeframe, reason.to_string());
        self
    }
}

impl CandleSource for MockCandleSource {
    fn candles(&self, _symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>, SignalforgeError> {
        if let Some(reason) = self.errors.get(&timeframe) {
            return Err(SignalforgeError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(&timeframe).cloned().unwrap_or_default())
    }
}

pub struct MockMarket {
    pub meta: Option<SymbolMeta>,
    pub account: AccountState,
}

impl MockMarket {
    pub fn new(meta: SymbolMeta, balance: f64) -> Self {
        Self {
            meta: Some(meta),
            account: AccountState {
                balance,
                equity: balance,
                leverage: 100.0,
            },
        }
    }

    pub fn without_meta(balance: f64) -> Self {
        Self {
            meta: None,
            ..Self::new(eurusd(), balance)
        }
    }
}

impl SymbolMetaProvider for MockMarket {
    fn symbol_meta(&self, symbol: &str) -> Result<SymbolMeta, SignalforgeError> {
        self.meta
            .clone()
            .ok_or_else(|| SignalforgeError::InvalidSymbolMetadata {
                symbol: symbol.to_string(),
                reason: "no metadata".into(),
            })
    }
}

impl AccountProvider for MockMarket {
    fn account(&self) -> Result<AccountState, SignalforgeError> {
        Ok(self.account)
    }
}

pub struct MockCommentary {
    pub response: Result<Commentary, String>,
}

impl MockCommentary {
    pub fn agreeing(adjustment: f64) -> Self {
        Self {
            response: Ok(Commentary {
                agrees: true,
                adjustment,
                note: "trend intact".into(),
            }),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: Err("provider unavailable".into()),
        }
    }
}

impl CommentaryProvider for MockCommentary {
    fn comment(&self, _signal: &CompositeSignal) -> Result<Commentary, SignalforgeError> {
        self.response
            .clone()
            .map_err(|reason| SignalforgeError::DataSource { reason })
    }
}

pub fn eurusd() -> SymbolMeta {
    SymbolMeta {
        name: "EURUSD".into(),
        point: 0.00001,
        digits: 5,
        contract_size: 100_000.0,
        tick_value: 1.0,
        tick_size: 0.00001,
        lot_min: 0.01,
        lot_max: 100.0,
        lot_step: 0.01,
    }
}

pub fn usdjpy() -> SymbolMeta {
    SymbolMeta {
        name: "USDJPY".into(),
        point: 0.001,
        digits: 3,
        contract_size: 100_000.0,
        tick_value: 0.67,
        tick_size: 0.001,
        lot_min: 0.01,
        lot_max: 50.0,
        lot_step: 0.01,
    }
}

pub fn make_candle(time: i64, open: f64, close: f64, volume: f64) -> Candle {
    Candle {
        time,
        open,
        high: open.max(close) * 1.0002,
        low: open.min(close) * 0.9998,
        close,
        volume,
    }
}

/// Geometric trend: each close is `open × (1 + step)`. The last three
/// candles carry 2.5× volume.
pub fn trend_series(n: usize, step: f64) -> Vec<Candle> {
    let mut price = 1.1000;
    (0..n)
        .map(|i| {
            let open = price;
            let close = open * (1.0 + step);
            price = close;
            let volume = if i + 3 >= n { 250.0 } else { 100.0 };
            make_candle(START_TIME + i as i64 * HOUR, open, close, volume)
        })
        .collect()
}

pub fn uptrend(n: usize) -> Vec<Candle> {
    trend_series(n, 0.0015)
}

pub fn downtrend(n: usize) -> Vec<Candle> {
    trend_series(n, -0.0015)
}

/// Alternates up and down around 1.1000 without drifting.
pub fn zigzag(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let (open, close) = if i % 2 == 0 {
                (1.1000, 1.1005)
            } else {
                (1.1005, 1.1000)
            };
            make_candle(START_TIME + i as i64 * HOUR, open, close, 100.0)
        })
        .collect()
}

/// Closes move by a fixed `step` per candle, with a 2 pip range either side.
pub fn monotonic(n: usize, step: f64) -> Vec<Candle> {
    let mut close = 1.1000;
    (0..n)
        .map(|i| {
            let open = close;
            close = open + step;
            Candle {
                time: START_TIME + i as i64 * HOUR,
                open,
                high: open.max(close) + 0.0002,
                low: open.min(close) - 0.0002,
                close,
                volume: 100.0,
            }
        })
        .collect()
}

/// Seeded xorshift64 generator yielding uniform values in `[0, 1)`.
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        XorShift(seed)
    }

    pub fn next_f64(&mut self) -> f64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Closes scattered ±10 pips around 1.1000 with no drift, random wicks and
/// volume. Deterministic for a given length.
pub fn flat_noise(n: usize) -> Vec<Candle> {
    let mut rng = XorShift::new(2158);
    let mut prev = 1.1000;
    (0..n)
        .map(|i| {
            let close = 1.1000 + (rng.next_f64() - 0.5) * 0.0020;
            let open = prev;
            prev = close;
            let high = open.max(close) + rng.next_f64() * 0.0003;
            let low = open.min(close) - rng.next_f64() * 0.0003;
            let volume = 50.0 + rng.next_f64() * 100.0;
            Candle {
                time: START_TIME + i as i64 * HOUR,
                open,
                high,
                low,
                close,
                volume,
            }
        })
        .collect()
}

/// Moves every candle `hours` later.
pub fn shifted(candles: &[Candle], hours: i64) -> Vec<Candle> {
    candles
        .iter()
        .map(|c| Candle {
            time: c.time + hours * HOUR,
            ..*c
        })
        .collect()
}
