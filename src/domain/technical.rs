//! Indicator readings on the most recent candle.
//!
//! [`TechnicalSnapshot`] condenses the indicator library into the discrete
//! states the scorer and the multi-timeframe aggregator vote on. Every
//! reading except the EMA stack is optional; a missing reading means the
//! window was too short for that indicator.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::feature::Bias;
use crate::domain::indicator::bollinger::{self, bandwidth};
use crate::domain::indicator::{
    IndicatorValue, adx, atr, calculate_adx, calculate_atr, calculate_ema, calculate_macd_default,
    calculate_rsi, rsi, stochastic,
};
use crate::domain::indicator_helpers::mean;

pub const DEFAULT_DIVERGENCE_THRESHOLD: f64 = 0.05;
const DIVERGENCE_MIN_CANDLES: usize = 20;
const DIVERGENCE_WINDOW: usize = 50;
const DIVERGENCE_READINGS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OscillatorStatus {
    Overbought,
    Oversold,
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Crossover {
    BullishCross,
    BearishCross,
    #[serde(rename = "NONE")]
    NoCross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BandPosition {
    AboveUpper,
    BelowLower,
    AtMiddle,
    UpperHalf,
    LowerHalf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendStrength {
    VeryStrong,
    Strong,
    Trending,
    Weak,
    #[serde(rename = "NONE")]
    NoTrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Volatility {
    High,
    Normal,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RsiReading {
    pub value: f64,
    pub status: OscillatorStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdReading {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
    pub status: Bias,
    pub crossover: Crossover,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmaReading {
    pub ema9: f64,
    pub ema21: f64,
    pub ema50: f64,
    pub trend: Bias,
    pub price_above_ema21: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StochasticReading {
    pub k: f64,
    pub d: f64,
    pub status: OscillatorStatus,
    pub crossover: Crossover,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerReading {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub bandwidth: f64,
    pub avg_bandwidth: f64,
    pub position: BandPosition,
    pub squeeze: bool,
    pub squeeze_alert: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdxReading {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub strength: TrendStrength,
    pub direction: Bias,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtrReading {
    pub atr: f64,
    pub atr_percent: f64,
    pub volatility: Volatility,
    pub trend: VolatilityTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalSnapshot {
    pub price: f64,
    pub rsi: Option<RsiReading>,
    pub macd: Option<MacdReading>,
    pub ema: EmaReading,
    pub divergence: Option<Bias>,
    pub stochastic: Option<StochasticReading>,
    pub bollinger: Option<BollingerReading>,
    pub adx: Option<AdxReading>,
    pub atr: Option<AtrReading>,
}

impl TechnicalSnapshot {
    /// `None` only for an empty window.
    pub fn compute(candles: &[Candle], divergence_threshold: f64) -> Option<Self> {
        let last = candles.last()?;
        let price = last.close;
        Some(TechnicalSnapshot {
            price,
            rsi: rsi_reading(candles),
            macd: macd_reading(candles),
            ema: ema_reading(candles, price),
            divergence: rsi_divergence(candles, divergence_threshold),
            stochastic: stochastic_reading(candles),
            bollinger: bollinger_reading(candles, price),
            adx: adx_reading(candles),
            atr: atr_reading(candles, price),
        })
    }

    /// True once any of stochastic, Bollinger or ADX is available.
    pub fn has_advanced(&self) -> bool {
        self.stochastic.is_some() || self.bollinger.is_some() || self.adx.is_some()
    }
}

pub fn oscillator_status(value: f64, low: f64, high: f64) -> OscillatorStatus {
    if value > high {
        OscillatorStatus::Overbought
    } else if value < low {
        OscillatorStatus::Oversold
    } else if value > 60.0 {
        OscillatorStatus::Bullish
    } else if value < 40.0 {
        OscillatorStatus::Bearish
    } else {
        OscillatorStatus::Neutral
    }
}

fn rsi_reading(candles: &[Candle]) -> Option<RsiReading> {
    let value = calculate_rsi(candles, rsi::DEFAULT_PERIOD)?.latest_simple()?;
    Some(RsiReading {
        value,
        status: oscillator_status(value, 30.0, 70.0),
    })
}

fn macd_reading(candles: &[Candle]) -> Option<MacdReading> {
    let series = calculate_macd_default(candles)?;
    let IndicatorValue::Macd {
        line,
        signal,
        histogram,
    } = *series.latest()?
    else {
        return None;
    };
    let prev_histogram = match series.previous() {
        Some(IndicatorValue::Macd { histogram, .. }) => Some(*histogram),
        _ => None,
    };

    let crossover = match prev_histogram {
        Some(prev) if line > signal && prev < 0.0 => Crossover::BullishCross,
        Some(prev) if line < signal && prev > 0.0 => Crossover::BearishCross,
        _ => Crossover::NoCross,
    };
    let status = if histogram > 0.0 {
        Bias::Bullish
    } else if histogram < 0.0 {
        Bias::Bearish
    } else {
        Bias::Neutral
    };

    Some(MacdReading {
        line,
        signal,
        histogram,
        status,
        crossover,
    })
}

/// EMA stack; an EMA without enough history reads as the current price.
pub fn ema_reading(candles: &[Candle], price: f64) -> EmaReading {
    let latest = |period| {
        calculate_ema(candles, period)
            .and_then(|s| s.latest_simple())
            .unwrap_or(price)
    };
    let (ema9, ema21, ema50) = (latest(9), latest(21), latest(50));
    let trend = if ema9 > ema21 && ema21 > ema50 {
        Bias::Bullish
    } else if ema9 < ema21 && ema21 < ema50 {
        Bias::Bearish
    } else {
        Bias::Neutral
    };
    EmaReading {
        ema9,
        ema21,
        ema50,
        trend,
        price_above_ema21: price > ema21,
    }
}

fn stochastic_reading(candles: &[Candle]) -> Option<StochasticReading> {
    let series = stochastic::calculate_stochastic_default(candles)?;
    let kd: Vec<(f64, f64)> = series
        .valid_values()
        .filter_map(|v| match v {
            IndicatorValue::Stochastic { k, d } => Some((*k, *d)),
            _ => None,
        })
        .collect();
    let &(k, d) = kd.last()?;

    let crossover = match kd.len().checked_sub(2).map(|i| kd[i]) {
        Some((pk, pd)) if pk <= pd && k > d && k < 80.0 => Crossover::BullishCross,
        Some((pk, pd)) if pk >= pd && k < d && k > 20.0 => Crossover::BearishCross,
        _ => Crossover::NoCross,
    };

    Some(StochasticReading {
        k,
        d,
        status: oscillator_status(k, 20.0, 80.0),
        crossover,
    })
}

fn bollinger_reading(candles: &[Candle], price: f64) -> Option<BollingerReading> {
    let series = bollinger::calculate_bollinger_default(candles)?;
    let bands: Vec<(f64, f64, f64)> = series
        .valid_values()
        .filter_map(|v| match v {
            IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            } => Some((*upper, *middle, *lower)),
            _ => None,
        })
        .collect();
    let &(upper, middle, lower) = bands.last()?;

    let current = bandwidth(upper, middle, lower);
    let history: Vec<f64> = bands[bands.len().saturating_sub(20)..]
        .iter()
        .map(|&(u, m, l)| bandwidth(u, m, l))
        .collect();
    let avg_bandwidth = mean(&history);
    let squeeze = current < avg_bandwidth * 0.5;

    let position = if price > upper {
        BandPosition::AboveUpper
    } else if price < lower {
        BandPosition::BelowLower
    } else if (price - middle).abs() < (upper - lower) * 0.1 {
        BandPosition::AtMiddle
    } else if price > middle {
        BandPosition::UpperHalf
    } else {
        BandPosition::LowerHalf
    };

    Some(BollingerReading {
        upper,
        middle,
        lower,
        bandwidth: current,
        avg_bandwidth,
        position,
        squeeze,
        squeeze_alert: squeeze && current < 1.0,
    })
}

fn adx_reading(candles: &[Candle]) -> Option<AdxReading> {
    let series = calculate_adx(candles, adx::DEFAULT_PERIOD)?;
    let IndicatorValue::Adx {
        adx,
        plus_di,
        minus_di,
    } = *series.latest()?
    else {
        return None;
    };
    let strength = if adx > 40.0 {
        TrendStrength::VeryStrong
    } else if adx > 25.0 {
        TrendStrength::Strong
    } else if adx > 20.0 {
        TrendStrength::Trending
    } else if adx > 10.0 {
        TrendStrength::Weak
    } else {
        TrendStrength::NoTrend
    };
    let direction = if plus_di > minus_di {
        Bias::Bullish
    } else if minus_di > plus_di {
        Bias::Bearish
    } else {
        Bias::Neutral
    };
    Some(AdxReading {
        adx,
        plus_di,
        minus_di,
        strength,
        direction,
    })
}

fn atr_reading(candles: &[Candle], price: f64) -> Option<AtrReading> {
    let values = calculate_atr(candles, atr::DEFAULT_PERIOD)?.valid_simple();
    let &atr = values.last()?;
    let atr_percent = if price > 0.0 { atr / price * 100.0 } else { 0.0 };
    let volatility = if atr_percent > 0.5 {
        Volatility::High
    } else if atr_percent > 0.2 {
        Volatility::Normal
    } else {
        Volatility::Low
    };

    let history = &values[values.len().saturating_sub(20)..];
    let trend = if history.len() > 5 {
        let (older, recent) = history.split_at(history.len() - 5);
        if mean(recent) > mean(older) {
            VolatilityTrend::Increasing
        } else {
            VolatilityTrend::Decreasing
        }
    } else {
        VolatilityTrend::Stable
    };

    Some(AtrReading {
        atr,
        atr_percent,
        volatility,
        trend,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Extreme {
    rsi: f64,
    price: f64,
}

/// Strict local extrema over two neighbours on each side.
fn rsi_extremes(readings: &[(f64, Candle)]) -> (Vec<Extreme>, Vec<Extreme>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    if readings.len() < 5 {
        return (highs, lows);
    }
    for i in 2..readings.len() - 2 {
        let v = readings[i].0;
        let neighbours = [
            readings[i - 2].0,
            readings[i - 1].0,
            readings[i + 1].0,
            readings[i + 2].0,
        ];
        if neighbours.iter().all(|&n| v > n) {
            highs.push(Extreme {
                rsi: v,
                price: readings[i].1.high,
            });
        }
        if neighbours.iter().all(|&n| v < n) {
            lows.push(Extreme {
                rsi: v,
                price: readings[i].1.low,
            });
        }
    }
    (highs, lows)
}

fn classify_divergence(highs: &[Extreme], lows: &[Extreme], threshold: f64) -> Option<Bias> {
    if let [.., prev, last] = highs {
        let tolerance = prev.price * threshold / 100.0;
        if last.price > prev.price + tolerance && last.rsi < prev.rsi - threshold {
            return Some(Bias::Bearish);
        }
    }
    if let [.., prev, last] = lows {
        let tolerance = prev.price * threshold / 100.0;
        if last.price < prev.price - tolerance && last.rsi > prev.rsi + threshold {
            return Some(Bias::Bullish);
        }
    }
    None
}

/// Price/RSI divergence over the latest RSI readings.
///
/// Bearish: price makes a higher high while RSI makes a lower high. Bullish
/// mirrors this on lows. `threshold` is a percentage of price for the price
/// leg and RSI points for the oscillator leg.
pub fn rsi_divergence(candles: &[Candle], threshold: f64) -> Option<Bias> {
    if candles.len() < DIVERGENCE_MIN_CANDLES {
        return None;
    }
    let recent = &candles[candles.len().saturating_sub(DIVERGENCE_WINDOW)..];
    let series = calculate_rsi(recent, rsi::DEFAULT_PERIOD)?;
    let readings: Vec<(f64, Candle)> = series
        .values
        .iter()
        .zip(recent)
        .filter(|(p, _)| p.valid)
        .filter_map(|(p, c)| p.value.as_simple().map(|v| (v, *c)))
        .collect();
    let tail = &readings[readings.len().saturating_sub(DIVERGENCE_READINGS)..];
    let (highs, lows) = rsi_extremes(tail);
    classify_divergence(&highs, &lows, threshold)
}
