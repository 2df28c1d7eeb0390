//! Volume analysis: VWAP, on-balance volume, a price/volume profile and
//! volume divergence over the trailing candles.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::error::ExtractorError;
use crate::domain::feature::{Bias, Category, CategoryScore, Reason, ReasonCode};
use crate::domain::indicator_helpers::mean;

pub const MIN_CANDLES: usize = 20;
pub const PROFILE_BINS: usize = 30;
const VALUE_AREA_SHARE: f64 = 0.7;
const DIVERGENCE_WINDOW: usize = 10;
const MAX_REASONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VwapPosition {
    Above,
    Below,
    AtVwap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VwapReading {
    pub value: f64,
    pub position: VwapPosition,
    pub bias: Bias,
    pub distance_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObvTrend {
    Rising,
    Falling,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObvReading {
    pub value: f64,
    pub trend: ObvTrend,
    pub bias: Bias,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfilePosition {
    AboveVa,
    BelowVa,
    AtPoc,
    InsideVa,
}

/// Point of control and value area of a 30-bin volume histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeProfile {
    pub poc: f64,
    pub vah: f64,
    pub val: f64,
    pub position: ProfilePosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DivergenceKind {
    BearishDivergence,
    BullishDivergence,
    BullishConfirmation,
    BearishConfirmation,
}

impl DivergenceKind {
    pub fn bias(self) -> Bias {
        match self {
            DivergenceKind::BullishDivergence | DivergenceKind::BullishConfirmation => {
                Bias::Bullish
            }
            DivergenceKind::BearishDivergence | DivergenceKind::BearishConfirmation => {
                Bias::Bearish
            }
        }
    }

    fn description(self) -> &'static str {
        match self {
            DivergenceKind::BearishDivergence => {
                "Price rising but volume declining - weakness signal"
            }
            DivergenceKind::BullishDivergence => {
                "Price falling but volume declining - selling exhaustion"
            }
            DivergenceKind::BullishConfirmation => {
                "Price rising with increasing volume - strong move"
            }
            DivergenceKind::BearishConfirmation => {
                "Price falling with increasing volume - strong selloff"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeDivergence {
    pub kind: DivergenceKind,
    pub strength: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeReport {
    pub vwap: VwapReading,
    pub obv: ObvReading,
    pub profile: Option<VolumeProfile>,
    pub divergence: Option<VolumeDivergence>,
}

pub fn analyze_volume(candles: &[Candle]) -> Result<VolumeReport, ExtractorError> {
    if candles.len() < MIN_CANDLES {
        return Err(ExtractorError::insufficient(
            Category::Volume,
            candles.len(),
            MIN_CANDLES,
        ));
    }
    if !candles.iter().any(|c| c.volume > 0.0) {
        return Err(ExtractorError {
            category: Category::Volume,
            reason: "no volume data available".to_string(),
        });
    }
    Ok(VolumeReport {
        vwap: vwap(candles),
        obv: obv(candles),
        profile: volume_profile(candles),
        divergence: volume_divergence(candles),
    })
}

/// Cumulative VWAP over the whole window, falling back to the typical price
/// while no volume has traded.
pub fn vwap(candles: &[Candle]) -> VwapReading {
    let mut tp_vol = 0.0;
    let mut vol = 0.0;
    let mut value = 0.0;
    for c in candles {
        tp_vol += c.typical_price() * c.volume;
        vol += c.volume;
        value = if vol > 0.0 { tp_vol / vol } else { c.typical_price() };
    }

    let price = candles.last().map_or(0.0, |c| c.close);
    let (position, bias) = if price > value * 1.001 {
        (VwapPosition::Above, Bias::Bullish)
    } else if price < value * 0.999 {
        (VwapPosition::Below, Bias::Bearish)
    } else {
        (VwapPosition::AtVwap, Bias::Neutral)
    };
    let distance_pct = if price != 0.0 {
        (price - value).abs() / price * 100.0
    } else {
        0.0
    };
    VwapReading {
        value,
        position,
        bias,
        distance_pct,
    }
}

pub fn obv_values(candles: &[Candle]) -> Vec<f64> {
    let mut values = Vec::with_capacity(candles.len());
    let mut running = 0.0;
    values.push(running);
    for w in candles.windows(2) {
        if w[1].close > w[0].close {
            running += w[1].volume;
        } else if w[1].close < w[0].close {
            running -= w[1].volume;
        }
        values.push(running);
    }
    values
}

/// OBV trend compares the mean of the last ten values against the ten
/// before, with a 5% band.
pub fn obv(candles: &[Candle]) -> ObvReading {
    let values = obv_values(candles);
    let value = values.last().copied().unwrap_or(0.0);
    let n = values.len();
    let (trend, bias) = if n >= 20 {
        let recent = mean(&values[n - 10..]);
        let older = mean(&values[n - 20..n - 10]);
        if recent > older * 1.05 {
            (ObvTrend::Rising, Bias::Bullish)
        } else if recent < older * 0.95 {
            (ObvTrend::Falling, Bias::Bearish)
        } else {
            (ObvTrend::Flat, Bias::Neutral)
        }
    } else {
        (ObvTrend::Flat, Bias::Neutral)
    };
    ObvReading { value, trend, bias }
}

/// Distributes each candle's volume into the bin of its typical price. The
/// value area grows outward from the POC, taking the heavier neighbour
/// first (left on ties), until it holds 70% of the volume.
pub fn volume_profile(candles: &[Candle]) -> Option<VolumeProfile> {
    let price_min = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let price_max = candles
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);
    if candles.is_empty() || price_max <= price_min {
        return None;
    }

    let bin_size = (price_max - price_min) / PROFILE_BINS as f64;
    let mut bins = [0.0_f64; PROFILE_BINS];
    for c in candles {
        let idx = ((c.typical_price() - price_min) / bin_size) as usize;
        bins[idx.min(PROFILE_BINS - 1)] += c.volume;
    }
    let total: f64 = bins.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let bin_price = |i: usize| price_min + (i as f64 + 0.5) * bin_size;

    // First maximum wins.
    let mut poc_idx = 0;
    for (i, &v) in bins.iter().enumerate() {
        if v > bins[poc_idx] {
            poc_idx = i;
        }
    }

    let target = total * VALUE_AREA_SHARE;
    let mut cumulative = bins[poc_idx];
    let (mut left, mut right) = (poc_idx, poc_idx);
    while cumulative < target && (left > 0 || right < PROFILE_BINS - 1) {
        let left_vol = if left > 0 { bins[left - 1] } else { 0.0 };
        let right_vol = if right < PROFILE_BINS - 1 { bins[right + 1] } else { 0.0 };
        if left > 0 && left_vol >= right_vol {
            left -= 1;
            cumulative += bins[left];
        } else if right < PROFILE_BINS - 1 {
            right += 1;
            cumulative += bins[right];
        } else {
            break;
        }
    }

    let poc = bin_price(poc_idx);
    let vah = bin_price(right);
    let val = bin_price(left);
    let price = candles[candles.len() - 1].close;
    let position = if price > vah {
        ProfilePosition::AboveVa
    } else if price < val {
        ProfilePosition::BelowVa
    } else if price != 0.0 && (price - poc).abs() / price < 0.002 {
        ProfilePosition::AtPoc
    } else {
        ProfilePosition::InsideVa
    };
    Some(VolumeProfile {
        poc,
        vah,
        val,
        position,
    })
}

/// Compares the price move over the last ten candles with the change from
/// the first three volumes to the last three.
pub fn volume_divergence(candles: &[Candle]) -> Option<VolumeDivergence> {
    if candles.len() < DIVERGENCE_WINDOW {
        return None;
    }
    let recent = &candles[candles.len() - DIVERGENCE_WINDOW..];
    let closes: Vec<f64> = recent.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = recent.iter().map(|c| c.volume).collect();
    let last = closes[DIVERGENCE_WINDOW - 1];

    let price_rising = last > closes[0] && last > closes[DIVERGENCE_WINDOW - 5];
    let price_falling = last < closes[0] && last < closes[DIVERGENCE_WINDOW - 5];
    let vol_recent = mean(&volumes[DIVERGENCE_WINDOW - 3..]);
    let vol_older = mean(&volumes[..3]);
    let ratio = vol_recent / vol_older.max(1.0);
    let vol_falling = vol_recent < vol_older * 0.7;
    let vol_surge = vol_recent > vol_older * 1.5;

    let fade = ((1.0 - ratio) * 100.0).clamp(0.0, 100.0) as u32;
    let surge = ((ratio - 1.0) * 50.0).clamp(0.0, 100.0) as u32;
    let (kind, strength) = if price_rising && vol_falling {
        (DivergenceKind::BearishDivergence, fade)
    } else if price_falling && vol_falling {
        (DivergenceKind::BullishDivergence, fade)
    } else if vol_surge && price_rising {
        (DivergenceKind::BullishConfirmation, surge)
    } else if vol_surge && price_falling {
        (DivergenceKind::BearishConfirmation, surge)
    } else {
        return None;
    };
    Some(VolumeDivergence { kind, strength })
}

impl VolumeReport {
    pub fn score(&self) -> CategoryScore {
        let mut bull = 0.0;
        let mut bear = 0.0;
        let mut reasons = Vec::new();

        match self.vwap.bias {
            Bias::Bullish => {
                bull += 35.0;
                reasons.push(
                    Reason::new(
                        Category::Volume,
                        ReasonCode::Vwap,
                        Bias::Bullish,
                        format!("Price above VWAP ({:.5})", self.vwap.value),
                    )
                    .with_value("vwap", self.vwap.value),
                );
            }
            Bias::Bearish => {
                bear += 35.0;
                reasons.push(
                    Reason::new(
                        Category::Volume,
                        ReasonCode::Vwap,
                        Bias::Bearish,
                        format!("Price below VWAP ({:.5})", self.vwap.value),
                    )
                    .with_value("vwap", self.vwap.value),
                );
            }
            Bias::Neutral => {}
        }

        match self.obv.bias {
            Bias::Bullish => {
                bull += 30.0;
                reasons.push(Reason::new(
                    Category::Volume,
                    ReasonCode::ObvTrend,
                    Bias::Bullish,
                    "OBV Rising - buying pressure",
                ));
            }
            Bias::Bearish => {
                bear += 30.0;
                reasons.push(Reason::new(
                    Category::Volume,
                    ReasonCode::ObvTrend,
                    Bias::Bearish,
                    "OBV Falling - selling pressure",
                ));
            }
            Bias::Neutral => {}
        }

        if let Some(div) = &self.divergence {
            let bias = div.kind.bias();
            match bias {
                Bias::Bullish => bull += 35.0,
                _ => bear += 35.0,
            }
            let code = match div.kind {
                DivergenceKind::BullishConfirmation | DivergenceKind::BearishConfirmation => {
                    ReasonCode::VolumeConfirmation
                }
                _ => ReasonCode::VolumeDivergence,
            };
            reasons.push(
                Reason::new(Category::Volume, code, bias, div.kind.description())
                    .with_value("strength", div.strength as f64),
            );
        }

        reasons.truncate(MAX_REASONS);
        CategoryScore {
            bullish: f64::min(bull, 100.0),
            bearish: f64::min(bear, 100.0),
            reasons,
        }
    }
}
