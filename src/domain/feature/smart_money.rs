//! Smart-money concepts: market structure breaks, order blocks, fair value
//! gaps, liquidity sweeps and the premium/discount range.

use std::cmp::Ordering;

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::domain::error::ExtractorError;
use crate::domain::feature::{
    Bias, Category, CategoryScore, FairValueGap, OrderBlock, Reason, ReasonCode, distance_pct,
};
use crate::domain::indicator_helpers::mean;
use crate::domain::swing::{DEFAULT_LOOKBACK, SwingPoint, Swings, find_swings};

pub const MIN_CANDLES: usize = 30;
const OB_MAX_AGE: usize = 50;
const FVG_MAX_AGE: usize = 30;
const FVG_MIN_GAP: f64 = 0.0001;
const EQUAL_TOLERANCE: f64 = 0.0005;
const SWEEP_WINDOW: usize = 10;
const MAX_REASONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakKind {
    Bos,
    Choch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureBreak {
    pub kind: BreakKind,
    pub bias: Bias,
    pub price: f64,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmcStructure {
    pub trend: Bias,
    pub bos: Vec<StructureBreak>,
    pub choch: Vec<StructureBreak>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sweep {
    pub bias: Bias,
    pub level: f64,
    pub extreme: f64,
    pub close: f64,
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Liquidity {
    pub equal_highs: Vec<f64>,
    pub equal_lows: Vec<f64>,
    pub sweeps: Vec<Sweep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceZone {
    Premium,
    Discount,
    Equilibrium,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PremiumDiscount {
    pub zone: PriceZone,
    pub position_pct: f64,
    pub range_high: Option<f64>,
    pub range_low: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmartMoneyReport {
    pub structure: SmcStructure,
    pub order_blocks: Vec<OrderBlock>,
    pub fair_value_gaps: Vec<FairValueGap>,
    pub liquidity: Liquidity,
    pub premium_discount: PremiumDiscount,
    pub price: f64,
}

pub fn analyze_smart_money(candles: &[Candle]) -> Result<SmartMoneyReport, ExtractorError> {
    if candles.len() < MIN_CANDLES {
        return Err(ExtractorError::insufficient(
            Category::SmartMoney,
            candles.len(),
            MIN_CANDLES,
        ));
    }
    let price = candles[candles.len() - 1].close;
    let swings = find_swings(candles, DEFAULT_LOOKBACK);
    Ok(SmartMoneyReport {
        structure: structure(&swings),
        order_blocks: order_blocks(candles),
        fair_value_gaps: fair_value_gaps(candles),
        liquidity: liquidity(candles, &swings),
        premium_discount: premium_discount(price, &swings),
        price,
    })
}

fn last_n(points: &[SwingPoint], n: usize) -> &[SwingPoint] {
    &points[points.len().saturating_sub(n)..]
}

/// Walks consecutive pairs among the latest five swing highs and the latest
/// five swing lows, merged by the index of the newer swing. A swing against
/// the recorded trend is a change of character and flips the trend;
/// otherwise a break in that direction is a break of structure.
pub fn structure(swings: &Swings) -> SmcStructure {
    let mut result = SmcStructure {
        trend: Bias::Neutral,
        bos: Vec::new(),
        choch: Vec::new(),
    };
    if swings.highs.len() < 2 || swings.lows.len() < 2 {
        return result;
    }

    let pairs = |points: &[SwingPoint], is_high: bool| {
        last_n(points, 5)
            .windows(2)
            .map(|pair| (is_high, pair[0], pair[1]))
            .collect::<Vec<_>>()
    };
    let mut steps = pairs(&swings.highs, true);
    steps.extend(pairs(&swings.lows, false));
    // Stable: a high and a low on the same candle keep the high first.
    steps.sort_by_key(|&(_, _, curr)| curr.index);

    let mut trend = Bias::Neutral;
    for (is_high, prev, curr) in steps {
        match (is_high, curr.price.total_cmp(&prev.price)) {
            (true, Ordering::Greater) => trend = Bias::Bullish,
            (true, Ordering::Less) => {
                let kind = if trend == Bias::Bullish {
                    trend = Bias::Bearish;
                    BreakKind::Choch
                } else {
                    BreakKind::Bos
                };
                push_break(&mut result, kind, Bias::Bearish, curr);
            }
            (false, Ordering::Greater) => {
                let kind = if trend == Bias::Bearish {
                    trend = Bias::Bullish;
                    BreakKind::Choch
                } else {
                    BreakKind::Bos
                };
                push_break(&mut result, kind, Bias::Bullish, curr);
            }
            (false, Ordering::Less) => trend = Bias::Bearish,
            (_, Ordering::Equal) => {}
        }
    }

    result.trend = trend;
    let bos_start = result.bos.len().saturating_sub(3);
    result.bos.drain(..bos_start);
    let choch_start = result.choch.len().saturating_sub(2);
    result.choch.drain(..choch_start);
    result
}

fn push_break(result: &mut SmcStructure, kind: BreakKind, bias: Bias, at: SwingPoint) {
    let brk = StructureBreak {
        kind,
        bias,
        price: at.price,
        index: at.index,
    };
    match kind {
        BreakKind::Bos => result.bos.push(brk),
        BreakKind::Choch => result.choch.push(brk),
    }
}

/// Last opposite-coloured candle before a candle whose body exceeds twice
/// the average of the previous ten bodies.
pub fn order_blocks(candles: &[Candle]) -> Vec<OrderBlock> {
    let n = candles.len();
    let mut blocks = Vec::new();

    for i in 2..n.saturating_sub(1) {
        let bodies: Vec<f64> = candles[i.saturating_sub(10)..i].iter().map(Candle::body).collect();
        let avg_body = mean(&bodies);
        if avg_body == 0.0 {
            continue;
        }
        let (base, strong) = (&candles[i - 1], &candles[i]);
        if strong.body() <= avg_body * 2.0 {
            continue;
        }
        let bias = if base.is_bearish() && strong.is_bullish() {
            Bias::Bullish
        } else if base.is_bullish() && strong.is_bearish() {
            Bias::Bearish
        } else {
            continue;
        };

        let later = &candles[i + 1..];
        let mitigated = match bias {
            Bias::Bullish => later.iter().any(|c| c.close < base.low),
            _ => later.iter().any(|c| c.close > base.high),
        };
        let age = n - i;
        if age > OB_MAX_AGE || mitigated {
            continue;
        }
        blocks.push(OrderBlock {
            bias,
            low: base.low,
            high: base.high,
            index: i - 1,
            age,
            strength: ((strong.body() / avg_body * 30.0) as u32).min(100),
            mitigated,
        });
    }

    blocks.sort_by(|a, b| b.strength.cmp(&a.strength).then(a.age.cmp(&b.age)));
    blocks.truncate(5);
    blocks
}

/// Three-candle imbalances still open: no later candle has traded back
/// into the gap.
pub fn fair_value_gaps(candles: &[Candle]) -> Vec<FairValueGap> {
    let n = candles.len();
    let mut gaps = Vec::new();

    for i in 2..n {
        let (c1, c3) = (&candles[i - 2], &candles[i]);
        let later = &candles[i + 1..];
        let (bias, top, bottom, filled) = if c3.low > c1.high {
            let (top, bottom) = (c3.low, c1.high);
            (Bias::Bullish, top, bottom, later.iter().any(|c| c.low < top))
        } else if c1.low > c3.high {
            let (top, bottom) = (c1.low, c3.high);
            (Bias::Bearish, top, bottom, later.iter().any(|c| c.high > bottom))
        } else {
            continue;
        };
        let age = n - 1 - i;
        if top - bottom <= FVG_MIN_GAP || filled || age > FVG_MAX_AGE {
            continue;
        }
        gaps.push(FairValueGap {
            bias,
            top,
            bottom,
            mid: (top + bottom) / 2.0,
            index: i - 1,
            age,
            filled,
        });
    }

    gaps.sort_by_key(|g| g.age);
    gaps.truncate(5);
    gaps
}

fn equal_levels(points: &[SwingPoint]) -> Vec<f64> {
    let mut levels: Vec<f64> = Vec::new();
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            if a.price == 0.0 || (a.price - b.price).abs() / a.price >= EQUAL_TOLERANCE {
                continue;
            }
            let avg = (a.price + b.price) / 2.0;
            if !levels.iter().any(|l| (l - avg).abs() / avg < EQUAL_TOLERANCE) {
                levels.push(avg);
            }
        }
    }
    levels
}

/// Equal highs/lows from swing pairs and sweeps of those levels in the last
/// ten candles: a wick through the level with a close back inside.
pub fn liquidity(candles: &[Candle], swings: &Swings) -> Liquidity {
    let mut equal_highs = equal_levels(&swings.highs);
    let mut equal_lows = equal_levels(&swings.lows);

    let mut sweeps = Vec::new();
    let start = candles.len().saturating_sub(SWEEP_WINDOW);
    for (offset, c) in candles[start..].iter().enumerate() {
        for &level in &equal_highs {
            if c.high > level && c.close < level {
                sweeps.push(Sweep {
                    bias: Bias::Bearish,
                    level,
                    extreme: c.high,
                    close: c.close,
                    index: start + offset,
                });
            }
        }
        for &level in &equal_lows {
            if c.low < level && c.close > level {
                sweeps.push(Sweep {
                    bias: Bias::Bullish,
                    level,
                    extreme: c.low,
                    close: c.close,
                    index: start + offset,
                });
            }
        }
    }

    let sweep_start = sweeps.len().saturating_sub(3);
    sweeps.drain(..sweep_start);
    equal_highs.truncate(3);
    equal_lows.truncate(3);
    Liquidity {
        equal_highs,
        equal_lows,
        sweeps,
    }
}

/// Position of `price` within the range spanned by the last three swing
/// highs and lows.
pub fn premium_discount(price: f64, swings: &Swings) -> PremiumDiscount {
    let neutral = PremiumDiscount {
        zone: PriceZone::Neutral,
        position_pct: 50.0,
        range_high: None,
        range_low: None,
    };
    if swings.highs.is_empty() || swings.lows.is_empty() {
        return neutral;
    }
    let high = last_n(&swings.highs, 3)
        .iter()
        .map(|s| s.price)
        .fold(f64::NEG_INFINITY, f64::max);
    let low = last_n(&swings.lows, 3)
        .iter()
        .map(|s| s.price)
        .fold(f64::INFINITY, f64::min);
    if high == low {
        return neutral;
    }

    let position_pct = (price - low) / (high - low) * 100.0;
    let zone = if position_pct > 70.0 {
        PriceZone::Premium
    } else if position_pct < 30.0 {
        PriceZone::Discount
    } else if (40.0..=60.0).contains(&position_pct) {
        PriceZone::Equilibrium
    } else {
        PriceZone::Neutral
    };
    PremiumDiscount {
        zone,
        position_pct,
        range_high: Some(high),
        range_low: Some(low),
    }
}

impl SmartMoneyReport {
    pub fn score(&self) -> CategoryScore {
        let mut bull = 0.0;
        let mut bear = 0.0;
        let mut reasons = Vec::new();
        let reason = |code, bias, text: String| Reason::new(Category::SmartMoney, code, bias, text);

        match self.structure.trend {
            Bias::Bullish => {
                bull += 35.0;
                reasons.push(reason(
                    ReasonCode::StructureTrend,
                    Bias::Bullish,
                    "Market structure BULLISH".to_string(),
                ));
            }
            Bias::Bearish => {
                bear += 35.0;
                reasons.push(reason(
                    ReasonCode::StructureTrend,
                    Bias::Bearish,
                    "Market structure BEARISH".to_string(),
                ));
            }
            Bias::Neutral => {}
        }

        for choch in &self.structure.choch {
            let text = match choch.bias {
                Bias::Bullish => format!("Higher Low at {:.5} - potential reversal", choch.price),
                _ => format!("Lower High at {:.5} - potential reversal", choch.price),
            };
            match choch.bias {
                Bias::Bullish => bull += 15.0,
                _ => bear += 15.0,
            }
            reasons.push(
                reason(ReasonCode::ChangeOfCharacter, choch.bias, text)
                    .with_value("price", choch.price),
            );
        }

        for ob in self.order_blocks.iter().take(2) {
            let edge = if ob.bias == Bias::Bullish { ob.low } else { ob.high };
            let dist = distance_pct(self.price, edge);
            let points = if dist < 0.5 {
                25.0
            } else if dist < 1.0 {
                12.0
            } else {
                0.0
            };
            match ob.bias {
                Bias::Bullish => bull += points,
                _ => bear += points,
            }
            if dist < 0.5 {
                let side = if ob.bias == Bias::Bullish { "Bullish" } else { "Bearish" };
                reasons.push(
                    reason(ReasonCode::OrderBlock, ob.bias, format!("Near {} OB ({:.5})", side, edge))
                        .with_value("level", edge)
                        .with_value("distance_pct", dist),
                );
            }
        }

        for fvg in self.fair_value_gaps.iter().take(2) {
            let dist = distance_pct(self.price, fvg.mid);
            if dist >= 0.5 {
                continue;
            }
            let side = match fvg.bias {
                Bias::Bullish => {
                    bull += 15.0;
                    "Bullish"
                }
                _ => {
                    bear += 15.0;
                    "Bearish"
                }
            };
            reasons.push(
                reason(ReasonCode::FairValueGap, fvg.bias, format!("Near {} FVG ({:.5})", side, fvg.mid))
                    .with_value("mid", fvg.mid),
            );
        }

        for sweep in &self.liquidity.sweeps {
            let text = match sweep.bias {
                Bias::Bullish => {
                    bull += 15.0;
                    format!("Liquidity sweep below {:.5} - bullish signal", sweep.level)
                }
                _ => {
                    bear += 15.0;
                    format!("Liquidity sweep above {:.5} - bearish signal", sweep.level)
                }
            };
            reasons.push(
                reason(ReasonCode::LiquiditySweep, sweep.bias, text).with_value("level", sweep.level),
            );
        }

        match self.premium_discount.zone {
            PriceZone::Discount => {
                bull += 10.0;
                reasons.push(
                    reason(
                        ReasonCode::PremiumDiscount,
                        Bias::Bullish,
                        "Price in Discount Zone".to_string(),
                    )
                    .with_value("position_pct", self.premium_discount.position_pct),
                );
            }
            PriceZone::Premium => {
                bear += 10.0;
                reasons.push(
                    reason(
                        ReasonCode::PremiumDiscount,
                        Bias::Bearish,
                        "Price in Premium Zone".to_string(),
                    )
                    .with_value("position_pct", self.premium_discount.position_pct),
                );
            }
            _ => {}
        }

        reasons.truncate(MAX_REASONS);
        CategoryScore {
            bullish: f64::min(bull, 100.0),
            bearish: f64::min(bear, 100.0),
            reasons,
        }
    }
}
