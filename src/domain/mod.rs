//! Core domain types and logic.

pub mod analysis;
pub mod backtest;
pub mod candle;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod feature;
pub mod indicator;
pub mod indicator_helpers;
pub mod metrics;
pub mod mtf;
pub mod position;
pub mod risk;
pub mod scorer;
pub mod session;
pub mod support_resistance;
pub mod swing;
pub mod technical;
pub mod timeframe;
pub mod trade_management;
