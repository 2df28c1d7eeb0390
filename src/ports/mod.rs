//! Port traits for the collaborators the analytics core depends on.

pub mod candle_port;
pub mod commentary_port;
pub mod config_port;
pub mod market_port;
