//! Optional natural-language commentary on a signal.

use serde::Serialize;

use crate::domain::error::SignalforgeError;
use crate::domain::scorer::CompositeSignal;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Commentary {
    pub agrees: bool,
    /// Confidence points; clamped to ±20 when applied.
    pub adjustment: f64,
    pub note: String,
}

/// A failing provider never invalidates the signal it comments on.
pub trait CommentaryProvider {
    fn comment(&self, signal: &CompositeSignal) -> Result<Commentary, SignalforgeError>;
}
