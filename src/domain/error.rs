//! Domain error types.
//!
//! `SignalforgeError` covers everything that aborts an operation. A scorer
//! declining to emit a signal is not an error and never appears here.

use crate::domain::feature::Category;

/// Top-level error type for signalforge.
#[derive(Debug, thiserror::Error)]
pub enum SignalforgeError {
    #[error("insufficient data for {context}: have {have} candles, need {need}")]
    InsufficientData {
        context: String,
        have: usize,
        need: usize,
    },

    #[error("invalid symbol metadata for {symbol}: {reason}")]
    InvalidSymbolMetadata { symbol: String, reason: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("candle source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SignalforgeError {
    pub fn insufficient(context: impl Into<String>, have: usize, need: usize) -> Self {
        SignalforgeError::InsufficientData {
            context: context.into(),
            have,
            need,
        }
    }
}

impl SignalforgeError {
    /// Process exit status for this error's taxonomy group.
    pub fn exit_code(&self) -> u8 {
        match self {
            SignalforgeError::Io(_) | SignalforgeError::Json(_) => 1,
            SignalforgeError::Configuration { .. }
            | SignalforgeError::ConfigParse { .. }
            | SignalforgeError::ConfigMissing { .. }
            | SignalforgeError::ConfigInvalid { .. } => 2,
            SignalforgeError::DataSource { .. } => 3,
            SignalforgeError::InvalidSymbolMetadata { .. } => 4,
            SignalforgeError::InsufficientData { .. } => 5,
        }
    }
}

impl From<&SignalforgeError> for std::process::ExitCode {
    fn from(err: &SignalforgeError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}

/// Failure inside a single feature extractor. The scorer degrades the
/// category to neutral and keeps the error for auditing.
#[derive(Debug, Clone, PartialEq, thiserror::Error, serde::Serialize)]
#[error("{category} extractor failed: {reason}")]
pub struct ExtractorError {
    pub category: Category,
    pub reason: String,
}

impl ExtractorError {
    pub fn insufficient(category: Category, have: usize, need: usize) -> Self {
        ExtractorError {
            category,
            reason: format!("have {have} candles, need {need}"),
        }
    }
}
