//! CSV candle files.
//!
//! Expected header: `time,open,high,low,close,volume`. `time` is unix seconds
//! or a UTC timestamp (`2024-01-15 13:00:00`, `2024-01-15T13:00:00Z`, or a
//! bare date for daily data). A missing `volume` column reads as zero.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::domain::candle::{validate_series, Candle};
use crate::domain::error::SignalforgeError;
use crate::domain::timeframe::Timeframe;
use crate::ports::candle_port::CandleSource;

/// One CSV file per timeframe. The symbol is whatever the files hold.
pub struct CsvAdapter {
    files: BTreeMap<Timeframe, PathBuf>,
}

impl CsvAdapter {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, timeframe: Timeframe, path: impl Into<PathBuf>) -> Self {
        self.files.insert(timeframe, path.into());
        self
    }

    pub fn timeframes(&self) -> impl Iterator<Item = Timeframe> + '_ {
        self.files.keys().copied()
    }
}

impl Default for CsvAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CandleSource for CsvAdapter {
    fn candles(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>, SignalforgeError> {
        let path = self.files.get(&timeframe).ok_or_else(|| SignalforgeError::DataSource {
            reason: format!("no {} candle file configured for {}", timeframe, symbol),
        })?;
        let candles = read_candles(path)?;
        tracing::debug!(symbol, %timeframe, count = candles.len(), path = %path.display(), "loaded candles");
        Ok(candles)
    }
}

/// Reads and validates a candle file.
pub fn read_candles(path: &Path) -> Result<Vec<Candle>, SignalforgeError> {
    let content = fs::read_to_string(path).map_err(|e| SignalforgeError::DataSource {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;
    parse_candles(&content)
}

/// Parses CSV text into candles, oldest first.
pub fn parse_candles(content: &str) -> Result<Vec<Candle>, SignalforgeError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| SignalforgeError::DataSource {
            reason: format!("CSV header error: {}", e),
        })?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let required = |name: &str| {
        column(name).ok_or_else(|| SignalforgeError::DataSource {
            reason: format!("missing {} column", name),
        })
    };
    let time_col = required("time")?;
    let open_col = required("open")?;
    let high_col = required("high")?;
    let low_col = required("low")?;
    let close_col = required("close")?;
    let volume_col = column("volume");

    let mut candles = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| SignalforgeError::DataSource {
            reason: format!("CSV parse error: {}", e),
        })?;
        let line = row + 2;
        let field = |col: usize, name: &str| -> Result<f64, SignalforgeError> {
            let raw = record.get(col).unwrap_or("");
            raw.parse::<f64>().map_err(|_| SignalforgeError::DataSource {
                reason: format!("line {}: invalid {} value '{}'", line, name, raw),
            })
        };

        let raw_time = record.get(time_col).unwrap_or("");
        let time = parse_time(raw_time).ok_or_else(|| SignalforgeError::DataSource {
            reason: format!("line {}: invalid time '{}'", line, raw_time),
        })?;
        let volume = match volume_col {
            Some(col) if !record.get(col).unwrap_or("").is_empty() => field(col, "volume")?,
            _ => 0.0,
        };

        candles.push(Candle {
            time,
            open: field(open_col, "open")?,
            high: field(high_col, "high")?,
            low: field(low_col, "low")?,
            close: field(close_col, "close")?,
            volume,
        });
    }

    validate_series(&candles).map_err(|(index, reason)| SignalforgeError::DataSource {
        reason: format!("candle {}: {}", index, reason),
    })?;
    Ok(candles)
}

fn parse_time(raw: &str) -> Option<i64> {
    if let Ok(secs) = raw.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y.%m.%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}
