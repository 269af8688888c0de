//! CSV import: `timestamp,open,high,low,close,volume` rows into a validated
//! series, optionally written straight into the cache.
//!
//! `timestamp` is either epoch milliseconds (exchange kline exports) or an
//! RFC 3339 string. Rows may arrive in any order; duplicates are rejected.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::cache::{CacheMeta, ParquetCache};
use super::provider::DataError;
use crate::domain::{Bar, Interval, TimeSeries};
use crate::error::DataIntegrityError;

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Parse epoch milliseconds or RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Read bars from any CSV source with a header row.
pub fn read_csv<R: Read>(
    reader: R,
    symbol: &str,
    interval: Interval,
) -> Result<TimeSeries, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars = Vec::new();
    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let record = i as u64 + 1;
        let row = row.map_err(|e| DataError::Csv {
            record,
            reason: e.to_string(),
        })?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| DataError::Csv {
            record,
            reason: format!("unparseable timestamp '{}'", row.timestamp),
        })?;
        let bar = Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        if !bar.is_sane() || !(bar.volume.is_finite() && bar.volume >= 0.0) {
            return Err(DataIntegrityError::MalformedBar {
                timestamp,
                reason: format!(
                    "o={} h={} l={} c={} v={}",
                    bar.open, bar.high, bar.low, bar.close, bar.volume
                ),
            }
            .into());
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(TimeSeries::new(symbol, interval, bars)?)
}

pub fn read_csv_file(
    path: &Path,
    symbol: &str,
    interval: Interval,
) -> Result<TimeSeries, DataError> {
    let file = File::open(path).map_err(|e| DataError::io(path, e))?;
    read_csv(file, symbol, interval)
}

/// Import a CSV file into the cache, one partition per calendar year.
pub fn import_csv(
    cache: &ParquetCache,
    path: &Path,
    symbol: &str,
    interval: Interval,
) -> Result<Vec<CacheMeta>, DataError> {
    let series = read_csv_file(path, symbol, interval)?;
    let metas = cache.write_series(&series)?;
    info!(
        symbol,
        interval = %interval,
        bars = series.len(),
        partitions = metas.len(),
        path = %path.display(),
        "imported CSV"
    );
    Ok(metas)
}
