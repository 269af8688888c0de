//! Data source trait and structured error types.
//!
//! A data source serves immutable per-year partitions of a (symbol, interval)
//! history. The same key must return identical bars on every call until the
//! partition is explicitly invalidated.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{Interval, TimeSeries};
use crate::error::{DataIntegrityError, MissingDataError};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Missing(#[from] MissingDataError),

    #[error(transparent)]
    Integrity(#[from] DataIntegrityError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("corrupt cache file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("CSV error at record {record}: {reason}")]
    Csv { record: u64, reason: String },

    #[error("metadata error: {0}")]
    Metadata(String),
}

impl DataError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when nothing is cached for the requested key.
    pub fn is_missing(&self) -> bool {
        matches!(self, DataError::Missing(_))
    }
}

/// Read interface over cached OHLCV history.
pub trait DataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// One calendar-year partition. Absent partitions are a
    /// [`MissingDataError`], never an empty series.
    fn load_year(&self, symbol: &str, interval: Interval, year: i32)
        -> Result<TimeSeries, DataError>;

    /// Per-year partitions for every year in `years`.
    fn get_series_by_year(
        &self,
        symbol: &str,
        interval: Interval,
        years: &BTreeSet<i32>,
    ) -> Result<BTreeMap<i32, TimeSeries>, DataError> {
        years
            .iter()
            .map(|&year| Ok((year, self.load_year(symbol, interval, year)?)))
            .collect()
    }

    /// The requested years concatenated into one ascending series.
    fn get_series(
        &self,
        symbol: &str,
        interval: Interval,
        years: &BTreeSet<i32>,
    ) -> Result<TimeSeries, DataError> {
        let by_year = self.get_series_by_year(symbol, interval, years)?;
        Ok(TimeSeries::concat_years(&by_year, years)?)
    }
}
