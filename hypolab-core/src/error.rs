//! Error taxonomy shared by the engine, data sources and the optimizer.
//!
//! - [`ConfigurationError`] — structurally invalid run (bad exit parameters,
//!   overlapping walk-forward windows, empty grids). Always fatal.
//! - [`DataIntegrityError`] — the data handed to a run is unusable
//!   (non-monotonic timestamps, overlapping year concatenation, misaligned
//!   signal vectors). Fatal for the affected run only.
//! - [`MissingDataError`] — nothing cached for a requested key. Never treated
//!   as "no signals".

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Invalid or missing configuration, raised before any simulation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("parameter '{name}' must be positive and finite, got {value}")]
    NonPositiveParameter { name: String, value: f64 },

    #[error("parameter '{name}' out of range: {reason}")]
    ParameterOutOfRange { name: String, reason: String },

    #[error("missing parameter '{name}' for exit model {model}")]
    MissingParameter { model: String, name: String },

    #[error("exit model {model} has no parameter '{name}'")]
    UnknownParameter { model: String, name: String },

    #[error("unknown exit model '{0}' (expected FixedTPSL, TrailingStop, TimeBased or ComboExit)")]
    UnknownExitModel(String),

    #[error("unknown interval '{0}'")]
    UnknownInterval(String),

    #[error("unknown hypothesis '{0}'")]
    UnknownHypothesis(String),

    #[error("walk-forward window {index}: train years {train:?} overlap validate year {validate}")]
    OverlappingWindow {
        index: usize,
        train: Vec<i32>,
        validate: i32,
    },

    #[error("walk-forward window {index} has no training years")]
    EmptyTrainingWindow { index: usize },

    #[error("parameter grid entry '{path}': {reason}")]
    InvalidGrid { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Other(String),
}

/// The data handed to a run violates a structural invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataIntegrityError {
    #[error("timestamps not strictly ascending at index {index}: {previous} then {current}")]
    NonMonotonic {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("year {later} overlaps year {earlier} in concatenated series (at {at})")]
    OverlappingYears {
        earlier: i32,
        later: i32,
        at: DateTime<Utc>,
    },

    #[error("signal length {signals} does not match series length {bars}")]
    SignalLengthMismatch { signals: usize, bars: usize },

    #[error("bar at {timestamp} is malformed: {reason}")]
    MalformedBar {
        timestamp: DateTime<Utc>,
        reason: String,
    },

    #[error("alignment source not sorted at index {index}")]
    UnsortedAlignmentSource { index: usize },

    #[error("year {year} missing from the per-year series map")]
    MissingYear { year: i32 },

    #[error("bar at {timestamp} filed under year {year}")]
    BarOutsideYear {
        year: i32,
        timestamp: DateTime<Utc>,
    },
}

/// No cached data exists for a (symbol, interval, year) key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no cached data for {symbol} {interval} {year}")]
pub struct MissingDataError {
    pub symbol: String,
    pub interval: String,
    pub year: i32,
}

/// Umbrella error for engine-level operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),

    #[error(transparent)]
    MissingData(#[from] MissingDataError),
}

impl CoreError {
    /// Configuration errors abort a surrounding batch; everything else is
    /// scoped to the run that raised it.
    pub fn is_configuration(&self) -> bool {
        matches!(self, CoreError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_is_detected() {
        let err: CoreError = ConfigurationError::UnknownExitModel("Foo".into()).into();
        assert!(err.is_configuration());

        let err: CoreError = DataIntegrityError::SignalLengthMismatch {
            signals: 3,
            bars: 4,
        }
        .into();
        assert!(!err.is_configuration());
    }

    #[test]
    fn missing_data_display() {
        let err = MissingDataError {
            symbol: "BTCUSDT".into(),
            interval: "1h".into(),
            year: 2024,
        };
        assert_eq!(err.to_string(), "no cached data for BTCUSDT 1h 2024");
    }
}
