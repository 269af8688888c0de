//! HypoLab Core — domain types, exit models, the no-look-ahead simulator,
//! data sources and signal sources.
//!
//! This crate contains the heart of the hypothesis engine:
//! - Domain types (bars, time series, positions, trades, equity, parameters)
//! - Exit-model family (fixed TP/SL, trailing stop, time-based, combo)
//! - Bar-by-bar simulator with next-bar-open entries
//! - Data-source interface, Parquet cache, CSV import, as-of alignment
//! - Signal-source capability interface and the built-in hypotheses

pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod exit;
pub mod signals;

pub use domain::{Bar, EquityPoint, ExitReason, Interval, ParameterSet, TimeSeries, Trade};
pub use engine::{SimulationConfig, SimulationResult, Simulator};
pub use error::{ConfigurationError, CoreError, DataIntegrityError, MissingDataError};
pub use exit::{ExitModel, ExitModelFactory, ExitModelSpec};
