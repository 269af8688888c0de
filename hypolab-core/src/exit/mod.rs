//! Exit models — decide the bar and price at which an open position closes.
//!
//! The simulator hands every bar strictly after the entry bar to
//! [`ExitModel::evaluate`], in timestamp order. Returning `None` keeps the
//! position open.
//!
//! ## Concrete implementations
//!
//! - [`FixedTpSl`] — fixed take-profit / stop-loss, stop-loss wins a tie
//! - [`TrailingStop`] — percentage stop trailing the running high
//! - [`TimeBased`] — close at the open once `max_hours` have elapsed
//! - [`ComboExit`] — TP/SL plus a time limit, price exits win a tie
//!
//! [`ExitModelSpec`] is the serializable, validated description of one of
//! these, and doubles as the factory handing a fresh instance to every
//! position.

pub mod combo;
pub mod fixed_tpsl;
pub mod spec;
pub mod time_based;
pub mod trailing_stop;

pub use combo::ComboExit;
pub use fixed_tpsl::FixedTpSl;
pub use spec::ExitModelSpec;
pub use time_based::TimeBased;
pub use trailing_stop::TrailingStop;

use chrono::{DateTime, Utc};

use crate::domain::{Bar, ExitReason, Position};
use crate::error::ConfigurationError;

/// Instruction to close the open position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitDecision {
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub exit_timestamp: DateTime<Utc>,
}

impl ExitDecision {
    pub fn new(exit_price: f64, exit_reason: ExitReason, bar: &Bar) -> Self {
        Self {
            exit_price,
            exit_reason,
            exit_timestamp: bar.timestamp,
        }
    }
}

/// Per-position exit rule. Instances may carry state (trailing high), so the
/// simulator builds a fresh one for every position.
pub trait ExitModel: Send {
    fn name(&self) -> &str;

    fn evaluate(&mut self, position: &Position, bar: &Bar) -> Option<ExitDecision>;
}

/// Produces a fresh [`ExitModel`] per position.
pub trait ExitModelFactory: Sync {
    fn create(&self) -> Box<dyn ExitModel>;
}

impl<F> ExitModelFactory for F
where
    F: Fn() -> Box<dyn ExitModel> + Sync,
{
    fn create(&self) -> Box<dyn ExitModel> {
        self()
    }
}

/// Percent parameters and hour limits must be strictly positive and finite.
pub(crate) fn require_positive(name: &str, value: f64) -> Result<f64, ConfigurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigurationError::NonPositiveParameter {
            name: name.to_string(),
            value,
        })
    }
}

/// A stop distance of 100 % or more would sit at or below zero.
pub(crate) fn require_below_hundred(name: &str, value: f64) -> Result<f64, ConfigurationError> {
    let value = require_positive(name, value)?;
    if value < 100.0 {
        Ok(value)
    } else {
        Err(ConfigurationError::ParameterOutOfRange {
            name: name.to_string(),
            reason: format!("{value} must be below 100"),
        })
    }
}
