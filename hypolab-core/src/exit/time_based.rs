//! Time-based exit — close at the open of the first bar at least
//! `max_hours` after entry, whatever the price.

use chrono::Duration;

use crate::domain::{Bar, ExitReason, Position};
use crate::error::ConfigurationError;

use super::{require_positive, ExitDecision, ExitModel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeBased {
    pub max_hours: f64,
}

impl TimeBased {
    pub fn new(max_hours: f64) -> Result<Self, ConfigurationError> {
        Ok(Self {
            max_hours: require_positive("max_hours", max_hours)?,
        })
    }

    /// Rounded up, so a positive `max_hours` never becomes a zero limit.
    fn limit(&self) -> Duration {
        Duration::milliseconds((self.max_hours * 3_600_000.0).ceil() as i64)
    }

    pub(crate) fn check(&self, position: &Position, bar: &Bar) -> Option<ExitDecision> {
        if bar.timestamp - position.entry_timestamp >= self.limit() {
            Some(ExitDecision::new(bar.open, ExitReason::TimeExit, bar))
        } else {
            None
        }
    }
}

impl ExitModel for TimeBased {
    fn name(&self) -> &str {
        "TimeBased"
    }

    fn evaluate(&mut self, position: &Position, bar: &Bar) -> Option<ExitDecision> {
        self.check(position, bar)
    }
}
