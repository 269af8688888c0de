//! Percentage trailing stop.
//!
//! Tracks the highest price seen since entry (starting at the entry price).
//! Within a bar the running high is updated with `bar.high` first, then the
//! stop at `high × (1 − trail_pct/100)` is checked against `bar.low`.

use crate::domain::{Bar, ExitReason, Position};
use crate::error::ConfigurationError;

use super::{require_below_hundred, ExitDecision, ExitModel};

#[derive(Debug, Clone, PartialEq)]
pub struct TrailingStop {
    pub trail_pct: f64,
    highest: Option<f64>,
}

impl TrailingStop {
    pub fn new(trail_pct: f64) -> Result<Self, ConfigurationError> {
        Ok(Self {
            trail_pct: require_below_hundred("trail_pct", trail_pct)?,
            highest: None,
        })
    }

    /// Running high since entry, if any bar has been evaluated.
    pub fn highest(&self) -> Option<f64> {
        self.highest
    }

    pub fn stop_price(&self) -> Option<f64> {
        self.highest.map(|h| h * (1.0 - self.trail_pct / 100.0))
    }
}

impl ExitModel for TrailingStop {
    fn name(&self) -> &str {
        "TrailingStop"
    }

    fn evaluate(&mut self, position: &Position, bar: &Bar) -> Option<ExitDecision> {
        let highest = self
            .highest
            .unwrap_or(position.entry_price)
            .max(bar.high);
        self.highest = Some(highest);

        let stop = highest * (1.0 - self.trail_pct / 100.0);
        if bar.low <= stop {
            Some(ExitDecision::new(stop, ExitReason::TrailingStop, bar))
        } else {
            None
        }
    }
}
