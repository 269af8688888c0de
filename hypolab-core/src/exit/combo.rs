//! TP/SL plus a time limit. A price exit on the same bar as the time limit
//! takes priority.

use crate::domain::{Bar, Position};
use crate::error::ConfigurationError;

use super::{ExitDecision, ExitModel, FixedTpSl, TimeBased};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComboExit {
    pub price: FixedTpSl,
    pub time: TimeBased,
}

impl ComboExit {
    pub fn new(tp_pct: f64, sl_pct: f64, max_hours: f64) -> Result<Self, ConfigurationError> {
        Ok(Self {
            price: FixedTpSl::new(tp_pct, sl_pct)?,
            time: TimeBased::new(max_hours)?,
        })
    }
}

impl ExitModel for ComboExit {
    fn name(&self) -> &str {
        "ComboExit"
    }

    fn evaluate(&mut self, position: &Position, bar: &Bar) -> Option<ExitDecision> {
        self.price
            .check(position, bar)
            .or_else(|| self.time.check(position, bar))
    }
}
