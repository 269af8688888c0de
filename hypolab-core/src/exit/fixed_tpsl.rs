//! Fixed take-profit / stop-loss.
//!
//! TP level = entry × (1 + tp_pct/100), SL level = entry × (1 − sl_pct/100).
//! When one bar touches both levels the stop-loss wins: the bar's path is
//! unknown, so the adverse level is assumed to have been hit first. Fills
//! happen at the level itself, gaps included.

use crate::domain::{Bar, ExitReason, Position};
use crate::error::ConfigurationError;

use super::{require_below_hundred, require_positive, ExitDecision, ExitModel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedTpSl {
    pub tp_pct: f64,
    pub sl_pct: f64,
}

impl FixedTpSl {
    pub fn new(tp_pct: f64, sl_pct: f64) -> Result<Self, ConfigurationError> {
        Ok(Self {
            tp_pct: require_positive("tp_pct", tp_pct)?,
            sl_pct: require_below_hundred("sl_pct", sl_pct)?,
        })
    }

    pub fn take_profit_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 + self.tp_pct / 100.0)
    }

    pub fn stop_loss_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 - self.sl_pct / 100.0)
    }

    /// Price check shared with [`super::ComboExit`].
    pub(crate) fn check(&self, position: &Position, bar: &Bar) -> Option<ExitDecision> {
        let sl = self.stop_loss_price(position.entry_price);
        if bar.low <= sl {
            return Some(ExitDecision::new(sl, ExitReason::StopLoss, bar));
        }
        let tp = self.take_profit_price(position.entry_price);
        if bar.high >= tp {
            return Some(ExitDecision::new(tp, ExitReason::TakeProfit, bar));
        }
        None
    }
}

impl ExitModel for FixedTpSl {
    fn name(&self) -> &str {
        "FixedTPSL"
    }

    fn evaluate(&mut self, position: &Position, bar: &Bar) -> Option<ExitDecision> {
        self.check(position, bar)
    }
}
