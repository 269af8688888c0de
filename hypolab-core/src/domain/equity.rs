use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Realized equity at one bar of the execution series.
///
/// `cumulative_return` is a fraction: 0.05 means +5 % since the start of the
/// run. It only moves on bars where a trade closes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub cumulative_return: f64,
}

impl EquityPoint {
    /// Equity multiple (1.0 = starting capital).
    pub fn multiple(&self) -> f64 {
        1.0 + self.cumulative_return
    }
}
