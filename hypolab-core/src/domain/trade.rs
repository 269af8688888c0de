//! Completed trades and the reasons positions close.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Interval;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    TrailingStop,
    TimeExit,
    /// Series ended with the position still open.
    EndOfData,
    /// Leveraged position hit its liquidation price.
    Liquidated,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "TP",
            ExitReason::StopLoss => "SL",
            ExitReason::TrailingStop => "TRAIL",
            ExitReason::TimeExit => "TIME",
            ExitReason::EndOfData => "END_OF_DATA",
            ExitReason::Liquidated => "LIQUIDATED",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of one closed position.
///
/// `return_pct` is net of fees and includes leverage; `gross_return_pct`
/// excludes fees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub interval: Interval,
    pub entry_timestamp: DateTime<Utc>,
    pub entry_price: f64,
    pub entry_bar: usize,
    pub exit_timestamp: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_bar: usize,
    pub exit_reason: ExitReason,
    pub bars_held: usize,
    pub gross_return_pct: f64,
    pub fees_paid_pct: f64,
    pub return_pct: f64,
    pub holding_secs: i64,
}

impl Trade {
    pub fn holding_duration(&self) -> Duration {
        Duration::seconds(self.holding_secs)
    }

    pub fn is_winner(&self) -> bool {
        self.return_pct > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn exit_reason_labels() {
        assert_eq!(ExitReason::StopLoss.to_string(), "SL");
        assert_eq!(ExitReason::EndOfData.as_str(), "END_OF_DATA");
    }

    #[test]
    fn holding_duration_from_secs() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let trade = Trade {
            symbol: "BTCUSDT".into(),
            interval: Interval::H1,
            entry_timestamp: t0,
            entry_price: 100.0,
            entry_bar: 1,
            exit_timestamp: t0 + Duration::hours(5),
            exit_price: 102.0,
            exit_bar: 6,
            exit_reason: ExitReason::TakeProfit,
            bars_held: 5,
            gross_return_pct: 2.0,
            fees_paid_pct: 0.0,
            return_pct: 2.0,
            holding_secs: 5 * 3600,
        };
        assert_eq!(trade.holding_duration(), Duration::hours(5));
        assert!(trade.is_winner());
    }
}
