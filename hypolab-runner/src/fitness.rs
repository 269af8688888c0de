//! Fitness — score functions used to rank walk-forward candidates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use hypolab_core::domain::{EquityPoint, Trade};

use crate::metrics::PerformanceMetrics;

/// Which metric to optimize/sort by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMetric {
    #[default]
    Sharpe,
    NetReturn,
    ProfitFactor,
    WinRate,
    MaxDrawdown,
}

impl FitnessMetric {
    pub const ALL: [FitnessMetric; 5] = [
        Self::Sharpe,
        Self::NetReturn,
        Self::ProfitFactor,
        Self::WinRate,
        Self::MaxDrawdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sharpe => "sharpe",
            Self::NetReturn => "net_return",
            Self::ProfitFactor => "profit_factor",
            Self::WinRate => "win_rate",
            Self::MaxDrawdown => "max_drawdown",
        }
    }

    /// Extract the metric so that higher is always better.
    ///
    /// MaxDrawdown is negated: a 5 % drawdown scores -5, above a 20 % one.
    pub fn extract(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::Sharpe => metrics.sharpe,
            Self::NetReturn => metrics.total_return_pct,
            Self::ProfitFactor => metrics.profit_factor,
            Self::WinRate => metrics.win_rate,
            Self::MaxDrawdown => -metrics.max_drawdown_pct,
        }
    }
}

impl fmt::Display for FitnessMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitnessMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown metric '{s}' (expected one of: {})",
                    Self::ALL.map(|m| m.as_str()).join(", ")
                )
            })
    }
}

/// Scores one simulation; higher is better.
pub trait ScoreFn: Sync {
    fn score(&self, trades: &[Trade], equity: &[EquityPoint]) -> f64;

    /// Whether a training candidate with these trades may win a window.
    /// Candidates without trades never win, whatever this returns.
    fn eligible(&self, trades: &[Trade]) -> bool {
        !trades.is_empty()
    }
}

impl<F> ScoreFn for F
where
    F: Fn(&[Trade], &[EquityPoint]) -> f64 + Sync,
{
    fn score(&self, trades: &[Trade], equity: &[EquityPoint]) -> f64 {
        self(trades, equity)
    }
}

/// Metric-based scorer with a minimum trade count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scorer {
    pub metric: FitnessMetric,
    pub min_trades: usize,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            metric: FitnessMetric::Sharpe,
            min_trades: 10,
        }
    }
}

impl Scorer {
    pub fn new(metric: FitnessMetric, min_trades: usize) -> Self {
        Self { metric, min_trades }
    }
}

impl ScoreFn for Scorer {
    fn score(&self, trades: &[Trade], equity: &[EquityPoint]) -> f64 {
        self.metric
            .extract(&PerformanceMetrics::compute(trades, equity))
    }

    fn eligible(&self, trades: &[Trade]) -> bool {
        !trades.is_empty() && trades.len() >= self.min_trades
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metrics() -> PerformanceMetrics {
        PerformanceMetrics {
            trade_count: 20,
            win_rate: 55.0,
            profit_factor: 1.8,
            total_return_pct: 15.0,
            sum_return_pct: 14.0,
            max_drawdown_pct: 10.0,
            sharpe: 1.5,
            ..Default::default()
        }
    }

    #[test]
    fn extract_sharpe() {
        let m = sample_metrics();
        assert!((FitnessMetric::Sharpe.extract(&m) - 1.5).abs() < 1e-10);
    }

    #[test]
    fn drawdown_is_negated() {
        let m = sample_metrics();
        assert!((FitnessMetric::MaxDrawdown.extract(&m) + 10.0).abs() < 1e-10);
    }

    #[test]
    fn net_return_is_compounded_total() {
        let m = sample_metrics();
        assert!((FitnessMetric::NetReturn.extract(&m) - 15.0).abs() < 1e-10);
    }

    #[test]
    fn default_is_sharpe() {
        assert_eq!(FitnessMetric::default(), FitnessMetric::Sharpe);
    }

    #[test]
    fn parses_config_names() {
        assert_eq!("net_return".parse::<FitnessMetric>(), Ok(FitnessMetric::NetReturn));
        assert!("sortino".parse::<FitnessMetric>().is_err());
        let parsed: FitnessMetric = serde_json::from_str("\"win_rate\"").unwrap();
        assert_eq!(parsed, FitnessMetric::WinRate);
    }

    #[test]
    fn scorer_enforces_min_trades() {
        let scorer = Scorer::new(FitnessMetric::Sharpe, 1);
        assert!(!scorer.eligible(&[]));
        // No trades is never eligible, even with min_trades = 0.
        let lenient = Scorer::new(FitnessMetric::Sharpe, 0);
        assert!(!lenient.eligible(&[]));
        assert_eq!(lenient.score(&[], &[]), 0.0);
    }

    #[test]
    fn closures_are_score_functions() {
        let count = |trades: &[Trade], _: &[EquityPoint]| trades.len() as f64;
        assert_eq!(count.score(&[], &[]), 0.0);
        assert!(!count.eligible(&[]));
    }
}
