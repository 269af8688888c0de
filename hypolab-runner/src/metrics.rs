//! Performance metrics — pure functions over trades and the equity curve.
//!
//! Returns are in percent throughout. Per-trade statistics use net
//! `return_pct`; drawdown walks the full per-bar equity curve.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hypolab_core::domain::{EquityPoint, Trade};

/// Cap applied to profit factor when there are no losing trades.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Aggregate performance metrics for one simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub trade_count: usize,
    /// Percent of trades with a positive net return.
    pub win_rate: f64,
    pub profit_factor: f64,
    /// Compounded net return over the run, from the equity curve.
    pub total_return_pct: f64,
    /// Plain sum of per-trade net returns.
    pub sum_return_pct: f64,
    pub gross_return_pct: f64,
    pub fees_paid_pct: f64,
    pub avg_win_pct: f64,
    pub avg_loss_pct: f64,
    /// Largest peak-to-trough decline of the equity multiple, as a positive
    /// percentage of the peak.
    pub max_drawdown_pct: f64,
    /// Mean / std of per-trade returns × √trade_count.
    pub sharpe: f64,
    pub avg_bars_held: f64,
    /// Trade count per exit reason tag (`TP`, `SL`, ...).
    pub exit_breakdown: BTreeMap<String, usize>,
}

impl PerformanceMetrics {
    pub fn compute(trades: &[Trade], equity: &[EquityPoint]) -> Self {
        let returns: Vec<f64> = trades.iter().map(|t| t.return_pct).collect();
        let wins: Vec<f64> = returns.iter().copied().filter(|r| *r > 0.0).collect();
        let losses: Vec<f64> = returns.iter().copied().filter(|r| *r <= 0.0).collect();

        let mut exit_breakdown = BTreeMap::new();
        for t in trades {
            *exit_breakdown
                .entry(t.exit_reason.as_str().to_string())
                .or_insert(0) += 1;
        }

        Self {
            trade_count: trades.len(),
            win_rate: if trades.is_empty() {
                0.0
            } else {
                trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
                    * 100.0
            },
            profit_factor: profit_factor(&returns),
            total_return_pct: total_return_pct(equity),
            sum_return_pct: returns.iter().sum(),
            gross_return_pct: trades.iter().map(|t| t.gross_return_pct).sum(),
            fees_paid_pct: trades.iter().map(|t| t.fees_paid_pct).sum(),
            avg_win_pct: mean(&wins),
            avg_loss_pct: mean(&losses),
            max_drawdown_pct: max_drawdown_pct(equity),
            sharpe: trade_sharpe(&returns),
            avg_bars_held: mean(
                &trades
                    .iter()
                    .map(|t| t.bars_held as f64)
                    .collect::<Vec<_>>(),
            ),
            exit_breakdown,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Gross profit / gross loss over per-trade returns, capped at
/// [`PROFIT_FACTOR_CAP`].
pub fn profit_factor(returns: &[f64]) -> f64 {
    let gross_profit: f64 = returns.iter().filter(|r| **r > 0.0).sum();
    let gross_loss: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r.abs()).sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

/// Sharpe over trades rather than calendar time: mean / population std of
/// per-trade returns, scaled by √n. Zero when the std is zero.
pub fn trade_sharpe(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let m = mean(returns);
    let var = returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / returns.len() as f64;
    let std = var.sqrt();
    if std < 1e-15 {
        return 0.0;
    }
    m / std * (returns.len() as f64).sqrt()
}

/// Compounded return of the last equity point, in percent.
pub fn total_return_pct(equity: &[EquityPoint]) -> f64 {
    equity.last().map_or(0.0, |p| p.cumulative_return * 100.0)
}

/// Maximum drawdown of the equity multiple (starting at 1.0), in percent.
pub fn max_drawdown_pct(equity: &[EquityPoint]) -> f64 {
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;
    for point in equity {
        let value = point.multiple();
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak * 100.0);
        }
    }
    max_dd
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use hypolab_core::domain::{ExitReason, Interval};

    fn trade(return_pct: f64, reason: ExitReason) -> Trade {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Trade {
            symbol: "BTCUSDT".into(),
            interval: Interval::H1,
            entry_timestamp: t0,
            entry_price: 100.0,
            entry_bar: 1,
            exit_timestamp: t0 + Duration::hours(3),
            exit_price: 100.0 * (1.0 + return_pct / 100.0),
            exit_bar: 4,
            exit_reason: reason,
            bars_held: 3,
            gross_return_pct: return_pct + 0.1,
            fees_paid_pct: 0.1,
            return_pct,
            holding_secs: 3 * 3600,
        }
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                timestamp: t0 + Duration::hours(i as i64),
                cumulative_return: v,
            })
            .collect()
    }

    #[test]
    fn empty_run_is_all_zero() {
        let m = PerformanceMetrics::compute(&[], &curve(&[0.0, 0.0]));
        assert_eq!(m.trade_count, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.sharpe, 0.0);
        assert_eq!(m.max_drawdown_pct, 0.0);
    }

    #[test]
    fn counts_and_averages() {
        let trades = vec![
            trade(2.0, ExitReason::TakeProfit),
            trade(-1.0, ExitReason::StopLoss),
            trade(2.0, ExitReason::TakeProfit),
            trade(0.0, ExitReason::TimeExit),
        ];
        let m = PerformanceMetrics::compute(&trades, &curve(&[0.0]));
        assert_eq!(m.trade_count, 4);
        assert!((m.win_rate - 50.0).abs() < 1e-12);
        assert!((m.profit_factor - 4.0).abs() < 1e-12);
        assert!((m.sum_return_pct - 3.0).abs() < 1e-12);
        assert!((m.fees_paid_pct - 0.4).abs() < 1e-12);
        assert!((m.avg_win_pct - 2.0).abs() < 1e-12);
        assert!((m.avg_loss_pct + 0.5).abs() < 1e-12);
        assert_eq!(m.exit_breakdown["TP"], 2);
        assert_eq!(m.exit_breakdown["SL"], 1);
        assert_eq!(m.exit_breakdown["TIME"], 1);
        assert!((m.avg_bars_held - 3.0).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_capped_without_losses() {
        assert_eq!(profit_factor(&[1.0, 2.0]), PROFIT_FACTOR_CAP);
        assert_eq!(profit_factor(&[0.0]), 0.0);
    }

    #[test]
    fn sharpe_uses_population_std() {
        // mean 1, std 1, n 4 → 2
        let s = trade_sharpe(&[0.0, 2.0, 0.0, 2.0]);
        assert!((s - 2.0).abs() < 1e-12);
        assert_eq!(trade_sharpe(&[1.0, 1.0]), 0.0);
    }

    #[test]
    fn drawdown_from_equity_multiple() {
        // 1.0 → 1.2 → 0.9 → 1.1: trough 0.9 from peak 1.2 = 25 %
        let dd = max_drawdown_pct(&curve(&[0.0, 0.2, -0.1, 0.1]));
        assert!((dd - 25.0).abs() < 1e-9);
    }

    #[test]
    fn total_return_is_compounded() {
        assert!((total_return_pct(&curve(&[0.0, 0.05, 0.1025])) - 10.25).abs() < 1e-9);
        assert_eq!(total_return_pct(&[]), 0.0);
    }
}
