//! Report sinks — where completed runs go.
//!
//! The runner hands every sink complete, immutable inputs once per run. The
//! file sink writes one directory per (year, symbol):
//!
//! ```text
//! {out}/{year}_{symbol}/trades.csv
//! {out}/{year}_{symbol}/equity.csv
//! {out}/{year}_{symbol}/metrics.json
//! {out}/walkforward_{symbol}.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use hypolab_core::domain::{EquityPoint, Interval, ParameterSet, Trade};
use hypolab_core::engine::SimulationConfig;
use hypolab_core::exit::ExitModelSpec;

use crate::metrics::PerformanceMetrics;
use crate::walk_forward::{WalkForwardResult, WalkForwardSummary};

/// Everything a sink needs to label one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub name: String,
    pub hypothesis: String,
    pub symbol: String,
    pub interval: Interval,
    pub year: i32,
    pub exit: ExitModelSpec,
    pub costs: SimulationConfig,
    pub tunables: ParameterSet,
    pub bars: usize,
    pub signals: usize,
    pub metrics: PerformanceMetrics,
    pub generated_at: DateTime<Utc>,
}

/// A finished walk-forward for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub run_id: String,
    pub name: String,
    pub hypothesis: String,
    pub symbol: String,
    pub interval: Interval,
    pub exit: ExitModelSpec,
    pub sort_by: String,
    pub results: Vec<WalkForwardResult>,
    pub summary: WalkForwardSummary,
    pub generated_at: DateTime<Utc>,
}

/// Receives completed runs. Rendering is entirely the sink's business.
pub trait ReportSink {
    fn write_run(
        &mut self,
        metadata: &RunMetadata,
        trades: &[Trade],
        equity: &[EquityPoint],
    ) -> Result<()>;

    fn write_walkforward(&mut self, report: &WalkForwardReport) -> Result<()>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn write_run(&mut self, _: &RunMetadata, _: &[Trade], _: &[EquityPoint]) -> Result<()> {
        Ok(())
    }

    fn write_walkforward(&mut self, _: &WalkForwardReport) -> Result<()> {
        Ok(())
    }
}

/// Writes CSV and JSON artifacts under an output directory.
#[derive(Debug, Clone)]
pub struct FileReportSink {
    out_dir: PathBuf,
}

impl FileReportSink {
    pub fn new(out_dir: impl AsRef<Path>) -> Result<Self> {
        let out_dir = out_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create report dir: {}", out_dir.display()))?;
        Ok(Self { out_dir })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Directory for one (year, symbol) run.
    pub fn run_dir(&self, year: i32, symbol: &str) -> PathBuf {
        self.out_dir.join(format!("{year}_{symbol}"))
    }

    pub fn walkforward_path(&self, symbol: &str) -> PathBuf {
        self.out_dir.join(format!("walkforward_{symbol}.json"))
    }
}

impl ReportSink for FileReportSink {
    fn write_run(
        &mut self,
        metadata: &RunMetadata,
        trades: &[Trade],
        equity: &[EquityPoint],
    ) -> Result<()> {
        let run_dir = self.run_dir(metadata.year, &metadata.symbol);
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("failed to create run dir: {}", run_dir.display()))?;

        write_file(&run_dir.join("trades.csv"), &trades_csv(trades)?)?;
        write_file(&run_dir.join("equity.csv"), &equity_csv(equity)?)?;
        let json =
            serde_json::to_string_pretty(metadata).context("failed to serialize run metadata")?;
        write_file(&run_dir.join("metrics.json"), &json)?;

        tracing::info!(dir = %run_dir.display(), trades = trades.len(), "report written");
        Ok(())
    }

    fn write_walkforward(&mut self, report: &WalkForwardReport) -> Result<()> {
        let path = self.walkforward_path(&report.symbol);
        let json = serde_json::to_string_pretty(report)
            .context("failed to serialize walk-forward report")?;
        write_file(&path, &json)?;
        tracing::info!(path = %path.display(), "walk-forward report written");
        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trade tape, one row per closed trade.
pub fn trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "interval",
        "entry_time",
        "entry_price",
        "entry_bar",
        "exit_time",
        "exit_price",
        "exit_bar",
        "exit_reason",
        "bars_held",
        "holding_hours",
        "gross_return_pct",
        "fees_paid_pct",
        "return_pct",
    ])?;

    for t in trades {
        wtr.write_record::<[&str; 14], &str>([
            t.symbol.as_str(),
            t.interval.as_str(),
            &timestamp(t.entry_timestamp),
            &format!("{:.6}", t.entry_price),
            &t.entry_bar.to_string(),
            &timestamp(t.exit_timestamp),
            &format!("{:.6}", t.exit_price),
            &t.exit_bar.to_string(),
            t.exit_reason.as_str(),
            &t.bars_held.to_string(),
            &format!("{:.2}", t.holding_secs as f64 / 3600.0),
            &format!("{:.4}", t.gross_return_pct),
            &format!("{:.4}", t.fees_paid_pct),
            &format!("{:.4}", t.return_pct),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Per-bar equity: timestamp, cumulative return (fraction) and multiple.
pub fn equity_csv(equity: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "cumulative_return", "equity"])?;
    for p in equity {
        wtr.write_record([
            &timestamp(p.timestamp),
            &format!("{:.6}", p.cumulative_return),
            &format!("{:.6}", p.multiple()),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use hypolab_core::domain::ExitReason;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn sample_trade() -> Trade {
        Trade {
            symbol: "BTCUSDT".into(),
            interval: Interval::H1,
            entry_timestamp: t0(),
            entry_price: 100.0,
            entry_bar: 3,
            exit_timestamp: t0() + Duration::hours(2),
            exit_price: 102.0,
            exit_bar: 5,
            exit_reason: ExitReason::TakeProfit,
            bars_held: 2,
            gross_return_pct: 2.0,
            fees_paid_pct: 0.1,
            return_pct: 1.9,
            holding_secs: 7200,
        }
    }

    #[test]
    fn trades_csv_has_header_and_row() {
        let csv = trades_csv(&[sample_trade()]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("symbol,interval,entry_time"));
        assert!(lines[1].starts_with("BTCUSDT,1h,2024-03-01T00:00:00Z,100.000000,3,"));
        assert!(lines[1].contains(",TP,2,2.00,"));
        assert!(lines[1].ends_with(",1.9000"));
    }

    #[test]
    fn empty_trades_csv_is_header_only() {
        let csv = trades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn equity_csv_writes_multiple() {
        let points = [EquityPoint {
            timestamp: t0(),
            cumulative_return: 0.05,
        }];
        let csv = equity_csv(&points).unwrap();
        assert_eq!(
            csv.lines().nth(1),
            Some("2024-03-01T00:00:00Z,0.050000,1.050000")
        );
    }
}
