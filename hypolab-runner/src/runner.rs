//! Run orchestration — glue between config, data, the simulator and sinks.
//!
//! `run_hypothesis` simulates every configured (symbol, year) independently.
//! A data-integrity or signal failure in one run is logged and recorded in
//! that run's summary; it does not abort the batch. Configuration errors and
//! sink failures always abort.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use hypolab_core::data::{DataError, DataSource};
use hypolab_core::engine::Simulator;
use hypolab_core::error::ConfigurationError;
use hypolab_core::signals::SignalContext;

use crate::config::{ConfigError, HypothesisConfig};
use crate::metrics::PerformanceMetrics;
use crate::report::{ReportSink, RunMetadata, WalkForwardReport};
use crate::walk_forward::{WalkForwardError, WalkForwardOptimizer, WalkForwardSummary};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("data for {symbol}: {source}")]
    Data {
        symbol: String,
        #[source]
        source: DataError,
    },

    #[error("walk-forward failed: {0}")]
    WalkForward(#[from] WalkForwardError),

    #[error("cannot hash config: {0}")]
    RunId(#[from] serde_json::Error),

    #[error("report sink failed: {0:#}")]
    Report(anyhow::Error),

    #[error("config '{0}' has no [walkforward] section")]
    NoWalkForward(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Log and skip (symbol, year) pairs with nothing cached instead of
    /// failing the batch.
    pub skip_missing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    SkippedMissingData,
    Failed { reason: String },
}

/// Outcome of one (symbol, year) simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub symbol: String,
    pub year: i32,
    pub status: RunStatus,
    pub metrics: Option<PerformanceMetrics>,
}

impl RunSummary {
    fn without_metrics(symbol: &str, year: i32, status: RunStatus) -> Self {
        Self {
            symbol: symbol.to_string(),
            year,
            status,
            metrics: None,
        }
    }
}

/// Simulate the configured hypothesis on every (symbol, year) and hand each
/// result to `sink`.
pub fn run_hypothesis(
    config: &HypothesisConfig,
    data: &dyn DataSource,
    sink: &mut dyn ReportSink,
    opts: RunOptions,
) -> Result<Vec<RunSummary>, RunError> {
    config.validate()?;
    let signal = config.signal_source()?;
    let costs = config.costs.to_simulation_config();
    let simulator = Simulator::new(costs)?;
    let tunables = signal.tunables().merged(&config.hypothesis.tunables);
    let run_id = config.run_id()?;
    let interval = config.signal_interval;

    let years: BTreeSet<i32> = config.years.iter().copied().collect();
    info!(
        name = %config.name,
        hypothesis = signal.name(),
        symbols = config.symbols.len(),
        years = years.len(),
        exit = %config.exit,
        "starting hypothesis run"
    );

    let mut summaries = Vec::new();
    for symbol in &config.symbols {
        for &year in &years {
            let series = match data.load_year(symbol, interval, year) {
                Ok(series) => series,
                Err(e) if e.is_missing() && opts.skip_missing => {
                    warn!(%symbol, year, "no cached data, skipping");
                    summaries.push(RunSummary::without_metrics(
                        symbol,
                        year,
                        RunStatus::SkippedMissingData,
                    ));
                    continue;
                }
                Err(source) => {
                    return Err(RunError::Data {
                        symbol: symbol.clone(),
                        source,
                    })
                }
            };

            let ctx = SignalContext::new(data, BTreeSet::from([year]));
            let outcome = signal
                .generate_signals(&series, &ctx, &tunables)
                .map_err(|e| e.to_string())
                .and_then(|signals| {
                    let fired = signals.iter().filter(|s| **s).count();
                    simulator
                        .run(&series, &signals, &config.exit)
                        .map(|result| (fired, result))
                        .map_err(|e| e.to_string())
                });
            let (fired, result) = match outcome {
                Ok(ok) => ok,
                Err(reason) => {
                    warn!(%symbol, year, %reason, "run failed");
                    summaries.push(RunSummary::without_metrics(
                        symbol,
                        year,
                        RunStatus::Failed { reason },
                    ));
                    continue;
                }
            };

            let metrics = PerformanceMetrics::compute(&result.trades, &result.equity);
            info!(
                %symbol,
                year,
                trades = metrics.trade_count,
                total_return_pct = metrics.total_return_pct,
                sharpe = metrics.sharpe,
                "run complete"
            );

            let metadata = RunMetadata {
                run_id: run_id.clone(),
                name: config.name.clone(),
                hypothesis: signal.name().to_string(),
                symbol: symbol.clone(),
                interval,
                year,
                exit: config.exit.clone(),
                costs,
                tunables: tunables.clone(),
                bars: series.len(),
                signals: fired,
                metrics: metrics.clone(),
                generated_at: Utc::now(),
            };
            sink.write_run(&metadata, &result.trades, &result.equity)
                .map_err(RunError::Report)?;

            summaries.push(RunSummary {
                symbol: symbol.clone(),
                year,
                status: RunStatus::Completed,
                metrics: Some(metrics),
            });
        }
    }
    Ok(summaries)
}

/// Walk the configured hypothesis forward on one symbol.
pub fn run_walkforward(
    config: &HypothesisConfig,
    symbol: &str,
    data: &dyn DataSource,
    sink: &mut dyn ReportSink,
) -> Result<WalkForwardReport, RunError> {
    config.validate()?;
    let wf = config
        .walkforward
        .as_ref()
        .ok_or_else(|| RunError::NoWalkForward(config.name.clone()))?;
    let signal = config.signal_source()?;
    let simulator = Simulator::new(config.costs.to_simulation_config())?;
    let interval = config.signal_interval;

    let years: BTreeSet<i32> = wf.windows.iter().flat_map(|w| w.years()).collect();
    let series_by_year = data
        .get_series_by_year(symbol, interval, &years)
        .map_err(|source| RunError::Data {
            symbol: symbol.to_string(),
            source,
        })?;

    let optimizer = WalkForwardOptimizer::new(signal.as_ref(), data, &config.exit, simulator)
        .with_base_tunables(signal.tunables().merged(&config.hypothesis.tunables))
        .with_config(wf.optimizer_config());
    let results = optimizer.run(&series_by_year, &wf.param_grid, &wf.windows, &wf.scorer())?;
    let summary = WalkForwardSummary::from_results(&results);

    info!(
        %symbol,
        windows = summary.windows,
        scored = summary.scored_windows,
        mean_in_sample = summary.mean_in_sample_score,
        mean_out_of_sample = summary.mean_out_of_sample_score,
        degradation = ?summary.degradation_flag,
        "walk-forward complete"
    );

    let report = WalkForwardReport {
        run_id: config.run_id()?,
        name: config.name.clone(),
        hypothesis: signal.name().to_string(),
        symbol: symbol.to_string(),
        interval,
        exit: config.exit.clone(),
        sort_by: wf.sort_by.to_string(),
        results,
        summary,
        generated_at: Utc::now(),
    };
    sink.write_walkforward(&report).map_err(RunError::Report)?;
    Ok(report)
}
