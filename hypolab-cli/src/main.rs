//! HypoLab CLI — hypothesis runs, walk-forward validation and cache management.
//!
//! Commands:
//! - `list` — built-in hypotheses, exit models, intervals and fitness metrics
//! - `run` — simulate a hypothesis config on every (symbol, year)
//! - `walkforward` — walk-forward optimize a hypothesis config
//! - `import` — load an OHLCV CSV file into the Parquet cache
//! - `cache status` — list cached partitions
//! - `cache invalidate` — drop cached partitions

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hypolab_core::data::{import_csv, synthetic_series, DataSource, InMemorySource, ParquetCache};
use hypolab_core::domain::Interval;
use hypolab_core::signals::{self, HYPOTHESIS_KINDS};
use hypolab_runner::{
    run_hypothesis, run_walkforward, FileReportSink, FitnessMetric, HypothesisConfig, RunOptions,
    RunStatus, RunSummary, WalkForwardReport, WindowStatus,
};

#[derive(Parser)]
#[command(
    name = "hypolab",
    about = "HypoLab CLI — trading hypothesis simulator with walk-forward validation"
)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List hypotheses, exit models, intervals and fitness metrics.
    List,
    /// Simulate a hypothesis config on every configured symbol and year.
    Run {
        /// Path to a hypothesis TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,

        /// Output directory for reports.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Skip (symbol, year) pairs with nothing cached.
        #[arg(long, default_value_t = false)]
        skip_missing: bool,

        /// Use deterministic synthetic data instead of the cache.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// Walk-forward optimize a hypothesis config.
    Walkforward {
        /// Path to a hypothesis TOML file with a [walkforward] section.
        #[arg(long)]
        config: PathBuf,

        /// Symbol to optimize. Defaults to every configured symbol.
        #[arg(long)]
        symbol: Option<String>,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,

        /// Output directory for reports.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Use deterministic synthetic data instead of the cache.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// Import an OHLCV CSV file (timestamp,open,high,low,close,volume).
    Import {
        /// CSV file to import.
        #[arg(long)]
        csv: PathBuf,

        /// Symbol the file holds (e.g. BTCUSDT).
        #[arg(long)]
        symbol: String,

        /// Bar interval of the file (e.g. 1h).
        #[arg(long)]
        interval: Interval,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached partitions with bar counts and time ranges.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Remove cached partitions for a symbol and interval.
    Invalidate {
        #[arg(long)]
        symbol: String,

        #[arg(long)]
        interval: Interval,

        /// Only this year. Without it every year is removed.
        #[arg(long)]
        year: Option<i32>,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::List => run_list(),
        Commands::Run {
            config,
            cache_dir,
            output_dir,
            skip_missing,
            synthetic,
        } => run_cmd(&config, &cache_dir, &output_dir, skip_missing, synthetic),
        Commands::Walkforward {
            config,
            symbol,
            cache_dir,
            output_dir,
            synthetic,
        } => walkforward_cmd(&config, symbol, &cache_dir, &output_dir, synthetic),
        Commands::Import {
            csv,
            symbol,
            interval,
            cache_dir,
        } => import_cmd(&csv, &symbol, interval, &cache_dir),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => cache_status(&cache_dir),
            CacheAction::Invalidate {
                symbol,
                interval,
                year,
                cache_dir,
            } => cache_invalidate(&cache_dir, &symbol, interval, year),
        },
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_list() -> Result<()> {
    println!("Hypotheses:");
    for kind in HYPOTHESIS_KINDS {
        let source = signals::resolve(kind, &Default::default())?;
        let tunables: Vec<String> = source
            .tunables()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        println!("  {:<22} {}", kind, tunables.join(", "));
    }
    println!();
    println!("Exit models:");
    println!("  {:<22} tp_pct, sl_pct", "FixedTPSL");
    println!("  {:<22} trail_pct", "TrailingStop");
    println!("  {:<22} max_hours", "TimeBased");
    println!("  {:<22} tp_pct, sl_pct, max_hours", "ComboExit");
    println!();
    let intervals: Vec<&str> = Interval::ALL.iter().map(|i| i.as_str()).collect();
    println!("Intervals: {}", intervals.join(" "));
    let metrics: Vec<&str> = FitnessMetric::ALL.iter().map(|m| m.as_str()).collect();
    println!("Fitness metrics: {}", metrics.join(" "));
    Ok(())
}

fn load_config(path: &Path) -> Result<HypothesisConfig> {
    HypothesisConfig::load(path)
        .with_context(|| format!("failed to load config {}", path.display()))
}

/// Cache-backed source, or a synthetic one covering everything `config`
/// may ask for.
fn data_source(config: &HypothesisConfig, cache_dir: &Path, synthetic: bool) -> Box<dyn DataSource> {
    if !synthetic {
        return Box::new(ParquetCache::new(cache_dir));
    }

    let mut symbols: BTreeSet<String> = config.symbols.iter().cloned().collect();
    if let Some(leader) = config.hypothesis.options.get("leader") {
        symbols.insert(leader.clone());
    }
    let mut intervals = BTreeSet::from([config.signal_interval, Interval::D1]);
    for key in ["leader_interval", "trend_interval"] {
        if let Some(interval) = config.hypothesis.options.get(key).and_then(|s| s.parse().ok()) {
            intervals.insert(interval);
        }
    }
    let mut years: BTreeSet<i32> = config.years.iter().copied().collect();
    if let Some(wf) = &config.walkforward {
        years.extend(wf.windows.iter().flat_map(|w| w.years()));
    }
    let years: Vec<i32> = years.into_iter().collect();

    let mut source = InMemorySource::new();
    for symbol in &symbols {
        for &interval in &intervals {
            source.insert(&synthetic_series(symbol, interval, &years));
        }
    }
    Box::new(source)
}

fn run_cmd(
    config_path: &Path,
    cache_dir: &Path,
    output_dir: &Path,
    skip_missing: bool,
    synthetic: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let data = data_source(&config, cache_dir, synthetic);
    let mut sink = FileReportSink::new(output_dir)?;

    let summaries = run_hypothesis(&config, data.as_ref(), &mut sink, RunOptions { skip_missing })
        .with_context(|| format!("run '{}' failed", config.name))?;

    print_run_summaries(&config, &summaries);
    println!("Reports saved to: {}", output_dir.display());
    Ok(())
}

fn print_run_summaries(config: &HypothesisConfig, summaries: &[RunSummary]) {
    println!();
    println!("{} ({}, {})", config.name, config.hypothesis.kind, config.exit);
    println!(
        "{:<10} {:>6} {:>8} {:>9} {:>10} {:>8} {:>8}",
        "Symbol", "Year", "Trades", "Win %", "Return %", "MaxDD %", "Sharpe"
    );
    println!("{}", "-".repeat(65));
    for s in summaries {
        match (&s.status, &s.metrics) {
            (RunStatus::Completed, Some(m)) => println!(
                "{:<10} {:>6} {:>8} {:>9.1} {:>10.2} {:>8.2} {:>8.2}",
                s.symbol, s.year, m.trade_count, m.win_rate, m.total_return_pct,
                m.max_drawdown_pct, m.sharpe
            ),
            (RunStatus::SkippedMissingData, _) => {
                println!("{:<10} {:>6} {:>8}", s.symbol, s.year, "no data")
            }
            (RunStatus::Failed { reason }, _) => {
                println!("{:<10} {:>6} failed: {reason}", s.symbol, s.year)
            }
            (RunStatus::Completed, None) => println!("{:<10} {:>6}", s.symbol, s.year),
        }
    }
}

fn walkforward_cmd(
    config_path: &Path,
    symbol: Option<String>,
    cache_dir: &Path,
    output_dir: &Path,
    synthetic: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let data = data_source(&config, cache_dir, synthetic);
    let mut sink = FileReportSink::new(output_dir)?;

    let symbols = match symbol {
        Some(s) => vec![s],
        None => config.symbols.clone(),
    };
    for symbol in &symbols {
        let report = run_walkforward(&config, symbol, data.as_ref(), &mut sink)
            .with_context(|| format!("walk-forward '{}' on {symbol} failed", config.name))?;
        print_walkforward(&report);
    }
    println!("Reports saved to: {}", output_dir.display());
    Ok(())
}

fn print_walkforward(report: &WalkForwardReport) {
    println!();
    println!(
        "{} on {} ({}, sort by {})",
        report.name, report.symbol, report.interval, report.sort_by
    );
    println!(
        "{:<4} {:<16} {:>8} {:<36} {:>9} {:>9} {:<10}",
        "#", "Train", "Validate", "Winner", "IS", "OOS", "Verdict"
    );
    println!("{}", "-".repeat(100));
    for r in &report.results {
        let train: Vec<String> = r.window.train_years.iter().map(|y| y.to_string()).collect();
        let winner = r
            .winner
            .as_ref()
            .map(|p| p.label())
            .unwrap_or_else(|| "-".into());
        let verdict = match (&r.status, r.verdict) {
            (WindowStatus::Incomplete, _) => "incomplete".to_string(),
            (WindowStatus::Failed { .. }, _) => "failed".to_string(),
            (WindowStatus::Completed, Some(v)) => format!("{v:?}"),
            (WindowStatus::Completed, None) => "-".to_string(),
        };
        println!(
            "{:<4} {:<16} {:>8} {:<36} {:>9.3} {:>9.3} {:<10}",
            r.index,
            train.join(","),
            r.window.validate_year,
            winner,
            r.in_sample_score,
            r.out_of_sample_score,
            verdict
        );
    }
    let s = &report.summary;
    println!();
    println!(
        "Mean IS {:.3}  mean OOS {:.3}  degradation {} ({:?})",
        s.mean_in_sample_score,
        s.mean_out_of_sample_score,
        s.degradation_ratio
            .map(|r| format!("{r:.3}"))
            .unwrap_or_else(|| "n/a".into()),
        s.degradation_flag
    );
    println!(
        "Robust {}  Acceptable {}  Overfit {}",
        s.robust_windows, s.acceptable_windows, s.overfit_windows
    );
}

fn import_cmd(csv: &Path, symbol: &str, interval: Interval, cache_dir: &Path) -> Result<()> {
    let cache = ParquetCache::new(cache_dir);
    let metas = import_csv(&cache, csv, symbol, interval)
        .with_context(|| format!("failed to import {}", csv.display()))?;
    for meta in &metas {
        println!(
            "{} {} {}: {} bars ({} to {})",
            meta.symbol, meta.interval, meta.year, meta.bar_count, meta.first_timestamp,
            meta.last_timestamp
        );
    }
    Ok(())
}

fn cache_status(cache_dir: &Path) -> Result<()> {
    let cache = ParquetCache::new(cache_dir);
    let rows = cache.status().context("failed to read cache")?;
    if rows.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    println!("Cache: {}", cache_dir.display());
    println!();
    println!(
        "{:<10} {:<9} {:>6} {:>8} {:<45}",
        "Symbol", "Interval", "Year", "Bars", "Range"
    );
    println!("{}", "-".repeat(82));
    for row in &rows {
        let (bars, range) = match &row.meta {
            Some(m) => (
                m.bar_count.to_string(),
                format!("{} to {}", m.first_timestamp, m.last_timestamp),
            ),
            None => ("?".into(), "(no meta)".into()),
        };
        println!(
            "{:<10} {:<9} {:>6} {:>8} {:<45}",
            row.symbol,
            row.interval.as_str(),
            row.year,
            bars,
            range
        );
    }
    Ok(())
}

fn cache_invalidate(
    cache_dir: &Path,
    symbol: &str,
    interval: Interval,
    year: Option<i32>,
) -> Result<()> {
    let cache = ParquetCache::new(cache_dir);
    let removed = cache
        .invalidate(symbol, interval, year)
        .with_context(|| format!("failed to invalidate {symbol} {interval}"))?;
    println!("Removed {removed} partition(s) for {symbol} {interval}");
    Ok(())
}
