//! Walk-forward optimization — rolling train/validate parameter search.
//!
//! For each window the training years are concatenated into one series and
//! every grid candidate is simulated on it. The best eligible candidate
//! (earliest in grid order on ties) is then simulated once on the validate
//! year. Validate-year bars never reach a scoring run, and the signal
//! context handed to a run only serves the years of that run's series.
//!
//! Candidate failures caused by data (signal errors, integrity errors) skip
//! the candidate. A window whose years are missing or overlap is marked
//! failed and the next window runs. Configuration errors abort the whole
//! optimization before any simulation starts.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use hypolab_core::data::DataSource;
use hypolab_core::domain::{EquityPoint, ParameterSet, TimeSeries, Trade, EXIT_PARAM_PREFIX};
use hypolab_core::engine::{SimulationResult, Simulator};
use hypolab_core::error::{ConfigurationError, DataIntegrityError};
use hypolab_core::exit::ExitModelSpec;
use hypolab_core::signals::{SignalContext, SignalSource};

use crate::fitness::ScoreFn;
use crate::metrics::PerformanceMetrics;
use crate::param_grid::ParamGrid;

// ─── Configuration ───────────────────────────────────────────────────

/// One train/validate split. Train and validate years must be disjoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkForwardWindow {
    #[serde(alias = "train")]
    pub train_years: BTreeSet<i32>,
    #[serde(alias = "validate")]
    pub validate_year: i32,
}

impl WalkForwardWindow {
    pub fn new(train_years: impl IntoIterator<Item = i32>, validate_year: i32) -> Self {
        Self {
            train_years: train_years.into_iter().collect(),
            validate_year,
        }
    }

    pub fn validate(&self, index: usize) -> Result<(), ConfigurationError> {
        if self.train_years.is_empty() {
            return Err(ConfigurationError::EmptyTrainingWindow { index });
        }
        if self.train_years.contains(&self.validate_year) {
            return Err(ConfigurationError::OverlappingWindow {
                index,
                train: self.train_years.iter().copied().collect(),
                validate: self.validate_year,
            });
        }
        Ok(())
    }

    /// Every year the window touches.
    pub fn years(&self) -> BTreeSet<i32> {
        let mut years = self.train_years.clone();
        years.insert(self.validate_year);
        years
    }
}

/// Execution settings for the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Score candidates on the rayon pool (default true).
    pub parallel: bool,
    /// Wall-clock budget for the whole optimization.
    pub time_budget: Option<Duration>,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            time_budget: None,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WindowStatus {
    /// Every candidate was scored.
    Completed,
    /// The time budget ran out before every candidate was scored. The
    /// winner, if any, is the best of the candidates that did run.
    Incomplete,
    /// The out-of-sample run for the winner failed.
    Failed { reason: String },
}

/// Out-of-sample verdict for one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Out-of-sample score above 1.0.
    Robust,
    /// Out-of-sample score above 0.
    Acceptable,
    Overfit,
}

impl Verdict {
    pub fn from_score(score: f64) -> Self {
        if score > 1.0 {
            Verdict::Robust
        } else if score > 0.0 {
            Verdict::Acceptable
        } else {
            Verdict::Overfit
        }
    }
}

/// Outcome of one window. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub index: usize,
    pub window: WalkForwardWindow,
    pub status: WindowStatus,
    /// None when no candidate was eligible.
    pub winner: Option<ParameterSet>,
    pub in_sample_score: f64,
    pub out_of_sample_score: f64,
    pub in_sample_metrics: Option<PerformanceMetrics>,
    pub out_of_sample_metrics: Option<PerformanceMetrics>,
    pub out_of_sample_trades: Vec<Trade>,
    pub out_of_sample_equity: Vec<EquityPoint>,
    pub candidates_evaluated: usize,
    pub candidates_skipped: usize,
    pub candidates_eligible: usize,
    pub verdict: Option<Verdict>,
}

impl WalkForwardResult {
    fn empty(index: usize, window: &WalkForwardWindow, status: WindowStatus) -> Self {
        Self {
            index,
            window: window.clone(),
            status,
            winner: None,
            in_sample_score: 0.0,
            out_of_sample_score: 0.0,
            in_sample_metrics: None,
            out_of_sample_metrics: None,
            out_of_sample_trades: Vec::new(),
            out_of_sample_equity: Vec::new(),
            candidates_evaluated: 0,
            candidates_skipped: 0,
            candidates_eligible: 0,
            verdict: None,
        }
    }
}

/// How the degradation ratio was computed (or why it wasn't).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradationFlag {
    /// In-sample score >= 0.1, ratio computed normally.
    Normal,
    /// In-sample score in [0, 0.1): difference (OOS − IS) reported instead.
    LowInSample,
    /// In-sample score negative, ratio skipped.
    NegativeInSample,
    /// Positive in-sample but negative out-of-sample: clamped to 0.0.
    FailedOutOfSample,
    /// No completed window with a winner.
    NoWindows,
}

/// Aggregate over completed windows with a winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardSummary {
    pub windows: usize,
    pub scored_windows: usize,
    pub mean_in_sample_score: f64,
    pub mean_out_of_sample_score: f64,
    /// Mean OOS / mean IS. None when it cannot be computed (see flag).
    pub degradation_ratio: Option<f64>,
    pub degradation_flag: DegradationFlag,
    pub robust_windows: usize,
    pub acceptable_windows: usize,
    pub overfit_windows: usize,
}

impl WalkForwardSummary {
    pub fn from_results(results: &[WalkForwardResult]) -> Self {
        let scored: Vec<&WalkForwardResult> = results
            .iter()
            .filter(|r| r.status == WindowStatus::Completed && r.winner.is_some())
            .collect();
        let count_verdict =
            |v: Verdict| results.iter().filter(|r| r.verdict == Some(v)).count();

        let (mean_is, mean_oos, ratio, flag) = if scored.is_empty() {
            (0.0, 0.0, None, DegradationFlag::NoWindows)
        } else {
            let n = scored.len() as f64;
            let mean_is = scored.iter().map(|r| r.in_sample_score).sum::<f64>() / n;
            let mean_oos = scored.iter().map(|r| r.out_of_sample_score).sum::<f64>() / n;
            let (ratio, flag) = degradation_ratio(mean_is, mean_oos);
            (mean_is, mean_oos, ratio, flag)
        };

        Self {
            windows: results.len(),
            scored_windows: scored.len(),
            mean_in_sample_score: mean_is,
            mean_out_of_sample_score: mean_oos,
            degradation_ratio: ratio,
            degradation_flag: flag,
            robust_windows: count_verdict(Verdict::Robust),
            acceptable_windows: count_verdict(Verdict::Acceptable),
            overfit_windows: count_verdict(Verdict::Overfit),
        }
    }
}

/// Degradation ratio with edge-case handling.
///
/// - IS >= 0.1: ratio = OOS / IS (Normal)
/// - IS in [0, 0.1): difference = OOS − IS (LowInSample)
/// - IS < 0: skipped (NegativeInSample)
/// - IS >= 0.1 but OOS < 0: clamped to 0.0 (FailedOutOfSample)
fn degradation_ratio(mean_is: f64, mean_oos: f64) -> (Option<f64>, DegradationFlag) {
    if mean_is < 0.0 {
        (None, DegradationFlag::NegativeInSample)
    } else if mean_is < 0.1 {
        (Some(mean_oos - mean_is), DegradationFlag::LowInSample)
    } else if mean_oos < 0.0 {
        (Some(0.0), DegradationFlag::FailedOutOfSample)
    } else {
        (Some(mean_oos / mean_is), DegradationFlag::Normal)
    }
}

/// Errors that abort a walk-forward run. Data failures never do; they
/// mark their window [`WindowStatus::Failed`].
#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

// ─── Optimizer ───────────────────────────────────────────────────────

enum CandidateOutcome {
    Scored {
        score: f64,
        eligible: bool,
        metrics: PerformanceMetrics,
    },
    Skipped,
    NotRun,
}

/// Drives the simulator over a parameter grid and a sequence of windows.
pub struct WalkForwardOptimizer<'a> {
    signal: &'a dyn SignalSource,
    data: &'a dyn DataSource,
    exit: &'a ExitModelSpec,
    base_tunables: ParameterSet,
    simulator: Simulator,
    config: WalkForwardConfig,
}

impl<'a> WalkForwardOptimizer<'a> {
    /// `data` backs the signal context (auxiliary series); the traded series
    /// arrive per year in [`run`](Self::run).
    pub fn new(
        signal: &'a dyn SignalSource,
        data: &'a dyn DataSource,
        exit: &'a ExitModelSpec,
        simulator: Simulator,
    ) -> Self {
        Self {
            signal,
            data,
            exit,
            base_tunables: ParameterSet::new(),
            simulator,
            config: WalkForwardConfig::default(),
        }
    }

    /// Hypothesis tunables applied under every candidate.
    pub fn with_base_tunables(mut self, tunables: ParameterSet) -> Self {
        self.base_tunables = tunables;
        self
    }

    pub fn with_config(mut self, config: WalkForwardConfig) -> Self {
        self.config = config;
        self
    }

    /// Check windows and every candidate before anything is simulated.
    pub fn validate(
        &self,
        grid: &ParamGrid,
        windows: &[WalkForwardWindow],
    ) -> Result<Vec<ParameterSet>, ConfigurationError> {
        if windows.is_empty() {
            return Err(ConfigurationError::Other(
                "walk-forward needs at least one window".into(),
            ));
        }
        for (index, window) in windows.iter().enumerate() {
            window.validate(index)?;
        }
        grid_candidates(self.signal, self.exit, grid)
    }

    /// Run every window in order.
    pub fn run(
        &self,
        series_by_year: &BTreeMap<i32, TimeSeries>,
        grid: &ParamGrid,
        windows: &[WalkForwardWindow],
        score_fn: &dyn ScoreFn,
    ) -> Result<Vec<WalkForwardResult>, WalkForwardError> {
        let candidates = self.validate(grid, windows)?;
        let deadline = self.config.time_budget.map(|b| Instant::now() + b);

        info!(
            hypothesis = self.signal.name(),
            windows = windows.len(),
            candidates = candidates.len(),
            parallel = self.config.parallel,
            "starting walk-forward"
        );

        let mut results = Vec::with_capacity(windows.len());
        for (index, window) in windows.iter().enumerate() {
            let result =
                self.run_window(index, window, series_by_year, &candidates, score_fn, deadline)?;
            results.push(result);
        }
        Ok(results)
    }

    fn run_window(
        &self,
        index: usize,
        window: &WalkForwardWindow,
        series_by_year: &BTreeMap<i32, TimeSeries>,
        candidates: &[ParameterSet],
        score_fn: &dyn ScoreFn,
        deadline: Option<Instant>,
    ) -> Result<WalkForwardResult, ConfigurationError> {
        if past(deadline) {
            warn!(window = index, "time budget exhausted before window started");
            return Ok(WalkForwardResult::empty(index, window, WindowStatus::Incomplete));
        }

        let (train, validate) = match window_series(series_by_year, window) {
            Ok(series) => series,
            Err(e) => {
                warn!(window = index, error = %e, "window data unusable");
                let status = WindowStatus::Failed {
                    reason: e.to_string(),
                };
                return Ok(WalkForwardResult::empty(index, window, status));
            }
        };

        info!(
            window = index,
            train = ?window.train_years,
            validate = window.validate_year,
            train_bars = train.len(),
            "scoring candidates"
        );

        let train_ctx = SignalContext::new(self.data, window.train_years.clone());
        let evaluate = |candidate: &ParameterSet| -> Result<CandidateOutcome, ConfigurationError> {
            if past(deadline) {
                return Ok(CandidateOutcome::NotRun);
            }
            let result = match self.simulate(&train, &train_ctx, candidate)? {
                Ok(result) => result,
                Err(reason) => {
                    warn!(window = index, params = %candidate.label(), %reason, "candidate skipped");
                    return Ok(CandidateOutcome::Skipped);
                }
            };
            let score = score_fn.score(&result.trades, &result.equity);
            let eligible = !result.trades.is_empty()
                && score_fn.eligible(&result.trades)
                && score.is_finite();
            debug!(window = index, params = %candidate.label(), score, eligible, "candidate scored");
            Ok(CandidateOutcome::Scored {
                score,
                eligible,
                metrics: PerformanceMetrics::compute(&result.trades, &result.equity),
            })
        };

        let outcomes: Vec<CandidateOutcome> = if self.config.parallel {
            candidates.par_iter().map(evaluate).collect::<Result<_, _>>()?
        } else {
            candidates.iter().map(evaluate).collect::<Result<_, _>>()?
        };

        let mut result = WalkForwardResult::empty(index, window, WindowStatus::Completed);
        let mut best: Option<(usize, f64, PerformanceMetrics)> = None;
        for (i, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                CandidateOutcome::Scored {
                    score,
                    eligible,
                    metrics,
                } => {
                    result.candidates_evaluated += 1;
                    if eligible {
                        result.candidates_eligible += 1;
                        // Strictly greater keeps the earliest candidate on ties.
                        if best.as_ref().map_or(true, |(_, s, _)| score > *s) {
                            best = Some((i, score, metrics));
                        }
                    }
                }
                CandidateOutcome::Skipped => {
                    result.candidates_evaluated += 1;
                    result.candidates_skipped += 1;
                }
                CandidateOutcome::NotRun => result.status = WindowStatus::Incomplete,
            }
        }
        if result.status == WindowStatus::Incomplete {
            warn!(
                window = index,
                evaluated = result.candidates_evaluated,
                total = candidates.len(),
                "time budget exhausted mid-window"
            );
        }

        let Some((winner_index, in_sample_score, in_sample_metrics)) = best else {
            info!(window = index, "no eligible candidate");
            return Ok(result);
        };
        let winner = candidates[winner_index].clone();
        result.in_sample_score = in_sample_score;
        result.in_sample_metrics = Some(in_sample_metrics);

        let validate_ctx = SignalContext::for_series(self.data, validate);
        match self.simulate(validate, &validate_ctx, &winner)? {
            Ok(oos) => {
                let score = score_fn.score(&oos.trades, &oos.equity);
                result.out_of_sample_score = score;
                result.out_of_sample_metrics =
                    Some(PerformanceMetrics::compute(&oos.trades, &oos.equity));
                result.verdict = Some(Verdict::from_score(score));
                result.out_of_sample_trades = oos.trades;
                result.out_of_sample_equity = oos.equity;
            }
            Err(reason) => {
                warn!(window = index, %reason, "out-of-sample run failed");
                result.status = WindowStatus::Failed { reason };
            }
        }

        info!(
            window = index,
            winner = %winner.label(),
            in_sample = result.in_sample_score,
            out_of_sample = result.out_of_sample_score,
            "window complete"
        );
        result.winner = Some(winner);
        Ok(result)
    }

    /// One simulator run. The outer error is structural and aborts the
    /// optimization; the inner one is a data failure scoped to this run.
    fn simulate(
        &self,
        series: &TimeSeries,
        ctx: &SignalContext<'_>,
        candidate: &ParameterSet,
    ) -> Result<Result<SimulationResult, String>, ConfigurationError> {
        let exit = self.exit.with_overrides(&candidate.exit_overrides())?;
        let params = self.base_tunables.merged(&candidate.tunables());
        let signals = match self.signal.generate_signals(series, ctx, &params) {
            Ok(signals) => signals,
            Err(e) => return Ok(Err(e.to_string())),
        };
        Ok(self
            .simulator
            .run(series, &signals, &exit)
            .map_err(|e| e.to_string()))
    }
}

/// The concatenated train series and the validate-year series of `window`.
fn window_series<'s>(
    series_by_year: &'s BTreeMap<i32, TimeSeries>,
    window: &WalkForwardWindow,
) -> Result<(TimeSeries, &'s TimeSeries), DataIntegrityError> {
    let train = TimeSeries::concat_years(series_by_year, &window.train_years)?;
    let validate = series_by_year
        .get(&window.validate_year)
        .ok_or(DataIntegrityError::MissingYear {
            year: window.validate_year,
        })?;
    Ok((train, validate))
}

/// Enumerate `grid`, rejecting paths the hypothesis does not declare and
/// exit overrides the exit model cannot take.
pub fn grid_candidates(
    signal: &dyn SignalSource,
    exit: &ExitModelSpec,
    grid: &ParamGrid,
) -> Result<Vec<ParameterSet>, ConfigurationError> {
    let tunables = signal.tunables();
    for path in grid.paths() {
        if !path.starts_with(EXIT_PARAM_PREFIX) && tunables.get(path).is_none() {
            return Err(ConfigurationError::InvalidGrid {
                path: path.to_string(),
                reason: format!("not a tunable of hypothesis '{}'", signal.name()),
            });
        }
    }

    let candidates = grid.candidates();
    for candidate in &candidates {
        exit.with_overrides(&candidate.exit_overrides())?;
    }
    Ok(candidates)
}

fn past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
