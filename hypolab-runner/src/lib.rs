//! HypoLab Runner — parameter grids, metrics, scoring, walk-forward
//! optimization, hypothesis configuration, orchestration and reporting.

pub mod config;
pub mod fitness;
pub mod metrics;
pub mod param_grid;
pub mod report;
pub mod runner;
pub mod walk_forward;

pub use config::{ConfigError, CostsConfig, HypothesisConfig, RunId, WalkForwardSection};
pub use fitness::{FitnessMetric, ScoreFn, Scorer};
pub use metrics::PerformanceMetrics;
pub use param_grid::ParamGrid;
pub use report::{FileReportSink, NullSink, ReportSink, RunMetadata, WalkForwardReport};
pub use runner::{run_hypothesis, run_walkforward, RunError, RunOptions, RunStatus, RunSummary};
pub use walk_forward::{
    DegradationFlag, Verdict, WalkForwardConfig, WalkForwardError, WalkForwardOptimizer,
    WalkForwardResult, WalkForwardSummary, WalkForwardWindow, WindowStatus,
};
