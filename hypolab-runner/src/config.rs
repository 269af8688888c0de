//! Hypothesis configuration files.
//!
//! One TOML file describes a hypothesis run: which hypothesis, on which
//! symbols and years, with which exit model and costs, and optionally how to
//! walk it forward.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hypolab_core::domain::{Interval, ParameterSet, EXIT_PARAM_PREFIX};
use hypolab_core::engine::SimulationConfig;
use hypolab_core::error::ConfigurationError;
use hypolab_core::exit::ExitModelSpec;
use hypolab_core::signals::{self, SignalSource};

use crate::fitness::{FitnessMetric, Scorer};
use crate::param_grid::ParamGrid;
use crate::walk_forward::{grid_candidates, WalkForwardConfig, WalkForwardWindow};

/// Unique identifier for a configured run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigurationError),

    #[error("invalid config: {0}")]
    Validation(String),
}

/// A complete hypothesis run description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    #[serde(default = "default_years")]
    pub years: Vec<i32>,

    /// Interval the hypothesis trades and signals on.
    #[serde(default = "default_interval")]
    pub signal_interval: Interval,

    pub hypothesis: HypothesisSection,

    #[serde(default)]
    pub exit: ExitModelSpec,

    #[serde(default)]
    pub costs: CostsConfig,

    #[serde(default)]
    pub walkforward: Option<WalkForwardSection>,
}

/// `[hypothesis]`: which signal source and how to tune it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisSection {
    pub kind: String,

    /// Non-numeric settings, e.g. the leader symbol.
    #[serde(default)]
    pub options: BTreeMap<String, String>,

    /// Overrides for the hypothesis' default tunables.
    #[serde(default)]
    pub tunables: ParameterSet,
}

/// `[costs]`: the fixed-percentage cost model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostsConfig {
    #[serde(default = "default_fees_pct")]
    pub fees_pct: f64,
    #[serde(default = "default_slippage_pct")]
    pub slippage_pct: f64,
    #[serde(default = "default_leverage")]
    pub leverage: f64,
}

impl Default for CostsConfig {
    fn default() -> Self {
        Self {
            fees_pct: default_fees_pct(),
            slippage_pct: default_slippage_pct(),
            leverage: default_leverage(),
        }
    }
}

impl CostsConfig {
    pub fn to_simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            fees_pct: self.fees_pct,
            slippage_pct: self.slippage_pct,
            leverage: self.leverage,
        }
    }
}

/// `[walkforward]`: windows, grid and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardSection {
    pub windows: Vec<WalkForwardWindow>,

    #[serde(default)]
    pub param_grid: ParamGrid,

    #[serde(default)]
    pub sort_by: FitnessMetric,

    #[serde(default = "default_min_trades")]
    pub min_trades: usize,

    #[serde(default)]
    pub time_budget_secs: Option<u64>,

    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl WalkForwardSection {
    pub fn scorer(&self) -> Scorer {
        Scorer::new(self.sort_by, self.min_trades)
    }

    pub fn optimizer_config(&self) -> WalkForwardConfig {
        WalkForwardConfig {
            parallel: self.parallel,
            time_budget: self.time_budget_secs.map(Duration::from_secs),
        }
    }
}

fn default_symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string()]
}

fn default_years() -> Vec<i32> {
    vec![2024]
}

fn default_interval() -> Interval {
    Interval::H1
}

fn default_fees_pct() -> f64 {
    0.05
}

fn default_slippage_pct() -> f64 {
    0.1
}

fn default_leverage() -> f64 {
    1.0
}

fn default_min_trades() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl HypothesisConfig {
    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks. Every failure here happens before data is read.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation("name must not be empty".into()));
        }
        if self.symbols.is_empty() {
            return Err(ConfigError::Validation("symbols must not be empty".into()));
        }
        if self.years.is_empty() {
            return Err(ConfigError::Validation("years must not be empty".into()));
        }

        let signal = self.signal_source()?;
        let defaults = signal.tunables();
        for (path, _) in self.hypothesis.tunables.iter() {
            if path.starts_with(EXIT_PARAM_PREFIX) {
                return Err(ConfigError::Validation(format!(
                    "exit parameter '{path}' belongs in [exit], not [hypothesis.tunables]"
                )));
            }
            if defaults.get(path).is_none() {
                return Err(ConfigError::Validation(format!(
                    "hypothesis '{}' has no tunable '{path}'",
                    signal.name()
                )));
            }
        }

        self.costs.to_simulation_config().validate()?;

        if let Some(wf) = &self.walkforward {
            if wf.windows.is_empty() {
                return Err(ConfigError::Validation(
                    "[walkforward] needs at least one window".into(),
                ));
            }
            for (index, window) in wf.windows.iter().enumerate() {
                window.validate(index)?;
            }
            grid_candidates(signal.as_ref(), &self.exit, &wf.param_grid)?;
        }
        Ok(())
    }

    /// The configured hypothesis.
    pub fn signal_source(&self) -> Result<Box<dyn SignalSource>, ConfigurationError> {
        signals::resolve(&self.hypothesis.kind, &self.hypothesis.options)
    }

    /// Deterministic hash of the canonical JSON form of this config.
    pub fn run_id(&self) -> Result<RunId, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name = "green candles"

[hypothesis]
kind = "green_near_low_high"
"#;

    #[test]
    fn minimal_config_takes_defaults() {
        let config = HypothesisConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.symbols, vec!["BTCUSDT"]);
        assert_eq!(config.years, vec![2024]);
        assert_eq!(config.signal_interval, Interval::H1);
        assert_eq!(config.exit, ExitModelSpec::default());
        assert_eq!(config.costs, CostsConfig::default());
        assert!(config.walkforward.is_none());
    }

    #[test]
    fn full_config_parses() {
        let text = r#"
name = "lead-lag"
description = "BTC leads ETH"
symbols = ["ETHUSDT"]
years = [2022, 2023, 2024]
signal_interval = "4h"

[hypothesis]
kind = "cross_asset_lead"

[hypothesis.options]
leader = "BTCUSDT"

[hypothesis.tunables]
ema_fast = 8

[exit]
model = "FixedTPSL"
tp_pct = 3
sl_pct = 1.5

[costs]
leverage = 2

[walkforward]
windows = [
    { train = [2022], validate = 2023 },
    { train = [2022, 2023], validate = 2024 },
]
sort_by = "net_return"
min_trades = 5
time_budget_secs = 600

[walkforward.param_grid]
"exit_params.tp_pct" = [2, 3, 4]
ema_fast = [8, 12]
"#;
        let config = HypothesisConfig::from_toml_str(text).unwrap();
        assert_eq!(config.signal_interval, Interval::H4);
        assert_eq!(config.hypothesis.tunables.get("ema_fast"), Some(8.0));
        assert_eq!(config.exit, ExitModelSpec::fixed_tpsl(3.0, 1.5).unwrap());
        assert_eq!(config.costs.leverage, 2.0);
        assert_eq!(config.costs.fees_pct, 0.05);

        let wf = config.walkforward.as_ref().unwrap();
        assert_eq!(wf.windows.len(), 2);
        assert_eq!(wf.param_grid.size(), 6);
        assert_eq!(wf.scorer(), Scorer::new(FitnessMetric::NetReturn, 5));
        assert!(wf.parallel);
        assert_eq!(
            wf.optimizer_config().time_budget,
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn rejects_unknown_hypothesis() {
        let err = HypothesisConfig::from_toml_str("name = \"x\"\n[hypothesis]\nkind = \"moon\"")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(ConfigurationError::UnknownHypothesis(_))
        ));
    }

    #[test]
    fn rejects_unknown_tunable() {
        let text = format!("{MINIMAL}\n[hypothesis.tunables]\nema_fast = 3\n");
        assert!(matches!(
            HypothesisConfig::from_toml_str(&text),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_bad_exit_parameters() {
        let text = format!("{MINIMAL}\n[exit]\nmodel = \"TrailingStop\"\ntrail_pct = -1\n");
        assert!(matches!(
            HypothesisConfig::from_toml_str(&text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_overlapping_window() {
        let text = format!(
            "{MINIMAL}\n[walkforward]\nwindows = [{{ train = [2023, 2024], validate = 2024 }}]\n"
        );
        assert!(matches!(
            HypothesisConfig::from_toml_str(&text),
            Err(ConfigError::Invalid(ConfigurationError::OverlappingWindow { .. }))
        ));
    }

    #[test]
    fn rejects_grid_path_outside_hypothesis() {
        let text = format!(
            "{MINIMAL}\n[walkforward]\nwindows = [{{ train = [2023], validate = 2024 }}]\n\
             [walkforward.param_grid]\nema_slow = [20, 30]\n"
        );
        assert!(matches!(
            HypothesisConfig::from_toml_str(&text),
            Err(ConfigError::Invalid(ConfigurationError::InvalidGrid { .. }))
        ));
    }

    #[test]
    fn rejects_grid_exit_override_the_model_lacks() {
        let text = format!(
            "{MINIMAL}\n[walkforward]\nwindows = [{{ train = [2023], validate = 2024 }}]\n\
             [walkforward.param_grid]\n\"exit_params.trail_pct\" = [1]\n"
        );
        assert!(matches!(
            HypothesisConfig::from_toml_str(&text),
            Err(ConfigError::Invalid(ConfigurationError::UnknownParameter { .. }))
        ));
    }

    #[test]
    fn rejects_negative_fees() {
        let text = format!("{MINIMAL}\n[costs]\nfees_pct = -0.1\n");
        assert!(matches!(
            HypothesisConfig::from_toml_str(&text),
            Err(ConfigError::Invalid(ConfigurationError::ParameterOutOfRange { .. }))
        ));
    }

    #[test]
    fn run_id_is_deterministic() {
        let a = HypothesisConfig::from_toml_str(MINIMAL).unwrap();
        let b = HypothesisConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(a.run_id().unwrap(), b.run_id().unwrap());
        assert_eq!(a.run_id().unwrap().len(), 64);

        let mut c = a.clone();
        c.years = vec![2023];
        assert_ne!(a.run_id().unwrap(), c.run_id().unwrap());
    }
}
