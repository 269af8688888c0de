//! Signal sources — hypotheses that turn a series into entry flags.
//!
//! A hypothesis only decides *where* to enter; the simulator owns everything
//! after that. `signals[i] == true` means "enter at the open of bar `i+1`",
//! so a hypothesis may use bar `i` in full but nothing after it.
//!
//! ## Built-in hypotheses
//!
//! - [`GreenNearLowHigh`] — strong green candle (open near low, close near high)
//! - [`CrossAssetLead`] — leader-symbol EMA cross gated by a daily trend filter
//! - [`AbcReversal`] — pivot-based A-B-C correction gated by an EMA trend

pub mod abc_reversal;
pub mod cross_asset_lead;
pub mod ema;
pub mod green_near_low_high;

pub use abc_reversal::AbcReversal;
pub use cross_asset_lead::CrossAssetLead;
pub use ema::ema;
pub use green_near_low_high::GreenNearLowHigh;

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::data::{DataError, DataSource};
use crate::domain::{Interval, ParameterSet, TimeSeries};
use crate::error::{ConfigurationError, DataIntegrityError};

/// Errors raised while generating signals.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("auxiliary data unavailable: {0}")]
    Data(#[from] DataError),

    #[error(transparent)]
    Integrity(#[from] DataIntegrityError),

    #[error("invalid tunable '{name}': {reason}")]
    InvalidTunable { name: String, reason: String },
}

/// Capability handed to a hypothesis: auxiliary data restricted to the
/// years of the series being simulated.
pub struct SignalContext<'a> {
    source: &'a dyn DataSource,
    years: BTreeSet<i32>,
}

impl<'a> SignalContext<'a> {
    pub fn new(source: &'a dyn DataSource, years: BTreeSet<i32>) -> Self {
        Self { source, years }
    }

    /// Context covering exactly the years present in `series`.
    pub fn for_series(source: &'a dyn DataSource, series: &TimeSeries) -> Self {
        Self::new(source, series.years())
    }

    pub fn years(&self) -> &BTreeSet<i32> {
        &self.years
    }

    /// Another symbol or interval over the same years.
    pub fn load_data(&self, symbol: &str, interval: Interval) -> Result<TimeSeries, DataError> {
        self.source.get_series(symbol, interval, &self.years)
    }
}

/// A hypothesis. Parameters arrive per call, so one instance can serve many
/// candidates concurrently.
pub trait SignalSource: Send + Sync {
    fn name(&self) -> &str;

    /// Tunables with their default values.
    fn tunables(&self) -> ParameterSet;

    /// One flag per bar of `series`.
    fn generate_signals(
        &self,
        series: &TimeSeries,
        ctx: &SignalContext<'_>,
        params: &ParameterSet,
    ) -> Result<Vec<bool>, SignalError>;
}

/// Hypothesis kinds known to [`resolve`].
pub const HYPOTHESIS_KINDS: [&str; 3] = ["green_near_low_high", "cross_asset_lead", "abc_reversal"];

/// Build a hypothesis by kind. `options` carries non-numeric settings
/// (e.g. `leader = "BTCUSDT"` for `cross_asset_lead`).
pub fn resolve(
    kind: &str,
    options: &BTreeMap<String, String>,
) -> Result<Box<dyn SignalSource>, ConfigurationError> {
    let allowed: &[&str] = match kind {
        "cross_asset_lead" => &["leader", "leader_interval", "trend_interval"],
        "green_near_low_high" | "abc_reversal" => &[],
        other => return Err(ConfigurationError::UnknownHypothesis(other.to_string())),
    };
    if let Some(key) = options.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ConfigurationError::Other(format!(
            "hypothesis '{kind}' has no option '{key}'"
        )));
    }

    Ok(match kind {
        "green_near_low_high" => Box::new(GreenNearLowHigh),
        "abc_reversal" => Box::new(AbcReversal),
        _ => {
            let mut lead = CrossAssetLead::default();
            if let Some(leader) = options.get("leader") {
                lead.leader = leader.clone();
            }
            if let Some(interval) = options.get("leader_interval") {
                lead.leader_interval = interval.parse()?;
            }
            if let Some(interval) = options.get("trend_interval") {
                lead.trend_interval = interval.parse()?;
            }
            Box::new(lead)
        }
    })
}

/// Positive integer tunable (EMA spans, pivot windows).
pub(crate) fn span_param(
    params: &ParameterSet,
    defaults: &ParameterSet,
    name: &str,
) -> Result<usize, SignalError> {
    let value = params
        .get(name)
        .or_else(|| defaults.get(name))
        .unwrap_or(f64::NAN);
    if value.is_finite() && value >= 1.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(SignalError::InvalidTunable {
            name: name.to_string(),
            reason: format!("{value} is not a positive integer"),
        })
    }
}

/// Finite non-negative fractional tunable (thresholds).
pub(crate) fn ratio_param(
    params: &ParameterSet,
    defaults: &ParameterSet,
    name: &str,
) -> Result<f64, SignalError> {
    let value = params
        .get(name)
        .or_else(|| defaults.get(name))
        .unwrap_or(f64::NAN);
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SignalError::InvalidTunable {
            name: name.to_string(),
            reason: format!("{value} must be finite and >= 0"),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_kind() {
        for kind in HYPOTHESIS_KINDS {
            let source = resolve(kind, &BTreeMap::new()).unwrap();
            assert_eq!(source.name(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_configuration_error() {
        let err = resolve("h999", &BTreeMap::new()).err().unwrap();
        assert!(matches!(err, ConfigurationError::UnknownHypothesis(_)));
    }

    #[test]
    fn rejects_unknown_option() {
        let options: BTreeMap<String, String> =
            [("leader".to_string(), "ETHUSDT".to_string())].into_iter().collect();
        assert!(resolve("green_near_low_high", &options).is_err());
        assert!(resolve("cross_asset_lead", &options).is_ok());
    }

    #[test]
    fn span_param_validation() {
        let defaults = ParameterSet::new().with("w", 3.0);
        assert_eq!(span_param(&ParameterSet::new(), &defaults, "w").unwrap(), 3);
        let bad = ParameterSet::new().with("w", 2.5);
        assert!(span_param(&bad, &defaults, "w").is_err());
        let zero = ParameterSet::new().with("w", 0.0);
        assert!(span_param(&zero, &defaults, "w").is_err());
    }
}
