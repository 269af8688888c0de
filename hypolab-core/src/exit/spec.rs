//! ExitModelSpec — validated, serializable exit-model configuration.
//!
//! Configuration names the model ("FixedTPSL", "TrailingStop", "TimeBased",
//! "ComboExit") next to its numeric parameters:
//!
//! ```toml
//! [exit]
//! model = "ComboExit"
//! tp_pct = 2.0
//! sl_pct = 1.0
//! max_hours = 48
//! ```
//!
//! A spec can only exist in a valid state, so building a model from it is
//! infallible and every position gets a fresh instance.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

use super::{ComboExit, ExitModel, ExitModelFactory, FixedTpSl, TimeBased, TrailingStop};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExitSpec", into = "RawExitSpec")]
pub enum ExitModelSpec {
    FixedTpSl(FixedTpSl),
    TrailingStop(TrailingStop),
    TimeBased(TimeBased),
    Combo(ComboExit),
}

/// Wire form: `model` plus a flat table of parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawExitSpec {
    model: String,
    #[serde(flatten)]
    params: BTreeMap<String, f64>,
}

impl ExitModelSpec {
    pub fn fixed_tpsl(tp_pct: f64, sl_pct: f64) -> Result<Self, ConfigurationError> {
        FixedTpSl::new(tp_pct, sl_pct).map(Self::FixedTpSl)
    }

    pub fn trailing_stop(trail_pct: f64) -> Result<Self, ConfigurationError> {
        TrailingStop::new(trail_pct).map(Self::TrailingStop)
    }

    pub fn time_based(max_hours: f64) -> Result<Self, ConfigurationError> {
        TimeBased::new(max_hours).map(Self::TimeBased)
    }

    pub fn combo(tp_pct: f64, sl_pct: f64, max_hours: f64) -> Result<Self, ConfigurationError> {
        ComboExit::new(tp_pct, sl_pct, max_hours).map(Self::Combo)
    }

    /// Build from a model name and its parameter table. Every parameter the
    /// model needs must be present; unknown names are rejected.
    pub fn from_name(
        model: &str,
        params: &BTreeMap<String, f64>,
    ) -> Result<Self, ConfigurationError> {
        let expected: &[&str] = match model {
            "FixedTPSL" => &["tp_pct", "sl_pct"],
            "TrailingStop" => &["trail_pct"],
            "TimeBased" => &["max_hours"],
            "ComboExit" => &["tp_pct", "sl_pct", "max_hours"],
            other => return Err(ConfigurationError::UnknownExitModel(other.to_string())),
        };
        if let Some(extra) = params.keys().find(|k| !expected.contains(&k.as_str())) {
            return Err(ConfigurationError::UnknownParameter {
                model: model.to_string(),
                name: extra.clone(),
            });
        }
        let get = |name: &str| {
            params
                .get(name)
                .copied()
                .ok_or_else(|| ConfigurationError::MissingParameter {
                    model: model.to_string(),
                    name: name.to_string(),
                })
        };

        match model {
            "FixedTPSL" => Self::fixed_tpsl(get("tp_pct")?, get("sl_pct")?),
            "TrailingStop" => Self::trailing_stop(get("trail_pct")?),
            "TimeBased" => Self::time_based(get("max_hours")?),
            _ => Self::combo(get("tp_pct")?, get("sl_pct")?, get("max_hours")?),
        }
    }

    pub fn model_name(&self) -> &'static str {
        match self {
            ExitModelSpec::FixedTpSl(_) => "FixedTPSL",
            ExitModelSpec::TrailingStop(_) => "TrailingStop",
            ExitModelSpec::TimeBased(_) => "TimeBased",
            ExitModelSpec::Combo(_) => "ComboExit",
        }
    }

    pub fn params(&self) -> BTreeMap<String, f64> {
        let pairs: Vec<(&str, f64)> = match self {
            ExitModelSpec::FixedTpSl(m) => vec![("tp_pct", m.tp_pct), ("sl_pct", m.sl_pct)],
            ExitModelSpec::TrailingStop(m) => vec![("trail_pct", m.trail_pct)],
            ExitModelSpec::TimeBased(m) => vec![("max_hours", m.max_hours)],
            ExitModelSpec::Combo(m) => vec![
                ("tp_pct", m.price.tp_pct),
                ("sl_pct", m.price.sl_pct),
                ("max_hours", m.time.max_hours),
            ],
        };
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    /// Same model with some parameters replaced (walk-forward candidates).
    pub fn with_overrides(
        &self,
        overrides: &BTreeMap<String, f64>,
    ) -> Result<Self, ConfigurationError> {
        if overrides.is_empty() {
            return Ok(self.clone());
        }
        let mut params = self.params();
        for (name, value) in overrides {
            if !params.contains_key(name) {
                return Err(ConfigurationError::UnknownParameter {
                    model: self.model_name().to_string(),
                    name: name.clone(),
                });
            }
            params.insert(name.clone(), *value);
        }
        Self::from_name(self.model_name(), &params)
    }

    /// Fresh, stateless model instance.
    pub fn build(&self) -> Box<dyn ExitModel> {
        match self {
            ExitModelSpec::FixedTpSl(m) => Box::new(*m),
            ExitModelSpec::TrailingStop(m) => Box::new(m.clone()),
            ExitModelSpec::TimeBased(m) => Box::new(*m),
            ExitModelSpec::Combo(m) => Box::new(*m),
        }
    }
}

impl Default for ExitModelSpec {
    /// ComboExit with TP 2 %, SL 1 %, 48 h limit.
    fn default() -> Self {
        ExitModelSpec::Combo(ComboExit {
            price: FixedTpSl {
                tp_pct: 2.0,
                sl_pct: 1.0,
            },
            time: TimeBased { max_hours: 48.0 },
        })
    }
}

impl ExitModelFactory for ExitModelSpec {
    fn create(&self) -> Box<dyn ExitModel> {
        self.build()
    }
}

impl fmt::Display for ExitModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .params()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}({params})", self.model_name())
    }
}

impl TryFrom<RawExitSpec> for ExitModelSpec {
    type Error = ConfigurationError;

    fn try_from(raw: RawExitSpec) -> Result<Self, Self::Error> {
        ExitModelSpec::from_name(&raw.model, &raw.params)
    }
}

impl From<ExitModelSpec> for RawExitSpec {
    fn from(spec: ExitModelSpec) -> Self {
        RawExitSpec {
            model: spec.model_name().to_string(),
            params: spec.params(),
        }
    }
}
