//! ParameterSet — dotted parameter path to scalar value.
//!
//! Paths prefixed with `exit_params.` configure the exit model; every other
//! path is a hypothesis tunable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const EXIT_PARAM_PREFIX: &str = "exit_params.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, f64>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, value: f64) -> Self {
        self.values.insert(path.into(), value);
        self
    }

    pub fn get(&self, path: &str) -> Option<f64> {
        self.values.get(path).copied()
    }

    /// Integer-valued tunable (window lengths, spans). Non-finite or
    /// negative values fall back to `default`.
    pub fn get_usize_or(&self, path: &str, default: usize) -> usize {
        match self.get(path) {
            Some(v) if v.is_finite() && v >= 0.0 => v.round() as usize,
            _ => default,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Exit-model entries with the `exit_params.` prefix stripped.
    pub fn exit_overrides(&self) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(EXIT_PARAM_PREFIX)
                    .map(|name| (name.to_string(), *v))
            })
            .collect()
    }

    /// Hypothesis tunables (every path without the exit prefix).
    pub fn tunables(&self) -> ParameterSet {
        let values = self
            .values
            .iter()
            .filter(|(k, _)| !k.starts_with(EXIT_PARAM_PREFIX))
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        ParameterSet { values }
    }

    /// Overlay `other` on top of `self`.
    pub fn merged(&self, other: &ParameterSet) -> ParameterSet {
        let mut values = self.values.clone();
        values.extend(other.values.iter().map(|(k, v)| (k.clone(), *v)));
        ParameterSet { values }
    }

    /// Compact `k=v, k=v` label for logs and reports.
    pub fn label(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<(String, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        ParameterSet {
            values: iter.into_iter().collect(),
        }
    }
}

impl From<BTreeMap<String, f64>> for ParameterSet {
    fn from(values: BTreeMap<String, f64>) -> Self {
        ParameterSet { values }
    }
}
