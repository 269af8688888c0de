//! Exhaustive parameter grid for walk-forward search.
//!
//! Enumeration order is fixed so results and tie-breaks reproduce exactly:
//! keys sorted lexicographically, each key's values sorted ascending and
//! de-duplicated, odometer order with the last key varying fastest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hypolab_core::domain::ParameterSet;
use hypolab_core::error::ConfigurationError;

/// Mapping from parameter path to a finite set of candidate values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Vec<f64>>", into = "BTreeMap<String, Vec<f64>>")]
pub struct ParamGrid {
    axes: BTreeMap<String, Vec<f64>>,
}

impl ParamGrid {
    /// Validate and normalize a grid. Every path needs at least one finite
    /// candidate.
    pub fn new(axes: BTreeMap<String, Vec<f64>>) -> Result<Self, ConfigurationError> {
        let mut normalized = BTreeMap::new();
        for (path, mut values) in axes {
            if values.is_empty() {
                return Err(ConfigurationError::InvalidGrid {
                    path,
                    reason: "no candidate values".into(),
                });
            }
            if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
                return Err(ConfigurationError::InvalidGrid {
                    reason: format!("non-finite candidate {bad}"),
                    path,
                });
            }
            values.sort_by(f64::total_cmp);
            values.dedup();
            normalized.insert(path, values);
        }
        Ok(Self { axes: normalized })
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.axes.keys().map(String::as_str)
    }

    pub fn values(&self, path: &str) -> Option<&[f64]> {
        self.axes.get(path).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Number of candidates. An empty grid has exactly one: the empty set.
    pub fn size(&self) -> usize {
        self.axes.values().map(Vec::len).product()
    }

    /// Every candidate in enumeration order.
    pub fn candidates(&self) -> Vec<ParameterSet> {
        let axes: Vec<(&String, &Vec<f64>)> = self.axes.iter().collect();
        let mut digits = vec![0usize; axes.len()];
        let mut out = Vec::with_capacity(self.size());

        loop {
            out.push(
                axes.iter()
                    .zip(&digits)
                    .map(|((path, values), &d)| ((*path).clone(), values[d]))
                    .collect(),
            );

            // Advance the odometer, last axis fastest.
            let mut k = axes.len();
            loop {
                if k == 0 {
                    return out;
                }
                k -= 1;
                digits[k] += 1;
                if digits[k] < axes[k].1.len() {
                    break;
                }
                digits[k] = 0;
            }
        }
    }
}

impl TryFrom<BTreeMap<String, Vec<f64>>> for ParamGrid {
    type Error = ConfigurationError;

    fn try_from(axes: BTreeMap<String, Vec<f64>>) -> Result<Self, Self::Error> {
        Self::new(axes)
    }
}

impl From<ParamGrid> for BTreeMap<String, Vec<f64>> {
    fn from(grid: ParamGrid) -> Self {
        grid.axes
    }
}
