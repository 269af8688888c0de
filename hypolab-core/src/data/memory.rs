//! In-memory data source keyed by (symbol, interval, year).

use std::collections::HashMap;

use super::provider::{DataError, DataSource};
use crate::domain::{Interval, TimeSeries};
use crate::error::MissingDataError;

#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    partitions: HashMap<(String, Interval, i32), TimeSeries>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a series, split into per-year partitions. Existing partitions
    /// for the same key are replaced.
    pub fn insert(&mut self, series: &TimeSeries) {
        for (year, part) in series.split_by_year() {
            self.partitions
                .insert((series.symbol().to_string(), series.interval(), year), part);
        }
    }

    pub fn with_series(mut self, series: &TimeSeries) -> Self {
        self.insert(series);
        self
    }

    /// Store one partition as-is, without checking that its bars belong to
    /// `year`. Concatenation validates that later.
    pub fn insert_partition(&mut self, year: i32, series: TimeSeries) {
        self.partitions
            .insert((series.symbol().to_string(), series.interval(), year), series);
    }

    pub fn remove(&mut self, symbol: &str, interval: Interval, year: i32) -> bool {
        self.partitions
            .remove(&(symbol.to_string(), interval, year))
            .is_some()
    }
}

impl DataSource for InMemorySource {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn load_year(
        &self,
        symbol: &str,
        interval: Interval,
        year: i32,
    ) -> Result<TimeSeries, DataError> {
        self.partitions
            .get(&(symbol.to_string(), interval, year))
            .cloned()
            .ok_or_else(|| {
                MissingDataError {
                    symbol: symbol.to_string(),
                    interval: interval.to_string(),
                    year,
                }
                .into()
            })
    }
}
