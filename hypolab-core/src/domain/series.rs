//! TimeSeries — ordered bars for one (symbol, interval) with O(1) lookup by
//! position and by timestamp.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use super::{Bar, Interval};
use crate::error::DataIntegrityError;

/// Bars sorted strictly ascending by timestamp. Gaps are tolerated, never
/// synthesized.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    symbol: String,
    interval: Interval,
    bars: Vec<Bar>,
    index: HashMap<DateTime<Utc>, usize>,
}

impl TimeSeries {
    /// Build a series, rejecting duplicate or descending timestamps.
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        bars: Vec<Bar>,
    ) -> Result<Self, DataIntegrityError> {
        for (i, pair) in bars.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(DataIntegrityError::NonMonotonic {
                    index: i + 1,
                    previous: pair[0].timestamp,
                    current: pair[1].timestamp,
                });
            }
        }
        let index = bars
            .iter()
            .enumerate()
            .map(|(i, b)| (b.timestamp, i))
            .collect();
        Ok(Self {
            symbol: symbol.into(),
            interval,
            bars,
            index,
        })
    }

    pub fn empty(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            bars: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn get(&self, i: usize) -> Option<&Bar> {
        self.bars.get(i)
    }

    /// Position of the bar opening exactly at `ts`.
    pub fn position_of(&self, ts: DateTime<Utc>) -> Option<usize> {
        self.index.get(&ts).copied()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Distinct calendar years covered, ascending.
    pub fn years(&self) -> BTreeSet<i32> {
        self.bars.iter().map(Bar::year).collect()
    }

    /// Sub-series holding only the bars of `year`.
    pub fn year_slice(&self, year: i32) -> TimeSeries {
        let bars: Vec<Bar> = self
            .bars
            .iter()
            .filter(|b| b.year() == year)
            .copied()
            .collect();
        Self::from_sorted(self.symbol.clone(), self.interval, bars)
    }

    /// Partition into one series per calendar year.
    pub fn split_by_year(&self) -> BTreeMap<i32, TimeSeries> {
        let mut grouped: BTreeMap<i32, Vec<Bar>> = BTreeMap::new();
        for bar in &self.bars {
            grouped.entry(bar.year()).or_default().push(*bar);
        }
        grouped
            .into_iter()
            .map(|(year, bars)| {
                (
                    year,
                    Self::from_sorted(self.symbol.clone(), self.interval, bars),
                )
            })
            .collect()
    }

    /// Concatenate the per-year partitions named by `years` into one series.
    ///
    /// The result must stay strictly ascending across year boundaries and every
    /// partition must hold only bars of its own year.
    pub fn concat_years(
        by_year: &BTreeMap<i32, TimeSeries>,
        years: &BTreeSet<i32>,
    ) -> Result<TimeSeries, DataIntegrityError> {
        let mut bars: Vec<Bar> = Vec::new();
        let mut symbol = String::new();
        let mut interval = Interval::H1;
        let mut prev_year: Option<i32> = None;

        for &year in years {
            let part = by_year
                .get(&year)
                .ok_or(DataIntegrityError::MissingYear { year })?;
            symbol = part.symbol.clone();
            interval = part.interval;

            if let (Some(last), Some(first)) = (bars.last(), part.bars.first()) {
                if first.timestamp <= last.timestamp {
                    return Err(DataIntegrityError::OverlappingYears {
                        earlier: prev_year.unwrap_or(year),
                        later: year,
                        at: first.timestamp,
                    });
                }
            }
            bars.extend_from_slice(&part.bars);
            if !part.bars.is_empty() {
                prev_year = Some(year);
            }
        }

        for &year in years {
            if let Some(stray) = by_year[&year].bars.iter().find(|b| b.year() != year) {
                return Err(DataIntegrityError::BarOutsideYear {
                    year,
                    timestamp: stray.timestamp,
                });
            }
        }

        TimeSeries::new(symbol, interval, bars)
    }

    // Caller guarantees ascending order (subsequence of a validated series).
    fn from_sorted(symbol: String, interval: Interval, bars: Vec<Bar>) -> Self {
        let index = bars
            .iter()
            .enumerate()
            .map(|(i, b)| (b.timestamp, i))
            .collect();
        Self {
            symbol,
            interval,
            bars,
            index,
        }
    }
}
