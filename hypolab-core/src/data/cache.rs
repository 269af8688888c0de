//! Parquet cache with Hive-style partitioning.
//!
//! Layout: `{root}/symbol={SYMBOL}/interval={INTERVAL}/{year}.parquet`, with a
//! `{year}.meta.json` sidecar next to each partition.
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity validation on load (schema, ascending timestamps, content hash)
//! - Quarantine for corrupt files (`{year}.parquet.quarantined`)
//! - Explicit invalidation; nothing is ever refreshed behind a reader's back

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::provider::{DataError, DataSource};
use crate::domain::{Bar, Interval, TimeSeries};
use crate::error::{DataIntegrityError, MissingDataError};

const COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// Metadata sidecar for one cached partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub interval: Interval,
    pub year: i32,
    pub bar_count: usize,
    pub first_timestamp: DateTime<Utc>,
    pub last_timestamp: DateTime<Utc>,
    pub data_hash: String,
    pub cached_at: DateTime<Utc>,
}

/// One row of `ParquetCache::status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub symbol: String,
    pub interval: Interval,
    pub year: i32,
    pub meta: Option<CacheMeta>,
}

/// The Parquet cache.
#[derive(Debug, Clone)]
pub struct ParquetCache {
    root: PathBuf,
}

impl ParquetCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn interval_dir(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.root
            .join(format!("symbol={symbol}"))
            .join(format!("interval={interval}"))
    }

    /// `{root}/symbol={SYMBOL}/interval={INTERVAL}/{year}.parquet`
    pub fn partition_path(&self, symbol: &str, interval: Interval, year: i32) -> PathBuf {
        self.interval_dir(symbol, interval)
            .join(format!("{year}.parquet"))
    }

    fn meta_path(&self, symbol: &str, interval: Interval, year: i32) -> PathBuf {
        self.interval_dir(symbol, interval)
            .join(format!("{year}.meta.json"))
    }

    /// Write one year's bars. Every bar must belong to `year`; an existing
    /// partition is replaced atomically.
    pub fn write_year(
        &self,
        symbol: &str,
        interval: Interval,
        year: i32,
        bars: &[Bar],
    ) -> Result<CacheMeta, DataError> {
        let (first, last) = match (bars.first(), bars.last()) {
            (Some(f), Some(l)) => (f.timestamp, l.timestamp),
            _ => {
                return Err(DataError::Metadata(format!(
                    "refusing to cache an empty partition for {symbol} {interval} {year}"
                )))
            }
        };
        if let Some(stray) = bars.iter().find(|b| b.year() != year) {
            return Err(DataIntegrityError::BarOutsideYear {
                year,
                timestamp: stray.timestamp,
            }
            .into());
        }
        // Reject unsorted input before it reaches disk.
        TimeSeries::new(symbol, interval, bars.to_vec())?;

        let dir = self.interval_dir(symbol, interval);
        fs::create_dir_all(&dir).map_err(|e| DataError::io(&dir, e))?;

        let path = self.partition_path(symbol, interval, year);
        let tmp_path = path.with_extension("parquet.tmp");
        let df = bars_to_dataframe(bars)?;
        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::io(&path, e)
        })?;

        let meta = CacheMeta {
            symbol: symbol.to_string(),
            interval,
            year,
            bar_count: bars.len(),
            first_timestamp: first,
            last_timestamp: last,
            data_hash: content_hash(bars),
            cached_at: Utc::now(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::Metadata(format!("meta serialization: {e}")))?;
        let meta_path = self.meta_path(symbol, interval, year);
        let meta_tmp = meta_path.with_extension("json.tmp");
        fs::write(&meta_tmp, meta_json).map_err(|e| DataError::io(&meta_tmp, e))?;
        fs::rename(&meta_tmp, &meta_path).map_err(|e| DataError::io(&meta_path, e))?;

        info!(
            symbol,
            interval = %interval,
            year,
            bars = bars.len(),
            "cached partition"
        );
        Ok(meta)
    }

    /// Split a series by calendar year and write every partition.
    pub fn write_series(&self, series: &TimeSeries) -> Result<Vec<CacheMeta>, DataError> {
        series
            .split_by_year()
            .iter()
            .map(|(&year, part)| {
                self.write_year(series.symbol(), series.interval(), year, part.bars())
            })
            .collect()
    }

    /// Metadata sidecar for a partition, if present and readable.
    pub fn get_meta(&self, symbol: &str, interval: Interval, year: i32) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol, interval, year)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Years with a cached partition for (symbol, interval).
    pub fn cached_years(&self, symbol: &str, interval: Interval) -> BTreeSet<i32> {
        let Ok(entries) = fs::read_dir(self.interval_dir(symbol, interval)) else {
            return BTreeSet::new();
        };
        entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                name.strip_suffix(".parquet")?.parse::<i32>().ok()
            })
            .collect()
    }

    /// Remove cached partitions. `year = None` removes every year of the
    /// (symbol, interval). Returns the number of partitions removed.
    pub fn invalidate(
        &self,
        symbol: &str,
        interval: Interval,
        year: Option<i32>,
    ) -> Result<usize, DataError> {
        let years: Vec<i32> = match year {
            Some(y) => vec![y],
            None => self.cached_years(symbol, interval).into_iter().collect(),
        };
        let mut removed = 0;
        for y in years {
            let path = self.partition_path(symbol, interval, y);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| DataError::io(&path, e))?;
                removed += 1;
            }
            let meta = self.meta_path(symbol, interval, y);
            if meta.exists() {
                fs::remove_file(&meta).map_err(|e| DataError::io(&meta, e))?;
            }
        }
        info!(symbol, interval = %interval, removed, "invalidated cache");
        Ok(removed)
    }

    /// Every cached partition under the root, sorted by (symbol, interval, year).
    pub fn status(&self) -> Result<Vec<CacheStatus>, DataError> {
        let mut rows = Vec::new();
        if !self.root.exists() {
            return Ok(rows);
        }
        for (symbol, sym_path) in hive_children(&self.root, "symbol=")? {
            for (interval_name, _) in hive_children(&sym_path, "interval=")? {
                let Ok(interval) = interval_name.parse::<Interval>() else {
                    warn!(symbol = %symbol, interval = %interval_name, "unknown interval directory");
                    continue;
                };
                for year in self.cached_years(&symbol, interval) {
                    rows.push(CacheStatus {
                        symbol: symbol.clone(),
                        interval,
                        year,
                        meta: self.get_meta(&symbol, interval, year),
                    });
                }
            }
        }
        rows.sort_by(|a, b| {
            (a.symbol.as_str(), a.interval, a.year).cmp(&(b.symbol.as_str(), b.interval, b.year))
        });
        Ok(rows)
    }

    fn quarantine(&self, path: &Path, reason: &str) {
        let quarantined = path.with_extension("parquet.quarantined");
        warn!(
            path = %path.display(),
            reason,
            "quarantining corrupt cache file"
        );
        let _ = fs::rename(path, quarantined);
    }
}

impl DataSource for ParquetCache {
    fn name(&self) -> &str {
        "parquet-cache"
    }

    fn load_year(
        &self,
        symbol: &str,
        interval: Interval,
        year: i32,
    ) -> Result<TimeSeries, DataError> {
        let path = self.partition_path(symbol, interval, year);
        if !path.exists() {
            return Err(MissingDataError {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
                year,
            }
            .into());
        }

        let loaded = load_and_validate_parquet(&path).and_then(|bars| {
            if let Some(meta) = self.get_meta(symbol, interval, year) {
                let hash = content_hash(&bars);
                if meta.bar_count != bars.len() || meta.data_hash != hash {
                    return Err(DataError::Corrupt {
                        path: path.clone(),
                        reason: "content does not match metadata sidecar".into(),
                    });
                }
            }
            Ok(bars)
        });

        match loaded {
            Ok(bars) => {
                debug!(symbol, interval = %interval, year, bars = bars.len(), "cache hit");
                Ok(TimeSeries::new(symbol, interval, bars)?)
            }
            Err(e @ (DataError::Corrupt { .. } | DataError::Parquet(_))) => {
                self.quarantine(&path, &e.to_string());
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

/// Deterministic hash of partition content.
pub fn content_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp_millis().to_le_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&v.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// `key=value` subdirectories of `dir`.
fn hive_children(dir: &Path, prefix: &str) -> Result<Vec<(String, PathBuf)>, DataError> {
    let entries = fs::read_dir(dir).map_err(|e| DataError::io(dir, e))?;
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DataError::io(dir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(value) = entry
            .file_name()
            .to_str()
            .and_then(|n| n.strip_prefix(prefix))
        {
            out.push((value.to_string(), path));
        }
    }
    Ok(out)
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, DataError> {
    let timestamps: Vec<i64> = bars.iter().map(|b| b.timestamp.timestamp_millis()).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("timestamp".into(), timestamps),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file = fs::File::create(path).map_err(|e| DataError::io(path, e))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::io(path, e))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::Parquet(format!("read {}: {e}", path.display())))?;

    if df.height() == 0 {
        return Err(DataError::Corrupt {
            path: path.to_path_buf(),
            reason: "empty partition".into(),
        });
    }
    for name in COLUMNS {
        if df.column(name).is_err() {
            return Err(DataError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("missing column '{name}'"),
            });
        }
    }

    dataframe_to_bars(&df, path)
}

fn dataframe_to_bars(df: &DataFrame, path: &Path) -> Result<Vec<Bar>, DataError> {
    let col_err = |e: PolarsError| DataError::Parquet(format!("column read: {e}"));

    let ts_ca = df.column("timestamp").map_err(col_err)?.i64().map_err(col_err)?;
    let open_ca = df.column("open").map_err(col_err)?.f64().map_err(col_err)?;
    let high_ca = df.column("high").map_err(col_err)?.f64().map_err(col_err)?;
    let low_ca = df.column("low").map_err(col_err)?.f64().map_err(col_err)?;
    let close_ca = df.column("close").map_err(col_err)?.f64().map_err(col_err)?;
    let vol_ca = df.column("volume").map_err(col_err)?.f64().map_err(col_err)?;

    let n = df.height();
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let timestamp = ts_ca
            .get(i)
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| DataError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("null or invalid timestamp at row {i}"),
            })?;
        bars.push(Bar {
            timestamp,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0.0),
        });
    }
    Ok(bars)
}
