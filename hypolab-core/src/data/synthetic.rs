//! Deterministic synthetic bars for demos and tests.
//!
//! A random walk from 100.0, seeded by a blake3 hash of the symbol, so the
//! same (symbol, interval, years) always yields the same series.

use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Bar, Interval, TimeSeries};

/// Continuous 24/7 bars covering every year in `years` (crypto-style).
pub fn synthetic_series(symbol: &str, interval: Interval, years: &[i32]) -> TimeSeries {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut sorted_years = years.to_vec();
    sorted_years.sort_unstable();
    sorted_years.dedup();

    let step = interval.duration();
    let mut price = 100.0_f64;
    let mut bars = Vec::new();

    for year in sorted_years {
        let (Some(start), Some(end)) = (year_start(year), year_start(year + 1)) else {
            continue;
        };
        let mut ts = start;
        while ts < end {
            let ret: f64 = rng.gen_range(-0.01..0.0105);
            let open = price;
            let close = price * (1.0 + ret);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.005));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.005));
            let volume = rng.gen_range(100.0..1_000.0);
            bars.push(Bar {
                timestamp: ts,
                open,
                high,
                low,
                close,
                volume,
            });
            price = close;
            ts += step;
        }
    }

    // Strictly ascending by construction.
    TimeSeries::new(symbol, interval, bars).unwrap_or_else(|_| TimeSeries::empty(symbol, interval))
}

fn year_start(year: i32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_per_symbol() {
        let a = synthetic_series("BTCUSDT", Interval::H4, &[2024]);
        let b = synthetic_series("BTCUSDT", Interval::H4, &[2024]);
        let c = synthetic_series("ETHUSDT", Interval::H4, &[2024]);
        assert_eq!(a, b);
        assert_ne!(a.closes(), c.closes());
    }

    #[test]
    fn covers_whole_years() {
        let series = synthetic_series("BTCUSDT", Interval::D1, &[2024, 2023]);
        // 2023 has 365 days, 2024 is a leap year.
        assert_eq!(series.len(), 365 + 366);
        assert!(series.bars().iter().all(Bar::is_sane));
        assert_eq!(series.years().into_iter().collect::<Vec<_>>(), vec![2023, 2024]);
    }
}
