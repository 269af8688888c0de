//! As-of alignment of one series' values onto another series' timestamps.
//!
//! For each target timestamp take the most recent source value at or before
//! it, or `default` when the source has nothing yet. Boolean signals use
//! `false` as the default, so gaps never invent entries.

use chrono::{DateTime, Utc};

use crate::domain::TimeSeries;
use crate::error::DataIntegrityError;

/// Align `values` (one per `source_ts`) onto `target_ts`.
///
/// `source_ts` must be strictly ascending. `target_ts` may be in any order,
/// but ascending targets are aligned in a single linear sweep.
pub fn align_asof<T: Copy>(
    source_ts: &[DateTime<Utc>],
    values: &[T],
    target_ts: &[DateTime<Utc>],
    default: T,
) -> Result<Vec<T>, DataIntegrityError> {
    if source_ts.len() != values.len() {
        return Err(DataIntegrityError::SignalLengthMismatch {
            signals: values.len(),
            bars: source_ts.len(),
        });
    }
    if let Some(i) = source_ts.windows(2).position(|w| w[1] <= w[0]) {
        return Err(DataIntegrityError::UnsortedAlignmentSource { index: i + 1 });
    }

    let mut out = Vec::with_capacity(target_ts.len());
    let mut cursor = 0usize;
    let mut prev: Option<DateTime<Utc>> = None;
    for &t in target_ts {
        if prev.is_some_and(|p| t < p) {
            cursor = 0;
        }
        prev = Some(t);
        while cursor < source_ts.len() && source_ts[cursor] <= t {
            cursor += 1;
        }
        out.push(if cursor == 0 {
            default
        } else {
            values[cursor - 1]
        });
    }
    Ok(out)
}

/// Align on bar *close* times: a source bar's value becomes visible once
/// that bar has closed, and is read when the target bar closes.
///
/// This is the alignment to use for cross-interval signals. Aligning on open
/// timestamps would let a 1h bar see a 4h bar's value hours before the 4h bar
/// closes.
pub fn align_closed<T: Copy>(
    source: &TimeSeries,
    values: &[T],
    target: &TimeSeries,
    default: T,
) -> Result<Vec<T>, DataIntegrityError> {
    let src_step = source.interval().duration();
    let dst_step = target.interval().duration();
    let source_close: Vec<DateTime<Utc>> = source
        .bars()
        .iter()
        .map(|b| b.timestamp + src_step)
        .collect();
    let target_close: Vec<DateTime<Utc>> = target
        .bars()
        .iter()
        .map(|b| b.timestamp + dst_step)
        .collect();
    align_asof(&source_close, values, &target_close, default)
}
