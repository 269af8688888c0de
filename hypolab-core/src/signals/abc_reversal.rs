//! A-B-C correction reversal inside an uptrend.
//!
//! Pattern on pivot highs (PH) and pivot lows (PL):
//!
//! ```text
//! PH0 ─→ PL0   wave A: drop from a high
//! PL0 ─→ PH1   wave B: bounce, PH1 < PH0
//! PH1 ─→ C     wave C: drop of at least c_depth_min × |A| from PH1
//! ```
//!
//! A bar is a pivot when its high (low) is the max (min) of the
//! `pivot_window` bars on each side. A pivot at `c` is only known once bar
//! `c + pivot_window` has closed, so the signal is placed there. Signals are
//! gated by close > EMA(ema_trend).

use crate::domain::{Bar, ParameterSet, TimeSeries};

use super::{ema, ratio_param, span_param, SignalContext, SignalError, SignalSource};

#[derive(Debug, Clone, Copy, Default)]
pub struct AbcReversal;

/// Pivot high and pivot low indices, ascending.
pub fn find_pivots(bars: &[Bar], window: usize) -> (Vec<usize>, Vec<usize>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    if bars.len() < 2 * window + 1 {
        return (highs, lows);
    }
    for i in window..bars.len() - window {
        let neighborhood = &bars[i - window..=i + window];
        let max_high = neighborhood
            .iter()
            .map(|b| b.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let min_low = neighborhood
            .iter()
            .map(|b| b.low)
            .fold(f64::INFINITY, f64::min);
        if bars[i].high == max_high {
            highs.push(i);
        }
        if bars[i].low == min_low {
            lows.push(i);
        }
    }
    (highs, lows)
}

/// Most recent index in `sorted` strictly before `before`.
fn last_before(sorted: &[usize], before: usize) -> Option<usize> {
    let n = sorted.partition_point(|&i| i < before);
    n.checked_sub(1).map(|k| sorted[k])
}

/// Indices of C pivots completing an A-B-C pattern.
pub fn abc_pivots(bars: &[Bar], window: usize, c_depth_min: f64) -> Vec<usize> {
    let (pivot_highs, pivot_lows) = find_pivots(bars, window);
    let mut out = Vec::new();

    for &c in &pivot_lows {
        let c_val = bars[c].low;
        let Some(ph1) = last_before(&pivot_highs, c) else {
            continue;
        };
        let ph1_val = bars[ph1].high;
        if ph1_val - c_val <= 0.0 {
            continue;
        }
        let Some(pl0) = last_before(&pivot_lows, ph1) else {
            continue;
        };
        let Some(ph0) = last_before(&pivot_highs, pl0) else {
            continue;
        };
        let pl0_val = bars[pl0].low;
        let ph0_val = bars[ph0].high;

        let a_size = ph0_val - pl0_val;
        if a_size <= 0.0 || ph1_val >= ph0_val {
            continue;
        }
        if ph1_val - c_val < a_size * c_depth_min {
            continue;
        }
        out.push(c);
    }
    out
}

impl SignalSource for AbcReversal {
    fn name(&self) -> &str {
        "abc_reversal"
    }

    fn tunables(&self) -> ParameterSet {
        ParameterSet::new()
            .with("pivot_window", 2.0)
            .with("c_depth_min", 0.30)
            .with("ema_trend", 200.0)
    }

    fn generate_signals(
        &self,
        series: &TimeSeries,
        _ctx: &SignalContext<'_>,
        params: &ParameterSet,
    ) -> Result<Vec<bool>, SignalError> {
        let defaults = self.tunables();
        let window = span_param(params, &defaults, "pivot_window")?;
        let c_depth_min = ratio_param(params, &defaults, "c_depth_min")?;
        let trend_span = span_param(params, &defaults, "ema_trend")?;

        let bars = series.bars();
        let closes = series.closes();
        let trend = ema(&closes, trend_span);

        let mut signals = vec![false; bars.len()];
        for c in abc_pivots(bars, window, c_depth_min) {
            let at = c + window;
            if at < bars.len() && closes[at] > trend[at] {
                signals[at] = true;
            }
        }
        Ok(signals)
    }
}
