//! Cross-asset lead: enter the traded symbol when a leader symbol's fast EMA
//! crosses above its slow EMA, while the leader trades above a long EMA on
//! the trend interval.
//!
//! Both leader series come from the signal context, so they cover the same
//! years as the traded series. Alignment uses bar close times: a leader bar
//! only counts once it has closed. The traded series gets one signal on the
//! first bar that can see each leader cross.

use crate::data::align_closed;
use crate::domain::{Interval, ParameterSet, TimeSeries};

use super::{ema, span_param, SignalContext, SignalError, SignalSource};

#[derive(Debug, Clone, PartialEq)]
pub struct CrossAssetLead {
    pub leader: String,
    pub leader_interval: Interval,
    pub trend_interval: Interval,
}

impl Default for CrossAssetLead {
    fn default() -> Self {
        Self {
            leader: "BTCUSDT".to_string(),
            leader_interval: Interval::H4,
            trend_interval: Interval::D1,
        }
    }
}

impl CrossAssetLead {
    /// Cross-up flags on the leader's own bars.
    fn leader_crosses(closes: &[f64], fast: usize, slow: usize) -> Vec<bool> {
        let fast_ema = ema(closes, fast);
        let slow_ema = ema(closes, slow);
        let mut prev_above = false;
        fast_ema
            .iter()
            .zip(&slow_ema)
            .map(|(f, s)| {
                let above = f > s;
                let cross = above && !prev_above;
                prev_above = above;
                cross
            })
            .collect()
    }
}

impl SignalSource for CrossAssetLead {
    fn name(&self) -> &str {
        "cross_asset_lead"
    }

    fn tunables(&self) -> ParameterSet {
        ParameterSet::new()
            .with("ema_fast", 9.0)
            .with("ema_slow", 21.0)
            .with("ema_trend", 200.0)
    }

    fn generate_signals(
        &self,
        series: &TimeSeries,
        ctx: &SignalContext<'_>,
        params: &ParameterSet,
    ) -> Result<Vec<bool>, SignalError> {
        let defaults = self.tunables();
        let fast = span_param(params, &defaults, "ema_fast")?;
        let slow = span_param(params, &defaults, "ema_slow")?;
        let trend_span = span_param(params, &defaults, "ema_trend")?;
        if fast >= slow {
            return Err(SignalError::InvalidTunable {
                name: "ema_fast".into(),
                reason: format!("fast span {fast} must be below slow span {slow}"),
            });
        }

        let leader = ctx.load_data(&self.leader, self.leader_interval)?;
        let trend = ctx.load_data(&self.leader, self.trend_interval)?;

        let crosses = Self::leader_crosses(&leader.closes(), fast, slow);

        let trend_closes = trend.closes();
        let bull: Vec<bool> = trend_closes
            .iter()
            .zip(ema(&trend_closes, trend_span))
            .map(|(&c, e)| c > e)
            .collect();
        let bull_on_leader = align_closed(&trend, &bull, &leader, false)?;

        let lead: Vec<bool> = crosses
            .iter()
            .zip(&bull_on_leader)
            .map(|(&c, &b)| c && b)
            .collect();

        let aligned = align_closed(&leader, &lead, series, false)?;
        let mut prev = false;
        Ok(aligned
            .into_iter()
            .map(|v| {
                let edge = v && !prev;
                prev = v;
                edge
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemorySource;
    use crate::signals::test_support::ohlc_series;

    fn flat_then_rising(n_flat: usize, n_rise: usize) -> Vec<(f64, f64, f64, f64)> {
        let mut rows = vec![(100.0, 100.5, 99.5, 100.0); n_flat];
        for i in 0..n_rise {
            let c = 105.0 + i as f64;
            rows.push((c - 1.0, c + 0.5, c - 1.5, c));
        }
        rows
    }

    fn params() -> ParameterSet {
        ParameterSet::new()
            .with("ema_fast", 2.0)
            .with("ema_slow", 4.0)
            .with("ema_trend", 3.0)
    }

    #[test]
    fn single_entry_after_leader_cross_closes() {
        // 4h leader: flat for 3 days, then rising from bar 18 (2024-01-04 00:00).
        let leader_4h = ohlc_series("BTCUSDT", Interval::H4, &flat_then_rising(18, 12));
        let daily: Vec<(f64, f64, f64, f64)> = (0..10)
            .map(|d| {
                let c = 90.0 + 10.0 * d as f64;
                (c, c + 1.0, c - 1.0, c)
            })
            .collect();
        let leader_1d = ohlc_series("BTCUSDT", Interval::D1, &daily);
        let traded = ohlc_series("ETHUSDT", Interval::H1, &vec![(10.0, 10.5, 9.5, 10.0); 120]);

        let source = InMemorySource::new()
            .with_series(&leader_4h)
            .with_series(&leader_1d);
        let ctx = SignalContext::for_series(&source, &traded);
        let signals = CrossAssetLead::default()
            .generate_signals(&traded, &ctx, &params())
            .unwrap();

        assert_eq!(signals.len(), 120);
        // The 4h bar opening 01-04 00:00 closes at 04:00; the first hourly bar
        // closing then opens at 03:00 (index 75).
        let hits: Vec<usize> = (0..120).filter(|&i| signals[i]).collect();
        assert_eq!(hits, vec![75]);
    }

    #[test]
    fn bearish_trend_blocks_cross() {
        let leader_4h = ohlc_series("BTCUSDT", Interval::H4, &flat_then_rising(18, 12));
        let daily: Vec<(f64, f64, f64, f64)> = (0..10)
            .map(|d| {
                let c = 200.0 - 10.0 * d as f64;
                (c, c + 1.0, c - 1.0, c)
            })
            .collect();
        let leader_1d = ohlc_series("BTCUSDT", Interval::D1, &daily);
        let traded = ohlc_series("ETHUSDT", Interval::H1, &vec![(10.0, 10.5, 9.5, 10.0); 120]);

        let source = InMemorySource::new()
            .with_series(&leader_4h)
            .with_series(&leader_1d);
        let ctx = SignalContext::for_series(&source, &traded);
        let signals = CrossAssetLead::default()
            .generate_signals(&traded, &ctx, &params())
            .unwrap();
        assert!(signals.iter().all(|&s| !s));
    }

    #[test]
    fn missing_leader_data_is_an_error() {
        let traded = ohlc_series("ETHUSDT", Interval::H1, &vec![(10.0, 10.5, 9.5, 10.0); 5]);
        let source = InMemorySource::new();
        let ctx = SignalContext::for_series(&source, &traded);
        let err = CrossAssetLead::default()
            .generate_signals(&traded, &ctx, &ParameterSet::new())
            .unwrap_err();
        assert!(matches!(err, SignalError::Data(ref e) if e.is_missing()));
    }

    #[test]
    fn fast_must_be_below_slow() {
        let traded = ohlc_series("ETHUSDT", Interval::H1, &vec![(10.0, 10.5, 9.5, 10.0); 5]);
        let source = InMemorySource::new();
        let ctx = SignalContext::for_series(&source, &traded);
        let p = ParameterSet::new().with("ema_fast", 21.0).with("ema_slow", 9.0);
        assert!(matches!(
            CrossAssetLead::default().generate_signals(&traded, &ctx, &p),
            Err(SignalError::InvalidTunable { .. })
        ));
    }
}
