//! Green candle opening near its low and closing near its high: buying
//! pressure through the whole bar, taken as a continuation entry.
//!
//! Signal when all of:
//! 1. close > open
//! 2. (open − low) / range <= near_threshold
//! 3. (high − close) / range <= near_threshold
//!
//! Zero-range bars never signal.

use crate::domain::{ParameterSet, TimeSeries};

use super::{ratio_param, SignalContext, SignalError, SignalSource};

#[derive(Debug, Clone, Copy, Default)]
pub struct GreenNearLowHigh;

impl SignalSource for GreenNearLowHigh {
    fn name(&self) -> &str {
        "green_near_low_high"
    }

    fn tunables(&self) -> ParameterSet {
        ParameterSet::new().with("near_threshold", 0.10)
    }

    fn generate_signals(
        &self,
        series: &TimeSeries,
        _ctx: &SignalContext<'_>,
        params: &ParameterSet,
    ) -> Result<Vec<bool>, SignalError> {
        let threshold = ratio_param(params, &self.tunables(), "near_threshold")?;
        Ok(series
            .bars()
            .iter()
            .map(|bar| {
                let range = bar.range();
                range > 0.0
                    && bar.is_green()
                    && (bar.open - bar.low) / range <= threshold
                    && (bar.high - bar.close) / range <= threshold
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemorySource;
    use crate::domain::Interval;
    use crate::signals::test_support::ohlc_series;

    #[test]
    fn flags_strong_green_bars_only() {
        let series = ohlc_series(
            "BTCUSDT",
            Interval::H1,
            &[
                (100.0, 110.0, 99.5, 109.5), // strong green
                (100.0, 110.0, 95.0, 109.5), // opens far above low
                (109.0, 110.0, 99.0, 100.0), // red
                (100.0, 100.0, 100.0, 100.0), // zero range
            ],
        );
        let source = InMemorySource::new();
        let ctx = SignalContext::for_series(&source, &series);
        let signals = GreenNearLowHigh
            .generate_signals(&series, &ctx, &ParameterSet::new())
            .unwrap();
        assert_eq!(signals, vec![true, false, false, false]);
    }

    #[test]
    fn threshold_is_tunable() {
        let series = ohlc_series("BTCUSDT", Interval::H1, &[(100.0, 110.0, 95.0, 109.5)]);
        let source = InMemorySource::new();
        let ctx = SignalContext::for_series(&source, &series);
        let loose = ParameterSet::new().with("near_threshold", 0.5);
        let signals = GreenNearLowHigh
            .generate_signals(&series, &ctx, &loose)
            .unwrap();
        assert_eq!(signals, vec![true]);
    }

    #[test]
    fn negative_threshold_rejected() {
        let series = ohlc_series("BTCUSDT", Interval::H1, &[(100.0, 110.0, 95.0, 109.5)]);
        let source = InMemorySource::new();
        let ctx = SignalContext::for_series(&source, &series);
        let bad = ParameterSet::new().with("near_threshold", -0.1);
        assert!(GreenNearLowHigh
            .generate_signals(&series, &ctx, &bad)
            .is_err());
    }
}
