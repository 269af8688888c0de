use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, TimeZone, Utc};
use hypolab_core::domain::EquityPoint;
use hypolab_runner::metrics::{max_drawdown_pct, profit_factor, PROFIT_FACTOR_CAP};
use hypolab_runner::ParamGrid;
use proptest::prelude::*;

fn arb_axes() -> impl Strategy<Value = BTreeMap<String, Vec<f64>>> {
    prop::collection::btree_map(
        "[a-d]{1,2}",
        prop::collection::vec(-50.0..50.0_f64, 1..4),
        0..4,
    )
}

proptest! {
    /// The grid enumerates the full cartesian product exactly once.
    #[test]
    fn grid_is_full_distinct_product(axes in arb_axes()) {
        let grid = ParamGrid::new(axes.clone()).unwrap();
        let expected: usize = axes
            .values()
            .map(|v| v.iter().map(|x| x.to_bits()).collect::<BTreeSet<_>>().len())
            .product();

        let candidates = grid.candidates();
        prop_assert_eq!(candidates.len(), expected);
        prop_assert_eq!(grid.size(), expected);

        let labels: BTreeSet<String> = candidates.iter().map(|c| c.label()).collect();
        prop_assert_eq!(labels.len(), expected);
        for c in &candidates {
            prop_assert_eq!(c.len(), axes.len());
        }
    }

    /// Enumeration order does not depend on how the input was ordered.
    #[test]
    fn grid_order_ignores_input_order(axes in arb_axes()) {
        let reversed: BTreeMap<String, Vec<f64>> = axes
            .iter()
            .map(|(k, v)| (k.clone(), v.iter().rev().copied().collect()))
            .collect();
        let a = ParamGrid::new(axes).unwrap().candidates();
        let b = ParamGrid::new(reversed).unwrap().candidates();
        prop_assert_eq!(a, b);
    }

    /// Drawdown is a percentage of the peak, never negative.
    #[test]
    fn drawdown_is_bounded(returns in prop::collection::vec(-0.99..3.0_f64, 0..50)) {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let equity: Vec<EquityPoint> = returns
            .iter()
            .enumerate()
            .map(|(i, &r)| EquityPoint {
                timestamp: t0 + Duration::hours(i as i64),
                cumulative_return: r,
            })
            .collect();
        let dd = max_drawdown_pct(&equity);
        prop_assert!((0.0..=100.0).contains(&dd));
    }

    #[test]
    fn profit_factor_is_capped(returns in prop::collection::vec(-10.0..10.0_f64, 0..30)) {
        let pf = profit_factor(&returns);
        prop_assert!(pf >= 0.0);
        prop_assert!(pf <= PROFIT_FACTOR_CAP);
    }
}
