//! Exit-model contracts through the public API.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use hypolab_core::domain::{Bar, ExitReason, Position};
use hypolab_core::exit::{ExitModel, ExitModelFactory, ExitModelSpec, FixedTpSl, TrailingStop};
use hypolab_core::ConfigurationError;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

fn bar(hours: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: t0() + Duration::hours(hours),
        open,
        high,
        low,
        close,
        volume: 1.0,
    }
}

fn long_at(price: f64) -> Position {
    Position::new(t0(), price, 0)
}

#[test]
fn stop_loss_wins_when_both_levels_touch() {
    let mut model = ExitModelSpec::fixed_tpsl(2.0, 1.0).unwrap().build();
    let decision = model
        .evaluate(&long_at(100.0), &bar(1, 100.0, 103.0, 98.0, 101.0))
        .unwrap();
    assert_eq!(decision.exit_reason, ExitReason::StopLoss);
    assert!((decision.exit_price - 99.0).abs() < 1e-12);
}

#[test]
fn combo_time_exit_at_hour_48_opens_price() {
    let mut model = ExitModelSpec::combo(2.0, 1.0, 48.0).unwrap().build();
    let pos = long_at(100.0);
    for h in 1..48 {
        assert!(model.evaluate(&pos, &bar(h, 100.0, 100.4, 99.6, 100.0)).is_none());
    }
    let decision = model
        .evaluate(&pos, &bar(48, 100.1, 100.4, 99.6, 100.0))
        .unwrap();
    assert_eq!(decision.exit_reason, ExitReason::TimeExit);
    assert_eq!(decision.exit_price, 100.1);
    assert_eq!(decision.exit_timestamp, t0() + Duration::hours(48));
}

#[test]
fn factory_hands_out_fresh_trailing_state() {
    let spec = ExitModelSpec::trailing_stop(2.0).unwrap();
    let pos = long_at(100.0);

    let mut first = spec.create();
    assert!(first.evaluate(&pos, &bar(1, 119.0, 120.0, 119.0, 119.5)).is_none());
    // stop at 120 × 0.98 = 117.6
    assert!(first.evaluate(&pos, &bar(2, 119.0, 119.0, 117.0, 117.5)).is_some());

    // A fresh model starts from the entry price again.
    let mut second = spec.create();
    assert!(second.evaluate(&pos, &bar(1, 100.0, 100.5, 99.0, 100.0)).is_none());
}

#[test]
fn non_positive_parameters_rejected() {
    assert!(matches!(
        ExitModelSpec::fixed_tpsl(0.0, 1.0),
        Err(ConfigurationError::NonPositiveParameter { .. })
    ));
    assert!(ExitModelSpec::fixed_tpsl(2.0, -1.0).is_err());
    assert!(ExitModelSpec::trailing_stop(0.0).is_err());
    assert!(ExitModelSpec::time_based(-4.0).is_err());
    assert!(ExitModelSpec::combo(2.0, 1.0, f64::NAN).is_err());
}

#[test]
fn spec_deserializes_from_flat_table() {
    let spec: ExitModelSpec =
        serde_json::from_str(r#"{"model": "TrailingStop", "trail_pct": 1.5}"#).unwrap();
    assert_eq!(spec, ExitModelSpec::trailing_stop(1.5).unwrap());
    assert_eq!(spec.model_name(), "TrailingStop");
}

#[test]
fn spec_rejects_unknown_model() {
    let err = serde_json::from_str::<ExitModelSpec>(r#"{"model": "AtrComboExit", "atr_mult": 2.0}"#)
        .unwrap_err();
    assert!(err.to_string().contains("AtrComboExit"));
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    /// FixedTPSL always fills exactly at one of its two levels.
    #[test]
    fn fixed_tpsl_fills_at_a_level(
        tp in 0.5..10.0_f64,
        sl in 0.5..10.0_f64,
        high_move in 0.0..15.0_f64,
        low_move in 0.0..15.0_f64,
    ) {
        let model = FixedTpSl::new(tp, sl).unwrap();
        let mut boxed: Box<dyn ExitModel> = Box::new(model);
        let b = bar(1, 100.0, 100.0 + high_move, 100.0 - low_move, 100.0);
        match boxed.evaluate(&long_at(100.0), &b) {
            Some(d) if d.exit_reason == ExitReason::StopLoss => {
                prop_assert!((d.exit_price - model.stop_loss_price(100.0)).abs() < 1e-9);
            }
            Some(d) => {
                prop_assert_eq!(d.exit_reason, ExitReason::TakeProfit);
                prop_assert!(low_move < sl);
                prop_assert!((d.exit_price - model.take_profit_price(100.0)).abs() < 1e-9);
            }
            None => {
                prop_assert!(high_move < tp);
                prop_assert!(low_move < sl);
            }
        }
    }

    /// The trailing stop never fills above the running high.
    #[test]
    fn trailing_exit_below_running_high(
        trail in 0.5..5.0_f64,
        highs in prop::collection::vec(0.0..3.0_f64, 1..40),
        drop in 0.0..10.0_f64,
    ) {
        let mut model = TrailingStop::new(trail).unwrap();
        let pos = long_at(100.0);
        let mut price = 100.0;
        let mut running_high = 100.0_f64;
        for (h, step) in highs.iter().enumerate() {
            price += step;
            running_high = running_high.max(price);
            let b = bar(h as i64 + 1, price, price, price - drop, price - drop / 2.0);
            if let Some(d) = model.evaluate(&pos, &b) {
                prop_assert!(d.exit_price <= running_high);
                prop_assert!((d.exit_price - running_high * (1.0 - trail / 100.0)).abs() < 1e-9);
                break;
            }
        }
    }
}
