use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use cws_core::{ConsumptionForecaster, Forecast, ForecastCfg, VolumeReading};
use proptest::prelude::*;
use rstest::rstest;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn at_hour(h: i64) -> DateTime<Utc> {
    t0() + TimeDelta::hours(h)
}

fn reading(volume_l: f64, h: i64) -> VolumeReading {
    VolumeReading {
        volume_l,
        pct_full: 0.0,
        taken_at: at_hour(h),
    }
}

fn hourly(volumes: &[f64]) -> ConsumptionForecaster {
    let mut f = ConsumptionForecaster::default();
    for (i, &v) in volumes.iter().enumerate() {
        f.ingest(reading(v, i as i64));
    }
    f
}

#[test]
fn refill_restarts_rate_from_refill_reading() {
    let f = hourly(&[10.0, 8.0, 6.0, 20.0, 18.0]);
    let refills: Vec<_> = f.refills().copied().collect();
    assert_eq!(refills.len(), 1);
    assert_eq!(refills[0].at, at_hour(3));
    assert_eq!(refills[0].from_l, 6.0);
    assert_eq!(refills[0].to_l, 20.0);
    assert_eq!(f.window_start(), Some(at_hour(3)));
    assert_eq!(f.readings_in_window(), 2);

    // only 20 -> 18 counts: 2 L/h
    assert!((f.blended_rate_lph().unwrap() - 2.0).abs() < 1e-12);
    assert_eq!(f.forecast_empty_at(), Forecast::EmptyAt(at_hour(4 + 9)));
}

#[test]
fn pre_refill_consumption_does_not_leak() {
    let f = hourly(&[10.0, 6.0, 2.0, 20.0, 19.0]);
    assert!((f.blended_rate_lph().unwrap() - 1.0).abs() < 1e-12);
    assert_eq!(f.forecast_empty_at(), Forecast::EmptyAt(at_hour(4 + 19)));
}

#[test]
fn single_reading_is_unknown() {
    let f = hourly(&[12.0]);
    assert_eq!(f.blended_rate_lph(), None);
    assert_eq!(f.forecast_empty_at(), Forecast::Unknown);
    assert_eq!(f.time_to_empty(), None);
}

#[test]
fn empty_forecaster_is_unknown() {
    let f = ConsumptionForecaster::default();
    assert_eq!(f.forecast_empty_at(), Forecast::Unknown);
    assert_eq!(f.readings_in_window(), 0);
    assert!(f.latest().is_none());
}

#[test]
fn reading_right_after_refill_is_unknown() {
    let f = hourly(&[10.0, 8.0, 20.0]);
    assert_eq!(f.forecast_empty_at(), Forecast::Unknown);
}

#[test]
fn flat_level_is_unknown() {
    let f = hourly(&[15.0, 15.0, 15.0]);
    assert!(f.blended_rate_lph().unwrap() < 1e-9);
    assert_eq!(f.forecast_empty_at(), Forecast::Unknown);
}

fn every_five_minutes(volumes: impl IntoIterator<Item = f64>) -> ConsumptionForecaster {
    let mut f = ConsumptionForecaster::default();
    for (i, v) in volumes.into_iter().enumerate() {
        f.ingest(VolumeReading {
            volume_l: v,
            pct_full: 0.0,
            taken_at: t0() + TimeDelta::minutes(5 * i as i64),
        });
    }
    f
}

#[rstest]
#[case::low_first(0)]
#[case::high_first(1)]
fn jitter_on_a_flat_level_is_not_consumption(#[case] phase: usize) {
    // a day of readings bouncing by a tenth of the noise threshold
    let f = every_five_minutes((0..288).map(|i| if (i + phase) % 2 == 0 { 20.0 } else { 20.0585 }));
    assert_eq!(f.refills().count(), 0);
    assert!(f.blended_rate_lph().unwrap() < 1e-3);
    assert_eq!(f.forecast_empty_at(), Forecast::Unknown);
}

#[test]
fn slow_drain_is_found_under_jitter() {
    let f = every_five_minutes(
        (0..288).map(|i| 20.0 - 0.05 * i as f64 / 12.0 + if i % 2 == 1 { 0.0585 } else { 0.0 }),
    );
    let rate = f.blended_rate_lph().unwrap();
    assert!((rate - 0.05).abs() < 1e-3, "{rate}");
    assert!(matches!(f.forecast_empty_at(), Forecast::EmptyAt(_)));
}

#[test]
fn small_rise_is_noise_not_refill() {
    let f = hourly(&[10.0, 10.3, 9.3]);
    assert_eq!(f.refills().count(), 0);
    assert_eq!(f.window_start(), Some(t0()));
    let rate = f.blended_rate_lph().unwrap();
    assert!(rate > 0.0 && rate < 1.0, "{rate}");
}

#[test]
fn short_rate_reacts_faster_than_long() {
    // 2 L then 4 L per hour: the plain fit says 3, the latest hour says 4
    let f = hourly(&[20.0, 18.0, 14.0]);
    let short = f.short_rate_lph().unwrap();
    let long = f.long_rate_lph().unwrap();
    assert!(3.0 < long && long < short && short < 4.0, "{short} {long}");
    let blended = f.blended_rate_lph().unwrap();
    assert!((blended - (2.0 * short + long) / 3.0).abs() < 1e-12);
}

#[test]
fn out_of_order_and_duplicate_readings_are_ignored() {
    let mut f = hourly(&[10.0, 9.0]);
    let rate = f.blended_rate_lph();
    f.ingest(reading(5.0, 0));
    f.ingest(reading(8.5, 1));
    assert_eq!(f.history().count(), 2);
    assert_eq!(f.blended_rate_lph(), rate);
    assert_eq!(f.latest().unwrap().volume_l, 9.0);
}

#[test]
fn non_finite_volume_is_ignored() {
    let mut f = hourly(&[10.0, 9.0]);
    f.ingest(reading(f64::NAN, 2));
    assert_eq!(f.history().count(), 2);
}

#[test]
fn history_is_pruned_to_retention() {
    let mut f = ConsumptionForecaster::default();
    for day in 0..10 {
        f.ingest(reading(100.0 - day as f64, day * 24));
    }
    // a week behind the newest reading, inclusive
    assert_eq!(f.history().count(), 8);
    assert_eq!(f.history().next().unwrap().taken_at, at_hour(2 * 24));
}

#[test]
fn old_refills_age_out() {
    let cfg = ForecastCfg {
        retention_h: 48.0,
        ..ForecastCfg::default()
    };
    let mut f = ConsumptionForecaster::new(cfg);
    f.ingest(reading(5.0, 0));
    f.ingest(reading(20.0, 1));
    assert_eq!(f.refills().count(), 1);
    f.ingest(reading(18.0, 72));
    assert_eq!(f.refills().count(), 0);
    // rate state survives pruning of the readings that produced it
    assert!(f.blended_rate_lph().is_some());
}

#[test]
fn time_to_empty_from_latest_reading() {
    let f = hourly(&[12.0, 10.0]);
    assert_eq!(f.time_to_empty(), Some(TimeDelta::hours(5)));
}

proptest! {
    #[test]
    fn rates_non_negative_and_forecast_after_latest(
        volumes in proptest::collection::vec(0.0f64..40.0, 1..40),
        gaps in proptest::collection::vec(1i64..600, 40),
    ) {
        let mut f = ConsumptionForecaster::default();
        let mut t = t0();
        for (v, gap) in volumes.iter().zip(gaps.iter()) {
            t += TimeDelta::minutes(*gap);
            f.ingest(VolumeReading { volume_l: *v, pct_full: 0.0, taken_at: t });
        }
        if let Some(rate) = f.blended_rate_lph() {
            prop_assert!(rate >= 0.0);
        }
        if let Forecast::EmptyAt(when) = f.forecast_empty_at() {
            prop_assert!(when >= f.latest().unwrap().taken_at);
        }
    }
}
