#![no_main]
use chrono::{DateTime, TimeDelta};
use cws_core::{ConsumptionForecaster, ForecastCfg, VolumeReading};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|steps: Vec<(i32, f64)>| {
    let mut fc = ConsumptionForecaster::new(ForecastCfg::default());
    let mut at = DateTime::UNIX_EPOCH;
    for (secs, volume_l) in steps {
        let Some(next) = at.checked_add_signed(TimeDelta::seconds(i64::from(secs))) else {
            break;
        };
        at = next;
        fc.ingest(VolumeReading {
            volume_l,
            pct_full: 0.0,
            taken_at: at,
        });
        // Out-of-order, NaN and huge readings must not panic
        let _ = fc.forecast_empty_at();
        let _ = fc.time_to_empty();
    }
});
