//! Human and JSON renderings of command results on stdout.

use chrono::SecondsFormat;
use cws_core::{LogRecord, VolumeEstimator, VolumeReading};
use cws_traits::Timestamp;
use serde_json::{Value, json};

fn ts(t: &Timestamp) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn record_json(r: &LogRecord) -> Value {
    json!({
        "timestamp": ts(&r.timestamp),
        "temperature_c": r.temperature_c,
        "humidity_pct": r.humidity_pct,
        "pressure_hpa": r.pressure_hpa,
        "distance_cm": r.distance_cm,
        "volume_l": r.volume_l,
        "pct_full": r.pct_full,
        "water_out": r.water_out,
        "refill_added_l": r.refill_added_l,
        "rate_lph": r.rate_lph,
        "forecast_empty_at": r.forecast_empty_at.as_ref().map(ts),
        "status": r.status.as_str(),
    })
}

pub fn print_record(r: &LogRecord, json: bool) {
    if json {
        println!("{}", record_json(r));
        return;
    }
    let forecast = match (&r.forecast_empty_at, r.rate_lph) {
        (Some(at), Some(rate)) => format!("empty at {} ({rate:.3} L/h)", ts(at)),
        (None, Some(rate)) => format!("unknown ({rate:.3} L/h)"),
        _ => "unknown".to_string(),
    };
    let mut air = format!("{:.1} °C", r.temperature_c);
    if let Some(h) = r.humidity_pct {
        air.push_str(&format!(" {h:.0}% RH"));
    }
    if let Some(p) = r.pressure_hpa {
        air.push_str(&format!(" {p:.0} hPa"));
    }
    let refill = r
        .refill_added_l
        .map(|l| format!("  refilled +{l:.1} L"))
        .unwrap_or_default();
    println!(
        "{}  {:.1} L ({:.1}% full)  distance {:.2} cm  air {air}  status {}  forecast {}{refill}",
        ts(&r.timestamp),
        r.volume_l,
        r.pct_full,
        r.distance_cm,
        r.status,
        forecast
    );
}

pub fn print_estimate(distance_cm: f64, reading: &VolumeReading, est: &VolumeEstimator, json: bool) {
    let g = est.geometry();
    if json {
        println!(
            "{}",
            json!({
                "distance_cm": distance_cm,
                "volume_l": reading.volume_l,
                "pct_full": reading.pct_full,
                "max_volume_l": g.max_volume_l(),
                "nominal_capacity_l": g.nominal_capacity_l(),
            })
        );
    } else {
        println!(
            "{:.2} L ({:.1}% full) at {distance_cm:.2} cm; usable {:.2} L, rated {:.2} L",
            reading.volume_l,
            reading.pct_full,
            g.max_volume_l(),
            g.nominal_capacity_l()
        );
    }
}

pub fn print_value(json: bool, value: Value, human: impl FnOnce() -> String) {
    if json {
        println!("{value}");
    } else {
        println!("{}", human());
    }
}
