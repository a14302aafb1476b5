use cws_config::{MAX_INTERVAL_S, load_file, load_toml};
use rstest::rstest;

const MINIMAL: &str = r#"
[pins]
trigger = 23
echo = 24
led = 25

[reservoir]
radius_cm = 13.65
empty_distance_cm = 37.4
full_distance_cm = 5.4
bucket_capacity_l = 19.375
bucket_count = 2
"#;

#[test]
fn minimal_config_gets_defaults() {
    let cfg = load_toml(MINIMAL).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.ranging.sample_count, 10);
    assert_eq!(cfg.ranging.settle_ms, 250);
    assert_eq!(cfg.forecast.short_weight, 2.0);
    assert_eq!(cfg.forecast.long_weight, 1.0);
    assert_eq!(cfg.schedule.interval_s, 300);
    assert!(cfg.pins.led_sink);
    assert!(cfg.pins.hall.is_none());
    assert!((cfg.reservoir.floor_height_cm - 0.01).abs() < 1e-12);
    assert!((cfg.reservoir.nominal_capacity_l() - 38.75).abs() < 1e-9);
}

#[test]
fn missing_reservoir_is_a_parse_error() {
    let toml = r#"
[pins]
trigger = 23
echo = 24
led = 25
"#;
    let err = load_toml(toml).expect_err("reservoir is mandatory");
    assert!(err.to_string().contains("reservoir"));
}

#[rstest]
#[case("[ranging]\nsample_count = 2", "sample_count must be >= 3")]
#[case("[ranging]\necho_timeout_ms = 0", "echo_timeout_ms must be >= 1")]
#[case("[schedule]\ninterval_s = 0", "interval_s must be >= 1")]
#[case("[alerts]\nlow_water_pct = 120.0", "low_water_pct must be in [0, 100]")]
#[case("[alerts]\ntemp_low_c = 40.0", "temp_low_c must be < alerts.temp_high_c")]
#[case("[alerts]\nmax_failed_cycles = 0", "max_failed_cycles must be >= 1")]
#[case("[forecast]\nretention_h = 12.0", "retention_h must be >=")]
#[case("[forecast]\nshort_weight = 0.0\nlong_weight = 0.0", "weights must be >= 0")]
#[case("[records]\npath = \" \"", "records.path must not be empty")]
#[case("[schedule]\ninterval_s = 604801", "interval_s must be <= 604800")]
#[case("[forecast]\nretention_h = nan", "retention_h must be >=")]
#[case("[forecast]\nmin_rate_lph = nan", "min_rate_lph must be >= 0")]
#[case("[forecast]\nnoise_threshold_l = nan", "noise_threshold_l must be >= 0")]
#[case("[forecast]\nshort_tau_h = nan", "short_tau_h and forecast.long_tau_h must be > 0")]
#[case("[forecast]\nlong_tau_h = inf", "short_tau_h and forecast.long_tau_h must be > 0")]
#[case("[forecast]\nshort_weight = nan", "weights must be >= 0")]
#[case("[alerts]\ntemp_high_c = nan", "temp_low_c must be < alerts.temp_high_c")]
fn rejects_out_of_range_sections(#[case] extra: &str, #[case] needle: &str) {
    let toml = format!("{MINIMAL}\n{extra}\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        err.to_string().contains(needle),
        "expected `{needle}` in `{err}`"
    );
}

#[rstest]
#[case(37.4, 37.4, "empty_distance_cm must be > full_distance_cm")]
#[case(10.0, 20.0, "empty_distance_cm must be > full_distance_cm")]
#[case(37.4, -1.0, "full_distance_cm must be >= 0")]
fn rejects_inverted_reservoir_references(
    #[case] empty: f64,
    #[case] full: f64,
    #[case] needle: &str,
) {
    let toml = format!(
        r#"
[pins]
trigger = 23
echo = 24
led = 25

[reservoir]
radius_cm = 13.65
empty_distance_cm = {empty:?}
full_distance_cm = {full:?}
bucket_capacity_l = 19.375
bucket_count = 2
"#
    );
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(err.to_string().contains(needle), "{err}");
}

#[test]
fn load_file_reports_invalid_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    std::fs::write(&path, format!("{MINIMAL}\n[schedule]\ninterval_s = 0\n")).unwrap();
    let err = load_file(&path).expect_err("invalid");
    assert!(err.to_string().contains("invalid configuration"));
}

#[test]
fn shipped_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../etc/cws_config.toml");
    let cfg = load_file(&path).expect("etc/cws_config.toml should load");
    assert_eq!(cfg.pins.hall, Some(21));
    assert_eq!(cfg.rtc.address, 0x68);
}

#[test]
fn week_long_interval_is_accepted() {
    let toml = format!("{MINIMAL}\n[schedule]\ninterval_s = {MAX_INTERVAL_S}\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    cfg.validate().expect("a week is allowed");
}
