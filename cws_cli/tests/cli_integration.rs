use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid TOML config for the sim backend; records land in the tempdir
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let records = dir.path().join("log.csv");
    let toml = format!(
        r#"
[pins]
# pins are unused in sim backend but must be present
trigger = 23
echo = 24
led = 25
hall = 21

[ranging]
sample_count = 3
settle_ms = 0
idle_timeout_ms = 20
echo_timeout_ms = 20

[reservoir]
radius_cm = 13.65
empty_distance_cm = 37.4
full_distance_cm = 5.4
bucket_capacity_l = 19.375
bucket_count = 2

[records]
path = '{}'
"#,
        records.display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["estimate", "--distance-cm", "21.4"], 0, "% full", "stdout")]
#[case(&["estimate"], 2, "required", "stderr")]
#[case(&["measure"], 0, "status", "stdout")]
#[case(&["measure", "--samples", "2"], 2, "invalid value", "stderr")]
#[case(&["run", "--cycles", "2", "--interval-s", "1"], 0, "Stopped after 2 cycles", "stdout")]
#[case(&["run", "--cycles", "1", "--interval-s", "18446744073709551615"], 2, "invalid value", "stderr")]
#[case(&["rtc", "show"], 0, "RTC", "stdout")]
#[case(&["self-check"], 0, "OK", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("cws").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn measure_appends_csv_records_under_one_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    for _ in 0..2 {
        Command::cargo_bin("cws")
            .unwrap()
            .arg("--config")
            .arg(&cfg)
            .arg("measure")
            .env("CWS_TEST_SIM_DISTANCE_CM", "21.4")
            .assert()
            .success();
    }

    let text = fs::read_to_string(dir.path().join("log.csv")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3, "csv was: {text}");
    assert!(lines[0].starts_with(
        "timestamp,temperature_c,humidity_pct,pressure_hpa,distance_cm,volume_l"
    ));
    assert!(lines[0].contains(",water_out,refill_added_l,rate_lph,"));
    assert_eq!(lines.iter().filter(|l| l.starts_with("timestamp")).count(), 1);
    for row in &lines[1..] {
        assert_eq!(row.split(',').count(), 12, "row: {row}");
        assert!(row.ends_with("normal") || row.ends_with("low_water"), "row: {row}");
    }
}

#[rstest]
fn cli_reports_invalid_reservoir() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(
        &cfg,
        r#"
[pins]
trigger = 23
echo = 24
led = 25

[reservoir]
radius_cm = 13.65
empty_distance_cm = 5.4
full_distance_cm = 37.4
bucket_capacity_l = 19.375
bucket_count = 2
"#,
    )
    .unwrap();

    Command::cargo_bin("cws")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("estimate")
        .arg("--distance-cm")
        .arg("10")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "What happened: Configuration is invalid",
        ));
}

#[rstest]
fn missing_config_file_is_explained() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("cws")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not be read"));
}
