#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the watering-reservoir monitor.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Only `[pins]` and `[reservoir]` are mandatory; every other section has
//!   defaults suited to a single HC-SR04 over a bucket reservoir.
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Pins {
    pub trigger: u8,
    pub echo: u8,
    pub led: u8,
    /// Hall-effect "water out" sensor; absent when not fitted.
    #[serde(default)]
    pub hall: Option<u8>,
    /// LED wired so the pin sinks current (on = low).
    #[serde(default = "default_true")]
    pub led_sink: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RangingCfg {
    /// Echo measurements per distance sample
    pub sample_count: u32,
    /// Pause between measurements so reverberation dies down (ms)
    pub settle_ms: u64,
    /// Max wait for the echo line to be idle before triggering (ms)
    pub idle_timeout_ms: u64,
    /// Max wait for each echo edge (ms)
    pub echo_timeout_ms: u64,
}

impl Default for RangingCfg {
    fn default() -> Self {
        Self {
            sample_count: 10,
            settle_ms: 250,
            idle_timeout_ms: 500,
            echo_timeout_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReservoirCfg {
    pub radius_cm: f64,
    /// Sensor-to-surface distance when the reservoir counts as empty
    pub empty_distance_cm: f64,
    /// Sensor-to-surface distance when full
    pub full_distance_cm: f64,
    pub bucket_capacity_l: f64,
    pub bucket_count: u32,
    /// Water height reported when the surface is at or beyond the empty mark
    #[serde(default = "default_floor_height")]
    pub floor_height_cm: f64,
}

fn default_floor_height() -> f64 {
    0.01
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ForecastCfg {
    /// Volume rise (liters) that counts as a refill rather than noise
    pub noise_threshold_l: f64,
    /// Time constant of the short-horizon rate (hours)
    pub short_tau_h: f64,
    /// Time constant of the long-horizon rate (hours)
    pub long_tau_h: f64,
    pub short_weight: f64,
    pub long_weight: f64,
    /// History kept behind the newest reading (hours)
    pub retention_h: f64,
    /// Below this blended rate (L/h) the forecast is unknown
    pub min_rate_lph: f64,
}

impl Default for ForecastCfg {
    fn default() -> Self {
        Self {
            noise_threshold_l: 0.5,
            short_tau_h: 24.0,
            long_tau_h: 168.0,
            short_weight: 2.0,
            long_weight: 1.0,
            retention_h: 168.0,
            min_rate_lph: 0.001,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Schedule {
    /// Seconds between measurement cycles
    pub interval_s: u64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self { interval_s: 300 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Alerts {
    pub low_water_pct: f64,
    pub temp_low_c: f64,
    pub temp_high_c: f64,
    /// Consecutive failed ranging cycles before the status turns to sensor fault
    pub max_failed_cycles: u32,
}

impl Default for Alerts {
    fn default() -> Self {
        Self {
            low_water_pct: 20.0,
            temp_low_c: 0.0,
            temp_high_c: 35.0,
            max_failed_cycles: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TemperatureCfg {
    /// IIO channel file reporting milli-degrees Celsius
    pub iio_path: Option<String>,
    /// Used when no sensor is configured or a read fails
    pub fallback_c: f64,
}

impl Default for TemperatureCfg {
    fn default() -> Self {
        Self {
            iio_path: None,
            fallback_c: 20.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RtcCfg {
    pub enabled: bool,
    pub i2c_bus: u8,
    pub address: u16,
}

impl Default for RtcCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            i2c_bus: 1,
            address: 0x68,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Records {
    /// Append-only CSV measurement log
    pub path: String,
}

impl Default for Records {
    fn default() -> Self {
        Self {
            path: "cws_log.csv".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub ranging: RangingCfg,
    pub reservoir: ReservoirCfg,
    #[serde(default)]
    pub forecast: ForecastCfg,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default)]
    pub alerts: Alerts,
    #[serde(default)]
    pub temperature: TemperatureCfg,
    #[serde(default)]
    pub rtc: RtcCfg,
    #[serde(default)]
    pub records: Records,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {e}", path.display()))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {e}", path.display()))?;
    cfg.validate()
        .map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    Ok(cfg)
}

impl ReservoirCfg {
    /// Rated capacity from the bucket count.
    pub fn nominal_capacity_l(&self) -> f64 {
        self.bucket_capacity_l * f64::from(self.bucket_count)
    }
}

/// Longest accepted measurement interval, in seconds.
pub const MAX_INTERVAL_S: u64 = 7 * 24 * 3600;

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Ranging
        if self.ranging.sample_count < 3 {
            eyre::bail!("ranging.sample_count must be >= 3");
        }
        if self.ranging.sample_count > 100 {
            eyre::bail!("ranging.sample_count is unreasonably large (>100)");
        }
        if self.ranging.idle_timeout_ms == 0 {
            eyre::bail!("ranging.idle_timeout_ms must be >= 1");
        }
        if self.ranging.echo_timeout_ms == 0 {
            eyre::bail!("ranging.echo_timeout_ms must be >= 1");
        }
        if self.ranging.settle_ms > 10_000 {
            eyre::bail!("ranging.settle_ms is unreasonably large (>10s)");
        }

        // Reservoir
        let r = &self.reservoir;
        if !(r.radius_cm.is_finite() && r.radius_cm > 0.0) {
            eyre::bail!("reservoir.radius_cm must be > 0");
        }
        if !(r.full_distance_cm.is_finite() && r.full_distance_cm >= 0.0) {
            eyre::bail!("reservoir.full_distance_cm must be >= 0");
        }
        if !(r.empty_distance_cm.is_finite() && r.empty_distance_cm > r.full_distance_cm) {
            eyre::bail!("reservoir.empty_distance_cm must be > full_distance_cm");
        }
        if !(r.floor_height_cm.is_finite() && r.floor_height_cm > 0.0) {
            eyre::bail!("reservoir.floor_height_cm must be > 0");
        }
        if r.bucket_count == 0 {
            eyre::bail!("reservoir.bucket_count must be >= 1");
        }
        if !(r.bucket_capacity_l.is_finite() && r.bucket_capacity_l > 0.0) {
            eyre::bail!("reservoir.bucket_capacity_l must be > 0");
        }

        // Forecast; every check must also reject NaN
        let f = &self.forecast;
        if !(f.noise_threshold_l.is_finite() && f.noise_threshold_l >= 0.0) {
            eyre::bail!("forecast.noise_threshold_l must be >= 0");
        }
        if !(f.short_tau_h.is_finite() && f.short_tau_h > 0.0)
            || !(f.long_tau_h.is_finite() && f.long_tau_h > 0.0)
        {
            eyre::bail!("forecast.short_tau_h and forecast.long_tau_h must be > 0");
        }
        if !(f.short_weight.is_finite() && f.short_weight >= 0.0)
            || !(f.long_weight.is_finite() && f.long_weight >= 0.0)
            || f.short_weight + f.long_weight <= 0.0
        {
            eyre::bail!("forecast weights must be >= 0 and not both zero");
        }
        if !(f.retention_h.is_finite() && f.retention_h >= f.short_tau_h) {
            eyre::bail!("forecast.retention_h must be >= forecast.short_tau_h");
        }
        if !(f.min_rate_lph.is_finite() && f.min_rate_lph >= 0.0) {
            eyre::bail!("forecast.min_rate_lph must be >= 0");
        }

        // Schedule
        if self.schedule.interval_s == 0 {
            eyre::bail!("schedule.interval_s must be >= 1");
        }
        if self.schedule.interval_s > MAX_INTERVAL_S {
            eyre::bail!("schedule.interval_s must be <= {MAX_INTERVAL_S} (one week)");
        }

        // Alerts
        if !(0.0..=100.0).contains(&self.alerts.low_water_pct) {
            eyre::bail!("alerts.low_water_pct must be in [0, 100]");
        }
        if !(self.alerts.temp_low_c.is_finite()
            && self.alerts.temp_high_c.is_finite()
            && self.alerts.temp_low_c < self.alerts.temp_high_c)
        {
            eyre::bail!("alerts.temp_low_c must be < alerts.temp_high_c");
        }
        if self.alerts.max_failed_cycles == 0 {
            eyre::bail!("alerts.max_failed_cycles must be >= 1");
        }

        // Temperature
        if !self.temperature.fallback_c.is_finite() {
            eyre::bail!("temperature.fallback_c must be a finite number");
        }

        // Records
        if self.records.path.trim().is_empty() {
            eyre::bail!("records.path must not be empty");
        }

        Ok(())
    }
}
