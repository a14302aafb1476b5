//! Runtime configuration types for the core.
//!
//! These are separate from the TOML-deserialized config in `cws_config`;
//! see `conversions` for the mapping.

use std::time::Duration;

/// Echo sampling parameters for one distance sample.
#[derive(Debug, Clone)]
pub struct RangingCfg {
    /// Echo measurements per distance sample.
    pub sample_count: u32,
    /// Pause between measurements so reverberation decays.
    pub settle: Duration,
    /// Bound on waiting for the echo line to be idle before triggering.
    pub idle_timeout: Duration,
    /// Bound on waiting for each echo edge.
    pub echo_timeout: Duration,
}

impl Default for RangingCfg {
    fn default() -> Self {
        Self {
            sample_count: 10,
            settle: Duration::from_millis(250),
            idle_timeout: Duration::from_millis(500),
            echo_timeout: Duration::from_millis(500),
        }
    }
}

/// Consumption-rate model parameters.
#[derive(Debug, Clone)]
pub struct ForecastCfg {
    /// Volume rise in liters above which a reading counts as a refill.
    pub noise_threshold_l: f64,
    /// EWMA time constant of the short-horizon rate, hours.
    pub short_tau_h: f64,
    /// EWMA time constant of the long-horizon rate, hours.
    pub long_tau_h: f64,
    pub short_weight: f64,
    pub long_weight: f64,
    /// Readings and refill events older than this behind the newest reading are dropped.
    pub retention_h: f64,
    /// Blended rates at or below this (L/h) give no forecast.
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
            min_rate_lph: 1e-3,
        }
    }
}

/// Thresholds for status classification.
#[derive(Debug, Clone)]
pub struct AlertCfg {
    pub low_water_pct: f64,
    pub temp_low_c: f64,
    pub temp_high_c: f64,
    /// Consecutive ranging failures before the status becomes a sensor fault.
    pub max_failed_cycles: u32,
}

impl Default for AlertCfg {
    fn default() -> Self {
        Self {
            low_water_pct: 20.0,
            temp_low_c: 0.0,
            temp_high_c: 35.0,
            max_failed_cycles: 3,
        }
    }
}
