//! Appliance status derived from each monitor cycle, and its LED pattern.

use std::fmt;
use std::time::Duration;

use crate::config::AlertCfg;

/// Overall condition, most severe first in the priority order used by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SystemStatus {
    #[default]
    Normal,
    /// Air temperature outside the configured band.
    TemperatureAlert,
    /// Reservoir below the low-water percentage.
    LowWater,
    /// Hall sensor tripped or surface at the empty mark.
    WaterOut,
    /// Ranging failed for too many consecutive cycles.
    SensorFault,
}

impl SystemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SystemStatus::Normal => "normal",
            SystemStatus::TemperatureAlert => "temperature_alert",
            SystemStatus::LowWater => "low_water",
            SystemStatus::WaterOut => "water_out",
            SystemStatus::SensorFault => "sensor_fault",
        }
    }

    pub fn pattern(self) -> BlinkPattern {
        let (on_ms, off_ms) = match self {
            SystemStatus::Normal => (50, 1950),
            SystemStatus::TemperatureAlert => (50, 950),
            SystemStatus::LowWater => (250, 750),
            SystemStatus::WaterOut => (100, 100),
            SystemStatus::SensorFault => (1000, 1000),
        };
        BlinkPattern {
            on: Duration::from_millis(on_ms),
            off: Duration::from_millis(off_ms),
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One LED period: lit for `on`, dark for `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkPattern {
    pub on: Duration,
    pub off: Duration,
}

impl BlinkPattern {
    pub fn period(&self) -> Duration {
        self.on + self.off
    }
}

/// Observations a status is classified from.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusInputs {
    pub sensor_fault: bool,
    pub water_out: bool,
    pub pct_full: Option<f64>,
    pub temperature_c: Option<f64>,
}

pub fn classify(inputs: &StatusInputs, alerts: &AlertCfg) -> SystemStatus {
    if inputs.sensor_fault {
        return SystemStatus::SensorFault;
    }
    if inputs.water_out {
        return SystemStatus::WaterOut;
    }
    if inputs.pct_full.is_some_and(|p| p < alerts.low_water_pct) {
        return SystemStatus::LowWater;
    }
    if inputs
        .temperature_c
        .is_some_and(|t| !(alerts.temp_low_c..=alerts.temp_high_c).contains(&t))
    {
        return SystemStatus::TemperatureAlert;
    }
    SystemStatus::Normal
}
