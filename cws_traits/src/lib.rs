pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Logic level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[inline]
    pub fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

/// Digital output, e.g. the ranging trigger line.
pub trait OutputLine {
    fn set_output(&mut self, level: Level);
}

/// Digital input, e.g. the echo line. Pull configuration happens when the line is opened.
pub trait InputLine {
    fn read_input(&mut self) -> Level;
}

/// Air sensor. Temperature is always measured; humidity and pressure only
/// when the part has them (a BME280 does, a plain thermistor does not).
pub trait TemperatureSource {
    fn read_temperature_c(&mut self) -> Result<f64, BoxError>;

    /// Relative humidity in percent; `None` when not measured.
    fn read_humidity_pct(&mut self) -> Option<Result<f64, BoxError>> {
        None
    }

    /// Barometric pressure in hPa; `None` when not measured.
    fn read_pressure_hpa(&mut self) -> Option<Result<f64, BoxError>> {
        None
    }
}

/// Single status lamp.
pub trait Indicator {
    fn set(&mut self, on: bool) -> Result<(), BoxError>;
    fn is_on(&self) -> bool;

    fn toggle(&mut self) -> Result<bool, BoxError> {
        let next = !self.is_on();
        self.set(next)?;
        Ok(next)
    }
}

/// Float/hall-effect trigger that fires when the reservoir has run dry.
pub trait WaterOutSensor {
    fn is_water_out(&mut self) -> Result<bool, BoxError>;
}
