use std::path::{Path, PathBuf};

use cws_traits::{BoxError, TemperatureSource};
use tracing::{debug, trace};

use crate::error::{HwError, Result};

/// Channel file names the kernel bme280 driver exposes next to `in_temp_input`.
pub const HUMIDITY_CHANNEL: &str = "in_humidityrelative_input";
pub const PRESSURE_CHANNEL: &str = "in_pressure_input";

/// Air readings from Linux IIO channel files (e.g. the kernel bme280
/// driver). Temperature is in milli-degrees Celsius, relative humidity in
/// milli-percent and pressure in kPa.
#[derive(Debug, Clone)]
pub struct IioThermometer {
    path: PathBuf,
    humidity: Option<PathBuf>,
    pressure: Option<PathBuf>,
}

fn read_scaled(path: &Path, scale: f64) -> Result<f64> {
    let text = std::fs::read_to_string(path)?;
    let raw: f64 = text
        .trim()
        .parse()
        .map_err(|e| HwError::InvalidReading(format!("{}: {e}", path.display())))?;
    if !raw.is_finite() {
        return Err(HwError::InvalidReading(format!("{}: {raw}", path.display())));
    }
    Ok(raw * scale)
}

impl IioThermometer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            humidity: None,
            pressure: None,
        }
    }

    pub fn with_humidity(mut self, path: impl Into<PathBuf>) -> Self {
        self.humidity = Some(path.into());
        self
    }

    pub fn with_pressure(mut self, path: impl Into<PathBuf>) -> Self {
        self.pressure = Some(path.into());
        self
    }

    /// Pick up humidity and pressure channels that sit in the same device
    /// directory as the temperature channel.
    pub fn with_siblings(mut self) -> Self {
        let Some(dir) = self.path.parent().map(Path::to_path_buf) else {
            return self;
        };
        let humidity = dir.join(HUMIDITY_CHANNEL);
        if humidity.is_file() {
            debug!(path = %humidity.display(), "iio humidity channel");
            self.humidity = Some(humidity);
        }
        let pressure = dir.join(PRESSURE_CHANNEL);
        if pressure.is_file() {
            debug!(path = %pressure.display(), "iio pressure channel");
            self.pressure = Some(pressure);
        }
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_c(&self) -> Result<f64> {
        let c = read_scaled(&self.path, 1e-3)?;
        trace!(temp_c = c, "iio temperature");
        Ok(c)
    }

    /// Relative humidity in percent, if a channel is configured.
    pub fn read_humidity(&self) -> Option<Result<f64>> {
        self.humidity.as_deref().map(|p| read_scaled(p, 1e-3))
    }

    /// Pressure in hPa, if a channel is configured.
    pub fn read_pressure(&self) -> Option<Result<f64>> {
        self.pressure.as_deref().map(|p| read_scaled(p, 10.0))
    }
}

impl TemperatureSource for IioThermometer {
    fn read_temperature_c(&mut self) -> std::result::Result<f64, BoxError> {
        Ok(self.read_c()?)
    }

    fn read_humidity_pct(&mut self) -> Option<std::result::Result<f64, BoxError>> {
        self.read_humidity().map(|r| r.map_err(Into::into))
    }

    fn read_pressure_hpa(&mut self) -> Option<std::result::Result<f64, BoxError>> {
        self.read_pressure().map(|r| r.map_err(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parses_millidegrees() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in_temp_input");
        fs::write(&path, "23450\n").unwrap();
        let mut t = IioThermometer::new(&path);
        let c = t.read_temperature_c().unwrap();
        assert!((c - 23.45).abs() < 1e-9);
    }

    #[test]
    fn negative_values_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in_temp_input");
        fs::write(&path, "-5250").unwrap();
        let c = IioThermometer::new(&path).read_c().unwrap();
        assert!((c + 5.25).abs() < 1e-9);
    }

    #[test]
    fn garbage_is_an_invalid_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in_temp_input");
        fs::write(&path, "warm").unwrap();
        let err = IioThermometer::new(&path).read_c().unwrap_err();
        assert!(matches!(err, HwError::InvalidReading(_)));
    }

    #[test]
    fn missing_file_is_io() {
        let err = IioThermometer::new("/nonexistent/in_temp_input")
            .read_c()
            .unwrap_err();
        assert!(matches!(err, HwError::Io(_)));
    }

    #[test]
    fn bme280_siblings_give_humidity_and_pressure() {
        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join("in_temp_input");
        fs::write(&temp, "21500\n").unwrap();
        fs::write(dir.path().join(HUMIDITY_CHANNEL), "48250\n").unwrap();
        fs::write(dir.path().join(PRESSURE_CHANNEL), "101.325000000\n").unwrap();

        let mut t = IioThermometer::new(&temp).with_siblings();
        assert!((t.read_temperature_c().unwrap() - 21.5).abs() < 1e-9);
        let rh = t.read_humidity_pct().unwrap().unwrap();
        assert!((rh - 48.25).abs() < 1e-9);
        let hpa = t.read_pressure_hpa().unwrap().unwrap();
        assert!((hpa - 1013.25).abs() < 1e-9);
    }

    #[test]
    fn temperature_only_part_has_no_humidity_or_pressure() {
        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join("in_temp_input");
        fs::write(&temp, "19000").unwrap();
        let mut t = IioThermometer::new(&temp).with_siblings();
        assert!(t.read_humidity_pct().is_none());
        assert!(t.read_pressure_hpa().is_none());
    }

    #[test]
    fn unreadable_humidity_is_an_error_not_absent() {
        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join("in_temp_input");
        fs::write(&temp, "19000").unwrap();
        let t = IioThermometer::new(&temp).with_humidity(dir.path().join("gone"));
        assert!(matches!(t.read_humidity(), Some(Err(HwError::Io(_)))));
    }
}
