use crate::errors::{FanError, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Thermal zone exposing the SoC temperature on Raspberry Pi class boards
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Source of CPU temperature samples
pub trait SensorReader {
    /// Read the current temperature in degrees Celsius
    fn read(&mut self) -> Result<f64>;
}

impl<S: SensorReader + ?Sized> SensorReader for Box<S> {
    fn read(&mut self) -> Result<f64> {
        (**self).read()
    }
}

/// CPU temperature sensor backed by a thermal zone file
#[derive(Debug, Clone)]
pub struct CpuTempSensor {
    temp_input_path: PathBuf,
}

impl CpuTempSensor {
    /// Create a sensor reading from `temp_input_path`
    pub fn new(temp_input_path: impl Into<PathBuf>) -> Self {
        Self {
            temp_input_path: temp_input_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.temp_input_path
    }

    fn unavailable(&self, reason: impl ToString) -> FanError {
        FanError::SensorUnavailable {
            path: self.temp_input_path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl Default for CpuTempSensor {
    fn default() -> Self {
        Self::new(DEFAULT_THERMAL_ZONE)
    }
}

impl SensorReader for CpuTempSensor {
    fn read(&mut self) -> Result<f64> {
        debug!("Measuring temperature...");

        let temp_content =
            fs::read_to_string(&self.temp_input_path).map_err(|e| self.unavailable(e))?;

        // Temperature is reported in millidegrees Celsius
        let temp_millidegrees: i64 = temp_content.trim().parse().map_err(|_| {
            self.unavailable(format!("not an integer: {:?}", temp_content.trim()))
        })?;

        let temp_celsius = temp_millidegrees as f64 / 1000.0;
        debug!("Measured temperature: {}°C", temp_celsius);

        Ok(temp_celsius)
    }
}
