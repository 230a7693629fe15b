//! Startup settings loaded from the JSON settings file

use crate::errors::{FanError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default settings file, relative to the working directory
pub const DEFAULT_SETTINGS_PATH: &str = "settings.json";

/// Immutable controller settings, read once at startup.
///
/// All three fields are required. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Seconds between temperature samples
    pub interval: u64,
    /// BCM number of the GPIO pin driving the fan
    pub pin: u8,
    /// Enables debug-level logging
    #[serde(rename = "is_debug", alias = "debug")]
    pub debug: bool,
}

impl Settings {
    pub fn new(interval: u64, pin: u8, debug: bool) -> Result<Self> {
        let settings = Self {
            interval,
            pin,
            debug,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| FanError::Config(format!("Invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            FanError::Config(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    /// Sampling interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(FanError::Config(
                "interval must be a positive number of seconds".to_string(),
            ));
        }
        Ok(())
    }
}
