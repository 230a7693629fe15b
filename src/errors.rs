//! Error types for the fan controller

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the fan controller
pub type Result<T> = std::result::Result<T, FanError>;

/// Main error type for the fan controller
#[derive(Error, Debug)]
pub enum FanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hardware initialization failed: {0}")]
    HardwareInit(String),

    #[error("Temperature sensor unavailable at {}: {reason}", path.display())]
    SensorUnavailable { path: PathBuf, reason: String },

    #[error("PWM actuator error: {0}")]
    Actuator(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<fern::InitError> for FanError {
    fn from(err: fern::InitError) -> Self {
        FanError::Logging(err.to_string())
    }
}

#[cfg(target_os = "linux")]
impl From<rppal::gpio::Error> for FanError {
    fn from(err: rppal::gpio::Error) -> Self {
        FanError::Actuator(err.to_string())
    }
}
