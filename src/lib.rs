//! PWM Fan Controller
//!
//! Closed-loop CPU fan control for single-board computers: samples the
//! thermal zone, maps the temperature onto a fixed curve and drives a GPIO
//! PWM output.

pub mod args;
pub mod cpu_temp;
pub mod daemon;
pub mod errors;
pub mod fan;
pub mod fan_control;
pub mod logging;
pub mod pwm;
pub mod settings;

// Re-export commonly used types
pub use cpu_temp::{CpuTempSensor, SensorReader};
pub use errors::{FanError, Result};
pub use fan::duty_for_temperature;
pub use fan_control::{FanController, LoopState, StopReason};
pub use pwm::{ActuatorGuard, DryRunPwm, PwmActuator};
pub use settings::Settings;
