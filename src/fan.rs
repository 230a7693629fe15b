//! Temperature to duty-cycle control curve

/// Below this temperature the fan is switched off
pub const FAN_OFF_BELOW: f64 = 50.0;

/// Above this temperature the fan runs at full power
pub const FULL_POWER_ABOVE: f64 = 75.0;

/// Duty cycle of the linear segment at `BASE_TEMPERATURE`
pub const BASE_DUTY: f64 = 20.0;

pub const BASE_TEMPERATURE: f64 = 55.0;

/// Slope of the linear segment, in percent per degree
pub const DUTY_PER_DEGREE: f64 = 4.0;

/// Duty cycle applied when the PWM output is started
pub const STARTUP_DUTY: f64 = 20.0;

/// PWM carrier frequency
pub const PWM_FREQUENCY_HZ: f64 = 50.0;

/// Calculate the fan duty percentage for a temperature in °C.
///
/// The linear segment is always evaluated; the off and full-power thresholds
/// then override it. The result is continuous at both thresholds and lies in
/// `[0, 100]`. It is not rounded.
pub fn duty_for_temperature(temperature: f64) -> f64 {
    let mut duty = BASE_DUTY + DUTY_PER_DEGREE * (temperature - BASE_TEMPERATURE);
    if temperature < FAN_OFF_BELOW {
        duty = 0.0;
    }
    if temperature > FULL_POWER_ABOVE {
        duty = 100.0;
    }
    duty
}
