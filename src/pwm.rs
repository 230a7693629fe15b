//! PWM fan output
//!
//! [`PwmActuator`] is the full lifecycle of the fan output: `configure` and
//! `start` once, `set_duty_cycle` on every control step, then `stop` and
//! `release_pin` exactly once. [`ActuatorGuard`] ties the release to scope.

use crate::errors::{FanError, Result};
use log::{debug, error, info};

/// PWM output driving the fan
pub trait PwmActuator {
    /// Claim `pin` and prepare a PWM carrier at `frequency_hz`
    fn configure(&mut self, pin: u8, frequency_hz: f64) -> Result<()>;

    /// Begin driving the output at `duty_percent`
    fn start(&mut self, duty_percent: f64) -> Result<()>;

    /// Change the duty cycle, in percent (0-100)
    fn set_duty_cycle(&mut self, duty_percent: f64) -> Result<()>;

    /// Stop the PWM output
    fn stop(&mut self) -> Result<()>;

    /// Give the pin back and reset it to its original mode
    fn release_pin(&mut self) -> Result<()>;
}

impl<A: PwmActuator + ?Sized> PwmActuator for Box<A> {
    fn configure(&mut self, pin: u8, frequency_hz: f64) -> Result<()> {
        (**self).configure(pin, frequency_hz)
    }

    fn start(&mut self, duty_percent: f64) -> Result<()> {
        (**self).start(duty_percent)
    }

    fn set_duty_cycle(&mut self, duty_percent: f64) -> Result<()> {
        (**self).set_duty_cycle(duty_percent)
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn release_pin(&mut self) -> Result<()> {
        (**self).release_pin()
    }
}

/// Clamp a duty percentage into range and convert it to a 0.0-1.0 fraction
pub fn duty_fraction(duty_percent: f64) -> f64 {
    if duty_percent.is_nan() {
        return 0.0;
    }
    duty_percent.clamp(0.0, 100.0) / 100.0
}

/// Exclusive ownership of a configured actuator.
///
/// The actuator is stopped and its pin released exactly once: either through
/// [`ActuatorGuard::release`], or on drop if the guard is still held.
pub struct ActuatorGuard<A: PwmActuator> {
    actuator: Option<A>,
}

impl<A: PwmActuator> ActuatorGuard<A> {
    pub fn new(actuator: A) -> Self {
        Self {
            actuator: Some(actuator),
        }
    }

    pub fn start(&mut self, duty_percent: f64) -> Result<()> {
        self.held()?.start(duty_percent)
    }

    pub fn set_duty_cycle(&mut self, duty_percent: f64) -> Result<()> {
        self.held()?.set_duty_cycle(duty_percent)
    }

    /// Stop the output and release the pin.
    ///
    /// Both steps are attempted even if stopping fails; the first error is
    /// returned.
    pub fn release(mut self) -> Result<()> {
        match self.actuator.take() {
            Some(actuator) => release_actuator(actuator),
            None => Ok(()),
        }
    }

    fn held(&mut self) -> Result<&mut A> {
        self.actuator
            .as_mut()
            .ok_or_else(|| FanError::Actuator("actuator already released".to_string()))
    }
}

impl<A: PwmActuator> Drop for ActuatorGuard<A> {
    fn drop(&mut self) {
        if let Some(actuator) = self.actuator.take() {
            if let Err(e) = release_actuator(actuator) {
                error!("Failed to release PWM output: {}", e);
            }
        }
    }
}

fn release_actuator<A: PwmActuator>(mut actuator: A) -> Result<()> {
    debug!("Stopping PWM output and releasing pin");
    let stopped = actuator.stop();
    let released = actuator.release_pin();
    stopped.and(released)
}

/// Software PWM on a Raspberry Pi GPIO pin
#[cfg(target_os = "linux")]
pub struct GpioPwm {
    pin: Option<rppal::gpio::OutputPin>,
    frequency_hz: f64,
}

#[cfg(target_os = "linux")]
impl GpioPwm {
    pub fn new() -> Self {
        Self {
            pin: None,
            frequency_hz: 0.0,
        }
    }

    fn output(&mut self) -> Result<&mut rppal::gpio::OutputPin> {
        self.pin
            .as_mut()
            .ok_or_else(|| FanError::Actuator("GPIO pin not configured".to_string()))
    }

    fn drive(&mut self, duty_percent: f64) -> Result<()> {
        let frequency_hz = self.frequency_hz;
        self.output()?
            .set_pwm_frequency(frequency_hz, duty_fraction(duty_percent))?;
        Ok(())
    }
}

#[cfg(target_os = "linux")]
impl Default for GpioPwm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "linux")]
impl PwmActuator for GpioPwm {
    fn configure(&mut self, pin: u8, frequency_hz: f64) -> Result<()> {
        let gpio = rppal::gpio::Gpio::new()
            .map_err(|e| FanError::HardwareInit(format!("GPIO unavailable: {}", e)))?;
        let mut output = gpio
            .get(pin)
            .map_err(|e| FanError::HardwareInit(format!("GPIO{}: {}", pin, e)))?
            .into_output_low();
        output.set_reset_on_drop(true);

        self.pin = Some(output);
        self.frequency_hz = frequency_hz;
        debug!("Configured GPIO{} for {} Hz PWM", pin, frequency_hz);
        Ok(())
    }

    fn start(&mut self, duty_percent: f64) -> Result<()> {
        self.drive(duty_percent)
    }

    fn set_duty_cycle(&mut self, duty_percent: f64) -> Result<()> {
        self.drive(duty_percent)
    }

    fn stop(&mut self) -> Result<()> {
        let output = self.output()?;
        output.clear_pwm()?;
        output.set_low();
        Ok(())
    }

    fn release_pin(&mut self) -> Result<()> {
        // Dropping the pin restores its original mode
        self.pin.take();
        Ok(())
    }
}

/// Actuator that only logs, for running without GPIO hardware
#[derive(Debug, Default)]
pub struct DryRunPwm {
    pin: Option<u8>,
}

impl DryRunPwm {
    pub fn new() -> Self {
        Self::default()
    }

    fn label(&self) -> String {
        match self.pin {
            Some(pin) => format!("GPIO{}", pin),
            None => "unconfigured pin".to_string(),
        }
    }
}

impl PwmActuator for DryRunPwm {
    fn configure(&mut self, pin: u8, frequency_hz: f64) -> Result<()> {
        info!("[dry run] configure GPIO{} at {} Hz", pin, frequency_hz);
        self.pin = Some(pin);
        Ok(())
    }

    fn start(&mut self, duty_percent: f64) -> Result<()> {
        info!("[dry run] start {} at {}%", self.label(), duty_percent);
        Ok(())
    }

    fn set_duty_cycle(&mut self, duty_percent: f64) -> Result<()> {
        info!("[dry run] set {} duty cycle to {}%", self.label(), duty_percent);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        info!("[dry run] stop {}", self.label());
        Ok(())
    }

    fn release_pin(&mut self) -> Result<()> {
        info!("[dry run] release {}", self.label());
        self.pin = None;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Calls seen by a [`RecordingPwm`]
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Configure(u8, f64),
        Start(f64),
        SetDuty(f64),
        Stop,
        Release,
    }

    /// Actuator that records every call into a shared log
    #[derive(Clone, Default)]
    pub(crate) struct RecordingPwm {
        pub calls: Arc<Mutex<Vec<Call>>>,
        pub fail_configure: bool,
        pub fail_stop: bool,
        pub fail_set_duty: bool,
    }

    impl RecordingPwm {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, call: &Call) -> usize {
            self.calls().iter().filter(|c| *c == call).count()
        }

        pub fn duties(&self) -> Vec<f64> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::SetDuty(duty) => Some(duty),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl PwmActuator for RecordingPwm {
        fn configure(&mut self, pin: u8, frequency_hz: f64) -> Result<()> {
            if self.fail_configure {
                return Err(FanError::HardwareInit("no such pin".to_string()));
            }
            self.record(Call::Configure(pin, frequency_hz));
            Ok(())
        }

        fn start(&mut self, duty_percent: f64) -> Result<()> {
            self.record(Call::Start(duty_percent));
            Ok(())
        }

        fn set_duty_cycle(&mut self, duty_percent: f64) -> Result<()> {
            self.record(Call::SetDuty(duty_percent));
            if self.fail_set_duty {
                return Err(FanError::Actuator("write failed".to_string()));
            }
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.record(Call::Stop);
            if self.fail_stop {
                return Err(FanError::Actuator("stop failed".to_string()));
            }
            Ok(())
        }

        fn release_pin(&mut self) -> Result<()> {
            self.record(Call::Release);
            Ok(())
        }
    }

    #[test]
    fn test_duty_fraction() {
        assert_eq!(duty_fraction(0.0), 0.0);
        assert_eq!(duty_fraction(40.0), 0.4);
        assert_eq!(duty_fraction(100.0), 1.0);
        assert_eq!(duty_fraction(-5.0), 0.0);
        assert_eq!(duty_fraction(130.0), 1.0);
        assert_eq!(duty_fraction(f64::NAN), 0.0);
    }

    #[test]
    fn test_guard_release_once() {
        let pwm = RecordingPwm::default();
        let mut guard = ActuatorGuard::new(pwm.clone());
        guard.start(20.0).unwrap();
        guard.release().unwrap();

        assert_eq!(pwm.calls(), vec![Call::Start(20.0), Call::Stop, Call::Release]);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let pwm = RecordingPwm::default();
        {
            let mut guard = ActuatorGuard::new(pwm.clone());
            guard.set_duty_cycle(55.0).unwrap();
        }
        assert_eq!(pwm.count(&Call::Stop), 1);
        assert_eq!(pwm.count(&Call::Release), 1);
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let pwm = RecordingPwm::default();
        let inner = pwm.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = ActuatorGuard::new(inner);
            panic!("control step blew up");
        }));

        assert!(result.is_err());
        assert_eq!(pwm.calls(), vec![Call::Stop, Call::Release]);
    }

    #[test]
    fn test_release_pin_even_if_stop_fails() {
        let pwm = RecordingPwm {
            fail_stop: true,
            ..Default::default()
        };
        let err = ActuatorGuard::new(pwm.clone()).release().unwrap_err();

        assert!(matches!(err, FanError::Actuator(_)));
        assert_eq!(pwm.calls(), vec![Call::Stop, Call::Release]);
    }

    #[test]
    fn test_dry_run_accepts_full_lifecycle() {
        let mut pwm = DryRunPwm::new();
        pwm.configure(14, 50.0).unwrap();
        pwm.start(20.0).unwrap();
        pwm.set_duty_cycle(64.5).unwrap();
        pwm.stop().unwrap();
        pwm.release_pin().unwrap();
        assert_eq!(pwm.pin, None);
    }
}
