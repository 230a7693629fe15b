use crate::cpu_temp::SensorReader;
use crate::errors::{FanError, Result};
use crate::fan::{duty_for_temperature, PWM_FREQUENCY_HZ, STARTUP_DUTY};
use crate::pwm::{ActuatorGuard, PwmActuator};
use crate::settings::Settings;
use log::{debug, error, info};
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Lifecycle of one control loop invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Starting => "starting",
            LoopState::Running => "running",
            LoopState::Stopping => "stopping",
            LoopState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why a control loop ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown was requested, usually by a termination signal
    Shutdown,
}

/// Closed-loop fan controller: sample, actuate, sleep, repeat
pub struct FanController<S: SensorReader> {
    sensor: S,
    pin: u8,
    interval: Duration,
    state: LoopState,
}

impl<S: SensorReader> FanController<S> {
    /// Create a controller driving `pin` and sampling every `interval`
    pub fn new(sensor: S, pin: u8, interval: Duration) -> Self {
        Self {
            sensor,
            pin,
            interval,
            state: LoopState::Stopped,
        }
    }

    pub fn from_settings(sensor: S, settings: &Settings) -> Self {
        Self::new(sensor, settings.pin, settings.interval())
    }

    /// Current loop state; `Stopped` until `run` is called
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run the control loop until shutdown is requested or an error occurs.
    ///
    /// `actuator` is configured and started here, and is stopped and released
    /// exactly once before this returns, whichever way the loop ends. A
    /// `configure` failure leaves nothing to release. Returns
    /// `StopReason::Shutdown` after a shutdown request; any other exit is an
    /// error, already logged here.
    pub async fn run<A: PwmActuator>(
        &mut self,
        mut actuator: A,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<StopReason> {
        self.transition(LoopState::Starting);

        if let Err(e) = actuator.configure(self.pin, PWM_FREQUENCY_HZ) {
            error!("Failed to configure GPIO{}: {}", self.pin, e);
            self.transition(LoopState::Stopped);
            return Err(e);
        }

        let mut guard = ActuatorGuard::new(actuator);
        let outcome = match guard.start(STARTUP_DUTY) {
            Ok(()) => {
                info!(
                    "Started PWM on GPIO{} at {}%, sampling every {}s",
                    self.pin,
                    STARTUP_DUTY,
                    self.interval.as_secs()
                );
                self.transition(LoopState::Running);
                self.control_loop(&mut guard, &mut shutdown).await
            }
            Err(e) => Err(FanError::HardwareInit(format!(
                "failed to start PWM on GPIO{}: {}",
                self.pin, e
            ))),
        };

        self.transition(LoopState::Stopping);
        if let Err(e) = &outcome {
            error!("Fan control loop stopped: {}", e);
        }
        let released = guard.release();
        self.transition(LoopState::Stopped);

        match (outcome, released) {
            (Ok(reason), Ok(())) => {
                info!("Fan stopped and GPIO{} released", self.pin);
                Ok(reason)
            }
            (Ok(_), Err(e)) => {
                error!("Failed to release GPIO{}: {}", self.pin, e);
                Err(e)
            }
            (Err(e), Err(release_err)) => {
                error!("Failed to release GPIO{}: {}", self.pin, release_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        }
    }

    /// Sample the sensor once and apply the resulting duty cycle.
    ///
    /// Returns the commanded duty cycle.
    pub fn step<A: PwmActuator>(&mut self, guard: &mut ActuatorGuard<A>) -> Result<f64> {
        let temperature = self.sensor.read()?;
        let duty = duty_for_temperature(temperature);

        debug!("Changing fan power for {}°C...", temperature);
        guard.set_duty_cycle(duty)?;
        debug!("Changed fan power to {}%", duty);

        Ok(duty)
    }

    async fn control_loop<A: PwmActuator>(
        &mut self,
        guard: &mut ActuatorGuard<A>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<StopReason> {
        loop {
            if *shutdown.borrow() {
                return Ok(StopReason::Shutdown);
            }

            self.step(guard)?;

            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = shutdown_requested(shutdown) => return Ok(StopReason::Shutdown),
            }
        }
    }

    fn transition(&mut self, next: LoopState) {
        debug!("Fan controller {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Resolves once shutdown is requested or the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
