//! Daemon wiring: sensor, actuator, controller and signal handling

use crate::{
    cpu_temp::CpuTempSensor,
    errors::Result,
    fan_control::{FanController, StopReason},
    pwm::{DryRunPwm, PwmActuator},
    settings::Settings,
};
use log::{debug, error, info};
use std::path::PathBuf;
use tokio::sync::watch;

/// Runtime options that do not come from the settings file
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    /// Thermal zone file to sample
    pub sensor_path: PathBuf,
    /// Log duty cycle changes instead of driving GPIO
    pub dry_run: bool,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            sensor_path: PathBuf::from(crate::cpu_temp::DEFAULT_THERMAL_ZONE),
            dry_run: false,
        }
    }
}

/// Start the daemon from the outcome of loading settings.
///
/// `make_actuator` is only called once the settings are valid, so a bad
/// settings file never touches the fan output. Every error is logged before
/// it is returned.
pub async fn launch<A, F>(
    settings: Result<Settings>,
    options: DaemonOptions,
    make_actuator: F,
) -> Result<StopReason>
where
    A: PwmActuator,
    F: FnOnce(&DaemonOptions) -> Result<A>,
{
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load settings: {}", e);
            return Err(e);
        }
    };
    debug!("Loaded settings: {:?}", settings);

    let actuator = create_actuator(make_actuator, &options)?;
    FanDaemon::new(settings, options).run_with(actuator).await
}

fn create_actuator<A, F>(make_actuator: F, options: &DaemonOptions) -> Result<A>
where
    F: FnOnce(&DaemonOptions) -> Result<A>,
{
    make_actuator(options).map_err(|e| {
        error!("Failed to create PWM output: {}", e);
        e
    })
}

/// Actuator selected by the options: logging only for a dry run, GPIO otherwise
pub fn default_actuator(options: &DaemonOptions) -> Result<Box<dyn PwmActuator + Send>> {
    if options.dry_run {
        info!("Dry run: GPIO will not be touched");
        return Ok(Box::new(DryRunPwm::new()));
    }
    hardware_actuator()
}

/// Main daemon structure
pub struct FanDaemon {
    settings: Settings,
    options: DaemonOptions,
}

impl FanDaemon {
    pub fn new(settings: Settings, options: DaemonOptions) -> Self {
        Self { settings, options }
    }

    /// Run the daemon with the actuator picked by [`default_actuator`]
    pub async fn run(self) -> Result<StopReason> {
        let actuator = create_actuator(default_actuator, &self.options)?;
        self.run_with(actuator).await
    }

    /// Run the daemon until a termination signal arrives or the loop fails.
    ///
    /// The fan output is released before this returns.
    pub async fn run_with<A: PwmActuator>(self, actuator: A) -> Result<StopReason> {
        info!(
            "Starting fan daemon: interval {}s, GPIO{}, sensor {}",
            self.settings.interval,
            self.settings.pin,
            self.options.sensor_path.display()
        );

        let signals = match install_signal_handlers() {
            Ok(signals) => signals,
            Err(e) => {
                error!("Failed to install signal handlers: {}", e);
                return Err(e);
            }
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let signal_task = tokio::spawn(async move {
            let signal = signals.recv().await;
            info!("caught signal: {}", signal);
            let _ = shutdown_tx.send(true);
        });

        let sensor = CpuTempSensor::new(self.options.sensor_path.clone());
        let mut controller = FanController::from_settings(sensor, &self.settings);
        let result = controller.run(actuator, shutdown_rx).await;

        signal_task.abort();
        result
    }
}

#[cfg(target_os = "linux")]
fn hardware_actuator() -> Result<Box<dyn PwmActuator + Send>> {
    Ok(Box::new(crate::pwm::GpioPwm::new()))
}

#[cfg(not(target_os = "linux"))]
fn hardware_actuator() -> Result<Box<dyn PwmActuator + Send>> {
    Err(crate::errors::FanError::HardwareInit(
        "GPIO PWM is only supported on Linux; use --dry-run".to_string(),
    ))
}

/// Termination signals the daemon shuts down on
#[cfg(unix)]
struct Signals {
    int: tokio::signal::unix::Signal,
    hup: tokio::signal::unix::Signal,
    term: tokio::signal::unix::Signal,
}

#[cfg(unix)]
fn install_signal_handlers() -> Result<Signals> {
    use tokio::signal::unix::{signal, SignalKind};

    debug!("Installing SIGINT, SIGHUP and SIGTERM handlers");
    Ok(Signals {
        int: signal(SignalKind::interrupt())?,
        hup: signal(SignalKind::hangup())?,
        term: signal(SignalKind::terminate())?,
    })
}

#[cfg(unix)]
impl Signals {
    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.int.recv() => "SIGINT",
            _ = self.hup.recv() => "SIGHUP",
            _ = self.term.recv() => "SIGTERM"
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
fn install_signal_handlers() -> Result<Signals> {
    debug!("Installing Ctrl-C handler");
    Ok(Signals)
}

#[cfg(not(unix))]
impl Signals {
    async fn recv(self) -> &'static str {
        signal_or_pending("Ctrl-C", tokio::signal::ctrl_c().await).await
    }
}

/// Name of the delivered signal; never resolves if listening failed
#[cfg_attr(unix, allow(dead_code))]
async fn signal_or_pending(name: &'static str, outcome: std::io::Result<()>) -> &'static str {
    match outcome {
        Ok(()) => name,
        Err(e) => {
            error!("Cannot listen for {}: {}", name, e);
            std::future::pending().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FanError;
    use serial_test::serial;
    use std::fs;
    use std::time::{Duration, Instant};

    fn dry_run_options(sensor_path: PathBuf) -> DaemonOptions {
        DaemonOptions {
            sensor_path,
            dry_run: true,
        }
    }

    #[test]
    fn test_default_options() {
        let options = DaemonOptions::default();
        assert_eq!(
            options.sensor_path,
            PathBuf::from("/sys/class/thermal/thermal_zone0/temp")
        );
        assert!(!options.dry_run);
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_dry_run_ends_on_sensor_failure() {
        let dir = tempfile::tempdir().unwrap();
        let sensor_path = dir.path().join("temp");
        fs::write(&sensor_path, "58000\n").unwrap();

        let settings = Settings::new(5, 14, false).unwrap();
        let daemon = FanDaemon::new(settings, dry_run_options(sensor_path.clone()));

        let (result, _) = tokio::join!(daemon.run(), async {
            tokio::time::sleep(Duration::from_secs(7)).await;
            fs::remove_file(&sensor_path).unwrap();
        });

        assert!(matches!(result, Err(FanError::SensorUnavailable { .. })));
    }

    #[tokio::test]
    #[serial]
    async fn test_sigterm_shuts_down_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let sensor_path = dir.path().join("temp");
        fs::write(&sensor_path, "61000\n").unwrap();

        let settings = Settings::new(3600, 14, false).unwrap();
        let daemon = FanDaemon::new(settings, dry_run_options(sensor_path));
        let pwm = RecordingPwm::default();
        let started = Instant::now();

        let (result, _) = tokio::join!(daemon.run_with(pwm.clone()), async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            // SAFETY: signalling our own pid; the daemon's handler is installed
            unsafe { libc::kill(libc::getpid(), libc::SIGTERM) };
        });

        assert_eq!(result.unwrap(), StopReason::Shutdown);
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(pwm.duties(), vec![44.0]);
        assert_eq!(pwm.count(&Call::Stop), 1);
        assert_eq!(pwm.count(&Call::Release), 1);
    }

    #[tokio::test]
    async fn test_missing_pin_never_creates_actuator() {
        let settings = Settings::from_json(r#"{"interval": 5, "is_debug": false}"#);
        let mut created = false;

        let result = launch(settings, DaemonOptions::default(), |_| {
            created = true;
            Ok(RecordingPwm::default())
        })
        .await;

        assert!(matches!(result, Err(FanError::Config(_))));
        assert!(!created);
    }

    #[tokio::test(start_paused = true)]
    #[serial]
    async fn test_launch_configures_actuator_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(5, 18, false);
        let pwm = RecordingPwm::default();

        // No sensor file: the first sample fails after the output is started
        let result = launch(settings, dry_run_options(dir.path().join("temp")), |_| {
            Ok(pwm.clone())
        })
        .await;

        assert!(matches!(result, Err(FanError::SensorUnavailable { .. })));
        assert_eq!(
            pwm.calls(),
            vec![
                Call::Configure(18, 50.0),
                Call::Start(20.0),
                Call::Stop,
                Call::Release
            ]
        );
    }

    #[tokio::test]
    async fn test_actuator_failure_aborts_launch() {
        let settings = Settings::new(5, 14, false);

        let result = launch(settings, DaemonOptions::default(), |_| {
            Err::<RecordingPwm, _>(FanError::HardwareInit("GPIO unavailable".to_string()))
        })
        .await;

        assert!(matches!(result, Err(FanError::HardwareInit(_))));
    }

    #[tokio::test]
    async fn test_signal_listener_reports_name() {
        assert_eq!(signal_or_pending("Ctrl-C", Ok(())).await, "Ctrl-C");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_signal_listener_never_requests_shutdown() {
        let failed = signal_or_pending(
            "Ctrl-C",
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no console")),
        );

        let waited = tokio::time::timeout(Duration::from_secs(3600), failed).await;

        assert!(waited.is_err());
    }

    use crate::pwm::tests::{Call, RecordingPwm};
}
