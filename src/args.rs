//! Command line argument parsing for the fan controller

use crate::{
    cpu_temp::DEFAULT_THERMAL_ZONE, logging::DEFAULT_LOG_DIR, settings::DEFAULT_SETTINGS_PATH,
};
use clap::Parser;
use std::path::PathBuf;

/// PWM fan controller
///
/// Samples the CPU temperature at a fixed interval and drives a PWM fan on a
/// GPIO pin along a fixed control curve.
#[derive(Parser, Debug)]
#[command(name = "pi-fan-control")]
#[command(about = "Temperature-driven PWM fan controller")]
#[command(version)]
pub struct Args {
    /// Settings file with `interval`, `pin` and `is_debug`
    #[arg(short, long, default_value = DEFAULT_SETTINGS_PATH)]
    pub config: PathBuf,

    /// Directory receiving one log file per run
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    /// Thermal zone file reporting millidegrees Celsius
    #[arg(long, default_value = DEFAULT_THERMAL_ZONE)]
    pub sensor: PathBuf,

    /// Log duty cycle changes without touching GPIO
    #[arg(long)]
    pub dry_run: bool,

    /// Mirror log output to stderr
    #[arg(long)]
    pub console: bool,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
