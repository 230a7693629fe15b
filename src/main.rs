//! Main entry point for the fan controller

use anyhow::Context;
use clap::Parser;
use log::{debug, info};
use pi_fan_control::{
    args::Args,
    daemon::{self, DaemonOptions},
    logging,
    settings::Settings,
};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // The settings pick the log level, but a settings failure must still be logged
    let settings = Settings::load_from_file(&args.config);
    let debug = settings.as_ref().map(|s| s.debug).unwrap_or(false);

    let log_path = logging::setup(logging::level_for(debug, args.verbose), &args.log_dir, args.console)
        .with_context(|| format!("failed to set up logging in {}", args.log_dir.display()));
    match log_path {
        Ok(log_path) => debug!("Logging to {}", log_path.display()),
        Err(e) => {
            eprintln!("pi-fan-control: {:#}", e);
            return ExitCode::FAILURE;
        }
    }

    info!(
        "pi-fan-control v{} (git {} / {}) built {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_HASH").unwrap_or("unknown"),
        option_env!("GIT_DESC").unwrap_or("unknown"),
        option_env!("BUILD_TIME").unwrap_or("unknown")
    );

    let options = DaemonOptions {
        sensor_path: args.sensor.clone(),
        dry_run: args.dry_run,
    };
    // Failures are logged where they happen
    let code = match daemon::launch(settings, options, daemon::default_actuator).await {
        Ok(reason) => {
            info!("Fan controller shut down: {:?}", reason);
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    };
    log::logger().flush();
    code
}
