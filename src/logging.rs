//! Logging setup for the fan controller
//!
//! Each invocation writes to its own file, named after the process start time.

use crate::errors::Result;
use chrono::{DateTime, Local};
use fern::Dispatch;
use log::LevelFilter;
use std::fs;
use std::path::{Path, PathBuf};

/// Default directory for log files, relative to the working directory
pub const DEFAULT_LOG_DIR: &str = "logs";

const LOG_FILE_FORMAT: &str = "%Y_%m_%d_%H_%M_%S.log";

/// Pick the log level from the settings flag and the CLI verbosity
pub fn level_for(debug: bool, verbosity: u8) -> LevelFilter {
    match verbosity {
        0 if !debug => LevelFilter::Info,
        0 | 1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Log file name for a process started at `started`
pub fn log_file_name(started: &DateTime<Local>) -> String {
    started.format(LOG_FILE_FORMAT).to_string()
}

/// Setup logging into a fresh timestamped file under `log_dir`.
///
/// Returns the path of the log file. When `console` is set, lines are
/// mirrored to stderr.
pub fn setup(level: LevelFilter, log_dir: &Path, console: bool) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(log_file_name(&Local::now()));

    let mut dispatch = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {} {} {} : {}",
                Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.level(),
                record.file().unwrap_or_else(|| record.target()),
                record.line().unwrap_or(0),
                message
            ))
        })
        .level(level)
        .chain(fern::log_file(&log_path)?);

    if console {
        dispatch = dispatch.chain(std::io::stderr());
    }

    dispatch.apply().map_err(fern::InitError::from)?;

    Ok(log_path)
}
