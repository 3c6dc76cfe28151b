//! Logging setup.
//!
//! Always logs to stderr. With disk logging enabled, the same events are
//! appended without ANSI colours to [`DISK_LOG_PATH`](crate::config::DISK_LOG_PATH).
//! `RUST_LOG` is honoured; the monitor's own crates default to `info`, or
//! `debug` when verbose.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Registry};

use crate::config::DISK_LOG_PATH;

const CRATES: [&str; 4] = ["cec_adbd", "cec_core", "adb_protocol", "hdmi_cec_monitor"];

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid log directive: {0}")]
    Directive(String),

    #[error("a global logger is already installed")]
    AlreadyInitialized,
}

/// Builds the level filter: `RUST_LOG` plus a default for each of our crates.
///
/// # Errors
///
/// Returns `LoggingError::Directive` if a default directive fails to parse.
pub fn build_filter(verbose: bool) -> Result<EnvFilter, LoggingError> {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for krate in CRATES {
        let directive: Directive = format!("{krate}={level}")
            .parse()
            .map_err(|e| LoggingError::Directive(format!("{e}")))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::LogFile {
            path: path.display().to_string(),
            source,
        })
}

/// Installs the global subscriber.
///
/// # Errors
///
/// - `LoggingError::LogFile` if disk logging is on and the file cannot be opened
/// - `LoggingError::AlreadyInitialized` if a subscriber is already set
pub fn init_logging(verbose: bool, log_to_disk: bool) -> Result<(), LoggingError> {
    init_logging_to(verbose, log_to_disk.then(|| Path::new(DISK_LOG_PATH)))
}

/// Like [`init_logging`], with an explicit log file location.
///
/// # Errors
///
/// See [`init_logging`].
pub fn init_logging_to(verbose: bool, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let filter = build_filter(verbose)?;

    let file_layer = match log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    Registry::default()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}
