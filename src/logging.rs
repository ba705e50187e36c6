//! Logger (§4.11, §1.1).
//!
//! Installs a `tracing` subscriber writing structured events to stdout and to the
//! configured log file, in the same spirit as the original's `logger_write`
//! (`[timestamp] LEVEL: message`, thread-safe, append-only) but built from the
//! ecosystem's facade rather than a hand-rolled semaphore-guarded file writer.
use crate::errors::BootstrapError;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the global subscriber. The returned [`WorkerGuard`] must be kept
/// alive for the process lifetime; dropping it flushes and closes the log file,
/// the async equivalent of the original's `atexit`-registered `logger_end`.
pub fn init(log_path: &Path) -> Result<WorkerGuard, BootstrapError> {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|e| {
            BootstrapError::LoggingInitFailed(format!(
                "unable to open {}: {e}",
                log_path.display()
            ))
        })?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = fmt::layer().with_target(false);
    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| BootstrapError::LoggingInitFailed(e.to_string()))?;

    Ok(guard)
}
