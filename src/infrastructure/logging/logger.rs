use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "avatar-lifecycle.log";

/// Flushes the file writer on drop; lives for the whole process.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber: `RUST_LOG`-style filter (default `info`),
/// colored stdout and a daily-rolling plain file under `log_dir`.
///
/// Only the first call installs anything.
pub fn init_logger(log_dir: &Path) -> Result<(), String> {
    if FILE_GUARD.get().is_some() {
        return Ok(());
    }

    std::fs::create_dir_all(log_dir)
        .map_err(|error| format!("Failed to create log directory {:?}: {}", log_dir, error))?;

    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    if FILE_GUARD.set(guard).is_err() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout).with_target(true))
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .map_err(|error| format!("Failed to install log subscriber: {}", error))?;

    tracing::debug!("Logging to {:?}", log_dir);
    Ok(())
}

pub fn debug(message: &str) {
    tracing::debug!("{}", message);
}

pub fn info(message: &str) {
    tracing::info!("{}", message);
}

pub fn warn(message: &str) {
    tracing::warn!("{}", message);
}

/// Blank messages are dropped.
pub fn error(message: &str) {
    let message = message.trim();
    if !message.is_empty() {
        tracing::error!("{}", message);
    }
}
