//! Tracing setup. Logs go to a daily-rolling file so stdout stays clean for
//! command output.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter, e.g. `schoolsync=debug`.
const LOG_ENV: &str = "SCHOOLSYNC_LOG";

/// Install the global subscriber.
///
/// The returned guard flushes buffered log lines on drop and must be kept
/// alive for the life of the program. Calling this twice is harmless: the
/// second subscriber is simply not installed.
pub fn init() -> Result<WorkerGuard> {
  let dir = log_dir()?;
  std::fs::create_dir_all(&dir).map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let appender = tracing_appender::rolling::daily(&dir, "schoolsync.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter =
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("schoolsync=info"));

  let _ = tracing_subscriber::registry()
    .with(
      fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true),
    )
    .with(filter)
    .try_init();

  Ok(guard)
}

fn log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("schoolsync").join("logs"))
}
