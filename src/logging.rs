//! Logging setup for the command-line binary.
//!
//! Logs go to `<dir>/openblog.log` only, so they never interleave with the
//! lifecycle states printed on stdout. `RUST_LOG` overrides the default
//! `info` filter.

use color_eyre::{eyre::eyre, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "openblog.log";

/// Keeps the background writer alive. Dropping it flushes the log file.
pub struct LoggingGuard {
  _file_guard: WorkerGuard,
}

/// Install the global subscriber. Call once, early in `main`.
pub fn init_logging(log_dir: &Path) -> Result<LoggingGuard> {
  fs::create_dir_all(log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
  let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

  let file_layer = tracing_subscriber::fmt::layer()
    .with_writer(non_blocking_file)
    .with_ansi(false)
    .with_target(true);

  tracing_subscriber::registry()
    .with(env_filter())
    .with(file_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(LoggingGuard {
    _file_guard: file_guard,
  })
}

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
  filter_for(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
}

/// Filter from `RUST_LOG`-style directives. Missing or invalid directives
/// fall back to `info`.
fn filter_for(directives: Option<&str>) -> EnvFilter {
  directives
    .and_then(|d| EnvFilter::try_new(d).ok())
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
