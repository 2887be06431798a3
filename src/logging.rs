//! File logging for the terminal UI.
//!
//! The terminal belongs to ratatui, so tracing output goes to a log file
//! through a non-blocking writer. `RUST_LOG` wins over the configured level.

use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_NAME: &str = "talentdesk.log";

/// $XDG_DATA_HOME/talentdesk/talentdesk.log
pub fn default_log_path() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("talentdesk").join(LOG_FILE_NAME))
}

/// Install the global subscriber writing to `path`.
///
/// The returned guard flushes buffered lines when dropped; keep it alive
/// until the app exits.
pub fn init_logging(path: &Path, default_level: &str) -> Result<WorkerGuard> {
  let dir = path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or_else(|| Path::new("."));
  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Log path has no file name: {}", path.display()))?;

  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let filter = build_env_filter(std::env::var("RUST_LOG").ok().as_deref(), default_level)?;

  let appender = tracing_appender::rolling::never(dir, file_name);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(filter)
    .with(
      fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true),
    )
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

fn build_env_filter(rust_log: Option<&str>, default_level: &str) -> Result<EnvFilter> {
  let directives = match rust_log {
    Some(directives) if !directives.trim().is_empty() => directives.to_string(),
    _ => format!("talentdesk={},warn", default_level.trim()),
  };

  EnvFilter::try_new(&directives).map_err(|e| eyre!("Invalid log filter {}: {}", directives, e))
}
