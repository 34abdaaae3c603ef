//! Structured logging for mircam using the tracing crate.
//!
//! Writes to daily-rotated files under the XDG state directory and never to
//! the terminal, so log output cannot corrupt the TUI. Old log files are
//! pruned at startup, keeping the 7 most recent days.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

/// Keeps the non-blocking appender worker alive for the program lifetime.
static APPENDER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const LOG_FILE_PREFIX: &str = "mircam.log";

/// Initializes file-based logging.
///
/// Log level is controlled by the RUST_LOG environment variable and defaults
/// to "info".
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> Result<(), anyhow::Error> {
    let log_dir = get_log_dir()?;

    if let Err(e) = cleanup_old_logs(&log_dir) {
        eprintln!("Warning: Failed to cleanup old logs: {e}");
    }

    let file_appender = rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Logging already initialized"))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_ansi(false),
        )
        .init();

    tracing::debug!("Logging initialized. Log directory: {}", log_dir.display());
    Ok(())
}

/// Determines the log directory, following the XDG Base Directory
/// Specification: XDG_STATE_HOME if set, otherwise ~/.local/state/mircam.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the log directory cannot be created
pub fn get_log_dir() -> Result<PathBuf, anyhow::Error> {
    let log_dir = if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        PathBuf::from(xdg_state).join("mircam")
    } else {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
        home.join(".local/state/mircam")
    };

    std::fs::create_dir_all(&log_dir)?;

    Ok(log_dir)
}

/// Removes dated log files beyond the 7 most recent, by modification time.
/// Only files matching `mircam.log.YYYY-MM-DD` are considered.
fn cleanup_old_logs(log_dir: &Path) -> Result<(), anyhow::Error> {
    const MAX_LOG_FILES: usize = 7;

    let dated_prefix = format!("{LOG_FILE_PREFIX}.");
    let mut log_files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            let file_name = path.file_name()?.to_string_lossy().to_string();

            if file_name.starts_with(&dated_prefix) && file_name.matches('-').count() == 2 {
                let modified = fs::metadata(&path).ok()?.modified().ok()?;
                Some((path, modified))
            } else {
                None
            }
        })
        .collect();

    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to delete old log file {}: {}", path.display(), e);
        }
    }

    Ok(())
}
