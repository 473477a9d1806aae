//! Logging setup.
//!
//! Stdout carries snapshot lines, so logs go to stderr unless a log directory
//! is configured, in which case they roll daily under that directory.

use std::env;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "TEAMWATCH_DEBUG_LOG";
const LOG_DIR_ENV: &str = "TEAMWATCH_LOG_DIR";
const LOG_FILE_PREFIX: &str = "teamwatch.log";

/// Installs the global subscriber. Keep the returned guard alive until exit so
/// buffered file output is flushed.
pub fn init(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let filter = env_filter();
    let log_dir = log_dir.or_else(|| env::var(LOG_DIR_ENV).ok().map(PathBuf::from));

    if let Some(dir) = log_dir {
        match fs_err::create_dir_all(&dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .init();
                return Some(guard);
            }
            Err(err) => eprintln!("teamwatch: logging to stderr ({})", err),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    None
}

fn env_filter() -> EnvFilter {
    let debug_enabled = env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}
