//! Logging configuration for medstore.
//!
//! Command results go to stdout; diagnostics go through `tracing`, either to
//! stderr or, with `--log-file`, to a file in the platform state directory.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Returns the filter used when `RUST_LOG` is not set.
fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "warn" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initializes logging to stderr.
pub fn init_stderr_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter(verbose))
        .with_writer(std::io::stderr)
        .init();
}

/// Initializes logging to the log file.
///
/// Location: `~/.local/state/medstore/medstore.log` on Linux (XDG state
/// directory), or the platform-appropriate state/config directory elsewhere.
/// Falls back to stderr if the file cannot be opened.
pub fn init_file_logging(verbose: bool) {
    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            init_stderr_logging(verbose);
            return;
        }
    }

    // Truncate on each run to avoid unbounded growth
    let log_file = match open_log_file(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {e}");
            init_stderr_logging(verbose);
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(default_filter(verbose))
        .with_writer(log_file)
        .with_ansi(false)
        .init();
}

/// Opens the log file, discarding the previous run's contents.
fn open_log_file(path: &Path) -> std::io::Result<File> {
    File::create(path)
}

/// Returns the path for the log file.
pub fn get_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("medstore").join("medstore.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("medstore").join("medstore.log");
    }

    std::env::temp_dir().join("medstore.log")
}
