//! tracing subscriber setup.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Where log lines go. The TUI owns the terminal, so it logs to a file instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    CacheFile,
}

/// `<cache dir>/gitoracle/gitoracle.log`, or None when the platform has no cache dir.
pub fn log_file_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("gitoracle").join("gitoracle.log"))
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("ignoring invalid log filter {directive:?}: {e}");
        EnvFilter::new("warn")
    })
}

/// Install the global subscriber. Returns the log file path when logging to a file. Falls back
/// to stderr if the cache directory is unavailable.
pub fn init(directive: &str, target: LogTarget) -> Result<Option<PathBuf>> {
    let filter = build_filter(directive);

    let file_path = match target {
        LogTarget::CacheFile => log_file_path(),
        LogTarget::Stderr => None,
    };
    let Some(path) = file_path else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .try_init()
            .context("install tracing subscriber")?;
        return Ok(None);
    };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create log directory {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(filter)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_lives_under_app_dir() {
        if let Some(path) = log_file_path() {
            assert!(path.ends_with("gitoracle/gitoracle.log"));
        }
    }
}
