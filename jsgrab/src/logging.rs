//! Logging init: stderr by default, or append to a log file.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// An explicit level wins over `RUST_LOG`, which wins over the default.
pub(crate) fn env_filter(level: Option<&str>) -> EnvFilter {
    if let Some(l) = level {
        match EnvFilter::try_new(l) {
            Ok(f) => return f,
            Err(e) => eprintln!("[-] invalid log level {:?} ({}); using RUST_LOG or default", l, e),
        }
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Append structured logs to `path`. Returns Err if the file cannot be opened so the
/// caller can fall back to stderr.
pub fn init_logging_file(path: &Path, level: Option<&str>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    tracing::debug!("logging to {}", path.display());
    Ok(())
}

/// Log to stderr so stdout carries only the run summaries.
pub fn init_logging_stderr(level: Option<&str>) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .init();
}

pub fn init(file: Option<&Path>, level: Option<&str>) {
    if let Some(path) = file {
        match init_logging_file(path, level) {
            Ok(()) => return,
            Err(e) => eprintln!("[-] {:#}; logging to stderr instead", e),
        }
    }
    init_logging_stderr(level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn explicit_level_is_used() {
        assert_eq!(env_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(env_filter(Some("link_merge=trace")).max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn bad_level_falls_back_to_env_or_default() {
        let fallback = env_filter(None).max_level_hint();
        assert_eq!(env_filter(Some("link_merge=loud")).max_level_hint(), fallback);
    }
}
