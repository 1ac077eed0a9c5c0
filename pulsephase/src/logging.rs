//! Tracing subscriber setup.
//!
//! Events go to stderr and, when `[logging] file` is set, to that file
//! without ANSI colouring. `RUST_LOG` overrides the configured level.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSection;

/// Errors installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("cannot open log file {path}: {reason}")]
    LogFile { path: PathBuf, reason: String },

    #[error("a global subscriber is already installed")]
    AlreadyInstalled,
}

/// Keeps the file writer flushing until dropped.
#[must_use = "dropping the guard stops writing to the log file"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Filter directive for `level` raised by `verbosity` steps.
pub fn directive(level: &str, verbosity: u8) -> String {
    match verbosity {
        0 => level.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn file_appender(path: &Path) -> Result<RollingFileAppender, LoggingError> {
    let error = |reason: String| LoggingError::LogFile {
        path: path.to_path_buf(),
        reason,
    };
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| error("no file name".to_string()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)
        .map_err(|e| error(e.to_string()))
}

/// Install the global subscriber.
pub fn init(settings: &LoggingSection, verbosity: u8) -> Result<LoggingGuard, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directive = directive(&settings.level, verbosity);
            EnvFilter::try_new(&directive).map_err(|e| LoggingError::InvalidFilter {
                directive,
                reason: e.to_string(),
            })?
        }
    };

    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file, guard) = match &settings.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)?;

    Ok(LoggingGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_raises_level() {
        assert_eq!(directive("warn", 0), "warn");
        assert_eq!(directive("warn", 1), "debug");
        assert_eq!(directive("pulsephase=info", 3), "trace");
    }

    #[test]
    fn test_file_appender_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulsephase.log");
        file_appender(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_file_appender_needs_name() {
        assert!(matches!(
            file_appender(Path::new("/")),
            Err(LoggingError::LogFile { .. })
        ));
    }
}
