//! Logging infrastructure for gridfan.
//!
//! Structured logging for batch runs:
//! - Appends to `logs/gridfan.log` so consecutive batches stay auditable
//! - Optionally mirrors to stderr, leaving stdout to result output
//! - Compact single-line format; one job event per line
//! - Filter configurable via the RUST_LOG environment variable

use std::fs;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the logging system.
///
/// Creates the log directory if needed and appends to the log file; runs
/// are separated by their startup banner rather than by truncation, so a
/// failed batch can still be compared with the one before it.
///
/// # Arguments
///
/// * `log_dir` - Directory for log files (e.g., "logs")
/// * `log_file` - Log filename (e.g., "gridfan.log")
/// * `console` - Also mirror events to stderr
///
/// # Errors
///
/// Returns an error if the log directory cannot be created.
pub fn init_logging(
    log_dir: &str,
    log_file: &str,
    console: bool,
) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(false)
        .compact();

    let stderr_layer = console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .compact()
            .boxed()
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    tracing::info!(version = crate::VERSION, "gridfan logging started");

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Get default log directory path.
pub fn default_log_dir() -> &'static str {
    "logs"
}

/// Get default log file name.
pub fn default_log_file() -> &'static str {
    "gridfan.log"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        assert_eq!(default_log_dir(), "logs");
        assert_eq!(default_log_file(), "gridfan.log");
    }

    #[test]
    fn test_log_directory_creation() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested").join("logs");

        // Can't call init_logging twice in one process, so exercise the
        // file operations it performs.
        fs::create_dir_all(&log_dir).unwrap();
        assert!(log_dir.is_dir());

        let log_file = log_dir.join("gridfan.log");
        fs::write(&log_file, "").unwrap();
        assert!(log_file.exists());
    }

    #[test]
    fn test_appending_preserves_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let log_file = dir.path().join("gridfan.log");

        fs::write(&log_file, "first batch\n").unwrap();
        let mut contents = fs::read_to_string(&log_file).unwrap();
        contents.push_str("second batch\n");
        fs::write(&log_file, &contents).unwrap();

        let combined = fs::read_to_string(&log_file).unwrap();
        assert!(combined.contains("first batch"));
        assert!(combined.contains("second batch"));
    }

    #[test]
    fn test_guard_structure() {
        use tracing_appender::non_blocking::NonBlocking;

        let (non_blocking, guard) = NonBlocking::new(std::io::sink());
        drop(non_blocking);

        let _logging_guard = LoggingGuard { _file_guard: guard };
    }

    #[cfg(unix)]
    #[test]
    fn test_invalid_directory_error() {
        let result = fs::create_dir_all("/proc/forbidden/logs");
        assert!(result.is_err());
    }
}
