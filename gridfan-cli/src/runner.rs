//! CLI runner for common setup.
//!
//! Encapsulates config loading and logging initialization so every command
//! starts the same way.

use crate::error::CliError;
use gridfan::config::ConfigFile;
use gridfan::logging::{init_logging, LoggingGuard};
use tracing::info;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard, keeps the file writer flushing while the runner exists
    _logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing logging.
    ///
    /// `console` mirrors log events to stderr in addition to the log file.
    /// stdout is never logged to, so batch output stays parseable.
    pub fn new(console: bool) -> Result<Self, CliError> {
        // Load config file (or use defaults if not present)
        let config = ConfigFile::load()?;

        let logging_guard = init_logging(&config.logging.dir, &config.logging.file, console)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("gridfan v{}", gridfan::VERSION);
        info!("gridfan CLI: {} command", command);
    }
}
