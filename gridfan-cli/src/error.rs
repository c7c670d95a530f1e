//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! for everything that can go wrong before or after a batch runs. Job
//! failures are not errors; they surface as recorded results and the exit
//! code.

use gridfan::config::ConfigFileError;
use thiserror::Error;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug, Error)]
pub enum CliError {
    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigFileError),

    /// Failed to read the batch manifest
    #[error("Failed to read manifest '{path}': {error}")]
    ManifestRead {
        path: String,
        error: std::io::Error,
    },

    /// The batch manifest was readable but not usable
    #[error("Invalid manifest: {0}")]
    Manifest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err = CliError::from(ConfigFileError::WriteError("disk full".to_string()));
        assert!(err.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn test_manifest_error_display() {
        let err = CliError::Manifest("job 'probe-1' has unknown cohort 'medium'".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid manifest: job 'probe-1' has unknown cohort 'medium'"
        );
    }
}
