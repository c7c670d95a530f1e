//! Error types for the store client.

use thiserror::Error;

/// Errors that can occur talking to the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store stayed unreachable through the full bounded-retry budget.
    #[error("store unreachable after {attempts} attempts")]
    Connection { attempts: u32 },

    /// The server reply did not parse as a RESP frame.
    #[error("malformed store reply: {0}")]
    Protocol(String),

    /// The server answered with an error reply.
    #[error("store returned an error: {0}")]
    ServerError(String),

    /// No sentinel could name a primary for the service.
    #[error("no primary discovered for service '{service}'")]
    Discovery { service: String },

    /// Socket-level failure; retried by the client up to the attempt ceiling.
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns true for failures the bounded-retry wrapper should retry
    /// (socket errors and primary-discovery misses). Protocol and server
    /// errors are surfaced immediately.
    pub fn is_connection_level(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Discovery { .. })
    }
}
