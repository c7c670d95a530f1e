//! Job results.
//!
//! A [`JobResult`] is the terminal record for one job. The serialized form
//! is the exact JSON a remotely executed job publishes to the store under
//! its result tag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Result Status
// =============================================================================

/// Terminal status of a job.
///
/// Timeouts are never raised as errors anywhere in the scheduler; they are
/// represented here, synthesized by the monitor when a deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// The job completed and reported success.
    Success,
    /// The job ran and failed, or could not be submitted.
    Failure,
    /// The batch (or per-job) deadline passed while the job was running.
    TimedOut,
    /// The description failed validation; no backend was ever contacted.
    InvalidInput,
}

impl ResultStatus {
    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, ResultStatus::Success)
    }

    /// Returns true if the job actually ran on a backend.
    pub fn ran(&self) -> bool {
        !matches!(self, ResultStatus::InvalidInput)
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Success => write!(f, "success"),
            ResultStatus::Failure => write!(f, "failure"),
            ResultStatus::TimedOut => write!(f, "timed_out"),
            ResultStatus::InvalidInput => write!(f, "invalid_input"),
        }
    }
}

// =============================================================================
// Job Result
// =============================================================================

/// Terminal record for one job.
///
/// Exactly one result exists per admitted description once a batch resolves;
/// jobs that never report are synthesized as `timed_out` or `failure` rather
/// than dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Job name, matching the description that produced it.
    pub name: String,

    /// Terminal status.
    pub status: ResultStatus,

    /// Opaque payload (UTF-8, JSON-compatible). For synthesized results this
    /// carries a short human-readable reason.
    #[serde(default)]
    pub payload: String,

    /// When the result was recorded.
    pub completed_at: DateTime<Utc>,
}

impl JobResult {
    /// Creates a success result with the given payload.
    pub fn success(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ResultStatus::Success,
            payload: payload.into(),
            completed_at: Utc::now(),
        }
    }

    /// Creates a failure result with a reason in the payload.
    pub fn failure(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ResultStatus::Failure,
            payload: reason.into(),
            completed_at: Utc::now(),
        }
    }

    /// Creates a synthesized timeout result.
    pub fn timed_out(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ResultStatus::TimedOut,
            payload: String::new(),
            completed_at: Utc::now(),
        }
    }

    /// Creates a validation-rejection result.
    pub fn invalid_input(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ResultStatus::InvalidInput,
            payload: reason.into(),
            completed_at: Utc::now(),
        }
    }
}
