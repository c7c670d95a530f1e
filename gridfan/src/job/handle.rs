//! Job handles.
//!
//! A [`JobHandle`] is created when a description is submitted to a backend
//! and is owned exclusively by the monitor until the job terminates. It is
//! consumed by `await_result`, or dropped after cancellation; a handle never
//! outlives its batch.

use super::result::JobResult;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Backend Id
// =============================================================================

/// Identifier the backend uses for liveness polling and cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendId {
    /// OS process id of a locally spawned child.
    Pid(u32),
    /// Foreign job id assigned by the remote batch queue.
    Foreign(u64),
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendId::Pid(pid) => write!(f, "pid:{pid}"),
            BackendId::Foreign(id) => write!(f, "queue:{id}"),
        }
    }
}

// =============================================================================
// Result Channel
// =============================================================================

/// How a job's result travels back to the monitor.
pub enum ResultChannel {
    /// Direct in-process channel from a local worker, plus the token used
    /// for cooperative cancellation of that worker.
    Direct {
        receiver: oneshot::Receiver<JobResult>,
        cancel: CancellationToken,
    },
    /// Out-of-band correlation through the store: the job publishes its
    /// result JSON under this tag before exiting.
    StoreTag {
        tag: String,
        /// Whether this job holds an admission-throttle slot that must be
        /// released exactly once on any terminal path.
        throttled: bool,
    },
}

impl fmt::Debug for ResultChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultChannel::Direct { .. } => f.write_str("Direct"),
            ResultChannel::StoreTag { tag, throttled } => f
                .debug_struct("StoreTag")
                .field("tag", tag)
                .field("throttled", throttled)
                .finish(),
        }
    }
}

// =============================================================================
// Job Handle
// =============================================================================

/// Live handle for a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    /// Job name (the batch-unique result key).
    pub name: String,

    /// Backend identifier for liveness polling and cancellation.
    pub backend_id: BackendId,

    /// Result return path.
    pub channel: ResultChannel,

    /// When the job was submitted.
    pub started_at: Instant,

    /// Per-job deadline override copied from the description.
    pub timeout_override: Option<Duration>,

    /// Result observed by a liveness probe before `await_result` ran.
    pub(crate) ready: Option<JobResult>,
}

impl JobHandle {
    /// Creates a handle for a freshly submitted job.
    pub fn new(name: impl Into<String>, backend_id: BackendId, channel: ResultChannel) -> Self {
        Self {
            name: name.into(),
            backend_id,
            channel,
            started_at: Instant::now(),
            timeout_override: None,
            ready: None,
        }
    }

    /// Sets the per-job timeout override.
    pub fn with_timeout_override(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_override = timeout;
        self
    }

    /// Returns true once the per-job override deadline has passed.
    ///
    /// Always false for jobs without an override; the batch deadline is
    /// checked separately by the monitor.
    pub fn override_expired(&self) -> bool {
        self.timeout_override
            .map(|limit| self.started_at.elapsed() >= limit)
            .unwrap_or(false)
    }
}
