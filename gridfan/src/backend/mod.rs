//! Execution backends.
//!
//! A backend turns a [`JobDescription`] into a running external process and
//! hands back a [`JobHandle`] the scheduler monitors. Two implementations
//! exist:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       JobMonitor                           │
//! │      submits, polls liveness, cancels, awaits results      │
//! └─────────────────────────────┬──────────────────────────────┘
//!                               │ dyn ExecutionBackend
//!               ┌───────────────┴───────────────┐
//!               ▼                               ▼
//!     ┌──────────────────┐            ┌──────────────────┐
//!     │   LocalBackend   │            │  RemoteBackend   │
//!     │ in-process pool, │            │ batch queue via  │
//!     │  child processes │            │ submit/status/   │
//!     │  + oneshot wire  │            │ delete programs, │
//!     │                  │            │ results by store │
//!     └──────────────────┘            └──────────────────┘
//! ```
//!
//! Both deliver results the same shape: the job writes (or the backend
//! synthesizes) a [`JobResult`] and the monitor collects it through the
//! handle's channel. Callers never branch on which backend ran a job.

use crate::job::{JobDescription, JobHandle, JobResult};
use crate::store::StoreError;
use async_trait::async_trait;
use thiserror::Error;

mod local;
mod remote;

pub use local::LocalBackend;
pub use remote::{QueuePrograms, RemoteBackend, RemoteBackendConfig};

// ============================================================================
// Errors
// ============================================================================

/// Errors from backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The submission mechanism itself failed: the child could not be
    /// spawned, or the queue submit program exited non-zero.
    #[error("submission failed: {0}")]
    Submission(String),

    /// The queue submit program succeeded but its output did not contain
    /// a recognizable job identifier.
    #[error("no job id in submission output: {0:?}")]
    MalformedJobId(String),

    /// The queue status program could not be run or exited non-zero.
    #[error("status query failed: {0}")]
    StatusQuery(String),

    /// A handle was passed to a backend that did not create it.
    #[error("handle channel does not match this backend")]
    HandleMismatch,

    /// The result store was unreachable past its retry budget.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Filesystem error preparing the job's working directory or log.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Backend Trait
// ============================================================================

/// Contract between the scheduler and a job execution substrate.
///
/// Implementations own the mechanics of launching work and reporting on it;
/// the scheduler owns every policy decision (deadlines, cancellation,
/// escalation). The split keeps the monitor testable against a mock backend
/// and keeps backends free of batch-level state.
///
/// # Handle ownership
///
/// `submit` creates the handle, `is_alive` and `cancel` borrow it, and
/// `await_result` consumes it. A handle is awaited at most once, after
/// `is_alive` has reported the job gone or the scheduler has decided to
/// stop waiting.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Launches the described job.
    ///
    /// `result_tag` is the store key the job (or backend) publishes its
    /// result under; local jobs receive it through the environment, remote
    /// jobs poll the store for it. The returned handle carries the
    /// description's timeout override, if any.
    ///
    /// Errors here mean the job never started. The scheduler records them
    /// as failed results rather than aborting the batch.
    async fn submit(
        &self,
        description: &JobDescription,
        result_tag: &str,
    ) -> Result<JobHandle, BackendError>;

    /// Reports whether the job behind `handle` is still running.
    ///
    /// May stash an already-delivered result on the handle so the
    /// subsequent `await_result` returns without blocking.
    async fn is_alive(&self, handle: &mut JobHandle) -> Result<bool, BackendError>;

    /// Stops the job behind `handle`. Best effort and idempotent; errors
    /// are logged, not returned, because the caller is already discarding
    /// the job.
    async fn cancel(&self, handle: &mut JobHandle);

    /// Collects the job's result, consuming the handle.
    ///
    /// Never fails: delivery problems degrade to a failed [`JobResult`]
    /// so one lost result cannot wedge batch collection.
    async fn await_result(&self, handle: JobHandle) -> JobResult;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
