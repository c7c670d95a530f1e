//! In-process worker pool backend.
//!
//! Runs jobs as child processes on the local host, bounded by a worker
//! pool: `submit` blocks while all workers are busy, so admission control
//! falls out of the pool size rather than a separate queue. Each job runs
//! in its own working directory with stdout and stderr folded into a log
//! file there, and its result tag exported through the environment so the
//! program can publish a structured result if it wants to.
//!
//! Result delivery is direct: a waiter task owns the child, watches for
//! exit or cancellation, and sends exactly one [`JobResult`] over a oneshot
//! channel held by the job's handle.

use super::{BackendError, ExecutionBackend};
use crate::job::{
    BackendId, JobDescription, JobHandle, JobResult, ResultChannel, LOG_FILE_NAME,
    RESULT_FILE_NAME, RESULT_TAG_ENV,
};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{oneshot, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long a cancelled job gets to exit after the polite signal before
/// it is killed outright.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Backend that runs jobs as local child processes.
pub struct LocalBackend {
    /// Worker pool: one permit per concurrently running job.
    permits: Arc<Semaphore>,
    /// Grace period between SIGTERM and SIGKILL on cancellation.
    grace: Duration,
}

impl LocalBackend {
    /// Creates a pool running at most `max_workers` jobs at once.
    pub fn new(max_workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_workers.max(1))),
            grace: DEFAULT_CANCEL_GRACE,
        }
    }

    /// Sets the cancellation grace period.
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Number of idle workers right now.
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Asks the child to exit, then kills it if the grace period runs out.
async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: sending a signal to our own child's pid.
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
    }
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        warn!("job ignored termination signal, killing");
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

/// Reads the structured result the job may have left in its working
/// directory. Absent or unreadable files degrade to an empty payload; the
/// exit status already told us whether the job succeeded.
async fn read_result_payload(work_dir: &Path) -> String {
    match tokio::fs::read_to_string(work_dir.join(RESULT_FILE_NAME)).await {
        Ok(contents) => contents.trim().to_string(),
        Err(_) => String::new(),
    }
}

#[async_trait]
impl ExecutionBackend for LocalBackend {
    async fn submit(
        &self,
        description: &JobDescription,
        result_tag: &str,
    ) -> Result<JobHandle, BackendError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BackendError::Submission("worker pool is shut down".to_string()))?;

        tokio::fs::create_dir_all(&description.work_dir).await?;
        let log = std::fs::File::create(description.work_dir.join(LOG_FILE_NAME))?;
        let log_err = log.try_clone()?;

        let mut command = Command::new(&description.program);
        command
            .args(&description.args)
            .current_dir(&description.work_dir)
            .env(RESULT_TAG_ENV, result_tag)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));

        let mut child = command.spawn().map_err(|e| {
            BackendError::Submission(format!("failed to spawn {}: {}", description.program, e))
        })?;
        let pid = child.id().unwrap_or(0);
        debug!(name = %description.name, pid, "spawned local job");

        let (result_tx, result_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let watcher_cancel = cancel.clone();
        let name = description.name.clone();
        let work_dir = description.work_dir.clone();
        let grace = self.grace;

        tokio::spawn(async move {
            let result = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => {
                        let payload = read_result_payload(&work_dir).await;
                        JobResult::success(&name, payload)
                    }
                    Ok(status) => JobResult::failure(
                        &name,
                        format!("exit status {}", status.code().unwrap_or(-1)),
                    ),
                    Err(e) => JobResult::failure(&name, format!("wait failed: {}", e)),
                },
                _ = watcher_cancel.cancelled() => {
                    terminate(&mut child, grace).await;
                    JobResult::failure(&name, "cancelled")
                }
            };
            // The receiver may already be gone if the scheduler synthesized
            // a timeout for this job.
            let _ = result_tx.send(result);
            drop(permit);
        });

        Ok(JobHandle::new(
            &description.name,
            BackendId::Pid(pid),
            ResultChannel::Direct {
                receiver: result_rx,
                cancel,
            },
        )
        .with_timeout_override(description.timeout_override))
    }

    async fn is_alive(&self, handle: &mut JobHandle) -> Result<bool, BackendError> {
        if handle.ready.is_some() {
            return Ok(false);
        }
        match &mut handle.channel {
            ResultChannel::Direct { receiver, .. } => match receiver.try_recv() {
                Ok(result) => {
                    handle.ready = Some(result);
                    Ok(false)
                }
                Err(TryRecvError::Empty) => Ok(true),
                Err(TryRecvError::Closed) => Ok(false),
            },
            ResultChannel::StoreTag { .. } => Err(BackendError::HandleMismatch),
        }
    }

    async fn cancel(&self, handle: &mut JobHandle) {
        match &handle.channel {
            ResultChannel::Direct { cancel, .. } => {
                debug!(name = %handle.name, "cancelling local job");
                cancel.cancel();
            }
            ResultChannel::StoreTag { .. } => {
                warn!(name = %handle.name, "cancel called with a foreign handle");
            }
        }
    }

    async fn await_result(&self, mut handle: JobHandle) -> JobResult {
        if let Some(ready) = handle.ready.take() {
            return ready;
        }
        match handle.channel {
            ResultChannel::Direct { receiver, .. } => match receiver.await {
                Ok(result) => result,
                Err(_) => JobResult::failure(&handle.name, "worker exited without reporting"),
            },
            ResultChannel::StoreTag { .. } => {
                JobResult::failure(&handle.name, "handle does not belong to this backend")
            }
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}
