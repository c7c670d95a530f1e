//! Batch queue backend.
//!
//! Submits jobs to a grid-engine style batch queue through its command line
//! programs (`qsub`, `qstat`, `qdel` by default) and collects results
//! through the store: every submitted job receives a result tag in its
//! environment and is expected to publish a serialized [`JobResult`] under
//! that key when it finishes.
//!
//! Liveness comes from the queue's status listing. The listing covers every
//! job at once, so it is fetched once per freshness window and shared by all
//! handles instead of shelling out per job per poll.
//!
//! An optional store-backed slot semaphore throttles how many jobs this
//! backend has outstanding, across every process submitting against the
//! same key. The slot is taken before `qsub` runs and returned when the
//! job's result is collected or the job is cancelled.

use super::{BackendError, ExecutionBackend};
use crate::job::{
    BackendId, JobDescription, JobHandle, JobResult, ResultChannel, LOG_FILE_NAME, RESULT_TAG_ENV,
};
use crate::store::{SlotSemaphore, StoreClient};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How long to keep waiting for a result to appear in the store after the
/// job has left the queue.
pub const DEFAULT_RESULT_GRACE: Duration = Duration::from_secs(120);

/// How often to re-read the result key while waiting.
pub const DEFAULT_RESULT_POLL: Duration = Duration::from_millis(200);

/// How long one queue status listing stays fresh.
pub const DEFAULT_STATUS_CACHE_TTL: Duration = Duration::from_millis(150);

// ============================================================================
// Configuration
// ============================================================================

/// The queue's command line programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePrograms {
    /// Submission program.
    pub submit: String,
    /// Status listing program.
    pub status: String,
    /// Deletion program.
    pub delete: String,
}

impl Default for QueuePrograms {
    fn default() -> Self {
        Self {
            submit: "qsub".to_string(),
            status: "qstat".to_string(),
            delete: "qdel".to_string(),
        }
    }
}

/// Settings for the queue backend.
#[derive(Debug, Clone)]
pub struct RemoteBackendConfig {
    /// Queue programs to shell out to.
    pub programs: QueuePrograms,
    /// Queue to route jobs to when the description has no hint.
    pub default_queue: Option<String>,
    /// Resource request passed with `-l` on every submission.
    pub resource_spec: Option<String>,
    /// How long to wait for a published result once the job leaves the queue.
    pub result_grace: Duration,
    /// Poll interval on the result key.
    pub result_poll: Duration,
    /// Freshness window for the shared status listing.
    pub status_cache_ttl: Duration,
}

impl Default for RemoteBackendConfig {
    fn default() -> Self {
        Self {
            programs: QueuePrograms::default(),
            default_queue: None,
            resource_spec: None,
            result_grace: DEFAULT_RESULT_GRACE,
            result_poll: DEFAULT_RESULT_POLL,
            status_cache_ttl: DEFAULT_STATUS_CACHE_TTL,
        }
    }
}

impl From<&crate::config::RemoteSettings> for RemoteBackendConfig {
    fn from(settings: &crate::config::RemoteSettings) -> Self {
        Self {
            programs: QueuePrograms {
                submit: settings.submit_program.clone(),
                status: settings.status_program.clone(),
                delete: settings.delete_program.clone(),
            },
            default_queue: settings.default_queue.clone(),
            resource_spec: settings.resource_spec.clone(),
            result_grace: Duration::from_secs(settings.result_grace_secs),
            result_poll: DEFAULT_RESULT_POLL,
            status_cache_ttl: DEFAULT_STATUS_CACHE_TTL,
        }
    }
}

// ============================================================================
// Parsing helpers
// ============================================================================

/// Pulls the queue's numeric job id out of submission output.
///
/// Handles both terse output (the id alone, possibly with an array-task
/// suffix like `3187519.1-1000:1`) and the verbose banner
/// (`Your job 3187519 ("name") has been submitted`): the first token with a
/// leading run of digits wins.
fn parse_job_id(output: &str) -> Option<u64> {
    for token in output.split_whitespace() {
        let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            continue;
        }
        if let Ok(id) = digits.parse::<u64>() {
            return Some(id);
        }
    }
    None
}

/// Extracts the set of live job ids from a status listing.
///
/// Each data row starts with the job id; header and rule lines contribute
/// nothing because they do not start with digits.
fn parse_status_listing(listing: &str) -> HashSet<u64> {
    let mut ids = HashSet::new();
    for line in listing.lines() {
        let Some(first) = line.split_whitespace().next() else {
            continue;
        };
        let digits: String = first.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            continue;
        }
        if let Ok(id) = digits.parse::<u64>() {
            ids.insert(id);
        }
    }
    ids
}

// ============================================================================
// Backend
// ============================================================================

/// Backend that hands jobs to an external batch queue.
pub struct RemoteBackend {
    config: RemoteBackendConfig,
    store: Arc<StoreClient>,
    /// Last status listing and when it was taken. Shared across handles so
    /// a poll sweep costs one status program run, not one per job.
    status_cache: Mutex<Option<(Instant, HashSet<u64>)>>,
    throttle: Option<SlotSemaphore>,
}

impl RemoteBackend {
    /// Creates a queue backend publishing and collecting through `store`.
    pub fn new(config: RemoteBackendConfig, store: Arc<StoreClient>) -> Self {
        Self {
            config,
            store,
            status_cache: Mutex::new(None),
            throttle: None,
        }
    }

    /// Caps outstanding submissions with a store-backed slot semaphore.
    pub fn with_throttle(mut self, key: impl Into<String>, slots: usize) -> Self {
        self.throttle = Some(SlotSemaphore::new(self.store.clone(), key, slots));
        self
    }

    /// Drops the throttle's backing list. Call when a batch is finished
    /// with the backend.
    pub async fn teardown_throttle(&self) {
        if let Some(throttle) = &self.throttle {
            if let Err(e) = throttle.teardown().await {
                warn!(error = %e, "failed to tear down submission throttle");
            }
        }
    }

    /// Renders the submission program's argument list for `description`.
    ///
    /// The job inherits the caller's environment, runs in its working
    /// directory, and writes its log there; the result tag rides along in
    /// the exported environment.
    fn render_submission(&self, description: &JobDescription) -> Vec<String> {
        let mut args = vec![
            "-cwd".to_string(),
            "-V".to_string(),
            "-b".to_string(),
            "y".to_string(),
            "-terse".to_string(),
            "-N".to_string(),
            description.name.clone(),
        ];
        let queue = description
            .queue_hint
            .as_deref()
            .or(self.config.default_queue.as_deref());
        if let Some(queue) = queue {
            args.push("-q".to_string());
            args.push(queue.to_string());
        }
        if let Some(resource) = &self.config.resource_spec {
            args.push("-l".to_string());
            args.push(resource.clone());
        }
        args.push("-o".to_string());
        args.push(LOG_FILE_NAME.to_string());
        args.push("-j".to_string());
        args.push("y".to_string());
        args.push(description.program.clone());
        args.extend(description.args.iter().cloned());
        args
    }

    /// Runs the submission program and builds the handle. Does not touch
    /// the throttle; `submit` owns slot bookkeeping.
    async fn submit_inner(
        &self,
        description: &JobDescription,
        result_tag: &str,
        throttled: bool,
    ) -> Result<JobHandle, BackendError> {
        tokio::fs::create_dir_all(&description.work_dir).await?;

        let output = Command::new(&self.config.programs.submit)
            .args(self.render_submission(description))
            .current_dir(&description.work_dir)
            .env(RESULT_TAG_ENV, result_tag)
            .output()
            .await
            .map_err(|e| {
                BackendError::Submission(format!(
                    "failed to run {}: {}",
                    self.config.programs.submit, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Submission(format!(
                "{} exited with {}: {}",
                self.config.programs.submit,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let job_id = parse_job_id(&stdout)
            .ok_or_else(|| BackendError::MalformedJobId(stdout.trim().to_string()))?;
        info!(name = %description.name, job_id, "submitted to batch queue");

        Ok(JobHandle::new(
            &description.name,
            BackendId::Foreign(job_id),
            ResultChannel::StoreTag {
                tag: result_tag.to_string(),
                throttled,
            },
        )
        .with_timeout_override(description.timeout_override))
    }

    /// Returns the current live job ids, reusing a recent listing when one
    /// is fresh enough.
    async fn live_jobs(&self) -> Result<HashSet<u64>, BackendError> {
        {
            let cache = self.status_cache.lock();
            if let Some((taken, ids)) = cache.as_ref() {
                if taken.elapsed() < self.config.status_cache_ttl {
                    return Ok(ids.clone());
                }
            }
        }

        let output = Command::new(&self.config.programs.status)
            .output()
            .await
            .map_err(|e| {
                BackendError::StatusQuery(format!(
                    "failed to run {}: {}",
                    self.config.programs.status, e
                ))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::StatusQuery(format!(
                "{} exited with {}: {}",
                self.config.programs.status,
                output.status,
                stderr.trim()
            )));
        }

        let ids = parse_status_listing(&String::from_utf8_lossy(&output.stdout));
        *self.status_cache.lock() = Some((Instant::now(), ids.clone()));
        Ok(ids)
    }

    /// Returns one throttle slot, if this backend carries a throttle.
    async fn release_slot(&self) {
        if let Some(throttle) = &self.throttle {
            if let Err(e) = throttle.release().await {
                warn!(error = %e, "failed to release submission slot");
            }
        }
    }
}

#[async_trait]
impl ExecutionBackend for RemoteBackend {
    async fn submit(
        &self,
        description: &JobDescription,
        result_tag: &str,
    ) -> Result<JobHandle, BackendError> {
        let throttled = match &self.throttle {
            Some(throttle) => {
                throttle.acquire().await?;
                true
            }
            None => false,
        };

        match self.submit_inner(description, result_tag, throttled).await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                // The job never made it into the queue, so its slot goes
                // straight back.
                if throttled {
                    self.release_slot().await;
                }
                Err(e)
            }
        }
    }

    async fn is_alive(&self, handle: &mut JobHandle) -> Result<bool, BackendError> {
        let BackendId::Foreign(job_id) = handle.backend_id else {
            return Err(BackendError::HandleMismatch);
        };
        let live = self.live_jobs().await?;
        Ok(live.contains(&job_id))
    }

    async fn cancel(&self, handle: &mut JobHandle) {
        let BackendId::Foreign(job_id) = handle.backend_id else {
            warn!(name = %handle.name, "cancel called with a handle this backend did not create");
            return;
        };
        debug!(name = %handle.name, job_id, "deleting job from batch queue");

        match Command::new(&self.config.programs.delete)
            .arg(job_id.to_string())
            .output()
            .await
        {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(job_id, stderr = %stderr.trim(), "queue deletion reported an error");
            }
            Err(e) => warn!(job_id, error = %e, "failed to run queue deletion program"),
        }

        if let ResultChannel::StoreTag { tag, throttled } = &mut handle.channel {
            // A cancelled job may still have published before it died.
            if let Err(e) = self.store.delete(tag).await {
                warn!(tag = %tag.as_str(), error = %e, "failed to clear result key");
            }
            if *throttled {
                *throttled = false;
                self.release_slot().await;
            }
        }
    }

    async fn await_result(&self, handle: JobHandle) -> JobResult {
        let ResultChannel::StoreTag { tag, throttled } = &handle.channel else {
            return JobResult::failure(&handle.name, "handle does not belong to this backend");
        };
        let deadline = Instant::now() + self.config.result_grace;

        loop {
            match self.store.get(tag).await {
                Ok(Some(serialized)) => {
                    if let Err(e) = self.store.delete(tag).await {
                        warn!(tag = %tag.as_str(), error = %e, "failed to clear result key");
                    }
                    if *throttled {
                        self.release_slot().await;
                    }
                    return match serde_json::from_str::<JobResult>(&serialized) {
                        Ok(mut result) => {
                            result.name = handle.name.clone();
                            result
                        }
                        Err(e) => JobResult::failure(
                            &handle.name,
                            format!("unparseable result payload: {}", e),
                        ),
                    };
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!(name = %handle.name, "job left the queue without publishing a result");
                        if *throttled {
                            self.release_slot().await;
                        }
                        return JobResult::failure(
                            &handle.name,
                            "no result published within the grace period",
                        );
                    }
                    tokio::time::sleep(self.config.result_poll).await;
                }
                Err(e) => {
                    if *throttled {
                        self.release_slot().await;
                    }
                    return JobResult::failure(&handle.name, format!("store unavailable: {}", e));
                }
            }
        }
    }

    fn name(&self) -> &str {
        "remote"
    }
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("programs", &self.config.programs)
            .field("throttled", &self.throttle.is_some())
            .finish()
    }
}
