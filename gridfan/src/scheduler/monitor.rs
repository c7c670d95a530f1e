//! Deadline-based job monitoring.
//!
//! [`JobMonitor`] drives a batch from submission to a full set of terminal
//! results. It owns every policy decision along the way: validation before
//! backend contact, converting submission failures into failure results,
//! liveness sweeps on a fixed interval, per-job deadline overrides, and the
//! batch deadline that cancels whatever is left and records it as timed
//! out. Timeouts are never errors here; they are results.

use super::batch::BatchState;
use super::config::SchedulerConfig;
use crate::backend::ExecutionBackend;
use crate::job::{JobDescription, JobResult};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Submits jobs and watches them to termination.
///
/// The monitor holds no per-batch state of its own; everything mutable
/// lives in the [`BatchState`] passed through each call, so one monitor can
/// serve consecutive batches (the escalation controller runs two phases
/// through a single monitor).
pub struct JobMonitor {
    backend: Arc<dyn ExecutionBackend>,
    config: SchedulerConfig,
}

impl JobMonitor {
    /// Creates a monitor driving jobs through `backend`.
    pub fn new(backend: Arc<dyn ExecutionBackend>, config: SchedulerConfig) -> Self {
        Self { backend, config }
    }

    /// The backend this monitor submits to.
    pub fn backend(&self) -> &Arc<dyn ExecutionBackend> {
        &self.backend
    }

    /// The monitoring configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Creates a batch with this monitor's deadline budget.
    pub fn new_batch(&self) -> BatchState {
        BatchState::new(self.config.deadline)
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Submits every description into `batch`.
    pub async fn submit_all(&self, batch: &mut BatchState, descriptions: &[JobDescription]) {
        for description in descriptions {
            self.submit_one(batch, description).await;
        }
    }

    /// Submits one description into `batch`.
    ///
    /// Invalid descriptions are recorded as `invalid_input` without any
    /// backend contact, and submission failures become failure results;
    /// neither stops the rest of the batch. A name already running or
    /// already resolved in this batch is skipped outright.
    pub async fn submit_one(&self, batch: &mut BatchState, description: &JobDescription) {
        let name = description.name.as_str();
        if batch.is_in_flight(name) || batch.is_resolved(name) {
            error!(name = %name, "duplicate job name in batch, skipping");
            return;
        }
        batch.admit(name);

        if let Err(reason) = description.validate() {
            warn!(name = %name, %reason, "rejecting invalid job description");
            batch.record(JobResult::invalid_input(name, reason));
            return;
        }

        let tag = batch.tag_for(name);
        match self.backend.submit(description, &tag).await {
            Ok(handle) => {
                debug!(name = %name, backend_id = %handle.backend_id, "job submitted");
                batch.track(handle);
            }
            Err(e) => {
                warn!(name = %name, error = %e, "submission failed");
                batch.record(JobResult::failure(name, format!("submission failed: {e}")));
            }
        }
    }

    // ------------------------------------------------------------------
    // Monitoring
    // ------------------------------------------------------------------

    /// One liveness sweep over everything in flight.
    ///
    /// Returns the names that reached a terminal state during this sweep.
    /// A failed liveness probe leaves the job in flight; the deadline (or
    /// its override) is the backstop when a backend stays unreachable.
    pub async fn poll_step(&self, batch: &mut BatchState) -> Vec<String> {
        let mut settled = Vec::new();
        for name in batch.in_flight_names() {
            let expired = batch
                .handle_mut(&name)
                .map(|handle| handle.override_expired())
                .unwrap_or(false);
            if expired {
                if let Some(mut handle) = batch.take_handle(&name) {
                    info!(name = %name, "job exceeded its own deadline, cancelling");
                    self.backend.cancel(&mut handle).await;
                    batch.record(JobResult::timed_out(&name));
                    settled.push(name);
                }
                continue;
            }

            let alive = match batch.handle_mut(&name) {
                Some(handle) => match self.backend.is_alive(handle).await {
                    Ok(alive) => alive,
                    Err(e) => {
                        warn!(name = %name, error = %e, "liveness probe failed, assuming still running");
                        true
                    }
                },
                None => continue,
            };

            if !alive {
                if let Some(handle) = batch.take_handle(&name) {
                    let result = self.backend.await_result(handle).await;
                    debug!(name = %name, status = %result.status, "job finished");
                    batch.record(result);
                    settled.push(name);
                }
            }
        }
        settled
    }

    /// Drives `batch` until every in-flight job has a terminal result.
    ///
    /// When the batch deadline passes first, everything still in flight is
    /// cancelled and recorded as timed out.
    pub async fn run_to_completion(&self, batch: &mut BatchState) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if batch.all_settled() {
                return;
            }
            if batch.deadline_passed() {
                self.expire_remaining(batch).await;
                return;
            }
            ticker.tick().await;
            self.poll_step(batch).await;
        }
    }

    /// Cancels every in-flight job and records it as timed out.
    pub async fn expire_remaining(&self, batch: &mut BatchState) {
        for name in batch.in_flight_names() {
            if let Some(mut handle) = batch.take_handle(&name) {
                warn!(name = %name, "batch deadline passed, cancelling");
                self.backend.cancel(&mut handle).await;
                batch.record(JobResult::timed_out(&name));
            }
        }
    }

    /// Cancels `name` and removes it from the batch with no result at all,
    /// as if it had never been admitted. Used when a job's outcome stopped
    /// mattering before it finished.
    pub async fn withdraw(&self, batch: &mut BatchState, name: &str) -> bool {
        if let Some(mut handle) = batch.take_handle(name) {
            info!(name = %name, "withdrawing superseded job");
            self.backend.cancel(&mut handle).await;
        }
        batch.withdraw(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::job::{BackendId, JobHandle, ResultChannel, ResultStatus};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;

    /// What the scripted backend does with one job.
    #[derive(Clone)]
    enum Script {
        /// Alive for N liveness probes, then finished with this result.
        FinishAfter(u32, JobResult),
        /// Never finishes on its own.
        Hang,
        /// Submission is rejected.
        Reject,
    }

    #[derive(Default)]
    struct ScriptedBackend {
        scripts: Mutex<HashMap<String, Script>>,
        probes_left: Mutex<HashMap<String, u32>>,
        submissions: Mutex<Vec<String>>,
        cancellations: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn script(self, name: &str, script: Script) -> Self {
            self.scripts.lock().insert(name.to_string(), script);
            self
        }

        fn submitted(&self) -> Vec<String> {
            self.submissions.lock().clone()
        }

        fn cancelled(&self) -> Vec<String> {
            self.cancellations.lock().clone()
        }
    }

    #[async_trait]
    impl ExecutionBackend for ScriptedBackend {
        async fn submit(
            &self,
            description: &JobDescription,
            result_tag: &str,
        ) -> Result<JobHandle, BackendError> {
            self.submissions.lock().push(description.name.clone());
            let script = self.scripts.lock().get(&description.name).cloned();
            if matches!(script, Some(Script::Reject)) {
                return Err(BackendError::Submission("queue rejected".to_string()));
            }
            if let Some(Script::FinishAfter(polls, _)) = &script {
                self.probes_left
                    .lock()
                    .insert(description.name.clone(), *polls);
            }
            Ok(JobHandle::new(
                &description.name,
                BackendId::Foreign(1),
                ResultChannel::StoreTag {
                    tag: result_tag.to_string(),
                    throttled: false,
                },
            )
            .with_timeout_override(description.timeout_override))
        }

        async fn is_alive(&self, handle: &mut JobHandle) -> Result<bool, BackendError> {
            let script = self.scripts.lock().get(&handle.name).cloned();
            match script {
                Some(Script::FinishAfter(..)) => {
                    let mut probes = self.probes_left.lock();
                    let left = probes.entry(handle.name.clone()).or_insert(0);
                    if *left == 0 {
                        Ok(false)
                    } else {
                        *left -= 1;
                        Ok(true)
                    }
                }
                Some(Script::Hang) => Ok(true),
                _ => Ok(false),
            }
        }

        async fn cancel(&self, handle: &mut JobHandle) {
            self.cancellations.lock().push(handle.name.clone());
        }

        async fn await_result(&self, handle: JobHandle) -> JobResult {
            let script = self.scripts.lock().get(&handle.name).cloned();
            match script {
                Some(Script::FinishAfter(_, result)) => result,
                _ => JobResult::failure(&handle.name, "no script"),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn quick_config() -> SchedulerConfig {
        SchedulerConfig::default()
            .with_poll_interval(Duration::from_millis(5))
            .with_deadline(Duration::from_secs(30))
    }

    fn description(name: &str) -> JobDescription {
        JobDescription::new(name, "probe", "/data/run", "unit-1")
    }

    #[tokio::test]
    async fn test_batch_runs_to_full_results() {
        let backend = ScriptedBackend::default()
            .script("a", Script::FinishAfter(1, JobResult::success("a", "ok")))
            .script("b", Script::FinishAfter(2, JobResult::failure("b", "bad")));
        let monitor = JobMonitor::new(Arc::new(backend), quick_config());
        let mut batch = monitor.new_batch();

        monitor
            .submit_all(&mut batch, &[description("a"), description("b")])
            .await;
        monitor.run_to_completion(&mut batch).await;

        assert!(batch.all_settled());
        let results = batch.into_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, ResultStatus::Success);
        assert_eq!(results[1].status, ResultStatus::Failure);
    }

    #[tokio::test]
    async fn test_invalid_description_never_reaches_backend() {
        let backend = Arc::new(ScriptedBackend::default());
        let monitor = JobMonitor::new(backend.clone(), quick_config());
        let mut batch = monitor.new_batch();

        let invalid = JobDescription::new("bad", "", "/data/run", "unit-1");
        monitor.submit_one(&mut batch, &invalid).await;

        assert!(backend.submitted().is_empty());
        assert_eq!(
            batch.results().get("bad").map(|r| r.status),
            Some(ResultStatus::InvalidInput)
        );
    }

    #[tokio::test]
    async fn test_submission_failure_becomes_result_and_batch_continues() {
        let backend = ScriptedBackend::default()
            .script("rejected", Script::Reject)
            .script("fine", Script::FinishAfter(0, JobResult::success("fine", "")));
        let monitor = JobMonitor::new(Arc::new(backend), quick_config());
        let mut batch = monitor.new_batch();

        monitor
            .submit_all(&mut batch, &[description("rejected"), description("fine")])
            .await;
        monitor.run_to_completion(&mut batch).await;

        let results = batch.results();
        assert_eq!(
            results.get("rejected").map(|r| r.status),
            Some(ResultStatus::Failure)
        );
        assert!(results
            .get("rejected")
            .map(|r| r.payload.contains("submission failed"))
            .unwrap_or(false));
        assert_eq!(
            results.get("fine").map(|r| r.status),
            Some(ResultStatus::Success)
        );
    }

    #[tokio::test]
    async fn test_duplicate_name_submitted_once() {
        let backend = Arc::new(ScriptedBackend::default().script(
            "dup",
            Script::FinishAfter(0, JobResult::success("dup", "")),
        ));
        let monitor = JobMonitor::new(backend.clone(), quick_config());
        let mut batch = monitor.new_batch();

        monitor
            .submit_all(&mut batch, &[description("dup"), description("dup")])
            .await;
        monitor.run_to_completion(&mut batch).await;

        assert_eq!(backend.submitted(), vec!["dup"]);
        assert_eq!(batch.into_results().len(), 1);
    }

    #[tokio::test]
    async fn test_deadline_cancels_and_synthesizes_timeout() {
        let backend = Arc::new(ScriptedBackend::default().script("stuck", Script::Hang));
        let config = quick_config().with_deadline(Duration::from_millis(40));
        let monitor = JobMonitor::new(backend.clone(), config);
        let mut batch = monitor.new_batch();

        monitor.submit_one(&mut batch, &description("stuck")).await;
        monitor.run_to_completion(&mut batch).await;

        assert_eq!(backend.cancelled(), vec!["stuck"]);
        let results = batch.into_results();
        assert_eq!(results[0].status, ResultStatus::TimedOut);
    }

    #[tokio::test]
    async fn test_override_expires_before_batch_deadline() {
        let backend = Arc::new(ScriptedBackend::default().script("slow", Script::Hang));
        let monitor = JobMonitor::new(backend.clone(), quick_config());
        let mut batch = monitor.new_batch();

        let desc = description("slow").with_timeout_override(Duration::from_millis(30));
        monitor.submit_one(&mut batch, &desc).await;
        let started = std::time::Instant::now();
        monitor.run_to_completion(&mut batch).await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(backend.cancelled(), vec!["slow"]);
        assert_eq!(batch.into_results()[0].status, ResultStatus::TimedOut);
    }

    #[tokio::test]
    async fn test_withdraw_leaves_no_result() {
        let backend = Arc::new(ScriptedBackend::default().script("extra", Script::Hang));
        let monitor = JobMonitor::new(backend.clone(), quick_config());
        let mut batch = monitor.new_batch();

        monitor.submit_one(&mut batch, &description("extra")).await;
        assert!(monitor.withdraw(&mut batch, "extra").await);

        assert_eq!(backend.cancelled(), vec!["extra"]);
        assert!(batch.all_settled());
        assert!(batch.into_results().is_empty());
    }
}
