//! Integration tests for the escalation scheduler.
//!
//! These tests drive the EscalationController end to end against a scripted
//! in-memory queue, covering:
//! - Sequential escalation (probes first, fallbacks only for unresolved units)
//! - Concurrent escalation (withdrawal and supersession of fallbacks)
//! - Batch deadline and per-job timeout override synthesis
//! - Validation and submission failures folding into results
//! - Monotonic progress reporting

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use gridfan::backend::{BackendError, ExecutionBackend};
use gridfan::job::{
    BackendId, Cohort, JobDescription, JobHandle, JobResult, ResultChannel, ResultStatus,
};
use gridfan::scheduler::{
    success_status_predicate, BatchOutcome, EscalationController, EscalationMode, SchedulerConfig,
    SuccessPredicate,
};

// =============================================================================
// Test Helpers
// =============================================================================

/// Scripted behavior for one job name on the simulated queue.
#[derive(Clone)]
enum Behavior {
    /// Reported alive for `polls` liveness sweeps, then terminal with this
    /// result.
    Finish { polls: u32, result: JobResult },
    /// Runs until cancelled or expired.
    Hang,
    /// The queue refuses the submission outright.
    Reject,
}

/// In-memory stand-in for a batch queue, scripted per job name.
#[derive(Default)]
struct SimQueue {
    behaviors: Mutex<HashMap<String, Behavior>>,
    polls_left: Mutex<HashMap<String, u32>>,
    submitted: Mutex<Vec<String>>,
    cancelled: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl SimQueue {
    fn finishes(self, name: &str, polls: u32, result: JobResult) -> Self {
        self.behaviors
            .lock()
            .insert(name.to_string(), Behavior::Finish { polls, result });
        self
    }

    fn hangs(self, name: &str) -> Self {
        self.behaviors.lock().insert(name.to_string(), Behavior::Hang);
        self
    }

    fn rejects(self, name: &str) -> Self {
        self.behaviors
            .lock()
            .insert(name.to_string(), Behavior::Reject);
        self
    }

    fn submitted(&self) -> Vec<String> {
        self.submitted.lock().clone()
    }

    fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }
}

#[async_trait]
impl ExecutionBackend for SimQueue {
    async fn submit(
        &self,
        description: &JobDescription,
        result_tag: &str,
    ) -> Result<JobHandle, BackendError> {
        self.submitted.lock().push(description.name.clone());
        let behavior = self.behaviors.lock().get(&description.name).cloned();
        if matches!(behavior, Some(Behavior::Reject)) {
            return Err(BackendError::Submission("queue refused job".to_string()));
        }
        if let Some(Behavior::Finish { polls, .. }) = &behavior {
            self.polls_left
                .lock()
                .insert(description.name.clone(), *polls);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(JobHandle::new(
            &description.name,
            BackendId::Foreign(id),
            ResultChannel::StoreTag {
                tag: result_tag.to_string(),
                throttled: false,
            },
        )
        .with_timeout_override(description.timeout_override))
    }

    async fn is_alive(&self, handle: &mut JobHandle) -> Result<bool, BackendError> {
        let behavior = self.behaviors.lock().get(&handle.name).cloned();
        match behavior {
            Some(Behavior::Finish { .. }) => {
                let mut polls = self.polls_left.lock();
                let left = polls.entry(handle.name.clone()).or_insert(0);
                if *left == 0 {
                    Ok(false)
                } else {
                    *left -= 1;
                    Ok(true)
                }
            }
            Some(Behavior::Hang) => Ok(true),
            _ => Ok(false),
        }
    }

    async fn cancel(&self, handle: &mut JobHandle) {
        self.cancelled.lock().push(handle.name.clone());
    }

    async fn await_result(&self, handle: JobHandle) -> JobResult {
        let behavior = self.behaviors.lock().get(&handle.name).cloned();
        match behavior {
            Some(Behavior::Finish { result, .. }) => result,
            _ => JobResult::failure(&handle.name, "unscripted job"),
        }
    }

    fn name(&self) -> &str {
        "sim-queue"
    }
}

fn quick_config() -> SchedulerConfig {
    SchedulerConfig::default()
        .with_poll_interval(Duration::from_millis(5))
        .with_deadline(Duration::from_secs(30))
}

fn controller(queue: Arc<SimQueue>, mode: EscalationMode) -> EscalationController {
    EscalationController::new(queue, quick_config(), mode, success_status_predicate())
}

fn probe(name: &str, unit: &str) -> JobDescription {
    JobDescription::new(name, "/opt/sim/probe", format!("/data/sim/{name}"), unit)
}

fn fallback(name: &str, unit: &str) -> JobDescription {
    JobDescription::new(name, "/opt/sim/solve", format!("/data/sim/{name}"), unit)
        .with_cohort(Cohort::Expensive)
}

fn status_of(outcome: &BatchOutcome, name: &str) -> Option<ResultStatus> {
    outcome
        .results
        .iter()
        .find(|r| r.name == name)
        .map(|r| r.status)
}

// =============================================================================
// Integration Tests
// =============================================================================

#[tokio::test]
async fn test_sequential_probes_first_then_fallbacks_for_unresolved() {
    let queue = Arc::new(
        SimQueue::default()
            .finishes("probe-1", 1, JobResult::success("probe-1", "hit"))
            .finishes("probe-2", 1, JobResult::success("probe-2", "hit"))
            .finishes("probe-3", 1, JobResult::failure("probe-3", "no result"))
            .finishes("probe-4", 2, JobResult::failure("probe-4", "no result"))
            .finishes("solve-3", 1, JobResult::success("solve-3", "resolved"))
            .finishes("solve-4", 1, JobResult::success("solve-4", "resolved")),
    );
    let controller = controller(queue.clone(), EscalationMode::Sequential);

    let outcome = controller
        .run(vec![
            probe("probe-1", "unit-1"),
            probe("probe-2", "unit-2"),
            probe("probe-3", "unit-3"),
            probe("probe-4", "unit-4"),
            fallback("solve-1", "unit-1"),
            fallback("solve-2", "unit-2"),
            fallback("solve-3", "unit-3"),
            fallback("solve-4", "unit-4"),
        ])
        .await;

    // Fallbacks ran only for the two units the probes did not resolve.
    assert_eq!(outcome.expensive_submitted, 2);
    assert_eq!(outcome.results.len(), 6);
    assert_eq!(outcome.resolved_units.len(), 4);

    let submitted = queue.submitted();
    assert!(!submitted.contains(&"solve-1".to_string()));
    assert!(!submitted.contains(&"solve-2".to_string()));

    // Every probe was on the queue before any fallback.
    let first_solve = submitted
        .iter()
        .position(|n| n.starts_with("solve"))
        .unwrap();
    assert_eq!(first_solve, 4);
    assert!(submitted.iter().take(4).all(|n| n.starts_with("probe")));

    // Withdrawn fallbacks leave no result at all.
    assert!(status_of(&outcome, "solve-1").is_none());
    assert_eq!(status_of(&outcome, "solve-3"), Some(ResultStatus::Success));
    assert_eq!(controller.aggregator().progress(), 100);
}

#[tokio::test]
async fn test_payload_pattern_gates_resolution() {
    let queue = Arc::new(
        SimQueue::default()
            .finishes(
                "probe-1",
                1,
                JobResult::success("probe-1", "finished: diverged"),
            )
            .finishes(
                "solve-1",
                1,
                JobResult::success("solve-1", "finished: converged"),
            ),
    );
    let predicate: SuccessPredicate = Arc::new(|result: &JobResult| {
        result.status.is_success() && result.payload.contains("converged")
    });
    let controller = EscalationController::new(
        queue.clone(),
        quick_config(),
        EscalationMode::Sequential,
        predicate,
    );

    let outcome = controller
        .run(vec![probe("probe-1", "unit-1"), fallback("solve-1", "unit-1")])
        .await;

    // The probe succeeded but its payload missed the pattern, so the unit
    // still escalated and only the fallback resolved it.
    assert_eq!(outcome.expensive_submitted, 1);
    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.resolved_units.contains("unit-1"));
    assert_eq!(status_of(&outcome, "probe-1"), Some(ResultStatus::Success));
    assert_eq!(status_of(&outcome, "solve-1"), Some(ResultStatus::Success));
}

#[tokio::test]
async fn test_concurrent_withdraws_fallback_on_cheap_success() {
    let queue = Arc::new(
        SimQueue::default()
            .finishes("probe-1", 1, JobResult::success("probe-1", "hit"))
            .hangs("solve-1"),
    );
    let controller = controller(queue.clone(), EscalationMode::Concurrent);

    let outcome = controller
        .run(vec![probe("probe-1", "unit-1"), fallback("solve-1", "unit-1")])
        .await;

    // Both cohorts went out together; the fallback was pulled back the
    // moment the probe resolved the unit.
    assert_eq!(outcome.expensive_submitted, 1);
    assert_eq!(queue.cancelled(), vec!["solve-1"]);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].name, "probe-1");
    assert!(outcome.resolved_units.contains("unit-1"));
}

#[tokio::test]
async fn test_concurrent_discards_superseded_fallback_result() {
    let queue = Arc::new(
        SimQueue::default()
            .finishes("probe-1", 2, JobResult::success("probe-1", "late but good"))
            .finishes("solve-1", 0, JobResult::failure("solve-1", "crashed early")),
    );
    let controller = controller(queue.clone(), EscalationMode::Concurrent);

    let outcome = controller
        .run(vec![probe("probe-1", "unit-1"), fallback("solve-1", "unit-1")])
        .await;

    // The fallback failed before the probe finished; once the probe
    // resolved the unit, the fallback's result no longer stands.
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].name, "probe-1");
    assert_eq!(outcome.results[0].status, ResultStatus::Success);
    assert!(outcome.resolved_units.contains("unit-1"));
}

#[tokio::test]
async fn test_deadline_expires_probes_and_skips_fallbacks() {
    let queue = Arc::new(SimQueue::default().hangs("probe-1"));
    let config = quick_config().with_deadline(Duration::from_millis(60));
    let controller = EscalationController::new(
        queue.clone(),
        config,
        EscalationMode::Sequential,
        success_status_predicate(),
    );

    let outcome = controller
        .run(vec![probe("probe-1", "unit-1"), fallback("solve-1", "unit-1")])
        .await;

    // The hung probe was cancelled and recorded as timed out, and the
    // fallback never reached the queue because the budget was spent.
    assert_eq!(status_of(&outcome, "probe-1"), Some(ResultStatus::TimedOut));
    assert_eq!(status_of(&outcome, "solve-1"), Some(ResultStatus::TimedOut));
    assert_eq!(outcome.expensive_submitted, 0);
    assert_eq!(queue.submitted(), vec!["probe-1"]);
    assert_eq!(queue.cancelled(), vec!["probe-1"]);
    assert!(outcome.resolved_units.is_empty());
    assert_eq!(controller.aggregator().progress(), 100);
}

#[tokio::test]
async fn test_timeout_override_escalates_to_fallback() {
    let queue = Arc::new(
        SimQueue::default()
            .hangs("probe-1")
            .finishes("solve-1", 1, JobResult::success("solve-1", "resolved")),
    );
    let controller = controller(queue.clone(), EscalationMode::Sequential);

    let started = Instant::now();
    let outcome = controller
        .run(vec![
            probe("probe-1", "unit-1").with_timeout_override(Duration::from_millis(30)),
            fallback("solve-1", "unit-1"),
        ])
        .await;

    // The probe's own deadline fired long before the 30s batch deadline.
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(status_of(&outcome, "probe-1"), Some(ResultStatus::TimedOut));
    assert_eq!(status_of(&outcome, "solve-1"), Some(ResultStatus::Success));
    assert!(queue.cancelled().contains(&"probe-1".to_string()));
    assert!(outcome.resolved_units.contains("unit-1"));
}

#[tokio::test]
async fn test_invalid_probe_escalates_without_backend_contact() {
    let queue = Arc::new(
        SimQueue::default().finishes("solve-1", 1, JobResult::success("solve-1", "resolved")),
    );
    let controller = controller(queue.clone(), EscalationMode::Sequential);

    let mut bad = probe("probe-1", "unit-1");
    bad.program = String::new();
    let outcome = controller
        .run(vec![bad, fallback("solve-1", "unit-1")])
        .await;

    assert_eq!(
        status_of(&outcome, "probe-1"),
        Some(ResultStatus::InvalidInput)
    );
    assert_eq!(queue.submitted(), vec!["solve-1"]);
    assert_eq!(outcome.expensive_submitted, 1);
    assert_eq!(status_of(&outcome, "solve-1"), Some(ResultStatus::Success));
    assert!(outcome.resolved_units.contains("unit-1"));
}

#[tokio::test]
async fn test_rejected_submission_becomes_failure_and_escalates() {
    let queue = Arc::new(
        SimQueue::default()
            .rejects("probe-1")
            .finishes("probe-2", 1, JobResult::success("probe-2", "hit"))
            .finishes("solve-1", 1, JobResult::success("solve-1", "resolved")),
    );
    let controller = controller(queue.clone(), EscalationMode::Sequential);

    let outcome = controller
        .run(vec![
            probe("probe-1", "unit-1"),
            probe("probe-2", "unit-2"),
            fallback("solve-1", "unit-1"),
            fallback("solve-2", "unit-2"),
        ])
        .await;

    // The refused probe became a failure result, the rest of the batch
    // carried on, and its unit escalated.
    assert_eq!(status_of(&outcome, "probe-1"), Some(ResultStatus::Failure));
    let rejected = outcome
        .results
        .iter()
        .find(|r| r.name == "probe-1")
        .unwrap();
    assert!(rejected.payload.contains("submission failed"));
    assert_eq!(status_of(&outcome, "probe-2"), Some(ResultStatus::Success));
    assert_eq!(outcome.expensive_submitted, 1);
    assert_eq!(status_of(&outcome, "solve-1"), Some(ResultStatus::Success));
    assert!(status_of(&outcome, "solve-2").is_none());
    assert_eq!(outcome.resolved_units.len(), 2);
}

#[tokio::test]
async fn test_progress_climbs_monotonically_to_100() {
    let queue = Arc::new(
        SimQueue::default()
            .finishes("probe-1", 1, JobResult::success("probe-1", "hit"))
            .finishes("probe-2", 2, JobResult::failure("probe-2", "no result"))
            .finishes("probe-3", 3, JobResult::success("probe-3", "hit"))
            .finishes("solve-2", 2, JobResult::success("solve-2", "resolved")),
    );
    let controller = controller(queue.clone(), EscalationMode::Sequential);
    let aggregator = controller.aggregator();

    let samples = Arc::new(Mutex::new(Vec::new()));
    let sampler = {
        let aggregator = Arc::clone(&aggregator);
        let samples = Arc::clone(&samples);
        tokio::spawn(async move {
            loop {
                samples.lock().push(aggregator.progress());
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    };

    let outcome = controller
        .run(vec![
            probe("probe-1", "unit-1"),
            probe("probe-2", "unit-2"),
            probe("probe-3", "unit-3"),
            fallback("solve-1", "unit-1"),
            fallback("solve-2", "unit-2"),
            fallback("solve-3", "unit-3"),
        ])
        .await;
    sampler.abort();
    samples.lock().push(aggregator.progress());

    let samples = samples.lock().clone();
    assert_eq!(*samples.last().unwrap(), 100);
    assert!(samples.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(outcome.results.len(), 4);
    assert!(outcome.resolved_units.contains("unit-2"));
}
