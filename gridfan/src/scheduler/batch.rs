//! Per-batch bookkeeping.
//!
//! [`BatchState`] owns everything the monitor knows about one batch: which
//! names were admitted, the handles still in flight, the terminal results,
//! and the batch deadline. A job name lives in exactly one of the two maps
//! at any time; recording a result moves it from in-flight to completed and
//! that move is the only way across.

use super::aggregator::ResultAggregator;
use crate::job::{JobHandle, JobResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Process-wide batch counter; ids only need to be unique per process run
/// because they are namespaced into result tags alongside the job name.
static NEXT_BATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Mutable state for one batch of jobs.
#[derive(Debug)]
pub struct BatchState {
    batch_id: u64,
    /// Names ever admitted to this batch, including anticipated jobs that
    /// have not been submitted yet.
    admitted: HashSet<String>,
    /// Jobs currently running (or anticipated) on a backend, by name.
    in_flight: HashMap<String, JobHandle>,
    /// Terminal results, by name. Disjoint from `in_flight`.
    completed: HashMap<String, JobResult>,
    deadline: Instant,
    aggregator: Arc<ResultAggregator>,
}

impl BatchState {
    /// Creates a batch whose deadline is `budget` from now.
    pub fn new(budget: Duration) -> Self {
        Self::with_aggregator(budget, Arc::new(ResultAggregator::new()))
    }

    /// Creates a batch reporting into an existing aggregator, so an
    /// observer can hold the progress figure before the batch starts.
    pub fn with_aggregator(budget: Duration, aggregator: Arc<ResultAggregator>) -> Self {
        Self {
            batch_id: NEXT_BATCH_ID.fetch_add(1, Ordering::Relaxed),
            admitted: HashSet::new(),
            in_flight: HashMap::new(),
            completed: HashMap::new(),
            deadline: Instant::now() + budget,
            aggregator,
        }
    }

    /// This batch's process-unique id.
    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    /// The store key a job in this batch publishes its result under.
    pub fn tag_for(&self, name: &str) -> String {
        format!("gridfan:{}:{}", self.batch_id, name)
    }

    /// Shared progress aggregator.
    pub fn aggregator(&self) -> Arc<ResultAggregator> {
        Arc::clone(&self.aggregator)
    }

    /// When the batch deadline lands.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// True once the batch budget is exhausted.
    pub fn deadline_passed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    // ------------------------------------------------------------------
    // Admission
    // ------------------------------------------------------------------

    /// Admits `name` into the batch. Returns false if the name was already
    /// admitted; duplicates are never run twice.
    pub fn admit(&mut self, name: &str) -> bool {
        if !self.admitted.insert(name.to_string()) {
            return false;
        }
        self.aggregator.register(1);
        true
    }

    /// True if `name` was ever admitted.
    pub fn contains(&self, name: &str) -> bool {
        self.admitted.contains(name)
    }

    /// Removes an admitted job that will never run (or was cancelled before
    /// completing). No-op for jobs that already have a result.
    pub fn withdraw(&mut self, name: &str) -> bool {
        if self.completed.contains_key(name) {
            return false;
        }
        if !self.admitted.remove(name) {
            return false;
        }
        self.in_flight.remove(name);
        self.aggregator.withdraw();
        true
    }

    // ------------------------------------------------------------------
    // In-flight jobs
    // ------------------------------------------------------------------

    /// Starts tracking a submitted job.
    pub fn track(&mut self, handle: JobHandle) {
        self.in_flight.insert(handle.name.clone(), handle);
    }

    /// Takes ownership of an in-flight handle, e.g. to await its result.
    pub fn take_handle(&mut self, name: &str) -> Option<JobHandle> {
        self.in_flight.remove(name)
    }

    /// Borrows an in-flight handle mutably, e.g. for a liveness probe.
    pub fn handle_mut(&mut self, name: &str) -> Option<&mut JobHandle> {
        self.in_flight.get_mut(name)
    }

    /// True while `name` has a live handle.
    pub fn is_in_flight(&self, name: &str) -> bool {
        self.in_flight.contains_key(name)
    }

    /// Names of every job still in flight.
    pub fn in_flight_names(&self) -> Vec<String> {
        self.in_flight.keys().cloned().collect()
    }

    /// Number of jobs still in flight.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// True once nothing is left in flight.
    pub fn all_settled(&self) -> bool {
        self.in_flight.is_empty()
    }

    // ------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------

    /// Records a terminal result, moving the name out of the in-flight set.
    ///
    /// A second result for the same name is dropped: the first terminal
    /// state wins, and a late duplicate usually means a cancelled job
    /// managed to report before dying.
    pub fn record(&mut self, result: JobResult) {
        if self.completed.contains_key(&result.name) {
            warn!(name = %result.name, status = %result.status, "dropping duplicate result");
            return;
        }
        self.in_flight.remove(&result.name);
        self.aggregator.complete(result.clone());
        self.completed.insert(result.name.clone(), result);
    }

    /// True once `name` has a terminal result.
    pub fn is_resolved(&self, name: &str) -> bool {
        self.completed.contains_key(name)
    }

    /// Drops a stored result that a later decision superseded.
    pub fn discard(&mut self, name: &str) -> Option<JobResult> {
        let removed = self.completed.remove(name);
        if removed.is_some() {
            self.aggregator.discard(name);
        }
        removed
    }

    /// The recorded results, by name.
    pub fn results(&self) -> &HashMap<String, JobResult> {
        &self.completed
    }

    /// Consumes the batch, returning results sorted by job name.
    pub fn into_results(self) -> Vec<JobResult> {
        let mut results: Vec<JobResult> = self.completed.into_values().collect();
        results.sort_by(|a, b| a.name.cmp(&b.name));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{BackendId, ResultChannel, ResultStatus};

    fn store_handle(name: &str) -> JobHandle {
        JobHandle::new(
            name,
            BackendId::Foreign(1),
            ResultChannel::StoreTag {
                tag: format!("t:{name}"),
                throttled: false,
            },
        )
    }

    #[test]
    fn test_batch_ids_are_unique() {
        let a = BatchState::new(Duration::from_secs(60));
        let b = BatchState::new(Duration::from_secs(60));
        assert_ne!(a.batch_id(), b.batch_id());
    }

    #[test]
    fn test_tag_embeds_batch_and_name() {
        let batch = BatchState::new(Duration::from_secs(60));
        let tag = batch.tag_for("probe-1");
        assert_eq!(tag, format!("gridfan:{}:probe-1", batch.batch_id()));
    }

    #[test]
    fn test_admit_rejects_duplicates() {
        let mut batch = BatchState::new(Duration::from_secs(60));
        assert!(batch.admit("probe-1"));
        assert!(!batch.admit("probe-1"));
        assert_eq!(batch.aggregator().total(), 1);
    }

    #[test]
    fn test_record_moves_name_across_partition() {
        let mut batch = BatchState::new(Duration::from_secs(60));
        batch.admit("probe-1");
        batch.track(store_handle("probe-1"));
        assert_eq!(batch.in_flight_len(), 1);
        assert!(!batch.is_resolved("probe-1"));

        batch.record(JobResult::success("probe-1", ""));

        assert_eq!(batch.in_flight_len(), 0);
        assert!(batch.is_resolved("probe-1"));
    }

    #[test]
    fn test_duplicate_result_is_dropped() {
        let mut batch = BatchState::new(Duration::from_secs(60));
        batch.admit("probe-1");
        batch.record(JobResult::success("probe-1", "first"));
        batch.record(JobResult::failure("probe-1", "late duplicate"));

        let results = batch.into_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ResultStatus::Success);
    }

    #[test]
    fn test_withdraw_removes_unfinished_only() {
        let mut batch = BatchState::new(Duration::from_secs(60));
        batch.admit("running");
        batch.track(store_handle("running"));
        batch.admit("finished");
        batch.record(JobResult::success("finished", ""));

        assert!(batch.withdraw("running"));
        assert!(!batch.withdraw("finished"));
        assert!(!batch.withdraw("never-admitted"));

        assert_eq!(batch.in_flight_len(), 0);
        assert!(batch.is_resolved("finished"));
        assert_eq!(batch.aggregator().total(), 1);
    }

    #[test]
    fn test_discard_drops_superseded_result() {
        let mut batch = BatchState::new(Duration::from_secs(60));
        batch.admit("probe-1");
        batch.record(JobResult::success("probe-1", ""));

        let removed = batch.discard("probe-1");
        assert!(removed.is_some());
        assert!(!batch.is_resolved("probe-1"));
        assert!(batch.discard("probe-1").is_none());
    }

    #[test]
    fn test_into_results_sorted_by_name() {
        let mut batch = BatchState::new(Duration::from_secs(60));
        for name in ["c-job", "a-job", "b-job"] {
            batch.admit(name);
            batch.record(JobResult::success(name, ""));
        }

        let names: Vec<String> = batch.into_results().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["a-job", "b-job", "c-job"]);
    }

    #[test]
    fn test_deadline_passes() {
        let batch = BatchState::new(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(batch.deadline_passed());

        let batch = BatchState::new(Duration::from_secs(3600));
        assert!(!batch.deadline_passed());
    }
}
