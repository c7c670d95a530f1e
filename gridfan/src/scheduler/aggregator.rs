//! Batch-wide result aggregation and progress reporting.
//!
//! Provides thread-safe accumulation of job results across a batch, and
//! the single progress figure outside observers see.

use crate::job::JobResult;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// Thread-safe result collection for one batch.
///
/// Progress is an integer between 0 and 100 and never decreases, even when
/// more jobs are admitted mid-batch (escalation does this) or when a
/// superseded result is discarded. 100 means exactly one thing: the batch
/// is finalized and no further results will arrive. Until then the figure
/// is capped at 99 no matter how many jobs have completed, so an observer
/// can treat 100 as "safe to collect".
///
/// # Example
///
/// ```
/// use gridfan::scheduler::ResultAggregator;
/// use gridfan::job::JobResult;
///
/// let aggregator = ResultAggregator::new();
/// aggregator.register(2);
///
/// aggregator.complete(JobResult::success("probe-1", "solved"));
/// assert!(aggregator.progress() < 100);
///
/// aggregator.complete(JobResult::failure("probe-2", "no convergence"));
/// aggregator.finalize();
/// assert_eq!(aggregator.progress(), 100);
/// ```
#[derive(Debug, Default)]
pub struct ResultAggregator {
    /// Terminal results keyed by job name.
    results: DashMap<String, JobResult>,
    /// Jobs admitted to the batch, including ones not yet submitted.
    total: AtomicUsize,
    /// Jobs with a recorded terminal result.
    completed: AtomicUsize,
    /// Set once the batch owner declares no more results will come.
    finalized: AtomicBool,
    /// Highest progress figure ever reported.
    watermark: AtomicU8,
}

impl ResultAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits `count` more jobs into the batch total.
    ///
    /// Anticipated jobs may be registered before they are submitted; that
    /// keeps the progress denominator stable when a later phase of the
    /// batch starts, instead of letting the figure jump backwards.
    pub fn register(&self, count: usize) {
        self.total.fetch_add(count, Ordering::Relaxed);
    }

    /// Removes one admitted-but-unfinished job from the batch total.
    ///
    /// Used when an anticipated job turns out not to be needed. Completed
    /// jobs are never withdrawn.
    pub fn withdraw(&self) {
        let mut total = self.total.load(Ordering::Relaxed);
        while total > 0 {
            match self.total.compare_exchange_weak(
                total,
                total - 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => total = current,
            }
        }
    }

    /// Records a terminal result.
    ///
    /// A repeated result for the same job name overwrites the stored entry
    /// without double-counting it.
    pub fn complete(&self, result: JobResult) {
        let previous = self.results.insert(result.name.clone(), result);
        if previous.is_none() {
            self.completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drops a stored result that a later decision superseded.
    ///
    /// The completion count is left alone so progress never moves
    /// backwards; only the result snapshot shrinks.
    pub fn discard(&self, name: &str) {
        self.results.remove(name);
    }

    /// Declares the batch finished. Progress reads 100 from here on.
    pub fn finalize(&self) {
        self.finalized.store(true, Ordering::Release);
        self.watermark.store(100, Ordering::Release);
    }

    /// Current progress, 0 to 100.
    pub fn progress(&self) -> u8 {
        if self.finalized.load(Ordering::Acquire) {
            return 100;
        }
        let total = self.total.load(Ordering::Relaxed);
        let completed = self.completed.load(Ordering::Relaxed);
        let ratio = if total == 0 {
            0
        } else {
            ((completed * 100) / total).min(99) as u8
        };
        // Monotone: a shrinking ratio never shows through.
        let previous = self.watermark.fetch_max(ratio, Ordering::AcqRel);
        ratio.max(previous)
    }

    /// Jobs admitted so far.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// Jobs with a recorded result.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Snapshot of the stored results.
    pub fn final_results(&self) -> Vec<JobResult> {
        self.results
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ResultStatus;

    #[test]
    fn test_new_aggregator_is_empty() {
        let aggregator = ResultAggregator::new();
        assert_eq!(aggregator.total(), 0);
        assert_eq!(aggregator.completed(), 0);
        assert_eq!(aggregator.progress(), 0);
        assert!(aggregator.final_results().is_empty());
    }

    #[test]
    fn test_progress_caps_at_99_until_finalized() {
        let aggregator = ResultAggregator::new();
        aggregator.register(2);
        aggregator.complete(JobResult::success("a", ""));
        aggregator.complete(JobResult::success("b", ""));

        assert_eq!(aggregator.progress(), 99);
        aggregator.finalize();
        assert_eq!(aggregator.progress(), 100);
    }

    #[test]
    fn test_progress_is_ratio_of_admitted() {
        let aggregator = ResultAggregator::new();
        aggregator.register(4);
        aggregator.complete(JobResult::success("a", ""));
        assert_eq!(aggregator.progress(), 25);
        aggregator.complete(JobResult::success("b", ""));
        assert_eq!(aggregator.progress(), 50);
    }

    #[test]
    fn test_late_registration_never_lowers_progress() {
        let aggregator = ResultAggregator::new();
        aggregator.register(2);
        aggregator.complete(JobResult::success("a", ""));
        aggregator.complete(JobResult::success("b", ""));
        let before = aggregator.progress();
        assert_eq!(before, 99);

        // A second phase joins the batch.
        aggregator.register(2);
        assert!(aggregator.progress() >= before);
    }

    #[test]
    fn test_withdraw_raises_ratio_only() {
        let aggregator = ResultAggregator::new();
        aggregator.register(4);
        aggregator.complete(JobResult::success("a", ""));
        assert_eq!(aggregator.progress(), 25);

        aggregator.withdraw();
        aggregator.withdraw();
        // 1 of 2 remaining.
        assert_eq!(aggregator.progress(), 50);
    }

    #[test]
    fn test_withdraw_on_empty_is_noop() {
        let aggregator = ResultAggregator::new();
        aggregator.withdraw();
        assert_eq!(aggregator.total(), 0);
    }

    #[test]
    fn test_duplicate_completion_counts_once() {
        let aggregator = ResultAggregator::new();
        aggregator.register(2);
        aggregator.complete(JobResult::success("a", "first"));
        aggregator.complete(JobResult::failure("a", "second"));

        assert_eq!(aggregator.completed(), 1);
        let results = aggregator.final_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ResultStatus::Failure);
    }

    #[test]
    fn test_discard_keeps_progress() {
        let aggregator = ResultAggregator::new();
        aggregator.register(2);
        aggregator.complete(JobResult::success("a", ""));
        aggregator.complete(JobResult::success("b", ""));
        let before = aggregator.progress();

        aggregator.discard("b");

        assert!(aggregator.progress() >= before);
        assert_eq!(aggregator.final_results().len(), 1);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let aggregator = Arc::new(ResultAggregator::new());
        aggregator.register(1000);
        let mut handles = vec![];

        for worker in 0..10 {
            let aggregator = Arc::clone(&aggregator);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    aggregator.complete(JobResult::success(format!("job-{worker}-{i}"), ""));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(aggregator.completed(), 1000);
        assert_eq!(aggregator.progress(), 99);
        aggregator.finalize();
        assert_eq!(aggregator.progress(), 100);
    }

    #[test]
    fn test_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ResultAggregator>();
    }
}
