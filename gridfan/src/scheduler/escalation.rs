//! Cheap-probe / expensive-fallback escalation.
//!
//! A batch is split into two cohorts keyed by `unit_key`: cheap probes and
//! their expensive fallbacks. A unit whose cheap probe succeeds is resolved
//! and its fallback never needs to run. Two strategies exist:
//!
//! - **Sequential** (the default): the cheap cohort runs to completion
//!   first, then fallbacks are submitted only for units the probes did not
//!   resolve. This spends no fallback capacity on units the probes handle,
//!   at the cost of the fallback phase starting late.
//! - **Concurrent**: both cohorts are submitted at once. The moment a cheap
//!   probe resolves its unit, the in-flight fallback for that unit is
//!   withdrawn; a fallback result that slips in after resolution is
//!   discarded as superseded. Lower latency, some wasted fallback work.
//!
//! Either way a unit is resolved at most once, and both cohorts share one
//! batch deadline and one progress figure.

use super::aggregator::ResultAggregator;
use super::batch::BatchState;
use super::config::SchedulerConfig;
use super::monitor::JobMonitor;
use crate::backend::ExecutionBackend;
use crate::job::{Cohort, JobDescription, JobResult};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

// =============================================================================
// Escalation Mode
// =============================================================================

/// How the two cohorts are interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscalationMode {
    /// Cheap cohort fully resolves before any fallback is submitted.
    #[default]
    Sequential,
    /// Both cohorts run at once; fallbacks are withdrawn on resolution.
    Concurrent,
}

impl fmt::Display for EscalationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationMode::Sequential => write!(f, "sequential"),
            EscalationMode::Concurrent => write!(f, "concurrent"),
        }
    }
}

impl FromStr for EscalationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(EscalationMode::Sequential),
            "concurrent" => Ok(EscalationMode::Concurrent),
            other => Err(format!("unknown escalation mode: {other}")),
        }
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// What a finished escalation run produced.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Every terminal result, sorted by job name.
    pub results: Vec<JobResult>,
    /// Units resolved by either cohort.
    pub resolved_units: HashSet<String>,
    /// How many fallback jobs were actually submitted.
    pub expensive_submitted: usize,
}

/// Decides whether a result resolves its unit.
pub type SuccessPredicate = Arc<dyn Fn(&JobResult) -> bool + Send + Sync>;

/// Predicate accepting any successful result.
pub fn success_status_predicate() -> SuccessPredicate {
    Arc::new(|result: &JobResult| result.status.is_success())
}

// =============================================================================
// Controller
// =============================================================================

/// Runs a two-cohort batch through a [`JobMonitor`].
pub struct EscalationController {
    monitor: JobMonitor,
    mode: EscalationMode,
    predicate: SuccessPredicate,
    aggregator: Arc<ResultAggregator>,
}

impl EscalationController {
    /// Creates a controller over `backend`.
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        config: SchedulerConfig,
        mode: EscalationMode,
        predicate: SuccessPredicate,
    ) -> Self {
        Self {
            monitor: JobMonitor::new(backend, config),
            mode,
            predicate,
            aggregator: Arc::new(ResultAggregator::new()),
        }
    }

    /// The progress aggregator, for observers. Reads 100 only once
    /// [`run`](Self::run) has returned.
    pub fn aggregator(&self) -> Arc<ResultAggregator> {
        Arc::clone(&self.aggregator)
    }

    /// Runs the whole batch to a full set of terminal results.
    pub async fn run(&self, descriptions: Vec<JobDescription>) -> BatchOutcome {
        let unit_of: HashMap<String, String> = descriptions
            .iter()
            .map(|d| (d.name.clone(), d.unit_key.clone()))
            .collect();
        let (cheap, expensive): (Vec<_>, Vec<_>) = descriptions
            .into_iter()
            .partition(|d| d.cohort == Cohort::Cheap);
        info!(
            mode = %self.mode,
            cheap = cheap.len(),
            expensive = expensive.len(),
            "starting batch"
        );

        let (batch, expensive_submitted) = match self.mode {
            EscalationMode::Sequential => self.run_sequential(cheap, expensive).await,
            EscalationMode::Concurrent => self.run_concurrent(cheap, expensive).await,
        };
        self.aggregator.finalize();

        let mut resolved_units = HashSet::new();
        for result in batch.results().values() {
            if (self.predicate)(result) {
                if let Some(unit) = unit_of.get(&result.name) {
                    resolved_units.insert(unit.clone());
                }
            }
        }
        info!(
            results = batch.results().len(),
            resolved = resolved_units.len(),
            "batch finished"
        );

        BatchOutcome {
            results: batch.into_results(),
            resolved_units,
            expensive_submitted,
        }
    }

    /// Cheap phase to completion, then fallbacks for unresolved units.
    async fn run_sequential(
        &self,
        cheap: Vec<JobDescription>,
        expensive: Vec<JobDescription>,
    ) -> (BatchState, usize) {
        let mut batch = BatchState::with_aggregator(
            self.monitor.config().deadline,
            Arc::clone(&self.aggregator),
        );
        // Anticipate the fallback phase in the progress denominator now, so
        // the figure holds steady instead of dropping when phase two starts.
        for description in &expensive {
            batch.admit(&description.name);
        }

        self.monitor.submit_all(&mut batch, &cheap).await;
        self.monitor.run_to_completion(&mut batch).await;

        let mut resolved = HashSet::new();
        for description in &cheap {
            if let Some(result) = batch.results().get(&description.name) {
                if (self.predicate)(result) {
                    resolved.insert(description.unit_key.as_str());
                }
            }
        }

        let mut fallbacks = Vec::new();
        for description in expensive {
            if resolved.contains(description.unit_key.as_str()) {
                debug!(
                    name = %description.name,
                    unit = %description.unit_key,
                    "unit resolved cheaply, fallback not needed"
                );
                batch.withdraw(&description.name);
            } else {
                fallbacks.push(description);
            }
        }

        let mut expensive_submitted = 0;
        if !fallbacks.is_empty() {
            if batch.deadline_passed() {
                for description in &fallbacks {
                    warn!(
                        name = %description.name,
                        "batch deadline passed before the fallback could run"
                    );
                    batch.record(JobResult::timed_out(&description.name));
                }
            } else {
                expensive_submitted = fallbacks.len();
                info!(count = expensive_submitted, "escalating unresolved units");
                self.monitor.submit_all(&mut batch, &fallbacks).await;
                self.monitor.run_to_completion(&mut batch).await;
            }
        }
        (batch, expensive_submitted)
    }

    /// Both cohorts at once; fallbacks withdrawn as units resolve.
    async fn run_concurrent(
        &self,
        cheap: Vec<JobDescription>,
        expensive: Vec<JobDescription>,
    ) -> (BatchState, usize) {
        let mut batch = BatchState::with_aggregator(
            self.monitor.config().deadline,
            Arc::clone(&self.aggregator),
        );
        let cheap_names: HashSet<String> = cheap.iter().map(|d| d.name.clone()).collect();
        let unit_of: HashMap<String, String> = cheap
            .iter()
            .chain(expensive.iter())
            .map(|d| (d.name.clone(), d.unit_key.clone()))
            .collect();
        let mut fallbacks_of: HashMap<String, Vec<String>> = HashMap::new();
        for description in &expensive {
            fallbacks_of
                .entry(description.unit_key.clone())
                .or_default()
                .push(description.name.clone());
        }

        self.monitor.submit_all(&mut batch, &cheap).await;
        let expensive_submitted = expensive.len();
        self.monitor.submit_all(&mut batch, &expensive).await;

        let mut resolved: HashSet<String> = HashSet::new();
        let mut ticker = tokio::time::interval(self.monitor.config().poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if batch.all_settled() {
                break;
            }
            if batch.deadline_passed() {
                self.monitor.expire_remaining(&mut batch).await;
                break;
            }
            ticker.tick().await;
            let settled = self.monitor.poll_step(&mut batch).await;
            for name in settled {
                self.apply_resolution(
                    &mut batch,
                    &name,
                    &cheap_names,
                    &unit_of,
                    &fallbacks_of,
                    &mut resolved,
                )
                .await;
            }
        }
        (batch, expensive_submitted)
    }

    /// Folds one fresh terminal result into the resolution state.
    async fn apply_resolution(
        &self,
        batch: &mut BatchState,
        name: &str,
        cheap_names: &HashSet<String>,
        unit_of: &HashMap<String, String>,
        fallbacks_of: &HashMap<String, Vec<String>>,
        resolved: &mut HashSet<String>,
    ) {
        let Some(unit) = unit_of.get(name) else {
            return;
        };

        if !cheap_names.contains(name) {
            // Fallback result. If its unit was resolved while it ran, the
            // cheap result stands and this one is superseded.
            if resolved.contains(unit) {
                info!(name = %name, unit = %unit, "discarding superseded fallback result");
                batch.discard(name);
                return;
            }
            let passes = batch
                .results()
                .get(name)
                .map(|result| (self.predicate)(result))
                .unwrap_or(false);
            if passes {
                resolved.insert(unit.clone());
            }
            return;
        }

        // Cheap result: on success, pull the unit's fallbacks.
        let passes = batch
            .results()
            .get(name)
            .map(|result| (self.predicate)(result))
            .unwrap_or(false);
        if !passes || !resolved.insert(unit.clone()) {
            return;
        }
        for fallback in fallbacks_of.get(unit).into_iter().flatten() {
            if batch.is_in_flight(fallback) {
                info!(
                    unit = %unit,
                    name = %fallback.as_str(),
                    "unit resolved cheaply, withdrawing fallback"
                );
                self.monitor.withdraw(batch, fallback).await;
            } else if batch.is_resolved(fallback) {
                batch.discard(fallback);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip() {
        assert_eq!(
            "sequential".parse::<EscalationMode>().unwrap(),
            EscalationMode::Sequential
        );
        assert_eq!(
            "Concurrent".parse::<EscalationMode>().unwrap(),
            EscalationMode::Concurrent
        );
        assert!("eager".parse::<EscalationMode>().is_err());
        assert_eq!(EscalationMode::Sequential.to_string(), "sequential");
    }

    #[test]
    fn test_default_mode_is_sequential() {
        assert_eq!(EscalationMode::default(), EscalationMode::Sequential);
    }

    #[test]
    fn test_success_status_predicate() {
        let predicate = success_status_predicate();
        assert!(predicate(&JobResult::success("a", "")));
        assert!(!predicate(&JobResult::failure("a", "")));
        assert!(!predicate(&JobResult::timed_out("a")));
    }
}
