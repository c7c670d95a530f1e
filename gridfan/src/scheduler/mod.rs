//! Batch Scheduling
//!
//! This module drives batches of external jobs from submission to a full
//! set of terminal results, with deadline enforcement and two-cohort
//! escalation layered on top.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   EscalationController                       │
//! │  Two-cohort policy: cheap probes first, fallbacks for       │
//! │  whatever the probes leave unresolved                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                       JobMonitor                             │
//! │  Submission, liveness sweeps, deadline + override timeouts  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐   ┌───────────────────────────┐  │
//! │  │      BatchState      │   │     ResultAggregator      │  │
//! │  │ in-flight / completed│   │ results + 0-100 progress  │  │
//! │  └──────────────────────┘   └───────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Batch**: one set of job descriptions monitored together under one
//!   deadline. Every admitted description ends with exactly one terminal
//!   result; jobs that outlive the deadline are cancelled and recorded as
//!   timed out rather than raised as errors.
//!
//! - **Unit**: the `unit_key` shared by a cheap probe and its expensive
//!   fallback. A unit whose probe succeeds is resolved and its fallback is
//!   withdrawn or never submitted, depending on the escalation mode.
//!
//! - **Progress**: a single 0 to 100 figure that never decreases. 100
//!   appears only after the batch is finalized, so observers can treat it
//!   as "all results are in".
//!
//! # Example
//!
//! ```ignore
//! use gridfan::scheduler::{
//!     EscalationController, EscalationMode, SchedulerConfig, success_status_predicate,
//! };
//!
//! let controller = EscalationController::new(
//!     backend,
//!     SchedulerConfig::default(),
//!     EscalationMode::Sequential,
//!     success_status_predicate(),
//! );
//! let outcome = controller.run(descriptions).await;
//! for result in &outcome.results {
//!     println!("{}: {}", result.name, result.status);
//! }
//! ```

mod aggregator;
mod batch;
mod config;
mod escalation;
mod monitor;

pub use aggregator::ResultAggregator;
pub use batch::BatchState;
pub use config::{SchedulerConfig, DEFAULT_BATCH_DEADLINE, DEFAULT_POLL_INTERVAL};
pub use escalation::{
    success_status_predicate, BatchOutcome, EscalationController, EscalationMode, SuccessPredicate,
};
pub use monitor::JobMonitor;
