//! GridFan - batch fan-out orchestration for external long-running jobs
//!
//! This library farms a batch of independent external computations out to an
//! execution backend (an in-process worker pool or a remote batch queue),
//! monitors them against a wall-clock deadline, correlates out-of-band
//! results through a resilient key/value store client, and applies a
//! cheap-probe/expensive-fallback escalation policy that cancels expensive
//! work the moment a cheap sibling succeeds.
//!
//! # High-Level API
//!
//! Most callers drive a batch through the [`scheduler`] module:
//!
//! ```ignore
//! use gridfan::backend::LocalBackend;
//! use gridfan::scheduler::{
//!     success_status_predicate, EscalationController, EscalationMode, SchedulerConfig,
//! };
//! use std::sync::Arc;
//!
//! let backend = Arc::new(LocalBackend::new(8));
//! let controller = EscalationController::new(
//!     backend,
//!     SchedulerConfig::default(),
//!     EscalationMode::Sequential,
//!     success_status_predicate(),
//! );
//! let outcome = controller.run(descriptions).await;
//! ```

pub mod backend;
pub mod config;
pub mod job;
pub mod logging;
pub mod scheduler;
pub mod store;

/// Version of the GridFan library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
