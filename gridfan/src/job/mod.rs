//! Job data model.
//!
//! This module defines the value types that flow through the scheduler:
//!
//! - [`JobDescription`] - an immutable description of one external
//!   computation, including its cohort and unit-of-work key
//! - [`JobHandle`] - the live handle for a submitted job, owned exclusively
//!   by the monitor until the job terminates
//! - [`JobResult`] - the terminal record for a job; exactly one exists per
//!   admitted description once a batch resolves
//!
//! # Result correlation
//!
//! Backends export the scheduler-assigned result tag to the job process via
//! the [`RESULT_TAG_ENV`] environment variable. A remotely executed job
//! publishes its [`JobResult`] as JSON under that key in the store before
//! exiting; a locally executed job may instead leave a [`RESULT_FILE_NAME`]
//! file in its working directory.

mod description;
mod handle;
mod result;

pub use description::{Cohort, JobDescription};
pub use handle::{BackendId, JobHandle, ResultChannel};
pub use result::{JobResult, ResultStatus};

/// Environment variable carrying the store key a job publishes its result to.
pub const RESULT_TAG_ENV: &str = "GRIDFAN_RESULT_TAG";

/// Fixed name of the output log captured in each job's working directory.
pub const LOG_FILE_NAME: &str = "job.log";

/// Optional result file a locally executed job may write before exiting.
pub const RESULT_FILE_NAME: &str = "result.json";
