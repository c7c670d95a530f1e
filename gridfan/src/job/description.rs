//! Job descriptions.
//!
//! A [`JobDescription`] is the immutable input to the scheduler: the command
//! line to run, where to run it, and how it participates in the
//! cheap-probe/expensive-fallback escalation policy.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Cohort
// =============================================================================

/// Escalation cohort a job belongs to.
///
/// Cheap jobs are the fast, low-cost probes launched first; expensive jobs
/// are the fallback variants only run for units no cheap probe resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cohort {
    /// Fast, low-cost probe variant.
    Cheap,
    /// Slow, high-cost fallback variant.
    Expensive,
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cohort::Cheap => write!(f, "cheap"),
            Cohort::Expensive => write!(f, "expensive"),
        }
    }
}

impl FromStr for Cohort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cheap" => Ok(Cohort::Cheap),
            "expensive" => Ok(Cohort::Expensive),
            other => Err(format!("unknown cohort '{other}'")),
        }
    }
}

// =============================================================================
// Job Description
// =============================================================================

/// Immutable description of one external computation.
///
/// The payload contract is a single command-line invocation executed in a
/// job-private working directory; stdout and stderr are captured to the
/// fixed-name log file there. The scheduler never interprets the log.
#[derive(Debug, Clone)]
pub struct JobDescription {
    /// Unique job name within a batch; also the key of its final result.
    pub name: String,

    /// Program to invoke.
    pub program: String,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// Job-private working directory (created on submit if absent).
    pub work_dir: PathBuf,

    /// Escalation cohort.
    pub cohort: Cohort,

    /// Groups the cheap and expensive variants addressing the same unit of
    /// work. Escalation decisions are made per unit key.
    pub unit_key: String,

    /// Optional routing hint for the remote batch queue (queue name).
    pub queue_hint: Option<String>,

    /// Optional per-job deadline. Replaces the batch deadline for this job
    /// only; it never extends past the batch deadline.
    pub timeout_override: Option<Duration>,
}

impl JobDescription {
    /// Creates a cheap-cohort description with no arguments.
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        unit_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            work_dir: work_dir.into(),
            cohort: Cohort::Cheap,
            unit_key: unit_key.into(),
            queue_hint: None,
            timeout_override: None,
        }
    }

    /// Sets the argument list.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Sets the cohort.
    pub fn with_cohort(mut self, cohort: Cohort) -> Self {
        self.cohort = cohort;
        self
    }

    /// Sets the queue routing hint.
    pub fn with_queue_hint(mut self, queue: impl Into<String>) -> Self {
        self.queue_hint = Some(queue.into());
        self
    }

    /// Sets the per-job timeout override.
    pub fn with_timeout_override(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }

    /// Validates the description before any backend contact.
    ///
    /// A failing description is recorded as an `invalid_input` result and is
    /// never submitted.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("job name is empty".to_string());
        }
        if self.program.trim().is_empty() {
            return Err("program is empty".to_string());
        }
        if self.unit_key.trim().is_empty() {
            return Err("unit key is empty".to_string());
        }
        if self.work_dir.as_os_str().is_empty() {
            return Err("working directory is empty".to_string());
        }
        if self.work_dir.is_relative() {
            return Err(format!(
                "working directory '{}' is not absolute",
                self.work_dir.display()
            ));
        }
        if let Some(timeout) = self.timeout_override {
            if timeout.is_zero() {
                return Err("timeout override is zero".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_description() -> JobDescription {
        JobDescription::new("probe-1", "/usr/bin/true", "/tmp/probe-1", "unit-1")
    }

    #[test]
    fn test_cohort_display_and_parse() {
        assert_eq!(Cohort::Cheap.to_string(), "cheap");
        assert_eq!(Cohort::Expensive.to_string(), "expensive");
        assert_eq!("cheap".parse::<Cohort>().unwrap(), Cohort::Cheap);
        assert_eq!("EXPENSIVE".parse::<Cohort>().unwrap(), Cohort::Expensive);
        assert!("medium".parse::<Cohort>().is_err());
    }

    #[test]
    fn test_valid_description_passes() {
        assert!(valid_description().validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let desc = valid_description()
            .with_args(vec!["--fast".to_string()])
            .with_cohort(Cohort::Expensive)
            .with_queue_hint("all.q")
            .with_timeout_override(Duration::from_secs(30));

        assert_eq!(desc.args, vec!["--fast"]);
        assert_eq!(desc.cohort, Cohort::Expensive);
        assert_eq!(desc.queue_hint.as_deref(), Some("all.q"));
        assert_eq!(desc.timeout_override, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_empty_fields_rejected() {
        let mut desc = valid_description();
        desc.name = "  ".to_string();
        assert!(desc.validate().is_err());

        let mut desc = valid_description();
        desc.program = String::new();
        assert!(desc.validate().is_err());

        let mut desc = valid_description();
        desc.unit_key = String::new();
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_relative_work_dir_rejected() {
        let mut desc = valid_description();
        desc.work_dir = PathBuf::from("runs/probe-1");
        let err = desc.validate().unwrap_err();
        assert!(err.contains("not absolute"));
    }

    #[test]
    fn test_zero_timeout_override_rejected() {
        let desc = valid_description().with_timeout_override(Duration::ZERO);
        assert!(desc.validate().is_err());
    }
}
