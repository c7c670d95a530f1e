//! Run command - fan a batch manifest out through the escalation scheduler.
//!
//! Loads a JSON manifest of job descriptions, builds the configured backend
//! (local worker pool or remote batch queue), runs the batch to completion,
//! and prints one status line per recorded result. The exit code is success
//! only when every recorded result is a success; expensive fallbacks that
//! were withdrawn before finishing leave no result and count as nothing.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use gridfan::backend::{ExecutionBackend, LocalBackend, RemoteBackend, RemoteBackendConfig};
use gridfan::config::{BackendKind, ConfigFile};
use gridfan::job::{Cohort, JobDescription, JobResult};
use gridfan::scheduler::{
    success_status_predicate, BatchOutcome, EscalationController, EscalationMode, SchedulerConfig,
    SuccessPredicate,
};
use gridfan::store::{RetryPolicy, StoreClient, StoreTopology};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the run command.
#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Path to the batch manifest (JSON)
    #[arg(long)]
    pub manifest: PathBuf,

    /// Override the configured batch deadline, in seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Override the configured escalation mode (sequential or concurrent)
    #[arg(long)]
    pub mode: Option<EscalationMode>,

    /// Mirror log events to stderr
    #[arg(long)]
    pub verbose: bool,
}

// ============================================================================
// Manifest
// ============================================================================

/// On-disk shape of a batch manifest.
#[derive(Debug, Deserialize)]
struct ManifestFile {
    /// Jobs to run.
    jobs: Vec<ManifestJob>,
    /// When present, a successful result must also contain this substring
    /// in its payload to resolve its work unit.
    #[serde(default)]
    success_pattern: Option<String>,
}

/// One job entry in the manifest.
#[derive(Debug, Deserialize)]
struct ManifestJob {
    name: String,
    program: String,
    #[serde(default)]
    args: Vec<String>,
    work_dir: PathBuf,
    cohort: String,
    unit_key: String,
    #[serde(default)]
    queue_hint: Option<String>,
    #[serde(default)]
    timeout_override_secs: Option<u64>,
}

impl ManifestJob {
    fn to_description(&self) -> Result<JobDescription, CliError> {
        let cohort: Cohort = self
            .cohort
            .parse()
            .map_err(|e| CliError::Manifest(format!("job '{}': {}", self.name, e)))?;

        let mut description =
            JobDescription::new(&self.name, &self.program, &self.work_dir, &self.unit_key)
                .with_args(self.args.clone())
                .with_cohort(cohort);
        if let Some(queue) = &self.queue_hint {
            description = description.with_queue_hint(queue);
        }
        if let Some(secs) = self.timeout_override_secs {
            description = description.with_timeout_override(Duration::from_secs(secs));
        }
        Ok(description)
    }
}

impl ManifestFile {
    fn descriptions(&self) -> Result<Vec<JobDescription>, CliError> {
        self.jobs.iter().map(ManifestJob::to_description).collect()
    }
}

fn load_manifest(path: &Path) -> Result<ManifestFile, CliError> {
    let text = std::fs::read_to_string(path).map_err(|error| CliError::ManifestRead {
        path: path.display().to_string(),
        error,
    })?;
    serde_json::from_str(&text).map_err(|e| CliError::Manifest(e.to_string()))
}

// ============================================================================
// Command
// ============================================================================

/// Run the run command.
pub async fn run(args: RunArgs) -> Result<ExitCode, CliError> {
    let runner = CliRunner::new(args.verbose)?;
    runner.log_startup("run");
    let config = runner.config();

    let manifest = load_manifest(&args.manifest)?;
    let descriptions = manifest.descriptions()?;
    if descriptions.is_empty() {
        return Err(CliError::Manifest("manifest contains no jobs".to_string()));
    }

    let mode = args.mode.unwrap_or(config.escalation.mode);
    let mut scheduler_config = SchedulerConfig::from(&config.monitor);
    if let Some(secs) = args.deadline_secs {
        scheduler_config = scheduler_config.with_deadline(Duration::from_secs(secs));
    }

    println!("gridfan v{}", gridfan::VERSION);
    println!("{}", "=".repeat(40));
    println!();
    println!(
        "Manifest: {} ({} jobs)",
        args.manifest.display(),
        descriptions.len()
    );
    println!("Backend:  {}", config.backend.kind);
    println!("Mode:     {}", mode);
    println!("Deadline: {}s", scheduler_config.deadline.as_secs());
    println!();

    let (backend, remote) = build_backend(config);
    let predicate = build_predicate(manifest.success_pattern.clone());

    let controller = EscalationController::new(backend, scheduler_config, mode, predicate);
    let outcome = controller.run(descriptions).await;

    // Return this process's unused throttle slots to the shared pool.
    if let Some(remote) = remote {
        remote.teardown_throttle().await;
    }

    print_outcome(&outcome, controller.aggregator().progress());

    let all_success = outcome.results.iter().all(|r| r.status.is_success());
    Ok(if all_success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Builds the configured execution backend.
///
/// The remote backend is also returned concretely so the caller can tear
/// down its submission throttle after the batch.
fn build_backend(config: &ConfigFile) -> (Arc<dyn ExecutionBackend>, Option<Arc<RemoteBackend>>) {
    match config.backend.kind {
        BackendKind::Local => {
            let backend = LocalBackend::new(config.local.max_workers)
                .with_cancel_grace(Duration::from_secs(config.monitor.cancel_grace_secs));
            (Arc::new(backend), None)
        }
        BackendKind::Remote => {
            let store = Arc::new(StoreClient::new(
                StoreTopology::from(&config.store),
                RetryPolicy::from(&config.store),
            ));
            let mut backend = RemoteBackend::new(RemoteBackendConfig::from(&config.remote), store);
            if let Some(slots) = config.remote.throttle_slots {
                backend = backend.with_throttle(config.remote.throttle_key.clone(), slots);
            }
            let backend = Arc::new(backend);
            (
                Arc::clone(&backend) as Arc<dyn ExecutionBackend>,
                Some(backend),
            )
        }
    }
}

/// A result resolves its unit when it succeeded and, if the manifest names
/// a pattern, its payload contains that pattern.
fn build_predicate(pattern: Option<String>) -> SuccessPredicate {
    match pattern {
        Some(pattern) => Arc::new(move |result: &JobResult| {
            result.status.is_success() && result.payload.contains(&pattern)
        }),
        None => success_status_predicate(),
    }
}

fn print_outcome(outcome: &BatchOutcome, progress: u8) {
    println!("Results:");
    for result in &outcome.results {
        let payload = excerpt(&result.payload);
        if payload.is_empty() {
            println!("  {:<24} {}", result.name, result.status);
        } else {
            println!("  {:<24} {:<13} {}", result.name, result.status, payload);
        }
    }
    println!();

    let successes = outcome
        .results
        .iter()
        .filter(|r| r.status.is_success())
        .count();
    println!(
        "{} of {} jobs succeeded, {} unit(s) resolved, {} fallback job(s) submitted",
        successes,
        outcome.results.len(),
        outcome.resolved_units.len(),
        outcome.expensive_submitted
    );
    println!("Progress: {}%", progress);
}

/// Flattens a payload to one line and truncates it for the status table.
fn excerpt(payload: &str) -> String {
    let one_line = payload.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() > 72 {
        let cut: String = one_line.chars().take(72).collect();
        format!("{cut}...")
    } else {
        one_line
    }
}
