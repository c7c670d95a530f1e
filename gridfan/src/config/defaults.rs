//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants, the CPU-aware worker count helper,
//! and the `ConfigFile::default()` implementation.

use super::settings::*;
use crate::scheduler::EscalationMode;

// =============================================================================
// CPU helpers
// =============================================================================

/// Get the number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

// =============================================================================
// Remote backend defaults
// =============================================================================

/// Default queue submission program.
pub const DEFAULT_SUBMIT_PROGRAM: &str = "qsub";

/// Default queue status listing program.
pub const DEFAULT_STATUS_PROGRAM: &str = "qstat";

/// Default queue deletion program.
pub const DEFAULT_DELETE_PROGRAM: &str = "qdel";

/// Default store list backing the submission throttle.
pub const DEFAULT_THROTTLE_KEY: &str = "gridfan:throttle";

/// Default grace for a result to appear after a job leaves the queue.
pub const DEFAULT_RESULT_GRACE_SECS: u64 = 120;

// =============================================================================
// Store defaults
// =============================================================================

/// Default store endpoint for the single topology.
pub const DEFAULT_STORE_ENDPOINT: &str = "127.0.0.1:6379";

/// Default service name asked of the sentinel directory.
pub const DEFAULT_SERVICE_NAME: &str = "primary";

/// Default retry ceiling for store operations.
/// At the default pause this covers an hour-long store outage.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3600;

/// Default pause between store retry attempts in milliseconds.
pub const DEFAULT_RETRY_PAUSE_MS: u64 = 1000;

// =============================================================================
// Monitor defaults
// =============================================================================

/// Default interval between liveness sweeps in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Default batch deadline in seconds (three hours).
pub const DEFAULT_DEADLINE_SECS: u64 = 10_800;

/// Default grace between a stop request and a kill for local jobs.
pub const DEFAULT_CANCEL_GRACE_SECS: u64 = 5;

// =============================================================================
// ConfigFile::default()
// =============================================================================

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            backend: BackendSettings {
                kind: BackendKind::Local,
            },
            local: LocalSettings {
                max_workers: num_cpus(),
            },
            remote: RemoteSettings {
                submit_program: DEFAULT_SUBMIT_PROGRAM.to_string(),
                status_program: DEFAULT_STATUS_PROGRAM.to_string(),
                delete_program: DEFAULT_DELETE_PROGRAM.to_string(),
                default_queue: None,
                resource_spec: None,
                throttle_slots: None,
                throttle_key: DEFAULT_THROTTLE_KEY.to_string(),
                result_grace_secs: DEFAULT_RESULT_GRACE_SECS,
            },
            store: StoreSettings {
                topology: StoreTopologyKind::Single,
                endpoint: DEFAULT_STORE_ENDPOINT.to_string(),
                sentinels: Vec::new(),
                service_name: DEFAULT_SERVICE_NAME.to_string(),
                retry_attempts: DEFAULT_RETRY_ATTEMPTS,
                retry_pause_ms: DEFAULT_RETRY_PAUSE_MS,
            },
            monitor: MonitorSettings {
                poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
                deadline_secs: DEFAULT_DEADLINE_SECS,
                cancel_grace_secs: DEFAULT_CANCEL_GRACE_SECS,
            },
            escalation: EscalationSettings {
                mode: EscalationMode::Sequential,
            },
            logging: LoggingSettings {
                dir: crate::logging::default_log_dir().to_string(),
                file: crate::logging::default_log_file().to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_cpus_positive() {
        assert!(num_cpus() >= 1);
    }

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.backend.kind, BackendKind::Local);
        assert_eq!(config.local.max_workers, num_cpus());
        assert_eq!(config.remote.submit_program, "qsub");
        assert!(config.remote.throttle_slots.is_none());
        assert_eq!(config.store.topology, StoreTopologyKind::Single);
        assert_eq!(config.store.retry_attempts, 3600);
        assert_eq!(config.store.retry_pause_ms, 1000);
        assert_eq!(config.monitor.poll_interval_ms, 200);
        assert_eq!(config.monitor.deadline_secs, 10_800);
        assert_eq!(config.escalation.mode, EscalationMode::Sequential);
        assert_eq!(config.logging.file, "gridfan.log");
    }
}
