//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use crate::scheduler::EscalationMode;
use std::fmt;
use std::str::FromStr;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Backend selection
    pub backend: BackendSettings,
    /// Local worker pool settings
    pub local: LocalSettings,
    /// Batch queue settings
    pub remote: RemoteSettings,
    /// Store connection settings
    pub store: StoreSettings,
    /// Monitoring settings
    pub monitor: MonitorSettings,
    /// Escalation settings
    pub escalation: EscalationSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Which execution backend runs the jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// In-process worker pool spawning local child processes.
    #[default]
    Local,
    /// External batch queue driven through its command line programs.
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "remote" => Ok(BackendKind::Remote),
            other => Err(format!("unknown backend kind: {other}")),
        }
    }
}

/// Backend selection.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Backend type: "local" or "remote"
    pub kind: BackendKind,
}

/// Local worker pool configuration.
#[derive(Debug, Clone)]
pub struct LocalSettings {
    /// Maximum concurrently running jobs.
    /// Default: number of CPU cores.
    pub max_workers: usize,
}

/// Batch queue configuration.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    /// Submission program (default: qsub)
    pub submit_program: String,
    /// Status listing program (default: qstat)
    pub status_program: String,
    /// Deletion program (default: qdel)
    pub delete_program: String,
    /// Queue jobs are routed to when their description has no hint.
    pub default_queue: Option<String>,
    /// Resource request passed with every submission.
    pub resource_spec: Option<String>,
    /// Cap on outstanding submissions, enforced through the store.
    /// None disables the throttle.
    pub throttle_slots: Option<usize>,
    /// Store list backing the throttle.
    pub throttle_key: String,
    /// How long to wait for a published result once a job leaves the
    /// queue, in seconds.
    pub result_grace_secs: u64,
}

/// How the store's primary endpoint is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreTopologyKind {
    /// One fixed endpoint.
    #[default]
    Single,
    /// Ask a sentinel directory for the current primary.
    Sentinel,
}

impl fmt::Display for StoreTopologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreTopologyKind::Single => write!(f, "single"),
            StoreTopologyKind::Sentinel => write!(f, "sentinel"),
        }
    }
}

impl FromStr for StoreTopologyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(StoreTopologyKind::Single),
            "sentinel" => Ok(StoreTopologyKind::Sentinel),
            other => Err(format!("unknown store topology: {other}")),
        }
    }
}

/// Store connection configuration.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Topology: "single" or "sentinel"
    pub topology: StoreTopologyKind,
    /// Fixed endpoint (host:port) for the single topology.
    pub endpoint: String,
    /// Sentinel endpoints (host:port) for the sentinel topology.
    pub sentinels: Vec<String>,
    /// Service name the sentinels are asked about.
    pub service_name: String,
    /// Retry ceiling for store operations.
    /// Default: 3600 attempts (an hour at the default pause).
    pub retry_attempts: u32,
    /// Pause between retry attempts, in milliseconds.
    pub retry_pause_ms: u64,
}

/// Monitoring configuration.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Interval between liveness sweeps, in milliseconds.
    /// Default: 200.
    pub poll_interval_ms: u64,
    /// Batch deadline, in seconds.
    /// Default: 10800 (three hours).
    pub deadline_secs: u64,
    /// Grace between asking a local job to stop and killing it, in seconds.
    /// Default: 5.
    pub cancel_grace_secs: u64,
}

/// Escalation configuration.
#[derive(Debug, Clone)]
pub struct EscalationSettings {
    /// Cohort interleaving: "sequential" or "concurrent"
    pub mode: EscalationMode,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Log directory
    pub dir: String,
    /// Log file name
    pub file: String,
}
