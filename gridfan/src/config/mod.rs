//! Configuration loaded from ~/.gridfan/config.ini.
//!
//! One struct per INI section, overlaid on defaults so a partial file is
//! always valid. The split mirrors the life cycle of a setting:
//!
//! - [`settings`]: the structs themselves
//! - [`defaults`]: `DEFAULT_*` constants and `ConfigFile::default()`
//! - [`parser`]: INI → `ConfigFile`
//! - [`writer`]: `ConfigFile` → commented INI
//! - [`file`]: load/save plumbing and error types
//!
//! # Example
//!
//! ```no_run
//! use gridfan::config::ConfigFile;
//!
//! let config = ConfigFile::load().unwrap();
//! println!("backend: {}", config.backend.kind);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    num_cpus, DEFAULT_CANCEL_GRACE_SECS, DEFAULT_DEADLINE_SECS, DEFAULT_DELETE_PROGRAM,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_RESULT_GRACE_SECS, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_PAUSE_MS, DEFAULT_SERVICE_NAME, DEFAULT_STATUS_PROGRAM, DEFAULT_STORE_ENDPOINT,
    DEFAULT_SUBMIT_PROGRAM, DEFAULT_THROTTLE_KEY,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    BackendKind, BackendSettings, ConfigFile, EscalationSettings, LocalSettings, LoggingSettings,
    MonitorSettings, RemoteSettings, StoreSettings, StoreTopologyKind,
};
