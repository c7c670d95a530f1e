//! Configuration management CLI commands.
//!
//! Provides `config init`, `config show`, and `config path` for creating
//! and inspecting ~/.gridfan/config.ini from the command line.

use clap::Subcommand;
use gridfan::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Create the config file with default values if it doesn't exist
    Init,

    /// Show the effective configuration (file values over defaults)
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init => run_init(),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Path => run_path(),
    }
}

/// Create the default config file if missing.
fn run_init() -> Result<(), CliError> {
    let existed = config_file_path().exists();
    let path = ConfigFile::ensure_exists()?;

    if existed {
        println!("Configuration already exists: {}", path.display());
    } else {
        println!("Created default configuration: {}", path.display());
    }

    Ok(())
}

/// Print the effective configuration, section by section.
fn run_show() -> Result<(), CliError> {
    let config = ConfigFile::load()?;

    println!("[backend]");
    println!("  type = {}", config.backend.kind);
    println!();

    println!("[local]");
    println!("  max_workers = {}", config.local.max_workers);
    println!();

    println!("[remote]");
    println!("  submit_program = {}", config.remote.submit_program);
    println!("  status_program = {}", config.remote.status_program);
    println!("  delete_program = {}", config.remote.delete_program);
    println!(
        "  default_queue = {}",
        optional(config.remote.default_queue.as_deref())
    );
    println!(
        "  resource_spec = {}",
        optional(config.remote.resource_spec.as_deref())
    );
    match config.remote.throttle_slots {
        Some(slots) => println!("  throttle_slots = {}", slots),
        None => println!("  throttle_slots = 0 (disabled)"),
    }
    println!("  throttle_key = {}", config.remote.throttle_key);
    println!("  result_grace_secs = {}", config.remote.result_grace_secs);
    println!();

    println!("[store]");
    println!("  topology = {}", config.store.topology);
    println!("  endpoint = {}", config.store.endpoint);
    let sentinels = config.store.sentinels.join(", ");
    println!(
        "  sentinels = {}",
        optional((!sentinels.is_empty()).then_some(sentinels.as_str()))
    );
    println!("  service_name = {}", config.store.service_name);
    println!("  retry_attempts = {}", config.store.retry_attempts);
    println!("  retry_pause_ms = {}", config.store.retry_pause_ms);
    println!();

    println!("[monitor]");
    println!("  poll_interval_ms = {}", config.monitor.poll_interval_ms);
    println!("  deadline_secs = {}", config.monitor.deadline_secs);
    println!("  cancel_grace_secs = {}", config.monitor.cancel_grace_secs);
    println!();

    println!("[escalation]");
    println!("  mode = {}", config.escalation.mode);
    println!();

    println!("[logging]");
    println!("  dir = {}", config.logging.dir);
    println!("  file = {}", config.logging.file);

    Ok(())
}

/// Show the configuration file path.
fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn optional<S: AsRef<str>>(value: Option<S>) -> String {
    match value {
        Some(v) if !v.as_ref().is_empty() => v.as_ref().to_string(),
        _ => "(not set)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_formatting() {
        assert_eq!(optional(Some("short.q")), "short.q");
        assert_eq!(optional(Some("")), "(not set)");
        assert_eq!(optional(None::<&str>), "(not set)");
    }
}
