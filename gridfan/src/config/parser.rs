//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function. It is the single place
//! where INI key names are mapped to struct fields.

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::{ConfigFile, StoreTopologyKind};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [backend] section
    if let Some(section) = ini.section(Some("backend")) {
        if let Some(v) = section.get("type") {
            config.backend.kind = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "backend".to_string(),
                key: "type".to_string(),
                value: v.to_string(),
                reason: "must be 'local' or 'remote'".to_string(),
            })?;
        }
    }

    // [local] section
    if let Some(section) = ini.section(Some("local")) {
        if let Some(v) = section.get("max_workers") {
            config.local.max_workers = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "local".to_string(),
                key: "max_workers".to_string(),
                value: v.to_string(),
                reason: "must be a positive integer".to_string(),
            })?;
        }
    }

    // [remote] section
    if let Some(section) = ini.section(Some("remote")) {
        if let Some(v) = section.get("submit_program") {
            let v = v.trim();
            if !v.is_empty() {
                config.remote.submit_program = v.to_string();
            }
        }
        if let Some(v) = section.get("status_program") {
            let v = v.trim();
            if !v.is_empty() {
                config.remote.status_program = v.to_string();
            }
        }
        if let Some(v) = section.get("delete_program") {
            let v = v.trim();
            if !v.is_empty() {
                config.remote.delete_program = v.to_string();
            }
        }
        if let Some(v) = section.get("default_queue") {
            let v = v.trim();
            if !v.is_empty() {
                config.remote.default_queue = Some(v.to_string());
            }
        }
        if let Some(v) = section.get("resource_spec") {
            let v = v.trim();
            if !v.is_empty() {
                config.remote.resource_spec = Some(v.to_string());
            }
        }
        if let Some(v) = section.get("throttle_slots") {
            let slots: usize = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "remote".to_string(),
                key: "throttle_slots".to_string(),
                value: v.to_string(),
                reason: "must be a non-negative integer (0 disables the throttle)".to_string(),
            })?;
            config.remote.throttle_slots = if slots == 0 { None } else { Some(slots) };
        }
        if let Some(v) = section.get("throttle_key") {
            let v = v.trim();
            if !v.is_empty() {
                config.remote.throttle_key = v.to_string();
            }
        }
        if let Some(v) = section.get("result_grace_secs") {
            config.remote.result_grace_secs =
                v.parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "remote".to_string(),
                    key: "result_grace_secs".to_string(),
                    value: v.to_string(),
                    reason: "must be a positive integer (seconds)".to_string(),
                })?;
        }
    }

    // [store] section
    if let Some(section) = ini.section(Some("store")) {
        if let Some(v) = section.get("topology") {
            config.store.topology = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "store".to_string(),
                key: "topology".to_string(),
                value: v.to_string(),
                reason: "must be 'single' or 'sentinel'".to_string(),
            })?;
        }
        if let Some(v) = section.get("endpoint") {
            let v = v.trim();
            if !v.is_empty() {
                config.store.endpoint = v.to_string();
            }
        }
        if let Some(v) = section.get("sentinels") {
            config.store.sentinels = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = section.get("service_name") {
            let v = v.trim();
            if !v.is_empty() {
                config.store.service_name = v.to_string();
            }
        }
        if let Some(v) = section.get("retry_attempts") {
            config.store.retry_attempts =
                v.parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "store".to_string(),
                    key: "retry_attempts".to_string(),
                    value: v.to_string(),
                    reason: "must be a positive integer".to_string(),
                })?;
        }
        if let Some(v) = section.get("retry_pause_ms") {
            config.store.retry_pause_ms =
                v.parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "store".to_string(),
                    key: "retry_pause_ms".to_string(),
                    value: v.to_string(),
                    reason: "must be a positive integer (milliseconds)".to_string(),
                })?;
        }
    }

    // A sentinel topology with no sentinels can never find a primary.
    if config.store.topology == StoreTopologyKind::Sentinel && config.store.sentinels.is_empty() {
        return Err(ConfigFileError::InvalidValue {
            section: "store".to_string(),
            key: "sentinels".to_string(),
            value: String::new(),
            reason: "sentinel topology requires at least one host:port endpoint".to_string(),
        });
    }

    // [monitor] section
    if let Some(section) = ini.section(Some("monitor")) {
        if let Some(v) = section.get("poll_interval_ms") {
            config.monitor.poll_interval_ms =
                v.parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "monitor".to_string(),
                    key: "poll_interval_ms".to_string(),
                    value: v.to_string(),
                    reason: "must be a positive integer (milliseconds)".to_string(),
                })?;
        }
        if let Some(v) = section.get("deadline_secs") {
            config.monitor.deadline_secs =
                v.parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "monitor".to_string(),
                    key: "deadline_secs".to_string(),
                    value: v.to_string(),
                    reason: "must be a positive integer (seconds)".to_string(),
                })?;
        }
        if let Some(v) = section.get("cancel_grace_secs") {
            config.monitor.cancel_grace_secs =
                v.parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "monitor".to_string(),
                    key: "cancel_grace_secs".to_string(),
                    value: v.to_string(),
                    reason: "must be a positive integer (seconds)".to_string(),
                })?;
        }
    }

    // [escalation] section
    if let Some(section) = ini.section(Some("escalation")) {
        if let Some(v) = section.get("mode") {
            config.escalation.mode = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "escalation".to_string(),
                key: "mode".to_string(),
                value: v.to_string(),
                reason: "must be 'sequential' or 'concurrent'".to_string(),
            })?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("dir") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.dir = v.to_string();
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}
