//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let default_queue = config.remote.default_queue.as_deref().unwrap_or("");
    let resource_spec = config.remote.resource_spec.as_deref().unwrap_or("");
    let throttle_slots = config.remote.throttle_slots.unwrap_or(0);
    let sentinels = config.store.sentinels.join(", ");

    format!(
        r#"[backend]
; Execution backend:
;   local  - in-process worker pool running jobs as child processes
;   remote - external batch queue driven through its command line programs
type = {}

[local]
; Maximum concurrently running jobs (default: number of CPU cores)
max_workers = {}

[remote]
; Queue command line programs (defaults: qsub, qstat, qdel)
submit_program = {}
status_program = {}
delete_program = {}
; Queue for jobs whose description carries no queue hint
; If empty, submissions name no queue and the grid engine decides
default_queue = {}
; Resource request passed with every submission (e.g. h_vmem=4G)
; If empty, no resource request is made
resource_spec = {}
; Cap on outstanding submissions, enforced through a store-backed
; slot list shared by every submitting host (default: 0 = no cap)
throttle_slots = {}
; Store list backing the throttle (default: gridfan:throttle)
throttle_key = {}
; Seconds to wait for a published result once a job leaves the queue (default: 120)
result_grace_secs = {}

[store]
; How the store's primary endpoint is found:
;   single   - one fixed endpoint
;   sentinel - ask a sentinel directory for the current primary
topology = {}
; Fixed endpoint (host:port) for the single topology (default: 127.0.0.1:6379)
endpoint = {}
; Comma-separated sentinel endpoints (host:port) for the sentinel topology
; Example: sentinels = sentinel-a:26379, sentinel-b:26379
sentinels = {}
; Service name the sentinels are asked about (default: primary)
service_name = {}
; Retry ceiling for store operations (default: 3600)
; With the default pause this rides out an hour-long store outage
retry_attempts = {}
; Pause between retry attempts in milliseconds (default: 1000)
retry_pause_ms = {}

[monitor]
; Interval between liveness sweeps in milliseconds (default: 200)
poll_interval_ms = {}
; Batch deadline in seconds (default: 10800 = three hours)
; Jobs still running at the deadline are cancelled and recorded as timed out
deadline_secs = {}
; Seconds between asking a local job to stop and killing it (default: 5)
cancel_grace_secs = {}

[escalation]
; How the expensive cohort is interleaved with the cheap cohort:
;   sequential - run cheap jobs first, submit fallbacks only for
;                work units the cheap results did not resolve
;   concurrent - run both cohorts at once, withdraw fallbacks as
;                cheap results resolve their work units
mode = {}

[logging]
; Log directory (default: logs)
dir = {}
; Log file name (default: gridfan.log)
file = {}
"#,
        config.backend.kind,
        config.local.max_workers,
        config.remote.submit_program,
        config.remote.status_program,
        config.remote.delete_program,
        default_queue,
        resource_spec,
        throttle_slots,
        config.remote.throttle_key,
        config.remote.result_grace_secs,
        config.store.topology,
        config.store.endpoint,
        sentinels,
        config.store.service_name,
        config.store.retry_attempts,
        config.store.retry_pause_ms,
        config.monitor.poll_interval_ms,
        config.monitor.deadline_secs,
        config.monitor.cancel_grace_secs,
        config.escalation.mode,
        config.logging.dir,
        config.logging.file,
    )
}
