//! Scheduler configuration.

use std::time::Duration;

// =============================================================================
// Configuration Constants
// =============================================================================

/// Default interval between liveness sweeps.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default batch deadline: three hours, after which every job still in
/// flight is cancelled and recorded as timed out.
pub const DEFAULT_BATCH_DEADLINE: Duration = Duration::from_secs(10_800);

// =============================================================================
// Scheduler Configuration
// =============================================================================

/// Configuration for batch monitoring.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Interval between liveness sweeps over the in-flight jobs.
    pub poll_interval: Duration,

    /// Wall-clock budget for the whole batch, measured from the moment
    /// monitoring starts.
    pub deadline: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            deadline: DEFAULT_BATCH_DEADLINE,
        }
    }
}

impl SchedulerConfig {
    /// Sets the batch deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Sets the liveness sweep interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl From<&crate::config::MonitorSettings> for SchedulerConfig {
    fn from(settings: &crate::config::MonitorSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            deadline: Duration::from_secs(settings.deadline_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.deadline, DEFAULT_BATCH_DEADLINE);
    }

    #[test]
    fn test_scheduler_config_builders() {
        let config = SchedulerConfig::default()
            .with_deadline(Duration::from_secs(60))
            .with_poll_interval(Duration::from_millis(50));
        assert_eq!(config.deadline, Duration::from_secs(60));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
    }
}
