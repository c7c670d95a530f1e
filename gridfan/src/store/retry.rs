//! Bounded-retry policy for store operations.

use std::time::Duration;

/// Default attempt ceiling before a connection failure becomes fatal.
///
/// Combined with the default pause this rides out roughly an hour of store
/// downtime or failover churn.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3600;

/// Default fixed pause between attempts.
pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Bounded-retry policy: a hard attempt ceiling with a fixed pause between
/// attempts. Exactly `attempts` tries are made, never fewer, never
/// indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts before giving up (minimum 1).
    pub attempts: u32,

    /// Fixed sleep between attempts.
    pub pause: Duration,
}

impl RetryPolicy {
    /// Creates a policy; an attempt count of zero is raised to one.
    pub fn new(attempts: u32, pause: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            pause,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            pause: DEFAULT_RETRY_PAUSE,
        }
    }
}

impl From<&crate::config::StoreSettings> for RetryPolicy {
    fn from(settings: &crate::config::StoreSettings) -> Self {
        Self::new(
            settings.retry_attempts,
            Duration::from_millis(settings.retry_pause_ms),
        )
    }
}
