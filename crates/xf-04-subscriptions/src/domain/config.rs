//! Subscription manager configuration.

use std::time::Duration;

/// Retry and timer policy.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Re-submissions before a record is failed with `Timeout`.
    pub max_retries: u32,
    /// Wait for a confirmation, measured from the last submission.
    pub confirmation_timeout: Duration,
    /// Retry timer period.
    pub timer_interval: Duration,
    /// Capacity of the lifecycle event channel.
    pub event_capacity: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            confirmation_timeout: Duration::from_secs(5),
            timer_interval: Duration::from_millis(500),
            event_capacity: 256,
        }
    }
}

impl SubscriptionConfig {
    pub(crate) fn timeout_ms(&self) -> u64 {
        u64::try_from(self.confirmation_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}
