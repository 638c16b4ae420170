//! Transport configuration, receive modes and counters.

use shared_types::MessageEnvelope;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Transport configuration.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Largest payload the fabric accepts (bytes).
    pub max_payload_size: usize,
    /// Retries after the first attempt while receivers are saturated.
    pub send_retries: u32,
    /// Fixed pause between saturated retries.
    pub retry_delay: Duration,
    /// Local mailbox depth.
    pub mailbox_capacity: usize,
    /// Readiness poll period for `wait_until_ready`.
    pub ready_poll_interval: Duration,
    /// Payload buffers kept for reuse.
    pub buffer_pool_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 65_536,
            send_retries: 3,
            retry_delay: Duration::from_millis(10),
            mailbox_capacity: shared_bus::DEFAULT_MAILBOX_CAPACITY,
            ready_poll_interval: Duration::from_millis(100),
            buffer_pool_size: 64,
        }
    }
}

/// How `receive` waits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveMode {
    /// Wait for a message, at most `timeout` if given.
    Blocking { timeout: Option<Duration> },
    /// Return immediately.
    NonBlocking,
}

impl ReceiveMode {
    /// Blocking receive without a deadline.
    #[must_use]
    pub fn blocking() -> Self {
        Self::Blocking { timeout: None }
    }

    /// Blocking receive bounded by `timeout`.
    #[must_use]
    pub fn blocking_for(timeout: Duration) -> Self {
        Self::Blocking {
            timeout: Some(timeout),
        }
    }
}

/// Result of a receive call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Received {
    Message(MessageEnvelope),
    /// Nothing arrived (non-blocking, or the timeout elapsed).
    WouldBlock,
    /// The transport was shut down and the mailbox is empty.
    Closed,
}

/// Successful delivery report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendReport {
    /// Fabric attempts made, including the successful one.
    pub attempts: u32,
    /// Receivers the envelope reached.
    pub receivers: usize,
}

#[derive(Debug, Default)]
pub(crate) struct TransportStats {
    pub sent: AtomicU64,
    pub retried: AtomicU64,
    pub transient_failures: AtomicU64,
    pub no_route: AtomicU64,
    pub received: AtomicU64,
}

impl TransportStats {
    pub fn snapshot(&self) -> TransportStatsSnapshot {
        TransportStatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
            no_route: self.no_route.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of transport counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStatsSnapshot {
    /// Envelopes delivered.
    pub sent: u64,
    /// Retries issued because receivers were saturated.
    pub retried: u64,
    /// Sends that exhausted their retries.
    pub transient_failures: u64,
    /// Sends with no receiver.
    pub no_route: u64,
    /// Envelopes received.
    pub received: u64,
}
