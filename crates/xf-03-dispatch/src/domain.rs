//! Dispatch domain: message classification, configuration, counters and
//! handler errors.

use shared_types::message_types::is_subscription_notification;
use shared_types::{
    MessageEnvelope, MessageType, NotificationError, SubscriptionId, SubscriptionNotification,
    TransportError,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// An inbound envelope, classified once on receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundMessage {
    /// Subscription service confirmation or refusal.
    Notification(SubscriptionNotification),
    /// Anything else; goes to user handlers.
    User(MessageEnvelope),
}

impl InboundMessage {
    /// Classify by message type.
    ///
    /// # Errors
    ///
    /// `NotificationError::Malformed` for a reserved notification type whose
    /// payload cannot be decoded.
    pub fn classify(envelope: MessageEnvelope) -> Result<Self, NotificationError> {
        if is_subscription_notification(envelope.message_type()) {
            SubscriptionNotification::from_envelope(&envelope).map(Self::Notification)
        } else {
            Ok(Self::User(envelope))
        }
    }
}

/// Dispatch loop configuration.
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// Handler worker tasks.
    pub workers: usize,
    /// Per-worker queue depth.
    pub queue_depth: usize,
    /// Receive timeout, bounds how quickly a shutdown signal is noticed.
    pub poll_interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_depth: 256,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl DispatchConfig {
    /// Worker index serving `subscription_id`.
    #[must_use]
    pub fn shard_for(&self, subscription_id: SubscriptionId) -> usize {
        let workers = self.workers.max(1) as i64;
        i64::from(subscription_id).rem_euclid(workers) as usize
    }
}

#[derive(Debug, Default)]
pub(crate) struct DispatchCounters {
    pub received: AtomicU64,
    pub notifications: AtomicU64,
    pub dispatched: AtomicU64,
    pub handler_failures: AtomicU64,
    pub malformed: AtomicU64,
}

impl DispatchCounters {
    pub fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            received: self.received.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// Dispatch loop counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Envelopes taken from the transport.
    pub received: u64,
    /// Notifications handed to the sink.
    pub notifications: u64,
    /// User messages handed to handlers.
    pub dispatched: u64,
    /// Handler calls that returned an error or panicked.
    pub handler_failures: u64,
    /// Notifications dropped because their payload did not decode.
    pub malformed: u64,
}

/// Handler failure.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// No handler registered for the message type.
    #[error("No handler for message type {0}")]
    NoHandler(MessageType),

    /// Reply or forward failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Handler failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::message_types::{RIC_INDICATION, RIC_SUB_DEL_RESP};
    use shared_types::{NotificationKind, NotificationPayload, TransactionId};

    #[test]
    fn test_classify_user_message() {
        let env = MessageEnvelope::builder(RIC_INDICATION).subscription_id(7).build();
        assert_eq!(
            InboundMessage::classify(env.clone()).unwrap(),
            InboundMessage::User(env)
        );
    }

    #[test]
    fn test_classify_notification() {
        let notification = SubscriptionNotification {
            kind: NotificationKind::Deleted,
            payload: NotificationPayload {
                local_id: 42,
                transaction_id: TransactionId::new("tx").unwrap(),
                remote_id: Some(7),
                cause: None,
            },
            meid: None,
        };
        let env = notification.to_envelope().unwrap();
        assert_eq!(env.message_type(), RIC_SUB_DEL_RESP);
        assert_eq!(
            InboundMessage::classify(env).unwrap(),
            InboundMessage::Notification(notification)
        );
    }

    #[test]
    fn test_classify_malformed_notification() {
        let env = MessageEnvelope::builder(RIC_SUB_DEL_RESP)
            .payload(b"\x00\x01".to_vec())
            .build();
        assert!(matches!(
            InboundMessage::classify(env),
            Err(NotificationError::Malformed(_))
        ));
    }

    #[test]
    fn test_shard_is_stable_and_in_range() {
        let config = DispatchConfig {
            workers: 3,
            ..Default::default()
        };
        assert_eq!(config.shard_for(-1), 2);
        assert_eq!(config.shard_for(0), 0);
        assert_eq!(config.shard_for(7), config.shard_for(7));
        for sub in -10..10 {
            assert!(config.shard_for(sub) < 3);
        }
    }
}
