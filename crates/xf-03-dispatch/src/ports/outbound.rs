//! Driven ports of the dispatch loop.

use crate::domain::HandlerError;
use async_trait::async_trait;
use shared_types::{MessageEnvelope, SubscriptionNotification};

/// User message handler.
///
/// Called from a worker task. The envelope is borrowed for the duration of
/// the call only; copy what must outlive it.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, envelope: &MessageEnvelope) -> Result<(), HandlerError>;
}

/// Consumer of subscription notifications (the subscription manager).
///
/// Called on the loop task in delivery order.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn on_notification(&self, notification: SubscriptionNotification);
}
