//! Dispatch loop → subscription manager.

use async_trait::async_trait;
use shared_types::SubscriptionNotification;
use std::sync::Arc;
use xf_03_dispatch::NotificationSink;
use xf_04_subscriptions::{SubscriptionClient, SubscriptionManager, SubscriptionStore, TimeSource};

/// Feeds notifications classified by the dispatch loop into the
/// subscription manager, on the loop task and in delivery order. State
/// changes are applied before this returns; any request they trigger is
/// sent off the loop.
pub struct NotificationBridge<C, S, T>
where
    C: SubscriptionClient,
    S: SubscriptionStore,
    T: TimeSource,
{
    manager: Arc<SubscriptionManager<C, S, T>>,
}

impl<C, S, T> NotificationBridge<C, S, T>
where
    C: SubscriptionClient,
    S: SubscriptionStore,
    T: TimeSource,
{
    pub fn new(manager: Arc<SubscriptionManager<C, S, T>>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<C, S, T> NotificationSink for NotificationBridge<C, S, T>
where
    C: SubscriptionClient + 'static,
    S: SubscriptionStore + 'static,
    T: TimeSource + 'static,
{
    async fn on_notification(&self, notification: SubscriptionNotification) {
        self.manager.handle_notification(notification);
    }
}
