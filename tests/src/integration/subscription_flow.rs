//! # Subscription Flows
//!
//! A complete runtime on a shared fabric. Requests go to a fake
//! subscription service, which answers the way the RIC service does: an
//! immediate accept, then a confirmation (or refusal) routed back to the
//! xApp over the fabric, through the dispatch loop, into the manager.
//!
//! ```text
//! manager.create() ──→ FakeSubscriptionService
//!                            │ RIC_SUB_RESP
//!                            ▼
//!                   fabric ──→ dispatch loop ──→ handle_notification()
//! ```

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{
        peer, wait_for, xapp_config, xapp_routes, FakeSubscriptionService, MEID, XAPP,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use shared_bus::InMemoryFabric;
    use shared_types::message_types::RIC_INDICATION;
    use shared_types::{MessageEnvelope, NotificationKind};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::broadcast;
    use tokio::time::timeout;
    use xapp_runtime::{XappConfig, XappRuntime};
    use xf_02_transport::MessageTransport;
    use xf_03_dispatch::{HandlerError, HandlerTable, MessageHandler};
    use xf_04_subscriptions::{
        DeleteOutcome, FailureKind, LocalId, RemoteId, SubscriptionApi, SubscriptionEvent,
        SubscriptionRequest, SubscriptionState,
    };

    const WAIT: Duration = Duration::from_secs(3);

    // =========================================================================
    // FIXTURES
    // =========================================================================

    struct Harness {
        fabric: Arc<InMemoryFabric>,
        service: Arc<FakeSubscriptionService>,
        runtime: XappRuntime<FakeSubscriptionService>,
    }

    async fn start_with(config: XappConfig, handlers: HandlerTable) -> Harness {
        let fabric = Arc::new(InMemoryFabric::with_routes(xapp_routes()));
        let service = Arc::new(FakeSubscriptionService::new(&fabric, 7));
        let runtime =
            XappRuntime::with_parts(config, handlers, Arc::clone(&fabric), Arc::clone(&service))
                .expect("runtime builds");
        runtime.start().await.expect("runtime starts");
        Harness {
            fabric,
            service,
            runtime,
        }
    }

    async fn start() -> Harness {
        start_with(xapp_config(), HandlerTable::new()).await
    }

    async fn next_event(events: &mut broadcast::Receiver<SubscriptionEvent>) -> SubscriptionEvent {
        timeout(WAIT, events.recv())
            .await
            .expect("Timeout waiting for subscription event")
            .expect("event channel open")
    }

    fn request() -> SubscriptionRequest {
        SubscriptionRequest::report(MEID, vec![0x01, 0x02])
    }

    /// Records indication payloads in arrival order.
    #[derive(Default)]
    struct RecordingHandler {
        payloads: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle(&self, envelope: &MessageEnvelope) -> Result<(), HandlerError> {
            self.payloads.lock().push(envelope.payload().to_vec());
            Ok(())
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    #[tokio::test]
    async fn test_full_lifecycle_over_fabric() {
        let h = start().await;
        let manager = h.runtime.subscriptions();
        let mut events = manager.events();

        let local_id = manager.create_with_id(LocalId(42), request()).await.unwrap();
        assert_eq!(local_id, LocalId(42));
        assert_eq!(
            next_event(&mut events).await,
            SubscriptionEvent::Activated {
                local_id: LocalId(42),
                remote_id: RemoteId(7)
            }
        );

        let record = manager.get(LocalId(42)).unwrap();
        assert_eq!(record.state, SubscriptionState::Active);
        assert_eq!(record.meid, MEID);
        assert_eq!(manager.active_count(), 1);

        assert_eq!(
            manager.delete(LocalId(42)).await.unwrap(),
            DeleteOutcome::Submitted
        );
        assert_eq!(
            next_event(&mut events).await,
            SubscriptionEvent::Deleted {
                local_id: LocalId(42)
            }
        );
        assert!(manager.get(LocalId(42)).is_none());
        assert!(manager.records().is_empty());
        assert_eq!(h.service.create_count(), 1);
        assert_eq!(h.service.delete_count(), 1);

        assert!(
            wait_for(WAIT, || h
                .runtime
                .dispatch_stats()
                .is_some_and(|s| s.notifications == 2))
            .await
        );
        assert_eq!(h.runtime.dispatch_stats().unwrap().dispatched, 0);
        h.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_confirmation_is_discarded() {
        let h = start().await;
        let manager = h.runtime.subscriptions();
        let mut events = manager.events();

        manager.create_with_id(LocalId(42), request()).await.unwrap();
        next_event(&mut events).await;
        let record = manager.get(LocalId(42)).unwrap();

        h.service
            .notify(
                NotificationKind::Created,
                LocalId(42),
                &record.transaction_id,
                Some(RemoteId(99)),
                None,
            )
            .await;

        assert!(wait_for(WAIT, || manager.stats().discarded_notifications == 1).await);
        let record = manager.get(LocalId(42)).unwrap();
        assert_eq!(record.state, SubscriptionState::Active);
        assert_eq!(record.remote_id, Some(RemoteId(7)));
        h.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_lost_confirmations_are_retried() {
        let h = start().await;
        h.service.drop_create_confirmations(2);
        let manager = h.runtime.subscriptions();
        let mut events = manager.events();

        let local_id = manager.create(request()).await.unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            SubscriptionEvent::Activated { local_id: id, .. } if id == local_id
        ));

        let record = manager.get(local_id).unwrap();
        assert_eq!(record.retry_count, 2);
        assert_eq!(h.service.create_count(), 3);
        h.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_unconfirmed_create_fails_after_retries() {
        let h = start().await;
        h.service.never_confirm();
        let manager = h.runtime.subscriptions();
        let mut events = manager.events();

        let local_id = manager.create(request()).await.unwrap();
        let SubscriptionEvent::Failed(failure) = next_event(&mut events).await else {
            panic!("expected a failure event");
        };

        assert_eq!(failure.local_id, local_id);
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert_eq!(failure.phase, SubscriptionState::Pending);
        assert_eq!(failure.retry_count, 2);
        assert_eq!(h.service.create_count(), 3);

        // Failed records stay queryable.
        assert_eq!(
            manager.get(local_id).unwrap().state,
            SubscriptionState::Failed
        );
        assert_eq!(manager.state_counts().failed, 1);
        h.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_refused_create_reports_cause() {
        let h = start().await;
        h.service.refuse_creates("unknown meid");
        let manager = h.runtime.subscriptions();
        let mut events = manager.events();

        let local_id = manager.create(request()).await.unwrap();
        let SubscriptionEvent::Failed(failure) = next_event(&mut events).await else {
            panic!("expected a failure event");
        };

        assert_eq!(failure.local_id, local_id);
        assert_eq!(failure.kind, FailureKind::RemoteRejected);
        assert_eq!(failure.last_error.as_deref(), Some("unknown meid"));
        assert_eq!(h.service.create_count(), 1);
        h.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_while_pending_follows_confirmation() {
        let h = start().await;
        h.service.drop_create_confirmations(1);
        let manager = h.runtime.subscriptions();
        let mut events = manager.events();

        let local_id = manager.create(request()).await.unwrap();
        assert_eq!(
            manager.delete(local_id).await.unwrap(),
            DeleteOutcome::Queued
        );

        assert!(matches!(
            next_event(&mut events).await,
            SubscriptionEvent::Activated { .. }
        ));
        assert_eq!(
            next_event(&mut events).await,
            SubscriptionEvent::Deleted { local_id }
        );
        assert!(manager.get(local_id).is_none());
        assert_eq!(h.service.delete_count(), 1);
        h.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_slow_queued_deletion_does_not_stall_dispatch() {
        let recorder = Arc::new(RecordingHandler::default());
        let handlers = HandlerTable::new().on(RIC_INDICATION, recorder.clone());
        let h = start_with(xapp_config(), handlers).await;
        h.service.drop_create_confirmations(1);
        h.service.delay_deletes(Duration::from_secs(2));
        let manager = h.runtime.subscriptions();
        let mut events = manager.events();
        let e2term = peer(&h.fabric, "e2term");

        let local_id = manager.create(request()).await.unwrap();
        assert_eq!(
            manager.delete(local_id).await.unwrap(),
            DeleteOutcome::Queued
        );
        // The retried create is confirmed, which starts the queued deletion.
        assert!(matches!(
            next_event(&mut events).await,
            SubscriptionEvent::Activated { .. }
        ));

        e2term
            .send(
                MessageEnvelope::builder(RIC_INDICATION)
                    .subscription_id(7)
                    .payload(vec![0xAA])
                    .build(),
            )
            .await
            .unwrap();
        assert!(
            wait_for(Duration::from_millis(500), || recorder.payloads.lock().len() == 1).await,
            "indication waited behind the delete request"
        );
        assert_eq!(
            manager.get(local_id).unwrap().state,
            SubscriptionState::DeletePending
        );

        assert_eq!(
            next_event(&mut events).await,
            SubscriptionEvent::Deleted { local_id }
        );
        assert_eq!(h.service.delete_count(), 1);
        h.runtime.shutdown().await;
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    #[tokio::test]
    async fn test_active_subscription_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = xapp_config();
        config.subscription.store_dir = Some(dir.path().to_path_buf());

        let first = start_with(config.clone(), HandlerTable::new()).await;
        let mut events = first.runtime.subscriptions().events();
        first
            .runtime
            .subscriptions()
            .create_with_id(LocalId(42), request())
            .await
            .unwrap();
        next_event(&mut events).await;
        first.runtime.shutdown().await;

        let second = start_with(config, HandlerTable::new()).await;
        let record = second.runtime.subscriptions().get(LocalId(42)).unwrap();
        assert_eq!(record.state, SubscriptionState::Active);
        assert_eq!(record.remote_id, Some(RemoteId(7)));
        assert_eq!(second.service.create_count(), 0);

        // New ids do not collide with restored ones.
        let next = second
            .runtime
            .subscriptions()
            .create(request())
            .await
            .unwrap();
        assert!(next > LocalId(42));
        second.runtime.shutdown().await;
    }

    // =========================================================================
    // USER TRAFFIC
    // =========================================================================

    #[tokio::test]
    async fn test_indications_reach_handler_in_order() {
        let recorder = Arc::new(RecordingHandler::default());
        let handlers = HandlerTable::new().on(RIC_INDICATION, recorder.clone());
        let h = start_with(xapp_config(), handlers).await;
        let e2term = peer(&h.fabric, "e2term");

        for i in 0..20u8 {
            e2term
                .send(
                    MessageEnvelope::builder(RIC_INDICATION)
                        .subscription_id(7)
                        .payload(vec![i])
                        .build(),
                )
                .await
                .unwrap();
        }

        assert!(wait_for(WAIT, || recorder.payloads.lock().len() == 20).await);
        let expected: Vec<Vec<u8>> = (0..20u8).map(|i| vec![i]).collect();
        assert_eq!(*recorder.payloads.lock(), expected);

        h.runtime.shutdown().await;
        let stats = h.runtime.dispatch_stats().unwrap();
        assert_eq!(stats.dispatched, 20);
        assert_eq!(stats.notifications, 0);
        assert_eq!(h.runtime.transport().identity().name, XAPP);
    }
}
