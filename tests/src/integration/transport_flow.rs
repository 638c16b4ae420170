//! # Transport Flows
//!
//! Two or more transports sharing one in-memory fabric:
//!
//! - routed delivery keeps every envelope field
//! - subscription-specific routes win over type-wide routes
//! - no-route, saturation, not-ready and oversize failures
//! - return-to-sender replies

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{fast_transport_config, peer};
    use shared_bus::{InMemoryFabric, RouteTable};
    use shared_types::message_types::{
        RIC_HEALTH_CHECK_REQ, RIC_HEALTH_CHECK_RESP, RIC_INDICATION,
    };
    use shared_types::{Endpoint, MessageEnvelope, TransactionId, TransportError};
    use std::sync::Arc;
    use std::time::Duration;
    use xf_01_endpoint_registry::EndpointRegistry;
    use xf_02_transport::{MessageTransport, ReceiveMode, Received, Transport, TransportConfig};

    const WAIT: Duration = Duration::from_secs(2);

    fn indication(subscription_id: i32, payload: &[u8]) -> MessageEnvelope {
        MessageEnvelope::builder(RIC_INDICATION)
            .subscription_id(subscription_id)
            .payload(payload.to_vec())
            .meid("RanName-gnb-1234")
            .build()
    }

    async fn expect_message(transport: &Transport<InMemoryFabric>) -> MessageEnvelope {
        match transport.receive(ReceiveMode::blocking_for(WAIT)).await {
            Received::Message(envelope) => envelope,
            other => panic!("expected a message, got {other:?}"),
        }
    }

    // =========================================================================
    // ROUTED DELIVERY
    // =========================================================================

    #[tokio::test]
    async fn test_indication_reaches_peer_intact() {
        let fabric = Arc::new(InMemoryFabric::with_routes(
            RouteTable::new().with_route(RIC_INDICATION, Some(3), "kpimon"),
        ));
        let e2term = peer(&fabric, "e2term");
        let kpimon = peer(&fabric, "kpimon");

        let sent = indication(3, b"cell-load:0.82");
        let token = sent.transaction_id().clone();
        let report = e2term.send(sent).await.unwrap();
        assert_eq!(report.attempts, 1);
        assert_eq!(report.receivers, 1);

        let received = expect_message(&kpimon).await;
        assert_eq!(received.message_type(), RIC_INDICATION);
        assert_eq!(received.subscription_id(), 3);
        assert_eq!(received.payload(), b"cell-load:0.82");
        assert_eq!(received.meid(), Some("RanName-gnb-1234"));
        assert_eq!(received.transaction_id(), &token);

        assert_eq!(e2term.stats().sent, 1);
        assert_eq!(kpimon.stats().received, 1);
        assert_eq!(fabric.stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_subscription_route_wins_over_type_route() {
        let fabric = Arc::new(InMemoryFabric::with_routes(
            RouteTable::new()
                .with_route(RIC_INDICATION, None, "collector")
                .with_route(RIC_INDICATION, Some(7), "kpimon"),
        ));
        let e2term = peer(&fabric, "e2term");
        let collector = peer(&fabric, "collector");
        let kpimon = peer(&fabric, "kpimon");

        e2term.send(indication(7, b"for kpimon")).await.unwrap();
        e2term.send(indication(8, b"for collector")).await.unwrap();

        assert_eq!(expect_message(&kpimon).await.payload(), b"for kpimon");
        assert_eq!(expect_message(&collector).await.payload(), b"for collector");
        assert!(matches!(
            kpimon.receive(ReceiveMode::NonBlocking).await,
            Received::WouldBlock
        ));
    }

    #[tokio::test]
    async fn test_fan_out_to_every_receiver() {
        let fabric = Arc::new(InMemoryFabric::with_routes(
            RouteTable::new()
                .with_route(RIC_INDICATION, None, "kpimon")
                .with_route(RIC_INDICATION, None, "collector"),
        ));
        let e2term = peer(&fabric, "e2term");
        let kpimon = peer(&fabric, "kpimon");
        let collector = peer(&fabric, "collector");

        let report = e2term.send(indication(1, b"both")).await.unwrap();
        assert_eq!(report.receivers, 2);
        assert_eq!(expect_message(&kpimon).await.payload(), b"both");
        assert_eq!(expect_message(&collector).await.payload(), b"both");
    }

    // =========================================================================
    // FAILURES
    // =========================================================================

    #[tokio::test]
    async fn test_unrouted_type_fails_without_retry() {
        let fabric = Arc::new(InMemoryFabric::with_routes(
            RouteTable::new().with_route(RIC_INDICATION, None, "kpimon"),
        ));
        let e2term = peer(&fabric, "e2term");

        let err = e2term
            .send(MessageEnvelope::builder(40_000).subscription_id(5).build())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransportError::NoRoute {
                message_type: 40_000,
                subscription_id: 5
            }
        );
        let stats = e2term.stats();
        assert_eq!(stats.no_route, 1);
        assert_eq!(stats.retried, 0);
        assert_eq!(stats.sent, 0);
    }

    #[tokio::test]
    async fn test_saturated_receiver_is_transient_then_recovers() {
        let fabric = Arc::new(InMemoryFabric::with_routes(
            RouteTable::new().with_route(RIC_INDICATION, None, "kpimon"),
        ));
        let e2term = peer(&fabric, "e2term");
        let kpimon = Transport::new(
            Arc::clone(&fabric),
            Endpoint::new("kpimon", "10.0.0.3", 8080, 4560),
            Arc::new(EndpointRegistry::new()),
            TransportConfig {
                mailbox_capacity: 1,
                ..fast_transport_config()
            },
        );

        e2term.send(indication(1, b"first")).await.unwrap();
        let err = e2term.send(indication(1, b"second")).await.unwrap_err();

        let attempts = fast_transport_config().send_retries + 1;
        assert_eq!(err, TransportError::Transient { attempts });
        let stats = e2term.stats();
        assert_eq!(stats.retried, u64::from(attempts - 1));
        assert_eq!(stats.transient_failures, 1);

        // Draining the mailbox makes the same send succeed.
        assert_eq!(expect_message(&kpimon).await.payload(), b"first");
        e2term.send(indication(1, b"second")).await.unwrap();
        assert_eq!(expect_message(&kpimon).await.payload(), b"second");
    }

    #[tokio::test]
    async fn test_not_ready_until_route_table_loaded() {
        let fabric = Arc::new(InMemoryFabric::new());
        let e2term = peer(&fabric, "e2term");
        let kpimon = peer(&fabric, "kpimon");

        assert!(!e2term.is_ready());
        assert_eq!(
            e2term.send(indication(1, b"early")).await,
            Err(TransportError::NotReady)
        );

        let loader = Arc::clone(&fabric);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            loader.load_routes(RouteTable::new().with_route(RIC_INDICATION, None, "kpimon"));
        });

        e2term.wait_until_ready(WAIT).await.unwrap();
        e2term.send(indication(1, b"on time")).await.unwrap();
        assert_eq!(expect_message(&kpimon).await.payload(), b"on time");
    }

    #[tokio::test]
    async fn test_oversized_payload_is_fatal() {
        let fabric = Arc::new(InMemoryFabric::with_routes(
            RouteTable::new().with_route(RIC_INDICATION, None, "kpimon"),
        ));
        let e2term = peer(&fabric, "e2term");
        let _kpimon = peer(&fabric, "kpimon");

        let oversized = vec![0u8; fast_transport_config().max_payload_size + 1];
        let err = e2term.send(indication(1, &oversized)).await.unwrap_err();

        assert!(matches!(err, TransportError::Fatal(_)));
        assert_eq!(fabric.stats().delivered, 0);
    }

    #[tokio::test]
    async fn test_send_after_shutdown_is_closed() {
        let fabric = Arc::new(InMemoryFabric::with_routes(
            RouteTable::new().with_route(RIC_INDICATION, None, "kpimon"),
        ));
        let e2term = peer(&fabric, "e2term");
        let kpimon = peer(&fabric, "kpimon");

        e2term.send(indication(1, b"queued")).await.unwrap();
        let leftover = kpimon.shutdown().await;
        assert_eq!(leftover.len(), 1);

        assert!(matches!(
            kpimon.receive(ReceiveMode::NonBlocking).await,
            Received::Closed
        ));
        assert_eq!(
            kpimon.send(indication(1, b"late")).await,
            Err(TransportError::Closed)
        );
        // The receiver is gone from the fabric.
        assert!(matches!(
            e2term.send(indication(1, b"nobody")).await,
            Err(TransportError::NoRoute { .. })
        ));
    }

    // =========================================================================
    // RETURN TO SENDER
    // =========================================================================

    #[tokio::test]
    async fn test_reply_goes_back_to_requester() {
        let fabric = Arc::new(InMemoryFabric::with_routes(
            RouteTable::new().with_route(RIC_HEALTH_CHECK_REQ, None, "kpimon"),
        ));
        let monitor = peer(&fabric, "monitor");
        let kpimon = peer(&fabric, "kpimon");

        let token = TransactionId::new("hc-1").unwrap();
        monitor
            .send_with_return_route(
                MessageEnvelope::builder(RIC_HEALTH_CHECK_REQ)
                    .transaction_id(token.clone())
                    .build(),
            )
            .await
            .unwrap();

        let request = expect_message(&kpimon).await;
        assert_eq!(
            request.source().sender.as_ref().map(|s| s.name.as_str()),
            Some("monitor")
        );
        // The responder learned the requester's endpoint on receive.
        assert!(kpimon.registry().lookup_by_name("monitor").is_some());

        kpimon
            .reply_to_sender(&request, RIC_HEALTH_CHECK_RESP, b"OK".to_vec())
            .await
            .unwrap();

        let reply = expect_message(&monitor).await;
        assert_eq!(reply.message_type(), RIC_HEALTH_CHECK_RESP);
        assert_eq!(reply.payload(), b"OK");
        assert_eq!(reply.transaction_id(), &token);
    }

    #[tokio::test]
    async fn test_reply_without_return_route_is_no_route() {
        let fabric = Arc::new(InMemoryFabric::with_routes(
            RouteTable::new().with_route(RIC_HEALTH_CHECK_REQ, None, "kpimon"),
        ));
        let monitor = peer(&fabric, "monitor");
        let kpimon = peer(&fabric, "kpimon");

        monitor
            .send(MessageEnvelope::builder(RIC_HEALTH_CHECK_REQ).build())
            .await
            .unwrap();
        let request = expect_message(&kpimon).await;

        assert!(matches!(
            kpimon
                .reply_to_sender(&request, RIC_HEALTH_CHECK_RESP, b"OK".to_vec())
                .await,
            Err(TransportError::NoRoute { .. })
        ));
    }
}
