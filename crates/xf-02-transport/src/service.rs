//! Transport service - the fabric-backed implementation of
//! [`MessageTransport`].

use crate::domain::{
    ReceiveMode, Received, SendReport, TransportConfig, TransportStats, TransportStatsSnapshot,
};
use crate::ports::inbound::MessageTransport;
use async_trait::async_trait;
use shared_bus::{BufferPool, BufferPoolStats, FabricError, Mailbox, RoutingFabric};
use shared_types::{Endpoint, MessageEnvelope, MessageType, SubscriptionId, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use xf_01_endpoint_registry::EndpointRegistry;

/// Transport bound to one fabric endpoint.
///
/// Constructed explicitly and owned by the runtime; share it through an
/// `Arc`. Sends may run concurrently. Receives are serialized on the local
/// mailbox.
pub struct Transport<F: RoutingFabric> {
    fabric: Arc<F>,
    mailbox: Mutex<Mailbox>,
    identity: Endpoint,
    registry: Arc<EndpointRegistry>,
    config: TransportConfig,
    pool: BufferPool,
    accepting: AtomicBool,
    stats: TransportStats,
}

impl<F: RoutingFabric> Transport<F> {
    /// Attach `identity` to the fabric.
    pub fn new(
        fabric: Arc<F>,
        identity: Endpoint,
        registry: Arc<EndpointRegistry>,
        config: TransportConfig,
    ) -> Self {
        let mailbox = fabric.attach(&identity.name, config.mailbox_capacity);
        info!(endpoint = %identity, "Transport attached to fabric");
        Self {
            fabric,
            mailbox: Mutex::new(mailbox),
            identity,
            registry,
            pool: BufferPool::new(config.buffer_pool_size, config.max_payload_size),
            config,
            accepting: AtomicBool::new(true),
            stats: TransportStats::default(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> TransportStatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn pool_stats(&self) -> BufferPoolStats {
        self.pool.stats()
    }

    /// An empty payload buffer from the pool.
    pub fn allocate(&self, min_capacity: usize) -> Vec<u8> {
        self.pool.acquire(min_capacity)
    }

    /// Poll readiness every `ready_poll_interval` until `timeout`.
    ///
    /// # Errors
    /// `NotReady` if the route table is still missing at the deadline.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<(), TransportError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.fabric.is_ready() {
                debug!(endpoint = %self.identity.name, "Fabric ready");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(timeout_ms = timeout.as_millis() as u64, "Fabric not ready before deadline");
                return Err(TransportError::NotReady);
            }
            tokio::time::sleep(self.config.ready_poll_interval).await;
        }
    }

    /// Checks every outbound envelope passes before any routing: closed,
    /// then malformed, then not ready.
    fn admit(&self, envelope: &MessageEnvelope) -> Result<(), TransportError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        envelope.validate(self.config.max_payload_size)?;
        if !self.fabric.is_ready() {
            return Err(TransportError::NotReady);
        }
        Ok(())
    }

    /// Attempt delivery of an admitted envelope with the saturation retry
    /// policy.
    async fn deliver<A>(
        &self,
        envelope: &MessageEnvelope,
        attempt: A,
    ) -> Result<SendReport, TransportError>
    where
        A: Fn(&MessageEnvelope) -> Result<usize, FabricError> + Send + Sync,
    {
        let max_attempts = self.config.send_retries.saturating_add(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match attempt(envelope) {
                Ok(receivers) => {
                    self.stats.sent.fetch_add(1, Ordering::Relaxed);
                    return Ok(SendReport {
                        attempts,
                        receivers,
                    });
                }
                Err(FabricError::Saturated) if attempts < max_attempts => {
                    self.stats.retried.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        message_type = envelope.message_type(),
                        attempts = attempts,
                        "Receiver saturated, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(FabricError::Saturated) => {
                    self.stats.transient_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        message_type = envelope.message_type(),
                        subscription_id = envelope.subscription_id(),
                        attempts = attempts,
                        "Send retries exhausted"
                    );
                    return Err(TransportError::Transient { attempts });
                }
                Err(FabricError::NoRoute | FabricError::UnknownEndpoint(_)) => {
                    return Err(self.no_route(envelope.message_type(), envelope.subscription_id()));
                }
                Err(FabricError::NotReady) => return Err(TransportError::NotReady),
                Err(FabricError::Closed) => return Err(TransportError::Closed),
            }
        }
    }

    fn no_route(&self, message_type: MessageType, subscription_id: SubscriptionId) -> TransportError {
        self.stats.no_route.fetch_add(1, Ordering::Relaxed);
        debug!(
            message_type = message_type,
            subscription_id = subscription_id,
            "No route for message"
        );
        TransportError::NoRoute {
            message_type,
            subscription_id,
        }
    }

    /// Account for a received envelope and remember its sender.
    fn observe(&self, envelope: &MessageEnvelope) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        if let Some(sender) = &envelope.source().sender {
            self.registry.register(sender.clone());
        }
    }
}

#[async_trait]
impl<F: RoutingFabric> MessageTransport for Transport<F> {
    async fn send(&self, envelope: MessageEnvelope) -> Result<SendReport, TransportError> {
        self.admit(&envelope)?;
        self.deliver(&envelope, |env| self.fabric.route(env)).await
    }

    async fn send_with_return_route(
        &self,
        envelope: MessageEnvelope,
    ) -> Result<SendReport, TransportError> {
        let envelope = envelope.with_sender(self.identity.clone());
        self.admit(&envelope)?;
        self.deliver(&envelope, |env| self.fabric.route(env)).await
    }

    async fn reply_to_sender(
        &self,
        request: &MessageEnvelope,
        message_type: MessageType,
        payload: Vec<u8>,
    ) -> Result<SendReport, TransportError> {
        let mut builder = MessageEnvelope::builder(message_type)
            .subscription_id(request.subscription_id())
            .transaction_id(request.transaction_id().clone())
            .payload(payload)
            .sender(self.identity.clone());
        if let Some(meid) = request.meid() {
            builder = builder.meid(meid);
        }
        let reply = builder.build();
        self.admit(&reply)?;

        let target = request
            .source()
            .sender
            .as_ref()
            .and_then(|sender| self.registry.lookup(&sender.key()));
        let Some(target) = target else {
            return Err(self.no_route(message_type, request.subscription_id()));
        };

        self.deliver(&reply, |env| {
            self.fabric.route_to(&target.name, env).map(|()| 1)
        })
        .await
    }

    async fn receive(&self, mode: ReceiveMode) -> Received {
        let mut mailbox = self.mailbox.lock().await;
        let envelope = match mode {
            ReceiveMode::NonBlocking => match mailbox.try_recv() {
                Ok(Some(envelope)) => envelope,
                Ok(None) => return Received::WouldBlock,
                Err(_) => return Received::Closed,
            },
            ReceiveMode::Blocking { timeout: None } => match mailbox.recv().await {
                Some(envelope) => envelope,
                None => return Received::Closed,
            },
            ReceiveMode::Blocking {
                timeout: Some(timeout),
            } => match tokio::time::timeout(timeout, mailbox.recv()).await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => return Received::Closed,
                Err(_) => return Received::WouldBlock,
            },
        };
        drop(mailbox);

        self.observe(&envelope);
        Received::Message(envelope)
    }

    fn is_ready(&self) -> bool {
        self.fabric.is_ready()
    }

    async fn shutdown(&self) -> Vec<MessageEnvelope> {
        if self.accepting.swap(false, Ordering::AcqRel) {
            info!(endpoint = %self.identity.name, "Transport shutting down");
        }
        // Detaching drops the fabric's sender, which also wakes a receiver
        // blocked on the mailbox.
        self.fabric.detach(&self.identity.name);

        let mut mailbox = self.mailbox.lock().await;
        mailbox.close();
        let drained = mailbox.drain();
        drop(mailbox);

        for envelope in &drained {
            self.observe(envelope);
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "Drained queued messages");
        }
        drained
    }

    fn identity(&self) -> &Endpoint {
        &self.identity
    }

    fn recycle(&self, envelope: MessageEnvelope) {
        self.pool.release(envelope.into_payload());
    }
}
