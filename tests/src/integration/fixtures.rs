//! Shared fixtures: peers on a common fabric and a stand-in for the RIC
//! subscription service that answers over that fabric.

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_bus::{InMemoryFabric, RouteTable};
use shared_types::message_types::{
    RIC_INDICATION, RIC_SUB_DEL_FAILURE, RIC_SUB_DEL_RESP, RIC_SUB_FAILURE, RIC_SUB_RESP,
};
use shared_types::{
    Endpoint, NotificationKind, NotificationPayload, SubscriptionNotification, TransactionId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use xf_01_endpoint_registry::EndpointRegistry;
use xf_02_transport::{MessageTransport, Transport, TransportConfig};
use xf_04_subscriptions::{
    ClientError, LocalId, RemoteId, SubscriptionClient, SubscriptionRequest,
};
use xapp_runtime::XappConfig;

/// Endpoint name of the xApp under test.
pub const XAPP: &str = "kpimon";

/// Endpoint name of the fake subscription service.
pub const SUBMGR: &str = "submgr";

/// Managed element used throughout the scenarios.
pub const MEID: &str = "RanName-gnb-1234";

// =============================================================================
// FABRIC
// =============================================================================

/// Routes every subscription notification and indications to the xApp.
pub fn xapp_routes() -> RouteTable {
    [
        RIC_SUB_RESP,
        RIC_SUB_FAILURE,
        RIC_SUB_DEL_RESP,
        RIC_SUB_DEL_FAILURE,
        RIC_INDICATION,
    ]
    .into_iter()
    .fold(RouteTable::new(), |table, message_type| {
        table.with_route(message_type, None, XAPP)
    })
}

/// Transport settings with short delays for tests.
pub fn fast_transport_config() -> TransportConfig {
    TransportConfig {
        retry_delay: Duration::from_millis(1),
        ready_poll_interval: Duration::from_millis(5),
        ..TransportConfig::default()
    }
}

/// A bare transport attached to `fabric` as `name`.
pub fn peer(fabric: &Arc<InMemoryFabric>, name: &str) -> Transport<InMemoryFabric> {
    Transport::new(
        Arc::clone(fabric),
        Endpoint::new(name, "10.0.0.2", 8080, 4560),
        Arc::new(EndpointRegistry::new()),
        fast_transport_config(),
    )
}

/// Runtime configuration with short timers.
pub fn xapp_config() -> XappConfig {
    let mut config = XappConfig::default();
    config.xapp.name = XAPP.to_string();
    config.transport.retry_delay_ms = 1;
    config.transport.ready_timeout_ms = 500;
    config.transport.ready_poll_interval_ms = 5;
    config.dispatch.poll_interval_ms = 10;
    config.subscription.max_retries = 2;
    config.subscription.confirmation_timeout_ms = 50;
    config.subscription.timer_interval_ms = 10;
    config
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =============================================================================
// FAKE SUBSCRIPTION SERVICE
// =============================================================================

/// Accepts requests like the HTTP service does, then confirms or refuses
/// them asynchronously by sending notifications over the fabric.
pub struct FakeSubscriptionService {
    transport: Transport<InMemoryFabric>,
    next_remote_id: AtomicU64,
    remote_ids: Mutex<HashMap<LocalId, RemoteId>>,
    /// Create confirmations still to be dropped.
    silent_creates: AtomicU32,
    refuse_cause: Mutex<Option<String>>,
    delete_delay: Mutex<Option<Duration>>,
    creates: AtomicU32,
    deletes: AtomicU32,
}

impl FakeSubscriptionService {
    /// Attach to `fabric` as [`SUBMGR`]. Remote ids are handed out from
    /// `first_remote_id`.
    pub fn new(fabric: &Arc<InMemoryFabric>, first_remote_id: u64) -> Self {
        Self {
            transport: peer(fabric, SUBMGR),
            next_remote_id: AtomicU64::new(first_remote_id),
            remote_ids: Mutex::new(HashMap::new()),
            silent_creates: AtomicU32::new(0),
            refuse_cause: Mutex::new(None),
            delete_delay: Mutex::new(None),
            creates: AtomicU32::new(0),
            deletes: AtomicU32::new(0),
        }
    }

    /// Drop the next `count` create confirmations.
    pub fn drop_create_confirmations(&self, count: u32) {
        self.silent_creates.store(count, Ordering::SeqCst);
    }

    /// Never confirm a create request.
    pub fn never_confirm(&self) {
        self.silent_creates.store(u32::MAX, Ordering::SeqCst);
    }

    /// Refuse every create request from now on.
    pub fn refuse_creates(&self, cause: &str) {
        *self.refuse_cause.lock() = Some(cause.to_string());
    }

    /// Hold every delete request for `delay` before answering.
    pub fn delay_deletes(&self, delay: Duration) {
        *self.delete_delay.lock() = Some(delay);
    }

    pub fn create_count(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> u32 {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Send a notification the way the service would.
    pub async fn notify(
        &self,
        kind: NotificationKind,
        local_id: LocalId,
        transaction_id: &TransactionId,
        remote_id: Option<RemoteId>,
        cause: Option<String>,
    ) {
        let notification = SubscriptionNotification {
            kind,
            payload: NotificationPayload {
                local_id: local_id.0,
                transaction_id: transaction_id.clone(),
                remote_id: remote_id.map(|id| id.0),
                cause,
            },
            meid: Some(MEID.to_string()),
        };
        let envelope = notification
            .to_envelope()
            .expect("notification payload encodes");
        self.transport
            .send(envelope)
            .await
            .expect("notification routed to the xApp");
    }

    fn remote_id_for(&self, local_id: LocalId) -> RemoteId {
        *self
            .remote_ids
            .lock()
            .entry(local_id)
            .or_insert_with(|| RemoteId(self.next_remote_id.fetch_add(1, Ordering::SeqCst)))
    }

    fn take_silence(&self) -> bool {
        self.silent_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SubscriptionClient for FakeSubscriptionService {
    async fn create(
        &self,
        local_id: LocalId,
        transaction_id: &TransactionId,
        _request: &SubscriptionRequest,
    ) -> Result<Option<RemoteId>, ClientError> {
        self.creates.fetch_add(1, Ordering::SeqCst);

        let refusal = self.refuse_cause.lock().clone();
        if let Some(cause) = refusal {
            self.notify(
                NotificationKind::CreateFailed,
                local_id,
                transaction_id,
                None,
                Some(cause),
            )
            .await;
            return Ok(None);
        }
        if self.take_silence() {
            return Ok(None);
        }

        let remote_id = self.remote_id_for(local_id);
        self.notify(
            NotificationKind::Created,
            local_id,
            transaction_id,
            Some(remote_id),
            None,
        )
        .await;
        Ok(None)
    }

    async fn delete(
        &self,
        local_id: LocalId,
        transaction_id: &TransactionId,
        remote_id: RemoteId,
    ) -> Result<(), ClientError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delete_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.notify(
            NotificationKind::Deleted,
            local_id,
            transaction_id,
            Some(remote_id),
            None,
        )
        .await;
        Ok(())
    }
}
