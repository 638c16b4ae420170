//! Driven ports: the subscription service client, the record store and the
//! clock.

use crate::domain::{
    ClientError, LocalId, RemoteId, StoreError, SubscriptionRecord, SubscriptionRequest, Timestamp,
};
use async_trait::async_trait;
use shared_types::TransactionId;
#[cfg(any(test, feature = "test-utils"))]
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Client for the remote subscription service.
///
/// Implementations own connection-level retries; protocol-level retries
/// (missing confirmations) belong to the manager.
#[async_trait]
pub trait SubscriptionClient: Send + Sync {
    /// Submit a create request.
    ///
    /// # Returns
    /// The identifier in the service's acceptance response, if it sent one.
    async fn create(
        &self,
        local_id: LocalId,
        transaction_id: &TransactionId,
        request: &SubscriptionRequest,
    ) -> Result<Option<RemoteId>, ClientError>;

    /// Submit a delete request.
    async fn delete(
        &self,
        local_id: LocalId,
        transaction_id: &TransactionId,
        remote_id: RemoteId,
    ) -> Result<(), ClientError>;
}

/// Key-value persistence of subscription records, keyed by local id.
pub trait SubscriptionStore: Send + Sync {
    fn save(&self, record: &SubscriptionRecord) -> Result<(), StoreError>;

    fn load_all(&self) -> Result<Vec<SubscriptionRecord>, StoreError>;

    /// Removing an absent record is not an error.
    fn remove(&self, local_id: LocalId) -> Result<(), StoreError>;
}

/// Wall clock in epoch milliseconds. Confirmation timeouts are measured
/// against it, so tests swap in [`MockTimeSource`].
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp::try_from(since_epoch.as_millis()).unwrap_or(Timestamp::MAX)
    }
}

/// Clock that only moves when told to.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockTimeSource {
    now_ms: AtomicU64,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockTimeSource {
    pub fn new(start_ms: Timestamp) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: Timestamp) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// A call received by [`MockSubscriptionClient`].
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    Create {
        local_id: LocalId,
        transaction_id: TransactionId,
        meid: String,
    },
    Delete {
        local_id: LocalId,
        transaction_id: TransactionId,
        remote_id: RemoteId,
    },
}

/// Mock subscription client for testing.
///
/// Records every call. Answers with queued results in order, then with
/// `Ok(None)` / `Ok(())`.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockSubscriptionClient {
    calls: parking_lot::Mutex<Vec<ClientCall>>,
    create_results: parking_lot::Mutex<std::collections::VecDeque<Result<Option<RemoteId>, ClientError>>>,
    delete_results: parking_lot::Mutex<std::collections::VecDeque<Result<(), ClientError>>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockSubscriptionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_create_result(&self, result: Result<Option<RemoteId>, ClientError>) {
        self.create_results.lock().push_back(result);
    }

    pub fn push_delete_result(&self, result: Result<(), ClientError>) {
        self.delete_results.lock().push_back(result);
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().clone()
    }

    pub fn create_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, ClientCall::Create { .. }))
            .count()
    }

    pub fn delete_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, ClientCall::Delete { .. }))
            .count()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl SubscriptionClient for MockSubscriptionClient {
    async fn create(
        &self,
        local_id: LocalId,
        transaction_id: &TransactionId,
        request: &SubscriptionRequest,
    ) -> Result<Option<RemoteId>, ClientError> {
        self.calls.lock().push(ClientCall::Create {
            local_id,
            transaction_id: transaction_id.clone(),
            meid: request.meid.clone(),
        });
        self.create_results.lock().pop_front().unwrap_or(Ok(None))
    }

    async fn delete(
        &self,
        local_id: LocalId,
        transaction_id: &TransactionId,
        remote_id: RemoteId,
    ) -> Result<(), ClientError> {
        self.calls.lock().push(ClientCall::Delete {
            local_id,
            transaction_id: transaction_id.clone(),
            remote_id,
        });
        self.delete_results.lock().pop_front().unwrap_or(Ok(()))
    }
}
