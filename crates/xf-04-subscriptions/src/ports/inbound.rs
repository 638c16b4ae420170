//! # Inbound Port - SubscriptionApi
//!
//! What an xApp calls to manage its subscriptions.

use crate::domain::{
    DeleteOutcome, LocalId, SubscriptionError, SubscriptionRecord, SubscriptionRequest,
};
use async_trait::async_trait;

/// Subscription lifecycle API.
///
/// # Example
///
/// ```rust,ignore
/// let local_id = manager.create(SubscriptionRequest::report("RanName-gnb-1234", trigger)).await?;
/// // ... later, once the confirmation has arrived
/// manager.delete(local_id).await?;
/// ```
#[async_trait]
pub trait SubscriptionApi: Send + Sync {
    /// Create a subscription with a fresh local id and submit it.
    ///
    /// # Errors
    /// - `Store`: the record could not be persisted (nothing was submitted)
    /// - `RemoteRejected`: the service refused the request (record kept as Failed)
    async fn create(&self, request: SubscriptionRequest) -> Result<LocalId, SubscriptionError>;

    /// As [`SubscriptionApi::create`] with a caller-chosen local id.
    ///
    /// # Errors
    /// `DuplicateLocalId` if the id is already tracked.
    async fn create_with_id(
        &self,
        local_id: LocalId,
        request: SubscriptionRequest,
    ) -> Result<LocalId, SubscriptionError>;

    /// Delete an active subscription, or queue the deletion of a pending one.
    ///
    /// # Errors
    /// - `NotFound`: unknown local id
    /// - `InvalidState`: already deleting, deleted or failed
    /// - `RemoteRejected`: the service refused the delete request
    async fn delete(&self, local_id: LocalId) -> Result<DeleteOutcome, SubscriptionError>;

    /// Snapshot of one record.
    fn get(&self, local_id: LocalId) -> Option<SubscriptionRecord>;

    /// Snapshot of every tracked record, ordered by local id.
    fn records(&self) -> Vec<SubscriptionRecord>;

    /// Number of records in `Active`.
    fn active_count(&self) -> usize;
}
