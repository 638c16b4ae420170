//! Subscription Manager - drives every record through its lifecycle.
//!
//! ## Locking
//!
//! All records sit behind one `parking_lot::Mutex`, shared by the API, the
//! notification path and the retry timer. The lock is never held across an
//! `.await` or a store write:
//!
//! - HTTP submissions run outside it with `in_flight` set, and their result
//!   is applied only if the record is still in the phase it was submitted
//!   from.
//! - Store writes are staged under the lock with a revision and applied
//!   after it is released. A write older than one already applied for the
//!   same record is skipped, so the store always ends on the latest state.
//!
//! Store writes still run on the calling task. The file store syncs every
//! write, so keep it to deployments with a modest number of subscriptions.
//!
//! The notification path never waits on the subscription service: a
//! deletion queued behind a confirmation is submitted on its own task.

use crate::domain::{
    DeleteOutcome, LocalId, RemoteId, StoreError, SubmissionOutcome, Submission,
    SubscriptionConfig, SubscriptionError, SubscriptionEvent, SubscriptionFailure,
    SubscriptionRecord, SubscriptionRequest, SubscriptionState, TimerAction, Transition,
};
use crate::ports::inbound::SubscriptionApi;
use crate::ports::outbound::{SubscriptionClient, SubscriptionStore, TimeSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::SubscriptionNotification;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct ManagerCounters {
    created: AtomicU64,
    activated: AtomicU64,
    deleted: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    discarded_notifications: AtomicU64,
}

/// Point-in-time copy of manager counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub created: u64,
    pub activated: u64,
    pub deleted: u64,
    pub failed: u64,
    /// Re-submissions issued by the retry timer.
    pub retries: u64,
    /// Notifications that matched no record, phase or token.
    pub discarded_notifications: u64,
}

/// Records by state, for gauges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub pending: usize,
    pub active: usize,
    pub delete_pending: usize,
    pub failed: usize,
}

// =============================================================================
// STORE WRITES
// =============================================================================

enum StoreOp {
    Save(Box<SubscriptionRecord>),
    Remove(LocalId),
}

/// A store write captured under the records lock.
struct StagedWrite {
    local_id: LocalId,
    revision: u64,
    op: StoreOp,
}

/// Applies staged writes outside the records lock, newest revision wins.
struct StoreWriter<S> {
    store: Arc<S>,
    next_revision: AtomicU64,
    applied: Mutex<HashMap<LocalId, u64>>,
}

impl<S: SubscriptionStore> StoreWriter<S> {
    fn new(store: Arc<S>) -> Self {
        Self {
            store,
            next_revision: AtomicU64::new(1),
            applied: Mutex::new(HashMap::new()),
        }
    }

    /// Call with the records lock held.
    fn save(&self, record: &SubscriptionRecord) -> StagedWrite {
        self.stage(record.local_id, StoreOp::Save(Box::new(record.clone())))
    }

    /// Call with the records lock held.
    fn remove(&self, local_id: LocalId) -> StagedWrite {
        self.stage(local_id, StoreOp::Remove(local_id))
    }

    fn stage(&self, local_id: LocalId, op: StoreOp) -> StagedWrite {
        StagedWrite {
            local_id,
            revision: self.next_revision.fetch_add(1, Ordering::Relaxed),
            op,
        }
    }

    fn apply(&self, write: StagedWrite) -> Result<(), StoreError> {
        let mut applied = self.applied.lock();
        if applied
            .get(&write.local_id)
            .is_some_and(|&revision| revision > write.revision)
        {
            debug!(local_id = %write.local_id, "Skipping superseded store write");
            return Ok(());
        }
        match &write.op {
            StoreOp::Save(record) => self.store.save(record)?,
            StoreOp::Remove(local_id) => self.store.remove(*local_id)?,
        }
        applied.insert(write.local_id, write.revision);
        Ok(())
    }
}

// =============================================================================
// MANAGER
// =============================================================================

/// The subscription lifecycle manager.
pub struct SubscriptionManager<C, S, T>
where
    C: SubscriptionClient,
    S: SubscriptionStore,
    T: TimeSource,
{
    client: Arc<C>,
    store: Arc<S>,
    writer: StoreWriter<S>,
    time: Arc<T>,
    config: SubscriptionConfig,
    records: Mutex<HashMap<LocalId, SubscriptionRecord>>,
    next_local_id: AtomicU64,
    events: broadcast::Sender<SubscriptionEvent>,
    counters: ManagerCounters,
}

impl<C, S, T> SubscriptionManager<C, S, T>
where
    C: SubscriptionClient,
    S: SubscriptionStore,
    T: TimeSource,
{
    pub fn new(client: Arc<C>, store: Arc<S>, time: Arc<T>, config: SubscriptionConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            client,
            writer: StoreWriter::new(Arc::clone(&store)),
            store,
            time,
            config,
            records: Mutex::new(HashMap::new()),
            next_local_id: AtomicU64::new(1),
            events,
            counters: ManagerCounters::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SubscriptionConfig {
        &self.config
    }

    /// Subscribe to lifecycle events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SubscriptionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            created: self.counters.created.load(Ordering::Relaxed),
            activated: self.counters.activated.load(Ordering::Relaxed),
            deleted: self.counters.deleted.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            discarded_notifications: self.counters.discarded_notifications.load(Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn state_counts(&self) -> StateCounts {
        let records = self.records.lock();
        let mut counts = StateCounts::default();
        for record in records.values() {
            match record.state {
                SubscriptionState::Pending => counts.pending += 1,
                SubscriptionState::Active => counts.active += 1,
                SubscriptionState::DeletePending => counts.delete_pending += 1,
                SubscriptionState::Failed => counts.failed += 1,
                SubscriptionState::Deleted => {}
            }
        }
        counts
    }

    /// Reload persisted records. Call once at startup, before the timer
    /// runs. Records awaiting confirmation are resubmitted by the timer once
    /// their timeout has passed.
    ///
    /// # Errors
    /// `Store` if the records cannot be read.
    pub fn restore(&self) -> Result<usize, SubscriptionError> {
        let loaded = self.store.load_all()?;
        let mut records = self.records.lock();
        let mut restored = 0;
        for mut record in loaded {
            if record.state == SubscriptionState::Deleted || records.contains_key(&record.local_id) {
                continue;
            }
            record.in_flight = false;
            self.next_local_id
                .fetch_max(record.local_id.0 + 1, Ordering::Relaxed);
            records.insert(record.local_id, record);
            restored += 1;
        }
        info!(restored = restored, "Subscription records restored");
        Ok(restored)
    }

    /// One retry timer pass: resubmit timed-out requests, fail records whose
    /// retries are exhausted.
    ///
    /// # Returns
    /// The number of requests resubmitted.
    pub async fn tick(&self) -> usize {
        let now = self.time.now();
        let mut resubmit = Vec::new();
        let mut failures = Vec::new();
        let mut writes = Vec::new();
        {
            let mut records = self.records.lock();
            for record in records.values_mut() {
                match record.on_timer(now, &self.config) {
                    TimerAction::Idle => {}
                    TimerAction::Resubmit(submission) => {
                        debug!(
                            local_id = %record.local_id,
                            retry = record.retry_count,
                            "Confirmation timed out, resubmitting"
                        );
                        writes.push(self.writer.save(record));
                        resubmit.push(submission);
                    }
                    TimerAction::GiveUp(failure) => {
                        writes.push(self.writer.save(record));
                        failures.push(failure);
                    }
                }
            }
        }

        for write in writes {
            self.persist(write);
        }
        for failure in failures {
            self.report_failure(failure);
        }

        let count = resubmit.len();
        self.counters
            .retries
            .fetch_add(count as u64, Ordering::Relaxed);
        futures::future::join_all(resubmit.into_iter().map(|s| self.submit(s))).await;
        count
    }

    /// Call [`SubscriptionManager::tick`] every `timer_interval` until
    /// `shutdown` turns `true` or its sender is dropped.
    pub async fn run_timer(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.timer_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_ms = self.config.timer_interval.as_millis() as u64,
            "Subscription retry timer started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Subscription retry timer stopped");
    }

    /// Send `submission`, apply its result, then send whatever that result
    /// queued (a deletion waiting on activation).
    ///
    /// # Returns
    /// The failure report if the service refused `submission` itself.
    async fn submit(&self, submission: Submission) -> Option<SubscriptionFailure> {
        let (failure, mut follow_up) = self.send(submission).await;
        while let Some(next) = follow_up.take() {
            follow_up = self.send(next).await.1;
        }
        failure
    }

    async fn send(
        &self,
        submission: Submission,
    ) -> (Option<SubscriptionFailure>, Option<Submission>) {
        let local_id = submission.local_id();
        let result = match &submission {
            Submission::Create {
                transaction_id,
                request,
                ..
            } => self.client.create(local_id, transaction_id, request).await,
            Submission::Delete {
                transaction_id,
                remote_id,
                ..
            } => self
                .client
                .delete(local_id, transaction_id, *remote_id)
                .await
                .map(|()| None),
        };

        let (outcome, write, follow_up) = {
            let mut records = self.records.lock();
            let Some(record) = records.get_mut(&local_id) else {
                return (None, None);
            };
            let outcome = record.complete_submission(&submission, result);
            let follow_up = match &outcome {
                SubmissionOutcome::Activated(_) => self.queued_deletion(record),
                _ => None,
            };
            let write = (!matches!(outcome, SubmissionOutcome::Stale))
                .then(|| self.writer.save(record));
            (outcome, write, follow_up)
        };
        if let Some(write) = write {
            self.persist(write);
        }

        match outcome {
            SubmissionOutcome::Stale | SubmissionOutcome::Accepted => (None, None),
            SubmissionOutcome::Activated(remote_id) => {
                self.report_activation(local_id, remote_id);
                (None, follow_up)
            }
            SubmissionOutcome::Deferred(reason) => {
                warn!(local_id = %local_id, error = %reason, "Submission failed, timer will retry");
                (None, None)
            }
            SubmissionOutcome::Rejected(failure) => {
                self.report_failure(failure.clone());
                (Some(failure), None)
            }
        }
    }

    /// Start a deletion requested while `record` was still pending.
    fn queued_deletion(&self, record: &mut SubscriptionRecord) -> Option<Submission> {
        if !record.cancel_queued {
            return None;
        }
        debug!(local_id = %record.local_id, "Running queued deletion");
        record.begin_delete(self.time.now()).ok().flatten()
    }

    fn persist(&self, write: StagedWrite) {
        let local_id = write.local_id;
        if let Err(e) = self.writer.apply(write) {
            error!(local_id = %local_id, error = %e, "Failed to persist subscription record");
        }
    }

    fn discard(&self, local_id: LocalId, reason: &str) {
        self.counters
            .discarded_notifications
            .fetch_add(1, Ordering::Relaxed);
        debug!(local_id = %local_id, reason = reason, "Notification discarded");
    }

    fn report_activation(&self, local_id: LocalId, remote_id: RemoteId) {
        self.counters.activated.fetch_add(1, Ordering::Relaxed);
        info!(local_id = %local_id, remote_id = %remote_id, "Subscription active");
        self.emit(SubscriptionEvent::Activated {
            local_id,
            remote_id,
        });
    }

    fn report_failure(&self, failure: SubscriptionFailure) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        warn!(
            local_id = %failure.local_id,
            kind = ?failure.kind,
            phase = ?failure.phase,
            retries = failure.retry_count,
            error = failure.last_error.as_deref().unwrap_or_default(),
            "Subscription failed"
        );
        self.emit(SubscriptionEvent::Failed(failure));
    }

    fn emit(&self, event: SubscriptionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

impl<C, S, T> SubscriptionManager<C, S, T>
where
    C: SubscriptionClient + 'static,
    S: SubscriptionStore + 'static,
    T: TimeSource + 'static,
{
    /// Handle a confirmation or refusal delivered by the dispatch loop.
    ///
    /// Notifications for unknown records, of the wrong kind for the
    /// record's state, or carrying a stale token are discarded. Returns
    /// without waiting on the subscription service.
    pub fn handle_notification(self: &Arc<Self>, notification: SubscriptionNotification) {
        let local_id = LocalId(notification.payload.local_id);
        let (transition, write, follow_up) = {
            let mut records = self.records.lock();
            let Some(record) = records.get_mut(&local_id) else {
                self.discard(local_id, "unknown local id");
                return;
            };

            let transition = record.apply_notification(&notification);
            let (write, follow_up) = match &transition {
                Transition::Ignored(reason) => {
                    self.discard(local_id, reason);
                    return;
                }
                Transition::Held => {
                    debug!(local_id = %local_id, "Confirmation held until the create response arrives");
                    return;
                }
                Transition::Activated(_) => {
                    let follow_up = self.queued_deletion(record);
                    (self.writer.save(record), follow_up)
                }
                Transition::Deleted => {
                    records.remove(&local_id);
                    (self.writer.remove(local_id), None)
                }
                Transition::Failed(_) => (self.writer.save(record), None),
            };
            (transition, write, follow_up)
        };
        self.persist(write);

        match transition {
            Transition::Activated(remote_id) => self.report_activation(local_id, remote_id),
            Transition::Deleted => {
                self.counters.deleted.fetch_add(1, Ordering::Relaxed);
                info!(local_id = %local_id, "Subscription deleted");
                self.emit(SubscriptionEvent::Deleted { local_id });
            }
            Transition::Failed(failure) => self.report_failure(failure),
            Transition::Ignored(_) | Transition::Held => {}
        }

        if let Some(submission) = follow_up {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                manager.submit(submission).await;
            });
        }
    }
}

#[async_trait]
impl<C, S, T> SubscriptionApi for SubscriptionManager<C, S, T>
where
    C: SubscriptionClient,
    S: SubscriptionStore,
    T: TimeSource,
{
    async fn create(&self, request: SubscriptionRequest) -> Result<LocalId, SubscriptionError> {
        loop {
            let local_id = LocalId(self.next_local_id.fetch_add(1, Ordering::Relaxed));
            match self.create_with_id(local_id, request.clone()).await {
                Err(SubscriptionError::DuplicateLocalId(_)) => continue,
                other => return other,
            }
        }
    }

    async fn create_with_id(
        &self,
        local_id: LocalId,
        request: SubscriptionRequest,
    ) -> Result<LocalId, SubscriptionError> {
        let (submission, write) = {
            let mut records = self.records.lock();
            if records.contains_key(&local_id) {
                return Err(SubscriptionError::DuplicateLocalId(local_id));
            }
            let mut record = SubscriptionRecord::new(local_id, request, self.time.now());
            let submission = record.begin_submission(self.time.now());
            let write = self.writer.save(&record);
            records.insert(local_id, record);
            (submission, write)
        };
        // Nothing is sent for a record that could not be stored.
        if let Err(e) = self.writer.apply(write) {
            self.records.lock().remove(&local_id);
            return Err(e.into());
        }
        self.next_local_id
            .fetch_max(local_id.0 + 1, Ordering::Relaxed);
        self.counters.created.fetch_add(1, Ordering::Relaxed);
        info!(local_id = %local_id, "Subscription created");

        if let Some(submission) = submission {
            if let Some(failure) = self.submit(submission).await {
                return Err(SubscriptionError::RemoteRejected {
                    local_id,
                    reason: failure.last_error.unwrap_or_default(),
                });
            }
        }
        Ok(local_id)
    }

    async fn delete(&self, local_id: LocalId) -> Result<DeleteOutcome, SubscriptionError> {
        let (submission, write) = {
            let mut records = self.records.lock();
            let record = records
                .get_mut(&local_id)
                .ok_or(SubscriptionError::NotFound(local_id))?;
            let submission = record.begin_delete(self.time.now())?;
            (submission, self.writer.save(record))
        };
        self.persist(write);

        let Some(submission) = submission else {
            info!(local_id = %local_id, "Deletion queued until creation completes");
            return Ok(DeleteOutcome::Queued);
        };

        info!(local_id = %local_id, "Subscription deletion submitted");
        if let Some(failure) = self.submit(submission).await {
            return Err(SubscriptionError::RemoteRejected {
                local_id,
                reason: failure.last_error.unwrap_or_default(),
            });
        }
        Ok(DeleteOutcome::Submitted)
    }

    fn get(&self, local_id: LocalId) -> Option<SubscriptionRecord> {
        self.records.lock().get(&local_id).cloned()
    }

    fn records(&self) -> Vec<SubscriptionRecord> {
        let mut all: Vec<_> = self.records.lock().values().cloned().collect();
        all.sort_by_key(|r| r.local_id);
        all
    }

    fn active_count(&self) -> usize {
        self.records
            .lock()
            .values()
            .filter(|r| r.state == SubscriptionState::Active)
            .count()
    }
}
