//! Per-subscription state machine.
//!
//! Every transition is a pure method on [`SubscriptionRecord`]; the service
//! layer decides when to call them and performs the resulting I/O.

use super::config::SubscriptionConfig;
use super::entities::{
    FailureKind, LocalId, RemoteId, Submission, SubscriptionFailure, SubscriptionRequest,
    SubscriptionState, Timestamp,
};
use super::errors::{ClientError, SubscriptionError};
use serde::{Deserialize, Serialize};
use shared_types::{NotificationKind, SubscriptionNotification, TransactionId};

/// One subscription as tracked by the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub local_id: LocalId,
    /// Set once, on Pending → Active.
    pub remote_id: Option<RemoteId>,
    pub request: SubscriptionRequest,
    pub state: SubscriptionState,
    pub retry_count: u32,
    pub last_attempt_ms: Timestamp,
    pub meid: String,
    /// Token of the current phase (create, then delete).
    pub transaction_id: TransactionId,
    /// A submission is outstanding. Not persisted, so a restored record is
    /// picked up again by the retry timer.
    #[serde(skip)]
    pub in_flight: bool,
    /// `delete()` was called while creation was still pending.
    pub cancel_queued: bool,
    /// Identifier from the HTTP create response, used when the confirmation
    /// carries none.
    pub accepted_id: Option<RemoteId>,
    /// A confirmation without an identifier arrived before the create
    /// response did. Applied once the response supplies `accepted_id`.
    #[serde(skip)]
    pub early_confirmation: bool,
    pub last_error: Option<String>,
    pub failure: Option<SubscriptionFailure>,
}

/// Effect of a notification on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Discarded; the record is unchanged.
    Ignored(&'static str),
    /// Kept until the outstanding create response arrives.
    Held,
    Activated(RemoteId),
    Deleted,
    Failed(SubscriptionFailure),
}

/// Decision of one retry timer pass over a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerAction {
    Idle,
    Resubmit(Submission),
    GiveUp(SubscriptionFailure),
}

/// Effect of a finished HTTP submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The record moved on while the request was outstanding.
    Stale,
    /// Accepted; the confirmation arrives separately.
    Accepted,
    /// Accepted, and a held confirmation now activates the record.
    Activated(RemoteId),
    /// Not delivered; the retry timer will resubmit.
    Deferred(String),
    /// Refused by the service.
    Rejected(SubscriptionFailure),
}

impl SubscriptionRecord {
    /// A new record in `Pending` with a fresh transaction token.
    #[must_use]
    pub fn new(local_id: LocalId, request: SubscriptionRequest, now: Timestamp) -> Self {
        Self {
            local_id,
            remote_id: None,
            meid: request.meid.clone(),
            request,
            state: SubscriptionState::Pending,
            retry_count: 0,
            last_attempt_ms: now,
            transaction_id: TransactionId::generate(),
            in_flight: false,
            cancel_queued: false,
            accepted_id: None,
            early_confirmation: false,
            last_error: None,
            failure: None,
        }
    }

    /// The request for the current phase, if the record awaits one.
    #[must_use]
    pub fn submission(&self) -> Option<Submission> {
        match self.state {
            SubscriptionState::Pending => Some(Submission::Create {
                local_id: self.local_id,
                transaction_id: self.transaction_id.clone(),
                request: self.request.clone(),
            }),
            SubscriptionState::DeletePending => self.remote_id.map(|remote_id| Submission::Delete {
                local_id: self.local_id,
                transaction_id: self.transaction_id.clone(),
                remote_id,
            }),
            _ => None,
        }
    }

    /// Mark the current phase's request as sent at `now`.
    pub fn begin_submission(&mut self, now: Timestamp) -> Option<Submission> {
        let submission = self.submission()?;
        self.in_flight = true;
        self.last_attempt_ms = now;
        Some(submission)
    }

    /// Apply a confirmation or refusal from the subscription service.
    pub fn apply_notification(&mut self, notification: &SubscriptionNotification) -> Transition {
        if notification.payload.transaction_id != self.transaction_id {
            return Transition::Ignored("stale transaction id");
        }

        match (self.state, notification.kind) {
            (SubscriptionState::Pending, NotificationKind::Created) => {
                match notification.payload.remote_id.map(RemoteId).or(self.accepted_id) {
                    Some(remote_id) => {
                        self.activate(remote_id);
                        Transition::Activated(remote_id)
                    }
                    None if self.in_flight => {
                        self.early_confirmation = true;
                        Transition::Held
                    }
                    None => Transition::Ignored("confirmation without subscription id"),
                }
            }
            (SubscriptionState::DeletePending, NotificationKind::Deleted) => {
                self.state = SubscriptionState::Deleted;
                self.in_flight = false;
                Transition::Deleted
            }
            (SubscriptionState::Pending, NotificationKind::CreateFailed)
            | (SubscriptionState::DeletePending, NotificationKind::DeleteFailed) => {
                let cause = notification
                    .payload
                    .cause
                    .clone()
                    .unwrap_or_else(|| "refused by subscription service".to_string());
                Transition::Failed(self.fail(FailureKind::RemoteRejected, Some(cause)))
            }
            _ => Transition::Ignored("notification does not apply to current state"),
        }
    }

    /// Apply the result of an HTTP submission made for `submitted`.
    pub fn complete_submission(
        &mut self,
        submitted: &Submission,
        result: Result<Option<RemoteId>, ClientError>,
    ) -> SubmissionOutcome {
        if self.state != submitted.phase() || &self.transaction_id != submitted.transaction_id() {
            return SubmissionOutcome::Stale;
        }
        self.in_flight = false;

        match result {
            Ok(accepted) => {
                if accepted.is_some() {
                    self.accepted_id = accepted;
                }
                let held = std::mem::take(&mut self.early_confirmation);
                match self.accepted_id {
                    Some(remote_id) if held && self.state == SubscriptionState::Pending => {
                        self.activate(remote_id);
                        SubmissionOutcome::Activated(remote_id)
                    }
                    _ => SubmissionOutcome::Accepted,
                }
            }
            Err(e) if e.is_rejection() => {
                SubmissionOutcome::Rejected(self.fail(FailureKind::RemoteRejected, Some(e.to_string())))
            }
            Err(e) => {
                let message = e.to_string();
                self.last_error = Some(message.clone());
                SubmissionOutcome::Deferred(message)
            }
        }
    }

    /// One retry timer pass.
    ///
    /// A record awaiting confirmation is re-submitted once
    /// `confirmation_timeout` has passed since its last submission, up to
    /// `max_retries` times; after that it fails with `Timeout`.
    pub fn on_timer(&mut self, now: Timestamp, config: &SubscriptionConfig) -> TimerAction {
        if !self.state.awaits_confirmation() || self.in_flight {
            return TimerAction::Idle;
        }
        if now.saturating_sub(self.last_attempt_ms) < config.timeout_ms() {
            return TimerAction::Idle;
        }
        if self.retry_count >= config.max_retries {
            let reason = self
                .last_error
                .clone()
                .unwrap_or_else(|| format!("no confirmation after {} retries", self.retry_count));
            return TimerAction::GiveUp(self.fail(FailureKind::Timeout, Some(reason)));
        }

        self.retry_count += 1;
        match self.begin_submission(now) {
            Some(submission) => TimerAction::Resubmit(submission),
            None => TimerAction::Idle,
        }
    }

    /// Start deleting.
    ///
    /// Returns the delete submission, or `None` when the record is still
    /// pending and the deletion was queued behind its confirmation.
    ///
    /// # Errors
    /// `InvalidState` unless the record is `Active` or `Pending`.
    pub fn begin_delete(&mut self, now: Timestamp) -> Result<Option<Submission>, SubscriptionError> {
        match (self.state, self.remote_id) {
            (SubscriptionState::Active, Some(_)) => {
                self.state = SubscriptionState::DeletePending;
                self.transaction_id = TransactionId::generate();
                self.retry_count = 0;
                self.cancel_queued = false;
                self.last_error = None;
                Ok(self.begin_submission(now))
            }
            (SubscriptionState::Pending, _) => {
                self.cancel_queued = true;
                Ok(None)
            }
            (state, _) => Err(SubscriptionError::InvalidState {
                local_id: self.local_id,
                state,
                operation: "delete",
            }),
        }
    }

    fn activate(&mut self, remote_id: RemoteId) {
        self.remote_id = Some(remote_id);
        self.state = SubscriptionState::Active;
        self.in_flight = false;
        self.early_confirmation = false;
        self.last_error = None;
    }

    /// Move to `Failed`, keeping the record for inspection.
    pub fn fail(&mut self, kind: FailureKind, error: Option<String>) -> SubscriptionFailure {
        let failure = SubscriptionFailure {
            local_id: self.local_id,
            kind,
            phase: self.state,
            retry_count: self.retry_count,
            last_attempt_ms: self.last_attempt_ms,
            last_error: error.clone(),
        };
        self.state = SubscriptionState::Failed;
        self.in_flight = false;
        self.cancel_queued = false;
        self.last_error = error;
        self.failure = Some(failure.clone());
        failure
    }
}
