//! Subscription domain entities.

use serde::{Deserialize, Serialize};
use shared_types::TransactionId;
use std::fmt;

/// Timestamp in milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Client-assigned subscription handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub u64);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned by the subscription service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(pub u64);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a subscription.
///
/// ```text
///              confirm                 delete()              confirm
/// [Pending] ───────────→ [Active] ───────────→ [DeletePending] ─────────→ [Deleted]
///     │                                              │
///     └── retries exhausted / rejected ──→ [Failed] ←┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionState {
    Pending,
    Active,
    DeletePending,
    Deleted,
    Failed,
}

impl SubscriptionState {
    /// True while a create or delete awaits its confirmation.
    #[must_use]
    pub fn awaits_confirmation(self) -> bool {
        matches!(self, Self::Pending | Self::DeletePending)
    }
}

/// Kind of action requested for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Report,
    Insert,
    Policy,
}

/// One action to set up on the radio node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionToBeSetup {
    pub action_id: u32,
    pub action_type: ActionType,
    #[serde(default)]
    pub action_definition: Vec<u8>,
}

/// What to subscribe to. Opaque to the manager and re-sent verbatim on retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    /// Managed element id of the target radio node.
    pub meid: String,
    #[serde(default)]
    pub event_trigger_definition: Vec<u8>,
    pub actions_to_be_setup: Vec<ActionToBeSetup>,
}

impl SubscriptionRequest {
    /// A request with one report action.
    pub fn report(meid: impl Into<String>, event_trigger_definition: Vec<u8>) -> Self {
        Self {
            meid: meid.into(),
            event_trigger_definition,
            actions_to_be_setup: vec![ActionToBeSetup {
                action_id: 1,
                action_type: ActionType::Report,
                action_definition: Vec::new(),
            }],
        }
    }
}

/// Why a subscription ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// No confirmation after every retry.
    Timeout,
    /// The subscription service refused the request.
    RemoteRejected,
}

/// User-visible failure report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionFailure {
    pub local_id: LocalId,
    pub kind: FailureKind,
    /// State the record failed from (`Pending` or `DeletePending`).
    pub phase: SubscriptionState,
    pub retry_count: u32,
    pub last_attempt_ms: Timestamp,
    pub last_error: Option<String>,
}

/// A request ready to go to the subscription service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Create {
        local_id: LocalId,
        transaction_id: TransactionId,
        request: SubscriptionRequest,
    },
    Delete {
        local_id: LocalId,
        transaction_id: TransactionId,
        remote_id: RemoteId,
    },
}

impl Submission {
    #[must_use]
    pub fn local_id(&self) -> LocalId {
        match self {
            Self::Create { local_id, .. } | Self::Delete { local_id, .. } => *local_id,
        }
    }

    #[must_use]
    pub fn transaction_id(&self) -> &TransactionId {
        match self {
            Self::Create { transaction_id, .. } | Self::Delete { transaction_id, .. } => {
                transaction_id
            }
        }
    }

    /// State the record is in while this submission is outstanding.
    #[must_use]
    pub fn phase(&self) -> SubscriptionState {
        match self {
            Self::Create { .. } => SubscriptionState::Pending,
            Self::Delete { .. } => SubscriptionState::DeletePending,
        }
    }
}

/// Lifecycle events broadcast to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    Activated {
        local_id: LocalId,
        remote_id: RemoteId,
    },
    Deleted {
        local_id: LocalId,
    },
    Failed(SubscriptionFailure),
}

/// Result of `delete()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The delete request went out.
    Submitted,
    /// Creation is still pending; deletion follows its confirmation.
    Queued,
}
