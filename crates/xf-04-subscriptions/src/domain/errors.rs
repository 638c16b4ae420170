//! Subscription error types.

use super::entities::{LocalId, SubscriptionState};
use thiserror::Error;

/// Errors returned by the subscription manager.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Local id {0} is already in use")]
    DuplicateLocalId(LocalId),

    #[error("Subscription {0} not found")]
    NotFound(LocalId),

    #[error("Subscription {local_id} is {state:?}, cannot {operation}")]
    InvalidState {
        local_id: LocalId,
        state: SubscriptionState,
        operation: &'static str,
    },

    /// The subscription service refused the request. The record is kept in
    /// `Failed`.
    #[error("Subscription {local_id} rejected: {reason}")]
    RemoteRejected { local_id: LocalId, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

/// Subscription service client failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The service answered with a validation or server error.
    #[error("Rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// No connection after every connection-level retry.
    #[error("Service unreachable after {attempts} attempts: {message}")]
    Unreachable { attempts: u32, message: String },

    /// Unexpected response.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// True for a definitive refusal; anything else is left to the retry timer.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Record store failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
