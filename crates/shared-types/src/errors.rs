//! # Error Types
//!
//! Transport error taxonomy shared by the transport wrapper, the dispatch
//! loop and the runtime.

use crate::entities::{MessageType, SubscriptionId};
use crate::envelope::DeliveryStatus;
use thiserror::Error;

/// A malformed envelope. Never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Payload exceeds the fabric's fixed maximum.
    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Message type outside the fabric's type space.
    #[error("Invalid message type: {0}")]
    InvalidMessageType(MessageType),

    /// Correlation token does not fit the header slot.
    #[error("Transaction id too long: {len} bytes (max: {max})")]
    TransactionIdTooLong { len: usize, max: usize },
}

/// Errors surfaced by the transport wrapper.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The fabric has not loaded its routing table yet. Wait and retry.
    #[error("Transport not ready: routing table not loaded")]
    NotReady,

    /// No receiver registered for the message type. Not retried.
    #[error("No route for message type {message_type} (subscription id {subscription_id})")]
    NoRoute {
        message_type: MessageType,
        subscription_id: SubscriptionId,
    },

    /// Send path stayed congested through the internal retries.
    /// Retrying later is safe.
    #[error("Transient send failure after {attempts} attempts")]
    Transient { attempts: u32 },

    /// Malformed envelope. Never retried.
    #[error("Fatal: {0}")]
    Fatal(#[from] EnvelopeError),

    /// The transport was shut down.
    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    /// True when the caller may retry the same envelope later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady | Self::Transient { .. })
    }

    /// Delivery status to record for an envelope that failed with this error.
    #[must_use]
    pub fn delivery_status(&self) -> DeliveryStatus {
        match self {
            Self::NoRoute { .. } => DeliveryStatus::NoRoute,
            _ => DeliveryStatus::SendFailed,
        }
    }
}
