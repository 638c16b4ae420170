//! # `MessageEnvelope`
//!
//! The unit exchanged over the routing fabric.
//!
//! ## Properties
//!
//! - **Routing**: `message_type` and `subscription_id` select the receivers.
//! - **Correlation**: `transaction_id` links a request to its answer.
//! - **Return Route**: `source.sender` lets a peer reply without a lookup.
//! - **Immutability**: fields are private and only readable after `build()`.

use crate::entities::{Endpoint, MessageType, SubscriptionId, TransactionId, NO_SUBSCRIPTION_ID};
use crate::errors::EnvelopeError;
use serde::{Deserialize, Serialize};

/// Origin of a message: the managed element it concerns and, when a return
/// route was requested, the endpoint that sent it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIdentity {
    /// Managed element id (target radio node).
    pub meid: Option<String>,
    /// Return route, present for request/acknowledge exchanges.
    pub sender: Option<Endpoint>,
}

/// Delivery status recorded on an envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    #[default]
    Ok,
    NoRoute,
    SendFailed,
}

/// A single message on the routing fabric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    // =========================================================================
    // HEADER SECTION
    // =========================================================================
    message_type: MessageType,
    subscription_id: SubscriptionId,
    transaction_id: TransactionId,
    source: SourceIdentity,
    status: DeliveryStatus,

    // =========================================================================
    // PAYLOAD SECTION
    // =========================================================================
    payload: Vec<u8>,
}

impl MessageEnvelope {
    /// Start building an envelope of the given type.
    #[must_use]
    pub fn builder(message_type: MessageType) -> EnvelopeBuilder {
        EnvelopeBuilder::new(message_type)
    }

    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    #[must_use]
    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }

    #[must_use]
    pub fn source(&self) -> &SourceIdentity {
        &self.source
    }

    #[must_use]
    pub fn meid(&self) -> Option<&str> {
        self.source.meid.as_deref()
    }

    #[must_use]
    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    /// Consume the envelope, keeping only the payload buffer.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// A copy of this envelope carrying `sender` as its return route.
    #[must_use]
    pub fn with_sender(self, sender: Endpoint) -> Self {
        Self {
            source: SourceIdentity {
                sender: Some(sender),
                ..self.source
            },
            ..self
        }
    }

    /// A copy of this envelope with a different delivery status.
    #[must_use]
    pub fn with_status(self, status: DeliveryStatus) -> Self {
        Self { status, ..self }
    }

    /// Check the envelope against the fabric's limits.
    ///
    /// # Errors
    ///
    /// - `EnvelopeError::InvalidMessageType` for negative types
    /// - `EnvelopeError::PayloadTooLarge` above `max_payload_size`
    pub fn validate(&self, max_payload_size: usize) -> Result<(), EnvelopeError> {
        if self.message_type < 0 {
            return Err(EnvelopeError::InvalidMessageType(self.message_type));
        }
        if self.payload.len() > max_payload_size {
            return Err(EnvelopeError::PayloadTooLarge {
                size: self.payload.len(),
                max: max_payload_size,
            });
        }
        Ok(())
    }
}

/// Builder for [`MessageEnvelope`].
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    message_type: MessageType,
    subscription_id: SubscriptionId,
    payload: Vec<u8>,
    transaction_id: Option<TransactionId>,
    source: SourceIdentity,
}

impl EnvelopeBuilder {
    fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            subscription_id: NO_SUBSCRIPTION_ID,
            payload: Vec::new(),
            transaction_id: None,
            source: SourceIdentity::default(),
        }
    }

    #[must_use]
    pub fn subscription_id(mut self, subscription_id: SubscriptionId) -> Self {
        self.subscription_id = subscription_id;
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    #[must_use]
    pub fn transaction_id(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    #[must_use]
    pub fn meid(mut self, meid: impl Into<String>) -> Self {
        self.source.meid = Some(meid.into());
        self
    }

    #[must_use]
    pub fn sender(mut self, sender: Endpoint) -> Self {
        self.source.sender = Some(sender);
        self
    }

    /// Finish the envelope. A fresh transaction id is generated when none
    /// was supplied.
    #[must_use]
    pub fn build(self) -> MessageEnvelope {
        MessageEnvelope {
            message_type: self.message_type,
            subscription_id: self.subscription_id,
            transaction_id: self.transaction_id.unwrap_or_else(TransactionId::generate),
            source: self.source,
            status: DeliveryStatus::Ok,
            payload: self.payload,
        }
    }
}
