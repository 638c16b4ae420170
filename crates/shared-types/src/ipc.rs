//! # Subscription Notification Payloads
//!
//! The subscription service confirms (or refuses) create and delete requests
//! asynchronously through the routing fabric. The message type selects the
//! [`NotificationKind`]; the JSON payload carries the correlation data.
//!
//! ```text
//! { "local_id": 42, "transaction_id": "9f0c...", "remote_id": 7, "cause": null }
//! ```

use crate::entities::message_types::{
    RIC_SUB_DEL_FAILURE, RIC_SUB_DEL_RESP, RIC_SUB_FAILURE, RIC_SUB_RESP,
};
use crate::entities::{MessageType, TransactionId};
use crate::envelope::MessageEnvelope;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the subscription service is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Create request confirmed.
    Created,
    /// Create request refused.
    CreateFailed,
    /// Delete request confirmed.
    Deleted,
    /// Delete request refused.
    DeleteFailed,
}

impl NotificationKind {
    /// Map a reserved message type onto a notification kind.
    #[must_use]
    pub fn from_message_type(message_type: MessageType) -> Option<Self> {
        match message_type {
            RIC_SUB_RESP => Some(Self::Created),
            RIC_SUB_FAILURE => Some(Self::CreateFailed),
            RIC_SUB_DEL_RESP => Some(Self::Deleted),
            RIC_SUB_DEL_FAILURE => Some(Self::DeleteFailed),
            _ => None,
        }
    }

    #[must_use]
    pub fn message_type(self) -> MessageType {
        match self {
            Self::Created => RIC_SUB_RESP,
            Self::CreateFailed => RIC_SUB_FAILURE,
            Self::Deleted => RIC_SUB_DEL_RESP,
            Self::DeleteFailed => RIC_SUB_DEL_FAILURE,
        }
    }
}

/// Wire payload of a notification message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Client-assigned handle of the subscription record.
    pub local_id: u64,
    /// Token sent with the request being answered.
    pub transaction_id: TransactionId,
    /// Service-assigned subscription id (confirmations only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<u64>,
    /// Refusal cause (failures only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl NotificationPayload {
    /// Encode as the JSON wire payload.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn encode(&self) -> Result<Vec<u8>, NotificationError> {
        serde_json::to_vec(self).map_err(|e| NotificationError::Malformed(e.to_string()))
    }

    /// Decode a JSON wire payload.
    ///
    /// # Errors
    ///
    /// `NotificationError::Malformed` if the bytes are not a valid payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, NotificationError> {
        serde_json::from_slice(bytes).map_err(|e| NotificationError::Malformed(e.to_string()))
    }
}

/// A decoded notification handed to the subscription manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionNotification {
    pub kind: NotificationKind,
    pub payload: NotificationPayload,
    /// Managed element the notification concerns, if the fabric carried it.
    pub meid: Option<String>,
}

impl SubscriptionNotification {
    /// Decode a notification from a received envelope.
    ///
    /// # Errors
    ///
    /// - `NotificationError::NotANotification` for non-reserved types
    /// - `NotificationError::Malformed` for undecodable payloads
    pub fn from_envelope(envelope: &MessageEnvelope) -> Result<Self, NotificationError> {
        let kind = NotificationKind::from_message_type(envelope.message_type())
            .ok_or(NotificationError::NotANotification(envelope.message_type()))?;
        let payload = NotificationPayload::decode(envelope.payload())?;
        Ok(Self {
            kind,
            payload,
            meid: envelope.meid().map(str::to_string),
        })
    }

    /// Build the envelope the subscription service would send for this
    /// notification.
    ///
    /// # Errors
    ///
    /// Propagates payload encoding failures.
    pub fn to_envelope(&self) -> Result<MessageEnvelope, NotificationError> {
        let mut builder = MessageEnvelope::builder(self.kind.message_type())
            .payload(self.payload.encode()?)
            .transaction_id(self.payload.transaction_id.clone());
        if let Some(meid) = &self.meid {
            builder = builder.meid(meid.clone());
        }
        Ok(builder.build())
    }
}

/// Errors while decoding notifications.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Message type {0} is not a subscription notification")]
    NotANotification(MessageType),

    #[error("Malformed notification payload: {0}")]
    Malformed(String),
}
