//! # Domain Entities
//!
//! Identities shared across the framework: message types, fabric-level
//! subscription ids, correlation tokens and routing endpoints.

use crate::errors::EnvelopeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Message type used by the routing fabric to select receivers.
pub type MessageType = i32;

/// Fabric-level subscription id carried by every envelope.
pub type SubscriptionId = i32;

/// Subscription id of messages that are not bound to a subscription.
pub const NO_SUBSCRIPTION_ID: SubscriptionId = -1;

/// Reserved message types.
///
/// The four subscription control-plane types are consumed by the dispatch
/// loop and never reach user handlers.
pub mod message_types {
    use super::MessageType;

    /// Health check request from the platform.
    pub const RIC_HEALTH_CHECK_REQ: MessageType = 100;
    /// Health check response.
    pub const RIC_HEALTH_CHECK_RESP: MessageType = 101;

    /// Subscription confirmed by the subscription service.
    pub const RIC_SUB_RESP: MessageType = 12011;
    /// Subscription refused by the subscription service.
    pub const RIC_SUB_FAILURE: MessageType = 12012;
    /// Subscription deletion confirmed.
    pub const RIC_SUB_DEL_RESP: MessageType = 12021;
    /// Subscription deletion refused.
    pub const RIC_SUB_DEL_FAILURE: MessageType = 12022;

    /// Event indication delivered for an active subscription.
    pub const RIC_INDICATION: MessageType = 12050;

    /// Returns true for the subscription control-plane types.
    #[must_use]
    pub const fn is_subscription_notification(message_type: MessageType) -> bool {
        matches!(
            message_type,
            RIC_SUB_RESP | RIC_SUB_FAILURE | RIC_SUB_DEL_RESP | RIC_SUB_DEL_FAILURE
        )
    }
}

/// Opaque correlation token linking a request to its asynchronous answer.
///
/// Bounded to [`TransactionId::MAX_LEN`] bytes, the fabric's fixed header slot.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(String);

impl TransactionId {
    /// Maximum token length in bytes.
    pub const MAX_LEN: usize = 32;

    /// Generate a fresh token (32 hex characters).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an existing token.
    ///
    /// # Errors
    ///
    /// `EnvelopeError::TransactionIdTooLong` if the token exceeds `MAX_LEN` bytes.
    pub fn new(value: impl Into<String>) -> Result<Self, EnvelopeError> {
        let value = value.into();
        if value.len() > Self::MAX_LEN {
            return Err(EnvelopeError::TransactionIdTooLong {
                len: value.len(),
                max: Self::MAX_LEN,
            });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<String> for TransactionId {
    type Error = EnvelopeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TransactionId> for String {
    fn from(value: TransactionId) -> Self {
        value.0
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key that uniquely identifies an endpoint: `(host, control_port)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointKey {
    pub host: String,
    pub control_port: u16,
}

impl EndpointKey {
    pub fn new(host: impl Into<String>, control_port: u16) -> Self {
        Self {
            host: host.into(),
            control_port,
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.control_port)
    }
}

/// A peer reachable through the routing fabric.
///
/// `control_port` carries the HTTP control plane, `data_port` the fabric's
/// message plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Logical name, also the fabric mailbox name.
    pub name: String,
    pub host: String,
    pub control_port: u16,
    pub data_port: u16,
}

impl Endpoint {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        control_port: u16,
        data_port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            control_port,
            data_port,
        }
    }

    /// The registry key of this endpoint.
    #[must_use]
    pub fn key(&self) -> EndpointKey {
        EndpointKey::new(self.host.clone(), self.control_port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.name, self.host, self.control_port, self.data_port
        )
    }
}
