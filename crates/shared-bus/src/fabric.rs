//! # Routing Fabric Contract
//!
//! What the transport wrapper relies on. Any fabric binding (the in-memory
//! one here, or a native one) implements [`RoutingFabric`].

use crate::mailbox::Mailbox;
use shared_types::MessageEnvelope;
use thiserror::Error;

/// Outcome of a single fabric delivery attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FabricError {
    /// No receiver is registered for the message type.
    #[error("No route for message")]
    NoRoute,

    /// A receiver's queue is full. Retrying later may succeed.
    #[error("Receiver queue saturated")]
    Saturated,

    /// The fabric was shut down.
    #[error("Fabric closed")]
    Closed,

    /// Direct delivery to an endpoint that is not attached.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// No route table has been loaded yet.
    #[error("Fabric not ready")]
    NotReady,
}

/// Trait for a message-routing fabric.
///
/// Delivery is non-blocking: an attempt either succeeds, or fails with a
/// [`FabricError`] the caller decides how to retry.
pub trait RoutingFabric: Send + Sync + 'static {
    /// True once the route table has been loaded.
    fn is_ready(&self) -> bool;

    /// Attach a named endpoint and return its receive mailbox.
    ///
    /// Re-attaching a name replaces the previous mailbox, which then closes.
    fn attach(&self, endpoint: &str, capacity: usize) -> Mailbox;

    /// Detach a named endpoint. Messages already queued stay readable.
    fn detach(&self, endpoint: &str);

    /// Deliver by `(message_type, subscription_id)` to every routed receiver.
    ///
    /// # Returns
    ///
    /// The number of receivers the envelope was delivered to.
    ///
    /// # Errors
    ///
    /// `NoRoute`, `Saturated`, `Closed` or `NotReady`.
    fn route(&self, envelope: &MessageEnvelope) -> Result<usize, FabricError>;

    /// Deliver directly to a named endpoint, bypassing the route table.
    ///
    /// # Errors
    ///
    /// `UnknownEndpoint`, `Saturated` or `Closed`.
    fn route_to(&self, endpoint: &str, envelope: &MessageEnvelope) -> Result<(), FabricError>;
}
