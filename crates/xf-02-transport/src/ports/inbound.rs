//! # Inbound Port - MessageTransport
//!
//! Driving port used by the dispatch loop, handlers and the subscription
//! machinery.

use crate::domain::{ReceiveMode, Received, SendReport};
use async_trait::async_trait;
use shared_types::{Endpoint, MessageEnvelope, MessageType, TransportError};

/// Message transport API.
#[async_trait]
pub trait MessageTransport: Send + Sync + 'static {
    /// Route by `(message_type, subscription_id)`.
    ///
    /// # Errors
    /// - `Fatal`: envelope fails validation (never retried)
    /// - `NotReady`: route table not loaded yet
    /// - `NoRoute`: no receiver, returned after a single attempt
    /// - `Transient`: receivers stayed saturated through every retry
    /// - `Closed`: transport shut down
    async fn send(&self, envelope: MessageEnvelope) -> Result<SendReport, TransportError>;

    /// As [`MessageTransport::send`], stamping the local endpoint as the
    /// return route.
    async fn send_with_return_route(
        &self,
        envelope: MessageEnvelope,
    ) -> Result<SendReport, TransportError>;

    /// Answer `request` directly to the endpoint that sent it.
    ///
    /// The reply keeps the request's transaction id, subscription id and
    /// managed element id.
    ///
    /// # Errors
    /// `NoRoute` when the request carries no sender or the sender is not a
    /// known endpoint. Otherwise as [`MessageTransport::send`].
    async fn reply_to_sender(
        &self,
        request: &MessageEnvelope,
        message_type: MessageType,
        payload: Vec<u8>,
    ) -> Result<SendReport, TransportError>;

    /// Receive the next envelope addressed to this endpoint.
    async fn receive(&self, mode: ReceiveMode) -> Received;

    /// True once the fabric has loaded its route table.
    fn is_ready(&self) -> bool;

    /// Stop sending, detach from the fabric and return what is still queued.
    async fn shutdown(&self) -> Vec<MessageEnvelope>;

    /// The local endpoint.
    fn identity(&self) -> &Endpoint;

    /// Hand a consumed envelope's payload buffer back for reuse.
    fn recycle(&self, envelope: MessageEnvelope);
}
