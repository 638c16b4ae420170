//! # Endpoint Mailbox
//!
//! Receive side of an attached endpoint.

use shared_types::MessageEnvelope;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// The mailbox was closed and every queued message has been read.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Mailbox closed")]
pub struct MailboxClosed;

/// A bounded queue of envelopes addressed to one endpoint.
///
/// Dropping the mailbox detaches nothing by itself; the fabric notices the
/// closed queue on the next delivery attempt and skips it.
pub struct Mailbox {
    /// Endpoint name this mailbox belongs to.
    endpoint: String,

    /// The bounded receiver.
    receiver: mpsc::Receiver<MessageEnvelope>,
}

impl Mailbox {
    pub(crate) fn new(endpoint: String, receiver: mpsc::Receiver<MessageEnvelope>) -> Self {
        Self { endpoint, receiver }
    }

    /// Receive the next envelope.
    ///
    /// # Returns
    ///
    /// - `Some(envelope)` - The next queued envelope
    /// - `None` - The mailbox was closed and is empty
    pub async fn recv(&mut self) -> Option<MessageEnvelope> {
        self.receiver.recv().await
    }

    /// Try to receive the next envelope without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(envelope))` - An envelope was queued
    /// - `Ok(None)` - Nothing queued (would block)
    /// - `Err(MailboxClosed)` - Closed and empty
    pub fn try_recv(&mut self) -> Result<Option<MessageEnvelope>, MailboxClosed> {
        match self.receiver.try_recv() {
            Ok(envelope) => Ok(Some(envelope)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(MailboxClosed),
        }
    }

    /// Stop accepting new envelopes. Already queued ones remain readable.
    pub fn close(&mut self) {
        debug!(endpoint = %self.endpoint, "Mailbox closed");
        self.receiver.close();
    }

    /// Take every envelope still queued without waiting.
    pub fn drain(&mut self) -> Vec<MessageEnvelope> {
        let mut drained = Vec::new();
        while let Ok(Some(envelope)) = self.try_recv() {
            drained.push(envelope);
        }
        drained
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Number of envelopes currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("endpoint", &self.endpoint)
            .field("queued", &self.receiver.len())
            .finish()
    }
}
