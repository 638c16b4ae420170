//! RIC health check responder.

use async_trait::async_trait;
use shared_types::message_types::RIC_HEALTH_CHECK_RESP;
use shared_types::MessageEnvelope;
use std::sync::Arc;
use tracing::debug;
use xf_02_transport::MessageTransport;
use xf_03_dispatch::{HandlerError, MessageHandler};

/// Answers every health check request with `OK`, straight back to the
/// endpoint that asked.
pub struct HealthCheckHandler<T: MessageTransport> {
    transport: Arc<T>,
}

impl<T: MessageTransport> HealthCheckHandler<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T: MessageTransport> MessageHandler for HealthCheckHandler<T> {
    async fn handle(&self, envelope: &MessageEnvelope) -> Result<(), HandlerError> {
        self.transport
            .reply_to_sender(envelope, RIC_HEALTH_CHECK_RESP, b"OK".to_vec())
            .await?;
        debug!(
            transaction_id = %envelope.transaction_id(),
            "Health check answered"
        );
        Ok(())
    }
}
