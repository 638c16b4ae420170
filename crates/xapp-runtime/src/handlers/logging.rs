use async_trait::async_trait;
use shared_types::MessageEnvelope;
use tracing::info;
use xf_03_dispatch::{HandlerError, MessageHandler};

/// Fallback handler: logs what arrived and drops it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn handle(&self, envelope: &MessageEnvelope) -> Result<(), HandlerError> {
        info!(
            message_type = envelope.message_type(),
            subscription_id = envelope.subscription_id(),
            meid = envelope.meid().unwrap_or_default(),
            payload_len = envelope.payload().len(),
            "Message received"
        );
        Ok(())
    }
}
