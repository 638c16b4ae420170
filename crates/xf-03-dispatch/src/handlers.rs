//! Handler table: per-message-type handlers behind one [`MessageHandler`].

use crate::domain::HandlerError;
use crate::ports::outbound::MessageHandler;
use async_trait::async_trait;
use shared_types::{MessageEnvelope, MessageType};
use std::collections::HashMap;
use std::sync::Arc;

/// Routes each envelope to the handler registered for its message type,
/// falling back to a default handler.
#[derive(Default, Clone)]
pub struct HandlerTable {
    by_type: HashMap<MessageType, Arc<dyn MessageHandler>>,
    fallback: Option<Arc<dyn MessageHandler>>,
}

impl HandlerTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `message_type`, replacing any previous one.
    #[must_use]
    pub fn on(mut self, message_type: MessageType, handler: Arc<dyn MessageHandler>) -> Self {
        self.by_type.insert(message_type, handler);
        self
    }

    /// Handler for every type without a specific registration.
    #[must_use]
    pub fn otherwise(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.fallback = Some(handler);
        self
    }

    #[must_use]
    pub fn handles(&self, message_type: MessageType) -> bool {
        self.fallback.is_some() || self.by_type.contains_key(&message_type)
    }
}

#[async_trait]
impl MessageHandler for HandlerTable {
    async fn handle(&self, envelope: &MessageEnvelope) -> Result<(), HandlerError> {
        let handler = self
            .by_type
            .get(&envelope.message_type())
            .or(self.fallback.as_ref())
            .ok_or(HandlerError::NoHandler(envelope.message_type()))?;
        handler.handle(envelope).await
    }
}
