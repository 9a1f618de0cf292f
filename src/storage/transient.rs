//! Process-lifetime storage.

use async_trait::async_trait;

use super::{Conversation, ConversationId, StorageBackend};
use crate::error::{ParleyError, Result};
use crate::types::Message;

/// Keeps messages in memory only. Every `load` starts over.
#[derive(Debug, Default)]
pub struct TransientBackend {
    conversation: Option<Conversation>,
    messages: Vec<Message>,
}

impl TransientBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages added since the last `load`.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

#[async_trait]
impl StorageBackend for TransientBackend {
    async fn load(&mut self, id: Option<&ConversationId>) -> Result<Vec<Message>> {
        let id = id.cloned().unwrap_or_else(ConversationId::generate);
        self.conversation = Some(Conversation::new(id));
        self.messages.clear();
        Ok(Vec::new())
    }

    async fn add(&mut self, messages: &[Message]) -> Result<()> {
        if self.conversation.is_none() {
            return Err(ParleyError::ConversationNotEstablished);
        }
        self.messages.extend_from_slice(messages);
        Ok(())
    }

    fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }
}
