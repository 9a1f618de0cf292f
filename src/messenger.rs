//! The in-process conversation buffer.

use tracing::{debug, warn};

use crate::error::{ParleyError, Result};
use crate::storage::{Conversation, ConversationId, StorageBackend};
use crate::types::Message;

/// Current history of one conversation, mirrored into a storage backend.
///
/// The buffer is replaced by [`load`](Self::load) and grows only through
/// [`add`](Self::add), which forwards the same messages to the backend.
pub struct Messenger {
    backend: Box<dyn StorageBackend>,
    messages: Vec<Message>,
}

impl Messenger {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self::from_boxed(Box::new(backend))
    }

    pub fn from_boxed(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            messages: Vec::new(),
        }
    }

    /// Bind to a conversation and replace the buffer with its history.
    pub async fn load(&mut self, id: Option<&ConversationId>) -> Result<&[Message]> {
        self.messages = self.backend.load(id).await?;
        debug!(
            conversation = ?self.backend.conversation().map(|c| c.id.as_str()),
            messages = self.messages.len(),
            "messenger loaded"
        );
        Ok(&self.messages)
    }

    /// Append to the buffer and the backend.
    ///
    /// Backend write failures are logged and do not roll back the buffer.
    /// Adding before `load` is a usage error and changes nothing.
    pub async fn add(&mut self, messages: Vec<Message>) -> Result<()> {
        if self.backend.conversation().is_none() {
            return Err(ParleyError::ConversationNotEstablished);
        }
        if messages.is_empty() {
            return Ok(());
        }
        let start = self.messages.len();
        self.messages.extend(messages);
        match self.backend.add(&self.messages[start..]).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_usage_error() => Err(e),
            Err(e) => {
                warn!(error = %e, "failed to persist messages");
                Ok(())
            }
        }
    }

    /// Best-effort snapshot of the whole buffer, used when interrupted.
    pub async fn persist(&mut self) {
        if self.backend.conversation().is_none() {
            return;
        }
        if let Err(e) = self.backend.flush(&self.messages).await {
            warn!(error = %e, "failed to persist conversation");
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.backend.conversation()
    }
}

impl std::fmt::Debug for Messenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger")
            .field("conversation", &self.backend.conversation())
            .field("messages", &self.messages.len())
            .finish()
    }
}
