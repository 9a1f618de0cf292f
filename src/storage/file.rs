//! Single-file JSON storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, warn};

use super::{Conversation, ConversationId, StorageBackend};
use crate::error::{ParleyError, Result};
use crate::types::Message;

/// Stores one conversation as a pretty-printed JSON array of messages.
///
/// The file is the conversation: any `Some` id passed to `load` reads it,
/// whatever the id says. `load(None)` starts an empty conversation without
/// reading the file, and the first `add` afterwards replaces any history the
/// file already held. Pass an id to continue an existing file.
///
/// Reads fail soft: a missing or unreadable file is an empty history.
/// Writes rewrite the whole file; failures are logged, not returned.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    conversation: Option<Conversation>,
    history: Vec<Message>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conversation: None,
            history: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_history(&self) -> Vec<Message> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read conversation file");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unparseable conversation file");
                Vec::new()
            }
        }
    }

    async fn write_snapshot(&self, messages: &[Message]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(messages)?;
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), messages = messages.len(), "wrote conversation file");
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn load(&mut self, id: Option<&ConversationId>) -> Result<Vec<Message>> {
        self.history = match id {
            Some(_) => self.read_history().await,
            None => Vec::new(),
        };
        let id = id.cloned().unwrap_or_else(ConversationId::generate);
        self.conversation = Some(Conversation::new(id));
        Ok(self.history.clone())
    }

    async fn add(&mut self, messages: &[Message]) -> Result<()> {
        if self.conversation.is_none() {
            return Err(ParleyError::ConversationNotEstablished);
        }
        self.history.extend_from_slice(messages);
        if let Err(e) = self.write_snapshot(&self.history).await {
            error!(path = %self.path.display(), error = %e, "failed to save messages");
        }
        Ok(())
    }

    fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    async fn flush(&mut self, messages: &[Message]) -> Result<()> {
        if self.conversation.is_none() {
            return Ok(());
        }
        self.history = messages.to_vec();
        if let Err(e) = self.write_snapshot(&self.history).await {
            error!(path = %self.path.display(), error = %e, "failed to save messages");
        }
        Ok(())
    }
}
