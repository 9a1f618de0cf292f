//! Conversation storage backends.
//!
//! A backend owns the durable form of one conversation at a time. `load`
//! establishes which conversation that is; `add` appends to it.

pub mod file;
pub mod sqlite;
pub mod transient;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Message;

pub use crate::memory::VectorDatabase;
pub use file::FileBackend;
pub use sqlite::{Database, SqliteBackend};
pub use transient::TransientBackend;

/// Opaque conversation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The conversation a backend is currently bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
        }
    }
}

/// Durable home of a conversation's messages.
#[async_trait]
pub trait StorageBackend: Send {
    /// Bind to a conversation and return its history in creation order.
    ///
    /// `None` starts a fresh conversation. An id the backend does not know is
    /// created and yields an empty history.
    async fn load(&mut self, id: Option<&ConversationId>) -> Result<Vec<Message>>;

    /// Append messages to the bound conversation.
    ///
    /// Fails with [`ParleyError::ConversationNotEstablished`] before `load`.
    ///
    /// [`ParleyError::ConversationNotEstablished`]: crate::error::ParleyError::ConversationNotEstablished
    async fn add(&mut self, messages: &[Message]) -> Result<()>;

    /// The conversation established by the last `load`, if any.
    fn conversation(&self) -> Option<&Conversation>;

    /// Best-effort write of a full buffer snapshot, used on interruption.
    async fn flush(&mut self, _messages: &[Message]) -> Result<()> {
        Ok(())
    }
}
