//! Convenience re-exports for common use.

pub use crate::agent_loop::{
    ConversationRunner, RunEvent, RunEventPayload, RunExit, RunnerOptions, TurnFinish,
};
pub use crate::config::ParleyConfig;
pub use crate::error::{ParleyError, Result};
pub use crate::interaction::{Interaction, ScriptedInteraction, TerminalInteraction};
pub use crate::memory::{Embedder, NewMemory, QueryOptions, VectorDatabase, VectorStore};
pub use crate::messenger::Messenger;
pub use crate::models::LanguageModel;
pub use crate::provider::ModelProvider;
pub use crate::storage::{
    ConversationId, FileBackend, SqliteBackend, StorageBackend, TransientBackend,
};
pub use crate::tools::{AgentTool, AgentToolParameters, Tool, ToolArguments, ToolSet};
pub use crate::types::{ContentPart, FinishReason, GenerationSettings, Message, Role, Usage};
