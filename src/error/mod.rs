//! Error types for Parley.

use thiserror::Error;

/// Primary error type for all Parley operations.
#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid config file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No conversation established: call load() before add()")]
    ConversationNotEstablished,

    #[error("Canceled")]
    Canceled,

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Server,
    Api,
    Configuration,
    Storage,
    Tool,
    Embedding,
    Usage,
    Canceled,
    Unknown,
}

impl ParleyError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Shorthand for a tool failure.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) | Self::Stream(_) => ErrorCategory::Network,
            Self::Configuration(_) | Self::ConfigFile(_) | Self::ModelNotFound(_) => {
                ErrorCategory::Configuration
            }
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::Io(_) | Self::Serialization(_) | Self::Database(_) => ErrorCategory::Storage,
            Self::ToolExecution { .. } | Self::UnknownTool(_) | Self::InvalidArgument(_) => {
                ErrorCategory::Tool
            }
            Self::Embedding(_) | Self::DimensionMismatch { .. } => ErrorCategory::Embedding,
            Self::ConversationNotEstablished | Self::InvalidState(_) => ErrorCategory::Usage,
            Self::Canceled => ErrorCategory::Canceled,
        }
    }

    /// Contract violations that must stop the process instead of ending a turn.
    pub fn is_usage_error(&self) -> bool {
        self.category() == ErrorCategory::Usage
    }

    /// Errors from inside a tool that end the turn instead of being shown to the model.
    pub fn aborts_turn(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Embedding | ErrorCategory::Usage | ErrorCategory::Canceled
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ParleyError>;
