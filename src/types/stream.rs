//! Streaming types.

use serde::{Deserialize, Serialize};

use super::generation::FinishReason;
use super::message::AgentToolCall;
use super::usage::Usage;

/// One incremental part of a model response.
///
/// Providers assemble tool-call arguments internally and emit each call only
/// once it is complete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamPart {
    TextDelta {
        text: String,
    },
    ToolCall(AgentToolCall),
    Finish {
        reason: FinishReason,
        #[serde(default)]
        usage: Usage,
    },
}
