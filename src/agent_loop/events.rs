//! Run event stream types.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentToolCall, AgentToolResult, FinishReason, Usage};

use super::types::{RunId, RunnerState, TurnFinish};

/// Concrete event payloads emitted by the runner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventPayload {
    StateChanged {
        state: RunnerState,
    },
    AssistantDelta {
        text: String,
    },
    ToolCallStarted {
        call: AgentToolCall,
    },
    ToolResult {
        result: AgentToolResult,
    },
    StepFinished {
        step: usize,
        reason: FinishReason,
        usage: Usage,
    },
    TurnCompleted {
        finish: TurnFinish,
        steps: usize,
        usage: Usage,
    },
    TurnFailed {
        error: String,
    },
}

/// Envelope for streaming run events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunEvent {
    pub run_id: RunId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: RunEventPayload,
}

/// Callback used for streaming run events.
pub type RunEventSink = Arc<dyn Fn(RunEvent) + Send + Sync>;

pub(crate) struct RunEventEmitter {
    run_id: RunId,
    seq: AtomicU64,
    sink: Option<RunEventSink>,
}

impl RunEventEmitter {
    pub(crate) fn new(run_id: RunId, sink: Option<RunEventSink>) -> Self {
        Self {
            run_id,
            seq: AtomicU64::new(1),
            sink,
        }
    }

    pub(crate) fn run_id(&self) -> RunId {
        self.run_id
    }

    pub(crate) fn emit(&self, payload: RunEventPayload) {
        let Some(sink) = &self.sink else {
            return;
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (sink)(RunEvent {
            run_id: self.run_id,
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }
}
