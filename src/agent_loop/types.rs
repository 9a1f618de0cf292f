//! Core run types for the agent loop.

use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::config::DEFAULT_MAX_STEPS;
use crate::types::{GenerationSettings, ToolChoice, Usage};

/// Unique run identifier.
pub type RunId = Uuid;

/// Where the runner is in its loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunnerState {
    Idle,
    Streaming,
    ToolDispatch,
    Exit,
}

/// How a turn ended. All of these are normal outcomes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnFinish {
    /// The model answered without asking for more tools.
    Completed,
    StepBudgetExhausted,
    TokenBudgetExhausted,
}

/// Summary of one resolved turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub finish: TurnFinish,
    pub steps: usize,
    /// Messages appended to the conversation.
    pub messages: usize,
    pub usage: Usage,
}

/// Why [`run`](super::ConversationRunner::run) returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunExit {
    /// End of input, a blank line or `exit`.
    UserExit,
    /// One-shot mode finished its turn.
    Oneshot,
    /// Cancelled from outside.
    Interrupted,
}

/// Knobs for a runner.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerOptions {
    pub system: Option<String>,
    pub settings: GenerationSettings,
    /// Model requests allowed per turn.
    pub max_steps: usize,
    pub oneshot: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            system: None,
            settings: GenerationSettings {
                tool_choice: Some(ToolChoice::Auto),
                ..Default::default()
            },
            max_steps: DEFAULT_MAX_STEPS,
            oneshot: false,
        }
    }
}

impl RunnerOptions {
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.settings.max_tokens = max_tokens;
        self
    }

    pub fn with_oneshot(mut self, oneshot: bool) -> Self {
        self.oneshot = oneshot;
        self
    }
}
