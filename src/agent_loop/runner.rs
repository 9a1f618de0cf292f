//! The conversation runner.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ParleyError, Result};
use crate::interaction::Interaction;
use crate::messenger::Messenger;
use crate::provider::{ModelProvider, ProviderRequest};
use crate::tools::{ToolArguments, ToolExecutionContext, ToolSet};
use crate::types::{
    AgentToolCall, AgentToolResult, ContentPart, FinishReason, Message, Role, StreamPart, Usage,
};

use super::events::{RunEventEmitter, RunEventPayload, RunEventSink};
use super::types::{RunExit, RunId, RunnerOptions, RunnerState, TurnFinish, TurnOutcome};

/// Prompt shown when waiting for the next user message.
pub const INPUT_PROMPT: &str = "> ";

/// Drives one conversation: model requests, tool dispatch and user input.
///
/// A turn runs whenever the history ends on something the model has not
/// answered yet. All messages a turn produces reach the [`Messenger`] in a
/// single `add`, so an aborted turn leaves the stored history untouched.
pub struct ConversationRunner {
    provider: Arc<dyn ModelProvider>,
    tools: ToolSet,
    options: RunnerOptions,
    cancel: CancellationToken,
    emitter: RunEventEmitter,
    state: RunnerState,
}

impl ConversationRunner {
    pub fn new(provider: Arc<dyn ModelProvider>, tools: ToolSet, options: RunnerOptions) -> Self {
        Self {
            provider,
            tools,
            options,
            cancel: CancellationToken::new(),
            emitter: RunEventEmitter::new(Uuid::new_v4(), None),
            state: RunnerState::Idle,
        }
    }

    pub fn with_event_sink(mut self, sink: RunEventSink) -> Self {
        self.emitter = RunEventEmitter::new(Uuid::new_v4(), Some(sink));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that interrupts the runner when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run_id(&self) -> RunId {
        self.emitter.run_id()
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Whether the history is waiting on a model reply.
    pub fn awaits_model(messenger: &Messenger) -> bool {
        messenger
            .last()
            .is_some_and(|message| message.role != Role::Assistant)
    }

    fn set_state(&mut self, state: RunnerState) {
        if self.state != state {
            self.state = state;
            self.emitter.emit(RunEventPayload::StateChanged { state });
        }
    }

    /// Interactive loop until the user leaves, one-shot completes, or the
    /// cancellation token fires.
    ///
    /// Failed turns are reported as events and the loop goes back to waiting
    /// for input. Usage errors end the loop with `Err`.
    pub async fn run(
        &mut self,
        messenger: &mut Messenger,
        interaction: &dyn Interaction,
    ) -> Result<RunExit> {
        let cancel = self.cancel.clone();
        let mut respond = Self::awaits_model(messenger);
        loop {
            if cancel.is_cancelled() {
                return Ok(self.interrupt(messenger).await);
            }

            if respond {
                match self.run_turn(messenger).await {
                    Ok(outcome) => {
                        debug!(finish = %outcome.finish, steps = outcome.steps, "turn resolved");
                    }
                    Err(ParleyError::Canceled) => return Ok(self.interrupt(messenger).await),
                    Err(e) if e.is_usage_error() => {
                        self.set_state(RunnerState::Exit);
                        return Err(e);
                    }
                    Err(e) => {
                        warn!(error = %e, "turn failed");
                        self.emitter
                            .emit(RunEventPayload::TurnFailed { error: e.to_string() });
                        self.set_state(RunnerState::Idle);
                    }
                }
                if self.options.oneshot {
                    self.set_state(RunnerState::Exit);
                    return Ok(RunExit::Oneshot);
                }
            }

            let input = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.interrupt(messenger).await),
                input = interaction.prompt(INPUT_PROMPT) => input?,
            };
            let text = match input.as_deref().map(str::trim) {
                None | Some("") | Some("exit") => {
                    self.set_state(RunnerState::Exit);
                    return Ok(RunExit::UserExit);
                }
                Some(text) => text.to_string(),
            };
            messenger.add(vec![Message::user(text)]).await?;
            respond = true;
        }
    }

    async fn interrupt(&mut self, messenger: &mut Messenger) -> RunExit {
        debug!("interrupted, persisting conversation");
        messenger.persist().await;
        self.set_state(RunnerState::Exit);
        RunExit::Interrupted
    }

    /// Run one turn: model steps with tool dispatch until the model stops
    /// asking for tools or a budget runs out.
    pub async fn run_turn(&mut self, messenger: &mut Messenger) -> Result<TurnOutcome> {
        if !Self::awaits_model(messenger) {
            return Err(ParleyError::InvalidState(
                "a turn needs history that does not end with an assistant reply".into(),
            ));
        }
        let result = self.collect_turn(messenger.messages()).await;
        let (response, finish, steps, usage) = match result {
            Ok(turn) => turn,
            Err(e) => {
                self.set_state(RunnerState::Idle);
                return Err(e);
            }
        };

        let outcome = TurnOutcome {
            finish,
            steps,
            messages: response.len(),
            usage: usage.clone(),
        };
        messenger.add(response).await?;
        self.set_state(RunnerState::Idle);
        self.emitter.emit(RunEventPayload::TurnCompleted {
            finish,
            steps,
            usage,
        });
        Ok(outcome)
    }

    async fn collect_turn(
        &mut self,
        history: &[Message],
    ) -> Result<(Vec<Message>, TurnFinish, usize, Usage)> {
        let definitions = self.tools.definitions();
        let mut response: Vec<Message> = Vec::new();
        let mut usage = Usage::default();
        let mut step = 0usize;

        loop {
            step += 1;
            self.set_state(RunnerState::Streaming);
            let request = ProviderRequest {
                system: self.options.system.clone(),
                messages: history.iter().chain(response.iter()).cloned().collect(),
                settings: self.options.settings.clone(),
                tools: definitions.clone(),
            };
            debug!(
                provider = self.provider.provider_name(),
                model = self.provider.model_id(),
                step,
                messages = request.messages.len(),
                "model request"
            );

            let (parts, results, reason, step_usage) = self.stream_step(&request).await?;
            usage.merge(&step_usage);
            self.emitter.emit(RunEventPayload::StepFinished {
                step,
                reason,
                usage: step_usage,
            });

            let called_tools = !results.is_empty();
            if !parts.is_empty() {
                response.push(Message {
                    role: Role::Assistant,
                    content: parts,
                });
            }
            if called_tools {
                response.push(Message::tool_results(results));
            }

            let finish = if reason == FinishReason::Length {
                Some(TurnFinish::TokenBudgetExhausted)
            } else if !called_tools {
                Some(TurnFinish::Completed)
            } else if step >= self.options.max_steps {
                Some(TurnFinish::StepBudgetExhausted)
            } else {
                None
            };
            if let Some(finish) = finish {
                return Ok((response, finish, step, usage));
            }
        }
    }

    async fn stream_step(
        &mut self,
        request: &ProviderRequest,
    ) -> Result<(Vec<ContentPart>, Vec<AgentToolResult>, FinishReason, Usage)> {
        let cancel = self.cancel.clone();
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ParleyError::Canceled),
            stream = self.provider.stream_text(request) => stream?,
        };

        let mut parts: Vec<ContentPart> = Vec::new();
        let mut results: Vec<AgentToolResult> = Vec::new();
        let mut finish: Option<(FinishReason, Usage)> = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ParleyError::Canceled),
                next = stream.next() => next,
            };
            let Some(part) = next else { break };
            match part? {
                StreamPart::TextDelta { text } => {
                    if text.is_empty() {
                        continue;
                    }
                    self.emitter
                        .emit(RunEventPayload::AssistantDelta { text: text.clone() });
                    match parts.last_mut() {
                        Some(ContentPart::Text { text: buffered }) => buffered.push_str(&text),
                        _ => parts.push(ContentPart::Text { text }),
                    }
                }
                StreamPart::ToolCall(call) => {
                    let result = self.dispatch(&call).await?;
                    parts.push(ContentPart::ToolCall(call));
                    results.push(result);
                }
                StreamPart::Finish { reason, usage } => {
                    finish = Some((reason, usage));
                }
            }
        }

        let (reason, usage) = finish
            .ok_or_else(|| ParleyError::Stream("model stream ended without a finish part".into()))?;
        Ok((parts, results, reason, usage))
    }

    async fn dispatch(&mut self, call: &AgentToolCall) -> Result<AgentToolResult> {
        self.emitter
            .emit(RunEventPayload::ToolCallStarted { call: call.clone() });
        let tool = self
            .tools
            .get(&call.name)
            .cloned()
            .ok_or_else(|| ParleyError::UnknownTool(call.name.clone()))?;

        self.set_state(RunnerState::ToolDispatch);
        let args = ToolArguments::new(call.arguments.clone());
        let ctx = ToolExecutionContext {
            tool_call_id: call.id.clone(),
        };
        let result = match tool.execute(&args, &ctx).await {
            Ok(value) => AgentToolResult {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                result: value,
                is_error: false,
            },
            Err(e) if e.aborts_turn() => {
                self.set_state(RunnerState::Streaming);
                return Err(e);
            }
            Err(e) => {
                debug!(tool = %call.name, error = %e, "tool returned an error");
                AgentToolResult {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    result: serde_json::json!({ "error": e.to_string() }),
                    is_error: true,
                }
            }
        };
        self.emitter.emit(RunEventPayload::ToolResult {
            result: result.clone(),
        });
        self.set_state(RunnerState::Streaming);
        Ok(result)
    }
}
