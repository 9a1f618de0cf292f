//! Console rendering of runner events.

use std::io::Write;
use std::sync::Arc;

use crate::agent_loop::{RunEvent, RunEventPayload, RunEventSink};
use crate::util::{truncate_chars, truncate_display};

/// Width of tool call and tool result lines.
pub const TOOL_PREVIEW_CHARS: usize = 100;
/// Width of debug event lines.
pub const DEBUG_PREVIEW_CHARS: usize = 512;

/// Format an event for the console, or `None` if it is not shown.
pub fn render_event(event: &RunEvent, debug: bool) -> Option<String> {
    match &event.payload {
        RunEventPayload::AssistantDelta { text } => Some(text.clone()),
        RunEventPayload::ToolCallStarted { call } => Some(format!(
            "\n[tool-call:{}] {}\n",
            call.name,
            truncate_display(&call.arguments, TOOL_PREVIEW_CHARS)
        )),
        RunEventPayload::ToolResult { result } => Some(format!(
            "[tool-result:{}]\n{}\n",
            result.tool_name,
            truncate_display(&result.result, TOOL_PREVIEW_CHARS)
        )),
        RunEventPayload::TurnFailed { error } => Some(format!("\n[error] {error}\n")),
        RunEventPayload::TurnCompleted { .. } if !debug => Some("\n".to_string()),
        payload if debug => {
            let rendered = serde_json::to_string(payload).unwrap_or_default();
            Some(format!(
                "\n[debug:{}] {}\n",
                payload_kind(payload),
                truncate_chars(&rendered, DEBUG_PREVIEW_CHARS)
            ))
        }
        _ => None,
    }
}

fn payload_kind(payload: &RunEventPayload) -> &'static str {
    match payload {
        RunEventPayload::StateChanged { .. } => "state",
        RunEventPayload::AssistantDelta { .. } => "text-delta",
        RunEventPayload::ToolCallStarted { .. } => "tool-call",
        RunEventPayload::ToolResult { .. } => "tool-result",
        RunEventPayload::StepFinished { .. } => "step-finish",
        RunEventPayload::TurnCompleted { .. } => "finish",
        RunEventPayload::TurnFailed { .. } => "error",
    }
}

/// Sink that writes events to stdout.
pub fn console_sink(debug: bool) -> RunEventSink {
    Arc::new(move |event: RunEvent| {
        if let Some(text) = render_event(&event, debug) {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_loop::{RunnerState, TurnFinish};
    use crate::types::{AgentToolCall, AgentToolResult, Usage};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn event(payload: RunEventPayload) -> RunEvent {
        RunEvent {
            run_id: Uuid::nil(),
            seq: 1,
            timestamp: Utc::now(),
            payload,
        }
    }

    #[test]
    fn deltas_print_raw() {
        let e = event(RunEventPayload::AssistantDelta { text: "hi".into() });
        assert_eq!(render_event(&e, false).as_deref(), Some("hi"));
    }

    #[test]
    fn tool_lines_are_truncated() {
        let e = event(RunEventPayload::ToolResult {
            result: AgentToolResult {
                tool_call_id: "1".into(),
                tool_name: "read_file".into(),
                result: serde_json::json!("x".repeat(150)),
                is_error: false,
            },
        });
        let rendered = render_event(&e, false).unwrap();
        assert_eq!(
            rendered,
            format!("[tool-result:read_file]\n{}...\n", "x".repeat(100))
        );

        let e = event(RunEventPayload::ToolCallStarted {
            call: AgentToolCall {
                id: "1".into(),
                name: "bash".into(),
                arguments: serde_json::json!({"command": "ls"}),
            },
        });
        assert!(render_event(&e, false).unwrap().starts_with("\n[tool-call:bash] {"));
    }

    #[test]
    fn other_events_only_in_debug() {
        let e = event(RunEventPayload::StateChanged {
            state: RunnerState::Streaming,
        });
        assert_eq!(render_event(&e, false), None);
        let shown = render_event(&e, true).unwrap();
        assert!(shown.contains("[debug:state]"));

        let done = event(RunEventPayload::TurnCompleted {
            finish: TurnFinish::Completed,
            steps: 1,
            usage: Usage::default(),
        });
        assert_eq!(render_event(&done, false).as_deref(), Some("\n"));
    }
}
