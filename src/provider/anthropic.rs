//! Anthropic Messages API provider.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use crate::error::{ParleyError, Result};
use crate::types::*;

use super::http::{anthropic_headers, ensure_success, sse_data_stream, shared_client};
use super::{ModelProvider, ProviderRequest};

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    model_id: String,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(model_id: String, api_key: String, base_url: String) -> Self {
        Self {
            model_id,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn build_request_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let mut system_parts: Vec<String> = request.system.iter().cloned().collect();
        let mut messages = Vec::new();

        for msg in &request.messages {
            match msg.role {
                Role::System => system_parts.push(msg.text()),
                Role::User => messages.push(serde_json::json!({
                    "role": "user",
                    "content": msg.text(),
                })),
                Role::Assistant => {
                    let content: Vec<serde_json::Value> = msg
                        .content
                        .iter()
                        .filter_map(|part| match part {
                            ContentPart::Text { text } if !text.is_empty() => {
                                Some(serde_json::json!({"type": "text", "text": text}))
                            }
                            ContentPart::ToolCall(tc) => Some(serde_json::json!({
                                "type": "tool_use",
                                "id": tc.id,
                                "name": tc.name,
                                "input": tc.arguments,
                            })),
                            _ => None,
                        })
                        .collect();
                    if !content.is_empty() {
                        messages.push(serde_json::json!({
                            "role": "assistant",
                            "content": content,
                        }));
                    }
                }
                // All results of one step travel in a single user turn.
                Role::Tool => {
                    let content: Vec<serde_json::Value> = msg
                        .tool_results_iter()
                        .map(|tr| {
                            serde_json::json!({
                                "type": "tool_result",
                                "tool_use_id": tr.tool_call_id,
                                "content": result_text(&tr.result),
                                "is_error": tr.is_error,
                            })
                        })
                        .collect();
                    if !content.is_empty() {
                        messages.push(serde_json::json!({
                            "role": "user",
                            "content": content,
                        }));
                    }
                }
            }
        }

        let mut body = serde_json::json!({
            "model": self.model_id,
            "messages": messages,
            "max_tokens": request.settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": true,
        });

        if let Some(obj) = body.as_object_mut() {
            if !system_parts.is_empty() {
                obj.insert("system".into(), system_parts.join("\n").into());
            }
            if let Some(temp) = request.settings.temperature {
                obj.insert("temperature".into(), temp.into());
            }

            // Anthropic has no "none" choice; withholding the tools has the same effect.
            let offer_tools = !request.tools.is_empty()
                && request.settings.tool_choice != Some(ToolChoice::None);
            if offer_tools {
                let tool_defs: Vec<serde_json::Value> = request
                    .tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "name": t.name,
                            "description": t.description,
                            "input_schema": t.parameters,
                        })
                    })
                    .collect();
                obj.insert("tools".into(), tool_defs.into());
                match request.settings.tool_choice {
                    Some(ToolChoice::Auto) => {
                        obj.insert("tool_choice".into(), serde_json::json!({"type": "auto"}));
                    }
                    Some(ToolChoice::Required) => {
                        obj.insert("tool_choice".into(), serde_json::json!({"type": "any"}));
                    }
                    _ => {}
                }
            }
        }

        body
    }
}

fn result_text(result: &serde_json::Value) -> String {
    match result {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<StreamPart>>> {
        let body = self.build_request_body(request);
        let url = format!("{}/messages", self.base_url);

        debug!(model = %self.model_id, messages = request.messages.len(), "Anthropic stream_text");

        let resp = shared_client()
            .post(&url)
            .headers(anthropic_headers(&self.api_key, API_VERSION))
            .json(&body)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;

        let mut events = sse_data_stream(resp);
        let stream = async_stream::stream! {
            let mut state = AnthropicStreamState::default();
            while let Some(data) = events.next().await {
                let data = match data {
                    Ok(d) => d,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                let Ok(event) = serde_json::from_str::<serde_json::Value>(&data) else {
                    continue;
                };
                for part in state.handle(&event) {
                    let fatal = part.is_err();
                    yield part;
                    if fatal {
                        return;
                    }
                }
                if state.finished {
                    return;
                }
            }
            if !state.finished {
                yield Err(ParleyError::Stream("stream ended before message_stop".into()));
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Folds Anthropic stream events into [`StreamPart`]s.
#[derive(Default)]
struct AnthropicStreamState {
    block_type: Option<String>,
    tool_id: Option<String>,
    tool_name: Option<String>,
    tool_input: String,
    usage: Usage,
    stop_reason: Option<FinishReason>,
    finished: bool,
}

impl AnthropicStreamState {
    fn handle(&mut self, event: &serde_json::Value) -> Vec<Result<StreamPart>> {
        let event_type = event.get("type").and_then(|t| t.as_str()).unwrap_or("");
        match event_type {
            "message_start" => {
                if let Some(input) = event
                    .pointer("/message/usage/input_tokens")
                    .and_then(|v| v.as_u64())
                {
                    self.usage.input_tokens = input as u32;
                }
                vec![]
            }
            "content_block_start" => {
                let Some(block) = event.get("content_block") else {
                    return vec![];
                };
                let btype = block.get("type").and_then(|t| t.as_str()).unwrap_or("");
                self.block_type = Some(btype.to_string());
                if btype == "tool_use" {
                    self.tool_id = block.get("id").and_then(|v| v.as_str()).map(String::from);
                    self.tool_name = block.get("name").and_then(|v| v.as_str()).map(String::from);
                    self.tool_input.clear();
                }
                vec![]
            }
            "content_block_delta" => {
                let Some(delta) = event.get("delta") else {
                    return vec![];
                };
                match delta.get("type").and_then(|t| t.as_str()) {
                    Some("text_delta") => delta
                        .get("text")
                        .and_then(|t| t.as_str())
                        .filter(|t| !t.is_empty())
                        .map(|text| {
                            vec![Ok(StreamPart::TextDelta {
                                text: text.to_string(),
                            })]
                        })
                        .unwrap_or_default(),
                    Some("input_json_delta") => {
                        if let Some(json) = delta.get("partial_json").and_then(|t| t.as_str()) {
                            self.tool_input.push_str(json);
                        }
                        vec![]
                    }
                    _ => vec![],
                }
            }
            "content_block_stop" => {
                let mut parts = vec![];
                if self.block_type.as_deref() == Some("tool_use") {
                    if let (Some(id), Some(name)) = (self.tool_id.take(), self.tool_name.take()) {
                        let arguments = if self.tool_input.trim().is_empty() {
                            serde_json::json!({})
                        } else {
                            serde_json::from_str(&self.tool_input)
                                .unwrap_or_else(|_| serde_json::Value::String(self.tool_input.clone()))
                        };
                        parts.push(Ok(StreamPart::ToolCall(AgentToolCall {
                            id,
                            name,
                            arguments,
                        })));
                    }
                    self.tool_input.clear();
                }
                self.block_type = None;
                parts
            }
            "message_delta" => {
                if let Some(stop) = event.pointer("/delta/stop_reason").and_then(|s| s.as_str()) {
                    self.stop_reason = Some(FinishReason::from_provider(stop));
                }
                if let Some(output) = event
                    .pointer("/usage/output_tokens")
                    .and_then(|v| v.as_u64())
                {
                    self.usage.output_tokens = output as u32;
                }
                vec![]
            }
            "message_stop" => {
                self.finished = true;
                self.usage.total_tokens = self.usage.input_tokens + self.usage.output_tokens;
                vec![Ok(StreamPart::Finish {
                    reason: self.stop_reason.unwrap_or(FinishReason::Stop),
                    usage: self.usage.clone(),
                })]
            }
            "error" => {
                let message = event
                    .pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown stream error");
                vec![Err(ParleyError::Stream(message.to_string()))]
            }
            _ => vec![],
        }
    }
}
