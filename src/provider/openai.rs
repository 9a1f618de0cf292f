//! OpenAI Chat Completions API provider.
//!
//! Also serves Gemini and DeepSeek through their OpenAI-compatible endpoints.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ParleyError, Result};
use crate::models::ProviderKey;
use crate::types::*;

use super::http::{bearer_headers, ensure_success, sse_data_stream, shared_client, SSE_DONE};
use super::{ModelProvider, ProviderRequest};

pub struct OpenAiProvider {
    provider: ProviderKey,
    model_id: String,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(provider: ProviderKey, model_id: String, api_key: String, base_url: String) -> Self {
        Self {
            provider,
            model_id,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn build_request_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        for msg in &request.messages {
            messages.extend(message_to_openai(msg));
        }

        let mut body = serde_json::json!({
            "model": self.model_id,
            "messages": messages,
            "stream": true,
            "stream_options": {"include_usage": true},
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(max) = request.settings.max_tokens {
                obj.insert("max_tokens".into(), max.into());
            }
            if let Some(temp) = request.settings.temperature {
                obj.insert("temperature".into(), temp.into());
            }
            if !request.tools.is_empty() {
                let tool_defs: Vec<serde_json::Value> = request
                    .tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect();
                obj.insert("tools".into(), tool_defs.into());
                if let Some(choice) = request.settings.tool_choice {
                    obj.insert("tool_choice".into(), choice.to_string().into());
                }
            }
        }

        body
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        self.provider.as_str()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<StreamPart>>> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            provider = %self.provider,
            model = %self.model_id,
            messages = request.messages.len(),
            "chat completions stream_text"
        );

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;

        let mut events = sse_data_stream(resp);
        let stream = async_stream::stream! {
            let mut state = ChatStreamState::default();
            while let Some(data) = events.next().await {
                let data = match data {
                    Ok(d) => d,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                if data == SSE_DONE {
                    break;
                }
                match serde_json::from_str::<ChatStreamChunk>(&data) {
                    Ok(chunk) => {
                        for part in state.handle(chunk) {
                            yield part;
                        }
                    }
                    Err(e) => debug!(error = %e, "skipping unparseable chunk"),
                }
            }
            match state.finish() {
                Some(part) => yield part,
                None => yield Err(ParleyError::Stream("stream ended without a finish reason".into())),
            }
        };

        Ok(Box::pin(stream))
    }
}

fn message_to_openai(msg: &Message) -> Vec<serde_json::Value> {
    match msg.role {
        Role::System => vec![serde_json::json!({"role": "system", "content": msg.text()})],
        Role::User => vec![serde_json::json!({"role": "user", "content": msg.text()})],
        Role::Assistant => {
            let text = msg.text();
            let tool_calls: Vec<serde_json::Value> = msg
                .tool_calls()
                .into_iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments.to_string(),
                        }
                    })
                })
                .collect();
            let mut out = serde_json::json!({"role": "assistant"});
            if let Some(obj) = out.as_object_mut() {
                obj.insert(
                    "content".into(),
                    if text.is_empty() {
                        serde_json::Value::Null
                    } else {
                        text.into()
                    },
                );
                if !tool_calls.is_empty() {
                    obj.insert("tool_calls".into(), tool_calls.into());
                }
            }
            vec![out]
        }
        Role::Tool => msg
            .tool_results_iter()
            .map(|tr| {
                let content = match &tr.result {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                serde_json::json!({
                    "role": "tool",
                    "tool_call_id": tr.tool_call_id,
                    "content": content,
                })
            })
            .collect(),
    }
}

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<ChatStreamChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    #[serde(default)]
    delta: ChatDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCallDelta {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ChatFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct ChatFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulates streamed tool-call fragments by index.
#[derive(Default)]
struct ChatStreamState {
    pending: BTreeMap<u32, PartialToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Usage,
    call_seq: u32,
}

impl ChatStreamState {
    fn handle(&mut self, chunk: ChatStreamChunk) -> Vec<Result<StreamPart>> {
        let mut parts = Vec::new();
        if let Some(usage) = chunk.usage {
            self.usage = Usage::new(usage.prompt_tokens, usage.completion_tokens);
        }
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                parts.push(Ok(StreamPart::TextDelta { text }));
            }
            for delta in choice.delta.tool_calls.into_iter().flatten() {
                let entry = self.pending.entry(delta.index).or_default();
                if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
                    entry.id = id;
                }
                if let Some(function) = delta.function {
                    if let Some(name) = function.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(args) = function.arguments {
                        entry.arguments.push_str(&args);
                    }
                }
            }
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(FinishReason::from_provider(&reason));
                parts.extend(self.flush_tool_calls());
            }
        }
        parts
    }

    fn flush_tool_calls(&mut self) -> Vec<Result<StreamPart>> {
        std::mem::take(&mut self.pending)
            .into_values()
            .map(|call| {
                self.call_seq += 1;
                // Some compatible endpoints omit call ids.
                let id = if call.id.is_empty() {
                    format!("call_{}", self.call_seq)
                } else {
                    call.id
                };
                let arguments = if call.arguments.trim().is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&call.arguments)
                        .unwrap_or(serde_json::Value::String(call.arguments))
                };
                Ok(StreamPart::ToolCall(AgentToolCall {
                    id,
                    name: call.name,
                    arguments,
                }))
            })
            .collect()
    }

    /// Final part once the event stream is exhausted.
    fn finish(&mut self) -> Option<Result<StreamPart>> {
        let reason = self.finish_reason?;
        Some(Ok(StreamPart::Finish {
            reason,
            usage: self.usage.clone(),
        }))
    }
}
