//! Providers against mocked streaming endpoints.

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parley::config::ParleyConfig;
use parley::error::ParleyError;
use parley::models::LanguageModel;
use parley::provider::{create_provider, ProviderRequest, ToolDefinition};
use parley::types::{AgentToolCall, FinishReason, Message, StreamPart, Usage};

fn sse(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|e| format!("data: {e}\n\n"))
        .collect::<String>()
}

fn request() -> ProviderRequest {
    ProviderRequest {
        system: Some("be brief".into()),
        messages: vec![Message::user("weather?")],
        tools: vec![ToolDefinition {
            name: "weather".into(),
            description: "forecast".into(),
            parameters: json!({"type": "object", "properties": {}, "required": []}),
        }],
        ..Default::default()
    }
}

async fn collect(
    model: &str,
    config: &ParleyConfig,
) -> parley::error::Result<Vec<StreamPart>> {
    let model: LanguageModel = model.parse()?;
    let provider = create_provider(&model, config)?;
    let mut stream = provider.stream_text(&request()).await?;
    let mut parts = Vec::new();
    while let Some(part) = stream.next().await {
        parts.push(part?);
    }
    Ok(parts)
}

#[tokio::test]
async fn anthropic_stream_yields_text_tool_call_and_finish() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"type": "message_start", "message": {"usage": {"input_tokens": 12}}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Checking"}}),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "weather"}}),
        json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"city\":"}}),
        json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "\"Oslo\"}"}}),
        json!({"type": "content_block_stop", "index": 1}),
        json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 7}}),
        json!({"type": "message_stop"}),
    ]);
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant"))
        .and(body_partial_json(json!({"stream": true, "system": "be brief", "tool_choice": {"type": "auto"}})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let config = ParleyConfig::from_vars([
        ("ANTHROPIC_API_KEY", "sk-ant".to_string()),
        ("ANTHROPIC_BASE_URL", server.uri()),
    ]);
    let model: LanguageModel = "claude".parse().unwrap();
    let provider = create_provider(&model, &config).unwrap();
    let mut req = request();
    req.settings.tool_choice = Some(parley::types::ToolChoice::Auto);
    let parts: Vec<StreamPart> = provider
        .stream_text(&req)
        .await
        .unwrap()
        .map(|p| p.unwrap())
        .collect()
        .await;

    assert_eq!(
        parts,
        vec![
            StreamPart::TextDelta {
                text: "Checking".into()
            },
            StreamPart::ToolCall(AgentToolCall {
                id: "toolu_1".into(),
                name: "weather".into(),
                arguments: json!({"city": "Oslo"}),
            }),
            StreamPart::Finish {
                reason: FinishReason::ToolCalls,
                usage: Usage::new(12, 7),
            },
        ]
    );
}

#[tokio::test]
async fn openai_compatible_stream_assembles_tool_calls() {
    let server = MockServer::start().await;
    let mut body = sse(&[
        json!({"choices": [{"delta": {"content": "Let me check"}}]}),
        json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "id": "call_9", "function": {"name": "weather", "arguments": "{\"city\""}}]}}]}),
        json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "function": {"arguments": ":\"Oslo\"}"}}]}}]}),
        json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]}),
        json!({"choices": [], "usage": {"prompt_tokens": 20, "completion_tokens": 4}}),
    ]);
    body.push_str("data: [DONE]\n\n");
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-ds"))
        .and(body_partial_json(json!({"model": "deepseek-chat", "stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let config = ParleyConfig::from_vars([
        ("DEEPSEEK_API_KEY", "sk-ds".to_string()),
        ("DEEPSEEK_BASE_URL", server.uri()),
    ]);
    let parts = collect("deepseek", &config).await.unwrap();
    assert_eq!(
        parts,
        vec![
            StreamPart::TextDelta {
                text: "Let me check".into()
            },
            StreamPart::ToolCall(AgentToolCall {
                id: "call_9".into(),
                name: "weather".into(),
                arguments: json!({"city": "Oslo"}),
            }),
            StreamPart::Finish {
                reason: FinishReason::ToolCalls,
                usage: Usage::new(20, 4),
            },
        ]
    );
}

#[tokio::test]
async fn http_errors_are_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&server)
        .await;
    let config = ParleyConfig::from_vars([
        ("OPENAI_API_KEY", "bad".to_string()),
        ("OPENAI_BASE_URL", server.uri()),
    ]);
    let err = collect("gpt-4o", &config).await.unwrap_err();
    assert!(matches!(err, ParleyError::Authentication(_)));
}

#[tokio::test]
async fn truncated_stream_is_an_error() {
    let server = MockServer::start().await;
    let body = sse(&[json!({"choices": [{"delta": {"content": "partial"}}]})]);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;
    let config = ParleyConfig::from_vars([
        ("OPENAI_API_KEY", "k".to_string()),
        ("OPENAI_BASE_URL", server.uri()),
    ]);
    let err = collect("gpt-4o", &config).await.unwrap_err();
    assert!(matches!(err, ParleyError::Stream(_)));
}
