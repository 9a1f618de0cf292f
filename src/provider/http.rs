//! Shared HTTP client, SSE framing, and auth utilities.

use std::sync::OnceLock;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{ParleyError, Result};

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(600))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "falling back to default HTTP client");
                reqwest::Client::new()
            })
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Build Anthropic-style headers (x-api-key).
pub fn anthropic_headers(api_key: &str, version: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("x-api-key", val);
    }
    if let Ok(val) = HeaderValue::from_str(version) {
        headers.insert("anthropic-version", val);
    }
    headers
}

/// Marker payload that ends an OpenAI-style event stream.
pub const SSE_DONE: &str = "[DONE]";

/// Return the payload of an SSE `data:` line.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data))
}

/// Split a streaming HTTP body into SSE `data:` payloads.
///
/// Comment lines, `event:` lines and blank separators are skipped. A payload
/// of `[DONE]` is passed through so callers can tell a clean end apart from
/// a dropped connection.
pub fn sse_data_stream(resp: reqwest::Response) -> BoxStream<'static, Result<String>> {
    let byte_stream = resp.bytes_stream();
    let stream = async_stream::stream! {
        let mut buffer = String::new();
        futures::pin_mut!(byte_stream);

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(ParleyError::Network(e));
                    return;
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.drain(..=line_end);

                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                if let Some(data) = parse_sse_data(&line) {
                    yield Ok(data.to_string());
                }
            }
        }

        let tail = buffer.trim();
        if let Some(data) = parse_sse_data(tail) {
            yield Ok(data.to_string());
        }
    };
    Box::pin(stream)
}

/// Fail with a typed error unless the response is a success.
pub async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(status_to_error(status.as_u16(), &body))
}

/// Map an HTTP error status to the crate error.
pub fn status_to_error(status: u16, body: &str) -> ParleyError {
    match status {
        401 | 403 => ParleyError::Authentication(body.to_string()),
        429 => ParleyError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => ParleyError::api(status, body),
    }
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}
