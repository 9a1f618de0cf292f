//! Model provider trait and implementations.

pub mod anthropic;
pub mod http;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::ParleyConfig;
use crate::error::{ParleyError, Result};
use crate::models::{LanguageModel, ProviderKey};
use crate::types::{GenerationSettings, Message, StreamPart};

/// A request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub settings: GenerationSettings,
    pub tools: Vec<ToolDefinition>,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Core trait implemented by all model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "anthropic").
    fn provider_name(&self) -> &str;
    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Start a streamed generation.
    ///
    /// The stream yields text deltas and complete tool calls in model order,
    /// then exactly one [`StreamPart::Finish`].
    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<StreamPart>>>;
}

/// Create a provider for the given model, using the provided config.
pub fn create_provider(
    model: &LanguageModel,
    config: &ParleyConfig,
) -> Result<Arc<dyn ModelProvider>> {
    let key = model.provider;
    let api_key = config.get_api_key(key.as_str()).ok_or_else(|| {
        ParleyError::Authentication(format!("Missing API key for provider '{key}'"))
    })?;
    let base_url = config
        .get_base_url(key.as_str())
        .unwrap_or_else(|| key.default_base_url().to_string());

    Ok(match key {
        ProviderKey::Anthropic => Arc::new(anthropic::AnthropicProvider::new(
            model.model_id.clone(),
            api_key,
            base_url,
        )),
        ProviderKey::OpenAi | ProviderKey::Google | ProviderKey::DeepSeek => {
            Arc::new(openai::OpenAiProvider::new(
                key,
                model.model_id.clone(),
                api_key,
                base_url,
            ))
        }
    })
}
