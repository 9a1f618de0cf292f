//! Model naming: resolves a user-facing model name to a provider and model id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParleyError;

/// Canonical provider keys used across model parsing, config and provider wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKey {
    Anthropic,
    OpenAi,
    Google,
    DeepSeek,
}

impl ProviderKey {
    /// Canonical provider key string, also the config lookup key.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Google => "google",
            Self::DeepSeek => "deepseek",
        }
    }

    /// Parse user-facing provider aliases.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "anthropic" | "claude" => Some(Self::Anthropic),
            "openai" => Some(Self::OpenAi),
            "google" | "gemini" => Some(Self::Google),
            "deepseek" => Some(Self::DeepSeek),
            _ => None,
        }
    }

    /// Base URL used when the config does not override it.
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::DeepSeek => "https://api.deepseek.com/v1",
        }
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved model: which provider serves it, and the id sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguageModel {
    pub provider: ProviderKey,
    pub model_id: String,
}

impl LanguageModel {
    pub fn new(provider: ProviderKey, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
        }
    }
}

impl fmt::Display for LanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model_id)
    }
}

impl FromStr for LanguageModel {
    type Err = ParleyError;

    /// Accepts the short aliases `claude`, `gemini` and `deepseek`, names with
    /// a known family prefix, or an explicit `provider:model`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        match name {
            "claude" => return Ok(Self::new(ProviderKey::Anthropic, "claude-3-7-sonnet-20250219")),
            "gemini" => return Ok(Self::new(ProviderKey::Google, "gemini-2.5-pro-exp-03-25")),
            "deepseek" => return Ok(Self::new(ProviderKey::DeepSeek, "deepseek-chat")),
            _ => {}
        }

        if let Some((provider, model_id)) = name.split_once(':') {
            let provider = ProviderKey::parse(provider)
                .ok_or_else(|| ParleyError::ModelNotFound(name.to_string()))?;
            if model_id.is_empty() {
                return Err(ParleyError::ModelNotFound(name.to_string()));
            }
            return Ok(Self::new(provider, model_id));
        }

        let provider = if name.starts_with("claude-") {
            ProviderKey::Anthropic
        } else if name.starts_with("gemini-") {
            ProviderKey::Google
        } else if name.starts_with("deepseek-") {
            ProviderKey::DeepSeek
        } else if name.starts_with("gpt-") || is_openai_reasoning_model(name) {
            ProviderKey::OpenAi
        } else {
            return Err(ParleyError::ModelNotFound(name.to_string()));
        };
        Ok(Self::new(provider, name))
    }
}

fn is_openai_reasoning_model(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('o') && chars.next().is_some_and(|c| c.is_ascii_digit())
}
