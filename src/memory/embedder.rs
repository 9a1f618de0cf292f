//! Text embedders.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ParleyConfig, DEFAULT_EMBEDDING_MODEL};
use crate::error::{ParleyError, Result};
use crate::models::ProviderKey;
use crate::provider::http::{bearer_headers, ensure_success, shared_client};

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Collapse control characters and runs of whitespace.
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Embedder backed by the OpenAI `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>, model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());
        let dimensions = match model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        };
        Self {
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or_else(|| ProviderKey::OpenAi.default_base_url().to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            dimensions,
        }
    }

    /// Build from config, requiring `OPENAI_API_KEY`.
    pub fn from_config(config: &ParleyConfig) -> Result<Self> {
        let api_key = config.get_api_key("openai").ok_or_else(|| {
            ParleyError::Configuration("semantic memory needs OPENAI_API_KEY for embeddings".into())
        })?;
        Ok(Self::new(
            api_key,
            Some(config.embedding_model().to_string()),
            config.get_base_url("openai"),
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: vec![normalize_text(text)],
        };
        let resp = shared_client()
            .post(format!("{}/embeddings", self.base_url))
            .headers(bearer_headers(&self.api_key))
            .json(&request)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let body: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| ParleyError::Embedding(format!("malformed embedding response: {e}")))?;
        body.data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| ParleyError::Embedding("no embedding returned".into()))
    }
}

/// Deterministic local embedder using feature hashing.
///
/// Words and character trigrams are hashed into signed buckets and the
/// result is L2-normalized. Useful offline and in tests; it captures lexical
/// overlap, not meaning.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dimensions];
        let lowered = normalize_text(text).to_lowercase();
        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            self.bump(&mut v, word.as_bytes(), 1.0);
            let padded: Vec<char> = format!("#{word}#").chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.bump(&mut v, gram.as_bytes(), 0.5);
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }

    fn bump(&self, v: &mut [f32], feature: &[u8], weight: f32) {
        let h = fnv1a(feature);
        let idx = (h % self.dimensions as u64) as usize;
        let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        v[idx] += sign * weight;
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(PRIME))
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector(text))
    }
}
