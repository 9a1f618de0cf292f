//! SQLite-backed vector memory store.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::embedder::Embedder;
use crate::error::{ParleyError, Result};
use crate::storage::Database;

const DOCUMENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS document (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS memory_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const DIMENSION_KEY: &str = "embedding_dimensions";

pub const DEFAULT_THRESHOLD: f64 = 0.7;
pub const DEFAULT_LIMIT: usize = 5;

/// A document to remember.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMemory {
    pub title: Option<String>,
    pub content: String,
}

impl NewMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            title: None,
            content: content.into(),
        }
    }

    pub fn titled(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    /// Results must score strictly above this.
    pub threshold: f64,
    pub limit: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: i64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub similarity: f64,
}

/// Similarity search over remembered documents.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn insert(&self, memory: NewMemory) -> Result<i64>;

    /// Documents whose similarity to `text` exceeds the threshold, best first.
    async fn query(&self, text: &str, options: QueryOptions) -> Result<Vec<QueryResult>>;
}

/// Cosine similarity, computed in f64 and clamped to `[-1, 1]`.
///
/// Zero vectors have similarity 0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let (mut dot, mut na, mut nb) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0)
}

fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Vector store keeping embeddings as little-endian f32 blobs.
///
/// Queries scan every document; fine for personal-scale memory.
#[derive(Clone)]
pub struct SqliteVectorStore {
    db: Database,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorStore {
    /// Create the document tables and pin the embedding dimension.
    ///
    /// A database first opened with one embedder refuses another whose
    /// dimension differs.
    pub async fn open(db: Database, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let dims = embedder.dimensions();
        db.call(move |conn| {
            conn.execute_batch(DOCUMENT_SCHEMA)?;
            let recorded: Option<String> = conn
                .query_row(
                    "SELECT value FROM memory_meta WHERE key = ?1",
                    params![DIMENSION_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            match recorded {
                Some(value) if value != dims.to_string() => Err(ParleyError::Configuration(format!(
                    "memory database holds {value}-dimensional embeddings, embedder produces {dims}"
                ))),
                Some(_) => Ok(()),
                None => {
                    conn.execute(
                        "INSERT INTO memory_meta (key, value) VALUES (?1, ?2)",
                        params![DIMENSION_KEY, dims.to_string()],
                    )?;
                    Ok(())
                }
            }
        })
        .await?;
        Ok(Self { db, embedder })
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    async fn embed_checked(&self, text: &str) -> Result<Vec<f32>> {
        // Any failure to embed, transport or HTTP status included, is an embedding error.
        let embedding = self.embedder.embed(text).await.map_err(|e| match e {
            ParleyError::Embedding(_) | ParleyError::DimensionMismatch { .. } => e,
            other => ParleyError::Embedding(other.to_string()),
        })?;
        let expected = self.embedder.dimensions();
        if embedding.len() != expected {
            return Err(ParleyError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }
}

impl std::fmt::Debug for SqliteVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteVectorStore")
            .field("dimensions", &self.embedder.dimensions())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn insert(&self, memory: NewMemory) -> Result<i64> {
        let embedding = self.embed_checked(&memory.content).await?;
        let blob = encode_embedding(&embedding);
        let id = self
            .db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO document (title, content, embedding) VALUES (?1, ?2, ?3)",
                    params![memory.title, memory.content, blob],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        debug!(id, "stored memory");
        Ok(id)
    }

    async fn query(&self, text: &str, options: QueryOptions) -> Result<Vec<QueryResult>> {
        let needle = self.embed_checked(text).await?;
        let mut results = self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT id, title, content, embedding FROM document")?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                })?;
                let mut hits = Vec::new();
                for row in rows {
                    let (id, title, content, blob) = row?;
                    let similarity = cosine_similarity(&needle, &decode_embedding(&blob));
                    if similarity > options.threshold {
                        hits.push(QueryResult {
                            id,
                            content,
                            title,
                            similarity,
                        });
                    }
                }
                Ok(hits)
            })
            .await?;

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity).then(a.id.cmp(&b.id)));
        results.truncate(options.limit);
        debug!(hits = results.len(), "memory query");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::embedder::HashEmbedder;
    use pretty_assertions::assert_eq;

    struct FixedEmbedder(usize);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn dimensions(&self) -> usize {
            self.0
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; 3])
        }
    }

    async fn store() -> SqliteVectorStore {
        let db = Database::open_in_memory().await.unwrap();
        SqliteVectorStore::open(db, Arc::new(HashEmbedder::default()))
            .await
            .unwrap()
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn embedding_blob_is_little_endian_f32() {
        let blob = encode_embedding(&[1.0, -0.5]);
        assert_eq!(blob.len(), 8);
        assert_eq!(&blob[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_embedding(&blob), vec![1.0, -0.5]);
    }

    #[tokio::test]
    async fn exact_match_ranks_first() {
        let store = store().await;
        for text in ["hello world", "green tea", "black"] {
            store.insert(NewMemory::new(text)).await.unwrap();
        }
        let results = store.query("black", QueryOptions::default()).await.unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].content, "black");
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn results_respect_threshold_order_and_limit() {
        let store = store().await;
        for i in 0..8 {
            store
                .insert(NewMemory::titled(format!("note {i}"), "the same text"))
                .await
                .unwrap();
        }
        store.insert(NewMemory::new("unrelated zebra")).await.unwrap();

        let results = store.query("the same text", QueryOptions::default()).await.unwrap();
        assert_eq!(results.len(), DEFAULT_LIMIT);
        assert!(results.iter().all(|r| r.similarity > DEFAULT_THRESHOLD));
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        assert_eq!(results[0].title.as_deref(), Some("note 0"));

        let none = store
            .query("the same text", QueryOptions { threshold: 1.0, limit: 5 })
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn dimension_is_pinned_per_database() {
        let db = Database::open_in_memory().await.unwrap();
        SqliteVectorStore::open(db.clone(), Arc::new(HashEmbedder::new(32)))
            .await
            .unwrap();
        let err = SqliteVectorStore::open(db, Arc::new(HashEmbedder::new(64)))
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::Configuration(_)));
    }

    #[tokio::test]
    async fn wrong_length_embedding_writes_nothing() {
        let db = Database::open_in_memory().await.unwrap();
        let store = SqliteVectorStore::open(db.clone(), Arc::new(FixedEmbedder(4)))
            .await
            .unwrap();
        let err = store.insert(NewMemory::new("x")).await.unwrap_err();
        assert!(matches!(
            err,
            ParleyError::DimensionMismatch { expected: 4, actual: 3 }
        ));
        let count: i64 = db
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM document", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
