//! Semantic memory through the store and through its tools.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use parley::memory::{
    memory_tools, Embedder, HashEmbedder, NewMemory, OpenAiEmbedder, QueryOptions, VectorDatabase,
    VectorStore, DEFAULT_LIMIT, DEFAULT_THRESHOLD,
};
use parley::tools::{ToolArguments, ToolExecutionContext};

#[tokio::test]
async fn exact_text_is_the_best_match() {
    let vdb = VectorDatabase::open_in_memory(Arc::new(HashEmbedder::default()))
        .await
        .unwrap();
    let store = vdb.store();
    for text in ["hello world", "green tea", "black"] {
        store.insert(NewMemory::new(text)).await.unwrap();
    }

    let results = store.query("black", QueryOptions::default()).await.unwrap();
    assert_eq!(results[0].content, "black");
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
    assert!(results.len() <= DEFAULT_LIMIT);
    assert!(results.iter().all(|r| r.similarity > DEFAULT_THRESHOLD));
    assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[tokio::test]
async fn memories_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.db");
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(128));
    {
        let vdb = VectorDatabase::open(&path, embedder.clone()).await.unwrap();
        vdb.store()
            .insert(NewMemory::titled("pref", "user prefers green tea"))
            .await
            .unwrap();
    }
    let vdb = VectorDatabase::open(&path, embedder).await.unwrap();
    let hits = vdb
        .store()
        .query("user prefers green tea", QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title.as_deref(), Some("pref"));
}

/// Embeds each request as a one-hot vector picked by the input's length.
fn length_embedding(request: &Request) -> ResponseTemplate {
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    let input = body["input"][0].as_str().unwrap_or_default();
    let mut embedding = vec![0.0f32; 4];
    embedding[input.len() % 4] = 1.0;
    ResponseTemplate::new(200).set_body_json(json!({
        "data": [{"index": 0, "embedding": embedding}]
    }))
}

struct FourDims(OpenAiEmbedder);

#[async_trait::async_trait]
impl Embedder for FourDims {
    fn dimensions(&self) -> usize {
        4
    }

    async fn embed(&self, text: &str) -> parley::error::Result<Vec<f32>> {
        self.0.embed(text).await
    }
}

#[tokio::test]
async fn memory_tools_over_a_remote_embedder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(length_embedding)
        .mount(&server)
        .await;

    let embedder = FourDims(OpenAiEmbedder::new("sk-test", None, Some(server.uri())));
    let vdb = VectorDatabase::open_in_memory(Arc::new(embedder)).await.unwrap();
    let store: Arc<dyn VectorStore> = Arc::new(vdb.store().clone());
    let tools = memory_tools(store);
    let ctx = ToolExecutionContext::default();

    let stored = tools[0]
        .execute(&ToolArguments::new(json!({"content": "abcd"})), &ctx)
        .await
        .unwrap();
    assert_eq!(stored, json!({"id": 1}));
    tools[0]
        .execute(&ToolArguments::new(json!({"content": "abc"})), &ctx)
        .await
        .unwrap();

    let found = tools[1]
        .execute(&ToolArguments::new(json!({"query": "wxyz"})), &ctx)
        .await
        .unwrap();
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["content"], json!("abcd"));

    let none = tools[1]
        .execute(&ToolArguments::new(json!({"query": "zz"})), &ctx)
        .await
        .unwrap();
    assert_eq!(none, json!("No memory found"));
}

#[tokio::test]
async fn embedding_failure_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;
    let embedder = FourDims(OpenAiEmbedder::new("sk-test", None, Some(server.uri())));
    let vdb = VectorDatabase::open_in_memory(Arc::new(embedder)).await.unwrap();

    let err = vdb.store().insert(NewMemory::new("lost")).await.unwrap_err();
    assert!(matches!(err, parley::error::ParleyError::Embedding(_)));
    assert!(err.aborts_turn());
    let count: i64 = vdb
        .database()
        .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM document", [], |r| r.get(0))?))
        .await
        .unwrap();
    assert_eq!(count, 0);
}
