//! Semantic memory: embedders, the vector store and its tools.

pub mod database;
pub mod embedder;
pub mod store;
pub mod tools;

pub use database::VectorDatabase;
pub use embedder::{Embedder, HashEmbedder, OpenAiEmbedder};
pub use store::{
    cosine_similarity, NewMemory, QueryOptions, QueryResult, SqliteVectorStore, VectorStore,
    DEFAULT_LIMIT, DEFAULT_THRESHOLD,
};
pub use tools::memory_tools;
