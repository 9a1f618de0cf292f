//! One SQLite file holding both conversations and memories.

use std::path::Path;
use std::sync::Arc;

use super::embedder::Embedder;
use super::store::SqliteVectorStore;
use crate::error::Result;
use crate::storage::{Database, SqliteBackend};

/// Shared database for conversation history and the document table.
#[derive(Debug, Clone)]
pub struct VectorDatabase {
    db: Database,
    store: SqliteVectorStore,
}

impl VectorDatabase {
    pub async fn open(path: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::with_database(Database::open(path).await?, embedder).await
    }

    pub async fn open_in_memory(embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::with_database(Database::open_in_memory().await?, embedder).await
    }

    pub async fn with_database(db: Database, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let store = SqliteVectorStore::open(db.clone(), embedder).await?;
        Ok(Self { db, store })
    }

    /// A conversation backend on the same connection.
    pub async fn backend(&self) -> Result<SqliteBackend> {
        SqliteBackend::new(self.db.clone()).await
    }

    pub fn store(&self) -> &SqliteVectorStore {
        &self.store
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::embedder::HashEmbedder;
    use crate::memory::store::{NewMemory, QueryOptions, VectorStore};
    use crate::storage::StorageBackend;
    use crate::types::Message;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn conversations_and_memories_share_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());

        let vdb = VectorDatabase::open(&path, embedder.clone()).await.unwrap();
        let mut backend = vdb.backend().await.unwrap();
        backend.load(None).await.unwrap();
        let id = backend.conversation().unwrap().id.clone();
        let history = vec![Message::user("remember tea"), Message::assistant("ok")];
        backend.add(&history).await.unwrap();
        vdb.store().insert(NewMemory::new("green tea")).await.unwrap();
        drop(backend);
        drop(vdb);

        let vdb = VectorDatabase::open(&path, embedder).await.unwrap();
        let mut backend = vdb.backend().await.unwrap();
        assert_eq!(backend.load(Some(&id)).await.unwrap(), history);
        let hits = vdb
            .store()
            .query("green tea", QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
