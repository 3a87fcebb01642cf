// tests/common/mod.rs
// Shared fixtures: in-memory stores and deterministic fakes for the two
// external collaborators.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;

use keepsake::memory::core::error::EmbeddingError;
use keepsake::memory::core::traits::{EmbeddingProvider, VectorIndex};
use keepsake::memory::core::types::{NewMemory, VectorMatch};
use keepsake::memory::features::embedding::EmbeddingRetryConfig;
use keepsake::memory::features::scoring::MemoryScorer;
use keepsake::memory::recall::RetrievalRanker;
use keepsake::memory::service::MemoryService;
use keepsake::memory::storage::memvec::InMemoryVectorIndex;
use keepsake::memory::storage::sqlite::SqliteMemoryStore;

pub const DIMS: usize = 32;

/// Deterministic embedder: every distinct text gets its own orthogonal axis,
/// so identical texts have similarity 1.0 and different texts 0.0.
pub struct OrthoEmbedder {
    seen: Mutex<HashMap<String, usize>>,
}

impl OrthoEmbedder {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OrthoEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut seen = self.seen.lock().unwrap();
        let next = seen.len();
        let axis = *seen.entry(text.to_string()).or_insert(next);
        assert!(axis < DIMS, "test embedder ran out of axes");

        let mut vector = vec![0.0; DIMS];
        vector[axis] = 1.0;
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        DIMS
    }
}

/// Embedding provider that always fails permanently.
pub struct BrokenEmbedder;

#[async_trait]
impl EmbeddingProvider for BrokenEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Permanent("embedding backend refused".to_string()))
    }

    fn dimensions(&self) -> usize {
        DIMS
    }
}

/// Vector index whose backend is unreachable.
pub struct DownVectorIndex;

#[async_trait]
impl VectorIndex for DownVectorIndex {
    async fn ensure_namespace(&self, _user_id: &str) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("vector backend unreachable"))
    }

    async fn delete_namespace(&self, _user_id: &str) -> anyhow::Result<u64> {
        Err(anyhow::anyhow!("vector backend unreachable"))
    }

    async fn upsert(
        &self,
        _user_id: &str,
        _memory_id: &str,
        _embedding: &[f32],
    ) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("vector backend unreachable"))
    }

    async fn search(
        &self,
        _user_id: &str,
        _embedding: &[f32],
        _limit: usize,
    ) -> anyhow::Result<Vec<VectorMatch>> {
        Err(anyhow::anyhow!("vector backend unreachable"))
    }

    async fn delete(&self, _user_id: &str, _memory_id: &str) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("vector backend unreachable"))
    }

    async fn count(&self, _user_id: &str) -> anyhow::Result<u64> {
        Err(anyhow::anyhow!("vector backend unreachable"))
    }
}

/// Vector index whose writes succeed but whose search never answers within
/// any reasonable deadline.
pub struct StalledSearchIndex;

#[async_trait]
impl VectorIndex for StalledSearchIndex {
    async fn ensure_namespace(&self, _user_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn delete_namespace(&self, _user_id: &str) -> anyhow::Result<u64> {
        Ok(0)
    }

    async fn upsert(
        &self,
        _user_id: &str,
        _memory_id: &str,
        _embedding: &[f32],
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn search(
        &self,
        _user_id: &str,
        _embedding: &[f32],
        _limit: usize,
    ) -> anyhow::Result<Vec<VectorMatch>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }

    async fn delete(&self, _user_id: &str, _memory_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn count(&self, _user_id: &str) -> anyhow::Result<u64> {
        Ok(0)
    }
}

pub struct TestContext {
    pub service: Arc<MemoryService>,
    pub store: Arc<SqliteMemoryStore>,
    pub vectors: Arc<InMemoryVectorIndex>,
}

pub async fn memory_store() -> Arc<SqliteMemoryStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to create in-memory SQLite pool");

    let store = SqliteMemoryStore::new(pool);
    store.run_migrations().await.unwrap();
    Arc::new(store)
}

pub fn fast_retry() -> EmbeddingRetryConfig {
    EmbeddingRetryConfig {
        max_attempts: 2,
        backoff_ms: 1,
    }
}

pub fn build_service(
    store: Arc<SqliteMemoryStore>,
    vectors: Arc<dyn VectorIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
    scorer: MemoryScorer,
) -> Arc<MemoryService> {
    let ranker = RetrievalRanker::new(scorer, 3, Duration::from_secs(2));
    Arc::new(MemoryService::new(
        store,
        vectors,
        embeddings,
        ranker,
        fast_retry(),
    ))
}

/// A healthy service: in-memory SQLite, in-memory vector index, orthogonal
/// embedder, default scoring weights.
pub async fn setup() -> TestContext {
    setup_with_scorer(MemoryScorer::new()).await
}

pub async fn setup_with_scorer(scorer: MemoryScorer) -> TestContext {
    let store = memory_store().await;
    let vectors = Arc::new(InMemoryVectorIndex::new());
    let service = build_service(
        store.clone(),
        vectors.clone(),
        Arc::new(OrthoEmbedder::new()),
        scorer,
    );
    TestContext {
        service,
        store,
        vectors,
    }
}

pub fn new_memory(user_id: &str, content: &str, tags: &[&str], importance: Option<i64>) -> NewMemory {
    NewMemory {
        user_id: user_id.to_string(),
        companion_id: "companion-1".to_string(),
        content: content.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        importance,
        emotional_context: None,
        user_created: false,
    }
}
