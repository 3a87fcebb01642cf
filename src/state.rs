// src/state.rs

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use crate::config::CONFIG;
use crate::memory::features::embedding::{EmbeddingRetryConfig, OpenAiEmbeddingClient};
use crate::memory::features::scoring::MemoryScorer;
use crate::memory::recall::RetrievalRanker;
use crate::memory::service::MemoryService;
use crate::memory::storage::qdrant::QdrantVectorIndex;
use crate::memory::storage::sqlite::SqliteMemoryStore;

pub struct AppState {
    pub memory: Arc<MemoryService>,
}

impl AppState {
    pub fn new(memory: Arc<MemoryService>) -> Self {
        Self { memory }
    }
}

/// Wire the production stack from CONFIG: SQLite pool (with migrations),
/// Qdrant namespaces, and the OpenAI-compatible embedding client.
pub async fn create_app_state() -> Result<AppState> {
    let pool = SqlitePoolOptions::new()
        .max_connections(CONFIG.sqlite_max_connections)
        .connect(&CONFIG.database_url)
        .await?;

    let store = SqliteMemoryStore::new(pool);
    store.run_migrations().await?;
    let store = Arc::new(store);

    let vectors = Arc::new(QdrantVectorIndex::new(
        &CONFIG.qdrant_url,
        &CONFIG.namespace_prefix,
        CONFIG.embedding_dimensions,
        Duration::from_secs(CONFIG.qdrant_timeout_secs),
    )?);

    let embeddings = Arc::new(OpenAiEmbeddingClient::new(
        &CONFIG.embedding_base_url,
        &CONFIG.embedding_api_key,
        &CONFIG.embedding_model,
        CONFIG.embedding_dimensions,
        Duration::from_secs(CONFIG.embedding_timeout_secs),
    )?);

    let (w_sim, w_imp, w_rec) = CONFIG.recall_weights();
    let scorer = MemoryScorer::with_weights(w_sim, w_imp, w_rec, CONFIG.recall_half_life_hours);
    let ranker = RetrievalRanker::new(
        scorer,
        CONFIG.recall_candidate_multiplier,
        Duration::from_secs(CONFIG.qdrant_timeout_secs),
    );

    let retry = EmbeddingRetryConfig {
        max_attempts: CONFIG.embed_max_attempts,
        backoff_ms: CONFIG.embed_backoff_ms,
    };

    let memory = Arc::new(MemoryService::new(store, vectors, embeddings, ranker, retry));
    info!("Memory service initialized");

    Ok(AppState::new(memory))
}
