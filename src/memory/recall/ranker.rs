// src/memory/recall/ranker.rs
// Ranked retrieval: blend vector similarity with importance and recency,
// falling back to metadata ordering when the vector side cannot help.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::memory::core::error::MemoryError;
use crate::memory::core::traits::VectorIndex;
use crate::memory::core::types::{Memory, MemoryFilter, ScoredMemory};
use crate::memory::features::scoring::MemoryScorer;
use crate::memory::storage::sqlite::SqliteMemoryStore;

#[derive(Debug, Clone)]
pub struct RetrievalRanker {
    scorer: MemoryScorer,
    /// Over-fetch factor: ask the vector index for `k * candidate_multiplier`
    /// neighbors before intersecting with visible records.
    candidate_multiplier: usize,
    vector_timeout: Duration,
}

impl RetrievalRanker {
    pub fn new(scorer: MemoryScorer, candidate_multiplier: usize, vector_timeout: Duration) -> Self {
        Self {
            scorer,
            candidate_multiplier: candidate_multiplier.max(1),
            vector_timeout,
        }
    }

    /// Top-k memories for the user.
    ///
    /// With a query vector: nearest neighbors intersected with visible,
    /// filter-matching records, ordered by composite score. Without one, or
    /// whenever the vector side is absent/unreachable/late: the deterministic
    /// metadata ordering (importance desc, last_accessed desc, created_at desc).
    pub async fn rank(
        &self,
        store: &SqliteMemoryStore,
        vectors: &dyn VectorIndex,
        user_id: &str,
        query: Option<&[f32]>,
        filter: &MemoryFilter,
        k: usize,
    ) -> Result<Vec<ScoredMemory>, MemoryError> {
        let Some(query) = query else {
            return self.metadata_rank(store, user_id, filter, k).await;
        };

        let candidate_count = k.saturating_mul(self.candidate_multiplier);
        let matches = match tokio::time::timeout(
            self.vector_timeout,
            vectors.search(user_id, query, candidate_count),
        )
        .await
        {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                warn!("Vector search failed for user {}: {e:#}; using metadata ranking", user_id);
                return self.metadata_rank(store, user_id, filter, k).await;
            }
            Err(_) => {
                warn!("Vector search timed out for user {}; using metadata ranking", user_id);
                return self.metadata_rank(store, user_id, filter, k).await;
            }
        };

        // An absent or empty namespace yields nothing to rank semantically.
        if matches.is_empty() {
            debug!("No vector candidates for user {}; using metadata ranking", user_id);
            return self.metadata_rank(store, user_id, filter, k).await;
        }

        let ids: Vec<String> = matches.iter().map(|m| m.memory_id.clone()).collect();
        let records = store.fetch_visible_many(user_id, &ids, filter).await?;

        let candidates: Vec<(Memory, f32)> = records
            .into_iter()
            .map(|memory| {
                let similarity = matches
                    .iter()
                    .find(|m| m.memory_id == memory.id)
                    .map(|m| m.similarity)
                    .unwrap_or(0.0);
                (memory, similarity)
            })
            .collect();

        let mut ranked = self.scorer.rank_candidates(candidates, Utc::now());
        ranked.truncate(k);
        Ok(ranked)
    }

    async fn metadata_rank(
        &self,
        store: &SqliteMemoryStore,
        user_id: &str,
        filter: &MemoryFilter,
        k: usize,
    ) -> Result<Vec<ScoredMemory>, MemoryError> {
        let memories = store.list_visible(user_id, filter, k).await?;
        Ok(self.scorer.annotate(memories, Utc::now()))
    }
}
