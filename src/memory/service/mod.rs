// src/memory/service/mod.rs
//! The lifecycle façade callers talk to. Coordinates the relational store,
//! the per-user vector namespace, and the retrieval ranker.
//!
//! Dual-store writes are a saga, not a transaction: the SQLite write is
//! authoritative and happens first; the vector write is a best-effort
//! follow-up that leaves the record in the unsynced state on failure.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::memory::core::error::MemoryError;
use crate::memory::core::traits::{EmbeddingProvider, VectorIndex};
use crate::memory::core::types::{
    normalize_tags, BulkDeleteSelector, Memory, MemoryFilter, MemoryPatch, MemoryStats,
    NewMemory, ScoredMemory, IMPORTANCE_DEFAULT, IMPORTANCE_MAX, IMPORTANCE_MIN,
};
use crate::memory::features::embedding::{embed_with_retry, EmbeddingRetryConfig};
use crate::memory::recall::RetrievalRanker;
use crate::memory::storage::sqlite::SqliteMemoryStore;

pub struct MemoryService {
    store: Arc<SqliteMemoryStore>,
    vectors: Arc<dyn VectorIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
    ranker: RetrievalRanker,
    retry: EmbeddingRetryConfig,
}

impl MemoryService {
    pub fn new(
        store: Arc<SqliteMemoryStore>,
        vectors: Arc<dyn VectorIndex>,
        embeddings: Arc<dyn EmbeddingProvider>,
        ranker: RetrievalRanker,
        retry: EmbeddingRetryConfig,
    ) -> Self {
        Self {
            store,
            vectors,
            embeddings,
            ranker,
            retry,
        }
    }

    pub fn store(&self) -> &Arc<SqliteMemoryStore> {
        &self.store
    }

    /// Create a memory. The record is persisted unconditionally; the
    /// embedding + namespace write may fail without failing the create.
    pub async fn create(&self, new: NewMemory) -> Result<Memory, MemoryError> {
        new.validate()?;

        let now = Utc::now();
        let mut memory = Memory {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            companion_id: new.companion_id,
            content: new.content,
            tags: normalize_tags(new.tags),
            importance: new.importance.unwrap_or(IMPORTANCE_DEFAULT),
            emotional_context: new.emotional_context,
            user_created: new.user_created,
            is_visible: true,
            vector_synced: false,
            created_at: now,
            last_accessed: now,
        };

        self.store.insert(&memory).await?;

        match self.sync_vector(&memory).await {
            Ok(()) => {
                self.store.set_vector_synced(&memory.id, true).await?;
                memory.vector_synced = true;
            }
            Err(e) => {
                // Degraded to metadata-only storage; the backfill sweep
                // will re-offer embedding later.
                warn!("Vector write for memory {} deferred: {e:#}", memory.id);
            }
        }

        info!(
            "Created memory {} for user {} (synced: {})",
            memory.id, memory.user_id, memory.vector_synced
        );
        Ok(memory)
    }

    /// Apply a partial update to a visible memory owned by the caller.
    /// A content change supersedes the old vector via upsert at the same key.
    pub async fn update(
        &self,
        memory_id: &str,
        caller_user_id: &str,
        patch: MemoryPatch,
    ) -> Result<Memory, MemoryError> {
        let mut memory = self.fetch_owned(memory_id, caller_user_id, true).await?;

        let mut fields = Vec::new();
        if let Some(content) = &patch.content {
            if content.trim().is_empty() {
                fields.push("content".to_string());
            }
        }
        if let Some(importance) = patch.importance {
            if !(IMPORTANCE_MIN..=IMPORTANCE_MAX).contains(&importance) {
                fields.push("importance".to_string());
            }
        }
        if !fields.is_empty() {
            return Err(MemoryError::Validation { fields });
        }

        let content_changed = patch
            .content
            .as_ref()
            .map(|c| *c != memory.content)
            .unwrap_or(false);

        if let Some(content) = patch.content {
            memory.content = content;
        }
        if let Some(tags) = patch.tags {
            memory.tags = normalize_tags(tags);
        }
        if let Some(importance) = patch.importance {
            memory.importance = importance;
        }
        if let Some(emotional_context) = patch.emotional_context {
            memory.emotional_context = Some(emotional_context);
        }
        if content_changed {
            memory.vector_synced = false;
        }

        self.store.update(&memory).await?;

        if content_changed {
            match self.sync_vector(&memory).await {
                Ok(()) => {
                    self.store.set_vector_synced(&memory.id, true).await?;
                    memory.vector_synced = true;
                }
                Err(e) => warn!("Embedding refresh for memory {} deferred: {e:#}", memory.id),
            }
        }

        Ok(memory)
    }

    /// Soft delete: hide from every retrieval path, keep for audit/export.
    /// The vector is left in place; retrieval excludes it by record join.
    pub async fn soft_delete(
        &self,
        memory_id: &str,
        caller_user_id: &str,
    ) -> Result<(), MemoryError> {
        let memory = self.fetch_owned(memory_id, caller_user_id, true).await?;
        self.store.set_visibility(&memory.id, false).await?;
        info!("Soft-deleted memory {} for user {}", memory.id, caller_user_id);
        Ok(())
    }

    /// Bulk soft delete by id list or inclusive date range.
    pub async fn bulk_soft_delete(
        &self,
        user_id: &str,
        selector: BulkDeleteSelector,
    ) -> Result<u64, MemoryError> {
        let deleted = match selector {
            BulkDeleteSelector::Ids(ids) => self.store.soft_delete_ids(user_id, &ids).await?,
            BulkDeleteSelector::DateRange { start, end } => {
                if start > end {
                    return Err(MemoryError::validation("dateRange"));
                }
                self.store.soft_delete_range(user_id, start, end).await?
            }
        };
        info!("Bulk soft-deleted {} memories for user {}", deleted, user_id);
        Ok(deleted)
    }

    /// Hard delete: remove the record and its vector. Works on soft-deleted
    /// records too (permanent erasure).
    pub async fn hard_delete(
        &self,
        memory_id: &str,
        caller_user_id: &str,
    ) -> Result<(), MemoryError> {
        let memory = self.fetch_owned(memory_id, caller_user_id, false).await?;

        self.store.delete(&memory.id).await?;
        if let Err(e) = self.vectors.delete(&memory.user_id, &memory.id).await {
            // Record removal is authoritative; the stray vector disappears
            // with the namespace on account teardown.
            warn!("Vector delete for memory {} failed: {e:#}", memory.id);
        }

        info!("Hard-deleted memory {} for user {}", memory.id, caller_user_id);
        Ok(())
    }

    /// Visible memories in the default metadata ordering. Touches
    /// last_accessed on everything returned.
    pub async fn list(
        &self,
        user_id: &str,
        filter: &MemoryFilter,
        limit: usize,
    ) -> Result<Vec<Memory>, MemoryError> {
        let memories = self.store.list_visible(user_id, filter, limit).await?;
        self.touch_all(memories.iter().map(|m| &m.id)).await?;
        Ok(memories)
    }

    /// Ranked retrieval for prompt injection. `query` is free text from the
    /// current conversation context; embedding failure degrades to metadata
    /// ranking rather than failing the request.
    pub async fn recall(
        &self,
        user_id: &str,
        query: Option<&str>,
        filter: &MemoryFilter,
        k: usize,
    ) -> Result<Vec<ScoredMemory>, MemoryError> {
        let query_vector = match query {
            Some(text) if !text.trim().is_empty() => {
                match embed_with_retry(self.embeddings.as_ref(), text, &self.retry).await {
                    Ok(vector) => Some(vector),
                    Err(e) => {
                        warn!("Query embedding failed ({e}); using metadata ranking");
                        None
                    }
                }
            }
            _ => None,
        };

        self.recall_with_vector(user_id, query_vector.as_deref(), filter, k)
            .await
    }

    /// Ranked retrieval for callers that already hold a query vector.
    pub async fn recall_with_vector(
        &self,
        user_id: &str,
        query: Option<&[f32]>,
        filter: &MemoryFilter,
        k: usize,
    ) -> Result<Vec<ScoredMemory>, MemoryError> {
        let ranked = self
            .ranker
            .rank(&self.store, self.vectors.as_ref(), user_id, query, filter, k)
            .await?;
        self.touch_all(ranked.iter().map(|s| &s.memory.id)).await?;
        Ok(ranked)
    }

    /// Audit/export read: every record, soft-deleted included. No access touch.
    pub async fn export(&self, user_id: &str) -> Result<Vec<Memory>, MemoryError> {
        Ok(self.store.export(user_id).await?)
    }

    /// Recent memories plus provenance breakdown, for operational inspection.
    pub async fn introspect(
        &self,
        user_id: &str,
        n: usize,
    ) -> Result<(Vec<Memory>, MemoryStats), MemoryError> {
        let recent = self.store.recent(user_id, n).await?;
        let stats = self.store.stats(user_id).await?;
        Ok((recent, stats))
    }

    /// Idempotent namespace provisioning. Backend failure surfaces as
    /// BackendUnavailable; callers creating memories treat it as non-fatal.
    pub async fn ensure_namespace(&self, user_id: &str) -> Result<(), MemoryError> {
        self.vectors
            .ensure_namespace(user_id)
            .await
            .map_err(|e| MemoryError::BackendUnavailable(format!("{e:#}")))
    }

    /// Remove the user's namespace and all vectors in it. Failures are
    /// reported explicitly so the caller can retry the cleanup.
    pub async fn delete_namespace(&self, user_id: &str) -> Result<u64, MemoryError> {
        self.vectors
            .delete_namespace(user_id)
            .await
            .map_err(|e| MemoryError::BackendUnavailable(format!("{e:#}")))
    }

    /// Full user-data teardown: every record plus the namespace.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<(u64, u64), MemoryError> {
        let records = self.store.delete_all_for_user(user_id).await?;
        let vectors = self.delete_namespace(user_id).await?;
        info!(
            "Deleted all data for user {}: {} records, {} vectors",
            user_id, records, vectors
        );
        Ok((records, vectors))
    }

    /// One reconciliation pass over unsynced memories. Returns how many
    /// vectors were written.
    pub async fn backfill_unsynced(&self, batch_size: usize) -> Result<usize, MemoryError> {
        let pending = self.store.unsynced(batch_size).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut synced = 0;
        for memory in &pending {
            match self.sync_vector(memory).await {
                Ok(()) => {
                    self.store.set_vector_synced(&memory.id, true).await?;
                    synced += 1;
                }
                Err(e) => debug!("Backfill for memory {} still failing: {e:#}", memory.id),
            }
        }

        Ok(synced)
    }

    /// The vector leg of the saga: ensure the namespace, embed, upsert.
    async fn sync_vector(&self, memory: &Memory) -> anyhow::Result<()> {
        self.vectors.ensure_namespace(&memory.user_id).await?;
        let embedding =
            embed_with_retry(self.embeddings.as_ref(), &memory.content, &self.retry).await?;
        self.vectors
            .upsert(&memory.user_id, &memory.id, &embedding)
            .await?;
        Ok(())
    }

    async fn fetch_owned(
        &self,
        memory_id: &str,
        caller_user_id: &str,
        visible_only: bool,
    ) -> Result<Memory, MemoryError> {
        let found = if visible_only {
            self.store.fetch_visible(memory_id).await?
        } else {
            self.store.fetch(memory_id).await?
        };

        let memory = found.ok_or_else(|| MemoryError::NotFound {
            id: memory_id.to_string(),
        })?;

        if memory.user_id != caller_user_id {
            return Err(MemoryError::Ownership {
                id: memory_id.to_string(),
            });
        }

        Ok(memory)
    }

    async fn touch_all(&self, ids: impl Iterator<Item = &String>) -> Result<(), MemoryError> {
        let ids: Vec<String> = ids.cloned().collect();
        self.store.touch(&ids, Utc::now()).await?;
        Ok(())
    }
}
