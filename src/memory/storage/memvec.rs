// src/memory/storage/memvec.rs
// Process-local vector index. Backs tests and single-node deployments that
// run without a Qdrant instance; ranking semantics match the real backend.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::memory::core::traits::VectorIndex;
use crate::memory::core::types::VectorMatch;
use crate::memory::features::scoring::cosine_similarity;

#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    namespaces: RwLock<HashMap<String, HashMap<String, Vec<f32>>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn ensure_namespace(&self, user_id: &str) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces.entry(user_id.to_string()).or_default();
        Ok(())
    }

    async fn delete_namespace(&self, user_id: &str) -> Result<u64> {
        let mut namespaces = self.namespaces.write().await;
        let removed = namespaces
            .remove(user_id)
            .map(|vectors| vectors.len() as u64)
            .unwrap_or(0);
        debug!("Deleted in-memory namespace for user {} ({} vectors)", user_id, removed);
        Ok(removed)
    }

    async fn upsert(&self, user_id: &str, memory_id: &str, embedding: &[f32]) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(user_id.to_string())
            .or_default()
            .insert(memory_id.to_string(), embedding.to_vec());
        Ok(())
    }

    async fn search(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorMatch>> {
        let namespaces = self.namespaces.read().await;
        let Some(vectors) = namespaces.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<VectorMatch> = vectors
            .iter()
            .map(|(memory_id, stored)| VectorMatch {
                memory_id: memory_id.clone(),
                similarity: cosine_similarity(embedding, stored),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn delete(&self, user_id: &str, memory_id: &str) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        if let Some(vectors) = namespaces.get_mut(user_id) {
            vectors.remove(memory_id);
        }
        Ok(())
    }

    async fn count(&self, user_id: &str) -> Result<u64> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(user_id)
            .map(|vectors| vectors.len() as u64)
            .unwrap_or(0))
    }
}
