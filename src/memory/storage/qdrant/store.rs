// src/memory/storage/qdrant/store.rs
// Qdrant-backed vector index with one collection per user namespace.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::memory::core::traits::VectorIndex;
use crate::memory::core::types::VectorMatch;

/// Speaks the Qdrant REST API. Namespaces map to collections named
/// `{prefix}-{user_id}`; point ids are the memory UUIDs.
#[derive(Debug, Clone)]
pub struct QdrantVectorIndex {
    client: Client,
    base_url: String,
    prefix: String,
    dimensions: usize,
}

impl QdrantVectorIndex {
    pub fn new(url: &str, prefix: &str, dimensions: usize, timeout: Duration) -> Result<Self> {
        let client = Client::builder().http1_only().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            prefix: prefix.to_string(),
            dimensions,
        })
    }

    fn collection_name(&self, user_id: &str) -> String {
        format!("{}-{}", self.prefix, user_id)
    }

    fn collection_url(&self, user_id: &str) -> String {
        format!("{}/collections/{}", self.base_url, self.collection_name(user_id))
    }

    async fn collection_exists(&self, user_id: &str) -> Result<bool> {
        let resp = self.client.get(self.collection_url(user_id)).send().await?;
        Ok(resp.status().is_success())
    }

    /// Exact point count, or zero when the collection is absent.
    async fn count_points(&self, user_id: &str) -> Result<u64> {
        let count_url = format!("{}/points/count", self.collection_url(user_id));
        let response = self
            .client
            .post(&count_url)
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !response.status().is_success() {
            return Err(anyhow!(
                "Qdrant count failed: {}",
                response.text().await.unwrap_or_default()
            ));
        }

        let result: Value = response.json().await?;
        Ok(result["result"]["count"].as_u64().unwrap_or(0))
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn ensure_namespace(&self, user_id: &str) -> Result<()> {
        if self.collection_exists(user_id).await? {
            debug!("Namespace for user {} already exists", user_id);
            return Ok(());
        }

        info!("Provisioning vector namespace for user {}", user_id);
        let create_body = json!({
            "vectors": {
                "size": self.dimensions,
                "distance": "Cosine"
            }
        });

        let resp = self
            .client
            .put(self.collection_url(user_id))
            .json(&create_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            // A concurrent caller may have won the provisioning race.
            if error_text.contains("already exists") || self.collection_exists(user_id).await? {
                debug!("Namespace for user {} provisioned concurrently", user_id);
                return Ok(());
            }
            return Err(anyhow!("Failed to create namespace: {}", error_text));
        }

        Ok(())
    }

    async fn delete_namespace(&self, user_id: &str) -> Result<u64> {
        let removed = self.count_points(user_id).await?;

        let resp = self.client.delete(self.collection_url(user_id)).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !resp.status().is_success() {
            return Err(anyhow!(
                "Qdrant namespace delete failed: {}",
                resp.text().await.unwrap_or_default()
            ));
        }

        info!("Deleted namespace for user {} ({} vectors)", user_id, removed);
        Ok(removed)
    }

    async fn upsert(&self, user_id: &str, memory_id: &str, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(anyhow!(
                "Embedding dimension {} does not match index dimension {}",
                embedding.len(),
                self.dimensions
            ));
        }

        let upsert_url = format!("{}/points?wait=true", self.collection_url(user_id));
        let upsert_body = json!({
            "points": [
                {
                    "id": memory_id,
                    "vector": embedding,
                    "payload": { "user_id": user_id }
                }
            ]
        });

        let response = self.client.put(&upsert_url).json(&upsert_body).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Qdrant upsert failed: {}",
                response.text().await.unwrap_or_default()
            ));
        }

        debug!(
            "Upserted vector {} into namespace {}",
            memory_id,
            self.collection_name(user_id)
        );
        Ok(())
    }

    async fn search(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorMatch>> {
        let search_url = format!("{}/points/search", self.collection_url(user_id));
        let search_body = json!({
            "vector": embedding,
            "limit": limit,
            "with_payload": false
        });

        let response = self.client.post(&search_url).json(&search_body).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Qdrant search failed: {}",
                response.text().await.unwrap_or_default()
            ));
        }

        let result: Value = response.json().await?;
        let mut matches = Vec::new();
        if let Some(points) = result["result"].as_array() {
            for point in points {
                let id = point["id"].as_str().map(str::to_string);
                let score = point["score"].as_f64().map(|s| s as f32);
                if let (Some(memory_id), Some(similarity)) = (id, score) {
                    matches.push(VectorMatch { memory_id, similarity });
                }
            }
        }

        debug!(
            "Found {} neighbors in namespace {}",
            matches.len(),
            self.collection_name(user_id)
        );
        Ok(matches)
    }

    async fn delete(&self, user_id: &str, memory_id: &str) -> Result<()> {
        let delete_url = format!("{}/points/delete?wait=true", self.collection_url(user_id));
        let delete_body = json!({ "points": [memory_id] });

        let response = self.client.post(&delete_url).json(&delete_body).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            // Namespace never provisioned; nothing to remove.
            warn!(
                "Vector delete for {} hit absent namespace {}",
                memory_id,
                self.collection_name(user_id)
            );
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(anyhow!(
                "Qdrant delete failed: {}",
                response.text().await.unwrap_or_default()
            ));
        }

        debug!(
            "Deleted vector {} from namespace {}",
            memory_id,
            self.collection_name(user_id)
        );
        Ok(())
    }

    async fn count(&self, user_id: &str) -> Result<u64> {
        self.count_points(user_id).await
    }
}
