// src/memory/core/traits.rs

//! Trait seams for the two external collaborators: the vector index and the
//! embedding provider. The lifecycle service and the ranker only ever talk to
//! these traits, never to a concrete backend.

use async_trait::async_trait;

use crate::memory::core::error::EmbeddingError;
use crate::memory::core::types::VectorMatch;

/// An isolated, per-user partition of a vector index.
///
/// Implementations must make `ensure_namespace` idempotent and safe under
/// concurrent first-use races, and `delete_namespace` idempotent (deleting an
/// absent namespace succeeds with a zero count).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Provision the user's namespace if it does not exist yet.
    async fn ensure_namespace(&self, user_id: &str) -> anyhow::Result<()>;

    /// Remove the namespace and everything in it. Returns the number of
    /// vectors that were removed.
    async fn delete_namespace(&self, user_id: &str) -> anyhow::Result<u64>;

    /// Write (or overwrite) the vector stored under `memory_id`.
    async fn upsert(&self, user_id: &str, memory_id: &str, embedding: &[f32]) -> anyhow::Result<()>;

    /// Top-`limit` nearest neighbors by cosine similarity.
    async fn search(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<VectorMatch>>;

    /// Remove a single vector. Removing an absent vector is not an error.
    async fn delete(&self, user_id: &str, memory_id: &str) -> anyhow::Result<()>;

    /// Number of vectors currently stored in the user's namespace.
    async fn count(&self, user_id: &str) -> anyhow::Result<u64>;
}

/// Maps text to a fixed-dimension vector. The dimension must stay constant
/// for the lifetime of the index; changing it requires a full re-index.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn dimensions(&self) -> usize;
}
