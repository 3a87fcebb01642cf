// src/memory/core/types.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::core::error::MemoryError;

pub const IMPORTANCE_MIN: i64 = 1;
pub const IMPORTANCE_MAX: i64 = 10;
pub const IMPORTANCE_DEFAULT: i64 = 5;

/// One remembered fact about a user. The SQLite row is the source of truth;
/// the vector in the user's namespace is a derived index entry keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub user_id: String,
    pub companion_id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub importance: i64,
    pub emotional_context: Option<String>,
    /// true = explicitly authored by the user, false = inferred by the pipeline
    pub user_created: bool,
    /// Soft-delete flag. Invisible memories never surface in list/search/recall.
    pub is_visible: bool,
    /// false while the embedding write is still owed to the vector index
    pub vector_synced: bool,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// Input for creating a memory.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMemory {
    pub user_id: String,
    pub companion_id: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub importance: Option<i64>,
    pub emotional_context: Option<String>,
    #[serde(default)]
    pub user_created: bool,
}

impl NewMemory {
    pub fn validate(&self) -> Result<(), MemoryError> {
        let mut fields = Vec::new();
        if self.content.trim().is_empty() {
            fields.push("content".to_string());
        }
        if let Some(importance) = self.importance {
            if !(IMPORTANCE_MIN..=IMPORTANCE_MAX).contains(&importance) {
                fields.push("importance".to_string());
            }
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(MemoryError::Validation { fields })
        }
    }
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryPatch {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub importance: Option<i64>,
    pub emotional_context: Option<String>,
}

impl MemoryPatch {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.tags.is_none()
            && self.importance.is_none()
            && self.emotional_context.is_none()
    }
}

/// Explicit filter options for list/search.
///
/// Combination semantics: AND across categories, OR within `tags`
/// (a memory matches when it carries at least one of the requested tags).
/// `search` is a case-insensitive substring match on content.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    pub companion_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub search: Option<String>,
}

impl MemoryFilter {
    pub fn matches_tags(&self, memory_tags: &[String]) -> bool {
        match &self.tags {
            Some(wanted) if !wanted.is_empty() => {
                memory_tags.iter().any(|t| wanted.iter().any(|w| w == t))
            }
            _ => true,
        }
    }
}

/// Selector for bulk soft delete. Exactly one variant per request; the
/// combined mode is deliberately unsupported.
#[derive(Debug, Clone)]
pub enum BulkDeleteSelector {
    Ids(Vec<String>),
    /// Inclusive on both ends.
    DateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// A single nearest-neighbor hit from the vector index.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub memory_id: String,
    pub similarity: f32,
}

/// A ranked memory with its scoring components, for prompt injection or UI.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub similarity: f32,
    pub importance_score: f32,
    pub recency_score: f32,
    pub composite_score: f32,
}

/// Per-user counts surfaced by the introspection endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: u64,
    pub visible: u64,
    pub user_authored: u64,
    pub inferred: u64,
    pub unsynced: u64,
}

/// Dedupe tags while preserving first-seen order, dropping empties.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
