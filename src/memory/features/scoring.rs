// src/memory/features/scoring.rs
// Composite scoring: semantic similarity, importance, and recency decay.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::memory::core::types::{Memory, ScoredMemory, IMPORTANCE_MAX};

/// Weighted scorer for ranked retrieval.
#[derive(Debug, Clone)]
pub struct MemoryScorer {
    similarity_weight: f32,
    importance_weight: f32,
    recency_weight: f32,
    half_life_hours: f32,
}

impl MemoryScorer {
    pub fn new() -> Self {
        Self {
            similarity_weight: 0.5,
            importance_weight: 0.3,
            recency_weight: 0.2,
            half_life_hours: 24.0,
        }
    }

    /// Custom weights, normalized so they sum to 1.0.
    pub fn with_weights(
        similarity: f32,
        importance: f32,
        recency: f32,
        half_life_hours: f32,
    ) -> Self {
        let total = similarity + importance + recency;
        Self {
            similarity_weight: similarity / total,
            importance_weight: importance / total,
            recency_weight: recency / total,
            half_life_hours,
        }
    }

    /// Exponential decay on time since last access: e^(-ln2/half_life * age).
    pub fn recency_score(&self, last_accessed: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
        let age_hours = now
            .signed_duration_since(last_accessed)
            .num_seconds()
            .max(0) as f32
            / 3600.0;
        let lambda = std::f32::consts::LN_2 / self.half_life_hours;
        (-lambda * age_hours).exp()
    }

    pub fn composite_score(&self, memory: &Memory, similarity: f32, now: DateTime<Utc>) -> f32 {
        let importance = memory.importance as f32 / IMPORTANCE_MAX as f32;
        let recency = self.recency_score(memory.last_accessed, now);

        self.similarity_weight * similarity
            + self.importance_weight * importance
            + self.recency_weight * recency
    }

    /// Score similarity-annotated candidates and sort by composite score
    /// descending, breaking ties by created_at descending.
    pub fn rank_candidates(
        &self,
        candidates: Vec<(Memory, f32)>,
        now: DateTime<Utc>,
    ) -> Vec<ScoredMemory> {
        let mut scored: Vec<ScoredMemory> = candidates
            .into_iter()
            .map(|(memory, similarity)| {
                let importance_score = memory.importance as f32 / IMPORTANCE_MAX as f32;
                let recency_score = self.recency_score(memory.last_accessed, now);
                let composite_score = self.composite_score(&memory, similarity, now);
                ScoredMemory {
                    memory,
                    similarity,
                    importance_score,
                    recency_score,
                    composite_score,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.composite_score
                .partial_cmp(&a.composite_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
        });

        if let (Some(first), Some(last)) = (scored.first(), scored.last()) {
            debug!(
                "Ranked {} candidates - top {:.3}, bottom {:.3}",
                scored.len(),
                first.composite_score,
                last.composite_score
            );
        }

        scored
    }

    /// Annotate without reordering, for the metadata-only path where the
    /// deterministic importance/recency ordering must be preserved.
    pub fn annotate(&self, memories: Vec<Memory>, now: DateTime<Utc>) -> Vec<ScoredMemory> {
        memories
            .into_iter()
            .map(|memory| {
                let importance_score = memory.importance as f32 / IMPORTANCE_MAX as f32;
                let recency_score = self.recency_score(memory.last_accessed, now);
                let composite_score = self.composite_score(&memory, 0.0, now);
                ScoredMemory {
                    memory,
                    similarity: 0.0,
                    importance_score,
                    recency_score,
                    composite_score,
                }
            })
            .collect()
    }
}

impl Default for MemoryScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity between two vectors; zero for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
