// src/memory/core/error.rs
// Error taxonomy for the memory subsystem.

/// Memory operation error types
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Malformed or out-of-range input. Never retried.
    #[error("validation failed for fields: {}", fields.join(", "))]
    Validation { fields: Vec<String> },

    /// The targeted record is not owned by the caller.
    #[error("memory {id} is not owned by the caller")]
    Ownership { id: String },

    /// No matching visible record.
    #[error("memory {id} not found")]
    NotFound { id: String },

    /// Vector store or embedding provider unreachable. Most operations
    /// degrade instead of surfacing this; namespace admin does not.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl MemoryError {
    pub fn validation(field: &str) -> Self {
        MemoryError::Validation {
            fields: vec![field.to_string()],
        }
    }
}

/// Embedding provider failures, classified for retry eligibility.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// Network or timeout trouble. Eligible for bounded retry with backoff.
    #[error("transient embedding failure: {0}")]
    Transient(String),

    /// Malformed input, auth/quota exhaustion. Retrying cannot help.
    #[error("permanent embedding failure: {0}")]
    Permanent(String),
}

impl EmbeddingError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbeddingError::Transient(_))
    }
}
