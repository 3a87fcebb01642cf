//! Long-term memory subsystem
//!
//! - Core: types, error taxonomy, and backend trait seams
//! - Features: embedding adapter, composite scoring, backfill sweep
//! - Recall: ranked retrieval with metadata fallback
//! - Storage: SQLite records, Qdrant and in-memory vector namespaces
//! - Service: the lifecycle façade

pub mod core;
pub mod features;
pub mod recall;
pub mod service;
pub mod storage;

// Re-export commonly used items
pub use self::core::{error::*, traits::*, types::*};
pub use self::features::scoring::MemoryScorer;
pub use self::recall::RetrievalRanker;
pub use self::service::MemoryService;
