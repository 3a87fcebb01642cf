// src/memory/recall/mod.rs

pub mod ranker;

pub use ranker::RetrievalRanker;
