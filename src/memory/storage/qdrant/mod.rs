// src/memory/storage/qdrant/mod.rs

pub mod store;

pub use store::QdrantVectorIndex;
