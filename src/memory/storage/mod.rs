// src/memory/storage/mod.rs

pub mod memvec;
pub mod qdrant;
pub mod sqlite;
