// src/memory/features/mod.rs

pub mod backfill;
pub mod embedding;
pub mod scoring;
