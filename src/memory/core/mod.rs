// src/memory/core/mod.rs

pub mod error;
pub mod traits;
pub mod types;
