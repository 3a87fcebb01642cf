// src/api/http/mod.rs

pub mod memories;
pub mod namespaces;
pub mod router;

pub use router::http_router;
