// src/api/http/router.rs
// HTTP route composition for the memory service.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;

use super::{
    memories::{
        bulk_delete_memories, create_memory, debug_memories, delete_memory, export_memories,
        list_memories, recall_memories, update_memory,
    },
    namespaces::{delete_namespace, ensure_namespace},
};
use crate::state::AppState;

pub fn http_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(health))

        // Memory lifecycle
        .route("/users/{user_id}/memories", post(create_memory).get(list_memories))
        .route("/users/{user_id}/memories/recall", post(recall_memories))
        .route("/users/{user_id}/memories/bulk-delete", post(bulk_delete_memories))
        .route("/users/{user_id}/memories/export", get(export_memories))
        .route("/users/{user_id}/memories/debug", get(debug_memories))
        .route(
            "/users/{user_id}/memories/{id}",
            axum::routing::patch(update_memory).delete(delete_memory),
        )

        // Namespace admin (internal, collaborator-facing)
        .route(
            "/internal/namespaces/{user_id}",
            put(ensure_namespace).delete(delete_namespace),
        )

        .with_state(app_state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
