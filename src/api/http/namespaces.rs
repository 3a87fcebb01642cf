// src/api/http/namespaces.rs
// Internal namespace admin endpoints. Collaborator-facing, never end-user
// exposed; deletion failures are reported explicitly so the caller can
// schedule a retry of the cleanup.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{api::error::ApiResult, state::AppState};

#[derive(Debug, Serialize)]
struct EnsureOk {
    success: bool,
}

#[derive(Debug, Serialize)]
struct NamespaceDeletion {
    success: bool,
    vectors_deleted: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// PUT /internal/namespaces/{user_id}
pub async fn ensure_namespace(
    State(app): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    app.memory.ensure_namespace(&user_id).await?;
    info!(%user_id, "namespace ensured");
    Ok(Json(EnsureOk { success: true }))
}

/// DELETE /internal/namespaces/{user_id}
pub async fn delete_namespace(
    State(app): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    match app.memory.delete_namespace(&user_id).await {
        Ok(vectors_deleted) => Ok(Json(NamespaceDeletion {
            success: true,
            vectors_deleted,
            error: None,
        })),
        Err(e) => {
            warn!(%user_id, "namespace delete failed: {e}");
            Ok(Json(NamespaceDeletion {
                success: false,
                vectors_deleted: 0,
                error: Some(e.to_string()),
            }))
        }
    }
}
