// src/api/http/memories.rs
// Memory CRUD and retrieval endpoints. Identity resolution happens upstream;
// the owning user id arrives in the path.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    api::error::{ApiError, ApiResult},
    config::CONFIG,
    memory::core::types::{
        BulkDeleteSelector, Memory, MemoryFilter, MemoryPatch, MemoryStats, NewMemory,
        ScoredMemory,
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateMemoryPayload {
    pub companion_id: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub importance: Option<i64>,
    pub emotional_context: Option<String>,
    #[serde(default)]
    pub user_created: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListMemoriesQuery {
    pub companion_id: Option<String>,
    /// Comma-separated tag list; any overlap matches.
    pub tags: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl ListMemoriesQuery {
    fn into_filter(self) -> (MemoryFilter, usize) {
        let tags = self.tags.map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });
        let limit = CONFIG.clamp_limit(self.limit);
        (
            MemoryFilter {
                companion_id: self.companion_id,
                tags,
                search: self.search,
            },
            limit,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct RecallPayload {
    /// Free text from the current conversation context. Absent or empty
    /// means pure metadata browsing.
    pub query: Option<String>,
    pub companion_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMemoryQuery {
    /// true = permanent erasure of record and vector
    #[serde(default)]
    pub hard: bool,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeletePayload {
    pub ids: Option<Vec<String>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct BulkDeleteOk {
    ok: bool,
    deleted: u64,
}

#[derive(Debug, Serialize)]
struct DeleteOk {
    ok: bool,
    id: String,
}

#[derive(Debug, Serialize)]
struct Introspection {
    recent: Vec<Memory>,
    stats: MemoryStats,
}

/// POST /users/{user_id}/memories
pub async fn create_memory(
    State(app): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<CreateMemoryPayload>,
) -> ApiResult<impl IntoResponse> {
    let memory = app
        .memory
        .create(NewMemory {
            user_id,
            companion_id: payload.companion_id,
            content: payload.content,
            tags: payload.tags,
            importance: payload.importance,
            emotional_context: payload.emotional_context,
            user_created: payload.user_created,
        })
        .await?;

    Ok(Json(memory))
}

/// GET /users/{user_id}/memories
pub async fn list_memories(
    State(app): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<ListMemoriesQuery>,
) -> ApiResult<impl IntoResponse> {
    let (filter, limit) = query.into_filter();
    let memories = app.memory.list(&user_id, &filter, limit).await?;
    Ok(Json(memories))
}

/// POST /users/{user_id}/memories/recall
pub async fn recall_memories(
    State(app): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<RecallPayload>,
) -> ApiResult<Json<Vec<ScoredMemory>>> {
    let filter = MemoryFilter {
        companion_id: payload.companion_id,
        tags: (!payload.tags.is_empty()).then_some(payload.tags),
        search: None,
    };
    let k = CONFIG.clamp_limit(payload.limit);

    let ranked = app
        .memory
        .recall(&user_id, payload.query.as_deref(), &filter, k)
        .await?;
    Ok(Json(ranked))
}

/// PATCH /users/{user_id}/memories/{id}
pub async fn update_memory(
    State(app): State<Arc<AppState>>,
    Path((user_id, id)): Path<(String, String)>,
    Json(patch): Json<MemoryPatch>,
) -> ApiResult<impl IntoResponse> {
    if patch.is_empty() {
        return Err(ApiError::bad_request("no fields to update"));
    }
    let memory = app.memory.update(&id, &user_id, patch).await?;
    Ok(Json(memory))
}

/// DELETE /users/{user_id}/memories/{id}   (?hard=true for permanent erasure)
pub async fn delete_memory(
    State(app): State<Arc<AppState>>,
    Path((user_id, id)): Path<(String, String)>,
    Query(query): Query<DeleteMemoryQuery>,
) -> ApiResult<impl IntoResponse> {
    if query.hard {
        app.memory.hard_delete(&id, &user_id).await?;
    } else {
        app.memory.soft_delete(&id, &user_id).await?;
    }
    Ok(Json(DeleteOk { ok: true, id }))
}

/// POST /users/{user_id}/memories/bulk-delete
///
/// Exactly one selector: an explicit id list, or an inclusive date range.
pub async fn bulk_delete_memories(
    State(app): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<BulkDeletePayload>,
) -> ApiResult<impl IntoResponse> {
    let selector = match (payload.ids, payload.start, payload.end) {
        (Some(ids), None, None) => BulkDeleteSelector::Ids(ids),
        (None, Some(start), Some(end)) => BulkDeleteSelector::DateRange { start, end },
        _ => {
            return Err(ApiError::bad_request(
                "supply either ids or a start/end date range, not both",
            ))
        }
    };

    let deleted = app.memory.bulk_soft_delete(&user_id, selector).await?;
    info!(%user_id, deleted, "bulk soft delete");
    Ok(Json(BulkDeleteOk { ok: true, deleted }))
}

/// GET /users/{user_id}/memories/export — audit read, soft-deleted included.
pub async fn export_memories(
    State(app): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let memories = app.memory.export(&user_id).await?;
    Ok(Json(memories))
}

/// GET /users/{user_id}/memories/debug — recent memories with provenance
/// breakdown. Operational use only.
pub async fn debug_memories(
    State(app): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let (recent, stats) = app.memory.introspect(&user_id, 20).await?;
    Ok(Json(Introspection { recent, stats }))
}
