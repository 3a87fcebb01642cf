// src/memory/storage/sqlite/store.rs
// Durable metadata store for memories. All retrieval paths go through
// list_visible/fetch_visible_many so the visibility predicate lives in one place.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

use crate::memory::core::types::{Memory, MemoryFilter, MemoryStats};
use crate::memory::storage::sqlite::migration;

#[derive(Debug, Clone)]
pub struct SqliteMemoryStore {
    pub pool: SqlitePool,
}

const MEMORY_COLUMNS: &str = "id, user_id, companion_id, content, tags, importance, \
     emotional_context, user_created, is_visible, vector_synced, created_at, last_accessed";

impl SqliteMemoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        migration::run_migrations(&self.pool).await
    }

    pub async fn insert(&self, memory: &Memory) -> Result<(), sqlx::Error> {
        let tags_json =
            serde_json::to_string(&memory.tags).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO memories (
                id, user_id, companion_id, content, tags, importance,
                emotional_context, user_created, is_visible, vector_synced,
                created_at, last_accessed
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&memory.id)
        .bind(&memory.user_id)
        .bind(&memory.companion_id)
        .bind(&memory.content)
        .bind(tags_json)
        .bind(memory.importance)
        .bind(&memory.emotional_context)
        .bind(memory.user_created)
        .bind(memory.is_visible)
        .bind(memory.vector_synced)
        .bind(memory.created_at.naive_utc())
        .bind(memory.last_accessed.naive_utc())
        .execute(&self.pool)
        .await?;

        debug!("Inserted memory {} for user {}", memory.id, memory.user_id);
        Ok(())
    }

    /// Fetch by id regardless of visibility (audit and hard-delete paths).
    pub async fn fetch(&self, id: &str) -> Result<Option<Memory>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_memory(&r)))
    }

    /// Fetch a visible memory by id.
    pub async fn fetch_visible(&self, id: &str) -> Result<Option<Memory>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ? AND is_visible = 1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_memory(&r)))
    }

    /// Persist the mutable fields of an updated memory.
    pub async fn update(&self, memory: &Memory) -> Result<(), sqlx::Error> {
        let tags_json =
            serde_json::to_string(&memory.tags).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            UPDATE memories
            SET content = ?, tags = ?, importance = ?, emotional_context = ?,
                vector_synced = ?
            WHERE id = ?
            "#,
        )
        .bind(&memory.content)
        .bind(tags_json)
        .bind(memory.importance)
        .bind(&memory.emotional_context)
        .bind(memory.vector_synced)
        .bind(&memory.id)
        .execute(&self.pool)
        .await?;

        debug!("Updated memory {}", memory.id);
        Ok(())
    }

    pub async fn set_vector_synced(&self, id: &str, synced: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE memories SET vector_synced = ? WHERE id = ?")
            .bind(synced)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_visibility(&self, id: &str, visible: bool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE memories SET is_visible = ? WHERE id = ?")
            .bind(visible)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Soft delete by explicit id list, scoped to the owner. Returns the
    /// number of memories newly hidden.
    pub async fn soft_delete_ids(
        &self,
        user_id: &str,
        ids: &[String],
    ) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "UPDATE memories SET is_visible = 0 \
             WHERE user_id = ? AND is_visible = 1 AND id IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql).bind(user_id);
        for id in ids {
            query = query.bind(id);
        }
        let result = query.execute(&self.pool).await?;

        debug!("Soft-deleted {} memories for user {}", result.rows_affected(), user_id);
        Ok(result.rows_affected())
    }

    /// Soft delete by inclusive created_at range, scoped to the owner.
    pub async fn soft_delete_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE memories SET is_visible = 0
            WHERE user_id = ? AND is_visible = 1
              AND created_at BETWEEN ? AND ?
            "#,
        )
        .bind(user_id)
        .bind(start.naive_utc())
        .bind(end.naive_utc())
        .execute(&self.pool)
        .await?;

        debug!(
            "Soft-deleted {} memories for user {} in [{}, {}]",
            result.rows_affected(),
            user_id,
            start,
            end
        );
        Ok(result.rows_affected())
    }

    /// Hard delete a single record. Returns the number of rows removed.
    pub async fn delete(&self, id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM memories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Hard delete every record for a user (account teardown).
    pub async fn delete_all_for_user(&self, user_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM memories WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Visible memories matching the filter, in the default metadata order:
    /// importance desc, last_accessed desc, created_at desc.
    ///
    /// Tag overlap is evaluated in Rust after SQL narrowing, so the SQL limit
    /// is only applied when no tag filter is present.
    pub async fn list_visible(
        &self,
        user_id: &str,
        filter: &MemoryFilter,
        limit: usize,
    ) -> Result<Vec<Memory>, sqlx::Error> {
        let mut sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE user_id = ? AND is_visible = 1"
        );
        if filter.companion_id.is_some() {
            sql.push_str(" AND companion_id = ?");
        }
        if filter.search.is_some() {
            sql.push_str(" AND LOWER(content) LIKE '%' || ? || '%'");
        }
        sql.push_str(" ORDER BY importance DESC, last_accessed DESC, created_at DESC");
        let sql_limit = filter.tags.is_none();
        if sql_limit {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query(&sql).bind(user_id);
        if let Some(companion_id) = &filter.companion_id {
            query = query.bind(companion_id);
        }
        if let Some(search) = &filter.search {
            query = query.bind(search.to_lowercase());
        }
        if sql_limit {
            query = query.bind(limit as i64);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let memories: Vec<Memory> = rows
            .iter()
            .map(row_to_memory)
            .filter(|m| filter.matches_tags(&m.tags))
            .take(limit)
            .collect();

        debug!("Listed {} visible memories for user {}", memories.len(), user_id);
        Ok(memories)
    }

    /// Visible memories among `ids` matching the filter (vector candidate
    /// intersection). Order is not meaningful here; the ranker re-sorts.
    pub async fn fetch_visible_many(
        &self,
        user_id: &str,
        ids: &[String],
        filter: &MemoryFilter,
    ) -> Result<Vec<Memory>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let mut sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories \
             WHERE user_id = ? AND is_visible = 1 AND id IN ({placeholders})"
        );
        if filter.companion_id.is_some() {
            sql.push_str(" AND companion_id = ?");
        }
        if filter.search.is_some() {
            sql.push_str(" AND LOWER(content) LIKE '%' || ? || '%'");
        }

        let mut query = sqlx::query(&sql).bind(user_id);
        for id in ids {
            query = query.bind(id);
        }
        if let Some(companion_id) = &filter.companion_id {
            query = query.bind(companion_id);
        }
        if let Some(search) = &filter.search {
            query = query.bind(search.to_lowercase());
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(row_to_memory)
            .filter(|m| filter.matches_tags(&m.tags))
            .collect())
    }

    /// Every record for a user, visible or not, newest first (audit/export).
    pub async fn export(&self, user_id: &str) -> Result<Vec<Memory>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE user_id = ? ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_memory).collect())
    }

    /// Update last_accessed for a set of returned memories.
    pub async fn touch(&self, ids: &[String], now: DateTime<Utc>) -> Result<(), sqlx::Error> {
        if ids.is_empty() {
            return Ok(());
        }

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("UPDATE memories SET last_accessed = ? WHERE id IN ({placeholders})");

        let mut query = sqlx::query(&sql).bind(now.naive_utc());
        for id in ids {
            query = query.bind(id);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    /// Visible memories still owed a vector write, oldest first.
    pub async fn unsynced(&self, limit: usize) -> Result<Vec<Memory>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories \
             WHERE vector_synced = 0 AND is_visible = 1 \
             ORDER BY created_at ASC LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_memory).collect())
    }

    /// The most recent visible memories for a user, for introspection.
    pub async fn recent(&self, user_id: &str, n: usize) -> Result<Vec<Memory>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories \
             WHERE user_id = ? AND is_visible = 1 \
             ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_memory).collect())
    }

    /// Provenance and sync-state breakdown for a user.
    pub async fn stats(&self, user_id: &str) -> Result<MemoryStats, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(is_visible), 0) AS visible,
                COALESCE(SUM(CASE WHEN is_visible = 1 AND user_created = 1 THEN 1 ELSE 0 END), 0) AS user_authored,
                COALESCE(SUM(CASE WHEN is_visible = 1 AND user_created = 0 THEN 1 ELSE 0 END), 0) AS inferred,
                COALESCE(SUM(CASE WHEN vector_synced = 0 THEN 1 ELSE 0 END), 0) AS unsynced
            FROM memories
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(MemoryStats {
            total: row.get::<i64, _>("total") as u64,
            visible: row.get::<i64, _>("visible") as u64,
            user_authored: row.get::<i64, _>("user_authored") as u64,
            inferred: row.get::<i64, _>("inferred") as u64,
            unsynced: row.get::<i64, _>("unsynced") as u64,
        })
    }
}

fn row_to_memory(row: &SqliteRow) -> Memory {
    let tags_json: String = row.get("tags");
    let tags = serde_json::from_str::<Vec<String>>(&tags_json).unwrap_or_default();

    let created_at: NaiveDateTime = row.get("created_at");
    let last_accessed: NaiveDateTime = row.get("last_accessed");

    Memory {
        id: row.get("id"),
        user_id: row.get("user_id"),
        companion_id: row.get("companion_id"),
        content: row.get("content"),
        tags,
        importance: row.get("importance"),
        emotional_context: row.get("emotional_context"),
        user_created: row.get("user_created"),
        is_visible: row.get("is_visible"),
        vector_synced: row.get("vector_synced"),
        created_at: Utc.from_utc_datetime(&created_at),
        last_accessed: Utc.from_utc_datetime(&last_accessed),
    }
}
