// src/memory/storage/sqlite/migration.rs
//! Ensures the memories schema matches the latest layout.
//! Run this at startup before any store operation.

use anyhow::Result;
use sqlx::SqlitePool;

/// Latest schema for memories. Add columns here as fields evolve.
const CREATE_MEMORIES: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    companion_id TEXT NOT NULL,
    content TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    importance INTEGER NOT NULL DEFAULT 5 CHECK (importance BETWEEN 1 AND 10),
    emotional_context TEXT,
    user_created BOOLEAN NOT NULL DEFAULT 0,
    is_visible BOOLEAN NOT NULL DEFAULT 1,
    vector_synced BOOLEAN NOT NULL DEFAULT 0,
    created_at DATETIME NOT NULL,
    last_accessed DATETIME NOT NULL
);
"#;

const CREATE_MEMORY_INDICES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_memories_user_visible ON memories(user_id, is_visible);
CREATE INDEX IF NOT EXISTS idx_memories_user_created_at ON memories(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_memories_unsynced ON memories(vector_synced) WHERE vector_synced = 0;
"#;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(CREATE_MEMORIES).execute(pool).await?;
    for statement in CREATE_MEMORY_INDICES.split(';') {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement).execute(pool).await?;
        }
    }
    Ok(())
}
