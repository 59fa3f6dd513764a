// src/sessions/mod.rs

//! Per-session checkpointing for `TriageState`.
//!
//! One row per session, whole-state JSON, replaced atomically at the end of
//! a successful turn. A turn that errors or is abandoned commits nothing, so
//! the next turn always sees either fully the old or fully the new state.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::triage::state::TriageState;

#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub async fn initialize(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Load the last committed state for a session, if any.
    pub async fn load(&self, session_id: &str) -> Result<Option<TriageState>> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT state FROM sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((state,)) => Ok(Some(serde_json::from_str(&state)?)),
            None => Ok(None),
        }
    }

    /// Commit the end-of-turn snapshot. Single-row upsert, so readers never
    /// observe a half-written checklist or fact map.
    pub async fn save(&self, session_id: &str, state: &TriageState) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (session_id, state, updated_at)
             VALUES ($1, $2, $3)
             ON CONFLICT(session_id) DO UPDATE SET
                 state = excluded.state,
                 updated_at = excluded.updated_at",
        )
        .bind(session_id)
        .bind(serde_json::to_string(state)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
