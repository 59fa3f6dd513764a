// src/store/sqlite.rs
// JSON documents over SQLite. One table keyed by (collection, id), record
// body stored as JSON text and filtered with json_extract.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use uuid::Uuid;

use super::DocumentStore;

/// Create the SQLite connection pool shared by the document and session stores.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {}", e))
}

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Create the store and make sure its table exists.
    pub async fn initialize(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    async fn insert(&self, collection: &str, id: &str, record: &Value) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO documents (collection, id, data, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)",
        )
        .bind(collection)
        .bind(id)
        .bind(record.to_string())
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Merge `partial`'s top-level fields into `base`.
fn merge_fields(base: &mut Value, partial: Value) {
    if let (Some(base_map), Value::Object(partial_map)) = (base.as_object_mut(), partial) {
        for (key, value) in partial_map {
            base_map.insert(key, value);
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create(&self, collection: &str, mut record: Value) -> Result<String> {
        let id = record
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if let Some(map) = record.as_object_mut() {
            map.insert("id".to_string(), Value::String(id.clone()));
        }

        self.insert(collection, &id, &record).await?;
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT data FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((data,)) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<()> {
        let mut record = self
            .get(collection, id)
            .await?
            .ok_or_else(|| anyhow!("no record {} in collection {}", id, collection))?;

        merge_fields(&mut record, partial);

        sqlx::query(
            "UPDATE documents SET data = $3, updated_at = $4
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(record.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, id: &str, partial: Value) -> Result<()> {
        if self.get(collection, id).await?.is_some() {
            self.update(collection, id, partial).await
        } else {
            let mut record = partial;
            if let Some(map) = record.as_object_mut() {
                map.insert("id".to_string(), Value::String(id.to_string()));
            }
            self.insert(collection, id, &record).await
        }
    }

    async fn query(&self, collection: &str, field: &str, value: &str) -> Result<Vec<Value>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT data FROM documents
             WHERE collection = $1 AND json_extract(data, '$.' || $2) = $3
             ORDER BY created_at DESC",
        )
        .bind(collection)
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for (data,) in rows {
            records.push(serde_json::from_str(&data)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> SqliteDocumentStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        SqliteDocumentStore::initialize(pool).await.unwrap()
    }

    #[tokio::test]
    async fn create_uses_embedded_id() {
        let store = test_store().await;
        let id = store
            .create("cases", json!({"id": "CASE-1", "status": "AI_TRIAGE"}))
            .await
            .unwrap();
        assert_eq!(id, "CASE-1");

        let record = store.get("cases", "CASE-1").await.unwrap().unwrap();
        assert_eq!(record["status"], "AI_TRIAGE");
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = test_store().await;
        store
            .create("cases", json!({"id": "CASE-2", "status": "AI_TRIAGE"}))
            .await
            .unwrap();
        store
            .update("cases", "CASE-2", json!({"status": "DOCTOR_ASSIGNED"}))
            .await
            .unwrap();

        let record = store.get("cases", "CASE-2").await.unwrap().unwrap();
        assert_eq!(record["status"], "DOCTOR_ASSIGNED");
        assert_eq!(record["id"], "CASE-2");
    }

    #[tokio::test]
    async fn query_filters_by_field() {
        let store = test_store().await;
        store
            .create("doctor_slots", json!({"doctor_id": "doc1", "status": "AVAILABLE"}))
            .await
            .unwrap();
        store
            .create("doctor_slots", json!({"doctor_id": "doc2", "status": "AVAILABLE"}))
            .await
            .unwrap();

        let slots = store.query("doctor_slots", "doctor_id", "doc1").await.unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0]["doctor_id"], "doc1");
    }

    #[tokio::test]
    async fn update_missing_record_fails() {
        let store = test_store().await;
        assert!(store
            .update("cases", "nope", json!({"status": "X"}))
            .await
            .is_err());
    }
}
