//! Session state repository.

use async_trait::async_trait;
use chatdeck_conversation::{StateError, StateKey, StateStore};
use sqlx::PgPool;

/// Postgres-backed state store, one row per key.
#[derive(Clone)]
pub struct StateRepository {
    pool: PgPool,
}

impl StateRepository {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reads a value.
    pub async fn find(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT value FROM state WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
    }

    /// Inserts or replaces a value.
    pub async fn upsert(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO state (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn storage_failed(e: sqlx::Error) -> StateError {
    StateError::StorageFailed {
        reason: e.to_string(),
    }
}

#[async_trait]
impl StateStore for StateRepository {
    async fn get(&self, key: StateKey) -> Result<String, StateError> {
        self.find(key.as_str())
            .await
            .map_err(storage_failed)?
            .ok_or_else(|| StateError::NotFound {
                key: key.as_str().to_string(),
            })
    }

    async fn set(&self, entries: &[(StateKey, String)]) -> Result<(), StateError> {
        for (key, value) in entries {
            self.upsert(key.as_str(), value)
                .await
                .map_err(storage_failed)?;
        }
        Ok(())
    }
}
