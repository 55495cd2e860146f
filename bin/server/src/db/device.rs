//! Device repository.

use async_trait::async_trait;
use chatdeck_home::{Device, DeviceRegistry, RegistryError};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

/// Row type for device queries.
#[derive(FromRow)]
struct DeviceRow {
    entity_id: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Self {
            entity_id: row.entity_id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

/// Postgres-backed device registry.
#[derive(Clone)]
pub struct PgDeviceRegistry {
    pool: PgPool,
}

impl PgDeviceRegistry {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lists devices, newest first.
    pub async fn list(&self) -> Result<Vec<Device>, sqlx::Error> {
        let rows: Vec<DeviceRow> = sqlx::query_as(
            r#"
            SELECT entity_id, name, created_at
            FROM devices
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Device::from).collect())
    }

    /// Finds a device by entity id.
    pub async fn find(&self, entity_id: &str) -> Result<Option<Device>, sqlx::Error> {
        let row: Option<DeviceRow> = sqlx::query_as(
            r#"
            SELECT entity_id, name, created_at
            FROM devices
            WHERE entity_id = $1
            "#,
        )
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Device::from))
    }
}

fn storage_failed(e: sqlx::Error) -> RegistryError {
    RegistryError::StorageFailed {
        reason: e.to_string(),
    }
}

#[async_trait]
impl DeviceRegistry for PgDeviceRegistry {
    async fn list_devices(&self) -> Result<Vec<Device>, RegistryError> {
        self.list().await.map_err(storage_failed)
    }

    async fn get_device(&self, entity_id: &str) -> Result<Device, RegistryError> {
        self.find(entity_id)
            .await
            .map_err(storage_failed)?
            .ok_or_else(|| RegistryError::NotFound {
                entity_id: entity_id.to_string(),
            })
    }
}
