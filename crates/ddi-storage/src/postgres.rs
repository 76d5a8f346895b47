use std::time::Duration;

use async_trait::async_trait;
use ddi_core::{Dataset, StampedDatum};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::{device_id, DataStore, StoreError};

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone)]
pub struct PgConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

fn query_error(command: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |error| StoreError::Query { command, error }
}

impl PgStore {
    pub async fn connect(config: &PgConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(StoreError::Connection)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        info!("database migrations applied");
        Ok(())
    }
}

fn dataset_document(dataset: &Dataset) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(dataset).map_err(|error| StoreError::Serialization { what: "dataset", error })
}

#[async_trait]
impl DataStore for PgStore {
    async fn get_dataset(&self, upload_id: &str) -> Result<Option<Dataset>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT document
              FROM datasets
             WHERE upload_id = $1
            "#,
        )
        .bind(upload_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error("get dataset"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(document): Json<serde_json::Value> = row.try_get("document").map_err(query_error("get dataset"))?;
        let dataset = serde_json::from_value(document)
            .map_err(|error| StoreError::Serialization { what: "dataset", error })?;
        Ok(Some(dataset))
    }

    async fn create_dataset(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let document = dataset_document(dataset)?;
        let result = sqlx::query(
            r#"
            INSERT INTO datasets
                (upload_id, user_id, group_id, device_id, data_state, deduplicator_name, document, created_time, modified_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (upload_id) DO NOTHING
            "#,
        )
        .bind(&dataset.upload_id)
        .bind(&dataset.user_id)
        .bind(&dataset.group_id)
        .bind(dataset.device_id.as_deref())
        .bind(dataset.data_state.as_str())
        .bind(dataset.deduplicator_name())
        .bind(Json(document))
        .bind(dataset.created_time)
        .bind(dataset.modified_time)
        .execute(&self.pool)
        .await
        .map_err(query_error("create dataset"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DatasetExists(dataset.upload_id.clone()));
        }
        Ok(())
    }

    async fn update_dataset(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let document = dataset_document(dataset)?;
        let result = sqlx::query(
            r#"
            UPDATE datasets
               SET device_id = $2,
                   data_state = $3,
                   deduplicator_name = $4,
                   document = $5,
                   modified_time = COALESCE($6, NOW())
             WHERE upload_id = $1
            "#,
        )
        .bind(&dataset.upload_id)
        .bind(dataset.device_id.as_deref())
        .bind(dataset.data_state.as_str())
        .bind(dataset.deduplicator_name())
        .bind(Json(document))
        .bind(dataset.modified_time)
        .execute(&self.pool)
        .await
        .map_err(query_error("update dataset"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DatasetNotFound(dataset.upload_id.clone()));
        }
        Ok(())
    }

    async fn delete_dataset(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(query_error("delete dataset"))?;
        sqlx::query("DELETE FROM device_data WHERE upload_id = $1")
            .bind(&dataset.upload_id)
            .execute(&mut *tx)
            .await
            .map_err(query_error("delete dataset data"))?;
        let result = sqlx::query("DELETE FROM datasets WHERE upload_id = $1")
            .bind(&dataset.upload_id)
            .execute(&mut *tx)
            .await
            .map_err(query_error("delete dataset"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::DatasetNotFound(dataset.upload_id.clone()));
        }
        tx.commit().await.map_err(query_error("delete dataset"))?;
        Ok(())
    }

    async fn find_all_dataset_data_deduplicator_hashes_for_device(
        &self,
        user_id: &str,
        device_id: &str,
        hashes: &[String],
    ) -> Result<Vec<String>, StoreError> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT deduplicator_hash
              FROM device_data
             WHERE user_id = $1
               AND device_id = $2
               AND deduplicator_hash = ANY($3)
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .bind(hashes)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error("find deduplicator hashes"))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(row.try_get("deduplicator_hash").map_err(query_error("find deduplicator hashes"))?);
        }
        Ok(out)
    }

    async fn find_all_dataset_data_deduplicator_hashes_for_dataset(
        &self,
        upload_id: &str,
        hashes: &[String],
    ) -> Result<Vec<String>, StoreError> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT deduplicator_hash
              FROM device_data
             WHERE upload_id = $1
               AND deduplicator_hash = ANY($2)
            "#,
        )
        .bind(upload_id)
        .bind(hashes)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error("find dataset deduplicator hashes"))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(
                row.try_get("deduplicator_hash")
                    .map_err(query_error("find dataset deduplicator hashes"))?,
            );
        }
        Ok(out)
    }

    async fn create_dataset_data(&self, dataset: &Dataset, data: &[StampedDatum]) -> Result<usize, StoreError> {
        if data.is_empty() {
            return Ok(0);
        }
        let device_id = device_id(dataset);
        let mut tx = self.pool.begin().await.map_err(query_error("create dataset data"))?;
        let mut inserted = 0;
        for stamped in data {
            let hash = stamped
                .hash()
                .ok_or_else(|| StoreError::HashMissing(stamped.id().to_string()))?;
            let document = stamped
                .to_document()
                .map_err(|error| StoreError::Serialization { what: "datum", error })?;
            let result = sqlx::query(
                r#"
                INSERT INTO device_data
                    (id, upload_id, user_id, device_id, type, deduplicator_name, deduplicator_hash, document)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(stamped.id())
            .bind(&dataset.upload_id)
            .bind(&dataset.user_id)
            .bind(device_id)
            .bind(stamped.datum().datum_type())
            .bind(stamped.descriptor().name())
            .bind(hash)
            .bind(Json(document))
            .execute(&mut *tx)
            .await
            .map_err(query_error("create dataset data"))?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(query_error("create dataset data"))?;
        debug!(upload_id = %dataset.upload_id, submitted = data.len(), inserted, "stored dataset data");
        Ok(inserted)
    }

    async fn delete_other_dataset_data(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM device_data
             WHERE user_id = $1
               AND device_id = $2
               AND upload_id <> $3
            "#,
        )
        .bind(&dataset.user_id)
        .bind(device_id(dataset))
        .bind(&dataset.upload_id)
        .execute(&self.pool)
        .await
        .map_err(query_error("delete other dataset data"))?;
        info!(upload_id = %dataset.upload_id, removed = result.rows_affected(), "deleted other dataset data");
        Ok(())
    }
}
