//! Dataset and device data persistence: the store contract, an in-memory
//! backend and a PostgreSQL backend.

use async_trait::async_trait;
use ddi_core::{Dataset, StampedDatum};
use thiserror::Error;

mod memory;
mod postgres;

pub use memory::{MemoryStore, StoredDatum};
pub use postgres::{PgConfig, PgStore};

pub const CRATE_NAME: &str = "ddi-storage";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to connect to database: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("{command} failed: {error}")]
    Query {
        command: &'static str,
        #[source]
        error: sqlx::Error,
    },
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("unable to serialize {what}: {error}")]
    Serialization {
        what: &'static str,
        #[source]
        error: serde_json::Error,
    },
    #[error("dataset with id {0:?} already exists")]
    DatasetExists(String),
    #[error("dataset with id {0:?} not found")]
    DatasetNotFound(String),
    #[error("datum with id {0:?} has no deduplicator hash")]
    HashMissing(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Name of the strategy whose rows are unique per user and device.
pub const DEVICE_UNIQUE_DEDUPLICATOR: &str = "hash-drop-new";

/// Everything the deduplication engine and dataset lifecycle need from a
/// backend. Data rows are unique on `(upload_id, deduplicator hash)`. Rows
/// written by [`DEVICE_UNIQUE_DEDUPLICATOR`] are also unique on
/// `(user_id, device_id, deduplicator hash)` among themselves. Inserts that
/// collide are ignored and not counted.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn get_dataset(&self, upload_id: &str) -> Result<Option<Dataset>, StoreError>;

    async fn create_dataset(&self, dataset: &Dataset) -> Result<(), StoreError>;

    async fn update_dataset(&self, dataset: &Dataset) -> Result<(), StoreError>;

    /// Removes the dataset and every datum it owns.
    async fn delete_dataset(&self, dataset: &Dataset) -> Result<(), StoreError>;

    /// Returns the subset of `hashes` already stored for this user and device,
    /// in any dataset.
    async fn find_all_dataset_data_deduplicator_hashes_for_device(
        &self,
        user_id: &str,
        device_id: &str,
        hashes: &[String],
    ) -> Result<Vec<String>, StoreError>;

    /// Returns the subset of `hashes` already stored in this one dataset.
    async fn find_all_dataset_data_deduplicator_hashes_for_dataset(
        &self,
        upload_id: &str,
        hashes: &[String],
    ) -> Result<Vec<String>, StoreError>;

    /// Returns how many rows were actually written.
    async fn create_dataset_data(&self, dataset: &Dataset, data: &[StampedDatum]) -> Result<usize, StoreError>;

    /// Removes data for the dataset's user and device that belongs to any
    /// other dataset.
    async fn delete_other_dataset_data(&self, dataset: &Dataset) -> Result<(), StoreError>;
}

pub(crate) fn device_id(dataset: &Dataset) -> &str {
    dataset.device_id.as_deref().unwrap_or_default()
}

pub(crate) fn is_device_unique(deduplicator: Option<&str>) -> bool {
    deduplicator == Some(DEVICE_UNIQUE_DEDUPLICATOR)
}
