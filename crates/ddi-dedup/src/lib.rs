//! Identity hashing and the per-dataset deduplication strategies.

use std::sync::Arc;

use async_trait::async_trait;
use ddi_core::{Dataset, Datum, DescriptorError, IdentityError};
use ddi_storage::{DataStore, StoreError};
use serde::Serialize;
use thiserror::Error;

mod base;
mod config;
mod delegate;
mod hash;
mod hash_drop_new;
mod truncate;

pub use base::{check_dataset, BaseDeduplicator, BaseFactory};
pub use config::{DedupConfig, StrategyConfig, StrategyName};
pub use delegate::DelegateFactory;
pub use hash::{identity_hash, HashError};
pub use hash_drop_new::{HashDropNewDeduplicator, HashDropNewFactory};
pub use truncate::{TruncateDeduplicator, TruncateFactory};

pub const CRATE_NAME: &str = "ddi-dedup";

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("dataset {0} is missing")]
    DatasetFieldMissing(&'static str),
    #[error("dataset {0} is empty")]
    DatasetFieldEmpty(&'static str),
    #[error("dataset device manufacturers does not contain expected device manufacturers")]
    ManufacturerMismatch,
    #[error("dataset with id {0:?} is not registered with a known deduplicator")]
    NotRegistered(String),
    #[error("no deduplicator can handle dataset with id {0:?}")]
    NoMatchingDeduplicator(String),
    #[error("unable to gather identity fields for datum {index}; {source}")]
    IdentityFields { index: usize, source: IdentityError },
    #[error("unable to generate identity hash for datum {index}; {source}")]
    IdentityHash { index: usize, source: HashError },
    #[error("unable to find all dataset data deduplicator hashes for device; {0}")]
    FindHashes(#[source] StoreError),
    #[error("unable to create dataset data with id {id:?}; {source}")]
    CreateData { id: String, source: StoreError },
    #[error("unable to remove all other data except dataset with id {id:?}; {source}")]
    DeleteOtherData { id: String, source: StoreError },
    #[error("unable to update dataset with id {id:?}; {source}")]
    UpdateDataset { id: String, source: StoreError },
    #[error("unable to delete dataset with id {id:?}; {source}")]
    DeleteDataset { id: String, source: StoreError },
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// Outcome of one `add_dataset_data` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AddedData {
    pub submitted: usize,
    pub created: usize,
    pub duplicates: usize,
}

/// A strategy bound to one dataset.
#[async_trait]
pub trait Deduplicator: Send + Sync {
    fn name(&self) -> &str;

    fn dataset(&self) -> &Dataset;

    /// Stamps the dataset with this strategy's name and persists it.
    async fn register_dataset(&mut self) -> Result<(), DedupError>;

    async fn add_dataset_data(&self, data: Vec<Box<dyn Datum>>) -> Result<AddedData, DedupError>;

    /// Finalize hook, run after the dataset has been closed.
    async fn deduplicate_dataset(&self) -> Result<(), DedupError>;

    async fn delete_dataset(&self) -> Result<(), DedupError>;
}

pub trait DeduplicatorFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Why this factory cannot handle `dataset`, if it cannot.
    fn check_dataset(&self, dataset: &Dataset) -> Result<(), DedupError>;

    fn can_deduplicate_dataset(&self, dataset: &Dataset) -> bool {
        self.check_dataset(dataset).is_ok()
    }

    fn new_deduplicator_for_dataset(
        &self,
        store: Arc<dyn DataStore>,
        dataset: Dataset,
    ) -> Result<Box<dyn Deduplicator>, DedupError>;

    fn is_registered_with_dataset(&self, dataset: &Dataset) -> bool {
        dataset
            .deduplicator
            .as_ref()
            .is_some_and(|descriptor| descriptor.is_registered_with(self.name()))
    }

    fn new_registered_deduplicator_for_dataset(
        &self,
        store: Arc<dyn DataStore>,
        dataset: Dataset,
    ) -> Result<Box<dyn Deduplicator>, DedupError> {
        if !self.is_registered_with_dataset(&dataset) {
            return Err(DedupError::NotRegistered(dataset.upload_id));
        }
        self.new_deduplicator_for_dataset(store, dataset)
    }
}
