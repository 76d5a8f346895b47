use std::collections::HashSet;
use std::sync::Arc;

use ddi_core::{Dataset, Datum, DeduplicatorDescriptor, StampedDatum};
use ddi_storage::DataStore;
use tracing::{debug, info};

use crate::hash::identity_hash;
use crate::{AddedData, DedupError};

/// Preconditions shared by every strategy, checked in order.
pub fn check_dataset(dataset: &Dataset, expected_manufacturers: &[String]) -> Result<(), DedupError> {
    if dataset.upload_id.is_empty() {
        return Err(DedupError::DatasetFieldMissing("id"));
    }
    if dataset.user_id.is_empty() {
        return Err(DedupError::DatasetFieldMissing("user id"));
    }
    if dataset.group_id.is_empty() {
        return Err(DedupError::DatasetFieldMissing("group id"));
    }
    match dataset.device_id.as_deref() {
        None => return Err(DedupError::DatasetFieldMissing("device id")),
        Some("") => return Err(DedupError::DatasetFieldEmpty("device id")),
        Some(_) => {}
    }
    if dataset.device_manufacturers.is_none() {
        return Err(DedupError::DatasetFieldMissing("device manufacturers"));
    }
    if !dataset.has_manufacturer(expected_manufacturers) {
        return Err(DedupError::ManufacturerMismatch);
    }
    Ok(())
}

/// Name and manufacturer list behind a concrete strategy factory.
#[derive(Debug, Clone)]
pub struct BaseFactory {
    name: &'static str,
    device_manufacturers: Vec<String>,
}

impl BaseFactory {
    pub fn new(name: &'static str, device_manufacturers: Vec<String>) -> Self {
        Self {
            name,
            device_manufacturers,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn device_manufacturers(&self) -> &[String] {
        &self.device_manufacturers
    }

    pub fn check_dataset(&self, dataset: &Dataset) -> Result<(), DedupError> {
        check_dataset(dataset, &self.device_manufacturers)
    }
}

/// Where incoming hashes are looked up before insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScope {
    /// Any dataset of the same user and device.
    Device,
    /// Only the dataset being written.
    Dataset,
}

/// Hash-and-drop ingestion shared by every strategy. Strategies differ in the
/// scope of the hash lookup and in what they do when the dataset is finalized.
pub struct BaseDeduplicator {
    name: &'static str,
    scope: HashScope,
    store: Arc<dyn DataStore>,
    dataset: Dataset,
}

impl BaseDeduplicator {
    pub fn new(name: &'static str, store: Arc<dyn DataStore>, dataset: Dataset) -> Self {
        Self {
            name,
            scope: HashScope::Device,
            store,
            dataset,
        }
    }

    pub fn with_scope(mut self, scope: HashScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> HashScope {
        self.scope
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    pub async fn register_dataset(&mut self) -> Result<(), DedupError> {
        self.dataset.register_deduplicator(self.name)?;
        self.store
            .update_dataset(&self.dataset)
            .await
            .map_err(|source| DedupError::UpdateDataset {
                id: self.dataset.upload_id.clone(),
                source,
            })?;
        info!(upload_id = %self.dataset.upload_id, deduplicator = self.name, "registered dataset");
        Ok(())
    }

    pub async fn add_dataset_data(&self, data: Vec<Box<dyn Datum>>) -> Result<AddedData, DedupError> {
        if data.is_empty() {
            return Ok(AddedData::default());
        }
        let submitted = data.len();

        let mut hashes = Vec::with_capacity(submitted);
        for (index, datum) in data.iter().enumerate() {
            let fields = datum
                .identity_fields()
                .map_err(|source| DedupError::IdentityFields { index, source })?;
            let hash = identity_hash(&fields).map_err(|source| DedupError::IdentityHash { index, source })?;
            hashes.push(hash);
        }

        let mut seen = HashSet::new();
        let query: Vec<String> = hashes.iter().filter(|h| seen.insert(h.as_str())).cloned().collect();
        let found = match self.scope {
            HashScope::Device => {
                self.store
                    .find_all_dataset_data_deduplicator_hashes_for_device(
                        &self.dataset.user_id,
                        self.dataset.device_id.as_deref().unwrap_or_default(),
                        &query,
                    )
                    .await
            }
            HashScope::Dataset => {
                self.store
                    .find_all_dataset_data_deduplicator_hashes_for_dataset(&self.dataset.upload_id, &query)
                    .await
            }
        }
        .map_err(DedupError::FindHashes)?;
        let found: HashSet<String> = found.into_iter().collect();

        let mut claimed = HashSet::new();
        let mut stamped = Vec::new();
        for (datum, hash) in data.into_iter().zip(hashes) {
            if found.contains(&hash) || !claimed.insert(hash.clone()) {
                continue;
            }
            let descriptor = DeduplicatorDescriptor::new().with_hash(hash).register(self.name)?;
            stamped.push(StampedDatum::new(datum, descriptor));
        }

        let created = if stamped.is_empty() {
            0
        } else {
            self.store
                .create_dataset_data(&self.dataset, &stamped)
                .await
                .map_err(|source| DedupError::CreateData {
                    id: self.dataset.upload_id.clone(),
                    source,
                })?
        };

        let added = AddedData {
            submitted,
            created,
            duplicates: submitted - created,
        };
        info!(
            upload_id = %self.dataset.upload_id,
            deduplicator = self.name,
            submitted = added.submitted,
            created = added.created,
            duplicates = added.duplicates,
            "added dataset data"
        );
        Ok(added)
    }

    pub async fn deduplicate_dataset(&self) -> Result<(), DedupError> {
        debug!(upload_id = %self.dataset.upload_id, deduplicator = self.name, "deduplicated dataset");
        Ok(())
    }

    pub async fn delete_dataset(&self) -> Result<(), DedupError> {
        self.store
            .delete_dataset(&self.dataset)
            .await
            .map_err(|source| DedupError::DeleteDataset {
                id: self.dataset.upload_id.clone(),
                source,
            })?;
        info!(upload_id = %self.dataset.upload_id, deduplicator = self.name, "deleted dataset");
        Ok(())
    }
}
