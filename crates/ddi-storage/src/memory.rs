use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use ddi_core::{Dataset, StampedDatum};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{device_id, is_device_unique, DataStore, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDatum {
    pub id: String,
    pub upload_id: String,
    pub user_id: String,
    pub device_id: String,
    pub hash: String,
    pub deduplicator: Option<String>,
    pub document: Value,
}

#[derive(Debug, Default)]
struct MemoryState {
    datasets: BTreeMap<String, Dataset>,
    data: Vec<StoredDatum>,
}

/// Process-local store for tests and single-node runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored datum belonging to `upload_id`, in insertion order.
    pub async fn dataset_data(&self, upload_id: &str) -> Vec<StoredDatum> {
        let state = self.state.lock().await;
        state
            .data
            .iter()
            .filter(|d| d.upload_id == upload_id)
            .cloned()
            .collect()
    }

    pub async fn data_count(&self) -> usize {
        self.state.lock().await.data.len()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn get_dataset(&self, upload_id: &str) -> Result<Option<Dataset>, StoreError> {
        Ok(self.state.lock().await.datasets.get(upload_id).cloned())
    }

    async fn create_dataset(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.datasets.contains_key(&dataset.upload_id) {
            return Err(StoreError::DatasetExists(dataset.upload_id.clone()));
        }
        state.datasets.insert(dataset.upload_id.clone(), dataset.clone());
        Ok(())
    }

    async fn update_dataset(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        match state.datasets.get_mut(&dataset.upload_id) {
            Some(existing) => {
                *existing = dataset.clone();
                Ok(())
            }
            None => Err(StoreError::DatasetNotFound(dataset.upload_id.clone())),
        }
    }

    async fn delete_dataset(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.datasets.remove(&dataset.upload_id).is_none() {
            return Err(StoreError::DatasetNotFound(dataset.upload_id.clone()));
        }
        state.data.retain(|d| d.upload_id != dataset.upload_id);
        Ok(())
    }

    async fn find_all_dataset_data_deduplicator_hashes_for_device(
        &self,
        user_id: &str,
        device_id: &str,
        hashes: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let state = self.state.lock().await;
        let stored: HashSet<&str> = state
            .data
            .iter()
            .filter(|d| d.user_id == user_id && d.device_id == device_id)
            .map(|d| d.hash.as_str())
            .collect();
        Ok(hashes.iter().filter(|h| stored.contains(h.as_str())).cloned().collect())
    }

    async fn find_all_dataset_data_deduplicator_hashes_for_dataset(
        &self,
        upload_id: &str,
        hashes: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let state = self.state.lock().await;
        let stored: HashSet<&str> = state
            .data
            .iter()
            .filter(|d| d.upload_id == upload_id)
            .map(|d| d.hash.as_str())
            .collect();
        Ok(hashes.iter().filter(|h| stored.contains(h.as_str())).cloned().collect())
    }

    async fn create_dataset_data(&self, dataset: &Dataset, data: &[StampedDatum]) -> Result<usize, StoreError> {
        let device_id = device_id(dataset);
        let mut rows = Vec::with_capacity(data.len());
        for stamped in data {
            let hash = stamped
                .hash()
                .ok_or_else(|| StoreError::HashMissing(stamped.id().to_string()))?;
            let document = stamped
                .to_document()
                .map_err(|error| StoreError::Serialization { what: "datum", error })?;
            rows.push(StoredDatum {
                id: stamped.id().to_string(),
                upload_id: dataset.upload_id.clone(),
                user_id: dataset.user_id.clone(),
                device_id: device_id.to_string(),
                hash: hash.to_string(),
                deduplicator: stamped.descriptor().name().map(ToString::to_string),
                document,
            });
        }

        let mut state = self.state.lock().await;
        let mut inserted = 0;
        for row in rows {
            let device_unique = is_device_unique(row.deduplicator.as_deref());
            let collides = state.data.iter().any(|d| {
                d.hash == row.hash
                    && (d.upload_id == row.upload_id
                        || (device_unique
                            && is_device_unique(d.deduplicator.as_deref())
                            && d.user_id == row.user_id
                            && d.device_id == row.device_id))
            });
            if !collides {
                state.data.push(row);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn delete_other_dataset_data(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let device_id = device_id(dataset);
        let mut state = self.state.lock().await;
        state.data.retain(|d| {
            d.user_id != dataset.user_id || d.device_id != device_id || d.upload_id == dataset.upload_id
        });
        Ok(())
    }
}
