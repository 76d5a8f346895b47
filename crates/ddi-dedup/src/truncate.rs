use std::sync::Arc;

use async_trait::async_trait;
use ddi_core::{Dataset, Datum};
use ddi_storage::DataStore;
use tracing::info;

use crate::base::{BaseDeduplicator, BaseFactory, HashScope};
use crate::config::StrategyName;
use crate::{AddedData, DedupError, Deduplicator, DeduplicatorFactory};

/// For devices that resend their full history on every upload. Each upload
/// keeps every record it sends, deduplicated only within itself, and once the
/// new dataset is finalized everything older for the same user and device goes.
pub struct TruncateFactory {
    base: BaseFactory,
}

impl TruncateFactory {
    pub fn new(device_manufacturers: Vec<String>) -> Self {
        Self {
            base: BaseFactory::new(StrategyName::Truncate.as_str(), device_manufacturers),
        }
    }
}

impl DeduplicatorFactory for TruncateFactory {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn check_dataset(&self, dataset: &Dataset) -> Result<(), DedupError> {
        self.base.check_dataset(dataset)
    }

    fn new_deduplicator_for_dataset(
        &self,
        store: Arc<dyn DataStore>,
        dataset: Dataset,
    ) -> Result<Box<dyn Deduplicator>, DedupError> {
        self.check_dataset(&dataset)?;
        Ok(Box::new(TruncateDeduplicator {
            base: BaseDeduplicator::new(self.base.name(), store, dataset).with_scope(HashScope::Dataset),
        }))
    }
}

pub struct TruncateDeduplicator {
    base: BaseDeduplicator,
}

#[async_trait]
impl Deduplicator for TruncateDeduplicator {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn dataset(&self) -> &Dataset {
        self.base.dataset()
    }

    async fn register_dataset(&mut self) -> Result<(), DedupError> {
        self.base.register_dataset().await
    }

    async fn add_dataset_data(&self, data: Vec<Box<dyn Datum>>) -> Result<AddedData, DedupError> {
        self.base.add_dataset_data(data).await
    }

    /// Not transactional: a failed delete leaves the new data in place
    /// alongside the old.
    async fn deduplicate_dataset(&self) -> Result<(), DedupError> {
        self.base.deduplicate_dataset().await?;
        let dataset = self.base.dataset();
        self.base
            .store()
            .delete_other_dataset_data(dataset)
            .await
            .map_err(|source| DedupError::DeleteOtherData {
                id: dataset.upload_id.clone(),
                source,
            })?;
        info!(upload_id = %dataset.upload_id, "truncated other dataset data");
        Ok(())
    }

    async fn delete_dataset(&self) -> Result<(), DedupError> {
        self.base.delete_dataset().await
    }
}
