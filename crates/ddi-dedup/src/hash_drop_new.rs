use std::sync::Arc;

use async_trait::async_trait;
use ddi_core::{Dataset, Datum};
use ddi_storage::DataStore;

use crate::base::{BaseDeduplicator, BaseFactory};
use crate::config::StrategyName;
use crate::{AddedData, DedupError, Deduplicator, DeduplicatorFactory};

/// Keeps whatever is already stored and drops incoming records whose hash is
/// known. Finalizing does nothing beyond the base step.
pub struct HashDropNewFactory {
    base: BaseFactory,
}

impl HashDropNewFactory {
    pub fn new(device_manufacturers: Vec<String>) -> Self {
        Self {
            base: BaseFactory::new(StrategyName::HashDropNew.as_str(), device_manufacturers),
        }
    }
}

impl DeduplicatorFactory for HashDropNewFactory {
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
        Ok(Box::new(HashDropNewDeduplicator {
            base: BaseDeduplicator::new(self.base.name(), store, dataset),
        }))
    }
}

pub struct HashDropNewDeduplicator {
    base: BaseDeduplicator,
}

#[async_trait]
impl Deduplicator for HashDropNewDeduplicator {
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

    async fn deduplicate_dataset(&self) -> Result<(), DedupError> {
        self.base.deduplicate_dataset().await
    }

    async fn delete_dataset(&self) -> Result<(), DedupError> {
        self.base.delete_dataset().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dataset, ScriptedStore};

    #[tokio::test]
    async fn finalize_leaves_other_data_alone() {
        let factory = HashDropNewFactory::new(vec!["Dexcom".into()]);
        let store = Arc::new(ScriptedStore::default());
        let dedup = factory
            .new_deduplicator_for_dataset(store.clone(), dataset("Dexcom"))
            .expect("deduplicator");
        assert_eq!(dedup.name(), "hash-drop-new");
        dedup.deduplicate_dataset().await.expect("finalize");
        assert!(store.calls().is_empty());
    }

    #[test]
    fn eligibility_follows_preconditions() {
        let factory = HashDropNewFactory::new(vec!["Dexcom".into()]);
        assert!(factory.can_deduplicate_dataset(&dataset("Dexcom")));
        assert!(!factory.can_deduplicate_dataset(&dataset("Animas")));

        let mut missing_group = dataset("Dexcom");
        missing_group.group_id.clear();
        assert!(!factory.can_deduplicate_dataset(&missing_group));
        let err = factory
            .new_deduplicator_for_dataset(Arc::new(ScriptedStore::default()), missing_group)
            .err()
            .expect("error");
        assert_eq!(err.to_string(), "dataset group id is missing");
    }

    #[test]
    fn registered_rebuild_requires_matching_name() {
        let factory = HashDropNewFactory::new(vec!["Dexcom".into()]);
        let mut d = dataset("Dexcom");
        assert!(!factory.is_registered_with_dataset(&d));
        assert!(matches!(
            factory.new_registered_deduplicator_for_dataset(Arc::new(ScriptedStore::default()), d.clone()),
            Err(DedupError::NotRegistered(_))
        ));

        d.register_deduplicator("hash-drop-new").expect("register");
        assert!(factory.is_registered_with_dataset(&d));
        assert!(factory
            .new_registered_deduplicator_for_dataset(Arc::new(ScriptedStore::default()), d)
            .is_ok());
    }
}
