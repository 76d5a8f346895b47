use std::sync::Arc;

use ddi_core::Dataset;
use ddi_storage::DataStore;
use tracing::debug;

use crate::config::{DedupConfig, StrategyName};
use crate::hash_drop_new::HashDropNewFactory;
use crate::truncate::TruncateFactory;
use crate::{DedupError, Deduplicator, DeduplicatorFactory};

/// Ordered list of strategy factories. New datasets get the first eligible
/// strategy; existing datasets get the one whose name they carry.
pub struct DelegateFactory {
    factories: Vec<Box<dyn DeduplicatorFactory>>,
}

impl DelegateFactory {
    pub fn new(factories: Vec<Box<dyn DeduplicatorFactory>>) -> Self {
        Self { factories }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        let factories = config
            .strategies
            .iter()
            .map(|strategy| -> Box<dyn DeduplicatorFactory> {
                let manufacturers = strategy.device_manufacturers.clone();
                match strategy.name {
                    StrategyName::HashDropNew => Box::new(HashDropNewFactory::new(manufacturers)),
                    StrategyName::Truncate => Box::new(TruncateFactory::new(manufacturers)),
                }
            })
            .collect();
        Self::new(factories)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|f| f.name()).collect()
    }
}

impl Default for DelegateFactory {
    fn default() -> Self {
        Self::from_config(&DedupConfig::default())
    }
}

impl DeduplicatorFactory for DelegateFactory {
    fn name(&self) -> &str {
        "delegate"
    }

    fn check_dataset(&self, dataset: &Dataset) -> Result<(), DedupError> {
        if self.factories.iter().any(|f| f.can_deduplicate_dataset(dataset)) {
            Ok(())
        } else {
            Err(DedupError::NoMatchingDeduplicator(dataset.upload_id.clone()))
        }
    }

    fn new_deduplicator_for_dataset(
        &self,
        store: Arc<dyn DataStore>,
        dataset: Dataset,
    ) -> Result<Box<dyn Deduplicator>, DedupError> {
        for factory in &self.factories {
            if factory.can_deduplicate_dataset(&dataset) {
                debug!(upload_id = %dataset.upload_id, deduplicator = factory.name(), "selected deduplicator");
                return factory.new_deduplicator_for_dataset(store, dataset);
            }
        }
        Err(DedupError::NoMatchingDeduplicator(dataset.upload_id))
    }

    fn is_registered_with_dataset(&self, dataset: &Dataset) -> bool {
        self.factories.iter().any(|f| f.is_registered_with_dataset(dataset))
    }

    fn new_registered_deduplicator_for_dataset(
        &self,
        store: Arc<dyn DataStore>,
        dataset: Dataset,
    ) -> Result<Box<dyn Deduplicator>, DedupError> {
        match self.factories.iter().find(|f| f.is_registered_with_dataset(&dataset)) {
            Some(factory) => factory.new_registered_deduplicator_for_dataset(store, dataset),
            None => Err(DedupError::NotRegistered(dataset.upload_id)),
        }
    }
}
