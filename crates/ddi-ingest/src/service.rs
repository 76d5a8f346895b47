use std::sync::Arc;

use anyhow::Context;
use ddi_core::issue;
use ddi_core::{Dataset, DatasetOwner, ObjectParser, Origin, Pointer, Report, Validator};
use ddi_dedup::{AddedData, DelegateFactory, Deduplicator, DeduplicatorFactory};
use ddi_storage::DataStore;
use ddi_types::Upload;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{connect_store, ServiceConfig};
use crate::pipeline::Pipeline;
use crate::IngestError;

/// Dataset lifecycle: create (open), ingest while open, finalize (closed),
/// read and delete.
#[derive(Clone)]
pub struct DatasetService {
    store: Arc<dyn DataStore>,
    pipeline: Arc<Pipeline>,
    factory: Arc<DelegateFactory>,
}

impl DatasetService {
    pub fn new(store: Arc<dyn DataStore>, pipeline: Pipeline, factory: DelegateFactory) -> Self {
        Self {
            store,
            pipeline: Arc::new(pipeline),
            factory: Arc::new(factory),
        }
    }

    pub async fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let dedup = config.dedup_config().context("loading deduplicator strategies")?;
        let store = connect_store(config).await?;
        Ok(Self::new(store, Pipeline::standard(), DelegateFactory::from_config(&dedup)))
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    async fn load(&self, id: &str) -> Result<Dataset, IngestError> {
        if id.is_empty() {
            return Err(IngestError::DatasetIdMissing);
        }
        self.store
            .get_dataset(id)
            .await?
            .ok_or_else(|| IngestError::DatasetNotFound(id.to_string()))
    }

    fn registered(&self, dataset: Dataset) -> Result<Box<dyn Deduplicator>, IngestError> {
        Ok(self
            .factory
            .new_registered_deduplicator_for_dataset(self.store.clone(), dataset)?)
    }

    /// Opens a dataset from an `upload` object. The strategy is chosen before
    /// anything is written, so an unsupported device leaves no trace.
    pub async fn create_dataset(&self, owner: DatasetOwner, raw: &Value) -> Result<Dataset, IngestError> {
        let Some(object) = raw.as_object() else {
            return Err(IngestError::Invalid(vec![
                issue::value_not_type("object", raw).at(&Pointer::root())
            ]));
        };
        let mut report = Report::new();
        let mut parser = ObjectParser::new(object, Pointer::root(), &mut report);
        let upload = Upload::parse(&mut parser);
        parser.finish();
        upload.validate(&mut Validator::new(&mut report, Origin::External));
        if !report.is_empty() {
            return Err(IngestError::Invalid(report.into_issues()));
        }

        let dataset = upload.into_dataset(owner);
        let mut deduplicator = self
            .factory
            .new_deduplicator_for_dataset(self.store.clone(), dataset.clone())?;
        self.store.create_dataset(&dataset).await?;
        deduplicator.register_dataset().await?;

        let dataset = deduplicator.dataset().clone();
        info!(
            upload_id = %dataset.upload_id,
            user_id = %dataset.user_id,
            deduplicator = deduplicator.name(),
            "created dataset"
        );
        Ok(dataset)
    }

    pub async fn get_dataset(&self, id: &str) -> Result<Dataset, IngestError> {
        self.load(id).await
    }

    /// Runs a raw JSON batch through the pipeline and the dataset's strategy.
    /// Any parse or validation issue rejects the whole batch.
    pub async fn add_dataset_data(&self, id: &str, raw: &Value) -> Result<AddedData, IngestError> {
        let dataset = self.load(id).await?;
        if !dataset.is_open() {
            return Err(IngestError::DatasetClosed(dataset.upload_id));
        }
        let deduplicator = self.registered(dataset.clone())?;

        let Some(array) = raw.as_array() else {
            return Err(IngestError::JsonMalformed("data must be an array".to_string()));
        };
        let mut data = self
            .pipeline
            .process(array, Origin::External)
            .map_err(IngestError::Invalid)?;
        for datum in &mut data {
            datum.base_mut().assign_dataset(&dataset);
        }
        Ok(deduplicator.add_dataset_data(data).await?)
    }

    /// Persists the close, then runs the strategy's finalize hook. A failing
    /// hook leaves the dataset closed.
    pub async fn finalize_dataset(&self, id: &str) -> Result<Dataset, IngestError> {
        let dataset = self.load(id).await?;
        let mut closed = dataset.clone();
        closed
            .close()
            .map_err(|closed| IngestError::DatasetClosed(closed.0))?;
        let deduplicator = self.registered(closed.clone())?;

        self.store.update_dataset(&closed).await?;
        if let Err(err) = deduplicator.deduplicate_dataset().await {
            warn!(upload_id = %closed.upload_id, error = %err, "finalize hook failed after close");
            return Err(err.into());
        }
        info!(upload_id = %closed.upload_id, deduplicator = deduplicator.name(), "finalized dataset");
        Ok(closed)
    }

    pub async fn delete_dataset(&self, id: &str) -> Result<(), IngestError> {
        let dataset = self.load(id).await?;
        let deduplicator = self.registered(dataset)?;
        deduplicator.delete_dataset().await?;
        Ok(())
    }
}
