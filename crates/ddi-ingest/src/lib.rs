//! Batch pipeline and dataset lifecycle on top of the store and the
//! deduplication strategies.

use ddi_core::Issue;
use ddi_dedup::DedupError;
use ddi_storage::StoreError;
use thiserror::Error;

mod config;
mod pipeline;
mod service;

pub use config::{connect_store, ServiceConfig, StoreKind};
pub use pipeline::Pipeline;
pub use service::DatasetService;

pub const CRATE_NAME: &str = "ddi-ingest";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("dataset id is missing")]
    DatasetIdMissing,
    #[error("dataset with id {0:?} not found")]
    DatasetNotFound(String),
    #[error("dataset with id {0:?} is closed")]
    DatasetClosed(String),
    #[error("json is malformed; {0}")]
    JsonMalformed(String),
    #[error("submitted data is invalid ({} issues)", .0.len())]
    Invalid(Vec<Issue>),
    #[error(transparent)]
    Dedup(#[from] DedupError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
