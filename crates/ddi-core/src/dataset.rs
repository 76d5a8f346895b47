//! Datasets (uploads), their lifecycle state, and deduplication stamps.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::datum::Datum;

pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataState {
    #[default]
    Open,
    Closed,
}

impl DataState {
    pub fn as_str(self) -> &'static str {
        match self {
            DataState::Open => "open",
            DataState::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(DataState::Open),
            "closed" => Some(DataState::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for DataState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("deduplicator descriptor already registered with {0:?}")]
    AlreadyRegistered(String),
    #[error("deduplicator name is empty")]
    NameEmpty,
}

/// Which strategy handled a dataset or record, and the record's identity hash.
/// The name can be set once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeduplicatorDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
}

impl DeduplicatorDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn register(mut self, name: &str) -> Result<Self, DescriptorError> {
        if name.is_empty() {
            return Err(DescriptorError::NameEmpty);
        }
        if let Some(existing) = &self.name {
            return Err(DescriptorError::AlreadyRegistered(existing.clone()));
        }
        self.name = Some(name.to_string());
        Ok(self)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn is_registered_with_any(&self) -> bool {
        self.name.is_some()
    }

    pub fn is_registered_with(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dataset with id {0:?} is closed")]
pub struct DatasetClosed(pub String);

/// Who a new dataset belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetOwner {
    pub user_id: String,
    pub group_id: String,
    pub by_user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub upload_id: String,
    pub user_id: String,
    pub group_id: String,
    #[serde(default)]
    pub by_user: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub device_manufacturers: Option<Vec<String>>,
    #[serde(default)]
    pub device_model: Option<String>,
    #[serde(default)]
    pub device_serial_number: Option<String>,
    #[serde(default)]
    pub device_tags: Option<Vec<String>>,
    #[serde(default)]
    pub computer_time: Option<String>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_processing: Option<String>,
    #[serde(default, rename = "timezone")]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub timezone_offset: Option<i64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub data_state: DataState,
    #[serde(default, rename = "_deduplicator")]
    pub deduplicator: Option<DeduplicatorDescriptor>,
    pub created_time: DateTime<Utc>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
}

impl Dataset {
    pub fn new(user_id: &str, group_id: &str) -> Self {
        Self {
            upload_id: new_id(),
            user_id: user_id.to_string(),
            group_id: group_id.to_string(),
            by_user: None,
            device_id: None,
            device_manufacturers: None,
            device_model: None,
            device_serial_number: None,
            device_tags: None,
            computer_time: None,
            time: None,
            time_processing: None,
            time_zone: None,
            timezone_offset: None,
            version: None,
            data_state: DataState::Open,
            deduplicator: None,
            created_time: Utc::now(),
            modified_time: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.data_state == DataState::Open
    }

    /// One-way transition; closing twice is an error.
    pub fn close(&mut self) -> Result<(), DatasetClosed> {
        if !self.is_open() {
            return Err(DatasetClosed(self.upload_id.clone()));
        }
        self.data_state = DataState::Closed;
        self.modified_time = Some(Utc::now());
        Ok(())
    }

    pub fn register_deduplicator(&mut self, name: &str) -> Result<(), DescriptorError> {
        let descriptor = self.deduplicator.take().unwrap_or_default();
        match descriptor.clone().register(name) {
            Ok(registered) => {
                self.deduplicator = Some(registered);
                Ok(())
            }
            Err(err) => {
                self.deduplicator = Some(descriptor);
                Err(err)
            }
        }
    }

    pub fn deduplicator_name(&self) -> Option<&str> {
        self.deduplicator.as_ref().and_then(DeduplicatorDescriptor::name)
    }

    pub fn has_manufacturer(&self, expected: &[String]) -> bool {
        self.device_manufacturers
            .as_ref()
            .is_some_and(|manufacturers| manufacturers.iter().any(|m| expected.contains(m)))
    }
}

/// A record sealed with its deduplication descriptor, ready to persist.
/// Built once; there is no way to change the descriptor afterwards.
#[derive(Debug, Clone)]
pub struct StampedDatum {
    datum: Box<dyn Datum>,
    descriptor: DeduplicatorDescriptor,
}

impl StampedDatum {
    pub fn new(mut datum: Box<dyn Datum>, descriptor: DeduplicatorDescriptor) -> Self {
        if datum.base().id.is_none() {
            datum.base_mut().id = Some(new_id());
        }
        Self { datum, descriptor }
    }

    pub fn datum(&self) -> &dyn Datum {
        self.datum.as_ref()
    }

    pub fn descriptor(&self) -> &DeduplicatorDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> &str {
        self.datum.base().id.as_deref().unwrap_or_default()
    }

    pub fn hash(&self) -> Option<&str> {
        self.descriptor.hash()
    }

    pub fn to_document(&self) -> serde_json::Result<Value> {
        let mut document = self.datum.to_document()?;
        if let Value::Object(map) = &mut document {
            map.insert("_deduplicator".to_string(), serde_json::to_value(&self.descriptor)?);
        }
        Ok(document)
    }
}
