use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::dataset::Dataset;
use crate::normalizer::Normalizer;
use crate::parser::ObjectParser;
use crate::validator::Validator;

/// Local device clock reading without zone, e.g. `2024-05-01T09:15:00`.
pub const DEVICE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Time rendering used inside identity fields.
pub const IDENTITY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub const TIMEZONE_OFFSET_MINIMUM: i64 = -10_080;
pub const TIMEZONE_OFFSET_MAXIMUM: i64 = 10_080;
pub const CLOCK_DRIFT_OFFSET_MINIMUM: i64 = -86_400_000;
pub const CLOCK_DRIFT_OFFSET_MAXIMUM: i64 = 86_400_000;
pub const ANNOTATIONS_LENGTH_MAXIMUM: usize = 100;
pub const NOTES_LENGTH_MAXIMUM: usize = 100;

/// Where a record came from. Only client-submitted data is rewritten by
/// normalization; internal and stored records are already canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    External,
    Internal,
    Store,
}

impl Origin {
    pub const ALL: [Origin; 3] = [Origin::External, Origin::Internal, Origin::Store];

    pub fn is_external(self) -> bool {
        matches!(self, Origin::External)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::External => "external",
            Origin::Internal => "internal",
            Origin::Store => "store",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("{0} is missing")]
    Missing(&'static str),
    #[error("{0} is empty")]
    Empty(&'static str),
}

/// Capability set every registered record variant provides.
pub trait Datum: fmt::Debug + Send + Sync {
    fn base(&self) -> &Base;
    fn base_mut(&mut self) -> &mut Base;

    fn parse(&mut self, parser: &mut ObjectParser<'_>);
    fn validate(&self, validator: &mut Validator<'_>);
    fn normalize(&mut self, normalizer: &mut Normalizer);

    /// Ordered values that define "the same reading".
    fn identity_fields(&self) -> Result<Vec<String>, IdentityError>;

    fn to_document(&self) -> serde_json::Result<Value>;
    fn clone_datum(&self) -> Box<dyn Datum>;

    fn datum_type(&self) -> &str {
        &self.base().datum_type
    }
}

impl Clone for Box<dyn Datum> {
    fn clone(&self) -> Self {
        self.clone_datum()
    }
}

/// Shortest round-trip decimal rendering, never in exponent form.
pub fn identity_float(value: f64) -> String {
    value.to_string()
}

/// Fields common to every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base {
    #[serde(rename = "type")]
    pub datum_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone_offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_drift_offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,
}

impl Base {
    pub fn new(datum_type: &str) -> Self {
        Self {
            datum_type: datum_type.to_string(),
            ..Self::default()
        }
    }

    /// `type`, `userId`, `uploadId` and `id` are never read from clients.
    pub fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.device_id = parser.string("deviceId");
        self.time = parser.time("time");
        self.device_time = parser.string("deviceTime");
        self.timezone_offset = parser.int("timezoneOffset");
        self.conversion_offset = parser.int("conversionOffset");
        self.clock_drift_offset = parser.int("clockDriftOffset");
        self.annotations = parser.json_array("annotations");
        self.notes = parser.string_array("notes");
        self.payload = parser.json_object("payload");
    }

    pub fn validate(&self, validator: &mut Validator<'_>) {
        validator.string("type", Some(self.datum_type.as_str())).not_empty();
        validator.string("deviceId", self.device_id.as_deref()).exists().not_empty();
        validator.time("time", self.time).exists().not_after_now();
        validator
            .string("deviceTime", self.device_time.as_deref())
            .as_time(DEVICE_TIME_FORMAT);
        validator
            .int("timezoneOffset", self.timezone_offset)
            .in_range(TIMEZONE_OFFSET_MINIMUM, TIMEZONE_OFFSET_MAXIMUM);
        validator
            .int("clockDriftOffset", self.clock_drift_offset)
            .in_range(CLOCK_DRIFT_OFFSET_MINIMUM, CLOCK_DRIFT_OFFSET_MAXIMUM);
        if let Some(annotations) = &self.annotations {
            if annotations.len() > ANNOTATIONS_LENGTH_MAXIMUM {
                validator.report_issue(
                    "annotations",
                    crate::issue::length_not_in_range(annotations.len(), 0, ANNOTATIONS_LENGTH_MAXIMUM),
                );
            }
            for (index, annotation) in annotations.iter().enumerate() {
                if !annotation.is_object() {
                    validator
                        .child("annotations")
                        .report_issue(index, crate::issue::value_not_type("object", annotation));
                }
            }
        }
        validator
            .string_array("notes", self.notes.as_deref())
            .length_in_range(0, NOTES_LENGTH_MAXIMUM)
            .each_not_empty();
    }

    pub fn normalize(&mut self, _normalizer: &mut Normalizer) {}

    pub fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        let user_id = required("user id", self.user_id.as_deref())?;
        let device_id = required("device id", self.device_id.as_deref())?;
        let time = self.time.ok_or(IdentityError::Missing("time"))?;
        if self.datum_type.is_empty() {
            return Err(IdentityError::Empty("type"));
        }
        Ok(vec![
            user_id.to_string(),
            device_id.to_string(),
            time.format(IDENTITY_TIME_FORMAT).to_string(),
            self.datum_type.clone(),
        ])
    }

    /// Ties the record to the dataset it was submitted into.
    pub fn assign_dataset(&mut self, dataset: &Dataset) {
        self.user_id = Some(dataset.user_id.clone());
        self.upload_id = Some(dataset.upload_id.clone());
    }
}

/// Shared by variants for their own required identity inputs.
pub fn required<'v>(name: &'static str, value: Option<&'v str>) -> Result<&'v str, IdentityError> {
    match value {
        None => Err(IdentityError::Missing(name)),
        Some("") => Err(IdentityError::Empty(name)),
        Some(v) => Ok(v),
    }
}
