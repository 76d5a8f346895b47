//! The `upload` object a client posts to open a dataset.

use chrono::{DateTime, Utc};
use ddi_core::issue;
use ddi_core::{Dataset, DatasetOwner, ObjectParser, Validator, DEVICE_TIME_FORMAT};

pub const TYPE: &str = "upload";

pub const DEVICE_TAGS: [&str; 3] = ["insulin-pump", "cgm", "bgm"];
pub const TIME_PROCESSINGS: [&str; 3] = ["across-the-board-timezone", "utc-bootstrapping", "none"];
pub const TIMEZONE_OFFSET_MINIMUM: i64 = -10_080;
pub const TIMEZONE_OFFSET_MAXIMUM: i64 = 10_080;
pub const VERSION_LENGTH_MINIMUM: usize = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Upload {
    pub device_id: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub computer_time: Option<String>,
    pub device_manufacturers: Option<Vec<String>>,
    pub device_model: Option<String>,
    pub device_serial_number: Option<String>,
    pub device_tags: Option<Vec<String>>,
    pub time_processing: Option<String>,
    pub time_zone: Option<String>,
    pub timezone_offset: Option<i64>,
    pub version: Option<String>,
}

impl Upload {
    pub fn parse(parser: &mut ObjectParser<'_>) -> Self {
        if let Some(datum_type) = parser.string("type") {
            if datum_type != TYPE {
                parser.append_issue("type", issue::type_invalid(&datum_type));
            }
        }
        Self {
            device_id: parser.string("deviceId"),
            time: parser.time("time"),
            computer_time: parser.string("computerTime"),
            device_manufacturers: parser.string_array("deviceManufacturers"),
            device_model: parser.string("deviceModel"),
            device_serial_number: parser.string("deviceSerialNumber"),
            device_tags: parser.string_array("deviceTags"),
            time_processing: parser.string("timeProcessing"),
            time_zone: parser.string("timezone"),
            timezone_offset: parser.int("timezoneOffset"),
            version: parser.string("version"),
        }
    }

    pub fn validate(&self, validator: &mut Validator<'_>) {
        validator
            .string("deviceId", self.device_id.as_deref())
            .exists()
            .not_empty();
        validator.time("time", self.time).not_after_now();
        validator
            .string("computerTime", self.computer_time.as_deref())
            .as_time(DEVICE_TIME_FORMAT);
        validator
            .string_array("deviceManufacturers", self.device_manufacturers.as_deref())
            .not_empty()
            .each_not_empty();
        validator
            .string("deviceModel", self.device_model.as_deref())
            .length_greater_than(1);
        validator
            .string("deviceSerialNumber", self.device_serial_number.as_deref())
            .length_greater_than(1);
        validator
            .string_array("deviceTags", self.device_tags.as_deref())
            .not_empty()
            .each_one_of(&DEVICE_TAGS)
            .each_unique();
        validator
            .string("timeProcessing", self.time_processing.as_deref())
            .one_of(&TIME_PROCESSINGS);
        validator
            .string("timezone", self.time_zone.as_deref())
            .length_greater_than(1);
        validator
            .int("timezoneOffset", self.timezone_offset)
            .in_range(TIMEZONE_OFFSET_MINIMUM, TIMEZONE_OFFSET_MAXIMUM);
        validator
            .string("version", self.version.as_deref())
            .length_greater_than(VERSION_LENGTH_MINIMUM);
    }

    /// Builds an open dataset carrying this upload's device metadata.
    pub fn into_dataset(self, owner: DatasetOwner) -> Dataset {
        let mut dataset = Dataset::new(&owner.user_id, &owner.group_id);
        dataset.by_user = owner.by_user;
        dataset.device_id = self.device_id;
        dataset.time = self.time;
        dataset.computer_time = self.computer_time;
        dataset.device_manufacturers = self.device_manufacturers;
        dataset.device_model = self.device_model;
        dataset.device_serial_number = self.device_serial_number;
        dataset.device_tags = self.device_tags;
        dataset.time_processing = self.time_processing;
        dataset.time_zone = self.time_zone;
        dataset.timezone_offset = self.timezone_offset;
        dataset.version = self.version;
        dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddi_core::issue::{CODE_LENGTH_OUT_OF_RANGE, CODE_TYPE_INVALID, CODE_VALUE_NOT_ALLOWED};
    use ddi_core::{DataState, Origin, Pointer, Report};
    use serde_json::json;

    fn parse(raw: serde_json::Value, report: &mut Report) -> Upload {
        let object = raw.as_object().expect("object");
        let mut parser = ObjectParser::new(object, Pointer::root(), report);
        let upload = Upload::parse(&mut parser);
        parser.finish();
        upload
    }

    fn fixture() -> serde_json::Value {
        json!({
            "type": "upload",
            "deviceId": "InsOmn-1234",
            "time": "2024-03-10T12:00:00Z",
            "computerTime": "2024-03-10T06:00:00",
            "deviceManufacturers": ["Insulet"],
            "deviceModel": "Omnipod",
            "deviceSerialNumber": "1234",
            "deviceTags": ["insulin-pump", "bgm"],
            "timeProcessing": "utc-bootstrapping",
            "timezone": "America/Denver",
            "timezoneOffset": -360,
            "version": "uploader 2.1.0"
        })
    }

    #[test]
    fn parses_and_builds_open_dataset() {
        let mut report = Report::new();
        let upload = parse(fixture(), &mut report);
        upload.validate(&mut Validator::new(&mut report, Origin::External));
        assert!(report.is_empty(), "{:?}", report.issues());

        let dataset = upload.into_dataset(DatasetOwner {
            user_id: "user-1".into(),
            group_id: "group-1".into(),
            by_user: Some("clinician-1".into()),
        });
        assert_eq!(dataset.data_state, DataState::Open);
        assert_eq!(dataset.device_id.as_deref(), Some("InsOmn-1234"));
        assert_eq!(dataset.device_manufacturers, Some(vec!["Insulet".to_string()]));
        assert_eq!(dataset.time_zone.as_deref(), Some("America/Denver"));
        assert_eq!(dataset.by_user.as_deref(), Some("clinician-1"));
        assert!(dataset.deduplicator.is_none());
    }

    #[test]
    fn rejects_foreign_type_and_bad_metadata() {
        let mut raw = fixture();
        raw["type"] = json!("cbg");
        raw["deviceTags"] = json!(["insulin-pump", "watch"]);
        raw["timeProcessing"] = json!("sometimes");
        raw["version"] = json!("1.0");
        let mut report = Report::new();
        let upload = parse(raw, &mut report);
        upload.validate(&mut Validator::new(&mut report, Origin::External));

        let tagged: Vec<(&str, &str)> = report
            .issues()
            .iter()
            .map(|i| (i.pointer().unwrap_or_default(), i.code.as_str()))
            .collect();
        assert_eq!(
            tagged,
            vec![
                ("/type", CODE_TYPE_INVALID),
                ("/deviceTags/1", CODE_VALUE_NOT_ALLOWED),
                ("/timeProcessing", CODE_VALUE_NOT_ALLOWED),
                ("/version", CODE_LENGTH_OUT_OF_RANGE),
            ]
        );
    }

    #[test]
    fn device_id_is_required() {
        let mut raw = fixture();
        raw.as_object_mut().expect("object").remove("deviceId");
        let mut report = Report::new();
        let upload = parse(raw, &mut report);
        upload.validate(&mut Validator::new(&mut report, Origin::External));
        assert_eq!(report.pointers(), vec!["/deviceId"]);
    }
}
