use ddi_core::{Base, Datum, IdentityError, Normalizer, ObjectParser, Validator, DEVICE_TIME_FORMAT};
use serde::{Deserialize, Serialize};

use crate::{glucose, DatumFactory};

pub const TYPE: &str = "deviceEvent";
pub const SUB_TYPE_FIELD: &str = "subType";

pub const ALARM: &str = "alarm";
pub const CALIBRATION: &str = "calibration";
pub const PRIME: &str = "prime";
pub const RESERVOIR_CHANGE: &str = "reservoirChange";
pub const TIME_CHANGE: &str = "timeChange";

pub const VARIANTS: &[(&str, DatumFactory)] = &[
    (ALARM, new_alarm),
    (CALIBRATION, new_calibration),
    (PRIME, new_prime),
    (RESERVOIR_CHANGE, new_reservoir_change),
    (TIME_CHANGE, new_time_change),
];

pub const ALARM_TYPES: [&str; 9] = [
    "auto_off",
    "low_insulin",
    "low_power",
    "no_delivery",
    "no_insulin",
    "no_power",
    "occlusion",
    "other",
    "over_limit",
];

pub const PRIME_TARGETS: [&str; 2] = ["cannula", "tubing"];
pub const PRIME_VOLUME_MINIMUM: f64 = 0.0;
pub const PRIME_VOLUME_MAXIMUM: f64 = 100.0;

pub const TIME_CHANGE_AGENTS: [&str; 2] = ["automatic", "manual"];
pub const TIME_CHANGE_REASONS: [&str; 5] = [
    "correction",
    "from_daylight_savings",
    "other",
    "to_daylight_savings",
    "travel",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(flatten)]
    pub base: Base,
    pub sub_type: String,
}

impl Event {
    fn new(sub_type: &str) -> Self {
        Self {
            base: Base::new(TYPE),
            sub_type: sub_type.to_string(),
        }
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        let mut fields = self.base.identity_fields()?;
        if self.sub_type.is_empty() {
            return Err(IdentityError::Empty("sub type"));
        }
        fields.push(self.sub_type.clone());
        Ok(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    #[serde(flatten)]
    pub event: Event,
    pub alarm_type: Option<String>,
}

pub fn new_alarm() -> Box<dyn Datum> {
    Box::new(Alarm {
        event: Event::new(ALARM),
        alarm_type: None,
    })
}

impl Datum for Alarm {
    datum_common!(event.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.event.base.parse(parser);
        self.alarm_type = parser.string("alarmType");
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.event.base.validate(validator);
        validator
            .string("alarmType", self.alarm_type.as_deref())
            .exists()
            .one_of(&ALARM_TYPES);
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.event.base.normalize(normalizer);
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.event.identity_fields()
    }
}

/// Meter reading entered to calibrate a sensor; carries glucose units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(flatten)]
    pub event: Event,
    pub units: Option<String>,
    pub value: Option<f64>,
}

pub fn new_calibration() -> Box<dyn Datum> {
    Box::new(Calibration {
        event: Event::new(CALIBRATION),
        units: None,
        value: None,
    })
}

impl Datum for Calibration {
    datum_common!(event.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.event.base.parse(parser);
        self.units = parser.string("units");
        self.value = parser.float("value");
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.event.base.validate(validator);
        glucose::validate_units_and_value(validator, self.units.as_deref(), self.value);
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.event.base.normalize(normalizer);
        if normalizer.rewrites() {
            glucose::normalize_units_and_value(&mut self.units, &mut self.value);
        }
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.event.identity_fields()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prime {
    #[serde(flatten)]
    pub event: Event,
    pub prime_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

pub fn new_prime() -> Box<dyn Datum> {
    Box::new(Prime {
        event: Event::new(PRIME),
        prime_target: None,
        volume: None,
    })
}

impl Datum for Prime {
    datum_common!(event.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.event.base.parse(parser);
        self.prime_target = parser.string("primeTarget");
        self.volume = parser.float("volume");
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.event.base.validate(validator);
        validator
            .string("primeTarget", self.prime_target.as_deref())
            .exists()
            .one_of(&PRIME_TARGETS);
        validator
            .float("volume", self.volume)
            .in_range(PRIME_VOLUME_MINIMUM, PRIME_VOLUME_MAXIMUM);
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.event.base.normalize(normalizer);
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.event.identity_fields()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservoirChange {
    #[serde(flatten)]
    pub event: Event,
}

pub fn new_reservoir_change() -> Box<dyn Datum> {
    Box::new(ReservoirChange {
        event: Event::new(RESERVOIR_CHANGE),
    })
}

impl Datum for ReservoirChange {
    datum_common!(event.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.event.base.parse(parser);
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.event.base.validate(validator);
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.event.base.normalize(normalizer);
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.event.identity_fields()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub from: Option<String>,
    pub to: Option<String>,
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasons: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Change {
    fn parse(parser: &mut ObjectParser<'_>) -> Self {
        Self {
            from: parser.string("from"),
            to: parser.string("to"),
            agent: parser.string("agent"),
            reasons: parser.string_array("reasons"),
            timezone: parser.string("timezone"),
        }
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        validator
            .string("from", self.from.as_deref())
            .exists()
            .as_time(DEVICE_TIME_FORMAT);
        validator
            .string("to", self.to.as_deref())
            .exists()
            .as_time(DEVICE_TIME_FORMAT);
        validator
            .string("agent", self.agent.as_deref())
            .exists()
            .one_of(&TIME_CHANGE_AGENTS);
        validator
            .string_array("reasons", self.reasons.as_deref())
            .each_one_of(&TIME_CHANGE_REASONS)
            .each_unique();
        validator
            .string("timezone", self.timezone.as_deref())
            .not_empty();
    }
}

/// Device clock adjustment from `change.from` to `change.to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeChange {
    #[serde(flatten)]
    pub event: Event,
    pub change: Option<Change>,
}

pub fn new_time_change() -> Box<dyn Datum> {
    Box::new(TimeChange {
        event: Event::new(TIME_CHANGE),
        change: None,
    })
}

impl Datum for TimeChange {
    datum_common!(event.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.event.base.parse(parser);
        self.change = parser.object("change").map(|mut child| {
            let change = Change::parse(&mut child);
            child.finish();
            change
        });
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.event.base.validate(validator);
        validator.present("change", self.change.as_ref()).exists();
        if let Some(change) = &self.change {
            change.validate(&mut validator.child("change"));
        }
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.event.base.normalize(normalizer);
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.event.identity_fields()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddi_core::issue::{CODE_TIME_NOT_PARSABLE, CODE_VALUE_DUPLICATE, CODE_VALUE_NOT_ALLOWED, CODE_VALUE_NOT_EXISTS};
    use ddi_core::{Origin, Pointer, Report};
    use serde_json::json;

    fn run(raw: serde_json::Value, factory: DatumFactory) -> (Box<dyn Datum>, Report) {
        let mut report = Report::new();
        let mut datum = factory();
        {
            let mut parser = ObjectParser::new(raw.as_object().expect("object"), Pointer::root().child(0), &mut report);
            datum.parse(&mut parser);
            parser.finish();
        }
        datum.validate(&mut Validator::new(&mut report, Origin::External).with_pointer(Pointer::root().child(0)));
        (datum, report)
    }

    fn tagged(report: &Report) -> Vec<(&str, &str)> {
        report
            .issues()
            .iter()
            .map(|i| (i.pointer().unwrap_or_default(), i.code.as_str()))
            .collect()
    }

    #[test]
    fn time_change_validates_nested_change() {
        let (_, report) = run(
            json!({
                "deviceId": "d",
                "time": "2024-03-10T09:00:00Z",
                "change": {
                    "from": "2024-03-10T02:00:00",
                    "to": "2024-03-10 03:00",
                    "agent": "robot",
                    "reasons": ["travel", "to_daylight_savings", "travel", "holiday"],
                    "unknown": 1
                }
            }),
            new_time_change,
        );
        assert_eq!(
            tagged(&report),
            vec![
                ("/0/change/unknown", "value-not-parsed"),
                ("/0/change/to", CODE_TIME_NOT_PARSABLE),
                ("/0/change/agent", CODE_VALUE_NOT_ALLOWED),
                ("/0/change/reasons/3", CODE_VALUE_NOT_ALLOWED),
                ("/0/change/reasons/2", CODE_VALUE_DUPLICATE),
            ]
        );
    }

    #[test]
    fn time_change_requires_change() {
        let (_, report) = run(json!({ "deviceId": "d", "time": "2024-03-10T09:00:00Z" }), new_time_change);
        assert_eq!(tagged(&report), vec![("/0/change", CODE_VALUE_NOT_EXISTS)]);
    }

    #[test]
    fn calibration_normalizes_like_glucose() {
        let (mut datum, report) = run(
            json!({ "deviceId": "d", "time": "2024-03-10T09:00:00Z", "units": "mg/dL", "value": 100 }),
            new_calibration,
        );
        assert!(report.is_empty());
        datum.normalize(&mut Normalizer::new(Origin::External));
        let document = datum.to_document().expect("document");
        assert_eq!(document["units"], "mmol/L");
        assert_eq!(document["value"], 5.55075);
        assert_eq!(document["subType"], "calibration");
    }

    #[test]
    fn alarm_and_prime_enumerations() {
        let (_, report) = run(
            json!({ "deviceId": "d", "time": "2024-03-10T09:00:00Z", "alarmType": "fire" }),
            new_alarm,
        );
        assert_eq!(tagged(&report), vec![("/0/alarmType", CODE_VALUE_NOT_ALLOWED)]);

        let (_, report) = run(
            json!({ "deviceId": "d", "time": "2024-03-10T09:00:00Z", "primeTarget": "cannula", "volume": 0.3 }),
            new_prime,
        );
        assert!(report.is_empty());
    }
}
