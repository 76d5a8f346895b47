use ddi_core::{Base, Datum, IdentityError, Normalizer, ObjectParser, Validator};
use serde::{Deserialize, Serialize};

use crate::DatumFactory;

pub const TYPE: &str = "basal";
pub const DELIVERY_TYPE_FIELD: &str = "deliveryType";

pub const SCHEDULED: &str = "scheduled";
pub const TEMPORARY: &str = "temp";
pub const SUSPEND: &str = "suspend";
pub const AUTOMATED: &str = "automated";

pub const VARIANTS: &[(&str, DatumFactory)] = &[
    (AUTOMATED, new_automated),
    (SCHEDULED, new_scheduled),
    (SUSPEND, new_suspend),
    (TEMPORARY, new_temporary),
];

pub const DURATION_MINIMUM: i64 = 0;
pub const DURATION_MAXIMUM: i64 = 604_800_000;
pub const RATE_MINIMUM: f64 = 0.0;
pub const RATE_MAXIMUM: f64 = 100.0;
pub const PERCENT_MINIMUM: f64 = 0.0;
pub const PERCENT_MAXIMUM: f64 = 10.0;

/// Fields every delivery type carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    #[serde(flatten)]
    pub base: Base,
    pub delivery_type: String,
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_duration: Option<i64>,
}

impl Delivery {
    fn new(delivery_type: &str) -> Self {
        Self {
            base: Base::new(TYPE),
            delivery_type: delivery_type.to_string(),
            duration: None,
            expected_duration: None,
        }
    }

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.base.parse(parser);
        self.duration = parser.int("duration");
        self.expected_duration = parser.int("expectedDuration");
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.base.validate(validator);
        validator
            .int("duration", self.duration)
            .exists()
            .in_range(DURATION_MINIMUM, DURATION_MAXIMUM);
        let lower = self.duration.unwrap_or(DURATION_MINIMUM).max(DURATION_MINIMUM);
        validator
            .int("expectedDuration", self.expected_duration)
            .in_range(lower, DURATION_MAXIMUM);
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        let mut fields = self.base.identity_fields()?;
        if self.delivery_type.is_empty() {
            return Err(IdentityError::Empty("delivery type"));
        }
        fields.push(self.delivery_type.clone());
        Ok(fields)
    }
}

/// Scheduled and automated (closed-loop) delivery share this shape;
/// `delivery.delivery_type` tells them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduled {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_name: Option<String>,
}

impl Scheduled {
    fn new(delivery_type: &str) -> Self {
        Self {
            delivery: Delivery::new(delivery_type),
            rate: None,
            schedule_name: None,
        }
    }
}

pub fn new_scheduled() -> Box<dyn Datum> {
    Box::new(Scheduled::new(SCHEDULED))
}

pub fn new_automated() -> Box<dyn Datum> {
    Box::new(Scheduled::new(AUTOMATED))
}

impl Datum for Scheduled {
    datum_common!(delivery.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.delivery.parse(parser);
        self.rate = parser.float("rate");
        self.schedule_name = parser.string("scheduleName");
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.delivery.validate(validator);
        validator
            .float("rate", self.rate)
            .exists()
            .in_range(RATE_MINIMUM, RATE_MAXIMUM);
        validator
            .string("scheduleName", self.schedule_name.as_deref())
            .not_empty();
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.delivery.base.normalize(normalizer);
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.delivery.identity_fields()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temporary {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

pub fn new_temporary() -> Box<dyn Datum> {
    Box::new(Temporary {
        delivery: Delivery::new(TEMPORARY),
        rate: None,
        percent: None,
    })
}

impl Datum for Temporary {
    datum_common!(delivery.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.delivery.parse(parser);
        self.rate = parser.float("rate");
        self.percent = parser.float("percent");
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.delivery.validate(validator);
        validator
            .float("rate", self.rate)
            .exists()
            .in_range(RATE_MINIMUM, RATE_MAXIMUM);
        validator
            .float("percent", self.percent)
            .in_range(PERCENT_MINIMUM, PERCENT_MAXIMUM);
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.delivery.base.normalize(normalizer);
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.delivery.identity_fields()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suspend {
    #[serde(flatten)]
    pub delivery: Delivery,
}

pub fn new_suspend() -> Box<dyn Datum> {
    Box::new(Suspend {
        delivery: Delivery::new(SUSPEND),
    })
}

impl Datum for Suspend {
    datum_common!(delivery.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.delivery.parse(parser);
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.delivery.validate(validator);
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.delivery.base.normalize(normalizer);
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.delivery.identity_fields()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddi_core::{Origin, Pointer, Report};
    use serde_json::json;

    fn parse_and_validate(raw: serde_json::Value, factory: DatumFactory) -> (Box<dyn Datum>, Report) {
        let mut report = Report::new();
        let mut datum = factory();
        {
            let mut parser = ObjectParser::new(raw.as_object().expect("object"), Pointer::root(), &mut report);
            datum.parse(&mut parser);
            parser.finish();
        }
        {
            let mut validator = Validator::new(&mut report, Origin::External);
            datum.validate(&mut validator);
        }
        (datum, report)
    }

    #[test]
    fn suspend_rejects_rate_as_unparsed() {
        let (_, report) = parse_and_validate(
            json!({ "deviceId": "d", "time": "2024-01-01T00:00:00Z", "duration": 3600000, "rate": 1.0 }),
            new_suspend,
        );
        assert_eq!(report.pointers(), vec!["/rate"]);
    }

    #[test]
    fn scheduled_requires_rate_and_duration_in_range() {
        let (_, report) = parse_and_validate(
            json!({ "deviceId": "d", "time": "2024-01-01T00:00:00Z", "duration": 604800001, "scheduleName": "" }),
            new_scheduled,
        );
        assert_eq!(report.pointers(), vec!["/duration", "/rate", "/scheduleName"]);
    }

    #[test]
    fn expected_duration_must_cover_duration() {
        let (_, report) = parse_and_validate(
            json!({ "deviceId": "d", "time": "2024-01-01T00:00:00Z", "duration": 3600000,
                    "expectedDuration": 1800000, "rate": 0.5, "percent": 11.0 }),
            new_temporary,
        );
        assert_eq!(report.pointers(), vec!["/expectedDuration", "/percent"]);
    }

    #[test]
    fn identity_includes_delivery_type() {
        let (mut datum, report) = parse_and_validate(
            json!({ "deviceId": "d", "time": "2024-01-01T00:00:00Z", "duration": 0, "rate": 0.0 }),
            new_automated,
        );
        assert!(report.is_empty());
        datum.base_mut().user_id = Some("u".into());
        let fields = datum.identity_fields().expect("identity");
        assert_eq!(fields.last().map(String::as_str), Some("automated"));
        assert_eq!(datum.to_document().expect("document")["deliveryType"], "automated");
    }

    #[test]
    fn scheduled_and_automated_differ_only_by_delivery_type() {
        let raw = json!({ "deviceId": "d", "time": "2024-01-01T00:00:00Z", "duration": 1800000,
                          "rate": 0.9, "scheduleName": "Standard" });
        let (scheduled, report) = parse_and_validate(raw.clone(), new_scheduled);
        assert!(report.is_empty());
        let (automated, report) = parse_and_validate(raw, new_automated);
        assert!(report.is_empty());

        let mut scheduled = scheduled.to_document().expect("document");
        let mut automated = automated.to_document().expect("document");
        assert_eq!(scheduled["deliveryType"], "scheduled");
        assert_eq!(automated["deliveryType"], "automated");
        scheduled["deliveryType"] = json!("");
        automated["deliveryType"] = json!("");
        assert_eq!(scheduled, automated);
    }
}
