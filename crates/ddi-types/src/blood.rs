//! Blood readings: continuous and self-monitored glucose, and ketones.

use ddi_core::datum::required;
use ddi_core::{identity_float, Base, Datum, IdentityError, Normalizer, ObjectParser, Validator};
use serde::{Deserialize, Serialize};

use crate::glucose;

pub const CONTINUOUS_TYPE: &str = "cbg";
pub const SELF_MONITORED_TYPE: &str = "smbg";
pub const KETONE_TYPE: &str = "bloodKetone";

pub const SELF_MONITORED_SUB_TYPES: [&str; 2] = ["manual", "linked"];

pub const KETONE_UNITS: [&str; 2] = [glucose::MMOL_L, glucose::MMOL_L_LOWER];
pub const KETONE_MMOL_L_MINIMUM: f64 = 0.0;
pub const KETONE_MMOL_L_MAXIMUM: f64 = 10.0;

/// Units and value shared by every blood reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blood {
    #[serde(flatten)]
    pub base: Base,
    pub units: Option<String>,
    pub value: Option<f64>,
}

impl Blood {
    pub fn new(datum_type: &str) -> Self {
        Self {
            base: Base::new(datum_type),
            units: None,
            value: None,
        }
    }

    pub fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.base.parse(parser);
        self.units = parser.string("units");
        self.value = parser.float("value");
    }

    pub fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        let mut fields = self.base.identity_fields()?;
        let units = required("units", self.units.as_deref())?;
        let value = self.value.ok_or(IdentityError::Missing("value"))?;
        fields.push(units.to_string());
        fields.push(identity_float(value));
        Ok(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Continuous {
    #[serde(flatten)]
    pub blood: Blood,
}

pub fn new_continuous() -> Box<dyn Datum> {
    Box::new(Continuous {
        blood: Blood::new(CONTINUOUS_TYPE),
    })
}

impl Datum for Continuous {
    datum_common!(blood.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.blood.parse(parser);
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.blood.base.validate(validator);
        glucose::validate_units_and_value(validator, self.blood.units.as_deref(), self.blood.value);
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.blood.base.normalize(normalizer);
        if normalizer.rewrites() {
            glucose::normalize_units_and_value(&mut self.blood.units, &mut self.blood.value);
        }
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.blood.identity_fields()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfMonitored {
    #[serde(flatten)]
    pub blood: Blood,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
}

pub fn new_self_monitored() -> Box<dyn Datum> {
    Box::new(SelfMonitored {
        blood: Blood::new(SELF_MONITORED_TYPE),
        sub_type: None,
    })
}

impl Datum for SelfMonitored {
    datum_common!(blood.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.blood.parse(parser);
        self.sub_type = parser.string("subType");
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.blood.base.validate(validator);
        glucose::validate_units_and_value(validator, self.blood.units.as_deref(), self.blood.value);
        validator
            .string("subType", self.sub_type.as_deref())
            .one_of(&SELF_MONITORED_SUB_TYPES);
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.blood.base.normalize(normalizer);
        if normalizer.rewrites() {
            glucose::normalize_units_and_value(&mut self.blood.units, &mut self.blood.value);
        }
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.blood.identity_fields()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ketone {
    #[serde(flatten)]
    pub blood: Blood,
}

pub fn new_ketone() -> Box<dyn Datum> {
    Box::new(Ketone {
        blood: Blood::new(KETONE_TYPE),
    })
}

impl Datum for Ketone {
    datum_common!(blood.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.blood.parse(parser);
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.blood.base.validate(validator);
        let units = self.blood.units.as_deref();
        validator.string("units", units).exists().one_of(&KETONE_UNITS);
        let value = validator.float("value", self.blood.value).exists();
        if units.is_some_and(glucose::is_mmol_l) {
            value.in_range(KETONE_MMOL_L_MINIMUM, KETONE_MMOL_L_MAXIMUM);
        }
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.blood.base.normalize(normalizer);
        if normalizer.rewrites() {
            self.blood.units = glucose::normalize_units(self.blood.units.as_deref());
        }
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.blood.identity_fields()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ddi_core::issue::{CODE_VALUE_NOT_ALLOWED, CODE_VALUE_NOT_EXISTS, CODE_VALUE_OUT_OF_RANGE};
    use ddi_core::{Origin, Pointer, Report};

    fn ketone(units: Option<&str>, value: Option<f64>) -> Ketone {
        let mut blood = Blood::new(KETONE_TYPE);
        blood.base.device_id = Some("DevId0123456789".into());
        blood.base.time = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).single();
        blood.units = units.map(str::to_string);
        blood.value = value;
        Ketone { blood }
    }

    fn validate(datum: &dyn Datum) -> Report {
        let mut report = Report::new();
        let mut validator = Validator::new(&mut report, Origin::External);
        datum.validate(&mut validator);
        report
    }

    fn codes(report: &Report) -> Vec<(&str, &str)> {
        report
            .issues()
            .iter()
            .map(|i| (i.pointer().unwrap_or_default(), i.code.as_str()))
            .collect()
    }

    #[test]
    fn ketone_value_range_applies_only_to_known_units() {
        for (units, value, expected) in [
            (Some("mmol/L"), Some(0.0), vec![]),
            (Some("mmol/l"), Some(10.0), vec![]),
            (Some("mmol/L"), Some(-0.1), vec![("/value", CODE_VALUE_OUT_OF_RANGE)]),
            (Some("mmol/l"), Some(10.1), vec![("/value", CODE_VALUE_OUT_OF_RANGE)]),
            (Some("mg/dL"), Some(50.0), vec![("/units", CODE_VALUE_NOT_ALLOWED)]),
            (Some("mmol/L"), None, vec![("/value", CODE_VALUE_NOT_EXISTS)]),
            (None, Some(-99.0), vec![("/units", CODE_VALUE_NOT_EXISTS)]),
        ] {
            let report = validate(&ketone(units, value));
            assert_eq!(codes(&report), expected, "units {units:?} value {value:?}");
        }
    }

    #[test]
    fn ketone_units_canonicalized_only_for_external_origin() {
        for origin in Origin::ALL {
            let mut datum = ketone(Some("mmol/l"), Some(1.5));
            let mut normalizer = Normalizer::new(origin);
            datum.normalize(&mut normalizer);
            let expected = if origin.is_external() { "mmol/L" } else { "mmol/l" };
            assert_eq!(datum.blood.units.as_deref(), Some(expected), "origin {origin}");
            assert_eq!(datum.blood.value, Some(1.5));
            assert!(normalizer.data().is_empty());
        }
    }

    #[test]
    fn self_monitored_mg_dl_is_stored_as_mmol_l() {
        let mut datum = SelfMonitored {
            blood: Blood {
                units: Some("mg/dl".into()),
                value: Some(180.0),
                ..Blood::new(SELF_MONITORED_TYPE)
            },
            sub_type: Some("manual".into()),
        };
        datum.normalize(&mut Normalizer::new(Origin::External));
        assert_eq!(datum.blood.units.as_deref(), Some("mmol/L"));
        assert_eq!(datum.blood.value, Some(9.99135));

        let before = datum.clone();
        datum.normalize(&mut Normalizer::new(Origin::External));
        assert_eq!(datum, before);
    }

    #[test]
    fn glucose_range_depends_on_units() {
        let mut datum = Continuous {
            blood: Blood {
                units: Some("mg/dL".into()),
                value: Some(400.0),
                ..ketone(None, None).blood
            },
        };
        datum.blood.base.datum_type = CONTINUOUS_TYPE.into();
        assert!(validate(&datum).is_empty());

        datum.blood.units = Some("mmol/L".into());
        assert_eq!(codes(&validate(&datum)), vec![("/value", CODE_VALUE_OUT_OF_RANGE)]);

        datum.blood.value = Some(55.0);
        assert!(validate(&datum).is_empty());
    }

    #[test]
    fn identity_fields_append_units_and_value() {
        let mut datum = ketone(Some("mmol/L"), Some(2.0));
        datum.blood.base.user_id = Some("user-1".into());
        let fields = datum.identity_fields().expect("identity fields");
        assert_eq!(
            fields,
            vec!["user-1", "DevId0123456789", "2024-03-01T08:00:00.000Z", "bloodKetone", "mmol/L", "2"]
        );

        datum.blood.value = None;
        assert_eq!(datum.identity_fields(), Err(IdentityError::Missing("value")));
        datum.blood.units = Some(String::new());
        assert_eq!(datum.identity_fields(), Err(IdentityError::Empty("units")));
    }

    #[test]
    fn parses_blood_fields_at_pointer() {
        let raw = serde_json::json!({ "deviceId": "d", "time": "2024-03-01T08:00:00Z", "units": "mmol/L", "value": "5" });
        let mut report = Report::new();
        let mut datum = new_continuous();
        {
            let mut parser = ObjectParser::new(raw.as_object().expect("object"), Pointer::root().child(3), &mut report);
            datum.parse(&mut parser);
            parser.finish();
        }
        assert_eq!(report.pointers(), vec!["/3/value"]);
        assert_eq!(datum.base().device_id.as_deref(), Some("d"));
    }
}
