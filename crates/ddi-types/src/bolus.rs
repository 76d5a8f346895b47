use ddi_core::{Base, Datum, IdentityError, Normalizer, ObjectParser, Validator};
use serde::{Deserialize, Serialize};

use crate::DatumFactory;

pub const TYPE: &str = "bolus";
pub const SUB_TYPE_FIELD: &str = "subType";

pub const NORMAL: &str = "normal";
pub const SQUARE: &str = "square";
pub const DUAL_SQUARE: &str = "dual/square";

pub const VARIANTS: &[(&str, DatumFactory)] = &[
    (DUAL_SQUARE, new_dual_square),
    (NORMAL, new_normal),
    (SQUARE, new_square),
];

pub const NORMAL_MINIMUM: f64 = 0.0;
pub const NORMAL_MAXIMUM: f64 = 100.0;
pub const EXTENDED_MINIMUM: f64 = 0.0;
pub const EXTENDED_MAXIMUM: f64 = 100.0;
pub const DURATION_MINIMUM: i64 = 0;
pub const DURATION_MAXIMUM: i64 = 86_400_000;

/// Factory lookup used by records that embed a bolus.
pub fn new_for_sub_type(sub_type: &str) -> Option<Box<dyn Datum>> {
    VARIANTS
        .iter()
        .find(|(name, _)| *name == sub_type)
        .map(|(_, factory)| factory())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bolus {
    #[serde(flatten)]
    pub base: Base,
    pub sub_type: String,
}

impl Bolus {
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

fn validate_normal(
    validator: &mut Validator<'_>,
    normal: Option<f64>,
    expected_normal: Option<f64>,
    required: bool,
) {
    let check = validator.float("normal", normal);
    let check = if required { check.exists() } else { check };
    check.in_range(NORMAL_MINIMUM, NORMAL_MAXIMUM);
    let lower = normal.unwrap_or(NORMAL_MINIMUM).max(NORMAL_MINIMUM);
    validator
        .float("expectedNormal", expected_normal)
        .in_range(lower, NORMAL_MAXIMUM);
}

/// `duration` is needed whenever `extended` is given.
fn validate_extended(validator: &mut Validator<'_>, extended: Option<f64>, duration: Option<i64>, required: bool) {
    let check = validator.float("extended", extended);
    let check = if required { check.exists() } else { check };
    check.in_range(EXTENDED_MINIMUM, EXTENDED_MAXIMUM);
    let check = validator.int("duration", duration);
    let check = if required || extended.is_some() {
        check.exists()
    } else {
        check
    };
    check.in_range(DURATION_MINIMUM, DURATION_MAXIMUM);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Normal {
    #[serde(flatten)]
    pub bolus: Bolus,
    pub normal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_normal: Option<f64>,
}

pub fn new_normal() -> Box<dyn Datum> {
    Box::new(Normal {
        bolus: Bolus::new(NORMAL),
        normal: None,
        expected_normal: None,
    })
}

impl Datum for Normal {
    datum_common!(bolus.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.bolus.base.parse(parser);
        self.normal = parser.float("normal");
        self.expected_normal = parser.float("expectedNormal");
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.bolus.base.validate(validator);
        validate_normal(validator, self.normal, self.expected_normal, true);
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.bolus.base.normalize(normalizer);
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.bolus.identity_fields()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Square {
    #[serde(flatten)]
    pub bolus: Bolus,
    pub extended: Option<f64>,
    pub duration: Option<i64>,
}

pub fn new_square() -> Box<dyn Datum> {
    Box::new(Square {
        bolus: Bolus::new(SQUARE),
        extended: None,
        duration: None,
    })
}

impl Datum for Square {
    datum_common!(bolus.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.bolus.base.parse(parser);
        self.extended = parser.float("extended");
        self.duration = parser.int("duration");
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.bolus.base.validate(validator);
        validate_extended(validator, self.extended, self.duration, true);
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.bolus.base.normalize(normalizer);
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.bolus.identity_fields()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DualSquare {
    #[serde(flatten)]
    pub bolus: Bolus,
    pub normal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_normal: Option<f64>,
    pub extended: Option<f64>,
    pub duration: Option<i64>,
}

pub fn new_dual_square() -> Box<dyn Datum> {
    Box::new(DualSquare {
        bolus: Bolus::new(DUAL_SQUARE),
        normal: None,
        expected_normal: None,
        extended: None,
        duration: None,
    })
}

impl Datum for DualSquare {
    datum_common!(bolus.base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.bolus.base.parse(parser);
        self.normal = parser.float("normal");
        self.expected_normal = parser.float("expectedNormal");
        self.extended = parser.float("extended");
        self.duration = parser.int("duration");
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.bolus.base.validate(validator);
        validate_normal(validator, self.normal, self.expected_normal, false);
        validate_extended(validator, self.extended, self.duration, false);
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.bolus.base.normalize(normalizer);
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.bolus.identity_fields()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddi_core::issue::{CODE_VALUE_NOT_EXISTS, CODE_VALUE_OUT_OF_RANGE};
    use ddi_core::{Origin, Report};

    fn dual_square(normal: Option<f64>, extended: Option<f64>, duration: Option<i64>) -> DualSquare {
        let mut bolus = Bolus::new(DUAL_SQUARE);
        bolus.base.device_id = Some("DevId0123456789".into());
        bolus.base.time = "2024-02-01T10:00:00Z".parse().ok();
        DualSquare {
            bolus,
            normal,
            expected_normal: None,
            extended,
            duration,
        }
    }

    fn issues(datum: &dyn Datum) -> Vec<(String, String)> {
        let mut report = Report::new();
        datum.validate(&mut Validator::new(&mut report, Origin::External));
        report
            .issues()
            .iter()
            .map(|i| (i.pointer().unwrap_or_default().to_string(), i.code.clone()))
            .collect()
    }

    #[test]
    fn dual_square_bounds() {
        assert!(issues(&dual_square(Some(0.0), Some(0.0), Some(0))).is_empty());
        assert!(issues(&dual_square(Some(100.0), Some(100.0), Some(DURATION_MAXIMUM))).is_empty());

        assert_eq!(
            issues(&dual_square(Some(-0.1), Some(100.1), Some(-1))),
            vec![
                ("/normal".to_string(), CODE_VALUE_OUT_OF_RANGE.to_string()),
                ("/extended".to_string(), CODE_VALUE_OUT_OF_RANGE.to_string()),
                ("/duration".to_string(), CODE_VALUE_OUT_OF_RANGE.to_string()),
            ]
        );
    }

    #[test]
    fn dual_square_parts_are_optional_but_extended_needs_duration() {
        assert!(issues(&dual_square(Some(1.0), None, None)).is_empty());
        assert!(issues(&dual_square(None, Some(1.0), Some(600_000))).is_empty());
        assert!(issues(&dual_square(None, None, Some(600_000))).is_empty());
        assert_eq!(
            issues(&dual_square(Some(1.0), Some(2.0), None)),
            vec![("/duration".to_string(), CODE_VALUE_NOT_EXISTS.to_string())]
        );
    }

    #[test]
    fn normal_and_square_keep_their_required_fields() {
        let mut bolus = Bolus::new(NORMAL);
        bolus.base.device_id = Some("DevId0123456789".into());
        bolus.base.time = "2024-02-01T10:00:00Z".parse().ok();
        let normal = Normal {
            bolus: bolus.clone(),
            normal: None,
            expected_normal: None,
        };
        assert_eq!(
            issues(&normal),
            vec![("/normal".to_string(), CODE_VALUE_NOT_EXISTS.to_string())]
        );

        bolus.sub_type = SQUARE.to_string();
        let square = Square {
            bolus,
            extended: None,
            duration: None,
        };
        assert_eq!(
            issues(&square),
            vec![
                ("/extended".to_string(), CODE_VALUE_NOT_EXISTS.to_string()),
                ("/duration".to_string(), CODE_VALUE_NOT_EXISTS.to_string()),
            ]
        );
    }

    #[test]
    fn expected_normal_cannot_be_below_normal() {
        let mut datum = dual_square(Some(4.0), Some(1.0), Some(3_600_000));
        datum.expected_normal = Some(3.5);
        assert_eq!(
            issues(&datum),
            vec![("/expectedNormal".to_string(), CODE_VALUE_OUT_OF_RANGE.to_string())]
        );
    }

    #[test]
    fn sub_type_lookup() {
        let datum = new_for_sub_type("dual/square").expect("dual/square");
        assert_eq!(datum.to_document().expect("document")["subType"], "dual/square");
        assert!(new_for_sub_type("triple").is_none());
    }
}
