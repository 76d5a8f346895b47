use ddi_core::{Base, Datum, IdentityError, Normalizer, ObjectParser, Validator};
use serde::{Deserialize, Serialize};

pub const TYPE: &str = "insulin";

pub const DOSE_UNITS: [&str; 1] = ["Units"];
pub const DOSE_ACTIVE_MINIMUM: f64 = 0.0;
pub const DOSE_ACTIVE_MAXIMUM: f64 = 250.0;
pub const DOSE_CORRECTION_MINIMUM: f64 = -250.0;
pub const DOSE_CORRECTION_MAXIMUM: f64 = 250.0;
pub const DOSE_FOOD_MINIMUM: f64 = 0.0;
pub const DOSE_FOOD_MAXIMUM: f64 = 250.0;
pub const DOSE_TOTAL_MINIMUM: f64 = 0.0;
pub const DOSE_TOTAL_MAXIMUM: f64 = 250.0;
pub const SITE_LENGTH_MAXIMUM: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dose {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food: Option<f64>,
    pub total: Option<f64>,
    pub units: Option<String>,
}

impl Dose {
    pub fn parse(parser: &mut ObjectParser<'_>) -> Self {
        Self {
            active: parser.float("active"),
            correction: parser.float("correction"),
            food: parser.float("food"),
            total: parser.float("total"),
            units: parser.string("units"),
        }
    }

    pub fn validate(&self, validator: &mut Validator<'_>) {
        validator
            .float("active", self.active)
            .in_range(DOSE_ACTIVE_MINIMUM, DOSE_ACTIVE_MAXIMUM);
        validator
            .float("correction", self.correction)
            .in_range(DOSE_CORRECTION_MINIMUM, DOSE_CORRECTION_MAXIMUM);
        validator
            .float("food", self.food)
            .in_range(DOSE_FOOD_MINIMUM, DOSE_FOOD_MAXIMUM);
        validator
            .float("total", self.total)
            .exists()
            .in_range(DOSE_TOTAL_MINIMUM, DOSE_TOTAL_MAXIMUM);
        validator
            .string("units", self.units.as_deref())
            .exists()
            .one_of(&DOSE_UNITS);
    }
}

/// Insulin injection or pen dose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insulin {
    #[serde(flatten)]
    pub base: Base,
    pub dose: Option<Dose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

pub fn new() -> Box<dyn Datum> {
    Box::new(Insulin {
        base: Base::new(TYPE),
        dose: None,
        site: None,
    })
}

impl Datum for Insulin {
    datum_common!(base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.base.parse(parser);
        self.dose = parser.object("dose").map(|mut child| {
            let dose = Dose::parse(&mut child);
            child.finish();
            dose
        });
        self.site = parser.string("site");
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.base.validate(validator);
        validator.present("dose", self.dose.as_ref()).exists();
        if let Some(dose) = &self.dose {
            dose.validate(&mut validator.child("dose"));
        }
        validator
            .string("site", self.site.as_deref())
            .length_in_range(1, SITE_LENGTH_MAXIMUM);
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.base.normalize(normalizer);
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.base.identity_fields()
    }
}
