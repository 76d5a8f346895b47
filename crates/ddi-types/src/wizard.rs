//! Bolus calculator record. A client may embed the resulting bolus inline;
//! normalization splits it out into its own record and keeps a reference.

use ddi_core::issue;
use ddi_core::{new_id, Base, Datum, IdentityError, Normalizer, ObjectParser, Validator};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{bolus, glucose};

pub const TYPE: &str = "wizard";

pub const CARB_INPUT_MINIMUM: f64 = 0.0;
pub const CARB_INPUT_MAXIMUM: f64 = 1000.0;
pub const INSULIN_ON_BOARD_MINIMUM: f64 = 0.0;
pub const INSULIN_ON_BOARD_MAXIMUM: f64 = 250.0;
pub const INSULIN_CARB_RATIO_MINIMUM: f64 = 0.0;
pub const INSULIN_CARB_RATIO_MAXIMUM: f64 = 250.0;
pub const RECOMMENDED_CARB_MINIMUM: f64 = 0.0;
pub const RECOMMENDED_CARB_MAXIMUM: f64 = 250.0;
pub const RECOMMENDED_CORRECTION_MINIMUM: f64 = -250.0;
pub const RECOMMENDED_CORRECTION_MAXIMUM: f64 = 250.0;
pub const RECOMMENDED_NET_MINIMUM: f64 = -250.0;
pub const RECOMMENDED_NET_MAXIMUM: f64 = 250.0;

#[derive(Debug, Clone)]
pub enum WizardBolus {
    Embedded(Box<dyn Datum>),
    Reference(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommended {
    pub carb: Option<f64>,
    pub correction: Option<f64>,
    pub net: Option<f64>,
}

impl Recommended {
    fn parse(parser: &mut ObjectParser<'_>) -> Self {
        Self {
            carb: parser.float("carb"),
            correction: parser.float("correction"),
            net: parser.float("net"),
        }
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        validator
            .float("carb", self.carb)
            .in_range(RECOMMENDED_CARB_MINIMUM, RECOMMENDED_CARB_MAXIMUM);
        validator
            .float("correction", self.correction)
            .in_range(RECOMMENDED_CORRECTION_MINIMUM, RECOMMENDED_CORRECTION_MAXIMUM);
        validator
            .float("net", self.net)
            .in_range(RECOMMENDED_NET_MINIMUM, RECOMMENDED_NET_MAXIMUM);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wizard {
    #[serde(flatten)]
    pub base: Base,
    #[serde(skip)]
    pub bolus: Option<WizardBolus>,
    pub bg_input: Option<f64>,
    pub carb_input: Option<f64>,
    pub insulin_on_board: Option<f64>,
    pub insulin_carb_ratio: Option<f64>,
    pub insulin_sensitivity: Option<f64>,
    pub recommended: Option<Recommended>,
    pub units: Option<String>,
}

pub fn new() -> Box<dyn Datum> {
    Box::new(Wizard {
        base: Base::new(TYPE),
        bolus: None,
        bg_input: None,
        carb_input: None,
        insulin_on_board: None,
        insulin_carb_ratio: None,
        insulin_sensitivity: None,
        recommended: None,
        units: None,
    })
}

fn parse_bolus(parser: &mut ObjectParser<'_>) -> Option<WizardBolus> {
    match parser.peek("bolus")? {
        Value::String(_) => parser.string("bolus").map(WizardBolus::Reference),
        Value::Object(_) => {
            let mut child = parser.object("bolus")?;
            let mut datum = resolve_embedded_bolus(&mut child)?;
            datum.parse(&mut child);
            child.finish();
            Some(WizardBolus::Embedded(datum))
        }
        _ => {
            parser.object("bolus");
            None
        }
    }
}

fn resolve_embedded_bolus(parser: &mut ObjectParser<'_>) -> Option<Box<dyn Datum>> {
    match parser.string("type") {
        None => {
            parser.append_issue("type", issue::value_not_exists());
            return None;
        }
        Some(datum_type) if datum_type != bolus::TYPE => {
            parser.append_issue("type", issue::type_invalid(&datum_type));
            return None;
        }
        Some(_) => {}
    }
    let Some(sub_type) = parser.string(bolus::SUB_TYPE_FIELD) else {
        parser.append_issue(bolus::SUB_TYPE_FIELD, issue::value_not_exists());
        return None;
    };
    let datum = bolus::new_for_sub_type(&sub_type);
    if datum.is_none() {
        parser.append_issue(
            bolus::SUB_TYPE_FIELD,
            issue::sub_type_invalid(bolus::SUB_TYPE_FIELD, &sub_type),
        );
    }
    datum
}

impl Datum for Wizard {
    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.base.parse(parser);
        self.bolus = parse_bolus(parser);
        self.bg_input = parser.float("bgInput");
        self.carb_input = parser.float("carbInput");
        self.insulin_on_board = parser.float("insulinOnBoard");
        self.insulin_carb_ratio = parser.float("insulinCarbRatio");
        self.insulin_sensitivity = parser.float("insulinSensitivity");
        self.recommended = parser.object("recommended").map(|mut child| {
            let recommended = Recommended::parse(&mut child);
            child.finish();
            recommended
        });
        self.units = parser.string("units");
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.base.validate(validator);
        match &self.bolus {
            Some(WizardBolus::Embedded(datum)) => datum.validate(&mut validator.child("bolus")),
            Some(WizardBolus::Reference(id)) => {
                validator.string("bolus", Some(id.as_str())).not_empty();
            }
            None => {}
        }

        let units = self.units.as_deref();
        validator.string("units", units).exists().one_of(&glucose::UNITS);
        let bg_range = glucose::value_range_for_units(units);
        for (reference, value) in [("bgInput", self.bg_input), ("insulinSensitivity", self.insulin_sensitivity)] {
            let check = validator.float(reference, value);
            if let Some((lower, upper)) = bg_range {
                check.in_range(lower, upper);
            }
        }
        validator
            .float("carbInput", self.carb_input)
            .in_range(CARB_INPUT_MINIMUM, CARB_INPUT_MAXIMUM);
        validator
            .float("insulinOnBoard", self.insulin_on_board)
            .in_range(INSULIN_ON_BOARD_MINIMUM, INSULIN_ON_BOARD_MAXIMUM);
        validator
            .float("insulinCarbRatio", self.insulin_carb_ratio)
            .in_range(INSULIN_CARB_RATIO_MINIMUM, INSULIN_CARB_RATIO_MAXIMUM);
        if let Some(recommended) = &self.recommended {
            recommended.validate(&mut validator.child("recommended"));
        }
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.base.normalize(normalizer);
        if !normalizer.rewrites() {
            return;
        }
        let units = self.units.as_deref();
        self.bg_input = glucose::normalize_value_for_units(self.bg_input, units);
        self.insulin_sensitivity = glucose::normalize_value_for_units(self.insulin_sensitivity, units);
        self.units = glucose::normalize_units(units);

        self.bolus = match self.bolus.take() {
            Some(WizardBolus::Embedded(mut datum)) => {
                datum.normalize(normalizer);
                let id = datum.base().id.clone().unwrap_or_else(new_id);
                datum.base_mut().id = Some(id.clone());
                normalizer.add_data(datum);
                Some(WizardBolus::Reference(id))
            }
            other => other,
        };
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.base.identity_fields()
    }

    fn to_document(&self) -> serde_json::Result<Value> {
        let mut document = serde_json::to_value(self)?;
        let bolus = match &self.bolus {
            Some(WizardBolus::Embedded(datum)) => Some(datum.to_document()?),
            Some(WizardBolus::Reference(id)) => Some(Value::String(id.clone())),
            None => None,
        };
        if let (Value::Object(map), Some(bolus)) = (&mut document, bolus) {
            map.insert("bolus".to_string(), bolus);
        }
        Ok(document)
    }

    fn clone_datum(&self) -> Box<dyn Datum> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddi_core::issue::{CODE_TYPE_INVALID, CODE_VALUE_OUT_OF_RANGE};
    use ddi_core::{Origin, Pointer, Report};
    use serde_json::json;

    fn parse(raw: serde_json::Value, report: &mut Report) -> Box<dyn Datum> {
        let mut datum = new();
        let mut parser = ObjectParser::new(raw.as_object().expect("object"), Pointer::root().child(0), report);
        datum.parse(&mut parser);
        parser.finish();
        datum
    }

    fn fixture() -> serde_json::Value {
        json!({
            "deviceId": "pump-1",
            "time": "2024-04-01T08:00:00Z",
            "units": "mg/dL",
            "bgInput": 180,
            "carbInput": 45,
            "insulinCarbRatio": 15,
            "recommended": { "carb": 3.0, "correction": 1.0, "net": 4.0 },
            "bolus": {
                "type": "bolus",
                "subType": "normal",
                "deviceId": "pump-1",
                "time": "2024-04-01T08:00:05Z",
                "normal": 4.0
            }
        })
    }

    #[test]
    fn external_normalization_splits_embedded_bolus() {
        let mut report = Report::new();
        let mut datum = parse(fixture(), &mut report);
        datum.validate(&mut Validator::new(&mut report, Origin::External));
        assert!(report.is_empty(), "{:?}", report.issues());

        let mut normalizer = Normalizer::new(Origin::External);
        datum.normalize(&mut normalizer);

        let derived = normalizer.data();
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].datum_type(), "bolus");
        let bolus_id = derived[0].base().id.clone().expect("derived bolus id");

        let document = datum.to_document().expect("document");
        assert_eq!(document["bolus"], bolus_id.as_str());
        assert_eq!(document["units"], "mmol/L");
        assert_eq!(document["bgInput"], 9.99135);

        let mut again = Normalizer::new(Origin::External);
        datum.normalize(&mut again);
        assert!(again.data().is_empty());
    }

    #[test]
    fn internal_origin_keeps_embedded_bolus() {
        let mut report = Report::new();
        let mut datum = parse(fixture(), &mut report);
        let mut normalizer = Normalizer::new(Origin::Internal);
        datum.normalize(&mut normalizer);
        assert!(normalizer.data().is_empty());
        let document = datum.to_document().expect("document");
        assert_eq!(document["bolus"]["subType"], "normal");
        assert_eq!(document["units"], "mg/dL");
    }

    #[test]
    fn embedded_bolus_errors_are_path_tagged() {
        let mut raw = fixture();
        raw["bolus"]["normal"] = json!(101.0);
        raw["recommended"]["net"] = json!(-300.0);
        let mut report = Report::new();
        let datum = parse(raw, &mut report);
        datum.validate(&mut Validator::new(&mut report, Origin::External).with_pointer(Pointer::root().child(0)));
        let tagged: Vec<(&str, &str)> = report
            .issues()
            .iter()
            .map(|i| (i.pointer().unwrap_or_default(), i.code.as_str()))
            .collect();
        assert_eq!(
            tagged,
            vec![("/0/bolus/normal", CODE_VALUE_OUT_OF_RANGE), ("/0/recommended/net", CODE_VALUE_OUT_OF_RANGE)]
        );

        let mut raw = fixture();
        raw["bolus"]["type"] = json!("basal");
        let mut report = Report::new();
        parse(raw, &mut report);
        assert_eq!(report.pointers(), vec!["/0/bolus/type"]);
        assert_eq!(report.issues()[0].code, CODE_TYPE_INVALID);
    }

    #[test]
    fn bolus_reference_is_kept() {
        let mut raw = fixture();
        raw["bolus"] = json!("0123456789abcdef");
        let mut report = Report::new();
        let datum = parse(raw, &mut report);
        assert!(report.is_empty());
        assert_eq!(datum.to_document().expect("document")["bolus"], "0123456789abcdef");
    }
}
