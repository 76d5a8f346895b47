use ddi_core::{Datum, Issue, Normalizer, Origin, Pointer, Report, Validator};
use ddi_types::{Parsed, Registry};
use serde_json::Value;

/// Parse, validate and normalize one submitted batch. Nothing is normalized
/// unless every record parsed and validated cleanly.
#[derive(Debug)]
pub struct Pipeline {
    registry: Registry,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl Pipeline {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn standard() -> Self {
        Self::new(Registry::standard())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the normalized records followed by any records normalization
    /// synthesized, or every issue found across the batch.
    pub fn process(&self, raw: &[Value], origin: Origin) -> Result<Vec<Box<dyn Datum>>, Vec<Issue>> {
        let mut report = Report::new();
        let parsed = self.registry.parse_array(raw, &mut report);
        for Parsed { index, datum } in &parsed {
            let mut validator = Validator::new(&mut report, origin).with_pointer(Pointer::root().child(*index));
            datum.validate(&mut validator);
        }
        if !report.is_empty() {
            return Err(report.into_issues());
        }

        let mut normalizer = Normalizer::new(origin);
        let mut data = Vec::with_capacity(parsed.len());
        for Parsed { mut datum, .. } in parsed {
            datum.normalize(&mut normalizer);
            data.push(datum);
        }
        data.extend(normalizer.into_data());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddi_core::issue::{CODE_TYPE_INVALID, CODE_VALUE_NOT_TYPE, CODE_VALUE_OUT_OF_RANGE};
    use serde_json::json;

    fn batch(value: Value) -> Vec<Value> {
        value.as_array().expect("array").clone()
    }

    #[test]
    fn issues_from_every_record_are_returned_together() {
        let pipeline = Pipeline::standard();
        let raw = batch(json!([
            { "type": "cbg", "deviceId": "d", "time": "2024-05-01T12:00:00Z", "units": "mmol/L", "value": 5.5 },
            "not an object",
            { "type": "cbg", "deviceId": "d", "time": "2024-05-01T12:05:00Z", "units": "mmol/L", "value": 56.0 },
            { "type": "food", "deviceId": "d", "time": "2024-05-01T12:10:00Z" }
        ]));
        let issues = pipeline.process(&raw, Origin::External).expect_err("invalid");
        let tagged: Vec<(&str, &str)> = issues
            .iter()
            .map(|i| (i.pointer().unwrap_or_default(), i.code.as_str()))
            .collect();
        assert_eq!(
            tagged,
            vec![
                ("/1", CODE_VALUE_NOT_TYPE),
                ("/3/type", CODE_TYPE_INVALID),
                ("/2/value", CODE_VALUE_OUT_OF_RANGE),
            ]
        );
    }

    #[test]
    fn external_origin_rewrites_units_once() {
        let pipeline = Pipeline::standard();
        let raw = batch(json!([
            { "type": "smbg", "deviceId": "meter", "time": "2024-05-01T12:00:00Z", "units": "mg/dL", "value": 100 }
        ]));
        let data = pipeline.process(&raw, Origin::External).expect("valid");
        let document = data[0].to_document().expect("document");
        assert_eq!(document["units"], "mmol/L");
        assert_eq!(document["value"], 5.55075);

        let again = pipeline
            .process(&[document.clone()], Origin::External)
            .expect("valid");
        assert_eq!(again[0].to_document().expect("document")["value"], 5.55075);
    }

    #[test]
    fn internal_origin_is_untouched() {
        let pipeline = Pipeline::standard();
        let raw = batch(json!([
            { "type": "cbg", "deviceId": "cgm", "time": "2024-05-01T12:00:00Z", "units": "mg/dl", "value": 180 }
        ]));
        let first = pipeline.process(&raw, Origin::Internal).expect("valid");
        let document = first[0].to_document().expect("document");
        assert_eq!(document["units"], "mg/dl");
        assert_eq!(document["value"], 180.0);

        let second = pipeline.process(&[document.clone()], Origin::Internal).expect("valid");
        assert_eq!(second[0].to_document().expect("document"), document);
    }

    #[test]
    fn synthesized_records_follow_the_batch() {
        let pipeline = Pipeline::standard();
        let raw = batch(json!([
            {
                "type": "wizard", "deviceId": "pump", "time": "2024-05-01T12:00:00Z", "units": "mmol/L",
                "bgInput": 6.2, "carbInput": 30,
                "bolus": { "type": "bolus", "subType": "normal", "deviceId": "pump", "time": "2024-05-01T12:00:00Z", "normal": 2.5 }
            },
            { "type": "cbg", "deviceId": "pump", "time": "2024-05-01T12:05:00Z", "units": "mmol/L", "value": 6.0 }
        ]));
        let data = pipeline.process(&raw, Origin::External).expect("valid");
        let types: Vec<&str> = data.iter().map(|d| d.datum_type()).collect();
        assert_eq!(types, vec!["wizard", "cbg", "bolus"]);
        let bolus_id = data[2].base().id.clone().expect("id");
        assert_eq!(data[0].to_document().expect("document")["bolus"], bolus_id.as_str());
    }
}
