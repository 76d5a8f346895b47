//! Loosely-typed JSON readers that record what was consumed.
//!
//! Every accessor marks its key as parsed whether or not the value was usable,
//! so [`ObjectParser::finish`] can report fields the record never looked at.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::issue::{self, Issue, Report};
use crate::pointer::Pointer;

pub struct ObjectParser<'a> {
    object: &'a Map<String, Value>,
    pointer: Pointer,
    report: &'a mut Report,
    parsed: BTreeSet<String>,
}

impl<'a> ObjectParser<'a> {
    pub fn new(object: &'a Map<String, Value>, pointer: Pointer, report: &'a mut Report) -> Self {
        Self {
            object,
            pointer,
            report,
            parsed: BTreeSet::new(),
        }
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    pub fn keys(&self) -> Vec<String> {
        self.object.keys().cloned().collect()
    }

    /// Looks at a value without marking it parsed.
    pub fn peek(&self, key: &str) -> Option<&'a Value> {
        match self.object.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    pub fn append_issue(&mut self, key: &str, issue: Issue) {
        self.report.append(&self.pointer.child(key), issue);
    }

    fn take(&mut self, key: &str) -> Option<&'a Value> {
        self.parsed.insert(key.to_string());
        self.peek(key)
    }

    pub fn string(&mut self, key: &str) -> Option<String> {
        let value = self.take(key)?;
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.append_issue(key, issue::value_not_type("string", value));
                None
            }
        }
    }

    pub fn float(&mut self, key: &str) -> Option<f64> {
        let value = self.take(key)?;
        match value.as_f64() {
            Some(f) => Some(f),
            None => {
                self.append_issue(key, issue::value_not_type("number", value));
                None
            }
        }
    }

    /// Accepts integral numbers, including floats without a fractional part.
    pub fn int(&mut self, key: &str) -> Option<i64> {
        let value = self.take(key)?;
        let parsed = value.as_i64().or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        });
        if parsed.is_none() {
            self.append_issue(key, issue::value_not_type("integer", value));
        }
        parsed
    }

    pub fn bool(&mut self, key: &str) -> Option<bool> {
        let value = self.take(key)?;
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.append_issue(key, issue::value_not_type("bool", value));
                None
            }
        }
    }

    pub fn string_array(&mut self, key: &str) -> Option<Vec<String>> {
        let value = self.take(key)?;
        let Some(array) = value.as_array() else {
            self.append_issue(key, issue::value_not_type("array", value));
            return None;
        };
        let mut out = Vec::with_capacity(array.len());
        let mut valid = true;
        for (index, element) in array.iter().enumerate() {
            match element.as_str() {
                Some(s) => out.push(s.to_string()),
                None => {
                    valid = false;
                    self.report.append(
                        &self.pointer.child(key).child(index),
                        issue::value_not_type("string", element),
                    );
                }
            }
        }
        valid.then_some(out)
    }

    /// RFC 3339 timestamp, converted to UTC.
    pub fn time(&mut self, key: &str) -> Option<DateTime<Utc>> {
        let value = self.take(key)?;
        let Some(raw) = value.as_str() else {
            self.append_issue(key, issue::value_not_type("string", value));
            return None;
        };
        match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(_) => {
                self.append_issue(key, issue::value_time_not_parsable(raw, "RFC3339"));
                None
            }
        }
    }

    /// Opaque JSON object kept as-is.
    pub fn json_object(&mut self, key: &str) -> Option<Map<String, Value>> {
        let value = self.take(key)?;
        match value.as_object() {
            Some(object) => Some(object.clone()),
            None => {
                self.append_issue(key, issue::value_not_type("object", value));
                None
            }
        }
    }

    /// Opaque JSON array kept as-is.
    pub fn json_array(&mut self, key: &str) -> Option<Vec<Value>> {
        let value = self.take(key)?;
        match value.as_array() {
            Some(array) => Some(array.clone()),
            None => {
                self.append_issue(key, issue::value_not_type("array", value));
                None
            }
        }
    }

    pub fn object(&mut self, key: &str) -> Option<ObjectParser<'_>> {
        let value = self.take(key)?;
        match value.as_object() {
            Some(object) => Some(ObjectParser::new(object, self.pointer.child(key), &mut *self.report)),
            None => {
                self.append_issue(key, issue::value_not_type("object", value));
                None
            }
        }
    }

    pub fn array(&mut self, key: &str) -> Option<ArrayParser<'_>> {
        let value = self.take(key)?;
        match value.as_array() {
            Some(array) => Some(ArrayParser::new(array, self.pointer.child(key), &mut *self.report)),
            None => {
                self.append_issue(key, issue::value_not_type("array", value));
                None
            }
        }
    }

    /// Reports every present key no accessor consumed.
    pub fn finish(self) {
        for key in self.object.keys() {
            if !self.parsed.contains(key) {
                self.report.append(&self.pointer.child(key), issue::value_not_parsed());
            }
        }
    }
}

pub struct ArrayParser<'a> {
    array: &'a [Value],
    pointer: Pointer,
    report: &'a mut Report,
}

impl<'a> ArrayParser<'a> {
    pub fn new(array: &'a [Value], pointer: Pointer, report: &'a mut Report) -> Self {
        Self { array, pointer, report }
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    pub fn object(&mut self, index: usize) -> Option<ObjectParser<'_>> {
        let value = self.array.get(index)?;
        match value.as_object() {
            Some(object) => Some(ObjectParser::new(object, self.pointer.child(index), &mut *self.report)),
            None => {
                self.report
                    .append(&self.pointer.child(index), issue::value_not_type("object", value));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object fixture")
    }

    #[test]
    fn reads_typed_values_and_reports_mismatches() {
        let raw = object(json!({
            "units": "mmol/L",
            "value": "high",
            "duration": 3600000.0,
            "rate": 0.75,
            "flag": 1
        }));
        let mut report = Report::new();
        let mut parser = ObjectParser::new(&raw, Pointer::root().child(2), &mut report);

        assert_eq!(parser.string("units").as_deref(), Some("mmol/L"));
        assert_eq!(parser.float("value"), None);
        assert_eq!(parser.int("duration"), Some(3_600_000));
        assert_eq!(parser.int("rate"), None);
        assert_eq!(parser.bool("flag"), None);
        assert_eq!(parser.string("missing"), None);
        parser.finish();

        assert_eq!(report.pointers(), vec!["/2/value", "/2/rate", "/2/flag"]);
        assert!(report.issues().iter().all(|i| i.code == issue::CODE_VALUE_NOT_TYPE));
        assert_eq!(report.issues()[0].detail, "type is not number, but string");
    }

    #[test]
    fn null_values_are_treated_as_absent() {
        let raw = object(json!({ "value": null }));
        let mut report = Report::new();
        let mut parser = ObjectParser::new(&raw, Pointer::root(), &mut report);
        assert_eq!(parser.float("value"), None);
        parser.finish();
        assert!(report.is_empty());
    }

    #[test]
    fn finish_reports_unconsumed_fields() {
        let raw = object(json!({ "units": "mmol/L", "colour": "blue", "extra": 1 }));
        let mut report = Report::new();
        let mut parser = ObjectParser::new(&raw, Pointer::root().child(0), &mut report);
        parser.string("units");
        parser.finish();

        assert_eq!(report.pointers(), vec!["/0/colour", "/0/extra"]);
        assert!(report.issues().iter().all(|i| i.code == issue::CODE_VALUE_NOT_PARSED));
    }

    #[test]
    fn nested_objects_and_string_arrays_are_path_tagged() {
        let raw = object(json!({
            "change": { "from": "2024-01-01T00:00:00", "bogus": true },
            "reasons": ["travel", 7],
            "time": "yesterday"
        }));
        let mut report = Report::new();
        let mut parser = ObjectParser::new(&raw, Pointer::root().child(1), &mut report);
        {
            let mut change = parser.object("change").expect("change object");
            assert_eq!(change.string("from").as_deref(), Some("2024-01-01T00:00:00"));
            change.finish();
        }
        assert_eq!(parser.string_array("reasons"), None);
        assert_eq!(parser.time("time"), None);
        parser.finish();

        assert_eq!(report.pointers(), vec!["/1/change/bogus", "/1/reasons/1", "/1/time"]);
        assert_eq!(report.issues()[2].code, issue::CODE_TIME_NOT_PARSABLE);
    }

    #[test]
    fn parses_rfc3339_time_into_utc() {
        let raw = object(json!({ "time": "2024-05-01T14:30:00+02:00" }));
        let mut report = Report::new();
        let mut parser = ObjectParser::new(&raw, Pointer::root(), &mut report);
        let time = parser.time("time").expect("time");
        assert_eq!(time.to_rfc3339(), "2024-05-01T12:30:00+00:00");
    }

    #[test]
    fn array_parser_flags_non_object_elements() {
        let raw = json!([{ "start": 0 }, 5]);
        let array = raw.as_array().expect("array");
        let mut report = Report::new();
        let mut parser = ArrayParser::new(array, Pointer::root().child("schedule"), &mut report);
        assert_eq!(parser.len(), 2);
        if let Some(mut entry) = parser.object(0) {
            assert_eq!(entry.int("start"), Some(0));
            entry.finish();
        }
        assert!(parser.object(1).is_none());
        assert_eq!(report.pointers(), vec!["/schedule/1"]);
    }
}
