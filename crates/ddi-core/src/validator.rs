//! Chained field checks that append path-tagged issues and never mutate.
//!
//! ```ignore
//! validator.float("value", self.value).exists().in_range(0.0, 10.0);
//! validator.string("units", self.units.as_deref()).exists().one_of(&["mmol/L", "mmol/l"]);
//! ```

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::datum::Origin;
use crate::issue::{self, Issue, Report};
use crate::pointer::Pointer;

pub struct Validator<'a> {
    pointer: Pointer,
    report: &'a mut Report,
    origin: Origin,
    now: DateTime<Utc>,
}

impl<'a> Validator<'a> {
    pub fn new(report: &'a mut Report, origin: Origin) -> Self {
        Self {
            pointer: Pointer::root(),
            report,
            origin,
            now: Utc::now(),
        }
    }

    pub fn with_pointer(mut self, pointer: Pointer) -> Self {
        self.pointer = pointer;
        self
    }

    /// Pins the clock used by "not after now" checks.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    pub fn child(&mut self, reference: impl fmt::Display) -> Validator<'_> {
        Validator {
            pointer: self.pointer.child(reference),
            report: &mut *self.report,
            origin: self.origin,
            now: self.now,
        }
    }

    pub fn report_issue(&mut self, reference: impl fmt::Display, issue: Issue) {
        self.report.append(&self.pointer.child(reference), issue);
    }

    pub fn float(&mut self, reference: &str, value: Option<f64>) -> Check<'_, f64> {
        self.check(reference, value)
    }

    pub fn int(&mut self, reference: &str, value: Option<i64>) -> Check<'_, i64> {
        self.check(reference, value)
    }

    pub fn string<'v>(&mut self, reference: &str, value: Option<&'v str>) -> Check<'_, &'v str> {
        self.check(reference, value)
    }

    pub fn string_array<'v>(&mut self, reference: &str, value: Option<&'v [String]>) -> Check<'_, &'v [String]> {
        self.check(reference, value)
    }

    pub fn time(&mut self, reference: &str, value: Option<DateTime<Utc>>) -> Check<'_, DateTime<Utc>> {
        self.check(reference, value)
    }

    /// Existence-only checks for nested structures.
    pub fn present<T>(&mut self, reference: &str, value: Option<&T>) -> Check<'_, ()> {
        self.check(reference, value.map(|_| ()))
    }

    fn check<T>(&mut self, reference: &str, value: Option<T>) -> Check<'_, T> {
        Check {
            pointer: self.pointer.child(reference),
            report: &mut *self.report,
            now: self.now,
            value,
        }
    }
}

/// One field under validation. Checks on an absent value are skipped, so
/// `exists()` is what reports absence.
pub struct Check<'a, T> {
    pointer: Pointer,
    report: &'a mut Report,
    now: DateTime<Utc>,
    value: Option<T>,
}

impl<T> Check<'_, T> {
    fn fail(&mut self, issue: Issue) {
        self.report.append(&self.pointer, issue);
    }

    pub fn exists(mut self) -> Self {
        if self.value.is_none() {
            self.fail(issue::value_not_exists());
        }
        self
    }

    pub fn not_exists(mut self) -> Self {
        if self.value.is_some() {
            self.fail(issue::value_exists());
        }
        self
    }
}

impl Check<'_, f64> {
    pub fn in_range(mut self, lower: f64, upper: f64) -> Self {
        if let Some(value) = self.value {
            if !(lower..=upper).contains(&value) {
                self.fail(issue::value_not_in_range(value, lower, upper));
            }
        }
        self
    }

    pub fn greater_than_or_equal_to(mut self, limit: f64) -> Self {
        if let Some(value) = self.value {
            if value.is_nan() || value < limit {
                self.fail(issue::value_not_greater_than_or_equal_to(value, limit));
            }
        }
        self
    }
}

impl Check<'_, i64> {
    pub fn in_range(mut self, lower: i64, upper: i64) -> Self {
        if let Some(value) = self.value {
            if !(lower..=upper).contains(&value) {
                self.fail(issue::value_not_in_range(value, lower, upper));
            }
        }
        self
    }

    pub fn greater_than_or_equal_to(mut self, limit: i64) -> Self {
        if let Some(value) = self.value {
            if value < limit {
                self.fail(issue::value_not_greater_than_or_equal_to(value, limit));
            }
        }
        self
    }
}

impl Check<'_, &str> {
    pub fn not_empty(mut self) -> Self {
        if self.value.is_some_and(str::is_empty) {
            self.fail(issue::value_empty());
        }
        self
    }

    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        if let Some(value) = self.value {
            if !allowed.contains(&value) {
                self.fail(issue::value_not_one_of(value, allowed));
            }
        }
        self
    }

    pub fn length_in_range(mut self, lower: usize, upper: usize) -> Self {
        if let Some(value) = self.value {
            let length = value.chars().count();
            if !(lower..=upper).contains(&length) {
                self.fail(issue::length_not_in_range(length, lower, upper));
            }
        }
        self
    }

    pub fn length_greater_than(mut self, limit: usize) -> Self {
        if let Some(value) = self.value {
            let length = value.chars().count();
            if length <= limit {
                self.fail(issue::length_not_greater_than(length, limit));
            }
        }
        self
    }

    /// Value must parse as a zone-less time of `layout` (chrono strftime syntax).
    pub fn as_time(mut self, layout: &str) -> Self {
        if let Some(value) = self.value {
            if NaiveDateTime::parse_from_str(value, layout).is_err() {
                self.fail(issue::value_time_not_parsable(value, layout));
            }
        }
        self
    }
}

impl Check<'_, &[String]> {
    pub fn not_empty(mut self) -> Self {
        if self.value.is_some_and(|v| v.is_empty()) {
            self.fail(issue::value_empty());
        }
        self
    }

    pub fn length_in_range(mut self, lower: usize, upper: usize) -> Self {
        if let Some(value) = self.value {
            if !(lower..=upper).contains(&value.len()) {
                self.fail(issue::length_not_in_range(value.len(), lower, upper));
            }
        }
        self
    }

    pub fn each_not_empty(mut self) -> Self {
        if let Some(value) = self.value {
            for (index, element) in value.iter().enumerate() {
                if element.is_empty() {
                    self.report.append(&self.pointer.child(index), issue::value_empty());
                }
            }
        }
        self
    }

    pub fn each_one_of(mut self, allowed: &[&str]) -> Self {
        if let Some(value) = self.value {
            for (index, element) in value.iter().enumerate() {
                if !allowed.contains(&element.as_str()) {
                    self.report
                        .append(&self.pointer.child(index), issue::value_not_one_of(element, allowed));
                }
            }
        }
        self
    }

    pub fn each_unique(mut self) -> Self {
        if let Some(value) = self.value {
            let mut seen = HashSet::new();
            for (index, element) in value.iter().enumerate() {
                if !seen.insert(element.as_str()) {
                    self.report.append(&self.pointer.child(index), issue::value_duplicate());
                }
            }
        }
        self
    }
}

impl Check<'_, DateTime<Utc>> {
    pub fn not_after_now(mut self) -> Self {
        if let Some(value) = self.value {
            if value > self.now {
                self.fail(issue::value_time_after_now());
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn accumulates_every_failed_check() {
        let mut report = Report::new();
        let mut validator = Validator::new(&mut report, Origin::External).with_pointer(Pointer::root().child(4));
        validator.float("value", Some(10.1)).exists().in_range(0.0, 10.0);
        validator.string("units", None).exists().one_of(&["mmol/L"]);
        validator.int("duration", Some(-1)).greater_than_or_equal_to(0);
        validator.string("deviceId", Some("")).exists().not_empty();

        assert_eq!(report.pointers(), vec!["/4/value", "/4/units", "/4/duration", "/4/deviceId"]);
        assert_eq!(report.issues()[1].code, issue::CODE_VALUE_NOT_EXISTS);
        assert_eq!(report.issues()[3].code, issue::CODE_VALUE_EMPTY);
    }

    #[test]
    fn nan_is_never_in_range() {
        let mut report = Report::new();
        let mut validator = Validator::new(&mut report, Origin::External);
        validator.float("value", Some(f64::NAN)).in_range(0.0, 10.0);
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn array_checks_tag_element_index() {
        let tags = vec!["cgm".to_string(), "pump".to_string(), "cgm".to_string()];
        let mut report = Report::new();
        let mut validator = Validator::new(&mut report, Origin::External);
        validator
            .string_array("deviceTags", Some(tags.as_slice()))
            .length_in_range(1, 3)
            .each_one_of(&["insulin-pump", "cgm", "bgm"])
            .each_unique();

        assert_eq!(report.pointers(), vec!["/deviceTags/1", "/deviceTags/2"]);
        assert_eq!(report.issues()[1].code, issue::CODE_VALUE_DUPLICATE);
    }

    #[test]
    fn child_validator_extends_pointer() {
        let mut report = Report::new();
        let mut validator = Validator::new(&mut report, Origin::Internal).with_pointer(Pointer::root().child(0));
        {
            let mut dose = validator.child("dose");
            dose.float("total", None).exists();
            assert_eq!(dose.origin(), Origin::Internal);
        }
        validator.report_issue("bolus", issue::value_not_valid("reference is unknown"));
        assert_eq!(report.pointers(), vec!["/0/dose/total", "/0/bolus"]);
    }

    #[test]
    fn time_checks() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().expect("valid time");
        let mut report = Report::new();
        let mut validator = Validator::new(&mut report, Origin::External).with_now(now);
        validator.time("time", Some(now + chrono::Duration::seconds(1))).not_after_now();
        validator.time("createdTime", Some(now)).not_after_now();
        validator.string("deviceTime", Some("2024-05-01 10:00")).as_time("%Y-%m-%dT%H:%M:%S");
        validator.string("computerTime", Some("2024-05-01T10:00:00")).as_time("%Y-%m-%dT%H:%M:%S");

        assert_eq!(report.pointers(), vec!["/time", "/deviceTime"]);
    }
}
