//! Pump configuration snapshot: basal schedules, ratios and targets.

use std::collections::BTreeMap;

use ddi_core::issue;
use ddi_core::{ArrayParser, Base, Datum, IdentityError, Normalizer, ObjectParser, Validator};
use serde::{Deserialize, Serialize};

use crate::{basal, glucose};

pub const TYPE: &str = "pumpSettings";

pub const CARB_UNITS: [&str; 2] = ["exchanges", "grams"];
pub const START_MINIMUM: i64 = 0;
pub const START_MAXIMUM: i64 = 86_400_000;
pub const CARB_RATIO_MINIMUM: f64 = 0.0;
pub const CARB_RATIO_MAXIMUM: f64 = 250.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Units {
    pub carb: Option<String>,
    pub bg: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasalScheduleEntry {
    pub start: Option<i64>,
    pub rate: Option<f64>,
}

impl BasalScheduleEntry {
    fn parse(parser: &mut ObjectParser<'_>) -> Self {
        Self {
            start: parser.int("start"),
            rate: parser.float("rate"),
        }
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        validator
            .int("start", self.start)
            .exists()
            .in_range(START_MINIMUM, START_MAXIMUM);
        validator
            .float("rate", self.rate)
            .exists()
            .in_range(basal::RATE_MINIMUM, basal::RATE_MAXIMUM);
    }
}

/// `amount` of carb ratio or insulin sensitivity, or `target` glucose,
/// starting at `start` milliseconds into the day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmountEntry {
    pub start: Option<i64>,
    pub amount: Option<f64>,
}

impl AmountEntry {
    fn parse(parser: &mut ObjectParser<'_>) -> Self {
        Self {
            start: parser.int("start"),
            amount: parser.float("amount"),
        }
    }

    fn validate(&self, validator: &mut Validator<'_>, range: Option<(f64, f64)>) {
        validator
            .int("start", self.start)
            .exists()
            .in_range(START_MINIMUM, START_MAXIMUM);
        let amount = validator.float("amount", self.amount).exists();
        if let Some((lower, upper)) = range {
            amount.in_range(lower, upper);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub start: Option<i64>,
    pub target: Option<f64>,
}

impl TargetEntry {
    fn parse(parser: &mut ObjectParser<'_>) -> Self {
        Self {
            start: parser.int("start"),
            target: parser.float("target"),
        }
    }

    fn validate(&self, validator: &mut Validator<'_>, range: Option<(f64, f64)>) {
        validator
            .int("start", self.start)
            .exists()
            .in_range(START_MINIMUM, START_MAXIMUM);
        let target = validator.float("target", self.target).exists();
        if let Some((lower, upper)) = range {
            target.in_range(lower, upper);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpSettings {
    #[serde(flatten)]
    pub base: Base,
    pub active_schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basal_schedules: Option<BTreeMap<String, Vec<BasalScheduleEntry>>>,
    pub units: Option<Units>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carb_ratio: Option<Vec<AmountEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insulin_sensitivity: Option<Vec<AmountEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_target: Option<Vec<TargetEntry>>,
}

pub fn new() -> Box<dyn Datum> {
    Box::new(PumpSettings {
        base: Base::new(TYPE),
        active_schedule: None,
        basal_schedules: None,
        units: None,
        carb_ratio: None,
        insulin_sensitivity: None,
        bg_target: None,
    })
}

fn parse_entries<T>(array: &mut ArrayParser<'_>, parse: fn(&mut ObjectParser<'_>) -> T) -> Vec<T> {
    let mut out = Vec::with_capacity(array.len());
    for index in 0..array.len() {
        if let Some(mut entry) = array.object(index) {
            out.push(parse(&mut entry));
            entry.finish();
        }
    }
    out
}

fn parse_entry_array<T>(
    parser: &mut ObjectParser<'_>,
    key: &str,
    parse: fn(&mut ObjectParser<'_>) -> T,
) -> Option<Vec<T>> {
    parser.array(key).map(|mut array| parse_entries(&mut array, parse))
}

/// Entries must be ordered by strictly increasing `start`.
fn validate_starts(validator: &mut Validator<'_>, starts: impl Iterator<Item = Option<i64>>) {
    let mut previous: Option<i64> = None;
    for (index, start) in starts.enumerate() {
        if let (Some(prev), Some(current)) = (previous, start) {
            if current <= prev {
                validator.child(index).report_issue(
                    "start",
                    issue::value_not_valid(format!("start {current} is not after previous start {prev}")),
                );
            }
        }
        if start.is_some() {
            previous = start;
        }
    }
}

impl Datum for PumpSettings {
    datum_common!(base);

    fn parse(&mut self, parser: &mut ObjectParser<'_>) {
        self.base.parse(parser);
        self.active_schedule = parser.string("activeSchedule");
        self.basal_schedules = parser.object("basalSchedules").map(|mut schedules| {
            let mut out = BTreeMap::new();
            for name in schedules.keys() {
                if let Some(mut array) = schedules.array(&name) {
                    let entries = parse_entries(&mut array, BasalScheduleEntry::parse);
                    out.insert(name, entries);
                }
            }
            schedules.finish();
            out
        });
        self.units = parser.object("units").map(|mut units| {
            let parsed = Units {
                carb: units.string("carb"),
                bg: units.string("bg"),
            };
            units.finish();
            parsed
        });
        self.carb_ratio = parse_entry_array(parser, "carbRatio", AmountEntry::parse);
        self.insulin_sensitivity = parse_entry_array(parser, "insulinSensitivity", AmountEntry::parse);
        self.bg_target = parse_entry_array(parser, "bgTarget", TargetEntry::parse);
    }

    fn validate(&self, validator: &mut Validator<'_>) {
        self.base.validate(validator);
        validator
            .string("activeSchedule", self.active_schedule.as_deref())
            .exists()
            .not_empty();
        if let Some(schedules) = &self.basal_schedules {
            let mut schedules_validator = validator.child("basalSchedules");
            for (name, entries) in schedules {
                let mut schedule_validator = schedules_validator.child(name);
                validate_starts(&mut schedule_validator, entries.iter().map(|e| e.start));
                for (index, entry) in entries.iter().enumerate() {
                    entry.validate(&mut schedule_validator.child(index));
                }
            }
            if let Some(active) = self.active_schedule.as_deref().filter(|a| !a.is_empty()) {
                if !schedules.contains_key(active) {
                    validator.report_issue(
                        "activeSchedule",
                        issue::value_not_valid(format!("active schedule {active:?} is not a basal schedule")),
                    );
                }
            }
        }

        validator.present("units", self.units.as_ref()).exists();
        let bg_units = self.units.as_ref().and_then(|u| u.bg.as_deref());
        if let Some(units) = &self.units {
            let mut units_validator = validator.child("units");
            units_validator
                .string("carb", units.carb.as_deref())
                .exists()
                .one_of(&CARB_UNITS);
            units_validator
                .string("bg", units.bg.as_deref())
                .exists()
                .one_of(&glucose::UNITS);
        }
        let bg_range = glucose::value_range_for_units(bg_units);

        if let Some(entries) = &self.carb_ratio {
            let mut entries_validator = validator.child("carbRatio");
            validate_starts(&mut entries_validator, entries.iter().map(|e| e.start));
            for (index, entry) in entries.iter().enumerate() {
                entry.validate(
                    &mut entries_validator.child(index),
                    Some((CARB_RATIO_MINIMUM, CARB_RATIO_MAXIMUM)),
                );
            }
        }
        if let Some(entries) = &self.insulin_sensitivity {
            let mut entries_validator = validator.child("insulinSensitivity");
            validate_starts(&mut entries_validator, entries.iter().map(|e| e.start));
            for (index, entry) in entries.iter().enumerate() {
                entry.validate(&mut entries_validator.child(index), bg_range);
            }
        }
        if let Some(entries) = &self.bg_target {
            let mut entries_validator = validator.child("bgTarget");
            validate_starts(&mut entries_validator, entries.iter().map(|e| e.start));
            for (index, entry) in entries.iter().enumerate() {
                entry.validate(&mut entries_validator.child(index), bg_range);
            }
        }
    }

    fn normalize(&mut self, normalizer: &mut Normalizer) {
        self.base.normalize(normalizer);
        if !normalizer.rewrites() {
            return;
        }
        let Some(units) = self.units.as_mut() else {
            return;
        };
        let bg = units.bg.as_deref();
        for entry in self.insulin_sensitivity.iter_mut().flatten() {
            entry.amount = glucose::normalize_value_for_units(entry.amount, bg);
        }
        for entry in self.bg_target.iter_mut().flatten() {
            entry.target = glucose::normalize_value_for_units(entry.target, bg);
        }
        units.bg = glucose::normalize_units(bg);
    }

    fn identity_fields(&self) -> Result<Vec<String>, IdentityError> {
        self.base.identity_fields()
    }
}
