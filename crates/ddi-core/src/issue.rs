//! Path-tagged client issues and the per-batch report that accumulates them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pointer::Pointer;

pub const CODE_VALUE_NOT_EXISTS: &str = "value-not-exists";
pub const CODE_VALUE_EXISTS: &str = "value-exists";
pub const CODE_VALUE_EMPTY: &str = "value-empty";
pub const CODE_VALUE_DUPLICATE: &str = "value-duplicate";
pub const CODE_VALUE_NOT_TYPE: &str = "value-not-type";
pub const CODE_VALUE_NOT_PARSED: &str = "value-not-parsed";
pub const CODE_VALUE_OUT_OF_RANGE: &str = "value-out-of-range";
pub const CODE_VALUE_NOT_ALLOWED: &str = "value-not-allowed";
pub const CODE_VALUE_NOT_VALID: &str = "value-not-valid";
pub const CODE_LENGTH_OUT_OF_RANGE: &str = "length-out-of-range";
pub const CODE_TYPE_INVALID: &str = "type-invalid";
pub const CODE_TIME_NOT_PARSABLE: &str = "value-time-not-parsable";
pub const CODE_TIME_AFTER_NOW: &str = "value-time-after-now";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSource {
    pub pointer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub code: String,
    pub title: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<IssueSource>,
}

impl Issue {
    pub fn new(code: &str, title: &str, detail: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            title: title.to_string(),
            detail: detail.into(),
            source: None,
        }
    }

    pub fn at(mut self, pointer: &Pointer) -> Self {
        self.source = Some(IssueSource {
            pointer: pointer.to_string(),
        });
        self
    }

    pub fn pointer(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.pointer.as_str())
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pointer() {
            Some(pointer) => write!(f, "{} at {:?}", self.detail, pointer),
            None => f.write_str(&self.detail),
        }
    }
}

pub fn value_not_exists() -> Issue {
    Issue::new(CODE_VALUE_NOT_EXISTS, "value does not exist", "value does not exist")
}

pub fn value_exists() -> Issue {
    Issue::new(CODE_VALUE_EXISTS, "value exists", "value exists")
}

pub fn value_empty() -> Issue {
    Issue::new(CODE_VALUE_EMPTY, "value is empty", "value is empty")
}

pub fn value_duplicate() -> Issue {
    Issue::new(CODE_VALUE_DUPLICATE, "value is a duplicate", "value is a duplicate")
}

pub fn value_not_type(expected: &str, value: &Value) -> Issue {
    Issue::new(
        CODE_VALUE_NOT_TYPE,
        "value is not the expected type",
        format!("type is not {expected}, but {}", json_type_name(value)),
    )
}

pub fn value_not_parsed() -> Issue {
    Issue::new(CODE_VALUE_NOT_PARSED, "value is not parsed", "value is not parsed")
}

pub fn value_not_in_range(value: impl fmt::Display, lower: impl fmt::Display, upper: impl fmt::Display) -> Issue {
    Issue::new(
        CODE_VALUE_OUT_OF_RANGE,
        "value is out of range",
        format!("value {value} is not between {lower} and {upper}"),
    )
}

pub fn value_not_greater_than_or_equal_to(value: impl fmt::Display, limit: impl fmt::Display) -> Issue {
    Issue::new(
        CODE_VALUE_OUT_OF_RANGE,
        "value is out of range",
        format!("value {value} is not greater than or equal to {limit}"),
    )
}

pub fn value_not_one_of(value: &str, allowed: &[&str]) -> Issue {
    let allowed = allowed.iter().map(|a| format!("{a:?}")).collect::<Vec<_>>().join(", ");
    Issue::new(
        CODE_VALUE_NOT_ALLOWED,
        "value is not one of the allowed values",
        format!("value {value:?} is not one of [{allowed}]"),
    )
}

pub fn value_not_valid(detail: impl Into<String>) -> Issue {
    Issue::new(CODE_VALUE_NOT_VALID, "value is not valid", detail)
}

pub fn length_not_in_range(length: usize, lower: usize, upper: usize) -> Issue {
    Issue::new(
        CODE_LENGTH_OUT_OF_RANGE,
        "length is out of range",
        format!("length {length} is not between {lower} and {upper}"),
    )
}

pub fn length_not_greater_than(length: usize, limit: usize) -> Issue {
    Issue::new(
        CODE_LENGTH_OUT_OF_RANGE,
        "length is out of range",
        format!("length {length} is not greater than {limit}"),
    )
}

pub fn type_invalid(value: &str) -> Issue {
    Issue::new(CODE_TYPE_INVALID, "type is invalid", format!("type {value:?} is not valid"))
}

pub fn sub_type_invalid(field: &str, value: &str) -> Issue {
    Issue::new(CODE_TYPE_INVALID, "type is invalid", format!("{field} {value:?} is not valid"))
}

pub fn value_time_not_parsable(value: &str, layout: &str) -> Issue {
    Issue::new(
        CODE_TIME_NOT_PARSABLE,
        "value is not a parsable time",
        format!("value {value:?} is not a parsable time of format {layout:?}"),
    )
}

pub fn value_time_after_now() -> Issue {
    Issue::new(CODE_TIME_AFTER_NOW, "value is after now", "value is after now")
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Issues collected while processing one batch. Never shared across batches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    issues: Vec<Issue>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, pointer: &Pointer, issue: Issue) {
        self.issues.push(issue.at(pointer));
    }

    pub fn extend(&mut self, other: Report) {
        self.issues.extend(other.issues);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    pub fn pointers(&self) -> Vec<&str> {
        self.issues.iter().filter_map(Issue::pointer).collect()
    }
}
