//! In-memory representation of property values
//!
//! Everything arrives from the server as text. Once a property's type is
//! known, the text is coerced into one of these variants (see
//! [`crate::coerce`]). Opaque Premise types keep whatever variant they were
//! assigned.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// `.NET`-style general date format the server understands on writes
pub const WIRE_DATE_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

/// A typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(NaiveDateTime),
}

impl PropertyValue {
    /// Canonical text form sent to the server
    ///
    /// Booleans render as `True`/`False`, the form the server itself emits.
    /// Percent rendering depends on the property type and lives in
    /// [`crate::Property::wire_value`].
    pub fn to_wire(&self) -> String {
        match self {
            PropertyValue::Text(s) => s.clone(),
            PropertyValue::Bool(true) => "True".to_string(),
            PropertyValue::Bool(false) => "False".to_string(),
            PropertyValue::Int(i) => i.to_string(),
            PropertyValue::Float(f) => f.to_string(),
            PropertyValue::DateTime(dt) => dt.format(WIRE_DATE_FORMAT).to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            PropertyValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(i64::from(value))
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<NaiveDateTime> for PropertyValue {
    fn from(value: NaiveDateTime) -> Self {
        PropertyValue::DateTime(value)
    }
}
