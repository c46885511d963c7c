//! Coercion rules from wire/local values to a property's declared type
//!
//! [`coerce`] returns `None` when the input cannot be represented in the
//! target type. Callers keep the previous value in that case; a bad push
//! never corrupts the cache and never raises an error.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::property::PropertyType;
use crate::value::{PropertyValue, WIRE_DATE_FORMAT};

const DATETIME_FORMATS: &[&str] = &[
    WIRE_DATE_FORMAT,
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];

const TIME_FORMATS: &[&str] = &["%I:%M:%S %p", "%I:%M %p", "%H:%M:%S", "%H:%M"];

/// Infer a type from the lexical shape of the first value a property sees
///
/// Text ending in `%` is a percent, `yes/no/on/off/true/false` is a boolean,
/// anything else is text. Non-text values map to their natural type.
pub fn infer_type(value: &PropertyValue) -> PropertyType {
    match value {
        PropertyValue::Text(s) => {
            let lower = s.trim().to_ascii_lowercase();
            if lower.ends_with('%') {
                PropertyType::Percent
            } else if matches!(
                lower.as_str(),
                "on" | "off" | "yes" | "no" | "true" | "false"
            ) {
                PropertyType::Boolean
            } else {
                PropertyType::Text
            }
        }
        PropertyValue::Bool(_) => PropertyType::Boolean,
        PropertyValue::Int(_) => PropertyType::Integer,
        PropertyValue::Float(_) => PropertyType::Float,
        PropertyValue::DateTime(_) => PropertyType::DateTime,
    }
}

/// Coerce `value` into the representation used for `ty`
///
/// Returns `None` on a parse failure. Types without defined semantics pass
/// the value through unchanged.
pub fn coerce(ty: PropertyType, value: PropertyValue) -> Option<PropertyValue> {
    match ty {
        PropertyType::Text => Some(PropertyValue::Text(value.to_wire())),
        PropertyType::Boolean => Some(PropertyValue::Bool(to_bool(&value))),
        PropertyType::Integer => to_integer(&value).map(PropertyValue::Int),
        PropertyType::Float => to_float(&value).map(PropertyValue::Float),
        PropertyType::Percent => to_percent(&value).map(PropertyValue::Float),
        PropertyType::DateTime | PropertyType::Date | PropertyType::Time => {
            to_datetime(&value).map(PropertyValue::DateTime)
        }
        _ => Some(value),
    }
}

/// Unrecognised strings are `false`, never an error.
fn to_bool(value: &PropertyValue) -> bool {
    match value {
        PropertyValue::Bool(b) => *b,
        PropertyValue::Int(i) => *i != 0,
        PropertyValue::Float(f) => *f != 0.0,
        PropertyValue::Text(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "on"
        ),
        PropertyValue::DateTime(_) => false,
    }
}

fn to_integer(value: &PropertyValue) -> Option<i64> {
    match value {
        PropertyValue::Int(i) => Some(*i),
        PropertyValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
        PropertyValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_float(value: &PropertyValue) -> Option<f64> {
    match value {
        PropertyValue::Float(f) => Some(*f),
        PropertyValue::Int(i) => Some(*i as f64),
        PropertyValue::Text(s) => parse_finite(s),
        _ => None,
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// `"99%"` is `0.99`; bare numbers are already fractions.
fn to_percent(value: &PropertyValue) -> Option<f64> {
    match value {
        PropertyValue::Text(s) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(number) => number.trim().parse::<i64>().ok().map(|n| n as f64 / 100.0),
                None => parse_finite(s),
            }
        }
        other => to_float(other),
    }
}

fn to_datetime(value: &PropertyValue) -> Option<NaiveDateTime> {
    match value {
        PropertyValue::DateTime(dt) => Some(*dt),
        PropertyValue::Text(s) => parse_datetime(s.trim()),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt);
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    {
        return Some(date.and_time(NaiveTime::MIN));
    }
    // A bare time means today, as on the server.
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
        .map(|time| Local::now().date_naive().and_time(time))
}

/// Render a percent fraction the way the server writes it (`0.99` -> `99%`)
pub fn percent_to_wire(fraction: f64) -> String {
    let pct = fraction * 100.0;
    let rounded = pct.round();
    if (pct - rounded).abs() < 1e-9 {
        format!("{}%", rounded as i64)
    } else {
        format!("{}%", pct)
    }
}
