//! Normalized JSON string semantics
//!
//! Attributes built with `AttributeBuilder::normalized_json` hold an encoded
//! JSON document (usually produced by `jsonencode(...)` in configuration).
//! Two documents are semantically equal when they decode to the same value:
//! whitespace and object key order are ignored and numbers compare by value,
//! so `1000` and `1000.0` are the same.

use crate::error::{Result, TfplugError};
use crate::schema::ValueSemantics;
use crate::types::Dynamic;
use serde_json::Value;

pub fn parse(document: &str) -> Result<Value> {
    serde_json::from_str(document)
        .map_err(|e| TfplugError::DecodingError(format!("invalid JSON document: {}", e)))
}

pub fn semantically_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| semantically_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| semantically_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Whether `outer` holds every top-level key of `inner` with an equal value.
/// Anything but two objects must be semantically equal.
pub fn contains(outer: &Value, inner: &Value) -> bool {
    match (outer, inner) {
        (Value::Object(outer), Value::Object(inner)) => inner
            .iter()
            .all(|(k, v)| outer.get(k).is_some_and(|w| semantically_equal(w, v))),
        _ => semantically_equal(outer, inner),
    }
}

/// Compares two encoded documents; unparsable input falls back to exact
/// string comparison
pub fn documents_equal(a: &str, b: &str) -> bool {
    match (parse(a), parse(b)) {
        (Ok(x), Ok(y)) => semantically_equal(&x, &y),
        _ => a == b,
    }
}

/// Value equality as seen by the planner for an attribute with the given
/// semantics
pub fn values_equal(a: &Dynamic, b: &Dynamic, semantics: ValueSemantics) -> bool {
    match (semantics, a, b) {
        (ValueSemantics::NormalizedJson, Dynamic::String(x), Dynamic::String(y)) => {
            documents_equal(x, y)
        }
        _ => dynamic_equal(a, b),
    }
}

/// Like `values_equal`, but a normalized JSON `actual` may carry top-level
/// keys `expected` lacks
pub fn values_contain(actual: &Dynamic, expected: &Dynamic, semantics: ValueSemantics) -> bool {
    match (semantics, actual, expected) {
        (ValueSemantics::NormalizedJson, Dynamic::String(x), Dynamic::String(y)) => {
            match (parse(x), parse(y)) {
                (Ok(x), Ok(y)) => contains(&x, &y),
                _ => x == y,
            }
        }
        _ => dynamic_equal(actual, expected),
    }
}

fn dynamic_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| dynamic_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|v2| dynamic_equal(v, v2)))
        }
        _ => a == b,
    }
}
