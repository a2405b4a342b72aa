//! Scalar cell values stored in fixture relations.
use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Primitive cell value. Relations only hold numbers and strings.
///
/// Serialized untagged so TOML fixtures and JSON output read naturally
/// (`age = 29`, `"name": "Bob"`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
}

impl Value {
    /// Orders two values when they are comparable.
    ///
    /// Integers and floats compare numerically with each other, strings compare
    /// lexicographically, and a number never compares with a string.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality used by predicates and join matching (`1 == 1.0`).
    pub fn matches(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Converts the value into an ordered index key when it can be indexed.
    pub fn index_key(&self) -> Option<IndexKey> {
        match self {
            Value::Int(v) => Some(IndexKey::Int(*v)),
            Value::Float(v) if v.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(v) => {
                Some(IndexKey::Int(*v as i64))
            }
            Value::Float(_) => None,
            Value::String(v) => Some(IndexKey::String(v.clone())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

// Floats in [-2^63, 2^63) convert to i64 exactly; outside it `as` saturates.
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

/// Totally ordered key stored in a relation's key index.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum IndexKey {
    /// Integral key (floats with no fractional part fold into this).
    Int(i64),
    /// String key.
    String(String),
}
