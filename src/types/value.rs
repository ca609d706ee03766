//! Driver value and `ValueKind` definitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of value kinds a driver hands to the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// SQL NULL.
    Null,
    /// Signed integer of any source width.
    Integer,
    /// Floating point of any source width.
    Float,
    /// Boolean.
    Boolean,
    /// Raw byte sequence.
    Bytes,
    /// UTF-8 text.
    Text,
    /// Point in time, normalized to UTC.
    Timestamp,
}

impl ValueKind {
    /// Returns the display name of the kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Null => "NULL",
            ValueKind::Integer => "INTEGER",
            ValueKind::Float => "FLOAT",
            ValueKind::Boolean => "BOOLEAN",
            ValueKind::Bytes => "BYTES",
            ValueKind::Text => "TEXT",
            ValueKind::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One column value of a fetched row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// 64-bit signed integer value.
    Integer(i64),
    /// 64-bit floating point value.
    Float(f64),
    /// Boolean value.
    Boolean(bool),
    /// Byte sequence value.
    Bytes(Vec<u8>),
    /// Text value.
    Text(String),
    /// Timestamp value.
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Returns true if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the kind tag of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Text(_) => ValueKind::Text,
            Value::Timestamp(_) => ValueKind::Timestamp,
        }
    }

    /// Attempts to extract an i64 value.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to extract an f64 value.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Attempts to extract a bool value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to extract a text reference.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Attempts to extract a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Attempts to extract a timestamp.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Value::Null.kind(), ValueKind::Null);
        assert_eq!(Value::from(7).kind(), ValueKind::Integer);
        assert_eq!(Value::from("a").kind(), ValueKind::Text);
        assert_eq!(Value::from(vec![1u8]).kind(), ValueKind::Bytes);
    }

    #[test]
    fn test_from_option() {
        assert!(Value::from(None::<i64>).is_null());
        assert_eq!(Value::from(Some(3)), Value::Integer(3));
    }

    #[test]
    fn test_accessors_reject_other_kinds() {
        let v = Value::Text("x".into());
        assert_eq!(v.as_text(), Some("x"));
        assert_eq!(v.as_integer(), None);
        assert_eq!(v.as_bytes(), None);
    }
}
