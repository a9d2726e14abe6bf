use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::types::PropKeyId;

/// Owned property value.
///
/// Equality, hashing and ordering are total (floats compare by `total_cmp` and hash by
/// bit pattern) so values can key the overlay's index-update maps.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// Owned string.
    Str(String),
    /// Owned byte vector.
    Bytes(Vec<u8>),
    /// Date value represented as days since the Unix epoch.
    Date(i64),
    /// DateTime value represented as milliseconds since the Unix epoch.
    DateTime(i64),
}

impl PropertyValue {
    fn tag(&self) -> u8 {
        match self {
            PropertyValue::Bool(_) => 0,
            PropertyValue::Int(_) => 1,
            PropertyValue::Float(_) => 2,
            PropertyValue::Str(_) => 3,
            PropertyValue::Bytes(_) => 4,
            PropertyValue::Date(_) => 5,
            PropertyValue::DateTime(_) => 6,
        }
    }

    /// Canonical string form used to name index-entry lock resources.
    ///
    /// Two values that are equal produce the same string; the converse only needs to
    /// hold closely enough that distinct values rarely share a lock.
    pub fn value_as_string(&self) -> String {
        match self {
            PropertyValue::Bool(v) => v.to_string(),
            PropertyValue::Int(v) => v.to_string(),
            PropertyValue::Float(v) => format!("{v:?}"),
            PropertyValue::Str(v) => v.clone(),
            PropertyValue::Bytes(v) => {
                let parts: Vec<String> = v.iter().map(|b| b.to_string()).collect();
                format!("[{}]", parts.join(", "))
            }
            PropertyValue::Date(v) => format!("date({v})"),
            PropertyValue::DateTime(v) => format!("datetime({v})"),
        }
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PropertyValue {}

impl PartialOrd for PropertyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PropertyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PropertyValue::Bool(a), PropertyValue::Bool(b)) => a.cmp(b),
            (PropertyValue::Int(a), PropertyValue::Int(b)) => a.cmp(b),
            (PropertyValue::Float(a), PropertyValue::Float(b)) => a.total_cmp(b),
            (PropertyValue::Str(a), PropertyValue::Str(b)) => a.cmp(b),
            (PropertyValue::Bytes(a), PropertyValue::Bytes(b)) => a.cmp(b),
            (PropertyValue::Date(a), PropertyValue::Date(b)) => a.cmp(b),
            (PropertyValue::DateTime(a), PropertyValue::DateTime(b)) => a.cmp(b),
            _ => self.tag().cmp(&other.tag()),
        }
    }
}

impl Hash for PropertyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state);
        match self {
            PropertyValue::Bool(v) => v.hash(state),
            PropertyValue::Int(v) | PropertyValue::Date(v) | PropertyValue::DateTime(v) => {
                v.hash(state)
            }
            PropertyValue::Float(v) => v.to_bits().hash(state),
            PropertyValue::Str(v) => v.hash(state),
            PropertyValue::Bytes(v) => v.hash(state),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Str(v) => write!(f, "{v:?}"),
            PropertyValue::Bytes(v) => write!(f, "bytes(len={})", v.len()),
            other => f.write_str(&other.value_as_string()),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
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

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

/// A property key bound to a value ("defined property").
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Property {
    /// Property key token.
    pub key: PropKeyId,
    /// Property value.
    pub value: PropertyValue,
}

impl Property {
    /// Creates a new property.
    pub fn new(key: PropKeyId, value: impl Into<PropertyValue>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn floats_have_total_equality() {
        let nan = PropertyValue::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_ne!(PropertyValue::Float(0.0), PropertyValue::Float(-0.0));
    }

    #[test]
    fn values_of_different_types_never_compare_equal() {
        assert_ne!(PropertyValue::Int(1), PropertyValue::Float(1.0));
        assert_ne!(PropertyValue::Date(5), PropertyValue::Int(5));
        let set: BTreeSet<PropertyValue> = [
            PropertyValue::Str("a".into()),
            PropertyValue::Int(3),
            PropertyValue::Bool(true),
        ]
        .into_iter()
        .collect();
        let first = set.iter().next().cloned();
        assert_eq!(first, Some(PropertyValue::Bool(true)));
    }

    #[test]
    fn value_as_string_is_stable() {
        assert_eq!(PropertyValue::from("x").value_as_string(), "x");
        assert_eq!(PropertyValue::Int(-4).value_as_string(), "-4");
        assert_eq!(PropertyValue::Float(1.0).value_as_string(), "1.0");
        assert_eq!(PropertyValue::Bytes(vec![1, 2]).value_as_string(), "[1, 2]");
    }
}
