//! Normalized metadata rows.
//!
//! Collaborators hand back [`RawRecord`]s: ordered `(field, value)` pairs straight
//! from the driver. [`CachedRow`] takes a private copy of every field so the
//! originating record (and the connection behind it) can be released immediately.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A raw metadata record as returned by a collaborator.
pub type RawRecord = Vec<(String, Value)>;

/// A single field value of a metadata record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// Floats compare by bit pattern so rows can live in hash sets.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Text(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Conversion from a field [`Value`] to a requested semantic type.
///
/// Returns `None` when the value is null or cannot be coerced.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Bytes(_) => None,
            Value::Text(v) => Some(v.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|v| i32::try_from(v).ok())
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::Text(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(true),
                "false" | "no" | "n" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        (!value.is_null()).then(|| value.clone())
    }
}

/// An immutable, dialect-agnostic metadata record.
///
/// Field names are matched case-insensitively. Two rows are equal when their
/// fields are equal; a row has no other identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CachedRow {
    fields: Vec<(String, Value)>,
}

impl CachedRow {
    /// Copies every field of `record` into a new row.
    pub fn from_record(record: RawRecord) -> Self {
        let fields = record
            .into_iter()
            .map(|(name, value)| (name.to_ascii_uppercase(), value))
            .collect();
        Self { fields }
    }

    /// Returns the field coerced to `T`, or `None` when absent, null or not coercible.
    pub fn get<T: FromValue>(&self, name: &str) -> Option<T> {
        self.value(name).and_then(T::from_value)
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name)
    }

    /// Returns the raw field value.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    /// Field names in record order, upper-cased.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<RawRecord> for CachedRow {
    fn from(record: RawRecord) -> Self {
        Self::from_record(record)
    }
}

/// Builds a [`RawRecord`] from `name => value` pairs.
///
/// ```
/// use metascope_core::{record, Value};
///
/// let rec = record! { "TABLE_NAME" => "orders", "ORDINAL_POSITION" => 1 };
/// assert_eq!(rec[1].1, Value::Int(1));
/// ```
#[macro_export]
macro_rules! record {
    ($($name:expr => $value:expr),* $(,)?) => {
        vec![$(($name.to_string(), $crate::Value::from($value))),*]
    };
}
