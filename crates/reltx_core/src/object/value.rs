//! Property values held by data containers.

use super::ObjectId;
use reltx_storage::StoredValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A property value.
///
/// Foreign keys are held as [`Value::Reference`] under the name of the
/// real end-point's property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Integer(i64),
    /// Text value.
    Text(String),
    /// Reference to another object.
    Reference(ObjectId),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the referenced object, if any.
    #[must_use]
    pub fn as_reference(&self) -> Option<&ObjectId> {
        match self {
            Self::Reference(id) => Some(id),
            _ => None,
        }
    }

    /// Creates a foreign key value.
    #[must_use]
    pub fn from_reference(id: Option<ObjectId>) -> Self {
        id.map_or(Self::Null, Self::Reference)
    }

    /// Converts to the storage representation.
    #[must_use]
    pub fn to_stored(&self) -> StoredValue {
        match self {
            Self::Null => StoredValue::Null,
            Self::Bool(b) => StoredValue::Bool(*b),
            Self::Integer(i) => StoredValue::Integer(*i),
            Self::Text(s) => StoredValue::Text(s.clone()),
            Self::Reference(id) => StoredValue::Reference(id.to_record_key()),
        }
    }

    /// Converts from the storage representation.
    #[must_use]
    pub fn from_stored(value: &StoredValue) -> Self {
        match value {
            StoredValue::Null => Self::Null,
            StoredValue::Bool(b) => Self::Bool(*b),
            StoredValue::Integer(i) => Self::Integer(*i),
            StoredValue::Text(s) => Self::Text(s.clone()),
            StoredValue::Reference(key) => Self::Reference(ObjectId::from_record_key(key)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Reference(id) => write!(f, "{id}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
