//! Stored record model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Identity of a stored record: class name plus surrogate key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Class (table) the record belongs to.
    pub class: String,
    /// Surrogate key.
    pub id: Uuid,
}

impl RecordKey {
    /// Creates a record key.
    #[must_use]
    pub fn new(class: impl Into<String>, id: Uuid) -> Self {
        Self {
            class: class.into(),
            id,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.class, self.id)
    }
}

/// A single stored property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    /// Absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Integer(i64),
    /// Text value.
    Text(String),
    /// Foreign key to another record.
    Reference(RecordKey),
}

impl StoredValue {
    /// Returns the referenced key if this is a reference.
    #[must_use]
    pub fn as_reference(&self) -> Option<&RecordKey> {
        match self {
            Self::Reference(key) => Some(key),
            _ => None,
        }
    }
}

/// A stored record: key plus flat property map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record identity.
    pub key: RecordKey,
    /// Property values by property name.
    #[serde(default)]
    pub properties: BTreeMap<String, StoredValue>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new(key: RecordKey) -> Self {
        Self {
            key,
            properties: BTreeMap::new(),
        }
    }

    /// Adds a property value, builder style.
    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: StoredValue) -> Self {
        self.properties.insert(property.into(), value);
        self
    }

    /// Returns a property value, if stored.
    #[must_use]
    pub fn get(&self, property: &str) -> Option<&StoredValue> {
        self.properties.get(property)
    }
}

/// A change applied to storage when a root transaction commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordChange {
    /// Insert or overwrite a record.
    Put(Record),
    /// Remove a record.
    Delete(RecordKey),
}

impl RecordChange {
    /// Returns the key of the affected record.
    #[must_use]
    pub fn key(&self) -> &RecordKey {
        match self {
            Self::Put(record) => &record.key,
            Self::Delete(key) => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_display() {
        let key = RecordKey::new("Order", Uuid::nil());
        assert_eq!(
            key.to_string(),
            "Order|00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn record_builder() {
        let target = RecordKey::new("Customer", Uuid::from_u128(7));
        let record = Record::new(RecordKey::new("Order", Uuid::from_u128(1)))
            .with("Number", StoredValue::Integer(1))
            .with("Customer", StoredValue::Reference(target.clone()));

        assert_eq!(record.get("Number"), Some(&StoredValue::Integer(1)));
        assert_eq!(
            record.get("Customer").and_then(StoredValue::as_reference),
            Some(&target)
        );
        assert!(record.get("Missing").is_none());
    }

    #[test]
    fn stored_value_json_shape() {
        let value = StoredValue::Text("abc".to_string());
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"type":"text","value":"abc"}"#);
        let back: StoredValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
