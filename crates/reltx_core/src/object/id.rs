//! Object and class identifiers.

use crate::error::{CoreError, CoreResult};
use reltx_storage::RecordKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Name of a mapped class.
///
/// Cheap to clone; the name is shared.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ClassId(Arc<str>);

impl ClassId {
    /// Creates a class ID.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the class name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ClassId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<ClassId> for String {
    fn from(id: ClassId) -> Self {
        id.0.to_string()
    }
}

/// Identity of a domain object: class plus surrogate key.
///
/// Object IDs are:
/// - Globally unique
/// - Immutable once assigned
/// - Never reused, even after the object is deleted
///
/// Equality, ordering and hashing are value-based.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    class_id: ClassId,
    value: Uuid,
}

impl ObjectId {
    /// Creates an object ID from its parts.
    #[must_use]
    pub fn new(class_id: impl Into<ClassId>, value: Uuid) -> Self {
        Self {
            class_id: class_id.into(),
            value,
        }
    }

    /// Creates a new random object ID for a class.
    #[must_use]
    pub fn generate(class_id: impl Into<ClassId>) -> Self {
        Self::new(class_id, Uuid::new_v4())
    }

    /// Returns the class of the object.
    #[must_use]
    pub fn class_id(&self) -> &ClassId {
        &self.class_id
    }

    /// Returns the surrogate key.
    #[must_use]
    pub fn value(&self) -> Uuid {
        self.value
    }

    /// Converts to the storage key of the object's record.
    #[must_use]
    pub fn to_record_key(&self) -> RecordKey {
        RecordKey::new(self.class_id.as_str(), self.value)
    }

    /// Creates an object ID from a storage key.
    #[must_use]
    pub fn from_record_key(key: &RecordKey) -> Self {
        Self::new(key.class.as_str(), key.id)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.class_id, self.value)
    }
}

impl FromStr for ObjectId {
    type Err = CoreError;

    /// Parses the `Class|uuid` form produced by `Display`.
    fn from_str(s: &str) -> CoreResult<Self> {
        let (class, value) = s.split_once('|').ok_or_else(|| {
            CoreError::invalid_argument("object_id", format!("'{s}' is not of the form 'Class|uuid'"))
        })?;
        if class.is_empty() {
            return Err(CoreError::invalid_argument(
                "object_id",
                format!("'{s}' does not name a class"),
            ));
        }
        let value = Uuid::parse_str(value).map_err(|e| {
            CoreError::invalid_argument("object_id", format!("'{s}' has an invalid key: {e}"))
        })?;
        Ok(Self::new(class, value))
    }
}
