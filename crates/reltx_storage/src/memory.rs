//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::record::{Record, RecordChange, RecordKey};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory storage backend.
///
/// This backend keeps all records in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral datasets loaded from a file by the CLI
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use reltx_storage::{InMemoryBackend, Record, RecordKey, StorageBackend};
/// use uuid::Uuid;
///
/// let key = RecordKey::new("Customer", Uuid::from_u128(1));
/// let backend = InMemoryBackend::with_records(vec![Record::new(key.clone())]);
/// assert_eq!(backend.len().unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    records: RwLock<BTreeMap<RecordKey, Record>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with records.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.key.clone(), record))
            .collect();
        Self {
            records: RwLock::new(map),
        }
    }

    /// Returns a copy of all stored records, ordered by key.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.records.read().values().cloned().collect()
    }

    /// Clears all records from the backend.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl StorageBackend for InMemoryBackend {
    fn load(&self, key: &RecordKey) -> StorageResult<Option<Record>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn find_referencing(
        &self,
        class: &str,
        property: &str,
        target: &RecordKey,
    ) -> StorageResult<Vec<RecordKey>> {
        let records = self.records.read();
        Ok(records
            .values()
            .filter(|record| record.key.class == class)
            .filter(|record| {
                record
                    .get(property)
                    .and_then(|value| value.as_reference())
                    .is_some_and(|referenced| referenced == target)
            })
            .map(|record| record.key.clone())
            .collect())
    }

    fn apply(&self, changes: &[RecordChange]) -> StorageResult<()> {
        let mut records = self.records.write();

        // Validate first so a failing batch leaves storage untouched
        for change in changes {
            if let RecordChange::Delete(key) = change {
                let put_earlier = changes
                    .iter()
                    .any(|c| matches!(c, RecordChange::Put(r) if &r.key == key));
                if !records.contains_key(key) && !put_earlier {
                    return Err(StorageError::RecordNotFound(key.clone()));
                }
            }
        }

        for change in changes {
            match change {
                RecordChange::Put(record) => {
                    records.insert(record.key.clone(), record.clone());
                }
                RecordChange::Delete(key) => {
                    records.remove(key);
                }
            }
        }
        Ok(())
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.records.read().len())
    }
}
