//! Storage backend trait definition.

use crate::error::StorageResult;
use crate::record::{Record, RecordChange, RecordKey};

/// A record storage backend for reltx.
///
/// Storage backends are **opaque record stores**. They load records by key,
/// find the records that reference a given record through a property, and
/// apply batches of changes. The transaction core owns all interpretation of
/// classes and relations - backends do not understand end-points.
///
/// # Invariants
///
/// - `load` returns exactly the record last written under that key
/// - `find_referencing` returns keys in a stable order
/// - `apply` is all-or-nothing: either every change is applied or none is
/// - Backends must be `Send + Sync` for sharing across transaction trees
pub trait StorageBackend: Send + Sync {
    /// Loads a record by key.
    ///
    /// Returns `Ok(None)` if no record is stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn load(&self, key: &RecordKey) -> StorageResult<Option<Record>>;

    /// Returns the keys of all records of `class` whose `property` holds a
    /// reference to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn find_referencing(
        &self,
        class: &str,
        property: &str,
        target: &RecordKey,
    ) -> StorageResult<Vec<RecordKey>>;

    /// Applies a batch of changes atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if any change is invalid (for example deleting a
    /// record that does not exist); in that case nothing is applied.
    fn apply(&self, changes: &[RecordChange]) -> StorageResult<()>;

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn len(&self) -> StorageResult<usize>;

    /// Returns `true` if no records are stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}
