//! Handle given to committing and rolling-back handlers.

use crate::error::CoreResult;
use crate::object::{ObjectId, Value};
use crate::transaction::{DataManager, ObjectState};

/// Lets commit handlers inspect the transaction and pull further objects
/// into the commit set.
///
/// Objects registered here, or modified through [`set_value`], are picked up
/// by the next committing pass.
///
/// [`set_value`]: CommitContext::set_value
pub struct CommitContext<'a> {
    data: &'a mut DataManager,
}

impl<'a> CommitContext<'a> {
    pub(crate) fn new(data: &'a mut DataManager) -> Self {
        Self { data }
    }

    /// Marks a loaded object as changed so it takes part in the commit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for unloaded objects and `ObjectDeleted`
    /// or `ObjectInvalid` for objects that cannot be committed.
    pub fn register_for_commit(&mut self, object: &ObjectId) -> CoreResult<()> {
        self.data.register_for_commit(object)
    }

    /// Sets a value property without raising notifications.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for unloaded objects and the container's
    /// own errors otherwise.
    pub fn set_value(
        &mut self,
        object: &ObjectId,
        property: &str,
        value: Value,
    ) -> CoreResult<Value> {
        self.data.set_value_silently(object, property, value)
    }

    /// Returns the state of an object in the committing transaction.
    #[must_use]
    pub fn object_state(&self, object: &ObjectId) -> ObjectState {
        self.data.object_state(object)
    }

    /// Returns the objects that currently take part in a commit.
    #[must_use]
    pub fn changed_objects(&self) -> Vec<ObjectId> {
        self.data.changed_object_ids()
    }
}
