//! The data container store of one transaction.

use super::container::{DataContainer, DataContainerState};
use crate::error::{CoreError, CoreResult};
use crate::events::TransactionEventSink;
use crate::object::ObjectId;
use std::collections::BTreeMap;
use tracing::trace;

/// All data containers registered in one transaction, keyed by object ID.
///
/// Lookups of unregistered objects return `None`; only [`remove`] of a
/// missing container is an error.
///
/// [`remove`]: DataContainerMap::remove
#[derive(Debug, Default)]
pub struct DataContainerMap {
    containers: BTreeMap<ObjectId, DataContainer>,
}

impl DataContainerMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a container.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a container with the same ID exists.
    pub fn register(&mut self, container: DataContainer) -> CoreResult<()> {
        if self.containers.contains_key(container.id()) {
            return Err(CoreError::invalid_argument(
                "container",
                format!(
                    "Data container '{}' is already part of this map.",
                    container.id()
                ),
            ));
        }
        trace!(object = %container.id(), "data container registered");
        self.containers.insert(container.id().clone(), container);
        Ok(())
    }

    /// Removes a container and marks it discarded.
    ///
    /// The unregistering notification is raised while the container is
    /// still part of the map.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the container is not registered.
    pub fn remove(
        &mut self,
        id: &ObjectId,
        sink: &dyn TransactionEventSink,
    ) -> CoreResult<DataContainer> {
        if !self.containers.contains_key(id) {
            return Err(CoreError::invalid_argument(
                "id",
                format!("Data container '{id}' is not part of this map."),
            ));
        }
        sink.data_container_map_unregistering(self, id);

        let mut container = self
            .containers
            .remove(id)
            .ok_or_else(|| CoreError::object_not_found(id))?;
        container.discard();
        trace!(object = %id, "data container removed");
        Ok(container)
    }

    /// Returns the container of an object, if registered.
    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Option<&DataContainer> {
        self.containers.get(id)
    }

    /// Returns the container of an object mutably, if registered.
    pub fn get_mut(&mut self, id: &ObjectId) -> Option<&mut DataContainer> {
        self.containers.get_mut(id)
    }

    /// Returns `true` if the object's container is registered.
    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.containers.contains_key(id)
    }

    /// Returns the number of registered containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Returns `true` if no containers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Iterates the containers in object ID order.
    pub fn iter(&self) -> impl Iterator<Item = &DataContainer> {
        self.containers.values()
    }

    fn ids_in_state(&self, state: DataContainerState) -> Vec<ObjectId> {
        self.containers
            .values()
            .filter(|c| c.state() == state)
            .map(|c| c.id().clone())
            .collect()
    }

    /// Commits every container: deleted containers are removed, all others
    /// become unchanged.
    ///
    /// Returns the IDs of the removed containers.
    ///
    /// # Errors
    ///
    /// Propagates removal errors.
    pub fn commit_all(&mut self, sink: &dyn TransactionEventSink) -> CoreResult<Vec<ObjectId>> {
        let deleted = self.ids_in_state(DataContainerState::Deleted);
        for id in &deleted {
            self.remove(id, sink)?;
        }
        for container in self.containers.values_mut() {
            container.commit();
        }
        Ok(deleted)
    }

    /// Rolls back every container: new containers are removed, all others
    /// revert to their loaded values.
    ///
    /// Returns the IDs of the removed containers.
    ///
    /// # Errors
    ///
    /// Propagates removal errors.
    pub fn rollback_all(
        &mut self,
        sink: &dyn TransactionEventSink,
    ) -> CoreResult<Vec<ObjectId>> {
        let created: Vec<ObjectId> = self
            .containers
            .values()
            .filter(|c| c.is_new())
            .map(|c| c.id().clone())
            .collect();
        for id in &created {
            self.remove(id, sink)?;
        }
        for container in self.containers.values_mut() {
            container.rollback();
        }
        Ok(created)
    }
}
