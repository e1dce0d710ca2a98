//! Containers and end-points of one transaction.

use crate::config::Config;
use crate::data::{DataContainer, DataContainerMap, DataContainerState};
use crate::end_point::{RelationEndPoint, RelationEndPointManager};
use crate::error::{CoreError, CoreResult};
use crate::events::TransactionEventSink;
use crate::mapping::MappingConfiguration;
use crate::object::{ObjectId, Value};
use reltx_storage::RecordChange;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// State of an object as seen by one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectState {
    /// The object has not been loaded into the transaction.
    NotLoadedYet,
    /// Created in the transaction.
    New,
    /// Loaded and not modified.
    Unchanged,
    /// Its values or one of its relations were modified.
    Changed,
    /// Deleted in the transaction.
    Deleted,
    /// Discarded; the object cannot be used in the transaction any more.
    Invalid,
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotLoadedYet => "NotLoadedYet",
            Self::New => "New",
            Self::Unchanged => "Unchanged",
            Self::Changed => "Changed",
            Self::Deleted => "Deleted",
            Self::Invalid => "Invalid",
        };
        f.write_str(name)
    }
}

/// The data a transaction owns: its container store, its end-point
/// registry and the objects that became invalid in it.
#[derive(Debug)]
pub struct DataManager {
    mapping: Arc<MappingConfiguration>,
    pub(crate) containers: DataContainerMap,
    pub(crate) end_points: RelationEndPointManager,
    pub(crate) invalid_objects: BTreeSet<ObjectId>,
}

impl DataManager {
    /// Creates the empty data of a new transaction.
    #[must_use]
    pub fn new(mapping: Arc<MappingConfiguration>, config: &Config) -> Self {
        Self {
            end_points: RelationEndPointManager::new(Arc::clone(&mapping), config),
            mapping,
            containers: DataContainerMap::new(),
            invalid_objects: BTreeSet::new(),
        }
    }

    /// Returns the mapping the transaction works with.
    #[must_use]
    pub fn mapping(&self) -> &Arc<MappingConfiguration> {
        &self.mapping
    }

    /// Returns the container store.
    #[must_use]
    pub fn containers(&self) -> &DataContainerMap {
        &self.containers
    }

    /// Returns the end-point registry.
    #[must_use]
    pub fn end_points(&self) -> &RelationEndPointManager {
        &self.end_points
    }

    /// Returns `true` if the object was discarded in this transaction.
    #[must_use]
    pub fn is_invalid(&self, object: &ObjectId) -> bool {
        self.invalid_objects.contains(object)
    }

    /// Returns the state of an object.
    ///
    /// An object whose end-point has changed reports `Changed` even if its
    /// container is unchanged or not loaded at all.
    #[must_use]
    pub fn object_state(&self, object: &ObjectId) -> ObjectState {
        if self.invalid_objects.contains(object) {
            return ObjectState::Invalid;
        }
        let Some(container) = self.containers.get(object) else {
            if self.has_changed_end_points(object) {
                return ObjectState::Changed;
            }
            return ObjectState::NotLoadedYet;
        };
        match container.state() {
            DataContainerState::New => ObjectState::New,
            DataContainerState::Deleted => ObjectState::Deleted,
            DataContainerState::Discarded => ObjectState::Invalid,
            DataContainerState::Changed => ObjectState::Changed,
            DataContainerState::Unchanged if self.has_changed_end_points(object) => {
                ObjectState::Changed
            }
            DataContainerState::Unchanged => ObjectState::Unchanged,
        }
    }

    fn has_changed_end_points(&self, object: &ObjectId) -> bool {
        self.end_points
            .iter()
            .any(|end_point| end_point.object_id() == Some(object) && end_point.has_changed())
    }

    /// Returns the objects taking part in a commit: changed objects first,
    /// then new ones, then deleted ones, each group in ID order.
    #[must_use]
    pub fn changed_object_ids(&self) -> Vec<ObjectId> {
        let mut changed = Vec::new();
        let mut created = Vec::new();
        let mut deleted = Vec::new();
        for container in self.containers.iter() {
            let id = container.id();
            match self.object_state(id) {
                ObjectState::Changed => changed.push(id.clone()),
                ObjectState::New => created.push(id.clone()),
                ObjectState::Deleted => deleted.push(id.clone()),
                _ => {}
            }
        }
        changed.extend(self.unloaded_changed_owners());
        changed.sort();
        changed.append(&mut created);
        changed.append(&mut deleted);
        changed
    }

    /// Returns the objects that are not loaded but own a changed end-point,
    /// in ID order.
    #[must_use]
    pub fn unloaded_changed_owners(&self) -> Vec<ObjectId> {
        let owners: BTreeSet<&ObjectId> = self
            .end_points
            .iter()
            .filter(|end_point| end_point.has_changed())
            .filter_map(RelationEndPoint::object_id)
            .filter(|object| {
                self.containers.get(object).is_none() && !self.invalid_objects.contains(*object)
            })
            .collect();
        owners.into_iter().cloned().collect()
    }

    fn loaded_container_mut(&mut self, object: &ObjectId) -> CoreResult<&mut DataContainer> {
        if self.invalid_objects.contains(object) {
            return Err(CoreError::object_invalid(object));
        }
        self.containers.get_mut(object).ok_or_else(|| {
            CoreError::invalid_operation(format!(
                "Object '{object}' is not loaded in this transaction."
            ))
        })
    }

    /// Force-marks a loaded object dirty.
    pub(crate) fn register_for_commit(&mut self, object: &ObjectId) -> CoreResult<()> {
        self.loaded_container_mut(object)?.mark_as_changed()
    }

    /// Sets a value property of a loaded object without notifications.
    pub(crate) fn set_value_silently(
        &mut self,
        object: &ObjectId,
        property: &str,
        value: Value,
    ) -> CoreResult<Value> {
        self.check_value_property(object, property)?;
        self.loaded_container_mut(object)?.set_value(property, value)
    }

    /// Fails unless `property` is a value property of the object's class.
    pub(crate) fn check_value_property(&self, object: &ObjectId, property: &str) -> CoreResult<()> {
        let class = self.mapping.class(object.class_id())?;
        if class.end_point(property).is_some() {
            return Err(CoreError::invalid_argument(
                "property",
                format!(
                    "'{property}' is a relation property of class '{}'; relations are changed through their end-points.",
                    class.id()
                ),
            ));
        }
        if class.default_value(property).is_none() {
            return Err(CoreError::UnknownProperty {
                class: class.id().to_string(),
                property: property.to_string(),
            });
        }
        Ok(())
    }

    /// Deletes a container: new objects are discarded, existing ones are
    /// marked deleted.
    pub(crate) fn delete_container(
        &mut self,
        object: &ObjectId,
        sink: &dyn TransactionEventSink,
    ) -> CoreResult<()> {
        let container = self.loaded_container_mut(object)?;
        if container.is_new() {
            self.discard_object(object, sink)
        } else {
            container.delete();
            Ok(())
        }
    }

    /// Removes an object with all its end-points and marks it invalid.
    pub(crate) fn discard_object(
        &mut self,
        object: &ObjectId,
        sink: &dyn TransactionEventSink,
    ) -> CoreResult<()> {
        self.end_points.remove_end_points_of(object, sink);
        if self.containers.contains(object) {
            self.containers.remove(object, sink)?;
        }
        self.invalid_objects.insert(object.clone());
        trace!(object = %object, "object discarded");
        Ok(())
    }

    /// Returns the storage changes a commit of this transaction applies.
    #[must_use]
    pub fn persistence_changes(&self) -> Vec<RecordChange> {
        self.containers
            .iter()
            .filter_map(|container| match self.object_state(container.id()) {
                ObjectState::New | ObjectState::Changed => {
                    Some(RecordChange::Put(container.to_record()))
                }
                ObjectState::Deleted => Some(RecordChange::Delete(container.id().to_record_key())),
                _ => None,
            })
            .collect()
    }

    /// Commits containers and end-points. Deleted objects are removed and
    /// become invalid; their IDs are returned.
    pub(crate) fn commit_all(&mut self, sink: &dyn TransactionEventSink) -> CoreResult<Vec<ObjectId>> {
        self.end_points.commit_all_end_points();
        let deleted = self.containers.commit_all(sink)?;
        for object in &deleted {
            self.end_points.remove_end_points_of(object, sink);
            self.invalid_objects.insert(object.clone());
        }
        Ok(deleted)
    }

    /// Rolls back containers and end-points. New objects are removed and
    /// become invalid; their IDs are returned.
    pub(crate) fn rollback_all(
        &mut self,
        sink: &dyn TransactionEventSink,
    ) -> CoreResult<Vec<ObjectId>> {
        self.end_points.rollback_all_end_points();
        let created = self.containers.rollback_all(sink)?;
        for object in &created {
            self.end_points.remove_end_points_of(object, sink);
            self.invalid_objects.insert(object.clone());
        }
        Ok(created)
    }

    /// Pushes the changes of a sub-transaction into this, its parent.
    ///
    /// New containers are registered first so their end-points exist,
    /// then changed containers and end-points take over the
    /// sub-transaction's state. Objects new here and deleted in the
    /// sub-transaction are discarded at the end.
    pub(crate) fn take_over_from(
        &mut self,
        sub: &DataManager,
        sink: &dyn TransactionEventSink,
    ) -> CoreResult<()> {
        let mut deleted = Vec::new();
        for container in sub.containers.iter() {
            let id = container.id();
            match container.state() {
                DataContainerState::New => {
                    self.containers
                        .register(DataContainer::new_object(id.clone(), container.values().clone()))?;
                    if let Some(registered) = self.containers.get(id) {
                        self.end_points
                            .register_end_points_for_data_container(registered)?;
                    }
                }
                DataContainerState::Changed => {
                    self.loaded_container_mut(id)?.set_data_from(container);
                }
                DataContainerState::Deleted => {
                    self.loaded_container_mut(id)?.set_data_from(container);
                    deleted.push(id.clone());
                }
                DataContainerState::Unchanged | DataContainerState::Discarded => {}
            }
        }

        for end_point in sub.end_points.iter() {
            if end_point.has_changed() || end_point.has_been_touched() {
                self.end_points.set_data_from(end_point)?;
            }
        }

        for object in deleted {
            if self.containers.get(&object).is_some_and(DataContainer::is_new) {
                self.discard_object(&object, sink)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::end_point::RelationEndPointId;
    use crate::events::EventDispatcher;
    use crate::mapping::{CollectionKind, MappingBuilder};
    use crate::types::TransactionId;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn manager() -> DataManager {
        let mapping = MappingBuilder::new()
            .class("Order")
            .class("OrderItem")
            .value_property("Order", "Number", Value::Integer(0))
            .one_to_many(
                "OrderToItems",
                "OrderItem",
                "Order",
                "Order",
                "OrderItems",
                CollectionKind::DomainObjectCollection,
            )
            .build()
            .unwrap();
        DataManager::new(Arc::new(mapping), &Config::default())
    }

    fn order(n: u128) -> ObjectId {
        ObjectId::new("Order", Uuid::from_u128(n))
    }

    fn register_existing(data: &mut DataManager, id: ObjectId) {
        let mut values = BTreeMap::new();
        values.insert("Number".to_string(), Value::Integer(1));
        data.containers
            .register(DataContainer::existing(id.clone(), values))
            .unwrap();
        let container = data.containers.get(&id).unwrap();
        data.end_points
            .register_end_points_for_data_container(container)
            .unwrap();
    }

    #[test]
    fn states_follow_containers() {
        let mut data = manager();
        let id = order(1);
        assert_eq!(data.object_state(&id), ObjectState::NotLoadedYet);

        register_existing(&mut data, id.clone());
        assert_eq!(data.object_state(&id), ObjectState::Unchanged);

        data.set_value_silently(&id, "Number", Value::Integer(2))
            .unwrap();
        assert_eq!(data.object_state(&id), ObjectState::Changed);
        assert_eq!(data.changed_object_ids(), vec![id]);
    }

    #[test]
    fn unloaded_owner_of_a_changed_end_point_is_changed() {
        let mut data = manager();
        let owner = order(5);
        let item = ObjectId::new("OrderItem", Uuid::from_u128(2));
        let mapping = Arc::clone(data.mapping());
        let id = RelationEndPointId::for_property(&mapping, &owner, "OrderItems").unwrap();
        data.end_points.get_or_create_virtual_end_point(&id).unwrap();
        data.end_points
            .get_mut(&id)
            .unwrap()
            .mark_data_complete(vec![item], Vec::new());

        assert!(data.containers.get(&owner).is_none());
        assert_eq!(data.object_state(&owner), ObjectState::Changed);
        assert_eq!(data.unloaded_changed_owners(), vec![owner.clone()]);
        assert_eq!(data.changed_object_ids(), vec![owner]);
    }

    #[test]
    fn relation_properties_cannot_be_set_as_values() {
        let mut data = manager();
        let item = ObjectId::new("OrderItem", Uuid::from_u128(2));
        data.containers
            .register(DataContainer::existing(item.clone(), BTreeMap::new()))
            .unwrap();
        assert!(matches!(
            data.set_value_silently(&item, "Order", Value::Null),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn deleting_new_object_discards_it() {
        let mut data = manager();
        let events = EventDispatcher::new(TransactionId::new(1));
        let id = order(1);
        data.containers
            .register(DataContainer::new_object(id.clone(), BTreeMap::new()))
            .unwrap();

        data.delete_container(&id, &events).unwrap();
        assert_eq!(data.object_state(&id), ObjectState::Invalid);
        assert!(data.persistence_changes().is_empty());
        assert!(matches!(
            data.register_for_commit(&id),
            Err(CoreError::ObjectInvalid { .. })
        ));
    }

    #[test]
    fn persistence_changes_cover_puts_and_deletes() {
        let mut data = manager();
        let events = EventDispatcher::new(TransactionId::new(1));
        register_existing(&mut data, order(1));
        register_existing(&mut data, order(2));
        data.register_for_commit(&order(1)).unwrap();
        data.delete_container(&order(2), &events).unwrap();

        let changes = data.persistence_changes();
        assert_eq!(changes.len(), 2);
        assert!(matches!(changes[0], RecordChange::Put(_)));
        assert_eq!(changes[1], RecordChange::Delete(order(2).to_record_key()));

        let removed = data.commit_all(&events).unwrap();
        assert_eq!(removed, vec![order(2)]);
        assert_eq!(data.object_state(&order(1)), ObjectState::Unchanged);
        assert_eq!(data.object_state(&order(2)), ObjectState::Invalid);
    }

    #[test]
    fn rollback_invalidates_new_objects() {
        let mut data = manager();
        let events = EventDispatcher::new(TransactionId::new(1));
        let id = order(3);
        data.containers
            .register(DataContainer::new_object(id.clone(), BTreeMap::new()))
            .unwrap();

        assert_eq!(data.rollback_all(&events).unwrap(), vec![id.clone()]);
        assert_eq!(data.object_state(&id), ObjectState::Invalid);
    }
}
