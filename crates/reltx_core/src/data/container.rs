//! Per-object property storage.

use crate::error::{CoreError, CoreResult};
use crate::mapping::ClassDefinition;
use crate::object::{ObjectId, Value};
use reltx_storage::Record;
use std::collections::BTreeMap;

/// Lifecycle state of a data container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataContainerState {
    /// Created in this transaction; nothing persisted yet.
    New,
    /// Existing object whose values equal the loaded ones.
    Unchanged,
    /// Existing object with modified values, or force-marked dirty.
    Changed,
    /// Marked for deletion at commit.
    Deleted,
    /// Removed from its transaction; must not be used any more.
    Discarded,
}

/// The property values of one object within one transaction.
///
/// A container keeps both the current and the originally loaded values, so
/// its state is derived rather than tracked. Foreign keys live here too,
/// under the name of the real end-point's property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataContainer {
    id: ObjectId,
    current: BTreeMap<String, Value>,
    original: BTreeMap<String, Value>,
    is_new: bool,
    is_deleted: bool,
    is_discarded: bool,
    marked_changed: bool,
}

impl DataContainer {
    /// Creates the container of a new object.
    #[must_use]
    pub fn new_object(id: ObjectId, values: BTreeMap<String, Value>) -> Self {
        Self {
            id,
            original: values.clone(),
            current: values,
            is_new: true,
            is_deleted: false,
            is_discarded: false,
            marked_changed: false,
        }
    }

    /// Creates the container of an object loaded from its source.
    #[must_use]
    pub fn existing(id: ObjectId, values: BTreeMap<String, Value>) -> Self {
        Self {
            is_new: false,
            ..Self::new_object(id, values)
        }
    }

    /// Returns the initial values for an object of `class`: property
    /// defaults plus a null foreign key per real end-point.
    #[must_use]
    pub fn default_values(class: &ClassDefinition) -> BTreeMap<String, Value> {
        let mut values: BTreeMap<String, Value> = class
            .value_properties()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        for def in class.real_end_points() {
            if let Some(property) = def.property_name() {
                values.insert(property.to_string(), Value::Null);
            }
        }
        values
    }

    /// Returns the object ID.
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Returns `true` if the object was created in this transaction.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Returns `true` if the object has been force-marked dirty.
    #[must_use]
    pub fn is_marked_changed(&self) -> bool {
        self.marked_changed
    }

    /// Returns the container's state.
    #[must_use]
    pub fn state(&self) -> DataContainerState {
        if self.is_discarded {
            DataContainerState::Discarded
        } else if self.is_deleted {
            DataContainerState::Deleted
        } else if self.is_new {
            DataContainerState::New
        } else if self.marked_changed || self.current != self.original {
            DataContainerState::Changed
        } else {
            DataContainerState::Unchanged
        }
    }

    /// Returns the current value of a property.
    #[must_use]
    pub fn value(&self, property: &str) -> Option<&Value> {
        self.current.get(property)
    }

    /// Returns the value the property had when loaded.
    #[must_use]
    pub fn original_value(&self, property: &str) -> Option<&Value> {
        self.original.get(property)
    }

    /// Returns all current values.
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.current
    }

    /// Returns the object referenced by a foreign-key property.
    #[must_use]
    pub fn foreign_key(&self, property: &str) -> Option<ObjectId> {
        self.current
            .get(property)
            .and_then(Value::as_reference)
            .cloned()
    }

    /// Returns the originally loaded foreign key.
    #[must_use]
    pub fn original_foreign_key(&self, property: &str) -> Option<ObjectId> {
        self.original
            .get(property)
            .and_then(Value::as_reference)
            .cloned()
    }

    /// Sets a property value and returns the previous one.
    ///
    /// # Errors
    ///
    /// Returns `ObjectInvalid` for discarded containers and
    /// `UnknownProperty` if the container has no such property.
    pub fn set_value(&mut self, property: &str, value: Value) -> CoreResult<Value> {
        if self.is_discarded {
            return Err(CoreError::object_invalid(&self.id));
        }
        let slot = self
            .current
            .get_mut(property)
            .ok_or_else(|| CoreError::UnknownProperty {
                class: self.id.class_id().to_string(),
                property: property.to_string(),
            })?;
        Ok(std::mem::replace(slot, value))
    }

    pub(crate) fn set_foreign_key(&mut self, property: &str, target: Option<ObjectId>) {
        self.current
            .insert(property.to_string(), Value::from_reference(target));
    }

    /// Force-marks the object dirty so it takes part in the next commit.
    ///
    /// New objects are already part of the commit; marking them is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ObjectDeleted` or `ObjectInvalid`.
    pub fn mark_as_changed(&mut self) -> CoreResult<()> {
        match self.state() {
            DataContainerState::Discarded => Err(CoreError::object_invalid(&self.id)),
            DataContainerState::Deleted => Err(CoreError::object_deleted(&self.id)),
            DataContainerState::New => Ok(()),
            DataContainerState::Changed | DataContainerState::Unchanged => {
                self.marked_changed = true;
                Ok(())
            }
        }
    }

    pub(crate) fn delete(&mut self) {
        self.is_deleted = true;
    }

    pub(crate) fn discard(&mut self) {
        self.is_discarded = true;
    }

    pub(crate) fn commit(&mut self) {
        self.original = self.current.clone();
        self.is_new = false;
        self.marked_changed = false;
    }

    pub(crate) fn rollback(&mut self) {
        self.current = self.original.clone();
        self.is_deleted = false;
        self.marked_changed = false;
    }

    /// Takes over the state of the same object from a sub-transaction.
    pub(crate) fn set_data_from(&mut self, source: &DataContainer) {
        self.current = source.current.clone();
        self.marked_changed |= source.marked_changed;
        self.is_deleted |= source.is_deleted;
    }

    /// Converts the current values to a storage record.
    #[must_use]
    pub fn to_record(&self) -> Record {
        let mut record = Record::new(self.id.to_record_key());
        for (property, value) in &self.current {
            record.properties.insert(property.clone(), value.to_stored());
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn values() -> BTreeMap<String, Value> {
        let mut values = BTreeMap::new();
        values.insert("Number".to_string(), Value::Integer(1));
        values.insert("Customer".to_string(), Value::Null);
        values
    }

    fn order() -> ObjectId {
        ObjectId::new("Order", Uuid::from_u128(1))
    }

    #[test]
    fn new_container_is_new() {
        let container = DataContainer::new_object(order(), values());
        assert_eq!(container.state(), DataContainerState::New);
        assert!(container.is_new());
    }

    #[test]
    fn value_change_is_tracked() {
        let mut container = DataContainer::existing(order(), values());
        assert_eq!(container.state(), DataContainerState::Unchanged);

        let old = container.set_value("Number", Value::Integer(2)).unwrap();
        assert_eq!(old, Value::Integer(1));
        assert_eq!(container.state(), DataContainerState::Changed);
        assert_eq!(container.original_value("Number"), Some(&Value::Integer(1)));

        container.set_value("Number", Value::Integer(1)).unwrap();
        assert_eq!(container.state(), DataContainerState::Unchanged);
    }

    #[test]
    fn unknown_property_is_rejected() {
        let mut container = DataContainer::existing(order(), values());
        assert!(matches!(
            container.set_value("Nope", Value::Null),
            Err(CoreError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn mark_as_changed() {
        let mut container = DataContainer::existing(order(), values());
        container.mark_as_changed().unwrap();
        assert_eq!(container.state(), DataContainerState::Changed);

        container.commit();
        assert_eq!(container.state(), DataContainerState::Unchanged);

        container.delete();
        assert!(matches!(
            container.mark_as_changed(),
            Err(CoreError::ObjectDeleted { .. })
        ));
    }

    #[test]
    fn rollback_restores_values_and_undeletes() {
        let mut container = DataContainer::existing(order(), values());
        container.set_value("Number", Value::Integer(9)).unwrap();
        container.delete();
        assert_eq!(container.state(), DataContainerState::Deleted);

        container.rollback();
        assert_eq!(container.state(), DataContainerState::Unchanged);
        assert_eq!(container.value("Number"), Some(&Value::Integer(1)));
    }

    #[test]
    fn foreign_keys() {
        let mut container = DataContainer::existing(order(), values());
        let customer = ObjectId::new("Customer", Uuid::from_u128(5));
        container.set_foreign_key("Customer", Some(customer.clone()));

        assert_eq!(container.foreign_key("Customer"), Some(customer));
        assert_eq!(container.original_foreign_key("Customer"), None);
        assert_eq!(container.state(), DataContainerState::Changed);
    }

    #[test]
    fn discarded_container_rejects_writes() {
        let mut container = DataContainer::existing(order(), values());
        container.discard();
        assert_eq!(container.state(), DataContainerState::Discarded);
        assert!(matches!(
            container.set_value("Number", Value::Integer(3)),
            Err(CoreError::ObjectInvalid { .. })
        ));
    }

    #[test]
    fn to_record_uses_current_values() {
        let mut container = DataContainer::existing(order(), values());
        container.set_value("Number", Value::Integer(4)).unwrap();
        let record = container.to_record();
        assert_eq!(
            record.get("Number"),
            Some(&reltx_storage::StoredValue::Integer(4))
        );
        assert_eq!(record.key, order().to_record_key());
    }
}
