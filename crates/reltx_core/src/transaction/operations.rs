//! Object and relation operations of a transaction.

use super::data_manager::ObjectState;
use super::init_context::ObjectReferenceInitializationContext;
use crate::command::{Command, CommandContext};
use crate::data::{DataContainer, DataContainerState};
use crate::end_point::{RelationEndPoint, RelationEndPointId};
use crate::error::{CoreError, CoreResult};
use crate::events::TransactionEventSink;
use crate::mapping::{Cardinality, CollectionKind};
use crate::object::{ClassId, ObjectId, Value};
use tracing::debug;

impl CommandContext<'_> {
    /// Returns the state of an object without loading it.
    #[must_use]
    pub fn object_state(&self, object: &ObjectId) -> ObjectState {
        self.data().object_state(object)
    }

    /// Creates a new object of `class` with a generated ID.
    ///
    /// # Errors
    ///
    /// Returns `UnknownClass` and vetoes of the creating notification.
    pub fn new_object(&mut self, class: impl Into<ClassId>) -> CoreResult<ObjectId> {
        self.new_object_with_id(ObjectId::generate(class))
    }

    /// Creates a new object with a given ID.
    ///
    /// The object starts with default values and complete, empty virtual
    /// end-points.
    ///
    /// # Errors
    ///
    /// Returns `UnknownClass`, `InvalidArgument` if the ID is already in
    /// use in this transaction, and vetoes of the creating notification.
    pub fn new_object_with_id(&mut self, id: ObjectId) -> CoreResult<ObjectId> {
        let values = DataContainer::default_values(self.data.mapping().class(id.class_id())?);
        if self.data.containers.contains(&id) || self.data.is_invalid(&id) {
            return Err(CoreError::invalid_argument(
                "id",
                format!("The object '{id}' already exists in this transaction."),
            ));
        }
        self.events().new_object_creating(id.class_id())?;

        let mut init = ObjectReferenceInitializationContext::new(id.clone(), self.root_transaction());
        init.register_object(&id)?;

        self.data
            .containers
            .register(DataContainer::new_object(id.clone(), values))?;
        if let Some(container) = self.data.containers.get(&id) {
            self.data
                .end_points
                .register_end_points_for_data_container(container)?;
        }
        debug!(object = %id, root = %init.root_transaction(), "new object created");
        Ok(id)
    }

    /// Loads an object if needed.
    ///
    /// Deleted objects are available too.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound`, `ObjectInvalid`, loading vetoes and source
    /// errors.
    pub fn ensure_data_available(&mut self, object: &ObjectId) -> CoreResult<()> {
        self.ensure_data_container(object).map(|_| ())
    }

    /// Returns the container of a loaded, non-deleted object, loading it
    /// first if needed.
    ///
    /// # Errors
    ///
    /// Returns `ObjectDeleted` in addition to the errors of
    /// [`ensure_data_available`](Self::ensure_data_available).
    pub fn get_object(&mut self, object: &ObjectId) -> CoreResult<&DataContainer> {
        let container = self.ensure_data_container(object)?;
        if container.state() == DataContainerState::Deleted {
            return Err(CoreError::object_deleted(object));
        }
        Ok(container)
    }

    /// Returns the value of a value property.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` and the errors of
    /// [`get_object`](Self::get_object).
    pub fn property_value(&mut self, object: &ObjectId, property: &str) -> CoreResult<Value> {
        let container = self.ensure_data_container(object)?;
        container
            .value(property)
            .cloned()
            .ok_or_else(|| CoreError::UnknownProperty {
                class: object.class_id().to_string(),
                property: property.to_string(),
            })
    }

    /// Sets a value property, raising the changing and changed
    /// notifications. Setting the current value does nothing.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty`, `InvalidArgument` for relation properties,
    /// vetoes of the changing notification, and the errors of
    /// [`get_object`](Self::get_object).
    pub fn set_property_value(
        &mut self,
        object: &ObjectId,
        property: &str,
        value: Value,
    ) -> CoreResult<()> {
        self.data.check_value_property(object, property)?;
        let old = self
            .get_object(object)?
            .value(property)
            .cloned()
            .unwrap_or(Value::Null);
        if old == value {
            return Ok(());
        }
        let events = self.events();
        events.property_value_changing(object, property, &old, &value)?;
        self.data
            .set_value_silently(object, property, value.clone())?;
        events.property_value_changed(object, property, &old, &value);
        Ok(())
    }

    /// Force-marks an object dirty so it is part of the next commit.
    ///
    /// # Errors
    ///
    /// Returns `ObjectDeleted` and the errors of
    /// [`get_object`](Self::get_object).
    pub fn register_for_commit(&mut self, object: &ObjectId) -> CoreResult<()> {
        self.get_object(object)?;
        self.data.register_for_commit(object)
    }

    /// Deletes an object.
    ///
    /// Every relation of the object is cleared first, on both sides. New
    /// objects are discarded; existing ones become deleted and are removed
    /// from storage by the root commit.
    ///
    /// # Errors
    ///
    /// Returns `ObjectDeleted`, vetoes of the deleting or relation changing
    /// notifications, and loading errors.
    pub fn delete_object(&mut self, object: &ObjectId) -> CoreResult<()> {
        self.get_object(object)?;
        let definitions: Vec<_> = self
            .data
            .mapping()
            .class(object.class_id())?
            .end_points()
            .cloned()
            .collect();

        let mut parts = Vec::new();
        for definition in &definitions {
            let id = RelationEndPointId::new(Some(object.clone()), definition.clone());
            let end_point = self.end_point(&id)?;
            let command = match definition.cardinality() {
                Cardinality::One if end_point.opposite_object_id().is_some() => {
                    end_point.create_set_command(None)?
                }
                Cardinality::Many if !end_point.opposite_object_ids().is_empty() => {
                    end_point.create_set_collection_command(Vec::new())?
                }
                _ => continue,
            };
            parts.push(command.expand_to_all_related_objects(self)?);
        }

        let command = Command::DeleteObject {
            object: object.clone(),
            relations: Box::new(Command::Composite(parts)),
        };
        command.notify_and_perform(self)?;
        debug!(object = %object, "object deleted");
        Ok(())
    }

    /// Unloads an unchanged object: its real end-points and its container
    /// are removed from the transaction.
    ///
    /// Unloading an object that is not loaded does nothing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for changed objects, the aggregated
    /// consistency errors of the unregister command, and vetoes of the
    /// unloading notification.
    pub fn unload_object(&mut self, object: &ObjectId) -> CoreResult<()> {
        let Some(container) = self.data.containers.get(object) else {
            return Ok(());
        };
        let unchanged = container.state() == DataContainerState::Unchanged;
        let command = Command::Composite(vec![
            self.data
                .end_points
                .create_unregister_command_for_data_container(container),
            Command::UnregisterDataContainer(object.clone()),
        ]);
        // Relation problems are reported in full before the state check.
        if command.exceptions().is_empty() && !unchanged {
            return Err(CoreError::invalid_operation(format!(
                "The state of object '{object}' is {}; only unchanged objects can be unloaded.",
                self.object_state(object)
            )));
        }
        command.notify_and_perform(self)?;
        debug!(object = %object, "object unloaded");
        Ok(())
    }

    /// Unloads the contents of virtual end-points. Fails without unloading
    /// anything if one of them has changed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for non-virtual IDs and the aggregated
    /// consistency errors of changed end-points.
    pub fn unload_virtual_end_points(&mut self, ids: &[RelationEndPointId]) -> CoreResult<()> {
        let command = self
            .data
            .end_points
            .create_unload_virtual_end_points_command(ids)?;
        command.notify_and_perform(self)
    }

    /// Unloads every unchanged end-point of `ids` and skips changed ones.
    ///
    /// Returns `true` if all of them could be unloaded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for non-virtual IDs.
    pub fn try_unload_virtual_end_points(
        &mut self,
        ids: &[RelationEndPointId],
    ) -> CoreResult<bool> {
        let command = self
            .data
            .end_points
            .create_unload_virtual_end_points_command(ids)?;
        let complete = command.exceptions().is_empty();
        let runnable = match command {
            Command::Composite(parts) => Command::Composite(
                parts
                    .into_iter()
                    .filter(|part| !matches!(part, Command::Exception(_)))
                    .collect(),
            ),
            Command::Exception(_) => Command::Nop,
            other => other,
        };
        runnable.notify_and_perform(self)?;
        Ok(complete)
    }

    fn relation_end_point(
        &mut self,
        object: &ObjectId,
        property: &str,
    ) -> CoreResult<RelationEndPoint> {
        self.ensure_data_container(object)?;
        let id = RelationEndPointId::for_property(self.data.mapping(), object, property)?;
        self.end_point(&id)
    }

    fn modifiable_end_point(
        &mut self,
        object: &ObjectId,
        property: &str,
    ) -> CoreResult<RelationEndPoint> {
        self.get_object(object)?;
        self.relation_end_point(object, property)
    }

    fn modifiable_collection(
        &mut self,
        object: &ObjectId,
        property: &str,
    ) -> CoreResult<RelationEndPoint> {
        let end_point = self.modifiable_end_point(object, property)?;
        if end_point.definition().collection_kind() == Some(CollectionKind::VirtualCollection) {
            return Err(CoreError::invalid_operation(format!(
                "The collection '{}' is read-only; change the relation through '{}' instead.",
                end_point.definition().full_name(),
                end_point.definition().opposite().full_name()
            )));
        }
        Ok(end_point)
    }

    fn check_related(&mut self, related: &ObjectId) -> CoreResult<()> {
        self.get_object(related).map(|_| ())
    }

    fn execute_modification(&mut self, command: Command) -> CoreResult<()> {
        let expanded = command.expand_to_all_related_objects(self)?;
        expanded.notify_and_perform(self)
    }

    /// Returns the object related through a single-object property.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for collection properties and loading
    /// errors.
    pub fn get_related_object(
        &mut self,
        object: &ObjectId,
        property: &str,
    ) -> CoreResult<Option<ObjectId>> {
        let end_point = self.relation_end_point(object, property)?;
        if end_point.is_collection() {
            return Err(CoreError::invalid_argument(
                "property",
                format!("'{property}' is a collection property; use get_related_objects."),
            ));
        }
        Ok(end_point.opposite_object_id().cloned())
    }

    /// Returns the objects related through a collection property.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for single-object properties and loading
    /// errors.
    pub fn get_related_objects(
        &mut self,
        object: &ObjectId,
        property: &str,
    ) -> CoreResult<Vec<ObjectId>> {
        let end_point = self.relation_end_point(object, property)?;
        if !end_point.is_collection() {
            return Err(CoreError::invalid_argument(
                "property",
                format!("'{property}' is a single-object property; use get_related_object."),
            ));
        }
        Ok(end_point.opposite_object_ids())
    }

    /// Returns the objects related through a property when the transaction
    /// started or last committed.
    ///
    /// # Errors
    ///
    /// Returns loading errors.
    pub fn get_original_related_objects(
        &mut self,
        object: &ObjectId,
        property: &str,
    ) -> CoreResult<Vec<ObjectId>> {
        Ok(self
            .relation_end_point(object, property)?
            .original_opposite_object_ids())
    }

    /// Sets the object related through a single-object property, updating
    /// every affected opposite end-point.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for collection properties and objects of
    /// the wrong class, `ObjectDeleted`, listener vetoes and loading errors.
    pub fn set_related_object(
        &mut self,
        object: &ObjectId,
        property: &str,
        related: Option<&ObjectId>,
    ) -> CoreResult<()> {
        if let Some(related) = related {
            self.check_related(related)?;
        }
        let end_point = self.modifiable_end_point(object, property)?;
        let command = end_point.create_set_command(related.cloned())?;
        self.execute_modification(command)
    }

    /// Inserts `related` into a collection at `index`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for read-only collections and
    /// `InvalidArgument` for invalid positions or members.
    pub fn insert_related_object(
        &mut self,
        object: &ObjectId,
        property: &str,
        index: usize,
        related: &ObjectId,
    ) -> CoreResult<()> {
        self.check_related(related)?;
        let end_point = self.modifiable_collection(object, property)?;
        let command = end_point.create_insert_command(related.clone(), index)?;
        self.execute_modification(command)
    }

    /// Appends `related` to a collection.
    ///
    /// # Errors
    ///
    /// See [`insert_related_object`](Self::insert_related_object).
    pub fn add_related_object(
        &mut self,
        object: &ObjectId,
        property: &str,
        related: &ObjectId,
    ) -> CoreResult<()> {
        self.check_related(related)?;
        let end_point = self.modifiable_collection(object, property)?;
        let command = end_point.create_add_command(related.clone())?;
        self.execute_modification(command)
    }

    /// Removes `related` from a collection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for read-only collections and
    /// `InvalidArgument` if `related` is not a member.
    pub fn remove_related_object(
        &mut self,
        object: &ObjectId,
        property: &str,
        related: &ObjectId,
    ) -> CoreResult<()> {
        let end_point = self.modifiable_collection(object, property)?;
        let command = end_point.create_remove_command(related)?;
        self.execute_modification(command)
    }

    /// Replaces the member at `index` with `related`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for read-only collections and
    /// `InvalidArgument` for invalid positions or members.
    pub fn replace_related_object(
        &mut self,
        object: &ObjectId,
        property: &str,
        index: usize,
        related: &ObjectId,
    ) -> CoreResult<()> {
        self.check_related(related)?;
        let end_point = self.modifiable_collection(object, property)?;
        let command = end_point.create_replace_command(index, related.clone())?;
        self.execute_modification(command)
    }

    /// Replaces the whole contents of a collection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for read-only collections and
    /// `InvalidArgument` for duplicates or members of the wrong class.
    pub fn set_related_objects(
        &mut self,
        object: &ObjectId,
        property: &str,
        related: Vec<ObjectId>,
    ) -> CoreResult<()> {
        for item in &related {
            self.check_related(item)?;
        }
        let end_point = self.modifiable_collection(object, property)?;
        let command = end_point.create_set_collection_command(related)?;
        self.execute_modification(command)
    }

    /// Marks a relation touched without changing it.
    ///
    /// # Errors
    ///
    /// Returns `ObjectDeleted` and loading errors.
    pub fn touch_relation(&mut self, object: &ObjectId, property: &str) -> CoreResult<()> {
        let end_point = self.modifiable_end_point(object, property)?;
        let command = end_point.create_touch_command()?;
        self.execute_modification(command)
    }
}
