//! The relation end-point registry of one transaction.

use super::id::RelationEndPointId;
use super::loader::LazyLoader;
use super::real::RealObjectEndPoint;
use super::relation::RelationEndPoint;
use crate::command::Command;
use crate::config::Config;
use crate::data::DataContainer;
use crate::error::{CoreError, CoreResult};
use crate::events::TransactionEventSink;
use crate::mapping::{MappingConfiguration, RelationKind};
use crate::object::ObjectId;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Owns every end-point materialized in one transaction.
///
/// Real end-points are registered together with their data container.
/// Virtual end-points of existing objects are registered on demand and
/// start out incomplete; their contents are loaded when first needed.
#[derive(Debug)]
pub struct RelationEndPointManager {
    mapping: Arc<MappingConfiguration>,
    eager_virtual_load: bool,
    end_points: BTreeMap<RelationEndPointId, RelationEndPoint>,
}

impl RelationEndPointManager {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(mapping: Arc<MappingConfiguration>, config: &Config) -> Self {
        Self {
            mapping,
            eager_virtual_load: config.eager_virtual_load_on_lazy_access,
            end_points: BTreeMap::new(),
        }
    }

    /// Returns the number of registered end-points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end_points.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end_points.is_empty()
    }

    /// Iterates the registered end-points in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &RelationEndPoint> {
        self.end_points.values()
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &RelationEndPointId) -> bool {
        self.end_points.contains_key(id)
    }

    /// Returns a registered end-point.
    #[must_use]
    pub fn get(&self, id: &RelationEndPointId) -> Option<&RelationEndPoint> {
        self.end_points.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &RelationEndPointId) -> Option<&mut RelationEndPoint> {
        self.end_points.get_mut(id)
    }

    fn insert(&mut self, end_point: RelationEndPoint) -> CoreResult<()> {
        let id = end_point.id().clone();
        if self.end_points.contains_key(&id) {
            return Err(CoreError::invalid_operation(format!(
                "Relation end-point '{id}' has already been registered."
            )));
        }
        trace!(end_point = %id, "end-point registered");
        self.end_points.insert(id, end_point);
        Ok(())
    }

    /// Registers the end-points a freshly registered container implies.
    ///
    /// Real end-points are always registered. New objects also get all
    /// their virtual end-points, complete and empty. For existing objects
    /// only the opposite of a non-null 1:1 foreign key is completed, since
    /// its contents follow from the container alone.
    ///
    /// # Errors
    ///
    /// Returns `UnknownClass` for unmapped containers and `InvalidOperation`
    /// if one of the end-points is registered already.
    pub fn register_end_points_for_data_container(
        &mut self,
        container: &DataContainer,
    ) -> CoreResult<()> {
        let mapping = Arc::clone(&self.mapping);
        let class = mapping.class(container.id().class_id())?;
        let owner = container.id();

        for definition in class.real_end_points() {
            let id = RelationEndPointId::new(Some(owner.clone()), definition.clone());
            let real = RealObjectEndPoint::from_container(id.clone(), container);
            let opposite = real.opposite_object_id().cloned();
            self.insert(RelationEndPoint::RealObject(real))?;

            if container.is_new() || definition.relation_kind() != RelationKind::OneToOne {
                continue;
            }
            if let Some(opposite) = opposite {
                let virtual_id = id.opposite(Some(opposite));
                if !self.end_points.contains_key(&virtual_id) {
                    self.insert(RelationEndPoint::incomplete_virtual(virtual_id.clone())?)?;
                }
                if !self.is_complete(&virtual_id) {
                    self.complete_from_registry(&virtual_id, vec![owner.clone()])?;
                }
            }
        }

        if container.is_new() {
            for definition in class.virtual_end_points() {
                let id = RelationEndPointId::new(Some(owner.clone()), definition.clone());
                self.insert(RelationEndPoint::empty_virtual(id)?)?;
            }
        }
        debug!(object = %owner, new = container.is_new(), "end-points registered for data container");
        Ok(())
    }

    fn is_complete(&self, id: &RelationEndPointId) -> bool {
        self.end_points
            .get(id)
            .is_some_and(RelationEndPoint::is_data_complete)
    }

    /// Looks up an end-point without loading anything.
    ///
    /// Null and anonymous IDs yield the matching null end-point; other
    /// unregistered IDs yield `None`.
    #[must_use]
    pub fn get_relation_end_point_without_loading(
        &self,
        id: &RelationEndPointId,
    ) -> Option<Cow<'_, RelationEndPoint>> {
        if id.is_null() || id.is_anonymous() {
            return Some(Cow::Owned(RelationEndPoint::null(id.clone())));
        }
        self.end_points.get(id).map(Cow::Borrowed)
    }

    /// Looks up an end-point, registering and loading it as needed.
    ///
    /// A registered end-point is completed. An unregistered real end-point
    /// loads its owning container. An unregistered virtual end-point is
    /// registered without loading its owner; its contents are only loaded
    /// here when eager loading is configured.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for anonymous IDs and propagates loading
    /// errors.
    pub fn get_relation_end_point_with_lazy_load(
        &mut self,
        id: &RelationEndPointId,
        loader: &mut dyn LazyLoader,
    ) -> CoreResult<Cow<'_, RelationEndPoint>> {
        if id.is_anonymous() {
            return Err(CoreError::invalid_argument(
                "end_point_id",
                "get_relation_end_point_with_lazy_load cannot be called for anonymous end points.",
            ));
        }
        let Some(owner) = id.object_id() else {
            return Ok(Cow::Owned(RelationEndPoint::null(id.clone())));
        };

        if self.end_points.contains_key(id) {
            self.ensure_data_complete(id, loader)?;
        } else if id.is_virtual() {
            self.insert(RelationEndPoint::incomplete_virtual(id.clone())?)?;
            if self.eager_virtual_load {
                self.ensure_data_complete(id, loader)?;
            }
        } else {
            let (container, loaded) = loader.ensure_data_container(owner)?;
            if loaded {
                self.register_end_points_for_data_container(container)?;
            } else {
                let real = RealObjectEndPoint::from_container(id.clone(), container);
                self.insert(RelationEndPoint::RealObject(real))?;
            }
        }

        self.end_points.get(id).map(Cow::Borrowed).ok_or_else(|| {
            CoreError::invalid_operation(format!(
                "Relation end-point '{id}' could not be registered."
            ))
        })
    }

    /// Returns a virtual end-point, registering it incomplete if needed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for anonymous or non-virtual IDs.
    pub fn get_or_create_virtual_end_point(
        &mut self,
        id: &RelationEndPointId,
    ) -> CoreResult<Cow<'_, RelationEndPoint>> {
        if id.is_anonymous() {
            return Err(CoreError::invalid_argument(
                "end_point_id",
                "get_or_create_virtual_end_point cannot be called for anonymous end points.",
            ));
        }
        if !id.is_virtual() {
            return Err(CoreError::invalid_argument(
                "end_point_id",
                format!("The given end point ID '{id}' does not denote a virtual end-point."),
            ));
        }
        if id.is_null() {
            return Ok(Cow::Owned(RelationEndPoint::null(id.clone())));
        }
        if !self.end_points.contains_key(id) {
            self.insert(RelationEndPoint::incomplete_virtual(id.clone())?)?;
        }
        self.end_points.get(id).map(Cow::Borrowed).ok_or_else(|| {
            CoreError::invalid_operation(format!(
                "Relation end-point '{id}' could not be registered."
            ))
        })
    }

    /// Loads the contents of a registered, incomplete virtual end-point.
    ///
    /// Every originally related object is loaded, so the current contents
    /// can be derived from the real end-points pointing here.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for unregistered IDs and propagates
    /// loading errors.
    pub fn ensure_data_complete(
        &mut self,
        id: &RelationEndPointId,
        loader: &mut dyn LazyLoader,
    ) -> CoreResult<()> {
        match self.end_points.get(id) {
            None => {
                return Err(CoreError::invalid_operation(format!(
                    "Relation end-point '{id}' is not registered."
                )))
            }
            Some(end_point) if end_point.is_data_complete() => return Ok(()),
            Some(_) => {}
        }

        debug!(end_point = %id, "loading virtual end-point contents");
        let original = loader.load_related_object_ids(id)?;
        for object in &original {
            let (container, loaded) = loader.ensure_data_container(object)?;
            if loaded {
                self.register_end_points_for_data_container(container)?;
            }
        }
        // Registering a 1:1 opposite may already have completed it.
        if self.is_complete(id) {
            return Ok(());
        }
        self.complete_from_registry(id, original)
    }

    /// Completes a virtual end-point from the real end-points pointing at
    /// its owner. Items of `original` that still point here keep their
    /// position; newly attached ones follow in registry order.
    fn complete_from_registry(
        &mut self,
        id: &RelationEndPointId,
        original: Vec<ObjectId>,
    ) -> CoreResult<()> {
        let owner = id.object_id();
        let opposite_definition = id.definition().opposite();
        let pointing: Vec<ObjectId> = self
            .end_points
            .values()
            .filter_map(|end_point| match end_point {
                RelationEndPoint::RealObject(real)
                    if real.id().definition() == &opposite_definition
                        && real.opposite_object_id() == owner =>
                {
                    real.id().object_id().cloned()
                }
                _ => None,
            })
            .collect();

        let mut current: Vec<ObjectId> = original
            .iter()
            .filter(|object| pointing.contains(object))
            .cloned()
            .collect();
        for object in pointing {
            if !current.contains(&object) {
                current.push(object);
            }
        }

        let end_point = self.end_points.get_mut(id).ok_or_else(|| {
            CoreError::invalid_operation(format!("Relation end-point '{id}' is not registered."))
        })?;
        trace!(end_point = %id, items = current.len(), "virtual end-point completed");
        end_point.mark_data_complete(original, current);
        Ok(())
    }

    /// Builds the command detaching every end-point of `container`.
    ///
    /// For existing objects only the real end-points are included, and only
    /// if neither they nor their opposites have changed. For new objects
    /// all end-points are included, provided none still holds a relation.
    /// Every violation is reported in a single exception command.
    #[must_use]
    pub fn create_unregister_command_for_data_container(&self, container: &DataContainer) -> Command {
        let object = container.id();
        let class = match self.mapping.class(object.class_id()) {
            Ok(class) => class,
            Err(error) => return Command::Exception(error),
        };

        let mut unregistered = Vec::new();
        let mut problems = Vec::new();
        let mut offending = Vec::new();
        for definition in class.end_points() {
            let id = RelationEndPointId::new(Some(object.clone()), definition.clone());
            let Some(end_point) = self.end_points.get(&id) else {
                continue;
            };

            if container.is_new() {
                let has_partner = !end_point.opposite_object_ids().is_empty()
                    || !end_point.original_opposite_object_ids().is_empty();
                if has_partner {
                    problems.push(format!(
                        "Relation end-point '{id}' would leave a dangling reference."
                    ));
                    offending.push(id);
                } else {
                    unregistered.push(id);
                }
                continue;
            }

            if definition.is_virtual() {
                continue;
            }
            if end_point.has_changed() {
                problems.push(format!(
                    "Relation end-point '{id}' has changed. Only unchanged relation end-points can be unregistered."
                ));
                offending.push(id);
            } else if self.opposite_has_changed(end_point) {
                problems.push(format!(
                    "The opposite relation property '{}' of relation end-point '{id}' has changed. Only unchanged relation end-points can be unregistered.",
                    definition.opposite().full_name()
                ));
                offending.push(id);
            } else {
                unregistered.push(id);
            }
        }

        if problems.is_empty() {
            Command::UnregisterEndPoints(unregistered)
        } else {
            Command::Exception(CoreError::consistency_violation(
                format!(
                    "The relations of object '{object}' cannot be unloaded.\n{}",
                    problems.join("\n")
                ),
                offending,
            ))
        }
    }

    fn opposite_has_changed(&self, end_point: &RelationEndPoint) -> bool {
        if !end_point.definition().is_bidirectional() {
            return false;
        }
        end_point.opposite_object_id().is_some_and(|opposite| {
            let opposite_id = end_point.id().opposite(Some(opposite.clone()));
            self.end_points
                .get(&opposite_id)
                .is_some_and(RelationEndPoint::has_changed)
        })
    }

    /// Builds the command dropping the contents of virtual end-points.
    ///
    /// Unloaded end-points are skipped. Changed ones produce one exception
    /// each, combined with the unload of the rest.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if any ID does not denote a virtual
    /// end-point.
    pub fn create_unload_virtual_end_points_command(
        &self,
        ids: &[RelationEndPointId],
    ) -> CoreResult<Command> {
        if let Some(id) = ids
            .iter()
            .find(|id| !id.is_virtual() || id.is_anonymous() || id.is_null())
        {
            return Err(CoreError::invalid_argument(
                "end_point_ids",
                format!("The given end point ID '{id}' does not denote a virtual end-point."),
            ));
        }

        let mut unloadable = Vec::new();
        let mut commands = Vec::new();
        for id in ids {
            match self.end_points.get(id) {
                Some(end_point) if !end_point.is_data_complete() => {}
                None => {}
                Some(end_point) if end_point.has_changed() => {
                    commands.push(Command::Exception(CoreError::consistency_violation(
                        format!(
                            "The end point with ID '{id}' has been changed. Changed end points cannot be unloaded."
                        ),
                        vec![id.clone()],
                    )));
                }
                Some(_) => unloadable.push(id.clone()),
            }
        }

        Ok(match (commands.is_empty(), unloadable.is_empty()) {
            (true, true) => Command::Nop,
            (true, false) => Command::UnloadVirtualEndPoints(unloadable),
            (false, _) => {
                if !unloadable.is_empty() {
                    commands.push(Command::UnloadVirtualEndPoints(unloadable));
                }
                Command::Composite(commands)
            }
        })
    }

    /// Removes end-points from the registry.
    ///
    /// Removing a real end-point marks its unchanged opposite incomplete,
    /// so its contents are reloaded when needed next.
    pub(crate) fn unregister_end_points(
        &mut self,
        ids: &[RelationEndPointId],
        sink: &dyn TransactionEventSink,
    ) {
        for id in ids {
            if !self.end_points.contains_key(id) {
                continue;
            }
            sink.relation_end_point_map_unregistering(id);
            let Some(end_point) = self.end_points.remove(id) else {
                continue;
            };
            trace!(end_point = %id, "end-point unregistered");

            if !end_point.is_virtual() && end_point.definition().is_bidirectional() {
                if let Some(opposite) = end_point.opposite_object_id() {
                    let opposite_id = id.opposite(Some(opposite.clone()));
                    if let Some(opposite) = self.end_points.get_mut(&opposite_id) {
                        if opposite.can_be_marked_incomplete() {
                            opposite.mark_data_incomplete();
                        }
                    }
                }
            }
        }
    }

    /// Drops the contents of the given virtual end-points.
    pub(crate) fn mark_data_incomplete(&mut self, ids: &[RelationEndPointId]) {
        for id in ids {
            if let Some(end_point) = self.end_points.get_mut(id) {
                trace!(end_point = %id, "virtual end-point unloaded");
                end_point.mark_data_incomplete();
            }
        }
    }

    /// Removes every end-point owned by `object`.
    pub(crate) fn remove_end_points_of(
        &mut self,
        object: &ObjectId,
        sink: &dyn TransactionEventSink,
    ) {
        let owned: Vec<RelationEndPointId> = self
            .end_points
            .keys()
            .filter(|id| id.object_id() == Some(object))
            .cloned()
            .collect();
        for id in &owned {
            sink.relation_end_point_map_unregistering(id);
            self.end_points.remove(id);
        }
    }

    /// Registers the real end-point `id` from its container if it is not
    /// registered yet.
    pub(crate) fn ensure_real_end_point_registered(
        &mut self,
        id: &RelationEndPointId,
        container: &DataContainer,
    ) {
        if id.is_virtual() || self.end_points.contains_key(id) {
            return;
        }
        let real = RealObjectEndPoint::from_container(id.clone(), container);
        self.end_points
            .insert(id.clone(), RelationEndPoint::RealObject(real));
    }

    /// Takes over an end-point's state from a sub-transaction, registering
    /// it if needed.
    pub(crate) fn set_data_from(&mut self, source: &RelationEndPoint) -> CoreResult<()> {
        match self.end_points.get_mut(source.id()) {
            Some(target) => target.set_data_from(source),
            None => {
                self.end_points.insert(source.id().clone(), source.clone());
                Ok(())
            }
        }
    }

    /// Commits every end-point: current contents become the original ones.
    pub fn commit_all_end_points(&mut self) {
        for end_point in self.end_points.values_mut() {
            end_point.commit();
        }
    }

    /// Rolls every end-point back to its original contents.
    pub fn rollback_all_end_points(&mut self) {
        for end_point in self.end_points.values_mut() {
            end_point.rollback();
        }
    }

    /// Rolls back and unregisters every end-point.
    pub fn reset(&mut self, sink: &dyn TransactionEventSink) {
        self.rollback_all_end_points();
        for id in self.end_points.keys() {
            sink.relation_end_point_map_unregistering(id);
        }
        debug!(end_points = self.end_points.len(), "end-point registry reset");
        self.end_points.clear();
    }

    /// Verifies that every complete, registered end-point agrees with its
    /// registered, complete opposites.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyViolation` naming every disagreeing end-point.
    pub fn check_bidirectional_consistency(&self) -> CoreResult<()> {
        let mut problems = Vec::new();
        let mut offending = Vec::new();
        for end_point in self.end_points.values() {
            if !end_point.is_data_complete() || !end_point.definition().is_bidirectional() {
                continue;
            }
            let owner = end_point.object_id();
            for opposite_object in end_point.opposite_object_ids() {
                let opposite_id = end_point.id().opposite(Some(opposite_object.clone()));
                let Some(opposite) = self.end_points.get(&opposite_id) else {
                    continue;
                };
                if !opposite.is_data_complete() {
                    continue;
                }
                let agrees = opposite
                    .opposite_object_ids()
                    .iter()
                    .any(|o| Some(o) == owner);
                if !agrees {
                    problems.push(format!(
                        "Relation end-point '{}' refers to '{opposite_object}', but '{opposite_id}' does not refer back.",
                        end_point.id()
                    ));
                    offending.push(end_point.id().clone());
                }
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(CoreError::consistency_violation(
                problems.join("\n"),
                offending,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataContainerMap;
    use crate::events::EventDispatcher;
    use crate::mapping::{CollectionKind, MappingBuilder};
    use crate::object::Value;
    use crate::types::TransactionId;
    use uuid::Uuid;

    fn mapping() -> Arc<MappingConfiguration> {
        Arc::new(
            MappingBuilder::new()
                .class("Order")
                .class("OrderTicket")
                .class("Customer")
                .class("Client")
                .one_to_one("OrderToTicket", "OrderTicket", "Order", "Order", "OrderTicket")
                .one_to_many(
                    "OrderToCustomer",
                    "Order",
                    "Customer",
                    "Customer",
                    "Orders",
                    CollectionKind::DomainObjectCollection,
                )
                .unidirectional("ClientToParent", "Client", "ParentClient", "Client")
                .build()
                .unwrap(),
        )
    }

    fn oid(class: &str, n: u128) -> ObjectId {
        ObjectId::new(class, Uuid::from_u128(n))
    }

    fn ep(mapping: &MappingConfiguration, object: &ObjectId, property: &str) -> RelationEndPointId {
        RelationEndPointId::for_property(mapping, object, property).unwrap()
    }

    fn existing(mapping: &MappingConfiguration, id: ObjectId, fks: &[(&str, ObjectId)]) -> DataContainer {
        let class = mapping.class(id.class_id()).unwrap();
        let mut values = DataContainer::default_values(class);
        for (property, target) in fks {
            values.insert((*property).to_string(), Value::Reference(target.clone()));
        }
        DataContainer::existing(id, values)
    }

    /// Serves containers and related ids from fixed data.
    struct FakeLoader {
        containers: DataContainerMap,
        stored: BTreeMap<ObjectId, DataContainer>,
        related: BTreeMap<RelationEndPointId, Vec<ObjectId>>,
        loads: Vec<ObjectId>,
    }

    impl FakeLoader {
        fn new(stored: Vec<DataContainer>) -> Self {
            Self {
                containers: DataContainerMap::new(),
                stored: stored.into_iter().map(|c| (c.id().clone(), c)).collect(),
                related: BTreeMap::new(),
                loads: Vec::new(),
            }
        }
    }

    impl LazyLoader for FakeLoader {
        fn ensure_data_container(
            &mut self,
            object: &ObjectId,
        ) -> CoreResult<(&DataContainer, bool)> {
            let mut loaded = false;
            if !self.containers.contains(object) {
                let container = self
                    .stored
                    .get(object)
                    .cloned()
                    .ok_or_else(|| CoreError::object_not_found(object))?;
                self.containers.register(container)?;
                self.loads.push(object.clone());
                loaded = true;
            }
            let container = self
                .containers
                .get(object)
                .ok_or_else(|| CoreError::object_not_found(object))?;
            Ok((container, loaded))
        }

        fn load_related_object_ids(
            &mut self,
            end_point: &RelationEndPointId,
        ) -> CoreResult<Vec<ObjectId>> {
            Ok(self.related.get(end_point).cloned().unwrap_or_default())
        }
    }

    fn manager(mapping: &Arc<MappingConfiguration>) -> RelationEndPointManager {
        RelationEndPointManager::new(Arc::clone(mapping), &Config::default())
    }

    #[test]
    fn new_container_gets_complete_empty_virtual_end_points() {
        let mapping = mapping();
        let mut manager = manager(&mapping);
        let order = oid("Order", 1);
        let class = mapping.class(order.class_id()).unwrap();
        let container = DataContainer::new_object(order.clone(), DataContainer::default_values(class));

        manager.register_end_points_for_data_container(&container).unwrap();

        for property in ["OrderTicket", "Customer"] {
            let end_point = manager.get(&ep(&mapping, &order, property)).unwrap();
            assert!(end_point.is_data_complete());
            assert!(end_point.opposite_object_ids().is_empty());
        }
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn existing_container_leaves_virtual_end_points_unregistered() {
        let mapping = mapping();
        let mut manager = manager(&mapping);
        let customer = oid("Customer", 1);
        let order = oid("Order", 1);
        let container = existing(&mapping, order.clone(), &[("Customer", customer.clone())]);

        manager.register_end_points_for_data_container(&container).unwrap();

        let real = manager.get(&ep(&mapping, &order, "Customer")).unwrap();
        assert_eq!(real.opposite_object_id(), Some(&customer));
        assert!(manager
            .get_relation_end_point_without_loading(&ep(&mapping, &order, "OrderTicket"))
            .is_none());
        assert!(manager
            .get_relation_end_point_without_loading(&ep(&mapping, &customer, "Orders"))
            .is_none());
    }

    #[test]
    fn one_to_one_foreign_key_completes_the_opposite() {
        let mapping = mapping();
        let mut manager = manager(&mapping);
        let order = oid("Order", 1);
        let ticket = oid("OrderTicket", 1);
        let container = existing(&mapping, ticket.clone(), &[("Order", order.clone())]);

        manager.register_end_points_for_data_container(&container).unwrap();

        let opposite = manager.get(&ep(&mapping, &order, "OrderTicket")).unwrap();
        assert!(opposite.is_data_complete());
        assert_eq!(opposite.opposite_object_id(), Some(&ticket));
        assert!(!opposite.has_changed());
    }

    #[test]
    fn without_loading_returns_null_variants() {
        let mapping = mapping();
        let manager = manager(&mapping);
        let client = oid("Client", 1);
        let parent = ep(&mapping, &client, "ParentClient");

        let anonymous = parent.opposite(Some(oid("Client", 2)));
        let found = manager
            .get_relation_end_point_without_loading(&anonymous)
            .unwrap();
        assert!(found.is_null());

        let null = parent.opposite(None);
        assert!(manager
            .get_relation_end_point_without_loading(&null)
            .unwrap()
            .is_null());
    }

    #[test]
    fn lazy_load_rejects_anonymous_end_points() {
        let mapping = mapping();
        let mut manager = manager(&mapping);
        let mut loader = FakeLoader::new(vec![]);
        let anonymous = ep(&mapping, &oid("Client", 1), "ParentClient").opposite(Some(oid("Client", 2)));

        let error = manager
            .get_relation_end_point_with_lazy_load(&anonymous, &mut loader)
            .unwrap_err();
        match error {
            CoreError::InvalidArgument { message, .. } => assert_eq!(
                message,
                "get_relation_end_point_with_lazy_load cannot be called for anonymous end points."
            ),
            other => panic!("unexpected error: {other}"),
        }
        assert!(manager.get_or_create_virtual_end_point(&anonymous).is_err());
    }

    #[test]
    fn lazy_load_of_real_end_point_loads_the_container() {
        let mapping = mapping();
        let mut manager = manager(&mapping);
        let order = oid("Order", 1);
        let mut loader = FakeLoader::new(vec![existing(&mapping, order.clone(), &[])]);

        let end_point = manager
            .get_relation_end_point_with_lazy_load(&ep(&mapping, &order, "Customer"), &mut loader)
            .unwrap();
        assert!(end_point.opposite_object_id().is_none());
        assert_eq!(loader.loads, vec![order]);
    }

    #[test]
    fn lazy_load_of_virtual_end_point_does_not_load_its_owner() {
        let mapping = mapping();
        let mut manager = manager(&mapping);
        let customer = oid("Customer", 1);
        let orders = ep(&mapping, &customer, "Orders");
        let mut loader = FakeLoader::new(vec![
            existing(&mapping, oid("Order", 2), &[("Customer", customer.clone())]),
            existing(&mapping, oid("Order", 1), &[("Customer", customer.clone())]),
        ]);
        loader
            .related
            .insert(orders.clone(), vec![oid("Order", 2), oid("Order", 1)]);

        let end_point = manager
            .get_relation_end_point_with_lazy_load(&orders, &mut loader)
            .unwrap();
        assert!(!end_point.is_data_complete());
        assert!(loader.loads.is_empty());

        manager.ensure_data_complete(&orders, &mut loader).unwrap();
        let end_point = manager.get(&orders).unwrap();
        assert_eq!(
            end_point.opposite_object_ids(),
            vec![oid("Order", 2), oid("Order", 1)]
        );
        assert!(!end_point.has_changed());
        assert!(!loader.loads.contains(&customer));
    }

    #[test]
    fn eager_configuration_completes_on_lazy_load() {
        let mapping = mapping();
        let mut manager = RelationEndPointManager::new(
            Arc::clone(&mapping),
            &Config::default().eager_virtual_load_on_lazy_access(true),
        );
        let customer = oid("Customer", 1);
        let orders = ep(&mapping, &customer, "Orders");
        let mut loader = FakeLoader::new(vec![existing(
            &mapping,
            oid("Order", 1),
            &[("Customer", customer.clone())],
        )]);
        loader.related.insert(orders.clone(), vec![oid("Order", 1)]);

        let end_point = manager
            .get_relation_end_point_with_lazy_load(&orders, &mut loader)
            .unwrap();
        assert!(end_point.is_data_complete());
        assert_eq!(end_point.opposite_object_ids(), vec![oid("Order", 1)]);
    }

    #[test]
    fn get_or_create_rejects_real_end_points() {
        let mapping = mapping();
        let mut manager = manager(&mapping);
        let real = ep(&mapping, &oid("Order", 1), "Customer");
        assert!(matches!(
            manager.get_or_create_virtual_end_point(&real),
            Err(CoreError::InvalidArgument { .. })
        ));

        let orders = ep(&mapping, &oid("Customer", 1), "Orders");
        let created = manager.get_or_create_virtual_end_point(&orders).unwrap();
        assert!(!created.is_data_complete());
        assert!(manager.contains(&orders));
    }

    #[test]
    fn unregister_command_includes_only_unchanged_real_end_points() {
        let mapping = mapping();
        let mut manager = manager(&mapping);
        let order = oid("Order", 1);
        let container = existing(&mapping, order.clone(), &[("Customer", oid("Customer", 1))]);
        manager.register_end_points_for_data_container(&container).unwrap();
        manager
            .get_or_create_virtual_end_point(&ep(&mapping, &order, "OrderTicket"))
            .unwrap();

        match manager.create_unregister_command_for_data_container(&container) {
            Command::UnregisterEndPoints(ids) => {
                assert_eq!(ids, vec![ep(&mapping, &order, "Customer")]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unregister_command_reports_changed_end_point() {
        let mapping = mapping();
        let mut manager = manager(&mapping);
        let order = oid("Order", 1);
        let container = existing(&mapping, order.clone(), &[]);
        manager.register_end_points_for_data_container(&container).unwrap();
        let customer = ep(&mapping, &order, "Customer");
        manager
            .get_mut(&customer)
            .unwrap()
            .set_opposite_object_id(Some(oid("Customer", 9)))
            .unwrap();

        match manager.create_unregister_command_for_data_container(&container) {
            Command::Exception(CoreError::ConsistencyViolation {
                message,
                end_points,
            }) => {
                assert_eq!(end_points, vec![customer.clone()]);
                assert_eq!(
                    message,
                    format!(
                        "The relations of object '{order}' cannot be unloaded.\nRelation end-point '{customer}' has changed. Only unchanged relation end-points can be unregistered."
                    )
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unregistering_real_end_point_marks_opposite_incomplete() {
        let mapping = mapping();
        let mut manager = manager(&mapping);
        let order = oid("Order", 1);
        let ticket = oid("OrderTicket", 1);
        let container = existing(&mapping, ticket.clone(), &[("Order", order.clone())]);
        manager.register_end_points_for_data_container(&container).unwrap();
        let sink = EventDispatcher::new(TransactionId::new(1));

        manager.unregister_end_points(&[ep(&mapping, &ticket, "Order")], &sink);

        let opposite = manager.get(&ep(&mapping, &order, "OrderTicket")).unwrap();
        assert!(!opposite.is_data_complete());
    }

    #[test]
    fn unload_virtual_end_points_partitions() {
        let mapping = mapping();
        let mut manager = manager(&mapping);
        let real = ep(&mapping, &oid("Order", 1), "Customer");
        assert!(manager
            .create_unload_virtual_end_points_command(&[real])
            .is_err());

        let orders = ep(&mapping, &oid("Customer", 1), "Orders");
        assert_eq!(
            manager
                .create_unload_virtual_end_points_command(&[orders.clone()])
                .unwrap(),
            Command::Nop
        );

        let changed = ep(&mapping, &oid("Customer", 2), "Orders");
        for id in [&orders, &changed] {
            manager.get_or_create_virtual_end_point(id).unwrap();
            manager.get_mut(id).unwrap().mark_data_complete(vec![], vec![]);
        }
        manager
            .get_mut(&changed)
            .unwrap()
            .items_mut()
            .unwrap()
            .push(oid("Order", 5));

        let command = manager
            .create_unload_virtual_end_points_command(&[orders.clone(), changed.clone()])
            .unwrap();
        let nested = command.nested_commands();
        assert_eq!(nested.len(), 2);
        assert!(matches!(nested[0], Command::Exception(_)));
        assert_eq!(nested[1], Command::UnloadVirtualEndPoints(vec![orders]));
    }

    #[test]
    fn consistency_check_finds_one_sided_references() {
        let mapping = mapping();
        let mut manager = manager(&mapping);
        let customer = oid("Customer", 1);
        let order = oid("Order", 1);
        let container = existing(&mapping, order.clone(), &[("Customer", customer.clone())]);
        manager.register_end_points_for_data_container(&container).unwrap();
        let orders = ep(&mapping, &customer, "Orders");
        manager.get_or_create_virtual_end_point(&orders).unwrap();
        manager
            .get_mut(&orders)
            .unwrap()
            .mark_data_complete(vec![], vec![]);

        let error = manager.check_bidirectional_consistency().unwrap_err();
        assert!(matches!(
            error,
            CoreError::ConsistencyViolation { ref end_points, .. }
                if end_points == &vec![ep(&mapping, &order, "Customer")]
        ));

        manager
            .get_mut(&orders)
            .unwrap()
            .mark_data_complete(vec![order.clone()], vec![order]);
        manager.check_bidirectional_consistency().unwrap();
    }

    #[test]
    fn reset_clears_registry() {
        let mapping = mapping();
        let mut manager = manager(&mapping);
        let container = existing(&mapping, oid("Order", 1), &[]);
        manager.register_end_points_for_data_container(&container).unwrap();
        manager.reset(&EventDispatcher::new(TransactionId::new(1)));
        assert!(manager.is_empty());
    }
}
