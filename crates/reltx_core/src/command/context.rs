//! Execution context of commands.

use crate::data::{DataContainer, DataContainerMap};
use crate::end_point::{LazyLoader, RelationEndPoint, RelationEndPointId};
use crate::error::{CoreError, CoreResult};
use crate::events::{EventDispatcher, LoadedObjectContext, TransactionEventSink};
use crate::object::ObjectId;
use crate::transaction::{DataManager, ObjectSource};
use crate::types::TransactionId;
use std::collections::BTreeSet;
use tracing::debug;

/// Everything a command needs while it runs: the data of one transaction,
/// the source it loads missing objects from, and its event dispatcher.
///
/// Contexts are short-lived; the transaction hierarchy builds one per
/// operation.
///
/// Objects loaded through the context get their `loaded` handlers run once
/// the load that pulled them in has finished.
pub struct CommandContext<'a> {
    transaction: TransactionId,
    root: TransactionId,
    pub(crate) data: &'a mut DataManager,
    source: &'a mut dyn ObjectSource,
    events: &'a EventDispatcher,
    loaded: Vec<ObjectId>,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(
        transaction: TransactionId,
        root: TransactionId,
        data: &'a mut DataManager,
        source: &'a mut dyn ObjectSource,
        events: &'a EventDispatcher,
    ) -> Self {
        Self {
            transaction,
            root,
            data,
            source,
            events,
            loaded: Vec::new(),
        }
    }

    /// Returns the transaction the context operates on.
    #[must_use]
    pub fn transaction(&self) -> TransactionId {
        self.transaction
    }

    /// Returns the root of the transaction's hierarchy.
    #[must_use]
    pub fn root_transaction(&self) -> TransactionId {
        self.root
    }

    /// Returns the event dispatcher of the transaction.
    #[must_use]
    pub fn events(&self) -> &'a EventDispatcher {
        self.events
    }

    /// Returns the transaction's data.
    #[must_use]
    pub fn data(&self) -> &DataManager {
        self.data
    }

    fn split(&mut self) -> (&mut crate::end_point::RelationEndPointManager, ContextLoader<'_>) {
        let DataManager {
            containers,
            end_points,
            invalid_objects,
            ..
        } = &mut *self.data;
        let loader = ContextLoader {
            containers,
            invalid_objects,
            source: &mut *self.source,
            events: self.events,
            loaded: &mut self.loaded,
        };
        (end_points, loader)
    }

    /// Returns a snapshot of an end-point, loading it and completing its
    /// contents first.
    ///
    /// Null IDs yield the matching null end-point.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for anonymous IDs and propagates loading
    /// errors.
    pub fn end_point(&mut self, id: &RelationEndPointId) -> CoreResult<RelationEndPoint> {
        let is_null = {
            let (end_points, mut loader) = self.split();
            let is_null = end_points
                .get_relation_end_point_with_lazy_load(id, &mut loader)?
                .is_null();
            if !is_null {
                end_points.ensure_data_complete(id, &mut loader)?;
            }
            is_null
        };
        self.run_loaded_handlers()?;
        if is_null {
            return Ok(RelationEndPoint::null(id.clone()));
        }
        self.data.end_points.get(id).cloned().ok_or_else(|| {
            CoreError::invalid_operation(format!("Relation end-point '{id}' is not registered."))
        })
    }

    /// Returns an end-point as registered, without loading anything.
    #[must_use]
    pub fn end_point_without_loading(&self, id: &RelationEndPointId) -> Option<RelationEndPoint> {
        self.data
            .end_points
            .get_relation_end_point_without_loading(id)
            .map(std::borrow::Cow::into_owned)
    }

    /// Returns the container of `object`, loading it and registering its
    /// end-points if needed.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound` or `ObjectInvalid`, a veto of the loading
    /// notification, a source error, or the error of a `loaded` handler.
    pub fn ensure_data_container(&mut self, object: &ObjectId) -> CoreResult<&DataContainer> {
        let loaded = {
            let (_, mut loader) = self.split();
            loader.ensure_data_container(object)?.1
        };
        if loaded {
            let container = self
                .data
                .containers
                .get(object)
                .ok_or_else(|| CoreError::object_not_found(object))?;
            self.data
                .end_points
                .register_end_points_for_data_container(container)?;
            self.run_loaded_handlers()?;
        }
        self.data
            .containers
            .get(object)
            .ok_or_else(|| CoreError::object_not_found(object))
    }

    /// Runs the `loaded` handlers of every object loaded since the last
    /// run, including objects the handlers load themselves.
    fn run_loaded_handlers(&mut self) -> CoreResult<()> {
        let events = self.events;
        let transaction = self.transaction;
        while !self.loaded.is_empty() {
            for object in std::mem::take(&mut self.loaded) {
                for handler in events.handlers_of(&object) {
                    let mut context = LoadedObjectContext::new(self, &object);
                    handler.loaded(transaction, &mut context)?;
                }
            }
        }
        Ok(())
    }
}

/// Loads missing containers and end-point contents into one transaction.
pub(crate) struct ContextLoader<'a> {
    containers: &'a mut DataContainerMap,
    invalid_objects: &'a mut BTreeSet<ObjectId>,
    source: &'a mut dyn ObjectSource,
    events: &'a EventDispatcher,
    loaded: &'a mut Vec<ObjectId>,
}

impl LazyLoader for ContextLoader<'_> {
    fn ensure_data_container(&mut self, object: &ObjectId) -> CoreResult<(&DataContainer, bool)> {
        if self.invalid_objects.contains(object) {
            return Err(CoreError::object_invalid(object));
        }
        if self.containers.contains(object) {
            let container = self
                .containers
                .get(object)
                .ok_or_else(|| CoreError::object_not_found(object))?;
            return Ok((container, false));
        }

        let objects = std::slice::from_ref(object);
        self.events.objects_loading(objects)?;
        let container = match self.source.load_data_container(object) {
            Ok(Some(container)) => container,
            Ok(None) => return Err(CoreError::object_not_found(object)),
            Err(error @ CoreError::ObjectInvalid { .. }) => {
                self.invalid_objects.insert(object.clone());
                return Err(error);
            }
            Err(error) => return Err(error),
        };
        debug!(object = %object, "data container loaded");
        self.containers.register(container)?;
        self.events.objects_loaded(objects);
        self.loaded.push(object.clone());

        let container = self
            .containers
            .get(object)
            .ok_or_else(|| CoreError::object_not_found(object))?;
        Ok((container, true))
    }

    fn load_related_object_ids(
        &mut self,
        end_point: &RelationEndPointId,
    ) -> CoreResult<Vec<ObjectId>> {
        self.source.load_related_object_ids(end_point)
    }
}
