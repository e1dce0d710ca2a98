//! Transaction event model.
//!
//! Three layers take part in every notification:
//! - [`TransactionEventSink`]: the raise API the core calls, in a fixed order
//! - [`ClientTransactionListener`]: user-facing listeners, registered either
//!   as extensions or as transaction-level handlers
//! - [`ObjectEventHandler`]: handlers attached to a single object
//!
//! For "-ing" events extensions are notified first, then transaction
//! handlers, then object handlers. "-ed" events run in the reverse order.
//! "-ing" notifications may veto the pending operation by returning an
//! error; nothing has been modified at that point.

mod commit_context;
mod dispatcher;
mod loaded_context;
mod recorder;

pub use commit_context::CommitContext;
pub use dispatcher::EventDispatcher;
pub use loaded_context::LoadedObjectContext;
pub use recorder::{EventRecorder, RecordedEvent};

use crate::data::DataContainerMap;
use crate::end_point::RelationEndPointId;
use crate::error::CoreResult;
use crate::mapping::EndPointDefinition;
use crate::object::{ClassId, ObjectId, Value};
use crate::types::TransactionId;

/// Raise API used by the core.
///
/// Every method has a no-op default so test sinks only implement what they
/// observe.
#[allow(unused_variables)]
pub trait TransactionEventSink {
    /// Objects are about to be loaded.
    ///
    /// # Errors
    ///
    /// An error aborts the load; nothing is registered.
    fn objects_loading(&self, objects: &[ObjectId]) -> CoreResult<()> {
        Ok(())
    }

    /// Objects were loaded.
    fn objects_loaded(&self, objects: &[ObjectId]) {}

    /// Objects are about to be unloaded.
    ///
    /// # Errors
    ///
    /// An error aborts the unload.
    fn objects_unloading(&self, objects: &[ObjectId]) -> CoreResult<()> {
        Ok(())
    }

    /// Objects were unloaded.
    fn objects_unloaded(&self, objects: &[ObjectId]) {}

    /// A new object of `class_id` is about to be created.
    ///
    /// # Errors
    ///
    /// An error aborts the creation.
    fn new_object_creating(&self, class_id: &ClassId) -> CoreResult<()> {
        Ok(())
    }

    /// An object is about to be deleted.
    ///
    /// # Errors
    ///
    /// An error aborts the deletion.
    fn object_deleting(&self, object: &ObjectId) -> CoreResult<()> {
        Ok(())
    }

    /// An object was deleted.
    fn object_deleted(&self, object: &ObjectId) {}

    /// A value property is about to change.
    ///
    /// # Errors
    ///
    /// An error aborts the change.
    fn property_value_changing(
        &self,
        object: &ObjectId,
        property: &str,
        old: &Value,
        new: &Value,
    ) -> CoreResult<()> {
        Ok(())
    }

    /// A value property changed.
    fn property_value_changed(&self, object: &ObjectId, property: &str, old: &Value, new: &Value) {
    }

    /// A relation property is about to change.
    ///
    /// # Errors
    ///
    /// An error aborts the whole command before anything is performed.
    fn relation_changing(
        &self,
        object: &ObjectId,
        end_point: &EndPointDefinition,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> CoreResult<()> {
        Ok(())
    }

    /// A relation property changed.
    fn relation_changed(
        &self,
        object: &ObjectId,
        end_point: &EndPointDefinition,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) {
    }

    /// The changed-state of a virtual end-point may have changed.
    ///
    /// `has_changed` is `None` if the end-point is no longer registered.
    fn virtual_end_point_state_updated(
        &self,
        end_point: &RelationEndPointId,
        has_changed: Option<bool>,
    ) {
    }

    /// A data container is about to be removed; `map` still contains it.
    fn data_container_map_unregistering(&self, map: &DataContainerMap, object: &ObjectId) {}

    /// A relation end-point is about to be removed from the registry.
    fn relation_end_point_map_unregistering(&self, end_point: &RelationEndPointId) {}
}

/// A user-facing transaction listener.
///
/// Listeners see every event of the transactions they are attached to.
/// All methods default to doing nothing.
#[allow(unused_variables)]
pub trait ClientTransactionListener: Send + Sync {
    /// See [`TransactionEventSink::objects_loading`].
    ///
    /// # Errors
    ///
    /// An error aborts the load.
    fn objects_loading(&self, tx: TransactionId, objects: &[ObjectId]) -> CoreResult<()> {
        Ok(())
    }

    /// See [`TransactionEventSink::objects_loaded`].
    fn objects_loaded(&self, tx: TransactionId, objects: &[ObjectId]) {}

    /// See [`TransactionEventSink::objects_unloading`].
    ///
    /// # Errors
    ///
    /// An error aborts the unload.
    fn objects_unloading(&self, tx: TransactionId, objects: &[ObjectId]) -> CoreResult<()> {
        Ok(())
    }

    /// See [`TransactionEventSink::objects_unloaded`].
    fn objects_unloaded(&self, tx: TransactionId, objects: &[ObjectId]) {}

    /// See [`TransactionEventSink::new_object_creating`].
    ///
    /// # Errors
    ///
    /// An error aborts the creation.
    fn new_object_creating(&self, tx: TransactionId, class_id: &ClassId) -> CoreResult<()> {
        Ok(())
    }

    /// See [`TransactionEventSink::object_deleting`].
    ///
    /// # Errors
    ///
    /// An error aborts the deletion.
    fn object_deleting(&self, tx: TransactionId, object: &ObjectId) -> CoreResult<()> {
        Ok(())
    }

    /// See [`TransactionEventSink::object_deleted`].
    fn object_deleted(&self, tx: TransactionId, object: &ObjectId) {}

    /// See [`TransactionEventSink::property_value_changing`].
    ///
    /// # Errors
    ///
    /// An error aborts the change.
    fn property_value_changing(
        &self,
        tx: TransactionId,
        object: &ObjectId,
        property: &str,
        old: &Value,
        new: &Value,
    ) -> CoreResult<()> {
        Ok(())
    }

    /// See [`TransactionEventSink::property_value_changed`].
    fn property_value_changed(
        &self,
        tx: TransactionId,
        object: &ObjectId,
        property: &str,
        old: &Value,
        new: &Value,
    ) {
    }

    /// See [`TransactionEventSink::relation_changing`].
    ///
    /// # Errors
    ///
    /// An error aborts the command.
    fn relation_changing(
        &self,
        tx: TransactionId,
        object: &ObjectId,
        end_point: &EndPointDefinition,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> CoreResult<()> {
        Ok(())
    }

    /// See [`TransactionEventSink::relation_changed`].
    fn relation_changed(
        &self,
        tx: TransactionId,
        object: &ObjectId,
        end_point: &EndPointDefinition,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) {
    }

    /// See [`TransactionEventSink::virtual_end_point_state_updated`].
    fn virtual_end_point_state_updated(
        &self,
        tx: TransactionId,
        end_point: &RelationEndPointId,
        has_changed: Option<bool>,
    ) {
    }

    /// See [`TransactionEventSink::data_container_map_unregistering`].
    fn data_container_map_unregistering(
        &self,
        tx: TransactionId,
        map: &DataContainerMap,
        object: &ObjectId,
    ) {
    }

    /// See [`TransactionEventSink::relation_end_point_map_unregistering`].
    fn relation_end_point_map_unregistering(
        &self,
        tx: TransactionId,
        end_point: &RelationEndPointId,
    ) {
    }

    /// The transaction is about to commit `objects`.
    ///
    /// Objects registered through `context` get a further pass.
    ///
    /// # Errors
    ///
    /// An error aborts the commit; nothing has been persisted.
    fn transaction_committing(
        &self,
        tx: TransactionId,
        objects: &[ObjectId],
        context: &mut CommitContext<'_>,
    ) -> CoreResult<()> {
        Ok(())
    }

    /// The transaction committed `objects`.
    fn transaction_committed(&self, tx: TransactionId, objects: &[ObjectId]) {}

    /// The transaction is about to roll back `objects`.
    ///
    /// Objects registered through `context` get a further pass.
    ///
    /// # Errors
    ///
    /// An error aborts the rollback; nothing has been reverted.
    fn transaction_rolling_back(
        &self,
        tx: TransactionId,
        objects: &[ObjectId],
        context: &mut CommitContext<'_>,
    ) -> CoreResult<()> {
        Ok(())
    }

    /// The transaction rolled back `objects` (new objects excluded).
    fn transaction_rolled_back(&self, tx: TransactionId, objects: &[ObjectId]) {}

    /// A sub-transaction of `tx` was created.
    fn sub_transaction_created(&self, tx: TransactionId, sub_transaction: TransactionId) {}

    /// The transaction was discarded.
    fn transaction_discarded(&self, tx: TransactionId) {}
}

/// Handler attached to a single object.
#[allow(unused_variables)]
pub trait ObjectEventHandler: Send + Sync {
    /// The object was loaded into the transaction `tx`.
    ///
    /// Runs after the object's end-points are registered, also when `tx`
    /// is the read-only parent of the sub-transaction that asked for the
    /// object.
    ///
    /// # Errors
    ///
    /// An error fails the operation that loaded the object; the object
    /// stays loaded.
    fn loaded(&self, tx: TransactionId, context: &mut LoadedObjectContext<'_, '_>) -> CoreResult<()> {
        Ok(())
    }

    /// One of the object's relation properties is about to change.
    ///
    /// # Errors
    ///
    /// An error aborts the command.
    fn relation_changing(
        &self,
        tx: TransactionId,
        end_point: &EndPointDefinition,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> CoreResult<()> {
        Ok(())
    }

    /// One of the object's relation properties changed.
    fn relation_changed(
        &self,
        tx: TransactionId,
        end_point: &EndPointDefinition,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) {
    }

    /// A value property is about to change.
    ///
    /// # Errors
    ///
    /// An error aborts the change.
    fn property_value_changing(
        &self,
        tx: TransactionId,
        property: &str,
        old: &Value,
        new: &Value,
    ) -> CoreResult<()> {
        Ok(())
    }

    /// A value property changed.
    fn property_value_changed(&self, tx: TransactionId, property: &str, old: &Value, new: &Value) {
    }

    /// The object is about to be deleted.
    ///
    /// # Errors
    ///
    /// An error aborts the deletion.
    fn deleting(&self, tx: TransactionId) -> CoreResult<()> {
        Ok(())
    }

    /// The object was deleted.
    fn deleted(&self, tx: TransactionId) {}

    /// The object is about to be committed.
    ///
    /// # Errors
    ///
    /// An error aborts the commit.
    fn committing(&self, tx: TransactionId, context: &mut CommitContext<'_>) -> CoreResult<()> {
        Ok(())
    }

    /// The object was committed.
    fn committed(&self, tx: TransactionId) {}

    /// The object is about to be rolled back.
    ///
    /// # Errors
    ///
    /// An error aborts the rollback.
    fn rolling_back(&self, tx: TransactionId, context: &mut CommitContext<'_>) -> CoreResult<()> {
        Ok(())
    }

    /// The object was rolled back.
    fn rolled_back(&self, tx: TransactionId) {}
}
