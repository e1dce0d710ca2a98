//! Fan-out of transaction events to listeners and object handlers.

use super::{
    ClientTransactionListener, CommitContext, ObjectEventHandler, TransactionEventSink,
};
use crate::data::DataContainerMap;
use crate::end_point::RelationEndPointId;
use crate::error::CoreResult;
use crate::mapping::EndPointDefinition;
use crate::object::{ClassId, ObjectId, Value};
use crate::types::TransactionId;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Delivers the events of one transaction.
///
/// Extensions are inherited by sub-transactions; transaction handlers and
/// object handlers are not.
#[derive(Clone)]
pub struct EventDispatcher {
    transaction: TransactionId,
    extensions: Vec<Arc<dyn ClientTransactionListener>>,
    transaction_handlers: Vec<Arc<dyn ClientTransactionListener>>,
    object_handlers: BTreeMap<ObjectId, Vec<Arc<dyn ObjectEventHandler>>>,
}

impl EventDispatcher {
    /// Creates a dispatcher without listeners.
    #[must_use]
    pub fn new(transaction: TransactionId) -> Self {
        Self {
            transaction,
            extensions: Vec::new(),
            transaction_handlers: Vec::new(),
            object_handlers: BTreeMap::new(),
        }
    }

    /// Creates the dispatcher of a sub-transaction, inheriting extensions.
    #[must_use]
    pub fn for_sub_transaction(&self, sub_transaction: TransactionId) -> Self {
        Self {
            transaction: sub_transaction,
            extensions: self.extensions.clone(),
            transaction_handlers: Vec::new(),
            object_handlers: BTreeMap::new(),
        }
    }

    /// Returns the transaction whose events are dispatched.
    #[must_use]
    pub fn transaction(&self) -> TransactionId {
        self.transaction
    }

    /// Adds an extension listener.
    pub fn add_extension(&mut self, listener: Arc<dyn ClientTransactionListener>) {
        self.extensions.push(listener);
    }

    /// Adds a transaction-level handler.
    pub fn add_transaction_handler(&mut self, listener: Arc<dyn ClientTransactionListener>) {
        self.transaction_handlers.push(listener);
    }

    /// Attaches a handler to one object.
    pub fn add_object_handler(&mut self, object: ObjectId, handler: Arc<dyn ObjectEventHandler>) {
        self.object_handlers.entry(object).or_default().push(handler);
    }

    /// Detaches all handlers of an object.
    pub fn remove_object_handlers(&mut self, object: &ObjectId) {
        self.object_handlers.remove(object);
    }

    fn listeners(&self) -> impl Iterator<Item = &Arc<dyn ClientTransactionListener>> {
        self.extensions.iter().chain(self.transaction_handlers.iter())
    }

    fn listeners_reversed(&self) -> impl Iterator<Item = &Arc<dyn ClientTransactionListener>> {
        self.transaction_handlers
            .iter()
            .chain(self.extensions.iter())
    }

    pub(crate) fn handlers_of(&self, object: &ObjectId) -> &[Arc<dyn ObjectEventHandler>] {
        self.object_handlers
            .get(object)
            .map_or(&[], Vec::as_slice)
    }

    /// Raises the committing notification for one pass.
    ///
    /// # Errors
    ///
    /// Propagates the first veto.
    pub fn transaction_committing(
        &self,
        objects: &[ObjectId],
        context: &mut CommitContext<'_>,
    ) -> CoreResult<()> {
        for listener in self.listeners() {
            listener.transaction_committing(self.transaction, objects, context)?;
        }
        for object in objects {
            for handler in self.handlers_of(object) {
                handler.committing(self.transaction, context)?;
            }
        }
        Ok(())
    }

    /// Raises the committed notification.
    pub fn transaction_committed(&self, objects: &[ObjectId]) {
        for object in objects {
            for handler in self.handlers_of(object) {
                handler.committed(self.transaction);
            }
        }
        for listener in self.listeners_reversed() {
            listener.transaction_committed(self.transaction, objects);
        }
    }

    /// Raises the rolling-back notification for one pass.
    ///
    /// # Errors
    ///
    /// Propagates the first veto.
    pub fn transaction_rolling_back(
        &self,
        objects: &[ObjectId],
        context: &mut CommitContext<'_>,
    ) -> CoreResult<()> {
        for listener in self.listeners() {
            listener.transaction_rolling_back(self.transaction, objects, context)?;
        }
        for object in objects {
            for handler in self.handlers_of(object) {
                handler.rolling_back(self.transaction, context)?;
            }
        }
        Ok(())
    }

    /// Raises the rolled-back notification.
    pub fn transaction_rolled_back(&self, objects: &[ObjectId]) {
        for object in objects {
            for handler in self.handlers_of(object) {
                handler.rolled_back(self.transaction);
            }
        }
        for listener in self.listeners_reversed() {
            listener.transaction_rolled_back(self.transaction, objects);
        }
    }

    /// Raises the sub-transaction-created notification.
    pub fn sub_transaction_created(&self, sub_transaction: TransactionId) {
        for listener in self.listeners_reversed() {
            listener.sub_transaction_created(self.transaction, sub_transaction);
        }
    }

    /// Raises the discarded notification.
    pub fn transaction_discarded(&self) {
        for listener in self.listeners_reversed() {
            listener.transaction_discarded(self.transaction);
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("transaction", &self.transaction)
            .field("extensions", &self.extensions.len())
            .field("transaction_handlers", &self.transaction_handlers.len())
            .field("object_handlers", &self.object_handlers.len())
            .finish()
    }
}

impl TransactionEventSink for EventDispatcher {
    fn objects_loading(&self, objects: &[ObjectId]) -> CoreResult<()> {
        for listener in self.listeners() {
            listener.objects_loading(self.transaction, objects)?;
        }
        Ok(())
    }

    fn objects_loaded(&self, objects: &[ObjectId]) {
        for listener in self.listeners_reversed() {
            listener.objects_loaded(self.transaction, objects);
        }
    }

    fn objects_unloading(&self, objects: &[ObjectId]) -> CoreResult<()> {
        for listener in self.listeners() {
            listener.objects_unloading(self.transaction, objects)?;
        }
        Ok(())
    }

    fn objects_unloaded(&self, objects: &[ObjectId]) {
        for listener in self.listeners_reversed() {
            listener.objects_unloaded(self.transaction, objects);
        }
    }

    fn new_object_creating(&self, class_id: &ClassId) -> CoreResult<()> {
        for listener in self.listeners() {
            listener.new_object_creating(self.transaction, class_id)?;
        }
        Ok(())
    }

    fn object_deleting(&self, object: &ObjectId) -> CoreResult<()> {
        for listener in self.listeners() {
            listener.object_deleting(self.transaction, object)?;
        }
        for handler in self.handlers_of(object) {
            handler.deleting(self.transaction)?;
        }
        Ok(())
    }

    fn object_deleted(&self, object: &ObjectId) {
        for handler in self.handlers_of(object) {
            handler.deleted(self.transaction);
        }
        for listener in self.listeners_reversed() {
            listener.object_deleted(self.transaction, object);
        }
    }

    fn property_value_changing(
        &self,
        object: &ObjectId,
        property: &str,
        old: &Value,
        new: &Value,
    ) -> CoreResult<()> {
        for listener in self.listeners() {
            listener.property_value_changing(self.transaction, object, property, old, new)?;
        }
        for handler in self.handlers_of(object) {
            handler.property_value_changing(self.transaction, property, old, new)?;
        }
        Ok(())
    }

    fn property_value_changed(&self, object: &ObjectId, property: &str, old: &Value, new: &Value) {
        for handler in self.handlers_of(object) {
            handler.property_value_changed(self.transaction, property, old, new);
        }
        for listener in self.listeners_reversed() {
            listener.property_value_changed(self.transaction, object, property, old, new);
        }
    }

    fn relation_changing(
        &self,
        object: &ObjectId,
        end_point: &EndPointDefinition,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> CoreResult<()> {
        for listener in self.listeners() {
            listener.relation_changing(self.transaction, object, end_point, old, new)?;
        }
        for handler in self.handlers_of(object) {
            handler.relation_changing(self.transaction, end_point, old, new)?;
        }
        Ok(())
    }

    fn relation_changed(
        &self,
        object: &ObjectId,
        end_point: &EndPointDefinition,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) {
        for handler in self.handlers_of(object) {
            handler.relation_changed(self.transaction, end_point, old, new);
        }
        for listener in self.listeners_reversed() {
            listener.relation_changed(self.transaction, object, end_point, old, new);
        }
    }

    fn virtual_end_point_state_updated(
        &self,
        end_point: &RelationEndPointId,
        has_changed: Option<bool>,
    ) {
        for listener in self.listeners_reversed() {
            listener.virtual_end_point_state_updated(self.transaction, end_point, has_changed);
        }
    }

    fn data_container_map_unregistering(&self, map: &DataContainerMap, object: &ObjectId) {
        for listener in self.listeners() {
            listener.data_container_map_unregistering(self.transaction, map, object);
        }
    }

    fn relation_end_point_map_unregistering(&self, end_point: &RelationEndPointId) {
        for listener in self.listeners() {
            listener.relation_end_point_map_unregistering(self.transaction, end_point);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use uuid::Uuid;

    struct Tagged {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ClientTransactionListener for Tagged {
        fn object_deleting(&self, _tx: TransactionId, _object: &ObjectId) -> CoreResult<()> {
            self.log.lock().push(format!("{}:deleting", self.tag));
            Ok(())
        }

        fn object_deleted(&self, _tx: TransactionId, _object: &ObjectId) {
            self.log.lock().push(format!("{}:deleted", self.tag));
        }
    }

    impl ObjectEventHandler for Tagged {
        fn deleting(&self, _tx: TransactionId) -> CoreResult<()> {
            self.log.lock().push(format!("{}:deleting", self.tag));
            Ok(())
        }

        fn deleted(&self, _tx: TransactionId) {
            self.log.lock().push(format!("{}:deleted", self.tag));
        }
    }

    struct Veto;

    impl ClientTransactionListener for Veto {
        fn objects_loading(&self, _tx: TransactionId, _objects: &[ObjectId]) -> CoreResult<()> {
            Err(crate::error::CoreError::listener_aborted("no loading"))
        }
    }

    #[test]
    fn ing_and_ed_orders_are_mirrored() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let object = ObjectId::new("Order", Uuid::from_u128(1));
        let mut dispatcher = EventDispatcher::new(TransactionId::new(1));
        let tagged = |tag| {
            Arc::new(Tagged {
                tag,
                log: Arc::clone(&log),
            })
        };
        dispatcher.add_extension(tagged("ext"));
        dispatcher.add_transaction_handler(tagged("tx"));
        dispatcher.add_object_handler(object.clone(), tagged("obj"));

        dispatcher.object_deleting(&object).unwrap();
        dispatcher.object_deleted(&object);

        assert_eq!(
            *log.lock(),
            vec![
                "ext:deleting",
                "tx:deleting",
                "obj:deleting",
                "obj:deleted",
                "tx:deleted",
                "ext:deleted",
            ]
        );
    }

    #[test]
    fn veto_propagates() {
        let mut dispatcher = EventDispatcher::new(TransactionId::new(1));
        dispatcher.add_extension(Arc::new(Veto));
        let result = dispatcher.objects_loading(&[ObjectId::new("Order", Uuid::nil())]);
        assert!(result.unwrap_err().is_listener_abort());
    }

    #[test]
    fn sub_transaction_inherits_extensions_only() {
        let mut dispatcher = EventDispatcher::new(TransactionId::new(1));
        dispatcher.add_extension(Arc::new(Veto));
        dispatcher.add_transaction_handler(Arc::new(Veto));

        let sub = dispatcher.for_sub_transaction(TransactionId::new(2));
        assert_eq!(sub.transaction(), TransactionId::new(2));
        assert_eq!(sub.extensions.len(), 1);
        assert!(sub.transaction_handlers.is_empty());
    }
}
