//! Where a transaction loads objects it does not know yet.

use super::hierarchy::ClientTransaction;
use crate::command::CommandContext;
use crate::data::{DataContainer, DataContainerState};
use crate::end_point::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::mapping::MappingConfiguration;
use crate::object::{ObjectId, Value};
use crate::types::TransactionId;
use reltx_storage::StorageBackend;

/// The loading collaborator of a transaction.
///
/// Root transactions load from storage; sub-transactions load from their
/// parent transaction.
pub trait ObjectSource {
    /// Loads the container of `object`; `None` if the object does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ObjectInvalid` if the object cannot be used in the loading
    /// transaction, and source errors.
    fn load_data_container(&mut self, object: &ObjectId) -> CoreResult<Option<DataContainer>>;

    /// Returns the objects related through a virtual end-point.
    ///
    /// # Errors
    ///
    /// Returns source errors.
    fn load_related_object_ids(
        &mut self,
        end_point: &RelationEndPointId,
    ) -> CoreResult<Vec<ObjectId>>;
}

/// Loads objects from a storage backend.
#[derive(Clone, Copy)]
pub struct StorageSource<'a> {
    mapping: &'a MappingConfiguration,
    storage: &'a dyn StorageBackend,
}

impl<'a> StorageSource<'a> {
    /// Creates a source reading `storage` with the classes of `mapping`.
    #[must_use]
    pub fn new(mapping: &'a MappingConfiguration, storage: &'a dyn StorageBackend) -> Self {
        Self { mapping, storage }
    }
}

impl ObjectSource for StorageSource<'_> {
    fn load_data_container(&mut self, object: &ObjectId) -> CoreResult<Option<DataContainer>> {
        let class = self.mapping.class(object.class_id())?;
        let Some(record) = self.storage.load(&object.to_record_key())? else {
            return Ok(None);
        };
        // Unmapped record properties are ignored; missing ones get defaults.
        let mut values = DataContainer::default_values(class);
        for (property, value) in values.iter_mut() {
            if let Some(stored) = record.get(property) {
                *value = Value::from_stored(stored);
            }
        }
        Ok(Some(DataContainer::existing(object.clone(), values)))
    }

    fn load_related_object_ids(
        &mut self,
        end_point: &RelationEndPointId,
    ) -> CoreResult<Vec<ObjectId>> {
        let Some(owner) = end_point.object_id() else {
            return Ok(Vec::new());
        };
        let opposite = end_point.definition().opposite();
        let Some(property) = opposite.property_name() else {
            return Ok(Vec::new());
        };
        let keys = self.storage.find_referencing(
            opposite.class_id().as_str(),
            property,
            &owner.to_record_key(),
        )?;
        Ok(keys.iter().map(ObjectId::from_record_key).collect())
    }
}

/// Loads objects through the chain of parent transactions, falling back to
/// storage at the root.
///
/// Loading into a sub-transaction loads the object into each ancestor
/// first; the sub-transaction receives a copy of the parent's current
/// state as its own unchanged state.
pub(crate) struct ParentTransactionSource<'a> {
    ancestors: &'a mut [ClientTransaction],
    root: TransactionId,
    storage: StorageSource<'a>,
}

impl<'a> ParentTransactionSource<'a> {
    pub(crate) fn new(
        ancestors: &'a mut [ClientTransaction],
        root: TransactionId,
        storage: StorageSource<'a>,
    ) -> Self {
        Self {
            ancestors,
            root,
            storage,
        }
    }

    fn with_parent<R>(
        &mut self,
        f: impl FnOnce(&mut CommandContext<'_>) -> CoreResult<R>,
    ) -> Option<CoreResult<R>> {
        let (parent, rest) = self.ancestors.split_last_mut()?;
        let mut source = ParentTransactionSource::new(rest, self.root, self.storage);
        let mut ctx = parent.context(self.root, &mut source);
        Some(f(&mut ctx))
    }
}

impl ObjectSource for ParentTransactionSource<'_> {
    fn load_data_container(&mut self, object: &ObjectId) -> CoreResult<Option<DataContainer>> {
        let loaded = self.with_parent(|parent| {
            let container = match parent.ensure_data_container(object) {
                Ok(container) => container,
                Err(CoreError::ObjectNotFound { .. }) => return Ok(None),
                Err(error) => return Err(error),
            };
            match container.state() {
                DataContainerState::Deleted | DataContainerState::Discarded => {
                    Err(CoreError::object_invalid(object))
                }
                _ => Ok(Some(DataContainer::existing(
                    object.clone(),
                    container.values().clone(),
                ))),
            }
        });
        match loaded {
            Some(result) => result,
            None => self.storage.load_data_container(object),
        }
    }

    fn load_related_object_ids(
        &mut self,
        end_point: &RelationEndPointId,
    ) -> CoreResult<Vec<ObjectId>> {
        let loaded = self.with_parent(|parent| {
            Ok(parent.end_point(end_point)?.opposite_object_ids())
        });
        match loaded {
            Some(result) => result,
            None => self.storage.load_related_object_ids(end_point),
        }
    }
}
