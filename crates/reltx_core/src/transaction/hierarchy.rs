//! A root transaction and its chain of sub-transactions.

use super::data_manager::{DataManager, ObjectState};
use super::init_context::ObjectReferenceInitializationContext;
use super::source::{ObjectSource, ParentTransactionSource, StorageSource};
use crate::command::CommandContext;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::events::{ClientTransactionListener, EventDispatcher, ObjectEventHandler};
use crate::mapping::MappingConfiguration;
use crate::object::ObjectId;
use crate::types::{HierarchyId, TransactionId};
use reltx_storage::StorageBackend;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_HIERARCHY_ID: AtomicU64 = AtomicU64::new(1);

fn next_transaction_id() -> TransactionId {
    TransactionId::new(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::SeqCst))
}

/// One level of a hierarchy.
#[derive(Debug)]
pub(crate) struct ClientTransaction {
    pub(crate) id: TransactionId,
    pub(crate) data: DataManager,
    pub(crate) events: EventDispatcher,
}

impl ClientTransaction {
    fn new(id: TransactionId, data: DataManager, events: EventDispatcher) -> Self {
        Self { id, data, events }
    }

    pub(crate) fn context<'a>(
        &'a mut self,
        root: TransactionId,
        source: &'a mut dyn ObjectSource,
    ) -> CommandContext<'a> {
        CommandContext::new(self.id, root, &mut self.data, source, &self.events)
    }
}

/// A root transaction with its sub-transactions.
///
/// Only the innermost transaction is active. Its ancestors are read-only
/// while it lives: operations addressed to them are redirected to it, and
/// committing, rolling back or creating sub-transactions on them fails.
///
/// # Example
///
/// ```ignore
/// let mut hierarchy = TransactionHierarchy::new(mapping, storage, Config::default());
/// let root = hierarchy.root();
/// hierarchy.execute(root, |ctx| ctx.set_related_object(&order, "OrderTicket", Some(&ticket)))?;
/// hierarchy.commit(root)?;
/// ```
pub struct TransactionHierarchy {
    id: HierarchyId,
    mapping: Arc<MappingConfiguration>,
    storage: Arc<dyn StorageBackend>,
    config: Config,
    pub(crate) levels: Vec<ClientTransaction>,
    discarded: BTreeSet<TransactionId>,
}

impl TransactionHierarchy {
    /// Creates a hierarchy with a fresh root transaction.
    #[must_use]
    pub fn new(
        mapping: Arc<MappingConfiguration>,
        storage: Arc<dyn StorageBackend>,
        config: Config,
    ) -> Self {
        let id = HierarchyId::new(NEXT_HIERARCHY_ID.fetch_add(1, Ordering::SeqCst));
        let root = next_transaction_id();
        let data = DataManager::new(Arc::clone(&mapping), &config);
        info!(hierarchy = %id, root = %root, "transaction hierarchy created");
        Self {
            id,
            mapping,
            storage,
            config,
            levels: vec![ClientTransaction::new(root, data, EventDispatcher::new(root))],
            discarded: BTreeSet::new(),
        }
    }

    /// Returns the hierarchy ID.
    #[must_use]
    pub fn id(&self) -> HierarchyId {
        self.id
    }

    /// Returns the mapping.
    #[must_use]
    pub fn mapping(&self) -> &Arc<MappingConfiguration> {
        &self.mapping
    }

    /// Returns the storage backend.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the root transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionDiscarded` once the root has been discarded.
    pub fn root(&self) -> CoreResult<TransactionId> {
        self.levels
            .first()
            .map(|level| level.id)
            .ok_or_else(|| self.discarded_root())
    }

    /// Returns the active (innermost) transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionDiscarded` once the root has been discarded.
    pub fn active(&self) -> CoreResult<TransactionId> {
        self.levels
            .last()
            .map(|level| level.id)
            .ok_or_else(|| self.discarded_root())
    }

    fn discarded_root(&self) -> CoreError {
        let transaction = self
            .discarded
            .first()
            .copied()
            .unwrap_or(TransactionId::new(0));
        CoreError::TransactionDiscarded { transaction }
    }

    /// Returns the live transactions, root first.
    #[must_use]
    pub fn transactions(&self) -> Vec<TransactionId> {
        self.levels.iter().map(|level| level.id).collect()
    }

    /// Returns the parent of a sub-transaction; `None` for the root.
    ///
    /// # Errors
    ///
    /// Returns `TransactionDiscarded` or `InvalidArgument` for unknown IDs.
    pub fn parent(&self, tx: TransactionId) -> CoreResult<Option<TransactionId>> {
        let index = self.index_of(tx)?;
        Ok(index
            .checked_sub(1)
            .and_then(|parent| self.levels.get(parent))
            .map(|level| level.id))
    }

    /// Returns `true` if `tx` is the innermost transaction.
    #[must_use]
    pub fn is_active(&self, tx: TransactionId) -> bool {
        self.levels.last().is_some_and(|level| level.id == tx)
    }

    /// Returns `true` if `tx` has been discarded.
    #[must_use]
    pub fn is_discarded(&self, tx: TransactionId) -> bool {
        self.discarded.contains(&tx)
    }

    pub(crate) fn index_of(&self, tx: TransactionId) -> CoreResult<usize> {
        if self.discarded.contains(&tx) {
            return Err(CoreError::TransactionDiscarded { transaction: tx });
        }
        self.levels
            .iter()
            .position(|level| level.id == tx)
            .ok_or_else(|| {
                CoreError::invalid_argument(
                    "transaction",
                    format!("Transaction '{tx}' is not part of hierarchy '{}'.", self.id),
                )
            })
    }

    /// Resolves `tx` and requires it to be the innermost transaction.
    pub(crate) fn index_of_active(&self, tx: TransactionId, action: &str) -> CoreResult<usize> {
        let index = self.index_of(tx)?;
        if index + 1 != self.levels.len() {
            let active = self.levels.last().map_or(tx, |level| level.id);
            return Err(CoreError::invalid_operation(format!(
                "Transaction '{tx}' cannot {action} while sub-transaction '{active}' is active."
            )));
        }
        Ok(index)
    }

    /// Returns the data of a transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionDiscarded` or `InvalidArgument` for unknown IDs.
    pub fn data(&self, tx: TransactionId) -> CoreResult<&DataManager> {
        let index = self.index_of(tx)?;
        self.levels
            .get(index)
            .map(|level| &level.data)
            .ok_or_else(|| CoreError::invalid_operation("transaction level vanished"))
    }

    /// Returns the state of an object in a transaction, without loading.
    ///
    /// # Errors
    ///
    /// Returns `TransactionDiscarded` or `InvalidArgument` for unknown IDs.
    pub fn object_state(&self, tx: TransactionId, object: &ObjectId) -> CoreResult<ObjectState> {
        Ok(self.data(tx)?.object_state(object))
    }

    /// Runs `f` against `tx`.
    ///
    /// If `tx` is an ancestor of the active transaction, `f` runs against the
    /// active transaction instead, so objects are always read and written
    /// through the innermost level.
    ///
    /// # Errors
    ///
    /// Returns `TransactionDiscarded` or `InvalidArgument` for unknown IDs and
    /// whatever `f` returns.
    pub fn execute<R>(
        &mut self,
        tx: TransactionId,
        f: impl FnOnce(&mut CommandContext<'_>) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let redirected = self.index_of(tx)? + 1 != self.levels.len();
        let root = self.root()?;
        let Some((leaf, ancestors)) = self.levels.split_last_mut() else {
            return Err(CoreError::TransactionDiscarded { transaction: tx });
        };
        if redirected {
            debug!(transaction = %tx, active = %leaf.id, "redirecting to active transaction");
        }
        let storage = StorageSource::new(&self.mapping, self.storage.as_ref());
        let mut source = ParentTransactionSource::new(ancestors, root, storage);
        let mut ctx = leaf.context(root, &mut source);
        f(&mut ctx)
    }

    /// Creates a sub-transaction of the active transaction `tx`.
    ///
    /// The sub-transaction inherits the extensions of `tx`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `tx` already has a sub-transaction.
    pub fn create_sub_transaction(&mut self, tx: TransactionId) -> CoreResult<TransactionId> {
        let index = self.index_of_active(tx, "create a sub-transaction")?;
        let sub = next_transaction_id();
        let parent = &self.levels[index];
        parent.events.sub_transaction_created(sub);
        let events = parent.events.for_sub_transaction(sub);
        let data = DataManager::new(Arc::clone(&self.mapping), &self.config);
        self.levels.push(ClientTransaction::new(sub, data, events));
        info!(parent = %tx, sub_transaction = %sub, "sub-transaction created");
        Ok(sub)
    }

    /// Discards `tx` and all its sub-transactions.
    ///
    /// Ancestors are not affected; the parent of `tx` becomes active again.
    /// Discarding the root ends the hierarchy.
    ///
    /// # Errors
    ///
    /// Returns `TransactionDiscarded` or `InvalidArgument` for unknown IDs.
    pub fn discard(&mut self, tx: TransactionId) -> CoreResult<()> {
        let index = self.index_of(tx)?;
        while self.levels.len() > index {
            let Some(mut level) = self.levels.pop() else {
                break;
            };
            level.data.end_points.reset(&level.events);
            level.events.transaction_discarded();
            self.discarded.insert(level.id);
            info!(transaction = %level.id, "transaction discarded");
        }
        Ok(())
    }

    /// Adds an extension to every live transaction; sub-transactions
    /// created later inherit it.
    pub fn add_extension(&mut self, listener: Arc<dyn ClientTransactionListener>) {
        for level in &mut self.levels {
            level.events.add_extension(Arc::clone(&listener));
        }
    }

    /// Adds a listener to one transaction only.
    ///
    /// # Errors
    ///
    /// Returns `TransactionDiscarded` or `InvalidArgument` for unknown IDs.
    pub fn add_transaction_handler(
        &mut self,
        tx: TransactionId,
        listener: Arc<dyn ClientTransactionListener>,
    ) -> CoreResult<()> {
        let index = self.index_of(tx)?;
        self.levels[index].events.add_transaction_handler(listener);
        Ok(())
    }

    /// Adds a handler for the events of one object in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionDiscarded` or `InvalidArgument` for unknown IDs.
    pub fn add_object_handler(
        &mut self,
        tx: TransactionId,
        object: ObjectId,
        handler: Arc<dyn ObjectEventHandler>,
    ) -> CoreResult<()> {
        let index = self.index_of(tx)?;
        self.levels[index].events.add_object_handler(object, handler);
        Ok(())
    }

    /// Creates the context used to initialize a reference to `object`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `root_transaction` is not the root of
    /// this hierarchy.
    pub fn create_initialization_context(
        &self,
        object: ObjectId,
        root_transaction: TransactionId,
    ) -> CoreResult<ObjectReferenceInitializationContext> {
        if self.index_of(root_transaction)? != 0 {
            return Err(CoreError::invalid_argument(
                "root_transaction",
                "The root_transaction parameter must be passed a root transaction.",
            ));
        }
        Ok(ObjectReferenceInitializationContext::new(
            object,
            root_transaction,
        ))
    }
}

impl fmt::Debug for TransactionHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHierarchy")
            .field("id", &self.id)
            .field("transactions", &self.transactions())
            .field("discarded", &self.discarded)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingBuilder;
    use reltx_storage::InMemoryBackend;

    fn hierarchy() -> TransactionHierarchy {
        let mapping = MappingBuilder::new().class("Order").build().unwrap();
        TransactionHierarchy::new(
            Arc::new(mapping),
            Arc::new(InMemoryBackend::new()),
            Config::default(),
        )
    }

    #[test]
    fn sub_transactions_stack_and_discard() {
        let mut h = hierarchy();
        let root = h.root().unwrap();
        let sub = h.create_sub_transaction(root).unwrap();

        assert!(h.is_active(sub));
        assert!(!h.is_active(root));
        assert_eq!(h.parent(sub).unwrap(), Some(root));
        assert!(matches!(
            h.create_sub_transaction(root),
            Err(CoreError::InvalidOperation { .. })
        ));

        h.discard(sub).unwrap();
        assert!(h.is_active(root));
        assert!(h.is_discarded(sub));
        assert!(matches!(
            h.execute(sub, |_| Ok(())),
            Err(CoreError::TransactionDiscarded { .. })
        ));
    }

    #[test]
    fn execute_redirects_to_active_transaction() {
        let mut h = hierarchy();
        let root = h.root().unwrap();
        let sub = h.create_sub_transaction(root).unwrap();
        let seen = h.execute(root, |ctx| Ok(ctx.transaction())).unwrap();
        assert_eq!(seen, sub);
        let root_seen = h.execute(root, |ctx| Ok(ctx.root_transaction())).unwrap();
        assert_eq!(root_seen, root);
    }

    #[test]
    fn discarding_root_ends_hierarchy() {
        let mut h = hierarchy();
        let root = h.root().unwrap();
        h.create_sub_transaction(root).unwrap();
        h.discard(root).unwrap();
        assert!(h.transactions().is_empty());
        assert!(matches!(
            h.root(),
            Err(CoreError::TransactionDiscarded { .. })
        ));
    }

    #[test]
    fn initialization_context_requires_root() {
        let mut h = hierarchy();
        let root = h.root().unwrap();
        let sub = h.create_sub_transaction(root).unwrap();
        let object = ObjectId::generate("Order");

        let context = h.create_initialization_context(object.clone(), root).unwrap();
        assert_eq!(context.root_transaction(), root);

        let error = h.create_initialization_context(object, sub).unwrap_err();
        assert_eq!(
            error,
            CoreError::invalid_argument(
                "root_transaction",
                "The root_transaction parameter must be passed a root transaction."
            )
        );
    }
}
