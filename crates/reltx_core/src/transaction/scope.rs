//! Ambient "current transaction" scopes.
//!
//! Core operations always receive their transaction explicitly. Scopes are
//! the outermost convenience layer: entering one pushes a transaction onto
//! a thread-local stack, and [`TransactionScope::current`] reads its top.

use super::hierarchy::TransactionHierarchy;
use crate::command::CommandContext;
use crate::error::{CoreError, CoreResult};
use crate::types::{HierarchyId, TransactionId};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{trace, warn};

/// What leaving a scope does to its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScopeBehavior {
    /// Leave the transaction as it is.
    #[default]
    None,
    /// Roll the transaction back.
    Rollback,
    /// Discard the transaction.
    Discard,
}

#[derive(Debug, Clone, Copy)]
struct ScopeEntry {
    token: u64,
    hierarchy: HierarchyId,
    transaction: TransactionId,
}

static NEXT_SCOPE_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static SCOPES: RefCell<Vec<ScopeEntry>> = const { RefCell::new(Vec::new()) };
}

/// Makes a transaction current on this thread until the scope is left.
///
/// Scopes nest and must be left in reverse order of entry. A scope dropped
/// without [`leave`](TransactionScope::leave) is popped without applying
/// its behavior.
#[derive(Debug)]
#[must_use = "a scope is popped as soon as it is dropped"]
pub struct TransactionScope {
    entry: ScopeEntry,
    behavior: ScopeBehavior,
    left: bool,
}

impl TransactionScope {
    /// Enters a scope for `tx`.
    ///
    /// Entering a scope for an ancestor of the active transaction only
    /// changes the current transaction; operations keep running through
    /// the active one.
    ///
    /// # Errors
    ///
    /// Returns `TransactionDiscarded` or `InvalidArgument` for unknown IDs.
    pub fn enter(
        hierarchy: &TransactionHierarchy,
        tx: TransactionId,
        behavior: ScopeBehavior,
    ) -> CoreResult<Self> {
        hierarchy.index_of(tx)?;
        let entry = ScopeEntry {
            token: NEXT_SCOPE_TOKEN.fetch_add(1, Ordering::Relaxed),
            hierarchy: hierarchy.id(),
            transaction: tx,
        };
        SCOPES.with(|scopes| scopes.borrow_mut().push(entry));
        trace!(transaction = %tx, ?behavior, "transaction scope entered");
        Ok(Self {
            entry,
            behavior,
            left: false,
        })
    }

    /// Returns the transaction of the innermost scope on this thread.
    #[must_use]
    pub fn current() -> Option<TransactionId> {
        SCOPES.with(|scopes| scopes.borrow().last().map(|entry| entry.transaction))
    }

    /// Returns the scope's transaction.
    #[must_use]
    pub fn transaction(&self) -> TransactionId {
        self.entry.transaction
    }

    /// Returns what leaving the scope does.
    #[must_use]
    pub fn behavior(&self) -> ScopeBehavior {
        self.behavior
    }

    /// Leaves the scope and applies its behavior.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if this is not the innermost scope or
    /// belongs to another hierarchy, and the errors of the rollback or
    /// discard.
    pub fn leave(mut self, hierarchy: &mut TransactionHierarchy) -> CoreResult<()> {
        let is_top = SCOPES.with(|scopes| {
            scopes
                .borrow()
                .last()
                .is_some_and(|top| top.token == self.entry.token)
        });
        if !is_top {
            return Err(CoreError::invalid_operation(format!(
                "The scope of transaction '{}' cannot be left while an inner scope is active.",
                self.entry.transaction
            )));
        }
        if self.entry.hierarchy != hierarchy.id() {
            return Err(CoreError::invalid_operation(format!(
                "The scope of transaction '{}' belongs to hierarchy '{}'.",
                self.entry.transaction, self.entry.hierarchy
            )));
        }

        self.left = true;
        SCOPES.with(|scopes| scopes.borrow_mut().pop());
        trace!(transaction = %self.entry.transaction, "transaction scope left");

        match self.behavior {
            ScopeBehavior::None => Ok(()),
            ScopeBehavior::Rollback => hierarchy.rollback(self.entry.transaction),
            ScopeBehavior::Discard => hierarchy.discard(self.entry.transaction),
        }
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.left {
            return;
        }
        let token = self.entry.token;
        SCOPES.with(|scopes| scopes.borrow_mut().retain(|entry| entry.token != token));
        warn!(transaction = %self.entry.transaction, "transaction scope dropped without being left");
    }
}

/// Runs `f` inside a scope for `tx`, then leaves the scope.
///
/// # Errors
///
/// Returns the error of `f` or of leaving. If both fail, returns
/// `FatalExecution` carrying both.
pub fn execute_in_scope<R>(
    hierarchy: &mut TransactionHierarchy,
    tx: TransactionId,
    behavior: ScopeBehavior,
    f: impl FnOnce(&mut TransactionHierarchy) -> CoreResult<R>,
) -> CoreResult<R> {
    let scope = TransactionScope::enter(hierarchy, tx, behavior)?;
    let result = f(hierarchy);
    let left = scope.leave(hierarchy);
    match (result, left) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(error), Ok(())) | (Ok(_), Err(error)) => Err(error),
        (Err(error), Err(cleanup_error)) => Err(CoreError::fatal(error, cleanup_error)),
    }
}

/// Runs `f` against the current transaction of this thread.
///
/// # Errors
///
/// Returns `InvalidOperation` if no scope is active, and whatever `f`
/// returns.
pub fn execute_in_current_scope<R>(
    hierarchy: &mut TransactionHierarchy,
    f: impl FnOnce(&mut CommandContext<'_>) -> CoreResult<R>,
) -> CoreResult<R> {
    let tx = TransactionScope::current()
        .ok_or_else(|| CoreError::invalid_operation("No transaction scope is active."))?;
    hierarchy.execute(tx, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mapping::MappingBuilder;
    use reltx_storage::InMemoryBackend;
    use std::sync::Arc;

    fn hierarchy() -> TransactionHierarchy {
        let mapping = MappingBuilder::new().class("Order").build().unwrap();
        TransactionHierarchy::new(
            Arc::new(mapping),
            Arc::new(InMemoryBackend::new()),
            Config::default(),
        )
    }

    #[test]
    fn scopes_nest() {
        let mut h = hierarchy();
        let root = h.root().unwrap();
        let sub = h.create_sub_transaction(root).unwrap();

        let outer = TransactionScope::enter(&h, sub, ScopeBehavior::None).unwrap();
        let inner = TransactionScope::enter(&h, root, ScopeBehavior::None).unwrap();
        assert_eq!(TransactionScope::current(), Some(root));
        // The ancestor is current, the sub-transaction stays active.
        assert!(h.is_active(sub));

        assert!(matches!(
            outer.leave(&mut h),
            Err(CoreError::InvalidOperation { .. })
        ));
        inner.leave(&mut h).unwrap();
        assert_eq!(TransactionScope::current(), None);
    }

    #[test]
    fn discard_behavior_discards_on_leave() {
        let mut h = hierarchy();
        let root = h.root().unwrap();
        let sub = h.create_sub_transaction(root).unwrap();

        execute_in_scope(&mut h, sub, ScopeBehavior::Discard, |_| Ok(())).unwrap();
        assert!(h.is_discarded(sub));
        assert!(h.is_active(root));
    }

    #[test]
    fn failing_body_and_leave_is_fatal() {
        let mut h = hierarchy();
        let root = h.root().unwrap();
        let sub = h.create_sub_transaction(root).unwrap();

        // Rolling back the root fails while the sub-transaction is active.
        let error = execute_in_scope(&mut h, root, ScopeBehavior::Rollback, |_| {
            Err::<(), _>(CoreError::invalid_operation("body failed"))
        })
        .unwrap_err();

        match error {
            CoreError::FatalExecution {
                error,
                cleanup_error,
            } => {
                assert_eq!(*error, CoreError::invalid_operation("body failed"));
                assert!(cleanup_error.to_string().contains(&sub.to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(TransactionScope::current(), None);
    }

    #[test]
    fn current_scope_is_required() {
        let mut h = hierarchy();
        assert!(matches!(
            execute_in_current_scope(&mut h, |_| Ok(())),
            Err(CoreError::InvalidOperation { .. })
        ));
    }
}
