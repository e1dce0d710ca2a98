//! Commit and rollback.

use super::hierarchy::{ClientTransaction, TransactionHierarchy};
use crate::error::{CoreError, CoreResult};
use crate::events::CommitContext;
use crate::object::ObjectId;
use crate::types::TransactionId;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Commit,
    Rollback,
}

/// Raises committing or rolling-back notifications until no handler adds
/// another object.
///
/// Each pass notifies only objects that no earlier pass has seen, so a
/// handler re-marking an already notified object does not cause another
/// pass. Returns every notified object in notification order.
fn notify_until_settled(
    level: &mut ClientTransaction,
    phase: Phase,
    max_passes: usize,
) -> CoreResult<Vec<ObjectId>> {
    let mut notified: Vec<ObjectId> = Vec::new();
    let mut passes = 0;
    loop {
        let pending: Vec<ObjectId> = level
            .data
            .changed_object_ids()
            .into_iter()
            .filter(|object| !notified.contains(object))
            .collect();
        if pending.is_empty() {
            return Ok(notified);
        }
        if passes == max_passes {
            return Err(CoreError::ReiterationLimitExceeded { passes });
        }
        passes += 1;
        debug!(
            transaction = %level.id,
            pass = passes,
            objects = pending.len(),
            ?phase,
            "notification pass"
        );

        let mut context = CommitContext::new(&mut level.data);
        match phase {
            Phase::Commit => level.events.transaction_committing(&pending, &mut context)?,
            Phase::Rollback => level
                .events
                .transaction_rolling_back(&pending, &mut context)?,
        }
        notified.extend(pending);
    }
}

impl TransactionHierarchy {
    /// Loads objects that take part in a commit or rollback only through a
    /// changed virtual end-point, so handlers can work with them.
    fn load_changed_owners(&mut self, tx: TransactionId) -> CoreResult<()> {
        let owners = self.data(tx)?.unloaded_changed_owners();
        if owners.is_empty() {
            return Ok(());
        }
        debug!(transaction = %tx, objects = owners.len(), "loading owners of changed end-points");
        self.execute(tx, |ctx| {
            owners
                .iter()
                .try_for_each(|object| ctx.ensure_data_available(object))
        })
    }

    /// Commits the active transaction `tx`.
    ///
    /// A root commit writes new, changed and deleted objects to storage in
    /// one batch. A sub-transaction commit pushes its changes into its
    /// parent instead. Either way the committed objects become unchanged in
    /// `tx`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `tx` has a sub-transaction,
    /// `ReiterationLimitExceeded` if handlers keep adding objects,
    /// `ConsistencyViolation` if verification is configured and fails,
    /// handler vetoes, and storage errors.
    pub fn commit(&mut self, tx: TransactionId) -> CoreResult<()> {
        let index = self.index_of_active(tx, "be committed")?;
        self.load_changed_owners(tx)?;
        let max_passes = self.config().max_reiteration_passes;
        let verify = self.config().verify_consistency_on_commit;
        let storage = std::sync::Arc::clone(self.storage());

        let (parents, rest) = self.levels.split_at_mut(index);
        let level = rest
            .first_mut()
            .ok_or_else(|| CoreError::invalid_operation("transaction level vanished"))?;

        let objects = notify_until_settled(level, Phase::Commit, max_passes)?;
        if verify {
            level.data.end_points.check_bidirectional_consistency()?;
        }

        match parents.last_mut() {
            None => {
                let changes = level.data.persistence_changes();
                storage.apply(&changes)?;
                debug!(transaction = %tx, records = changes.len(), "changes written to storage");
            }
            Some(parent) => {
                parent.data.take_over_from(&level.data, &parent.events)?;
                debug!(transaction = %tx, parent = %parent.id, "changes pushed to parent");
            }
        }

        level.data.commit_all(&level.events)?;
        level.events.transaction_committed(&objects);
        info!(transaction = %tx, objects = objects.len(), "transaction committed");
        Ok(())
    }

    /// Rolls back the active transaction `tx`.
    ///
    /// Rolling-back notifications are raised before any data is reverted,
    /// rolled-back notifications afterwards. New objects are discarded and
    /// are not part of the rolled-back notification.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `tx` has a sub-transaction,
    /// `ReiterationLimitExceeded` if handlers keep adding objects, and
    /// handler vetoes.
    pub fn rollback(&mut self, tx: TransactionId) -> CoreResult<()> {
        let index = self.index_of_active(tx, "be rolled back")?;
        self.load_changed_owners(tx)?;
        let max_passes = self.config().max_reiteration_passes;
        let level = self
            .levels
            .get_mut(index)
            .ok_or_else(|| CoreError::invalid_operation("transaction level vanished"))?;

        let objects = notify_until_settled(level, Phase::Rollback, max_passes)?;
        let discarded = level.data.rollback_all(&level.events)?;
        let reverted: Vec<ObjectId> = objects
            .into_iter()
            .filter(|object| !discarded.contains(object))
            .collect();
        level.events.transaction_rolled_back(&reverted);
        info!(transaction = %tx, objects = reverted.len(), "transaction rolled back");
        Ok(())
    }
}
