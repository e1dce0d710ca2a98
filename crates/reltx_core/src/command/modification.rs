//! Leaf commands that modify a single relation end-point.

use super::context::CommandContext;
use crate::end_point::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::events::TransactionEventSink;
use crate::object::ObjectId;

/// What a [`ModificationCommand`] does to its end-point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModificationKind {
    /// Sets the related object of a single-object end-point.
    Set,
    /// Sets a single-object end-point to the object it already holds.
    SetSame,
    /// Removes an item from a collection.
    Remove,
    /// Inserts an item into a collection.
    Insert {
        /// Target position.
        index: usize,
    },
    /// Replaces the item at a position.
    Replace {
        /// Position of the replaced item.
        index: usize,
    },
    /// Replaces an item with itself.
    ReplaceSame,
    /// Replaces the whole contents of a collection.
    SetCollection {
        /// The new contents, in order.
        items: Vec<ObjectId>,
        /// Items leaving the collection.
        removed: Vec<ObjectId>,
        /// Items joining the collection.
        added: Vec<ObjectId>,
    },
    /// Marks the end-point touched without changing it.
    Touch,
}

impl ModificationKind {
    /// Same-value kinds touch the end-point but raise no notifications.
    #[must_use]
    pub fn is_same_value(&self) -> bool {
        matches!(self, Self::SetSame | Self::ReplaceSame | Self::Touch)
    }
}

/// A leaf command: one modification of one end-point.
///
/// Its lifecycle is `begin` (changing notifications, may be vetoed),
/// `perform` (the in-memory mutation), `end` (changed notifications).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModificationCommand {
    kind: ModificationKind,
    modified_end_point: RelationEndPointId,
    old_related_object: Option<ObjectId>,
    new_related_object: Option<ObjectId>,
}

impl ModificationCommand {
    pub(crate) fn new(
        kind: ModificationKind,
        modified_end_point: RelationEndPointId,
        old_related_object: Option<ObjectId>,
        new_related_object: Option<ObjectId>,
    ) -> Self {
        Self {
            kind,
            modified_end_point,
            old_related_object,
            new_related_object,
        }
    }

    /// Returns the kind of modification.
    #[must_use]
    pub fn kind(&self) -> &ModificationKind {
        &self.kind
    }

    /// Returns the modified end-point.
    #[must_use]
    pub fn modified_end_point(&self) -> &RelationEndPointId {
        &self.modified_end_point
    }

    /// Returns the object the end-point is detached from.
    #[must_use]
    pub fn old_related_object(&self) -> Option<&ObjectId> {
        self.old_related_object.as_ref()
    }

    /// Returns the object the end-point is attached to.
    #[must_use]
    pub fn new_related_object(&self) -> Option<&ObjectId> {
        self.new_related_object.as_ref()
    }

    pub(crate) fn begin(&self, sink: &dyn TransactionEventSink) -> CoreResult<()> {
        let Some(object) = self.modified_end_point.object_id() else {
            return Ok(());
        };
        let definition = self.modified_end_point.definition();
        match &self.kind {
            ModificationKind::SetCollection { removed, added, .. } => {
                for item in removed {
                    sink.relation_changing(object, definition, Some(item), None)?;
                }
                for item in added {
                    sink.relation_changing(object, definition, None, Some(item))?;
                }
                Ok(())
            }
            kind if kind.is_same_value() => Ok(()),
            _ => sink.relation_changing(
                object,
                definition,
                self.old_related_object.as_ref(),
                self.new_related_object.as_ref(),
            ),
        }
    }

    pub(crate) fn perform(&self, ctx: &mut CommandContext<'_>) -> CoreResult<()> {
        let id = &self.modified_end_point;
        let end_point = ctx.data.end_points.get_mut(id).ok_or_else(|| {
            CoreError::invalid_operation(format!("Relation end-point '{id}' is not registered."))
        })?;

        match &self.kind {
            ModificationKind::Set => {
                end_point.set_opposite_object_id(self.new_related_object.clone())?;
            }
            ModificationKind::SetSame | ModificationKind::ReplaceSame | ModificationKind::Touch => {}
            ModificationKind::Remove => {
                let items = end_point.items_mut()?;
                if let Some(removed) = &self.old_related_object {
                    items.retain(|item| item != removed);
                }
            }
            ModificationKind::Insert { index } => {
                let items = end_point.items_mut()?;
                if let Some(inserted) = &self.new_related_object {
                    let index = (*index).min(items.len());
                    items.insert(index, inserted.clone());
                }
            }
            ModificationKind::Replace { index } => {
                let items = end_point.items_mut()?;
                let slot = items.get_mut(*index).ok_or_else(|| {
                    CoreError::invalid_argument(
                        "index",
                        format!("Index {index} is out of range for '{id}'."),
                    )
                })?;
                if let Some(replacement) = &self.new_related_object {
                    *slot = replacement.clone();
                }
            }
            ModificationKind::SetCollection { items, .. } => {
                *end_point.items_mut()? = items.clone();
            }
        }
        end_point.touch();

        // The real end-point's value lives in its container's foreign key.
        if !id.is_virtual() && self.kind == ModificationKind::Set {
            if let (Some(owner), Some(property)) = (id.object_id(), id.definition().property_name())
            {
                if let Some(container) = ctx.data.containers.get_mut(owner) {
                    container.set_foreign_key(property, self.new_related_object.clone());
                }
            }
        }
        Ok(())
    }

    pub(crate) fn end(&self, sink: &dyn TransactionEventSink) {
        let Some(object) = self.modified_end_point.object_id() else {
            return;
        };
        let definition = self.modified_end_point.definition();
        match &self.kind {
            ModificationKind::SetCollection { removed, added, .. } => {
                for item in added {
                    sink.relation_changed(object, definition, None, Some(item));
                }
                for item in removed {
                    sink.relation_changed(object, definition, Some(item), None);
                }
            }
            kind if kind.is_same_value() => {}
            _ => sink.relation_changed(
                object,
                definition,
                self.old_related_object.as_ref(),
                self.new_related_object.as_ref(),
            ),
        }
    }
}
