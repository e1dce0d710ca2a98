//! Collection end-points.

use super::id::RelationEndPointId;
use super::tracked::Tracked;
use crate::mapping::CollectionKind;
use crate::object::ObjectId;
use std::collections::BTreeSet;

/// The "one" side of a 1:n relation, holding the related objects.
///
/// Domain object collections are ordered and compared element-wise; virtual
/// collections compare as sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEndPoint {
    id: RelationEndPointId,
    kind: CollectionKind,
    data: Option<Tracked<Vec<ObjectId>>>,
}

impl CollectionEndPoint {
    /// Creates an end-point whose contents are not loaded yet.
    #[must_use]
    pub fn incomplete(id: RelationEndPointId, kind: CollectionKind) -> Self {
        Self {
            id,
            kind,
            data: None,
        }
    }

    /// Creates a complete end-point holding `items`.
    #[must_use]
    pub fn complete(id: RelationEndPointId, kind: CollectionKind, items: Vec<ObjectId>) -> Self {
        Self {
            id,
            kind,
            data: Some(Tracked::new(items)),
        }
    }

    /// Returns the end-point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        &self.id
    }

    /// Returns the collection flavour.
    #[must_use]
    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Returns `true` once the related objects are known.
    #[must_use]
    pub fn is_data_complete(&self) -> bool {
        self.data.is_some()
    }

    /// Returns the related objects; empty while incomplete.
    #[must_use]
    pub fn opposite_object_ids(&self) -> &[ObjectId] {
        match &self.data {
            Some(data) => data.current(),
            None => &[],
        }
    }

    /// Returns the originally related objects; empty while incomplete.
    #[must_use]
    pub fn original_opposite_object_ids(&self) -> &[ObjectId] {
        match &self.data {
            Some(data) => data.original(),
            None => &[],
        }
    }

    /// Returns `true` if `object` is currently part of the collection.
    #[must_use]
    pub fn contains(&self, object: &ObjectId) -> bool {
        self.opposite_object_ids().contains(object)
    }

    /// Returns the position of `object` in the collection.
    #[must_use]
    pub fn index_of(&self, object: &ObjectId) -> Option<usize> {
        self.opposite_object_ids().iter().position(|o| o == object)
    }

    /// Returns `true` if the contents differ from the original.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        let Some(data) = &self.data else {
            return false;
        };
        match self.kind {
            CollectionKind::DomainObjectCollection => data.has_changed(),
            CollectionKind::VirtualCollection => {
                let current: BTreeSet<&ObjectId> = data.current().iter().collect();
                let original: BTreeSet<&ObjectId> = data.original().iter().collect();
                current != original
            }
        }
    }

    /// Returns `true` if the end-point was touched since the last commit.
    #[must_use]
    pub fn has_been_touched(&self) -> bool {
        self.data.as_ref().is_some_and(Tracked::has_been_touched)
    }

    pub(crate) fn touch(&mut self) {
        if let Some(data) = &mut self.data {
            data.touch();
        }
    }

    pub(crate) fn mark_data_complete(&mut self, original: Vec<ObjectId>, current: Vec<ObjectId>) {
        self.data = Some(Tracked::with_original(original, current));
    }

    pub(crate) fn mark_data_incomplete(&mut self) {
        self.data = None;
    }

    /// Mutable access to the items; `None` while incomplete.
    pub(crate) fn items_mut(&mut self) -> Option<&mut Vec<ObjectId>> {
        self.data.as_mut().map(Tracked::current_mut)
    }

    pub(crate) fn commit(&mut self) {
        if let Some(data) = &mut self.data {
            data.commit();
        }
    }

    pub(crate) fn rollback(&mut self) {
        if let Some(data) = &mut self.data {
            data.rollback();
        }
    }

    pub(crate) fn set_data_from(&mut self, source: &CollectionEndPoint) {
        let Some(source) = &source.data else {
            return;
        };
        match &mut self.data {
            Some(data) => data.set_data_from(source),
            None => {
                let mut data = Tracked::new(source.original().clone());
                data.set_data_from(source);
                self.data = Some(data);
            }
        }
    }
}
