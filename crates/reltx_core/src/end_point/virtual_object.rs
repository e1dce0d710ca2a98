//! Virtual single-object end-points.

use super::id::RelationEndPointId;
use super::tracked::Tracked;
use crate::object::ObjectId;

/// The computed side of a 1:1 relation.
///
/// Its contents are only known once loaded; until then the end-point is
/// registered but incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualObjectEndPoint {
    id: RelationEndPointId,
    data: Option<Tracked<Option<ObjectId>>>,
}

impl VirtualObjectEndPoint {
    /// Creates an end-point whose contents are not loaded yet.
    #[must_use]
    pub fn incomplete(id: RelationEndPointId) -> Self {
        Self { id, data: None }
    }

    /// Creates a complete end-point pointing at `opposite`.
    #[must_use]
    pub fn complete(id: RelationEndPointId, opposite: Option<ObjectId>) -> Self {
        Self {
            id,
            data: Some(Tracked::new(opposite)),
        }
    }

    /// Returns the end-point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        &self.id
    }

    /// Returns `true` once the related object is known.
    #[must_use]
    pub fn is_data_complete(&self) -> bool {
        self.data.is_some()
    }

    /// Returns the related object; `None` if there is none or the end-point
    /// is incomplete.
    #[must_use]
    pub fn opposite_object_id(&self) -> Option<&ObjectId> {
        self.data.as_ref().and_then(|data| data.current().as_ref())
    }

    /// Returns the originally related object.
    #[must_use]
    pub fn original_opposite_object_id(&self) -> Option<&ObjectId> {
        self.data.as_ref().and_then(|data| data.original().as_ref())
    }

    /// Returns `true` if the related object differs from the original.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.data.as_ref().is_some_and(Tracked::has_changed)
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

    pub(crate) fn mark_data_complete(
        &mut self,
        original: Option<ObjectId>,
        current: Option<ObjectId>,
    ) {
        self.data = Some(Tracked::with_original(original, current));
    }

    pub(crate) fn mark_data_incomplete(&mut self) {
        self.data = None;
    }

    /// Returns `false` when the value was not loaded.
    pub(crate) fn set_opposite_object_id(&mut self, opposite: Option<ObjectId>) -> bool {
        match &mut self.data {
            Some(data) => {
                *data.current_mut() = opposite;
                true
            }
            None => false,
        }
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

    pub(crate) fn set_data_from(&mut self, source: &VirtualObjectEndPoint) {
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
