//! Foreign-key holding object end-points.

use super::id::RelationEndPointId;
use super::tracked::Tracked;
use crate::data::DataContainer;
use crate::object::ObjectId;

/// The side of a relation that stores the foreign key.
///
/// A real end-point exists exactly while its object's data container is
/// registered and is therefore always complete. Its value mirrors the
/// container's foreign-key property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealObjectEndPoint {
    id: RelationEndPointId,
    opposite: Tracked<Option<ObjectId>>,
}

impl RealObjectEndPoint {
    /// Creates a real end-point pointing at `opposite`.
    #[must_use]
    pub fn new(id: RelationEndPointId, opposite: Option<ObjectId>) -> Self {
        Self {
            id,
            opposite: Tracked::new(opposite),
        }
    }

    /// Creates the end-point from the foreign key held by `container`.
    #[must_use]
    pub fn from_container(id: RelationEndPointId, container: &DataContainer) -> Self {
        let property = id.definition().property_name().unwrap_or_default();
        let original = container.original_foreign_key(property);
        let current = container.foreign_key(property);
        Self {
            id,
            opposite: Tracked::with_original(original, current),
        }
    }

    /// Returns the end-point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        &self.id
    }

    /// Returns the currently referenced object.
    #[must_use]
    pub fn opposite_object_id(&self) -> Option<&ObjectId> {
        self.opposite.current().as_ref()
    }

    /// Returns the originally referenced object.
    #[must_use]
    pub fn original_opposite_object_id(&self) -> Option<&ObjectId> {
        self.opposite.original().as_ref()
    }

    /// Returns `true` if the referenced object differs from the original.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.opposite.has_changed()
    }

    /// Returns `true` if the end-point was touched since the last commit.
    #[must_use]
    pub fn has_been_touched(&self) -> bool {
        self.opposite.has_been_touched()
    }

    pub(crate) fn touch(&mut self) {
        self.opposite.touch();
    }

    pub(crate) fn set_opposite_object_id(&mut self, opposite: Option<ObjectId>) {
        *self.opposite.current_mut() = opposite;
    }

    pub(crate) fn commit(&mut self) {
        self.opposite.commit();
    }

    pub(crate) fn rollback(&mut self) {
        self.opposite.rollback();
    }

    pub(crate) fn set_data_from(&mut self, source: &RealObjectEndPoint) {
        self.opposite.set_data_from(&source.opposite);
    }
}
