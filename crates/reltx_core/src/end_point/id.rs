//! Relation end-point identity.

use crate::error::CoreResult;
use crate::mapping::{EndPointDefinition, MappingConfiguration};
use crate::object::ObjectId;
use std::fmt;

/// Identity of one side of a relation: owning object plus end-point definition.
///
/// The object is `None` for null end-points, i.e. the "other side" of a
/// relation that currently points nowhere.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationEndPointId {
    object_id: Option<ObjectId>,
    definition: EndPointDefinition,
}

impl RelationEndPointId {
    /// Creates an end-point ID.
    #[must_use]
    pub fn new(object_id: Option<ObjectId>, definition: EndPointDefinition) -> Self {
        Self {
            object_id,
            definition,
        }
    }

    /// Creates the end-point ID of `object.property`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownClass` or `UnknownProperty`.
    pub fn for_property(
        mapping: &MappingConfiguration,
        object_id: &ObjectId,
        property: &str,
    ) -> CoreResult<Self> {
        let definition = mapping.end_point_definition(object_id.class_id(), property)?;
        Ok(Self::new(Some(object_id.clone()), definition))
    }

    /// Returns the owning object; `None` for null end-points.
    #[must_use]
    pub fn object_id(&self) -> Option<&ObjectId> {
        self.object_id.as_ref()
    }

    /// Returns the end-point definition.
    #[must_use]
    pub fn definition(&self) -> &EndPointDefinition {
        &self.definition
    }

    /// Whether this end-point is computed from its opposite.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.definition.is_virtual()
    }

    /// Whether this is the anonymous side of a unidirectional relation.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.definition.is_anonymous()
    }

    /// Whether this ID denotes no end-point at all.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.object_id.is_none()
    }

    /// Returns the ID of the opposite end-point owned by `opposite_object`.
    #[must_use]
    pub fn opposite(&self, opposite_object: Option<ObjectId>) -> Self {
        Self::new(opposite_object, self.definition.opposite())
    }
}

impl fmt::Debug for RelationEndPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationEndPointId({self})")
    }
}

impl fmt::Display for RelationEndPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.object_id {
            Some(object) => write!(f, "{object}/{}", self.definition.full_name()),
            None => write!(f, "null/{}", self.definition.full_name()),
        }
    }
}
