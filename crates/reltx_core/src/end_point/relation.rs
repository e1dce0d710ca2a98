//! The relation end-point variants.

use super::collection::CollectionEndPoint;
use super::id::RelationEndPointId;
use super::real::RealObjectEndPoint;
use super::virtual_object::VirtualObjectEndPoint;
use crate::error::{CoreError, CoreResult};
use crate::mapping::{Cardinality, CollectionKind, EndPointDefinition};
use crate::object::ObjectId;

/// One side of a relation as seen by one transaction.
///
/// The null variants stand in for "the other side" of a relation that
/// points nowhere, and for anonymous end-points. They are never registered
/// and cannot be modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationEndPoint {
    /// Foreign-key holding side.
    RealObject(RealObjectEndPoint),
    /// Null stand-in for a real end-point.
    NullRealObject(RelationEndPointId),
    /// Computed side of a 1:1 relation.
    VirtualObject(VirtualObjectEndPoint),
    /// Null stand-in for a virtual object end-point.
    NullVirtualObject(RelationEndPointId),
    /// Ordered, modifiable collection side.
    DomainObjectCollection(CollectionEndPoint),
    /// Null stand-in for a domain object collection.
    NullDomainObjectCollection(RelationEndPointId),
    /// Read-only collection side, changed only through its real end-points.
    VirtualCollection(CollectionEndPoint),
    /// Null stand-in for a virtual collection.
    NullVirtualCollection(RelationEndPointId),
}

impl RelationEndPoint {
    /// Returns the null end-point matching `id`'s definition.
    #[must_use]
    pub fn null(id: RelationEndPointId) -> Self {
        let definition = id.definition();
        if !definition.is_virtual() {
            Self::NullRealObject(id)
        } else {
            match (definition.cardinality(), definition.collection_kind()) {
                (Cardinality::Many, Some(CollectionKind::VirtualCollection)) => {
                    Self::NullVirtualCollection(id)
                }
                (Cardinality::Many, _) => Self::NullDomainObjectCollection(id),
                (Cardinality::One, _) => Self::NullVirtualObject(id),
            }
        }
    }

    /// Creates a virtual end-point whose contents are not loaded yet.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for real end-point IDs.
    pub(crate) fn incomplete_virtual(id: RelationEndPointId) -> CoreResult<Self> {
        Self::virtual_end_point(id, None)
    }

    /// Creates a complete, empty virtual end-point.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for real end-point IDs.
    pub(crate) fn empty_virtual(id: RelationEndPointId) -> CoreResult<Self> {
        Self::virtual_end_point(id, Some(Vec::new()))
    }

    fn virtual_end_point(id: RelationEndPointId, items: Option<Vec<ObjectId>>) -> CoreResult<Self> {
        if !id.is_virtual() || id.is_null() {
            return Err(CoreError::invalid_argument(
                "end_point_id",
                format!("The given end point ID '{id}' does not denote a virtual end-point."),
            ));
        }
        let definition = id.definition().clone();
        Ok(match (definition.cardinality(), definition.collection_kind()) {
            (Cardinality::One, _) => Self::VirtualObject(match items {
                Some(items) => VirtualObjectEndPoint::complete(id, items.into_iter().next()),
                None => VirtualObjectEndPoint::incomplete(id),
            }),
            (Cardinality::Many, kind) => {
                let kind = kind.unwrap_or_default();
                let collection = match items {
                    Some(items) => CollectionEndPoint::complete(id, kind, items),
                    None => CollectionEndPoint::incomplete(id, kind),
                };
                match kind {
                    CollectionKind::DomainObjectCollection => {
                        Self::DomainObjectCollection(collection)
                    }
                    CollectionKind::VirtualCollection => Self::VirtualCollection(collection),
                }
            }
        })
    }

    /// Returns the end-point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        match self {
            Self::RealObject(ep) => ep.id(),
            Self::VirtualObject(ep) => ep.id(),
            Self::DomainObjectCollection(ep) | Self::VirtualCollection(ep) => ep.id(),
            Self::NullRealObject(id)
            | Self::NullVirtualObject(id)
            | Self::NullDomainObjectCollection(id)
            | Self::NullVirtualCollection(id) => id,
        }
    }

    /// Returns the end-point definition.
    #[must_use]
    pub fn definition(&self) -> &EndPointDefinition {
        self.id().definition()
    }

    /// Returns the owning object; `None` for null end-points.
    #[must_use]
    pub fn object_id(&self) -> Option<&ObjectId> {
        self.id().object_id()
    }

    /// Whether this is a null stand-in.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Self::NullRealObject(_)
                | Self::NullVirtualObject(_)
                | Self::NullDomainObjectCollection(_)
                | Self::NullVirtualCollection(_)
        )
    }

    /// Whether this end-point is computed from its opposite.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.definition().is_virtual()
    }

    /// Whether this end-point holds a collection.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.definition().cardinality() == Cardinality::Many
    }

    /// Whether the end-point's contents are known. Null and real end-points
    /// are always complete.
    #[must_use]
    pub fn is_data_complete(&self) -> bool {
        match self {
            Self::VirtualObject(ep) => ep.is_data_complete(),
            Self::DomainObjectCollection(ep) | Self::VirtualCollection(ep) => {
                ep.is_data_complete()
            }
            _ => true,
        }
    }

    /// Whether the contents differ from the originally loaded ones.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        match self {
            Self::RealObject(ep) => ep.has_changed(),
            Self::VirtualObject(ep) => ep.has_changed(),
            Self::DomainObjectCollection(ep) | Self::VirtualCollection(ep) => ep.has_changed(),
            _ => false,
        }
    }

    /// Whether the end-point was touched since the last commit.
    #[must_use]
    pub fn has_been_touched(&self) -> bool {
        match self {
            Self::RealObject(ep) => ep.has_been_touched(),
            Self::VirtualObject(ep) => ep.has_been_touched(),
            Self::DomainObjectCollection(ep) | Self::VirtualCollection(ep) => {
                ep.has_been_touched()
            }
            _ => false,
        }
    }

    /// Returns the related object of a single-object end-point.
    #[must_use]
    pub fn opposite_object_id(&self) -> Option<&ObjectId> {
        match self {
            Self::RealObject(ep) => ep.opposite_object_id(),
            Self::VirtualObject(ep) => ep.opposite_object_id(),
            _ => None,
        }
    }

    /// Returns the originally related object of a single-object end-point.
    #[must_use]
    pub fn original_opposite_object_id(&self) -> Option<&ObjectId> {
        match self {
            Self::RealObject(ep) => ep.original_opposite_object_id(),
            Self::VirtualObject(ep) => ep.original_opposite_object_id(),
            _ => None,
        }
    }

    /// Returns all currently related objects, whatever the cardinality.
    #[must_use]
    pub fn opposite_object_ids(&self) -> Vec<ObjectId> {
        match self {
            Self::DomainObjectCollection(ep) | Self::VirtualCollection(ep) => {
                ep.opposite_object_ids().to_vec()
            }
            other => other.opposite_object_id().cloned().into_iter().collect(),
        }
    }

    /// Returns all originally related objects, whatever the cardinality.
    #[must_use]
    pub fn original_opposite_object_ids(&self) -> Vec<ObjectId> {
        match self {
            Self::DomainObjectCollection(ep) | Self::VirtualCollection(ep) => {
                ep.original_opposite_object_ids().to_vec()
            }
            other => other
                .original_opposite_object_id()
                .cloned()
                .into_iter()
                .collect(),
        }
    }

    /// Returns the collection of a collection end-point.
    #[must_use]
    pub fn as_collection(&self) -> Option<&CollectionEndPoint> {
        match self {
            Self::DomainObjectCollection(ep) | Self::VirtualCollection(ep) => Some(ep),
            _ => None,
        }
    }

    /// Returns the real end-point, if this is one.
    #[must_use]
    pub fn as_real(&self) -> Option<&RealObjectEndPoint> {
        match self {
            Self::RealObject(ep) => Some(ep),
            _ => None,
        }
    }

    /// Unchanged, registered virtual end-points may drop their contents.
    #[must_use]
    pub fn can_be_marked_incomplete(&self) -> bool {
        match self {
            Self::VirtualObject(_) | Self::DomainObjectCollection(_) | Self::VirtualCollection(_) => {
                !self.has_changed()
            }
            _ => false,
        }
    }

    pub(crate) fn touch(&mut self) {
        match self {
            Self::RealObject(ep) => ep.touch(),
            Self::VirtualObject(ep) => ep.touch(),
            Self::DomainObjectCollection(ep) | Self::VirtualCollection(ep) => ep.touch(),
            _ => {}
        }
    }

    pub(crate) fn commit(&mut self) {
        match self {
            Self::RealObject(ep) => ep.commit(),
            Self::VirtualObject(ep) => ep.commit(),
            Self::DomainObjectCollection(ep) | Self::VirtualCollection(ep) => ep.commit(),
            _ => {}
        }
    }

    pub(crate) fn rollback(&mut self) {
        match self {
            Self::RealObject(ep) => ep.rollback(),
            Self::VirtualObject(ep) => ep.rollback(),
            Self::DomainObjectCollection(ep) | Self::VirtualCollection(ep) => ep.rollback(),
            _ => {}
        }
    }

    pub(crate) fn mark_data_complete(&mut self, original: Vec<ObjectId>, current: Vec<ObjectId>) {
        match self {
            Self::VirtualObject(ep) => {
                ep.mark_data_complete(original.into_iter().next(), current.into_iter().next());
            }
            Self::DomainObjectCollection(ep) | Self::VirtualCollection(ep) => {
                ep.mark_data_complete(original, current);
            }
            _ => {}
        }
    }

    pub(crate) fn mark_data_incomplete(&mut self) {
        match self {
            Self::VirtualObject(ep) => ep.mark_data_incomplete(),
            Self::DomainObjectCollection(ep) | Self::VirtualCollection(ep) => {
                ep.mark_data_incomplete();
            }
            _ => {}
        }
    }

    /// Sets the related object of a single-object end-point.
    pub(crate) fn set_opposite_object_id(&mut self, opposite: Option<ObjectId>) -> CoreResult<()> {
        let id = self.id().clone();
        let applied = match self {
            Self::RealObject(ep) => {
                ep.set_opposite_object_id(opposite);
                true
            }
            Self::VirtualObject(ep) => ep.set_opposite_object_id(opposite),
            _ => false,
        };
        if applied {
            Ok(())
        } else {
            Err(CoreError::invalid_operation(format!(
                "Relation end-point '{id}' cannot hold a single related object."
            )))
        }
    }

    /// Mutable access to the items of a complete collection end-point.
    pub(crate) fn items_mut(&mut self) -> CoreResult<&mut Vec<ObjectId>> {
        let id = self.id().clone();
        let items = match self {
            Self::DomainObjectCollection(ep) | Self::VirtualCollection(ep) => ep.items_mut(),
            _ => None,
        };
        items.ok_or_else(|| {
            CoreError::invalid_operation(format!(
                "Relation end-point '{id}' is not a complete collection."
            ))
        })
    }

    /// Takes over the contents of the same end-point from a sub-transaction.
    pub(crate) fn set_data_from(&mut self, source: &RelationEndPoint) -> CoreResult<()> {
        match (self, source) {
            (Self::RealObject(target), Self::RealObject(source)) => target.set_data_from(source),
            (Self::VirtualObject(target), Self::VirtualObject(source)) => {
                target.set_data_from(source);
            }
            (Self::DomainObjectCollection(target), Self::DomainObjectCollection(source))
            | (Self::VirtualCollection(target), Self::VirtualCollection(source)) => {
                target.set_data_from(source);
            }
            (target, source) => {
                return Err(CoreError::invalid_operation(format!(
                    "Cannot take over end-point '{}' from '{}'.",
                    target.id(),
                    source.id()
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MappingBuilder, MappingConfiguration};
    use uuid::Uuid;

    fn mapping() -> MappingConfiguration {
        MappingBuilder::new()
            .class("Order")
            .class("OrderTicket")
            .class("Customer")
            .class("Client")
            .one_to_one("OrderToTicket", "OrderTicket", "Order", "Order", "OrderTicket")
            .one_to_many(
                "OrderToCustomer",
                "Order",
                "Customer",
                "Customer",
                "Orders",
                CollectionKind::VirtualCollection,
            )
            .unidirectional("ClientToParent", "Client", "ParentClient", "Client")
            .build()
            .unwrap()
    }

    fn id(class: &str, property: &str) -> RelationEndPointId {
        let object = ObjectId::new(class, Uuid::from_u128(1));
        RelationEndPointId::for_property(&mapping(), &object, property).unwrap()
    }

    #[test]
    fn null_picks_variant_by_definition() {
        let ticket = id("Order", "OrderTicket");
        let null = RelationEndPoint::null(RelationEndPointId::new(None, ticket.definition().clone()));
        assert!(matches!(null, RelationEndPoint::NullVirtualObject(_)));
        assert!(null.is_null());
        assert!(null.is_data_complete());

        let orders = id("Customer", "Orders");
        let null = RelationEndPoint::null(RelationEndPointId::new(None, orders.definition().clone()));
        assert!(matches!(null, RelationEndPoint::NullVirtualCollection(_)));

        let real = id("Order", "Customer");
        assert!(matches!(
            RelationEndPoint::null(real),
            RelationEndPoint::NullRealObject(_)
        ));
    }

    #[test]
    fn incomplete_virtual_rejects_real_ids() {
        assert!(RelationEndPoint::incomplete_virtual(id("Order", "Customer")).is_err());

        let ep = RelationEndPoint::incomplete_virtual(id("Customer", "Orders")).unwrap();
        assert!(matches!(ep, RelationEndPoint::VirtualCollection(_)));
        assert!(!ep.is_data_complete());
        assert!(ep.can_be_marked_incomplete());
    }

    #[test]
    fn single_and_collection_accessors() {
        let mut ep = RelationEndPoint::empty_virtual(id("Order", "OrderTicket")).unwrap();
        let ticket = ObjectId::new("OrderTicket", Uuid::from_u128(7));
        ep.set_opposite_object_id(Some(ticket.clone())).unwrap();
        assert_eq!(ep.opposite_object_ids(), vec![ticket]);
        assert!(ep.original_opposite_object_ids().is_empty());
        assert!(ep.has_changed());
        assert!(!ep.can_be_marked_incomplete());
        assert!(ep.items_mut().is_err());
    }

    #[test]
    fn set_data_from_requires_same_variant() {
        let mut target = RelationEndPoint::empty_virtual(id("Order", "OrderTicket")).unwrap();
        let source = RelationEndPoint::empty_virtual(id("Customer", "Orders")).unwrap();
        assert!(target.set_data_from(&source).is_err());
    }
}
