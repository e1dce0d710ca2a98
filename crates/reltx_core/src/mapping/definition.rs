//! Class, relation and end-point definitions.

use crate::object::{ClassId, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// How many objects an end-point refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// At most one related object.
    One,
    /// A collection of related objects.
    Many,
}

/// Flavour of a collection end-point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Ordered, user-modifiable collection.
    #[default]
    DomainObjectCollection,
    /// Unordered, read-only collection; changes only through the real side.
    VirtualCollection,
}

/// Shape of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Bidirectional 1:1 relation.
    OneToOne,
    /// Bidirectional 1:n relation.
    OneToMany,
    /// Real end-point with an anonymous opposite.
    Unidirectional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EndPointSpec {
    pub(crate) class_id: ClassId,
    pub(crate) property_name: Option<String>,
    pub(crate) is_virtual: bool,
    pub(crate) cardinality: Cardinality,
    pub(crate) collection_kind: Option<CollectionKind>,
}

impl EndPointSpec {
    fn real(class_id: ClassId, property: String) -> Self {
        Self {
            class_id,
            property_name: Some(property),
            is_virtual: false,
            cardinality: Cardinality::One,
            collection_kind: None,
        }
    }
}

/// A relation between two classes.
///
/// Side 0 is always the real (foreign-key holding) end-point.
#[derive(Debug, PartialEq, Eq)]
pub struct RelationDefinition {
    id: String,
    kind: RelationKind,
    ends: [EndPointSpec; 2],
}

impl RelationDefinition {
    pub(crate) fn one_to_one(
        id: String,
        real_class: ClassId,
        real_property: String,
        virtual_class: ClassId,
        virtual_property: String,
    ) -> Self {
        Self {
            id,
            kind: RelationKind::OneToOne,
            ends: [
                EndPointSpec::real(real_class, real_property),
                EndPointSpec {
                    class_id: virtual_class,
                    property_name: Some(virtual_property),
                    is_virtual: true,
                    cardinality: Cardinality::One,
                    collection_kind: None,
                },
            ],
        }
    }

    pub(crate) fn one_to_many(
        id: String,
        many_class: ClassId,
        real_property: String,
        one_class: ClassId,
        collection_property: String,
        collection_kind: CollectionKind,
    ) -> Self {
        Self {
            id,
            kind: RelationKind::OneToMany,
            ends: [
                EndPointSpec::real(many_class, real_property),
                EndPointSpec {
                    class_id: one_class,
                    property_name: Some(collection_property),
                    is_virtual: true,
                    cardinality: Cardinality::Many,
                    collection_kind: Some(collection_kind),
                },
            ],
        }
    }

    pub(crate) fn unidirectional(
        id: String,
        class: ClassId,
        property: String,
        target_class: ClassId,
    ) -> Self {
        Self {
            id,
            kind: RelationKind::Unidirectional,
            ends: [
                EndPointSpec::real(class, property),
                EndPointSpec {
                    class_id: target_class,
                    property_name: None,
                    is_virtual: true,
                    cardinality: Cardinality::One,
                    collection_kind: None,
                },
            ],
        }
    }

    /// Returns the relation's identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the relation's shape.
    #[must_use]
    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub(crate) fn ends(&self) -> &[EndPointSpec; 2] {
        &self.ends
    }
}

/// One side of a relation.
///
/// Cheap to clone. Two definitions are equal when they denote the same side
/// of the same relation.
#[derive(Clone)]
pub struct EndPointDefinition {
    relation: Arc<RelationDefinition>,
    side: usize,
}

impl EndPointDefinition {
    pub(crate) fn new(relation: Arc<RelationDefinition>, side: usize) -> Self {
        debug_assert!(side < 2);
        Self { relation, side }
    }

    fn spec(&self) -> &EndPointSpec {
        &self.relation.ends[self.side]
    }

    /// Returns the relation this end-point belongs to.
    #[must_use]
    pub fn relation(&self) -> &RelationDefinition {
        &self.relation
    }

    /// Returns the relation's identifier.
    #[must_use]
    pub fn relation_id(&self) -> &str {
        &self.relation.id
    }

    /// Returns the relation's shape.
    #[must_use]
    pub fn relation_kind(&self) -> RelationKind {
        self.relation.kind
    }

    /// Returns the class owning this end-point.
    #[must_use]
    pub fn class_id(&self) -> &ClassId {
        &self.spec().class_id
    }

    /// Returns the property name; `None` for anonymous end-points.
    #[must_use]
    pub fn property_name(&self) -> Option<&str> {
        self.spec().property_name.as_deref()
    }

    /// Whether this end-point is computed from its opposite.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.spec().is_virtual
    }

    /// Whether this is the ownerless opposite of a unidirectional relation.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.spec().property_name.is_none()
    }

    /// Returns the end-point's cardinality.
    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        self.spec().cardinality
    }

    /// Returns the collection flavour for collection end-points.
    #[must_use]
    pub fn collection_kind(&self) -> Option<CollectionKind> {
        self.spec().collection_kind
    }

    /// Whether the relation has two materializable sides.
    #[must_use]
    pub fn is_bidirectional(&self) -> bool {
        self.relation.kind != RelationKind::Unidirectional
    }

    /// Returns the other side of the relation.
    #[must_use]
    pub fn opposite(&self) -> EndPointDefinition {
        Self {
            relation: Arc::clone(&self.relation),
            side: 1 - self.side,
        }
    }

    /// Returns the class on the other side of the relation.
    #[must_use]
    pub fn opposite_class_id(&self) -> &ClassId {
        &self.relation.ends[1 - self.side].class_id
    }

    /// Returns `Class.Property`, or `Class.<anonymous>`.
    #[must_use]
    pub fn full_name(&self) -> String {
        match self.property_name() {
            Some(property) => format!("{}.{}", self.class_id(), property),
            None => format!("{}.<anonymous>", self.class_id()),
        }
    }
}

impl PartialEq for EndPointDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.side == other.side && self.relation.id == other.relation.id
    }
}

impl Eq for EndPointDefinition {}

impl Hash for EndPointDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.relation.id.hash(state);
        self.side.hash(state);
    }
}

impl PartialOrd for EndPointDefinition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EndPointDefinition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.relation
            .id
            .cmp(&other.relation.id)
            .then(self.side.cmp(&other.side))
    }
}

impl fmt::Debug for EndPointDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndPointDefinition({})", self.full_name())
    }
}

impl fmt::Display for EndPointDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// A mapped class: value properties with defaults plus relation end-points.
#[derive(Debug, Clone)]
pub struct ClassDefinition {
    id: ClassId,
    properties: BTreeMap<String, Value>,
    end_points: BTreeMap<String, EndPointDefinition>,
}

impl ClassDefinition {
    pub(crate) fn new(id: ClassId) -> Self {
        Self {
            id,
            properties: BTreeMap::new(),
            end_points: BTreeMap::new(),
        }
    }

    pub(crate) fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name) || self.end_points.contains_key(name)
    }

    pub(crate) fn insert_property(&mut self, name: String, default: Value) {
        self.properties.insert(name, default);
    }

    pub(crate) fn insert_end_point(&mut self, name: String, definition: EndPointDefinition) {
        self.end_points.insert(name, definition);
    }

    /// Returns the class ID.
    #[must_use]
    pub fn id(&self) -> &ClassId {
        &self.id
    }

    /// Returns the value properties and their defaults.
    pub fn value_properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the default of a value property.
    #[must_use]
    pub fn default_value(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    /// Returns the end-point definition of a relation property.
    #[must_use]
    pub fn end_point(&self, property: &str) -> Option<&EndPointDefinition> {
        self.end_points.get(property)
    }

    /// Returns all relation end-points of the class, ordered by property.
    pub fn end_points(&self) -> impl Iterator<Item = &EndPointDefinition> {
        self.end_points.values()
    }

    /// Returns the real (foreign-key holding) end-points.
    pub fn real_end_points(&self) -> impl Iterator<Item = &EndPointDefinition> {
        self.end_points.values().filter(|def| !def.is_virtual())
    }

    /// Returns the virtual end-points.
    pub fn virtual_end_points(&self) -> impl Iterator<Item = &EndPointDefinition> {
        self.end_points.values().filter(|def| def.is_virtual())
    }
}
