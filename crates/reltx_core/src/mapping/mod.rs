//! Mapping definitions: classes, relations and their end-points.
//!
//! The mapping is the definition provider every end-point and command
//! consults for cardinality, opposite side, and whether a side is virtual
//! or anonymous.

mod configuration;
mod definition;
mod spec;

pub use configuration::{MappingBuilder, MappingConfiguration};
pub use definition::{
    Cardinality, ClassDefinition, CollectionKind, EndPointDefinition, RelationDefinition,
    RelationKind,
};
pub use spec::{ClassSpec, MappingSpec, RelationSpec};
