//! Mapping configuration and its builder.

use super::definition::{ClassDefinition, CollectionKind, EndPointDefinition, RelationDefinition};
use crate::error::{CoreError, CoreResult};
use crate::object::{ClassId, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// The complete set of mapped classes and relations.
///
/// Built once through [`MappingBuilder`] and shared by every transaction of
/// a hierarchy.
#[derive(Debug, Clone)]
pub struct MappingConfiguration {
    classes: BTreeMap<ClassId, ClassDefinition>,
    relations: Vec<Arc<RelationDefinition>>,
}

impl MappingConfiguration {
    /// Starts building a configuration.
    #[must_use]
    pub fn builder() -> MappingBuilder {
        MappingBuilder::new()
    }

    /// Returns a class definition.
    ///
    /// # Errors
    ///
    /// Returns `UnknownClass` if the class is not mapped.
    pub fn class(&self, class_id: &ClassId) -> CoreResult<&ClassDefinition> {
        self.classes.get(class_id).ok_or_else(|| CoreError::UnknownClass {
            class: class_id.to_string(),
        })
    }

    /// Returns all class definitions, ordered by class ID.
    pub fn classes(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.classes.values()
    }

    /// Returns all relation definitions in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = &RelationDefinition> {
        self.relations.iter().map(AsRef::as_ref)
    }

    /// Looks up the end-point definition for a relation property.
    ///
    /// # Errors
    ///
    /// Returns `UnknownClass` or `UnknownProperty`.
    pub fn end_point_definition(
        &self,
        class_id: &ClassId,
        property: &str,
    ) -> CoreResult<EndPointDefinition> {
        self.class(class_id)?
            .end_point(property)
            .cloned()
            .ok_or_else(|| CoreError::UnknownProperty {
                class: class_id.to_string(),
                property: property.to_string(),
            })
    }
}

/// Builder for [`MappingConfiguration`].
///
/// # Example
///
/// ```rust
/// use reltx_core::mapping::{CollectionKind, MappingBuilder};
/// use reltx_core::Value;
///
/// let mapping = MappingBuilder::new()
///     .class("Order")
///     .class("Customer")
///     .value_property("Order", "Number", Value::Integer(0))
///     .one_to_many("OrderToCustomer", "Order", "Customer", "Customer", "Orders",
///         CollectionKind::DomainObjectCollection)
///     .build()
///     .unwrap();
/// assert!(mapping.end_point_definition(&"Customer".into(), "Orders").is_ok());
/// ```
#[derive(Debug, Default)]
pub struct MappingBuilder {
    classes: Vec<ClassId>,
    properties: Vec<(ClassId, String, Value)>,
    relations: Vec<RelationDefinition>,
}

impl MappingBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a class.
    #[must_use]
    pub fn class(mut self, name: impl Into<ClassId>) -> Self {
        self.classes.push(name.into());
        self
    }

    /// Declares a value property with its default.
    #[must_use]
    pub fn value_property(
        mut self,
        class: impl Into<ClassId>,
        property: impl Into<String>,
        default: Value,
    ) -> Self {
        self.properties
            .push((class.into(), property.into(), default));
        self
    }

    /// Declares a bidirectional 1:1 relation.
    ///
    /// `real_class.real_property` holds the foreign key;
    /// `virtual_class.virtual_property` is computed from it.
    #[must_use]
    pub fn one_to_one(
        mut self,
        relation_id: impl Into<String>,
        real_class: impl Into<ClassId>,
        real_property: impl Into<String>,
        virtual_class: impl Into<ClassId>,
        virtual_property: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationDefinition::one_to_one(
            relation_id.into(),
            real_class.into(),
            real_property.into(),
            virtual_class.into(),
            virtual_property.into(),
        ));
        self
    }

    /// Declares a bidirectional 1:n relation.
    ///
    /// `many_class.real_property` holds the foreign key;
    /// `one_class.collection_property` is the collection end-point.
    #[must_use]
    pub fn one_to_many(
        mut self,
        relation_id: impl Into<String>,
        many_class: impl Into<ClassId>,
        real_property: impl Into<String>,
        one_class: impl Into<ClassId>,
        collection_property: impl Into<String>,
        collection_kind: CollectionKind,
    ) -> Self {
        self.relations.push(RelationDefinition::one_to_many(
            relation_id.into(),
            many_class.into(),
            real_property.into(),
            one_class.into(),
            collection_property.into(),
            collection_kind,
        ));
        self
    }

    /// Declares a unidirectional relation from `class.property` to `target_class`.
    #[must_use]
    pub fn unidirectional(
        mut self,
        relation_id: impl Into<String>,
        class: impl Into<ClassId>,
        property: impl Into<String>,
        target_class: impl Into<ClassId>,
    ) -> Self {
        self.relations.push(RelationDefinition::unidirectional(
            relation_id.into(),
            class.into(),
            property.into(),
            target_class.into(),
        ));
        self
    }

    /// Validates the declarations and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `UnknownClass` if a property or relation refers to an
    /// undeclared class, and `InvalidArgument` for duplicate classes,
    /// properties or relation IDs.
    pub fn build(self) -> CoreResult<MappingConfiguration> {
        let mut classes = BTreeMap::new();
        for class_id in self.classes {
            if classes
                .insert(class_id.clone(), ClassDefinition::new(class_id.clone()))
                .is_some()
            {
                return Err(CoreError::invalid_argument(
                    "class",
                    format!("class '{class_id}' is declared twice"),
                ));
            }
        }

        for (class_id, property, default) in self.properties {
            let class = classes
                .get_mut(&class_id)
                .ok_or_else(|| CoreError::UnknownClass {
                    class: class_id.to_string(),
                })?;
            if class.has_property(&property) {
                return Err(duplicate_property(&class_id, &property));
            }
            class.insert_property(property, default);
        }

        let mut relation_ids = BTreeSet::new();
        let mut relations = Vec::with_capacity(self.relations.len());
        for relation in self.relations {
            if !relation_ids.insert(relation.id().to_string()) {
                return Err(CoreError::invalid_argument(
                    "relation",
                    format!("relation '{}' is declared twice", relation.id()),
                ));
            }
            let relation = Arc::new(relation);
            for (side, spec) in relation.ends().iter().enumerate() {
                let class = classes
                    .get_mut(&spec.class_id)
                    .ok_or_else(|| CoreError::UnknownClass {
                        class: spec.class_id.to_string(),
                    })?;
                let Some(property) = &spec.property_name else {
                    continue;
                };
                if class.has_property(property) {
                    return Err(duplicate_property(&spec.class_id, property));
                }
                class.insert_end_point(
                    property.clone(),
                    EndPointDefinition::new(Arc::clone(&relation), side),
                );
            }
            relations.push(relation);
        }

        debug!(
            classes = classes.len(),
            relations = relations.len(),
            "mapping configuration built"
        );
        Ok(MappingConfiguration { classes, relations })
    }
}

fn duplicate_property(class_id: &ClassId, property: &str) -> CoreError {
    CoreError::invalid_argument(
        "property",
        format!("property '{property}' is defined twice on class '{class_id}'"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::RelationKind;

    fn builder() -> MappingBuilder {
        MappingBuilder::new()
            .class("Order")
            .class("OrderTicket")
            .class("Customer")
            .class("Location")
            .class("Client")
            .value_property("Order", "Number", Value::Integer(0))
            .one_to_one("OrderToTicket", "OrderTicket", "Order", "Order", "OrderTicket")
            .one_to_many(
                "OrderToCustomer",
                "Order",
                "Customer",
                "Customer",
                "Orders",
                CollectionKind::DomainObjectCollection,
            )
            .unidirectional("LocationToClient", "Location", "Client", "Client")
    }

    #[test]
    fn build_registers_end_points_on_both_classes() {
        let mapping = builder().build().unwrap();

        let order = mapping.class(&ClassId::new("Order")).unwrap();
        assert_eq!(order.default_value("Number"), Some(&Value::Integer(0)));
        assert_eq!(order.end_points().count(), 2);
        assert_eq!(order.real_end_points().count(), 1);
        assert_eq!(order.virtual_end_points().count(), 1);

        let client = mapping.class(&ClassId::new("Client")).unwrap();
        assert_eq!(client.end_points().count(), 0);

        let def = mapping
            .end_point_definition(&ClassId::new("Location"), "Client")
            .unwrap();
        assert_eq!(def.relation_kind(), RelationKind::Unidirectional);
        assert_eq!(mapping.relations().count(), 3);
    }

    #[test]
    fn unknown_lookups_fail() {
        let mapping = builder().build().unwrap();
        assert!(matches!(
            mapping.class(&ClassId::new("Nope")),
            Err(CoreError::UnknownClass { .. })
        ));
        assert!(matches!(
            mapping.end_point_definition(&ClassId::new("Order"), "Number"),
            Err(CoreError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn relation_to_undeclared_class_fails() {
        let result = MappingBuilder::new()
            .class("Order")
            .unidirectional("R", "Order", "Official", "Official")
            .build();
        assert!(matches!(result, Err(CoreError::UnknownClass { class }) if class == "Official"));
    }

    #[test]
    fn duplicate_property_fails() {
        let result = builder()
            .value_property("Order", "Customer", Value::Null)
            .build();
        assert!(matches!(result, Err(CoreError::InvalidArgument { .. })));
    }

    #[test]
    fn duplicate_relation_id_fails() {
        let result = builder()
            .unidirectional("LocationToClient", "Order", "Client", "Client")
            .build();
        assert!(matches!(result, Err(CoreError::InvalidArgument { .. })));
    }
}
