//! Serializable mapping description.

use super::configuration::{MappingBuilder, MappingConfiguration};
use super::definition::CollectionKind;
use crate::error::CoreResult;
use crate::object::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A mapping described as data, e.g. loaded from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSpec {
    /// Mapped classes.
    #[serde(default)]
    pub classes: Vec<ClassSpec>,
    /// Relations between the classes.
    #[serde(default)]
    pub relations: Vec<RelationSpec>,
}

/// A class and its value properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSpec {
    /// Class name.
    pub name: String,
    /// Value properties with their defaults.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

/// A relation declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationSpec {
    /// Bidirectional 1:1 relation.
    OneToOne {
        /// Relation ID.
        id: String,
        /// Class holding the foreign key.
        real_class: String,
        /// Foreign-key property.
        real_property: String,
        /// Class holding the virtual end-point.
        virtual_class: String,
        /// Virtual property.
        virtual_property: String,
    },
    /// Bidirectional 1:n relation.
    OneToMany {
        /// Relation ID.
        id: String,
        /// Class on the "many" side, holding the foreign key.
        many_class: String,
        /// Foreign-key property.
        real_property: String,
        /// Class on the "one" side.
        one_class: String,
        /// Collection property.
        collection_property: String,
        /// Collection flavour.
        #[serde(default)]
        collection: CollectionKind,
    },
    /// Relation with an anonymous opposite.
    Unidirectional {
        /// Relation ID.
        id: String,
        /// Class holding the foreign key.
        class: String,
        /// Foreign-key property.
        property: String,
        /// Referenced class.
        target_class: String,
    },
}

impl MappingSpec {
    /// Builds the configuration described by this spec.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`MappingBuilder::build`].
    pub fn build(&self) -> CoreResult<MappingConfiguration> {
        let mut builder = MappingBuilder::new();
        for class in &self.classes {
            builder = builder.class(class.name.as_str());
            for (property, default) in &class.properties {
                builder = builder.value_property(class.name.as_str(), property, default.clone());
            }
        }
        for relation in &self.relations {
            builder = match relation {
                RelationSpec::OneToOne {
                    id,
                    real_class,
                    real_property,
                    virtual_class,
                    virtual_property,
                } => builder.one_to_one(
                    id,
                    real_class.as_str(),
                    real_property,
                    virtual_class.as_str(),
                    virtual_property,
                ),
                RelationSpec::OneToMany {
                    id,
                    many_class,
                    real_property,
                    one_class,
                    collection_property,
                    collection,
                } => builder.one_to_many(
                    id,
                    many_class.as_str(),
                    real_property,
                    one_class.as_str(),
                    collection_property,
                    *collection,
                ),
                RelationSpec::Unidirectional {
                    id,
                    class,
                    property,
                    target_class,
                } => builder.unidirectional(id, class.as_str(), property, target_class.as_str()),
            };
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ClassId;

    #[test]
    fn builds_from_json() {
        let json = r#"{
            "classes": [
                { "name": "Order", "properties": { "Number": { "type": "integer", "value": 0 } } },
                { "name": "Customer" }
            ],
            "relations": [
                { "kind": "one_to_many", "id": "OrderToCustomer", "many_class": "Order",
                  "real_property": "Customer", "one_class": "Customer",
                  "collection_property": "Orders", "collection": "virtual_collection" }
            ]
        }"#;
        let spec: MappingSpec = serde_json::from_str(json).unwrap();
        let mapping = spec.build().unwrap();

        let orders = mapping
            .end_point_definition(&ClassId::new("Customer"), "Orders")
            .unwrap();
        assert_eq!(
            orders.collection_kind(),
            Some(CollectionKind::VirtualCollection)
        );
        let order = mapping.class(&ClassId::new("Order")).unwrap();
        assert_eq!(order.default_value("Number"), Some(&Value::Integer(0)));
    }

    #[test]
    fn collection_defaults_to_domain_object_collection() {
        let json = r#"{ "kind": "one_to_many", "id": "R", "many_class": "A",
            "real_property": "B", "one_class": "B", "collection_property": "As" }"#;
        let relation: RelationSpec = serde_json::from_str(json).unwrap();
        assert!(matches!(
            relation,
            RelationSpec::OneToMany {
                collection: CollectionKind::DomainObjectCollection,
                ..
            }
        ));
    }
}
