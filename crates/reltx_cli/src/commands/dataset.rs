//! Dataset files: a mapping plus the objects stored under it.

use super::{CliError, CliResult};
use reltx_core::{ClassId, MappingConfiguration, MappingSpec, ObjectId, Value};
use reltx_storage::{InMemoryBackend, Record, StoredValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// A dataset as read from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct Dataset {
    /// The mapping the objects follow.
    pub mapping: MappingSpec,
    /// The stored objects.
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
}

/// One stored object.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectSpec {
    /// Name used by scripts and in the output.
    pub alias: String,
    /// Class of the object.
    pub class: String,
    /// Value properties; missing ones keep their defaults.
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
    /// Foreign keys, by real relation property, as aliases.
    #[serde(default)]
    pub relations: BTreeMap<String, String>,
}

/// A dataset turned into a mapping and a filled backend.
pub struct LoadedDataset {
    /// The built mapping.
    pub mapping: Arc<MappingConfiguration>,
    /// Storage holding the dataset's objects.
    pub storage: Arc<InMemoryBackend>,
    /// Object IDs by alias, in dataset order.
    pub aliases: Vec<(String, ObjectId)>,
}

impl Dataset {
    /// Reads a dataset file.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` errors.
    pub fn read(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses a dataset from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `Json` errors.
    pub fn parse(text: &str) -> CliResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the mapping and stores every object.
    ///
    /// Objects get sequential IDs in dataset order, so traces are stable.
    ///
    /// # Errors
    ///
    /// Returns `Core` errors for invalid mappings and `Dataset` errors for
    /// objects that do not fit the mapping.
    pub fn load(&self) -> CliResult<LoadedDataset> {
        let mapping = Arc::new(self.mapping.build()?);

        let mut aliases: Vec<(String, ObjectId)> = Vec::new();
        for (index, object) in self.objects.iter().enumerate() {
            if aliases.iter().any(|(alias, _)| alias == &object.alias) {
                return Err(CliError::DuplicateAlias(object.alias.clone()));
            }
            mapping.class(&ClassId::new(&object.class))?;
            let id = ObjectId::new(object.class.as_str(), Uuid::from_u128(index as u128 + 1));
            aliases.push((object.alias.clone(), id));
        }
        let lookup: BTreeMap<&str, &ObjectId> = aliases
            .iter()
            .map(|(alias, id)| (alias.as_str(), id))
            .collect();

        let mut records = Vec::with_capacity(self.objects.len());
        for (object, (_, id)) in self.objects.iter().zip(&aliases) {
            let class = mapping.class(id.class_id())?;
            let mut record = Record::new(id.to_record_key());

            for (property, value) in &object.values {
                if class.default_value(property).is_none() {
                    return Err(CliError::Dataset(format!(
                        "'{}' has no value property '{property}'",
                        object.alias
                    )));
                }
                record = record.with(property.as_str(), value.to_stored());
            }

            for (property, target) in &object.relations {
                let definition = class.end_point(property).ok_or_else(|| {
                    CliError::Dataset(format!(
                        "'{}' has no relation property '{property}'",
                        object.alias
                    ))
                })?;
                if definition.is_virtual() {
                    return Err(CliError::Dataset(format!(
                        "'{}.{property}' is the virtual side; store the relation on '{}'",
                        object.alias,
                        definition.opposite().full_name()
                    )));
                }
                let target_id = lookup
                    .get(target.as_str())
                    .ok_or_else(|| CliError::UnknownAlias(target.clone()))?;
                if target_id.class_id() != definition.opposite_class_id() {
                    return Err(CliError::Dataset(format!(
                        "'{}.{property}' must reference a '{}', not '{target}'",
                        object.alias,
                        definition.opposite_class_id()
                    )));
                }
                record = record.with(
                    property.as_str(),
                    StoredValue::Reference(target_id.to_record_key()),
                );
            }
            records.push(record);
        }

        debug!(objects = records.len(), "dataset loaded");
        Ok(LoadedDataset {
            mapping,
            storage: Arc::new(InMemoryBackend::with_records(records)),
            aliases,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPING: &str = r#"{
        "classes": [
            { "name": "Order", "properties": { "OrderNumber": { "type": "integer", "value": 0 } } },
            { "name": "OrderTicket" }
        ],
        "relations": [
            { "kind": "one_to_one", "id": "OrderToTicket", "real_class": "OrderTicket",
              "real_property": "Order", "virtual_class": "Order", "virtual_property": "OrderTicket" }
        ]
    }"#;

    fn dataset(objects: &str) -> Dataset {
        Dataset::parse(&format!(r#"{{ "mapping": {MAPPING}, "objects": {objects} }}"#)).unwrap()
    }

    #[test]
    fn stores_values_and_foreign_keys() {
        let loaded = dataset(
            r#"[
                { "alias": "order1", "class": "Order",
                  "values": { "OrderNumber": { "type": "integer", "value": 7 } } },
                { "alias": "ticket1", "class": "OrderTicket", "relations": { "Order": "order1" } }
            ]"#,
        )
        .load()
        .unwrap();

        assert_eq!(loaded.aliases.len(), 2);
        let records = loaded.storage.records();
        let ticket = records
            .iter()
            .find(|record| record.get("Order").is_some())
            .unwrap();
        assert_eq!(
            ticket.get("Order"),
            Some(&StoredValue::Reference(loaded.aliases[0].1.to_record_key()))
        );
    }

    #[test]
    fn foreign_keys_belong_on_the_real_side() {
        let result = dataset(
            r#"[
                { "alias": "ticket1", "class": "OrderTicket" },
                { "alias": "order1", "class": "Order", "relations": { "OrderTicket": "ticket1" } }
            ]"#,
        )
        .load();
        assert!(matches!(result, Err(CliError::Dataset(message)) if message.contains("virtual side")));
    }

    #[test]
    fn rejects_unknown_aliases_and_properties() {
        let unknown = dataset(
            r#"[{ "alias": "ticket1", "class": "OrderTicket", "relations": { "Order": "nope" } }]"#,
        )
        .load();
        assert!(matches!(unknown, Err(CliError::UnknownAlias(alias)) if alias == "nope"));

        let property = dataset(
            r#"[{ "alias": "order1", "class": "Order",
                  "values": { "Color": { "type": "text", "value": "red" } } }]"#,
        )
        .load();
        assert!(matches!(property, Err(CliError::Dataset(_))));

        let duplicate = dataset(
            r#"[{ "alias": "a", "class": "Order" }, { "alias": "a", "class": "Order" }]"#,
        )
        .load();
        assert!(matches!(duplicate, Err(CliError::DuplicateAlias(_))));
    }
}
