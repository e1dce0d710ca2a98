//! Snapshots of the relation graph as seen by one transaction.

use crate::fixtures::short_name;
use reltx_core::{Cardinality, CommandContext, CoreResult, ObjectId, ObjectState};
use serde::Serialize;
use std::collections::BTreeMap;

/// The related objects of every end-point of a set of objects.
///
/// Collection contents are sorted, so two snapshots compare equal when
/// the same objects are related regardless of collection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
    relations: BTreeMap<String, Vec<String>>,
}

impl GraphSnapshot {
    /// Captures the end-points of `objects`, loading them as needed.
    ///
    /// Anonymous end-points and objects that are deleted or invalid in the
    /// transaction are skipped.
    ///
    /// # Errors
    ///
    /// Returns loading errors.
    pub fn capture(ctx: &mut CommandContext<'_>, objects: &[ObjectId]) -> CoreResult<Self> {
        let mut relations = BTreeMap::new();
        for object in objects {
            if matches!(
                ctx.object_state(object),
                ObjectState::Deleted | ObjectState::Invalid
            ) {
                continue;
            }
            let definitions: Vec<_> = ctx
                .data()
                .mapping()
                .class(object.class_id())?
                .end_points()
                .cloned()
                .collect();
            for definition in definitions {
                let Some(property) = definition.property_name() else {
                    continue;
                };
                let mut related: Vec<String> = match definition.cardinality() {
                    Cardinality::One => ctx
                        .get_related_object(object, property)?
                        .iter()
                        .map(short_name)
                        .collect(),
                    Cardinality::Many => ctx
                        .get_related_objects(object, property)?
                        .iter()
                        .map(short_name)
                        .collect(),
                };
                related.sort();
                relations.insert(format!("{}.{property}", short_name(object)), related);
            }
        }
        Ok(Self { relations })
    }

    /// Returns the related objects of `object.property`.
    pub fn related(&self, object: &ObjectId, property: &str) -> Option<&[String]> {
        self.relations
            .get(&format!("{}.{property}", short_name(object)))
            .map(Vec::as_slice)
    }

    /// Returns the number of captured end-points.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// Returns `true` if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}
