//! Command factories of relation end-points.

use super::relation::RelationEndPoint;
use crate::command::{Command, ModificationCommand, ModificationKind};
use crate::error::{CoreError, CoreResult};
use crate::mapping::Cardinality;
use crate::object::ObjectId;
use std::collections::BTreeSet;

impl RelationEndPoint {
    fn check_modifiable(&self) -> CoreResult<()> {
        if self.is_null() {
            return Err(CoreError::invalid_argument(
                "modified_end_point",
                "Modified end point is null, a null end point modification command is needed.",
            ));
        }
        if !self.is_data_complete() {
            return Err(CoreError::invalid_argument(
                "modified_end_point",
                format!(
                    "Relation end-point '{}' must be complete before it can be modified.",
                    self.id()
                ),
            ));
        }
        Ok(())
    }

    fn check_cardinality(&self, expected: Cardinality) -> CoreResult<()> {
        if self.definition().cardinality() == expected {
            return Ok(());
        }
        let message = match expected {
            Cardinality::One => format!(
                "Relation end-point '{}' holds a collection; it cannot be set to a single object.",
                self.id()
            ),
            Cardinality::Many => format!(
                "Relation end-point '{}' holds a single object; it has no collection to modify.",
                self.id()
            ),
        };
        Err(CoreError::invalid_argument("modified_end_point", message))
    }

    fn check_related_class(&self, parameter: &str, object: &ObjectId) -> CoreResult<()> {
        let expected = self.definition().opposite_class_id();
        if object.class_id() == expected {
            return Ok(());
        }
        Err(CoreError::invalid_argument(
            parameter,
            format!(
                "The object '{object}' cannot be related through '{}'; an object of class '{expected}' is required.",
                self.definition().full_name()
            ),
        ))
    }

    fn leaf(
        &self,
        kind: ModificationKind,
        old: Option<ObjectId>,
        new: Option<ObjectId>,
    ) -> Command {
        Command::Modification(ModificationCommand::new(kind, self.id().clone(), old, new))
    }

    /// Creates the command setting a single-object end-point to `new`.
    ///
    /// Setting the currently related object yields a same-value command.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for null, incomplete or collection
    /// end-points and for objects of the wrong class.
    pub fn create_set_command(&self, new: Option<ObjectId>) -> CoreResult<Command> {
        self.check_modifiable()?;
        self.check_cardinality(Cardinality::One)?;
        if let Some(new) = &new {
            self.check_related_class("new_related_object", new)?;
        }
        let old = self.opposite_object_id().cloned();
        let kind = if old == new {
            ModificationKind::SetSame
        } else {
            ModificationKind::Set
        };
        Ok(self.leaf(kind, old, new))
    }

    /// Creates the command removing `removed` from a collection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if this is not a complete collection or
    /// `removed` is not part of it.
    pub fn create_remove_command(&self, removed: &ObjectId) -> CoreResult<Command> {
        self.check_modifiable()?;
        self.check_cardinality(Cardinality::Many)?;
        if !self.opposite_object_ids().contains(removed) {
            return Err(CoreError::invalid_argument(
                "removed_related_object",
                format!("The object '{removed}' is not part of '{}'.", self.id()),
            ));
        }
        Ok(self.leaf(ModificationKind::Remove, Some(removed.clone()), None))
    }

    /// Creates the command inserting `inserted` at `index`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if this is not a complete collection, the
    /// object is already part of it, has the wrong class, or `index` is past
    /// the end.
    pub fn create_insert_command(&self, inserted: ObjectId, index: usize) -> CoreResult<Command> {
        self.check_modifiable()?;
        self.check_cardinality(Cardinality::Many)?;
        self.check_related_class("inserted_related_object", &inserted)?;
        let items = self.opposite_object_ids();
        if items.contains(&inserted) {
            return Err(CoreError::invalid_argument(
                "inserted_related_object",
                format!("The object '{inserted}' is already part of '{}'.", self.id()),
            ));
        }
        if index > items.len() {
            return Err(CoreError::invalid_argument(
                "index",
                format!("Index {index} is out of range for '{}'.", self.id()),
            ));
        }
        Ok(self.leaf(ModificationKind::Insert { index }, None, Some(inserted)))
    }

    /// Creates the command appending `added` to a collection.
    ///
    /// # Errors
    ///
    /// See [`create_insert_command`](Self::create_insert_command).
    pub fn create_add_command(&self, added: ObjectId) -> CoreResult<Command> {
        let index = self.opposite_object_ids().len();
        self.create_insert_command(added, index)
    }

    /// Creates the command replacing the item at `index` with `replacement`.
    ///
    /// Replacing an item with itself yields a same-value command.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if this is not a complete collection,
    /// `index` is out of range, or `replacement` is already part of the
    /// collection elsewhere or has the wrong class.
    pub fn create_replace_command(&self, index: usize, replacement: ObjectId) -> CoreResult<Command> {
        self.check_modifiable()?;
        self.check_cardinality(Cardinality::Many)?;
        self.check_related_class("new_related_object", &replacement)?;
        let items = self.opposite_object_ids();
        let old = items.get(index).cloned().ok_or_else(|| {
            CoreError::invalid_argument(
                "index",
                format!("Index {index} is out of range for '{}'.", self.id()),
            )
        })?;
        if old == replacement {
            return Ok(self.leaf(
                ModificationKind::ReplaceSame,
                Some(old),
                Some(replacement),
            ));
        }
        if items.contains(&replacement) {
            return Err(CoreError::invalid_argument(
                "new_related_object",
                format!(
                    "The object '{replacement}' is already part of '{}'.",
                    self.id()
                ),
            ));
        }
        Ok(self.leaf(
            ModificationKind::Replace { index },
            Some(old),
            Some(replacement),
        ))
    }

    /// Creates the command replacing the whole contents of a collection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if this is not a complete collection or
    /// `items` contains duplicates or objects of the wrong class.
    pub fn create_set_collection_command(&self, items: Vec<ObjectId>) -> CoreResult<Command> {
        self.check_modifiable()?;
        self.check_cardinality(Cardinality::Many)?;
        let mut seen = BTreeSet::new();
        for item in &items {
            self.check_related_class("items", item)?;
            if !seen.insert(item) {
                return Err(CoreError::invalid_argument(
                    "items",
                    format!("The object '{item}' is contained more than once."),
                ));
            }
        }
        let current = self.opposite_object_ids();
        let removed: Vec<ObjectId> = current
            .iter()
            .filter(|item| !seen.contains(item))
            .cloned()
            .collect();
        let added: Vec<ObjectId> = items
            .iter()
            .filter(|item| !current.contains(item))
            .cloned()
            .collect();
        Ok(self.leaf(
            ModificationKind::SetCollection {
                items,
                removed,
                added,
            },
            None,
            None,
        ))
    }

    /// Creates the command marking the end-point touched.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for null or incomplete end-points.
    pub fn create_touch_command(&self) -> CoreResult<Command> {
        self.check_modifiable()?;
        Ok(self.leaf(ModificationKind::Touch, None, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::end_point::RelationEndPointId;
    use crate::mapping::{CollectionKind, MappingBuilder, MappingConfiguration};
    use uuid::Uuid;

    fn mapping() -> MappingConfiguration {
        MappingBuilder::new()
            .class("Order")
            .class("OrderItem")
            .class("OrderTicket")
            .one_to_one("OrderToTicket", "OrderTicket", "Order", "Order", "OrderTicket")
            .one_to_many(
                "OrderToItems",
                "OrderItem",
                "Order",
                "Order",
                "OrderItems",
                CollectionKind::DomainObjectCollection,
            )
            .build()
            .unwrap()
    }

    fn item(n: u128) -> ObjectId {
        ObjectId::new("OrderItem", Uuid::from_u128(n))
    }

    fn order() -> ObjectId {
        ObjectId::new("Order", Uuid::from_u128(1))
    }

    fn items_end_point(items: Vec<ObjectId>) -> RelationEndPoint {
        let id = RelationEndPointId::for_property(&mapping(), &order(), "OrderItems").unwrap();
        let mut ep = RelationEndPoint::empty_virtual(id).unwrap();
        ep.mark_data_complete(items.clone(), items);
        ep
    }

    fn modification(command: &Command) -> &ModificationCommand {
        match command {
            Command::Modification(m) => m,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn null_end_point_cannot_be_modified() {
        let id = RelationEndPointId::for_property(&mapping(), &order(), "OrderTicket").unwrap();
        let null = RelationEndPoint::null(RelationEndPointId::new(None, id.definition().clone()));
        let error = null.create_set_command(None).unwrap_err();
        assert!(error
            .to_string()
            .starts_with("Modified end point is null"));
    }

    #[test]
    fn incomplete_end_point_cannot_be_modified() {
        let id = RelationEndPointId::for_property(&mapping(), &order(), "OrderTicket").unwrap();
        let ep = RelationEndPoint::incomplete_virtual(id).unwrap();
        assert!(matches!(
            ep.create_touch_command(),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn set_same_is_detected() {
        let id = RelationEndPointId::for_property(&mapping(), &order(), "OrderTicket").unwrap();
        let ep = RelationEndPoint::empty_virtual(id).unwrap();
        let command = ep.create_set_command(None).unwrap();
        assert_eq!(modification(&command).kind(), &ModificationKind::SetSame);
    }

    #[test]
    fn set_rejects_wrong_class_and_collections() {
        let id = RelationEndPointId::for_property(&mapping(), &order(), "OrderTicket").unwrap();
        let ep = RelationEndPoint::empty_virtual(id).unwrap();
        assert!(ep.create_set_command(Some(item(1))).is_err());

        let items = items_end_point(vec![]);
        assert!(items.create_set_command(None).is_err());
    }

    #[test]
    fn collection_commands_validate_membership() {
        let ep = items_end_point(vec![item(1), item(2)]);

        assert!(ep.create_remove_command(&item(3)).is_err());
        assert!(ep.create_insert_command(item(1), 0).is_err());
        assert!(ep.create_insert_command(item(3), 5).is_err());
        assert!(ep.create_replace_command(2, item(3)).is_err());
        assert!(ep.create_replace_command(0, item(2)).is_err());

        let add = ep.create_add_command(item(3)).unwrap();
        assert_eq!(
            modification(&add).kind(),
            &ModificationKind::Insert { index: 2 }
        );

        let same = ep.create_replace_command(1, item(2)).unwrap();
        assert_eq!(modification(&same).kind(), &ModificationKind::ReplaceSame);
    }

    #[test]
    fn set_collection_computes_delta() {
        let ep = items_end_point(vec![item(1), item(2)]);
        let command = ep
            .create_set_collection_command(vec![item(2), item(3)])
            .unwrap();
        match modification(&command).kind() {
            ModificationKind::SetCollection { removed, added, .. } => {
                assert_eq!(removed, &vec![item(1)]);
                assert_eq!(added, &vec![item(3)]);
            }
            other => panic!("unexpected kind: {other:?}"),
        }

        assert!(ep
            .create_set_collection_command(vec![item(3), item(3)])
            .is_err());
    }
}
