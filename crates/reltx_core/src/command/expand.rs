//! Expansion of one-sided modifications into bidirectional composites.

use super::context::CommandContext;
use super::modification::{ModificationCommand, ModificationKind};
use super::{Command, CommandDecorator};
use crate::end_point::{RelationEndPoint, RelationEndPointId};
use crate::error::{CoreError, CoreResult};
use crate::mapping::RelationKind;
use crate::object::ObjectId;
use tracing::debug;

fn derived(command: Command, end_point: &RelationEndPoint) -> Command {
    let decorator = if end_point.is_virtual() {
        CommandDecorator::VirtualEndPointStateUpdated
    } else {
        CommandDecorator::RealObjectEndPointRegistration
    };
    command.decorated(decorator)
}

impl ModificationCommand {
    fn owner(&self) -> CoreResult<ObjectId> {
        self.modified_end_point().object_id().cloned().ok_or_else(|| {
            CoreError::invalid_argument(
                "modified_end_point",
                "Modified end point is null, a null end point modification command is needed.",
            )
        })
    }

    /// The end-point on `object` opposite to the modified one.
    fn opposite_of(
        &self,
        ctx: &mut CommandContext<'_>,
        object: &ObjectId,
    ) -> CoreResult<RelationEndPoint> {
        ctx.end_point(&self.modified_end_point().opposite(Some(object.clone())))
    }

    /// The end-point of `object` with the modified end-point's definition.
    fn same_side_of(
        &self,
        ctx: &mut CommandContext<'_>,
        object: &ObjectId,
    ) -> CoreResult<RelationEndPoint> {
        let id = RelationEndPointId::new(
            Some(object.clone()),
            self.modified_end_point().definition().clone(),
        );
        ctx.end_point(&id)
    }

    /// `item.parent = null` for an item leaving the modified collection.
    fn detach(&self, ctx: &mut CommandContext<'_>, item: &ObjectId) -> CoreResult<Command> {
        let end_point = self.opposite_of(ctx, item)?;
        Ok(derived(end_point.create_set_command(None)?, &end_point))
    }

    /// Steps moving `item` into the modified collection: removal from its
    /// previous collection, then `item.parent = owner`.
    fn attach(
        &self,
        ctx: &mut CommandContext<'_>,
        owner: &ObjectId,
        item: &ObjectId,
        steps: &mut Vec<Command>,
    ) -> CoreResult<()> {
        let item_end_point = self.opposite_of(ctx, item)?;
        if let Some(previous) = item_end_point.opposite_object_id() {
            if previous != owner {
                let previous_collection = self.same_side_of(ctx, previous)?;
                steps.push(derived(
                    previous_collection.create_remove_command(item)?,
                    &previous_collection,
                ));
            }
        }
        steps.push(derived(
            item_end_point.create_set_command(Some(owner.clone()))?,
            &item_end_point,
        ));
        Ok(())
    }

    /// Derives the commands keeping the opposite side of the relation
    /// consistent and returns them together with `self`, in execution
    /// order.
    pub(crate) fn expand(self, ctx: &mut CommandContext<'_>) -> CoreResult<Command> {
        let definition = self.modified_end_point().definition().clone();
        if !definition.is_bidirectional() || self.kind() == &ModificationKind::Touch {
            return Ok(Command::Composite(vec![Command::Modification(self)]));
        }
        let owner = self.owner()?;
        let mut before = Vec::new();
        let mut after = Vec::new();

        match self.kind().clone() {
            ModificationKind::SetSame | ModificationKind::ReplaceSame => {
                if let Some(related) = self.new_related_object().cloned() {
                    let opposite = self.opposite_of(ctx, &related)?;
                    after.push(derived(opposite.create_touch_command()?, &opposite));
                }
            }
            ModificationKind::Set if definition.relation_kind() == RelationKind::OneToOne => {
                if let Some(old) = self.old_related_object().cloned() {
                    let old_opposite = self.opposite_of(ctx, &old)?;
                    before.push(derived(old_opposite.create_set_command(None)?, &old_opposite));
                }
                if let Some(new) = self.new_related_object().cloned() {
                    let new_opposite = self.opposite_of(ctx, &new)?;
                    if let Some(partner) = new_opposite.opposite_object_id() {
                        if partner != &owner {
                            let partner_end_point = self.same_side_of(ctx, partner)?;
                            before.push(derived(
                                partner_end_point.create_set_command(None)?,
                                &partner_end_point,
                            ));
                        }
                    }
                    before.push(derived(
                        new_opposite.create_set_command(Some(owner.clone()))?,
                        &new_opposite,
                    ));
                }
            }
            ModificationKind::Set => {
                if let Some(old) = self.old_related_object().cloned() {
                    let old_collection = self.opposite_of(ctx, &old)?;
                    after.push(derived(
                        old_collection.create_remove_command(&owner)?,
                        &old_collection,
                    ));
                }
                if let Some(new) = self.new_related_object().cloned() {
                    let new_collection = self.opposite_of(ctx, &new)?;
                    after.push(derived(
                        new_collection.create_add_command(owner.clone())?,
                        &new_collection,
                    ));
                }
            }
            ModificationKind::Remove => {
                if let Some(removed) = self.old_related_object().cloned() {
                    before.push(self.detach(ctx, &removed)?);
                }
            }
            ModificationKind::Insert { .. } => {
                if let Some(inserted) = self.new_related_object().cloned() {
                    self.attach(ctx, &owner, &inserted, &mut before)?;
                }
            }
            ModificationKind::Replace { .. } => {
                if let Some(replaced) = self.old_related_object().cloned() {
                    before.push(self.detach(ctx, &replaced)?);
                }
                if let Some(replacement) = self.new_related_object().cloned() {
                    self.attach(ctx, &owner, &replacement, &mut before)?;
                }
            }
            ModificationKind::SetCollection { removed, added, .. } => {
                for item in &removed {
                    before.push(self.detach(ctx, item)?);
                }
                for item in &added {
                    self.attach(ctx, &owner, item, &mut before)?;
                }
            }
            ModificationKind::Touch => {}
        }

        let primary = self.modified_end_point().clone();
        let mut steps = before;
        steps.push(Command::Modification(self));
        steps.append(&mut after);
        debug!(end_point = %primary, steps = steps.len(), "command expanded");
        Ok(Command::Composite(steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::data::DataContainer;
    use crate::events::EventDispatcher;
    use crate::mapping::{CollectionKind, MappingBuilder, MappingConfiguration};
    use crate::object::Value;
    use crate::transaction::{DataManager, ObjectSource};
    use crate::types::TransactionId;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use uuid::Uuid;

    struct Stored(Vec<DataContainer>);

    impl ObjectSource for Stored {
        fn load_data_container(&mut self, object: &ObjectId) -> CoreResult<Option<DataContainer>> {
            Ok(self.0.iter().find(|c| c.id() == object).cloned())
        }

        fn load_related_object_ids(
            &mut self,
            end_point: &RelationEndPointId,
        ) -> CoreResult<Vec<ObjectId>> {
            let Some(owner) = end_point.object_id() else {
                return Ok(Vec::new());
            };
            let opposite = end_point.definition().opposite();
            let Some(property) = opposite.property_name() else {
                return Ok(Vec::new());
            };
            Ok(self
                .0
                .iter()
                .filter(|c| {
                    c.id().class_id() == opposite.class_id()
                        && c.foreign_key(property).as_ref() == Some(owner)
                })
                .map(|c| c.id().clone())
                .collect())
        }
    }

    fn mapping() -> Arc<MappingConfiguration> {
        Arc::new(
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
                .unwrap(),
        )
    }

    fn oid(class: &str, n: u128) -> ObjectId {
        ObjectId::new(class, Uuid::from_u128(n))
    }

    fn stored(id: ObjectId, fk: Option<(&str, ObjectId)>) -> DataContainer {
        let mut values = BTreeMap::new();
        if let Some((property, target)) = fk {
            values.insert(property.to_string(), Value::Reference(target));
        } else if id.class_id().as_str() != "Order" {
            values.insert("Order".to_string(), Value::Null);
        }
        DataContainer::existing(id, values)
    }

    struct Fixture {
        data: DataManager,
        source: Stored,
        events: EventDispatcher,
    }

    impl Fixture {
        fn new(stored: Vec<DataContainer>) -> Self {
            Self {
                data: DataManager::new(mapping(), &Config::default()),
                source: Stored(stored),
                events: EventDispatcher::new(TransactionId::new(1)),
            }
        }

        fn ctx(&mut self) -> CommandContext<'_> {
            CommandContext::new(
                TransactionId::new(1),
                TransactionId::new(1),
                &mut self.data,
                &mut self.source,
                &self.events,
            )
        }
    }

    fn ep(object: &ObjectId, property: &str) -> RelationEndPointId {
        RelationEndPointId::for_property(&mapping(), object, property).unwrap()
    }

    fn described(command: &Command) -> Vec<String> {
        command
            .modifications()
            .into_iter()
            .map(|m| {
                format!(
                    "{}.{}={}",
                    m.modified_end_point().object_id().unwrap().value().as_u128(),
                    m.modified_end_point().definition().property_name().unwrap(),
                    match m.kind() {
                        ModificationKind::Set | ModificationKind::SetSame => m
                            .new_related_object()
                            .map_or("null".to_string(), |o| o.value().as_u128().to_string()),
                        other => format!("{other:?}"),
                    }
                )
            })
            .collect()
    }

    #[test]
    fn one_to_one_set_detaches_both_previous_partners_first() {
        let order1 = oid("Order", 1);
        let order5 = oid("Order", 5);
        let ticket1 = oid("OrderTicket", 11);
        let ticket2 = oid("OrderTicket", 12);
        let mut fixture = Fixture::new(vec![
            stored(order1.clone(), None),
            stored(order5.clone(), None),
            stored(ticket1.clone(), Some(("Order", order1.clone()))),
            stored(ticket2.clone(), Some(("Order", order5.clone()))),
        ]);
        let mut ctx = fixture.ctx();

        let primary = ctx
            .end_point(&ep(&order1, "OrderTicket"))
            .unwrap()
            .create_set_command(Some(ticket2.clone()))
            .unwrap();
        let expanded = primary.expand_to_all_related_objects(&mut ctx).unwrap();

        assert_eq!(
            described(&expanded),
            vec![
                "11.Order=null",
                "5.OrderTicket=null",
                "12.Order=1",
                "1.OrderTicket=12",
            ]
        );
    }

    #[test]
    fn real_side_set_updates_collections_after_primary() {
        let order1 = oid("Order", 1);
        let order2 = oid("Order", 2);
        let item = oid("OrderItem", 21);
        let mut fixture = Fixture::new(vec![
            stored(order1.clone(), None),
            stored(order2.clone(), None),
            stored(item.clone(), Some(("Order", order1.clone()))),
        ]);
        let mut ctx = fixture.ctx();

        let primary = ctx
            .end_point(&ep(&item, "Order"))
            .unwrap()
            .create_set_command(Some(order2.clone()))
            .unwrap();
        let expanded = primary.expand_to_all_related_objects(&mut ctx).unwrap();
        let steps = expanded.modifications();

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].modified_end_point(), &ep(&item, "Order"));
        assert_eq!(steps[1].kind(), &ModificationKind::Remove);
        assert_eq!(steps[1].modified_end_point(), &ep(&order1, "OrderItems"));
        assert_eq!(steps[2].kind(), &ModificationKind::Insert { index: 0 });
        assert_eq!(steps[2].modified_end_point(), &ep(&order2, "OrderItems"));
    }

    #[test]
    fn collection_remove_clears_foreign_key_first() {
        let order = oid("Order", 1);
        let item = oid("OrderItem", 21);
        let mut fixture = Fixture::new(vec![
            stored(order.clone(), None),
            stored(item.clone(), Some(("Order", order.clone()))),
        ]);
        let mut ctx = fixture.ctx();

        let primary = ctx
            .end_point(&ep(&order, "OrderItems"))
            .unwrap()
            .create_remove_command(&item)
            .unwrap();
        let expanded = primary.expand_to_all_related_objects(&mut ctx).unwrap();

        assert_eq!(described(&expanded), vec!["21.Order=null", "1.OrderItems=Remove"]);
    }

    #[test]
    fn insert_moves_item_out_of_its_previous_collection() {
        let order1 = oid("Order", 1);
        let order2 = oid("Order", 2);
        let item = oid("OrderItem", 21);
        let mut fixture = Fixture::new(vec![
            stored(order1.clone(), None),
            stored(order2.clone(), None),
            stored(item.clone(), Some(("Order", order1.clone()))),
        ]);
        let mut ctx = fixture.ctx();

        let primary = ctx
            .end_point(&ep(&order2, "OrderItems"))
            .unwrap()
            .create_add_command(item.clone())
            .unwrap();
        let expanded = primary.expand_to_all_related_objects(&mut ctx).unwrap();

        assert_eq!(
            described(&expanded),
            vec![
                "1.OrderItems=Remove",
                "21.Order=2",
                "2.OrderItems=Insert { index: 0 }",
            ]
        );
        assert!(matches!(
            &expanded.nested_commands()[0],
            Command::Decorated {
                decorator: CommandDecorator::VirtualEndPointStateUpdated,
                ..
            }
        ));
        assert!(matches!(
            &expanded.nested_commands()[1],
            Command::Decorated {
                decorator: CommandDecorator::RealObjectEndPointRegistration,
                ..
            }
        ));
    }

    #[test]
    fn set_same_touches_the_opposite() {
        let order = oid("Order", 1);
        let ticket = oid("OrderTicket", 11);
        let mut fixture = Fixture::new(vec![
            stored(order.clone(), None),
            stored(ticket.clone(), Some(("Order", order.clone()))),
        ]);
        let mut ctx = fixture.ctx();

        let primary = ctx
            .end_point(&ep(&ticket, "Order"))
            .unwrap()
            .create_set_command(Some(order.clone()))
            .unwrap();
        let expanded = primary.expand_to_all_related_objects(&mut ctx).unwrap();
        let steps = expanded.modifications();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].kind(), &ModificationKind::SetSame);
        assert_eq!(steps[1].kind(), &ModificationKind::Touch);
        assert_eq!(steps[1].modified_end_point(), &ep(&order, "OrderTicket"));
    }
}
