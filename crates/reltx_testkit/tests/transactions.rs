//! Commit, rollback and re-iteration of committing notifications.

use reltx_core::events::CommitContext;
use reltx_core::{
    ClientTransactionListener, Config, CoreError, CoreResult, ObjectEventHandler, ObjectId,
    ObjectState, TransactionId, Value,
};
use reltx_testkit::prelude::*;
use std::sync::Arc;

fn snapshot(h: &mut TestHierarchy) -> GraphSnapshot {
    let root = h.root().unwrap();
    h.execute(root, |ctx| GraphSnapshot::capture(ctx, &seeded_objects()))
        .unwrap()
}

fn transaction_events(h: &TestHierarchy) -> Vec<String> {
    h.events()
        .into_iter()
        .filter(|event| {
            ["committing", "committed", "rolling back", "rolled back"]
                .iter()
                .any(|prefix| event.starts_with(prefix))
        })
        .collect()
}

fn move_ticket(h: &mut TestHierarchy) {
    let root = h.root().unwrap();
    h.execute(root, |ctx| {
        ctx.set_related_object(&order(1), "OrderTicket", Some(&order_ticket(2)))?;
        ctx.set_property_value(&order(1), "OrderNumber", Value::Integer(10))
    })
    .unwrap();
}

#[test]
fn commit_persists_relations_and_values() {
    let mut h = TestHierarchy::seeded();
    let root = h.root().unwrap();
    move_ticket(&mut h);
    h.commit(root).unwrap();

    for object in [order(1), order(5), order_ticket(2)] {
        assert_eq!(h.object_state(root, &object).unwrap(), ObjectState::Unchanged);
    }
    assert!(h.data(root).unwrap().changed_object_ids().is_empty());
    let committed = snapshot(&mut h);

    let mut reopened = h.reopen();
    assert_eq!(snapshot(&mut reopened), committed);
    assert_eq!(
        committed.related(&order(1), "OrderTicket").unwrap(),
        ["OrderTicket2"]
    );
    let reopened_root = reopened.root().unwrap();
    let number = reopened
        .execute(reopened_root, |ctx| ctx.property_value(&order(1), "OrderNumber"))
        .unwrap();
    assert_eq!(number, Value::Integer(10));
}

#[test]
fn unloaded_previous_partner_takes_part_in_commit_and_rollback() {
    for commit in [true, false] {
        let mut h = TestHierarchy::seeded();
        let root = h.root().unwrap();
        h.execute(root, |ctx| {
            ctx.set_related_object(&order(1), "OrderTicket", Some(&order_ticket(2)))
        })
        .unwrap();

        let data = h.data(root).unwrap();
        assert!(data.containers().get(&order(5)).is_none());
        assert_eq!(data.object_state(&order(5)), ObjectState::Changed);
        assert_eq!(
            data.changed_object_ids(),
            [order(1), order(5), order_ticket(2)]
        );

        h.clear_events();
        if commit {
            h.commit(root).unwrap();
        } else {
            h.rollback(root).unwrap();
        }
        let events = transaction_events(&h);
        assert_eq!(events.len(), 2, "{events:?}");
        for event in &events {
            assert!(event.contains("Order5"), "{event}");
        }
        assert_eq!(h.object_state(root, &order(5)).unwrap(), ObjectState::Unchanged);
        let expected = if commit { None } else { Some(order_ticket(2)) };
        let related = h
            .execute(root, |ctx| ctx.get_related_object(&order(5), "OrderTicket"))
            .unwrap();
        assert_eq!(related, expected);
    }
}

#[test]
fn commit_notifies_every_changed_object_once() {
    let mut h = TestHierarchy::seeded();
    let root = h.root().unwrap();
    move_ticket(&mut h);
    h.clear_events();
    h.commit(root).unwrap();

    let events = transaction_events(&h);
    assert_eq!(events.len(), 2, "{events:?}");
    for event in &events {
        for object in ["Order1", "Order5", "OrderTicket2"] {
            assert!(event.contains(object), "{event}");
        }
    }
    assert!(events[0].starts_with("committing"));
    assert!(events[1].starts_with("committed"));
}

#[test]
fn commit_writes_new_and_deleted_objects() {
    let mut h = TestHierarchy::seeded();
    let root = h.root().unwrap();
    let new_order = h
        .execute(root, |ctx| {
            let new_order = ctx.new_object("Order")?;
            ctx.set_property_value(&new_order, "OrderNumber", Value::Integer(42))?;
            ctx.add_related_object(&new_order, "OrderItems", &order_item(4))?;
            ctx.delete_object(&order(2))?;
            Ok(new_order)
        })
        .unwrap();
    h.commit(root).unwrap();
    assert_eq!(h.object_state(root, &order(2)).unwrap(), ObjectState::Invalid);

    let mut reopened = h.reopen();
    let root = reopened.root().unwrap();
    reopened
        .execute(root, |ctx| {
            assert_eq!(
                ctx.property_value(&new_order, "OrderNumber")?,
                Value::Integer(42)
            );
            assert_eq!(
                ctx.get_related_objects(&new_order, "OrderItems")?,
                [order_item(4)]
            );
            assert_eq!(ctx.get_related_object(&order_item(3), "Order")?, None);
            assert_eq!(ctx.get_related_objects(&customer(1), "Orders")?, [order(1)]);
            Ok(())
        })
        .unwrap();
    let missing = reopened.execute(root, |ctx| ctx.ensure_data_available(&order(2)));
    assert!(matches!(missing, Err(CoreError::ObjectNotFound { .. })));
}

#[test]
fn rollback_restores_the_loaded_state() {
    let mut h = TestHierarchy::seeded();
    let root = h.root().unwrap();
    let before = snapshot(&mut h);

    move_ticket(&mut h);
    let new_item = h
        .execute(root, |ctx| {
            let item = ctx.new_object("OrderItem")?;
            ctx.set_related_object(&item, "Order", Some(&order(1)))?;
            ctx.delete_object(&order(3))?;
            Ok(item)
        })
        .unwrap();
    h.rollback(root).unwrap();

    assert_eq!(snapshot(&mut h), before);
    assert_eq!(h.object_state(root, &new_item).unwrap(), ObjectState::Invalid);
    assert_eq!(h.object_state(root, &order(3)).unwrap(), ObjectState::Unchanged);
    let number = h
        .execute(root, |ctx| ctx.property_value(&order(1), "OrderNumber"))
        .unwrap();
    assert_eq!(number, Value::Integer(1));
    assert!(h.data(root).unwrap().changed_object_ids().is_empty());
}

#[test]
fn rolled_back_notification_excludes_new_objects() {
    let mut h = TestHierarchy::seeded();
    let root = h.root().unwrap();
    h.execute(root, |ctx| {
        ctx.new_object("Customer")?;
        ctx.set_property_value(&order(2), "OrderNumber", Value::Integer(20))
    })
    .unwrap();
    h.clear_events();
    h.rollback(root).unwrap();

    let events = transaction_events(&h);
    assert_eq!(events.len(), 2, "{events:?}");
    assert!(events[0].starts_with("rolling back") && events[0].contains("Customer"));
    assert_eq!(events[1], "rolled back [Order2]");
}

/// Marks another object for commit whenever its own object commits or
/// rolls back.
struct AlsoRegister {
    other: ObjectId,
}

impl ObjectEventHandler for AlsoRegister {
    fn committing(&self, _tx: TransactionId, context: &mut CommitContext<'_>) -> CoreResult<()> {
        context.register_for_commit(&self.other)
    }

    fn rolling_back(&self, _tx: TransactionId, context: &mut CommitContext<'_>) -> CoreResult<()> {
        context.register_for_commit(&self.other)
    }
}

fn with_also_register(config: Config) -> TestHierarchy {
    let mut h = TestHierarchy::seeded_with_config(config);
    let root = h.root().unwrap();
    h.execute(root, |ctx| {
        ctx.ensure_data_available(&customer(1))?;
        ctx.set_property_value(&order(1), "OrderNumber", Value::Integer(11))
    })
    .unwrap();
    h.add_object_handler(
        root,
        order(1),
        Arc::new(AlsoRegister { other: customer(1) }),
    )
    .unwrap();
    h.clear_events();
    h
}

#[test]
fn objects_registered_while_committing_get_another_pass() {
    let mut h = with_also_register(Config::default());
    let root = h.root().unwrap();
    h.commit(root).unwrap();

    assert_eq!(
        transaction_events(&h),
        [
            "committing [Order1]",
            "committing [Customer1]",
            "committed [Order1, Customer1]",
        ]
    );
    assert_eq!(h.object_state(root, &customer(1)).unwrap(), ObjectState::Unchanged);
}

#[test]
fn objects_registered_while_rolling_back_get_another_pass() {
    let mut h = with_also_register(Config::default());
    let root = h.root().unwrap();
    h.rollback(root).unwrap();

    assert_eq!(
        transaction_events(&h),
        [
            "rolling back [Order1]",
            "rolling back [Customer1]",
            "rolled back [Order1, Customer1]",
        ]
    );
    assert_eq!(h.object_state(root, &customer(1)).unwrap(), ObjectState::Unchanged);
    assert_eq!(h.object_state(root, &order(1)).unwrap(), ObjectState::Unchanged);
}

#[test]
fn reiteration_is_bounded() {
    let mut h = with_also_register(Config::new().max_reiteration_passes(1));
    let root = h.root().unwrap();

    assert_eq!(
        h.commit(root),
        Err(CoreError::ReiterationLimitExceeded { passes: 1 })
    );
    assert!(!h.events().iter().any(|event| event.starts_with("committed")));

    let mut reopened = h.reopen();
    let reopened_root = reopened.root().unwrap();
    let number = reopened
        .execute(reopened_root, |ctx| ctx.property_value(&order(1), "OrderNumber"))
        .unwrap();
    assert_eq!(number, Value::Integer(1));
}

struct VetoCommit;

impl ClientTransactionListener for VetoCommit {
    fn transaction_committing(
        &self,
        _tx: TransactionId,
        _objects: &[ObjectId],
        _context: &mut CommitContext<'_>,
    ) -> CoreResult<()> {
        Err(CoreError::listener_aborted("commits are disabled"))
    }
}

#[test]
fn a_vetoed_commit_persists_nothing() {
    let mut h = TestHierarchy::seeded();
    let root = h.root().unwrap();
    move_ticket(&mut h);
    h.add_transaction_handler(root, Arc::new(VetoCommit)).unwrap();

    assert!(h.commit(root).unwrap_err().is_listener_abort());
    assert_eq!(h.object_state(root, &order(1)).unwrap(), ObjectState::Changed);

    let mut reopened = h.reopen();
    let seeded = snapshot(&mut reopened);
    assert_eq!(
        seeded.related(&order(5), "OrderTicket").unwrap(),
        ["OrderTicket2"]
    );
}

#[test]
fn commit_can_verify_consistency_first() {
    let mut h = TestHierarchy::seeded_with_config(Config::new().verify_consistency_on_commit(true));
    let root = h.root().unwrap();
    move_ticket(&mut h);
    h.execute(root, |ctx| {
        ctx.set_related_objects(&order(1), "OrderItems", vec![order_item(3)])
    })
    .unwrap();
    h.commit(root).unwrap();

    let mut reopened = h.reopen();
    let persisted = snapshot(&mut reopened);
    assert_eq!(persisted.related(&order(1), "OrderItems").unwrap(), ["OrderItem3"]);
    assert_eq!(persisted.related(&order(2), "OrderItems").unwrap(), [] as [&str; 0]);
}

#[test]
fn handlers_can_adjust_values_while_committing() {
    struct Stamp;

    impl ClientTransactionListener for Stamp {
        fn transaction_committing(
            &self,
            _tx: TransactionId,
            objects: &[ObjectId],
            context: &mut CommitContext<'_>,
        ) -> CoreResult<()> {
            for object in objects {
                if object.class_id().as_str() == "Order" {
                    context.set_value(object, "OrderNumber", Value::Integer(99))?;
                }
            }
            Ok(())
        }
    }

    let mut h = TestHierarchy::seeded();
    let root = h.root().unwrap();
    h.add_transaction_handler(root, Arc::new(Stamp)).unwrap();
    h.execute(root, |ctx| {
        ctx.set_property_value(&order(3), "OrderNumber", Value::Integer(30))
    })
    .unwrap();
    h.commit(root).unwrap();

    let mut reopened = h.reopen();
    let reopened_root = reopened.root().unwrap();
    let number = reopened
        .execute(reopened_root, |ctx| ctx.property_value(&order(3), "OrderNumber"))
        .unwrap();
    assert_eq!(number, Value::Integer(99));
}
