//! Ambient transaction scopes over the seeded domain.

use reltx_core::{
    execute_in_current_scope, execute_in_scope, CoreError, ObjectState, ScopeBehavior,
    TransactionScope, Value,
};
use reltx_testkit::prelude::*;

#[test]
fn operations_run_against_the_current_scope() {
    let mut h = TestHierarchy::seeded();
    let root = h.root().unwrap();

    let ticket = execute_in_scope(&mut h, root, ScopeBehavior::None, |hierarchy| {
        assert_eq!(TransactionScope::current(), Some(root));
        execute_in_current_scope(hierarchy, |ctx| {
            ctx.set_related_object(&order(1), "OrderTicket", Some(&order_ticket(2)))?;
            ctx.get_related_object(&order(1), "OrderTicket")
        })
    })
    .unwrap();

    assert_eq!(ticket, Some(order_ticket(2)));
    assert_eq!(TransactionScope::current(), None);
    assert_eq!(h.object_state(root, &order(1)).unwrap(), ObjectState::Changed);
}

#[test]
fn rollback_scopes_revert_on_leave() {
    let mut h = TestHierarchy::seeded();
    let root = h.root().unwrap();

    execute_in_scope(&mut h, root, ScopeBehavior::Rollback, |hierarchy| {
        execute_in_current_scope(hierarchy, |ctx| {
            ctx.set_property_value(&order(2), "OrderNumber", Value::Integer(200))
        })
    })
    .unwrap();

    let number = h
        .execute(root, |ctx| ctx.property_value(&order(2), "OrderNumber"))
        .unwrap();
    assert_eq!(number, Value::Integer(2));
    assert_eq!(h.object_state(root, &order(2)).unwrap(), ObjectState::Unchanged);
}

#[test]
fn nested_scopes_restore_the_outer_transaction() {
    let mut h = TestHierarchy::seeded();
    let root = h.root().unwrap();

    execute_in_scope(&mut h, root, ScopeBehavior::None, |hierarchy| {
        let sub = hierarchy.create_sub_transaction(root)?;
        execute_in_scope(hierarchy, sub, ScopeBehavior::Discard, |inner| {
            assert_eq!(TransactionScope::current(), Some(sub));
            execute_in_current_scope(inner, |ctx| {
                ctx.set_property_value(&order(3), "OrderNumber", Value::Integer(33))
            })
        })?;
        assert_eq!(TransactionScope::current(), Some(root));
        assert!(hierarchy.is_discarded(sub));
        Ok(())
    })
    .unwrap();

    let number = h
        .execute(root, |ctx| ctx.property_value(&order(3), "OrderNumber"))
        .unwrap();
    assert_eq!(number, Value::Integer(3));
}

#[test]
fn a_failing_body_still_leaves_the_scope() {
    let mut h = TestHierarchy::seeded();
    let root = h.root().unwrap();

    let result = execute_in_scope(&mut h, root, ScopeBehavior::Rollback, |hierarchy| {
        execute_in_current_scope(hierarchy, |ctx| {
            ctx.set_property_value(&order(1), "OrderNumber", Value::Integer(5))?;
            ctx.ensure_data_available(&order(4))
        })
    });

    assert!(matches!(result, Err(CoreError::ObjectNotFound { .. })));
    assert_eq!(TransactionScope::current(), None);
    assert_eq!(h.object_state(root, &order(1)).unwrap(), ObjectState::Unchanged);
}

#[test]
fn a_dropped_scope_is_popped_without_its_behavior() {
    let mut h = TestHierarchy::seeded();
    let root = h.root().unwrap();
    h.execute(root, |ctx| {
        ctx.set_property_value(&order(5), "OrderNumber", Value::Integer(55))
    })
    .unwrap();

    {
        let _scope = TransactionScope::enter(&h, root, ScopeBehavior::Rollback).unwrap();
        assert_eq!(TransactionScope::current(), Some(root));
    }

    assert_eq!(TransactionScope::current(), None);
    assert_eq!(h.object_state(root, &order(5)).unwrap(), ObjectState::Changed);
}

#[test]
fn scopes_of_another_hierarchy_cannot_be_left_here() {
    let mut first = TestHierarchy::seeded();
    let mut second = TestHierarchy::seeded();
    let root = first.root().unwrap();

    let scope = TransactionScope::enter(&first, root, ScopeBehavior::None).unwrap();
    assert!(matches!(
        scope.leave(&mut second),
        Err(CoreError::InvalidOperation { .. })
    ));
    assert_eq!(TransactionScope::current(), None);
    assert!(first.is_active(root));
}
