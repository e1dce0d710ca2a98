//! Property-based test generators using proptest.
//!
//! Strategies produce relation operations over the objects of the seeded
//! backend (see [`crate::fixtures`]). Generated operations are not always
//! valid; invalid ones are rejected by the core before anything changes.

use crate::fixtures::{computer, customer, employee, order, order_item, order_ticket};
use reltx_core::{CommandContext, CoreResult, ObjectId, Value};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// One relation operation on the seeded objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationOp {
    /// `Order<order>.OrderTicket = OrderTicket<ticket>` (virtual side).
    SetTicket {
        /// Order number.
        order: u128,
        /// Ticket number, `None` clears.
        ticket: Option<u128>,
    },
    /// `OrderTicket<ticket>.Order = Order<order>` (real side).
    SetTicketOrder {
        /// Ticket number.
        ticket: u128,
        /// Order number, `None` clears.
        order: Option<u128>,
    },
    /// `OrderItem<item>.Order = Order<order>`.
    SetItemOrder {
        /// Item number.
        item: u128,
        /// Order number, `None` clears.
        order: Option<u128>,
    },
    /// Inserts `OrderItem<item>` into `Order<order>.OrderItems`.
    InsertItem {
        /// Order number.
        order: u128,
        /// Target position.
        index: usize,
        /// Item number.
        item: u128,
    },
    /// Removes `OrderItem<item>` from `Order<order>.OrderItems`.
    RemoveItem {
        /// Order number.
        order: u128,
        /// Item number.
        item: u128,
    },
    /// Replaces position `index` of `Order<order>.OrderItems`.
    ReplaceItem {
        /// Order number.
        order: u128,
        /// Replaced position.
        index: usize,
        /// Item number.
        item: u128,
    },
    /// Replaces the whole of `Order<order>.OrderItems`.
    SetItems {
        /// Order number.
        order: u128,
        /// Item numbers.
        items: Vec<u128>,
    },
    /// `Order<order>.Customer = Customer<customer>`.
    SetOrderCustomer {
        /// Order number.
        order: u128,
        /// Customer number, `None` clears.
        customer: Option<u128>,
    },
    /// `Employee<employee>.Computer = Computer<computer>` (virtual side).
    SetComputer {
        /// Employee number.
        employee: u128,
        /// Computer number, `None` clears.
        computer: Option<u128>,
    },
    /// Sets `Order<order>.OrderNumber`.
    SetOrderNumber {
        /// Order number.
        order: u128,
        /// New value.
        value: i64,
    },
}

impl RelationOp {
    /// Runs the operation.
    ///
    /// # Errors
    ///
    /// Returns whatever the core rejects the operation with.
    pub fn apply(&self, ctx: &mut CommandContext<'_>) -> CoreResult<()> {
        match self {
            Self::SetTicket { order: o, ticket } => ctx.set_related_object(
                &order(*o),
                "OrderTicket",
                ticket.map(order_ticket).as_ref(),
            ),
            Self::SetTicketOrder { ticket, order: o } => ctx.set_related_object(
                &order_ticket(*ticket),
                "Order",
                o.map(order).as_ref(),
            ),
            Self::SetItemOrder { item, order: o } => {
                ctx.set_related_object(&order_item(*item), "Order", o.map(order).as_ref())
            }
            Self::InsertItem {
                order: o,
                index,
                item,
            } => ctx.insert_related_object(&order(*o), "OrderItems", *index, &order_item(*item)),
            Self::RemoveItem { order: o, item } => {
                ctx.remove_related_object(&order(*o), "OrderItems", &order_item(*item))
            }
            Self::ReplaceItem {
                order: o,
                index,
                item,
            } => ctx.replace_related_object(&order(*o), "OrderItems", *index, &order_item(*item)),
            Self::SetItems { order: o, items } => ctx.set_related_objects(
                &order(*o),
                "OrderItems",
                items.iter().copied().map(order_item).collect(),
            ),
            Self::SetOrderCustomer { order: o, customer: c } => {
                ctx.set_related_object(&order(*o), "Customer", c.map(customer).as_ref())
            }
            Self::SetComputer {
                employee: e,
                computer: c,
            } => ctx.set_related_object(&employee(*e), "Computer", c.map(computer).as_ref()),
            Self::SetOrderNumber { order: o, value } => {
                ctx.set_property_value(&order(*o), "OrderNumber", Value::Integer(*value))
            }
        }
    }

    /// Returns the objects the operation may touch.
    pub fn objects(&self) -> Vec<ObjectId> {
        match self {
            Self::SetTicket { order: o, ticket } => {
                let mut objects = vec![order(*o)];
                objects.extend(ticket.map(order_ticket));
                objects
            }
            Self::SetTicketOrder { ticket, order: o } => {
                let mut objects = vec![order_ticket(*ticket)];
                objects.extend(o.map(order));
                objects
            }
            Self::SetItemOrder { item, order: o } => {
                let mut objects = vec![order_item(*item)];
                objects.extend(o.map(order));
                objects
            }
            Self::InsertItem { order: o, item, .. }
            | Self::RemoveItem { order: o, item }
            | Self::ReplaceItem { order: o, item, .. } => vec![order(*o), order_item(*item)],
            Self::SetItems { order: o, items } => std::iter::once(order(*o))
                .chain(items.iter().copied().map(order_item))
                .collect(),
            Self::SetOrderCustomer { order: o, customer: c } => {
                let mut objects = vec![order(*o)];
                objects.extend(c.map(customer));
                objects
            }
            Self::SetComputer {
                employee: e,
                computer: c,
            } => {
                let mut objects = vec![employee(*e)];
                objects.extend(c.map(computer));
                objects
            }
            Self::SetOrderNumber { order: o, .. } => vec![order(*o)],
        }
    }
}

/// Strategy for seeded order numbers.
pub fn order_number_strategy() -> impl Strategy<Value = u128> {
    prop::sample::select(vec![1_u128, 2, 3, 5])
}

/// Strategy for seeded ticket numbers.
pub fn ticket_number_strategy() -> impl Strategy<Value = u128> {
    1_u128..=3
}

/// Strategy for seeded item numbers.
pub fn item_number_strategy() -> impl Strategy<Value = u128> {
    1_u128..=4
}

/// Strategy for a single relation operation.
pub fn relation_op_strategy() -> impl Strategy<Value = RelationOp> {
    prop_oneof![
        (order_number_strategy(), prop::option::of(ticket_number_strategy()))
            .prop_map(|(order, ticket)| RelationOp::SetTicket { order, ticket }),
        (ticket_number_strategy(), prop::option::of(order_number_strategy()))
            .prop_map(|(ticket, order)| RelationOp::SetTicketOrder { ticket, order }),
        (item_number_strategy(), prop::option::of(order_number_strategy()))
            .prop_map(|(item, order)| RelationOp::SetItemOrder { item, order }),
        (order_number_strategy(), 0_usize..4, item_number_strategy())
            .prop_map(|(order, index, item)| RelationOp::InsertItem { order, index, item }),
        (order_number_strategy(), item_number_strategy())
            .prop_map(|(order, item)| RelationOp::RemoveItem { order, item }),
        (order_number_strategy(), 0_usize..3, item_number_strategy())
            .prop_map(|(order, index, item)| RelationOp::ReplaceItem { order, index, item }),
        (
            order_number_strategy(),
            prop::collection::btree_set(item_number_strategy(), 0..4)
        )
            .prop_map(|(order, items): (u128, BTreeSet<u128>)| RelationOp::SetItems {
                order,
                items: items.into_iter().collect(),
            }),
        (order_number_strategy(), prop::option::of(1_u128..=2))
            .prop_map(|(order, customer)| RelationOp::SetOrderCustomer { order, customer }),
        (1_u128..=2, prop::option::of(1_u128..=2))
            .prop_map(|(employee, computer)| RelationOp::SetComputer { employee, computer }),
        (order_number_strategy(), -100_i64..100)
            .prop_map(|(order, value)| RelationOp::SetOrderNumber { order, value }),
    ]
}

/// Strategy for a sequence of relation operations.
pub fn relation_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<RelationOp>> {
    prop::collection::vec(relation_op_strategy(), 1..=max_len)
}

/// Strategy for property values.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
    ]
}
