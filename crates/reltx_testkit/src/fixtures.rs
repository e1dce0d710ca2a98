//! Test domain and hierarchy helpers.
//!
//! The domain has one relation of every shape:
//!
//! | Relation | Shape | Real side | Opposite side |
//! |----------|-------|-----------|---------------|
//! | `OrderToTicket` | 1:1 | `OrderTicket.Order` | `Order.OrderTicket` |
//! | `OrderToItems` | 1:n | `OrderItem.Order` | `Order.OrderItems` (domain collection) |
//! | `CustomerToOrders` | 1:n | `Order.Customer` | `Customer.Orders` (domain collection) |
//! | `EmployeeToComputer` | 1:1 | `Computer.Employee` | `Employee.Computer` |
//! | `ProductToReviews` | 1:n | `Review.Product` | `Product.Reviews` (virtual collection) |
//! | `LocationToClient` | unidirectional | `Location.Client` | anonymous |
//!
//! The seeded backend holds:
//!
//! - `Order1` (items 1 and 2, no ticket), `Order2` (item 3), `Order3`
//!   (ticket 3) and `Order5` (ticket 2)
//! - `OrderTicket1` unassigned, `OrderItem4` unassigned
//! - `Customer1` with orders 1 and 2, `Customer2` with orders 3 and 5
//! - `Employee1` using `Computer1`; `Employee2` and `Computer2` unassigned
//! - `Product1` with reviews 1 and 2; `Review3` unassigned
//! - `Location1` pointing at `Client1`; `Client2` unreferenced

use reltx_core::{
    CollectionKind, Config, EventRecorder, MappingBuilder, MappingConfiguration, ObjectId,
    TransactionHierarchy, Value,
};
use reltx_storage::{InMemoryBackend, Record, StoredValue};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use uuid::Uuid;

/// Builds the test domain mapping.
pub fn domain_mapping() -> Arc<MappingConfiguration> {
    let mapping = MappingBuilder::new()
        .class("Order")
        .class("OrderTicket")
        .class("OrderItem")
        .class("Customer")
        .class("Employee")
        .class("Computer")
        .class("Product")
        .class("Review")
        .class("Location")
        .class("Client")
        .value_property("Order", "OrderNumber", Value::Integer(0))
        .value_property("OrderTicket", "FileName", Value::Text(String::new()))
        .value_property("OrderItem", "Product", Value::Text(String::new()))
        .value_property("Customer", "Name", Value::Text(String::new()))
        .value_property("Employee", "Name", Value::Text(String::new()))
        .value_property("Computer", "SerialNumber", Value::Text(String::new()))
        .value_property("Product", "Name", Value::Text(String::new()))
        .value_property("Review", "Rating", Value::Integer(0))
        .value_property("Location", "City", Value::Text(String::new()))
        .value_property("Client", "Name", Value::Text(String::new()))
        .one_to_one("OrderToTicket", "OrderTicket", "Order", "Order", "OrderTicket")
        .one_to_many(
            "OrderToItems",
            "OrderItem",
            "Order",
            "Order",
            "OrderItems",
            CollectionKind::DomainObjectCollection,
        )
        .one_to_many(
            "CustomerToOrders",
            "Order",
            "Customer",
            "Customer",
            "Orders",
            CollectionKind::DomainObjectCollection,
        )
        .one_to_one("EmployeeToComputer", "Computer", "Employee", "Employee", "Computer")
        .one_to_many(
            "ProductToReviews",
            "Review",
            "Product",
            "Product",
            "Reviews",
            CollectionKind::VirtualCollection,
        )
        .unidirectional("LocationToClient", "Location", "Client", "Client")
        .build()
        .expect("test domain mapping is valid");
    Arc::new(mapping)
}

/// Creates the well-known ID `<class><n>`.
pub fn oid(class: &str, n: u128) -> ObjectId {
    ObjectId::new(class, Uuid::from_u128(n))
}

/// `Order<n>`.
pub fn order(n: u128) -> ObjectId {
    oid("Order", n)
}

/// `OrderTicket<n>`.
pub fn order_ticket(n: u128) -> ObjectId {
    oid("OrderTicket", n)
}

/// `OrderItem<n>`.
pub fn order_item(n: u128) -> ObjectId {
    oid("OrderItem", n)
}

/// `Customer<n>`.
pub fn customer(n: u128) -> ObjectId {
    oid("Customer", n)
}

/// `Employee<n>`.
pub fn employee(n: u128) -> ObjectId {
    oid("Employee", n)
}

/// `Computer<n>`.
pub fn computer(n: u128) -> ObjectId {
    oid("Computer", n)
}

/// `Product<n>`.
pub fn product(n: u128) -> ObjectId {
    oid("Product", n)
}

/// `Review<n>`.
pub fn review(n: u128) -> ObjectId {
    oid("Review", n)
}

/// `Location<n>`.
pub fn location(n: u128) -> ObjectId {
    oid("Location", n)
}

/// `Client<n>`.
pub fn client(n: u128) -> ObjectId {
    oid("Client", n)
}

fn record(id: &ObjectId) -> Record {
    Record::new(id.to_record_key())
}

fn reference(target: &ObjectId) -> StoredValue {
    StoredValue::Reference(target.to_record_key())
}

fn text(value: &str) -> StoredValue {
    StoredValue::Text(value.to_string())
}

/// Every object of the seeded backend.
pub fn seeded_objects() -> Vec<ObjectId> {
    vec![
        order(1),
        order(2),
        order(3),
        order(5),
        order_ticket(1),
        order_ticket(2),
        order_ticket(3),
        order_item(1),
        order_item(2),
        order_item(3),
        order_item(4),
        customer(1),
        customer(2),
        employee(1),
        employee(2),
        computer(1),
        computer(2),
        product(1),
        review(1),
        review(2),
        review(3),
        location(1),
        client(1),
        client(2),
    ]
}

/// Creates a backend holding the seeded test data.
pub fn seeded_backend() -> InMemoryBackend {
    let mut records = Vec::new();

    for (n, owner) in [(1, customer(1)), (2, customer(1)), (3, customer(2)), (5, customer(2))] {
        records.push(
            record(&order(n))
                .with("OrderNumber", StoredValue::Integer(n as i64))
                .with("Customer", reference(&owner)),
        );
    }
    records.push(record(&order_ticket(1)).with("FileName", text("ticket1.pdf")));
    records.push(
        record(&order_ticket(2))
            .with("FileName", text("ticket2.pdf"))
            .with("Order", reference(&order(5))),
    );
    records.push(
        record(&order_ticket(3))
            .with("FileName", text("ticket3.pdf"))
            .with("Order", reference(&order(3))),
    );

    for (n, owner, product_name) in [
        (1, Some(order(1)), "Mainboard"),
        (2, Some(order(1)), "CPU Fan"),
        (3, Some(order(2)), "Harddisk"),
        (4, None, "Power Supply"),
    ] {
        let mut item = record(&order_item(n)).with("Product", text(product_name));
        if let Some(owner) = owner {
            item = item.with("Order", reference(&owner));
        }
        records.push(item);
    }

    records.push(record(&customer(1)).with("Name", text("Kunde 1")));
    records.push(record(&customer(2)).with("Name", text("Kunde 2")));

    records.push(record(&employee(1)).with("Name", text("Hans")));
    records.push(record(&employee(2)).with("Name", text("Ute")));
    records.push(
        record(&computer(1))
            .with("SerialNumber", text("12345-xzy-56"))
            .with("Employee", reference(&employee(1))),
    );
    records.push(record(&computer(2)).with("SerialNumber", text("98678-abc-43")));

    records.push(record(&product(1)).with("Name", text("Keyboard")));
    for (n, owner) in [(1, Some(product(1))), (2, Some(product(1))), (3, None)] {
        let mut entry = record(&review(n)).with("Rating", StoredValue::Integer(n as i64));
        if let Some(owner) = owner {
            entry = entry.with("Product", reference(&owner));
        }
        records.push(entry);
    }

    records.push(
        record(&location(1))
            .with("City", text("Wien"))
            .with("Client", reference(&client(1))),
    );
    records.push(record(&client(1)).with("Name", text("Client 1")));
    records.push(record(&client(2)).with("Name", text("Client 2")));

    InMemoryBackend::with_records(records)
}

/// Shortens well-known IDs in `text`: `Order|00000000-…-000000000001`
/// becomes `Order1`. Other IDs are left alone.
pub fn shorten_ids(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(bar) = rest.find('|') {
        let (head, tail) = rest.split_at(bar);
        out.push_str(head);
        let uuid = tail.get(1..37).and_then(|candidate| Uuid::parse_str(candidate).ok());
        match uuid {
            Some(uuid) if uuid.as_u128() < 1_000_000 => {
                out.push_str(&uuid.as_u128().to_string());
                rest = &tail[37..];
            }
            _ => {
                out.push('|');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Returns the short name of an object, e.g. `Order1`.
pub fn short_name(id: &ObjectId) -> String {
    shorten_ids(&id.to_string())
}

/// A hierarchy over a shared in-memory backend, with an event recorder
/// attached to every transaction.
pub struct TestHierarchy {
    /// The hierarchy under test.
    pub hierarchy: TransactionHierarchy,
    /// Records every event of every level.
    pub recorder: Arc<EventRecorder>,
    /// The backend the root commits to.
    pub storage: Arc<InMemoryBackend>,
}

impl TestHierarchy {
    /// Creates a hierarchy over the seeded backend.
    pub fn seeded() -> Self {
        Self::with_storage(Arc::new(seeded_backend()), Config::default())
    }

    /// Creates a hierarchy over an empty backend.
    pub fn empty() -> Self {
        Self::with_storage(Arc::new(InMemoryBackend::new()), Config::default())
    }

    /// Creates a hierarchy over the seeded backend with a custom config.
    pub fn seeded_with_config(config: Config) -> Self {
        Self::with_storage(Arc::new(seeded_backend()), config)
    }

    /// Creates a hierarchy over `storage`.
    pub fn with_storage(storage: Arc<InMemoryBackend>, config: Config) -> Self {
        let mut hierarchy =
            TransactionHierarchy::new(domain_mapping(), storage.clone(), config);
        let recorder = Arc::new(EventRecorder::new());
        hierarchy.add_extension(recorder.clone());
        Self {
            hierarchy,
            recorder,
            storage,
        }
    }

    /// Starts a new hierarchy over the same backend, e.g. to observe what
    /// a commit persisted.
    pub fn reopen(&self) -> Self {
        Self::with_storage(Arc::clone(&self.storage), Config::default())
    }

    /// Returns the recorded events with well-known IDs shortened.
    pub fn events(&self) -> Vec<String> {
        self.recorder
            .event_kinds()
            .iter()
            .map(|event| shorten_ids(&event.to_string()))
            .collect()
    }

    /// Returns the recorded events as JSON, for trace comparisons.
    pub fn events_json(&self) -> serde_json::Value {
        serde_json::to_value(self.recorder.event_kinds()).expect("events serialize")
    }

    /// Forgets the recorded events.
    pub fn clear_events(&self) {
        self.recorder.clear();
    }
}

impl Deref for TestHierarchy {
    type Target = TransactionHierarchy;

    fn deref(&self) -> &Self::Target {
        &self.hierarchy
    }
}

impl DerefMut for TestHierarchy {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.hierarchy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reltx_storage::StorageBackend;

    #[test]
    fn shortens_well_known_ids() {
        let text = format!("relation changed: {} -> {}", order(1), order_ticket(12));
        assert_eq!(shorten_ids(&text), "relation changed: Order1 -> OrderTicket12");
    }

    #[test]
    fn keeps_random_ids() {
        let id = ObjectId::generate("Order");
        assert_eq!(short_name(&id), id.to_string());
    }

    #[test]
    fn seeded_backend_holds_every_object() {
        let backend = seeded_backend();
        assert_eq!(backend.len().unwrap(), seeded_objects().len());
        for id in seeded_objects() {
            assert!(backend.load(&id.to_record_key()).unwrap().is_some(), "{id}");
        }
    }
}
