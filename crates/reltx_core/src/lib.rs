//! # reltx Core
//!
//! Object graph transactions for reltx.
//!
//! This crate provides:
//! - Bidirectional relation end-points and their registry
//! - A command engine that expands one relation change into the changes of
//!   every affected end-point, with begin, perform and end phases
//! - Nested transactions with commit, rollback and discard
//! - Transaction and object notifications with veto support
//!
//! ## Example
//!
//! ```rust
//! use reltx_core::{CollectionKind, Config, MappingBuilder, TransactionHierarchy};
//! use reltx_storage::InMemoryBackend;
//! use std::sync::Arc;
//!
//! let mapping = MappingBuilder::new()
//!     .class("Order")
//!     .class("OrderItem")
//!     .one_to_many("OrderToItems", "OrderItem", "Order", "Order", "OrderItems", CollectionKind::DomainObjectCollection)
//!     .build()
//!     .unwrap();
//! let mut hierarchy = TransactionHierarchy::new(
//!     Arc::new(mapping),
//!     Arc::new(InMemoryBackend::new()),
//!     Config::default(),
//! );
//! let root = hierarchy.root().unwrap();
//!
//! hierarchy
//!     .execute(root, |ctx| {
//!         let order = ctx.new_object("Order")?;
//!         let item = ctx.new_object("OrderItem")?;
//!         ctx.set_related_object(&item, "Order", Some(&order))?;
//!         assert_eq!(ctx.get_related_objects(&order, "OrderItems")?, vec![item]);
//!         Ok(())
//!     })
//!     .unwrap();
//! hierarchy.commit(root).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
mod config;
pub mod data;
pub mod end_point;
mod error;
pub mod events;
pub mod mapping;
mod object;
pub mod transaction;
mod types;

pub use command::{Command, CommandContext};
pub use config::Config;
pub use end_point::{RelationEndPoint, RelationEndPointId, RelationEndPointManager};
pub use error::{CoreError, CoreResult};
pub use events::{
    ClientTransactionListener, EventDispatcher, EventRecorder, LoadedObjectContext,
    ObjectEventHandler, RecordedEvent,
};
pub use mapping::{Cardinality, CollectionKind, MappingBuilder, MappingConfiguration, MappingSpec};
pub use object::{ClassId, ObjectId, Value};
pub use transaction::{
    execute_in_current_scope, execute_in_scope, ObjectState, ScopeBehavior, TransactionHierarchy,
    TransactionScope,
};
pub use types::{HierarchyId, TransactionId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
