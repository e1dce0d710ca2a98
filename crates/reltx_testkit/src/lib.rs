//! # reltx Testkit
//!
//! Test utilities for reltx.
//!
//! This crate provides:
//! - The Order/OrderTicket/OrderItem test domain and a seeded backend
//! - A hierarchy wrapper that records every raised event
//! - Graph snapshots for comparing relation states
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use reltx_testkit::prelude::*;
//!
//! let mut h = TestHierarchy::seeded();
//! let root = h.root().unwrap();
//! let ticket = h
//!     .execute(root, |ctx| ctx.get_related_object(&order(3), "OrderTicket"))
//!     .unwrap();
//! assert_eq!(ticket, Some(order_ticket(3)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod graph;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::graph::*;
}

pub use fixtures::*;
pub use generators::*;
pub use graph::*;
