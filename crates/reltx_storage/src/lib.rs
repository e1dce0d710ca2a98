//! # reltx Storage
//!
//! Record storage backends for reltx.
//!
//! This crate provides the lowest-level persistence abstraction used by the
//! transaction core. Backends are **opaque record stores** - they keep flat
//! property maps keyed by `(class, id)` and can answer one query: which
//! records of a class reference a given record through a given property.
//!
//! ## Design Principles
//!
//! - Backends know nothing about relation end-points, transactions or events
//! - The core owns all interpretation of classes, properties and references
//! - Must be `Send + Sync` so a backend can be shared by several transaction trees
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral datasets
//!
//! ## Example
//!
//! ```rust
//! use reltx_storage::{InMemoryBackend, Record, RecordChange, RecordKey, StorageBackend};
//! use uuid::Uuid;
//!
//! let backend = InMemoryBackend::new();
//! let key = RecordKey::new("Order", Uuid::from_u128(1));
//! backend.apply(&[RecordChange::Put(Record::new(key.clone()))]).unwrap();
//! assert!(backend.load(&key).unwrap().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod record;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryBackend;
pub use record::{Record, RecordChange, RecordKey, StoredValue};
