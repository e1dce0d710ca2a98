//! Relation end-points and their registry.
//!
//! An end-point is one side of a relation owned by one object:
//! - real end-points hold the foreign key and live as long as their
//!   object's data container
//! - virtual end-points are computed from the real end-points pointing at
//!   their owner and may be registered before their contents are loaded
//!
//! Null variants stand in for "no related object" so callers never branch
//! on absent end-points.

mod collection;
mod commands;
mod id;
mod loader;
mod manager;
mod real;
mod relation;
mod tracked;
mod virtual_object;

pub use collection::CollectionEndPoint;
pub use id::RelationEndPointId;
pub use loader::LazyLoader;
pub use manager::RelationEndPointManager;
pub use real::RealObjectEndPoint;
pub use relation::RelationEndPoint;
pub use virtual_object::VirtualObjectEndPoint;
