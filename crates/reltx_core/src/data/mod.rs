//! Data container store: raw property values and lifecycle state per object.

mod container;
mod map;

pub use container::{DataContainer, DataContainerState};
pub use map::DataContainerMap;
