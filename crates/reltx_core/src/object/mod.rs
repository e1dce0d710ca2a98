//! Object identity and property values.

mod id;
mod value;

pub use id::{ClassId, ObjectId};
pub use value::Value;
