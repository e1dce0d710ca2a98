//! Transactions: a root transaction, its sub-transactions, commit and
//! rollback, and the object operations run inside them.

mod commit;
mod data_manager;
mod hierarchy;
mod init_context;
mod operations;
mod scope;
mod source;

pub use data_manager::{DataManager, ObjectState};
pub use hierarchy::TransactionHierarchy;
pub use init_context::ObjectReferenceInitializationContext;
pub use scope::{execute_in_current_scope, execute_in_scope, ScopeBehavior, TransactionScope};
pub use source::{ObjectSource, StorageSource};
