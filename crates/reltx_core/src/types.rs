//! Core type definitions for reltx.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a transaction within a process.
///
/// Transaction IDs are monotonically increasing and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Identifier for a transaction hierarchy (one root and its sub-transactions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HierarchyId(pub u64);

impl HierarchyId {
    /// Creates a new hierarchy ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HierarchyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hier:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_display() {
        assert_eq!(TransactionId::new(42).to_string(), "txn:42");
        assert_eq!(TransactionId::new(7).as_u64(), 7);
    }

    #[test]
    fn hierarchy_id_display() {
        assert_eq!(HierarchyId::new(3).to_string(), "hier:3");
    }

    #[test]
    fn transaction_ids_are_ordered() {
        assert!(TransactionId::new(1) < TransactionId::new(2));
    }
}
