//! Error types for reltx core.

use crate::end_point::RelationEndPointId;
use crate::object::ObjectId;
use crate::types::TransactionId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in reltx core operations.
///
/// Lookups of unregistered objects or end-points are not errors; they
/// return `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] reltx_storage::StorageError),

    /// An argument does not satisfy the operation's preconditions.
    #[error("{message}\nParameter name: {parameter}")]
    InvalidArgument {
        /// Name of the offending parameter.
        parameter: String,
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// A relation change would leave the object graph inconsistent.
    #[error("{message}")]
    ConsistencyViolation {
        /// Full description, naming every offending end-point.
        message: String,
        /// The offending end-points.
        end_points: Vec<RelationEndPointId>,
    },

    /// Several independent failures collected before execution.
    #[error("{} errors occurred:\n{}", .errors.len(), join_messages(.errors))]
    Aggregated {
        /// The collected errors, in discovery order.
        errors: Vec<CoreError>,
    },

    /// An error occurred and cleanup failed as well.
    #[error("fatal error: {error}; cleanup failed with: {cleanup_error}")]
    FatalExecution {
        /// The error that triggered cleanup.
        error: Box<CoreError>,
        /// The error raised while cleaning up.
        cleanup_error: Box<CoreError>,
    },

    /// Object could not be found in this transaction or its source.
    #[error("object '{object_id}' could not be found")]
    ObjectNotFound {
        /// The missing object.
        object_id: ObjectId,
    },

    /// Object has been deleted in this transaction.
    #[error("object '{object_id}' is already deleted")]
    ObjectDeleted {
        /// The deleted object.
        object_id: ObjectId,
    },

    /// Object has been discarded and can no longer be used.
    #[error("object '{object_id}' is invalid in this transaction")]
    ObjectInvalid {
        /// The invalidated object.
        object_id: ObjectId,
    },

    /// Transaction was discarded.
    #[error("transaction {transaction} has been discarded")]
    TransactionDiscarded {
        /// The discarded transaction.
        transaction: TransactionId,
    },

    /// Class is not part of the mapping.
    #[error("class '{class}' is not mapped")]
    UnknownClass {
        /// Name of the class.
        class: String,
    },

    /// Property is not defined on the class.
    #[error("class '{class}' does not define property '{property}'")]
    UnknownProperty {
        /// Name of the class.
        class: String,
        /// Name of the property.
        property: String,
    },

    /// A listener vetoed the pending operation.
    #[error("operation aborted by listener: {message}")]
    ListenerAborted {
        /// Reason given by the listener.
        message: String,
    },

    /// Commit or rollback kept producing new dirty objects.
    #[error("commit/rollback did not settle after {passes} passes")]
    ReiterationLimitExceeded {
        /// Number of passes performed.
        passes: usize,
    },
}

fn join_messages(errors: &[CoreError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a consistency violation error.
    pub fn consistency_violation(
        message: impl Into<String>,
        end_points: Vec<RelationEndPointId>,
    ) -> Self {
        Self::ConsistencyViolation {
            message: message.into(),
            end_points,
        }
    }

    /// Creates a listener veto.
    pub fn listener_aborted(message: impl Into<String>) -> Self {
        Self::ListenerAborted {
            message: message.into(),
        }
    }

    /// Creates an object not found error.
    pub fn object_not_found(object_id: &ObjectId) -> Self {
        Self::ObjectNotFound {
            object_id: object_id.clone(),
        }
    }

    /// Creates an object deleted error.
    pub fn object_deleted(object_id: &ObjectId) -> Self {
        Self::ObjectDeleted {
            object_id: object_id.clone(),
        }
    }

    /// Creates an object invalid error.
    pub fn object_invalid(object_id: &ObjectId) -> Self {
        Self::ObjectInvalid {
            object_id: object_id.clone(),
        }
    }

    /// Combines several errors into one.
    ///
    /// A single error is returned unchanged.
    #[must_use]
    pub fn aggregate(mut errors: Vec<CoreError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Self::Aggregated { errors }
        }
    }

    /// Pairs a failure with the error raised while cleaning up after it.
    #[must_use]
    pub fn fatal(error: CoreError, cleanup_error: CoreError) -> Self {
        Self::FatalExecution {
            error: Box::new(error),
            cleanup_error: Box::new(cleanup_error),
        }
    }

    /// Returns `true` for errors produced by a listener veto.
    #[must_use]
    pub fn is_listener_abort(&self) -> bool {
        matches!(self, Self::ListenerAborted { .. })
    }
}
