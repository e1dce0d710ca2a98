//! Context for initializing a reference to one object.

use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use crate::types::TransactionId;

/// Ties the initialization of one object reference to the root transaction
/// of its hierarchy, so loads and creations are attributable to the root
/// rather than to whichever sub-transaction happened to be active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReferenceInitializationContext {
    object_id: ObjectId,
    root_transaction: TransactionId,
    registered: Option<ObjectId>,
}

impl ObjectReferenceInitializationContext {
    pub(crate) fn new(object_id: ObjectId, root_transaction: TransactionId) -> Self {
        Self {
            object_id,
            root_transaction,
            registered: None,
        }
    }

    /// Returns the ID of the object being initialized.
    #[must_use]
    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    /// Returns the root transaction the object is enlisted in.
    #[must_use]
    pub fn root_transaction(&self) -> TransactionId {
        self.root_transaction
    }

    /// Returns the registered object, if any.
    #[must_use]
    pub fn registered_object(&self) -> Option<&ObjectId> {
        self.registered.as_ref()
    }

    /// Registers the initialized object.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `object` is not the object this context
    /// was created for, and `InvalidOperation` on a second registration.
    pub fn register_object(&mut self, object: &ObjectId) -> CoreResult<()> {
        if object != &self.object_id {
            return Err(CoreError::invalid_argument(
                "object",
                format!(
                    "The object '{object}' cannot be registered; this context initializes '{}'.",
                    self.object_id
                ),
            ));
        }
        if self.registered.is_some() {
            return Err(CoreError::invalid_operation(
                "Only one object can be registered using this context.",
            ));
        }
        self.registered = Some(object.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_exactly_once() {
        let object = ObjectId::generate("Order");
        let mut context =
            ObjectReferenceInitializationContext::new(object.clone(), TransactionId::new(1));

        context.register_object(&object).unwrap();
        assert_eq!(context.registered_object(), Some(&object));

        let error = context.register_object(&object).unwrap_err();
        assert_eq!(
            error,
            CoreError::invalid_operation("Only one object can be registered using this context.")
        );
    }

    #[test]
    fn rejects_other_objects() {
        let mut context = ObjectReferenceInitializationContext::new(
            ObjectId::generate("Order"),
            TransactionId::new(1),
        );
        assert!(matches!(
            context.register_object(&ObjectId::generate("Order")),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert!(context.registered_object().is_none());
    }
}
