//! Handle given to `loaded` handlers.

use crate::command::CommandContext;
use crate::error::{CoreError, CoreResult};
use crate::object::{ObjectId, Value};
use crate::types::TransactionId;

/// Lets a `loaded` handler initialize the object that was just loaded.
///
/// The handler runs in the transaction the object was loaded into. That
/// may be the read-only parent of a sub-transaction, so only the object
/// itself can be changed: its value properties and its unidirectional
/// relations. A sub-transaction loading the object afterwards sees the
/// initialized state as unchanged.
pub struct LoadedObjectContext<'c, 'a> {
    ctx: &'c mut CommandContext<'a>,
    object: &'c ObjectId,
}

impl<'c, 'a> LoadedObjectContext<'c, 'a> {
    pub(crate) fn new(ctx: &'c mut CommandContext<'a>, object: &'c ObjectId) -> Self {
        Self { ctx, object }
    }

    /// Returns the loaded object.
    #[must_use]
    pub fn object(&self) -> &ObjectId {
        self.object
    }

    /// Returns the transaction the object was loaded into.
    #[must_use]
    pub fn transaction(&self) -> TransactionId {
        self.ctx.transaction()
    }

    /// Returns a value property of the object.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty`.
    pub fn property_value(&mut self, property: &str) -> CoreResult<Value> {
        self.ctx.property_value(self.object, property)
    }

    /// Sets a value property of the object, raising the usual
    /// notifications.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty`, `InvalidArgument` for relation properties
    /// and listener vetoes.
    pub fn set_property_value(&mut self, property: &str, value: Value) -> CoreResult<()> {
        self.ctx.set_property_value(self.object, property, value)
    }

    /// Returns the object related through a single-object property.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for collection properties and loading
    /// errors.
    pub fn get_related_object(&mut self, property: &str) -> CoreResult<Option<ObjectId>> {
        self.ctx.get_related_object(self.object, property)
    }

    /// Sets a unidirectional relation of the object.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for bidirectional relations, whose
    /// opposite objects must not change here, and the errors of
    /// [`CommandContext::set_related_object`].
    pub fn set_related_object(
        &mut self,
        property: &str,
        related: Option<&ObjectId>,
    ) -> CoreResult<()> {
        let definition = self
            .ctx
            .data()
            .mapping()
            .end_point_definition(self.object.class_id(), property)?;
        if definition.is_bidirectional() {
            return Err(CoreError::invalid_operation(format!(
                "'{}' is bidirectional and cannot be changed while '{}' is being loaded.",
                definition.full_name(),
                self.object
            )));
        }
        self.ctx.set_related_object(self.object, property, related)
    }
}
