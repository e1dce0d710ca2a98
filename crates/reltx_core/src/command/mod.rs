//! The command engine.
//!
//! Every relation change is expressed as a [`Command`] with a three-phase
//! lifecycle:
//!
//! 1. `begin` raises the "changing" notifications; a listener may veto
//! 2. `perform` applies the in-memory mutation
//! 3. `end` raises the "changed" notifications
//!
//! Composite commands forward `begin` and `perform` to their parts in order
//! and `end` in reverse order. Validation failures found while building a
//! command are carried as [`Command::Exception`] so several of them can be
//! reported together.

mod context;
mod expand;
mod modification;

pub use context::CommandContext;
pub use modification::{ModificationCommand, ModificationKind};

use crate::end_point::{RelationEndPoint, RelationEndPointId};
use crate::error::{CoreError, CoreResult};
use crate::events::TransactionEventSink;
use crate::object::ObjectId;

/// Orthogonal behaviour wrapped around a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandDecorator {
    /// Makes sure the modified real end-point is registered before `perform`.
    RealObjectEndPointRegistration,
    /// Raises the virtual end-point state notification after `perform`.
    VirtualEndPointStateUpdated,
}

/// A composable, three-phase operation on a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Modification of a single end-point.
    Modification(ModificationCommand),
    /// An ordered group executed as one.
    Composite(Vec<Command>),
    /// A command with extra behaviour around `perform`.
    Decorated {
        /// The added behaviour.
        decorator: CommandDecorator,
        /// The wrapped command.
        inner: Box<Command>,
    },
    /// Removes end-points from the registry.
    UnregisterEndPoints(Vec<RelationEndPointId>),
    /// Drops the contents of virtual end-points.
    UnloadVirtualEndPoints(Vec<RelationEndPointId>),
    /// Removes an object's data container.
    UnregisterDataContainer(ObjectId),
    /// Deletes an object after detaching its relations.
    DeleteObject {
        /// The deleted object.
        object: ObjectId,
        /// The relation changes detaching the object.
        relations: Box<Command>,
    },
    /// Always fails with the captured error.
    Exception(CoreError),
    /// Does nothing.
    Nop,
}

impl Command {
    /// Wraps `self` with a decorator.
    #[must_use]
    pub fn decorated(self, decorator: CommandDecorator) -> Self {
        Self::Decorated {
            decorator,
            inner: Box::new(self),
        }
    }

    /// Returns the directly nested commands.
    #[must_use]
    pub fn nested_commands(&self) -> &[Command] {
        match self {
            Self::Composite(commands) => commands,
            Self::Decorated { inner, .. } => std::slice::from_ref(inner.as_ref()),
            Self::DeleteObject { relations, .. } => std::slice::from_ref(relations.as_ref()),
            _ => &[],
        }
    }

    /// Returns the end-points an unregister or unload command works on.
    #[must_use]
    pub fn end_points(&self) -> &[RelationEndPointId] {
        match self {
            Self::UnregisterEndPoints(ids) | Self::UnloadVirtualEndPoints(ids) => ids,
            _ => &[],
        }
    }

    /// Returns the modification this command performs, looking through
    /// decorators.
    #[must_use]
    pub fn modification(&self) -> Option<&ModificationCommand> {
        match self {
            Self::Modification(modification) => Some(modification),
            Self::Decorated { inner, .. } => inner.modification(),
            _ => None,
        }
    }

    /// Returns every leaf modification in execution order.
    #[must_use]
    pub fn modifications(&self) -> Vec<&ModificationCommand> {
        let mut found = Vec::new();
        self.collect_modifications(&mut found);
        found
    }

    fn collect_modifications<'a>(&'a self, found: &mut Vec<&'a ModificationCommand>) {
        match self {
            Self::Modification(modification) => found.push(modification),
            _ => {
                for nested in self.nested_commands() {
                    nested.collect_modifications(found);
                }
            }
        }
    }

    /// Returns the errors of every nested exception command.
    #[must_use]
    pub fn exceptions(&self) -> Vec<&CoreError> {
        match self {
            Self::Exception(error) => vec![error],
            _ => self
                .nested_commands()
                .iter()
                .flat_map(Command::exceptions)
                .collect(),
        }
    }

    /// Raises the "changing" notifications.
    ///
    /// # Errors
    ///
    /// Propagates listener vetoes; exception commands fail here.
    pub fn begin(&self, ctx: &CommandContext<'_>) -> CoreResult<()> {
        match self {
            Self::Modification(modification) => modification.begin(ctx.events()),
            Self::Composite(commands) => commands.iter().try_for_each(|c| c.begin(ctx)),
            Self::Decorated { inner, .. } => inner.begin(ctx),
            Self::UnregisterDataContainer(object) => {
                ctx.events().objects_unloading(std::slice::from_ref(object))
            }
            Self::DeleteObject { object, relations } => {
                ctx.events().object_deleting(object)?;
                relations.begin(ctx)
            }
            Self::Exception(error) => Err(error.clone()),
            Self::UnregisterEndPoints(_) | Self::UnloadVirtualEndPoints(_) | Self::Nop => Ok(()),
        }
    }

    /// Applies the mutation.
    ///
    /// # Errors
    ///
    /// Propagates the first failing step; earlier steps stay performed.
    pub fn perform(&self, ctx: &mut CommandContext<'_>) -> CoreResult<()> {
        match self {
            Self::Modification(modification) => modification.perform(ctx),
            Self::Composite(commands) => commands.iter().try_for_each(|c| c.perform(ctx)),
            Self::Decorated { decorator, inner } => {
                let modified = inner.modification().map(ModificationCommand::modified_end_point);
                match (decorator, modified) {
                    (CommandDecorator::RealObjectEndPointRegistration, Some(end_point)) => {
                        register_real_end_point(end_point, ctx)?;
                        inner.perform(ctx)
                    }
                    (CommandDecorator::VirtualEndPointStateUpdated, Some(end_point)) => {
                        inner.perform(ctx)?;
                        raise_virtual_state_updated(end_point, ctx);
                        Ok(())
                    }
                    (_, None) => inner.perform(ctx),
                }
            }
            Self::UnregisterEndPoints(ids) => {
                let events = ctx.events();
                ctx.data.end_points.unregister_end_points(ids, events);
                Ok(())
            }
            Self::UnloadVirtualEndPoints(ids) => {
                ctx.data.end_points.mark_data_incomplete(ids);
                Ok(())
            }
            Self::UnregisterDataContainer(object) => {
                let events = ctx.events();
                if ctx.data.containers.contains(object) {
                    ctx.data.containers.remove(object, events)?;
                }
                Ok(())
            }
            Self::DeleteObject { object, relations } => {
                relations.perform(ctx)?;
                let events = ctx.events();
                ctx.data.delete_container(object, events)
            }
            Self::Exception(error) => Err(error.clone()),
            Self::Nop => Ok(()),
        }
    }

    /// Raises the "changed" notifications.
    pub fn end(&self, ctx: &CommandContext<'_>) {
        match self {
            Self::Modification(modification) => modification.end(ctx.events()),
            Self::Composite(commands) => {
                for command in commands.iter().rev() {
                    command.end(ctx);
                }
            }
            Self::Decorated { inner, .. } => inner.end(ctx),
            Self::UnregisterDataContainer(object) => {
                ctx.events().objects_unloaded(std::slice::from_ref(object));
            }
            Self::DeleteObject { object, relations } => {
                relations.end(ctx);
                ctx.events().object_deleted(object);
            }
            Self::UnregisterEndPoints(_)
            | Self::UnloadVirtualEndPoints(_)
            | Self::Exception(_)
            | Self::Nop => {}
        }
    }

    /// Runs `begin`, `perform` and `end`.
    ///
    /// If the command carries exceptions, nothing runs and all of them are
    /// reported together.
    ///
    /// # Errors
    ///
    /// Returns the collected exceptions, a listener veto from `begin`, or
    /// the first failure of `perform`.
    pub fn notify_and_perform(&self, ctx: &mut CommandContext<'_>) -> CoreResult<()> {
        let exceptions = self.exceptions();
        if !exceptions.is_empty() {
            return Err(CoreError::aggregate(
                exceptions.into_iter().cloned().collect(),
            ));
        }
        self.begin(ctx)?;
        self.perform(ctx)?;
        self.end(ctx);
        Ok(())
    }

    /// Expands a one-sided modification into the composite that keeps both
    /// sides of the relation consistent. Other commands are returned as
    /// they are.
    ///
    /// # Errors
    ///
    /// Propagates loading errors and invalid derived commands.
    pub fn expand_to_all_related_objects(self, ctx: &mut CommandContext<'_>) -> CoreResult<Command> {
        match self {
            Self::Modification(modification) => modification.expand(ctx),
            other => Ok(other),
        }
    }
}

/// Registers a real end-point that was unregistered while its owner stayed
/// loaded, loading the owner first if needed.
fn register_real_end_point(
    end_point: &RelationEndPointId,
    ctx: &mut CommandContext<'_>,
) -> CoreResult<()> {
    let Some(owner) = end_point.object_id() else {
        return Ok(());
    };
    if end_point.is_virtual() || ctx.data.end_points.get(end_point).is_some() {
        return Ok(());
    }
    ctx.ensure_data_container(owner)?;
    if let Some(container) = ctx.data.containers.get(owner) {
        ctx.data
            .end_points
            .ensure_real_end_point_registered(end_point, container);
    }
    Ok(())
}

fn raise_virtual_state_updated(end_point: &RelationEndPointId, ctx: &CommandContext<'_>) {
    let has_changed = ctx
        .data
        .end_points
        .get(end_point)
        .map(RelationEndPoint::has_changed);
    ctx.events()
        .virtual_end_point_state_updated(end_point, has_changed);
}
