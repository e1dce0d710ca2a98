//! Mutation scripts and the runner that executes them.

use super::dataset::LoadedDataset;
use super::{CliError, CliResult};
use reltx_core::{
    Cardinality, CommandContext, Config, CoreResult, EventRecorder, ObjectId, ObjectState,
    TransactionHierarchy, TransactionId, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A script as read from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Steps, executed in order.
    pub steps: Vec<Step>,
}

impl Script {
    /// Reads a script file.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` errors.
    pub fn read(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses a script from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `Json` errors.
    pub fn parse(text: &str) -> CliResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// One script step. Objects are named by alias.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Step {
    /// Creates a new object and names it.
    Create {
        /// Name for the new object.
        alias: String,
        /// Its class.
        class: String,
    },
    /// Sets a single-object relation property; no `related` clears it.
    Set {
        /// Modified object.
        object: String,
        /// Relation property.
        property: String,
        /// New related object.
        #[serde(default)]
        related: Option<String>,
    },
    /// Sets a value property.
    SetValue {
        /// Modified object.
        object: String,
        /// Value property.
        property: String,
        /// New value.
        value: Value,
    },
    /// Inserts into a collection; no `index` appends.
    Insert {
        /// Collection owner.
        object: String,
        /// Collection property.
        property: String,
        /// Target position.
        #[serde(default)]
        index: Option<usize>,
        /// Inserted object.
        related: String,
    },
    /// Removes from a collection.
    Remove {
        /// Collection owner.
        object: String,
        /// Collection property.
        property: String,
        /// Removed object.
        related: String,
    },
    /// Replaces the member at a position.
    Replace {
        /// Collection owner.
        object: String,
        /// Collection property.
        property: String,
        /// Replaced position.
        index: usize,
        /// Replacement.
        related: String,
    },
    /// Replaces the whole collection.
    SetCollection {
        /// Collection owner.
        object: String,
        /// Collection property.
        property: String,
        /// New members, in order.
        related: Vec<String>,
    },
    /// Deletes an object.
    Delete {
        /// Deleted object.
        object: String,
    },
    /// Unloads an unchanged object.
    Unload {
        /// Unloaded object.
        object: String,
    },
    /// Commits the active transaction.
    Commit,
    /// Rolls back the active transaction.
    Rollback,
    /// Opens a sub-transaction of the active transaction.
    BeginSub,
    /// Commits the active sub-transaction into its parent and closes it.
    CommitSub,
    /// Discards the active sub-transaction.
    DiscardSub,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { alias, class } => write!(f, "create {alias}: {class}"),
            Self::Set {
                object,
                property,
                related,
            } => write!(
                f,
                "set {object}.{property} = {}",
                related.as_deref().unwrap_or("null")
            ),
            Self::SetValue {
                object,
                property,
                value,
            } => write!(f, "set {object}.{property} = {value}"),
            Self::Insert {
                object,
                property,
                index: Some(index),
                related,
            } => write!(f, "insert {related} into {object}.{property} at {index}"),
            Self::Insert {
                object,
                property,
                index: None,
                related,
            } => write!(f, "add {related} to {object}.{property}"),
            Self::Remove {
                object,
                property,
                related,
            } => write!(f, "remove {related} from {object}.{property}"),
            Self::Replace {
                object,
                property,
                index,
                related,
            } => write!(f, "replace {object}.{property}[{index}] with {related}"),
            Self::SetCollection {
                object,
                property,
                related,
            } => write!(f, "set {object}.{property} = [{}]", related.join(", ")),
            Self::Delete { object } => write!(f, "delete {object}"),
            Self::Unload { object } => write!(f, "unload {object}"),
            Self::Commit => f.write_str("commit"),
            Self::Rollback => f.write_str("rollback"),
            Self::BeginSub => f.write_str("begin sub-transaction"),
            Self::CommitSub => f.write_str("commit sub-transaction"),
            Self::DiscardSub => f.write_str("discard sub-transaction"),
        }
    }
}

/// What one step did.
#[derive(Debug, Clone, Serialize)]
pub struct StepTrace {
    /// 1-based position in the script.
    pub index: usize,
    /// The step, described.
    pub step: String,
    /// Nesting level of the transaction the step ran in; 0 is the root.
    pub level: usize,
    /// Raised events, with aliases in place of IDs.
    pub events: Vec<String>,
    /// Why the step failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// State of one named object after the script.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectReport {
    /// The object's alias.
    pub alias: String,
    /// Its class.
    pub class: String,
    /// Its state in the active transaction.
    pub state: String,
    /// Value properties; empty for deleted and invalid objects.
    pub values: BTreeMap<String, String>,
    /// Related aliases by relation property.
    pub relations: BTreeMap<String, Vec<String>>,
}

/// The outcome of a script run.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    /// One entry per step.
    pub steps: Vec<StepTrace>,
    /// Every named object, in definition order.
    pub objects: Vec<ObjectReport>,
}

impl Trace {
    /// Returns the number of failed steps.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|step| step.error.is_some()).count()
    }
}

/// Executes script steps against one transaction hierarchy.
pub struct ScriptRunner {
    hierarchy: TransactionHierarchy,
    recorder: Arc<EventRecorder>,
    aliases: Vec<(String, ObjectId)>,
    /// Open transactions, root first.
    stack: Vec<TransactionId>,
}

impl ScriptRunner {
    /// Creates a runner over a loaded dataset.
    ///
    /// # Errors
    ///
    /// Returns `Core` errors if the hierarchy has no root.
    pub fn new(dataset: LoadedDataset, config: Config) -> CliResult<Self> {
        let mut hierarchy = TransactionHierarchy::new(dataset.mapping, dataset.storage, config);
        let recorder = Arc::new(EventRecorder::new());
        hierarchy.add_extension(recorder.clone());
        let root = hierarchy.root()?;
        Ok(Self {
            hierarchy,
            recorder,
            aliases: dataset.aliases,
            stack: vec![root],
        })
    }

    /// Runs every step and reports the final object states.
    ///
    /// Failed steps are recorded in the trace; later steps still run.
    ///
    /// # Errors
    ///
    /// Returns `Core` errors raised while building the final report.
    pub fn run(mut self, script: &Script) -> CliResult<Trace> {
        self.recorder.clear();
        let mut steps = Vec::with_capacity(script.steps.len());
        for (position, step) in script.steps.iter().enumerate() {
            let level = self.stack.len() - 1;
            let result = self.step(step);
            let events = self
                .recorder
                .take()
                .into_iter()
                .map(|(_, event)| self.render(&event.to_string()))
                .collect();
            let error = result.err().map(|error| self.render(&error.to_string()));
            if let Some(error) = &error {
                debug!(step = position + 1, %error, "script step failed");
            }
            steps.push(StepTrace {
                index: position + 1,
                step: step.to_string(),
                level,
                events,
                error,
            });
        }
        let objects = self.report()?;
        info!(steps = steps.len(), objects = objects.len(), "script finished");
        Ok(Trace { steps, objects })
    }

    fn active(&self) -> CliResult<TransactionId> {
        self.stack
            .last()
            .copied()
            .ok_or(CliError::NoSubTransaction)
    }

    fn id(&self, alias: &str) -> CliResult<ObjectId> {
        self.aliases
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, id)| id.clone())
            .ok_or_else(|| CliError::UnknownAlias(alias.to_string()))
    }

    fn ids(&self, aliases: &[String]) -> CliResult<Vec<ObjectId>> {
        aliases.iter().map(|alias| self.id(alias)).collect()
    }

    fn execute<R>(
        &mut self,
        f: impl FnOnce(&mut CommandContext<'_>) -> CoreResult<R>,
    ) -> CliResult<R> {
        let tx = self.active()?;
        Ok(self.hierarchy.execute(tx, f)?)
    }

    fn step(&mut self, step: &Step) -> CliResult<()> {
        match step {
            Step::Create { alias, class } => {
                if self.aliases.iter().any(|(name, _)| name == alias) {
                    return Err(CliError::DuplicateAlias(alias.clone()));
                }
                let class = class.clone();
                let id = self.execute(|ctx| ctx.new_object(class))?;
                self.aliases.push((alias.clone(), id));
                Ok(())
            }
            Step::Set {
                object,
                property,
                related,
            } => {
                let object = self.id(object)?;
                let related = related.as_deref().map(|alias| self.id(alias)).transpose()?;
                self.execute(|ctx| ctx.set_related_object(&object, property, related.as_ref()))
            }
            Step::SetValue {
                object,
                property,
                value,
            } => {
                let object = self.id(object)?;
                let value = value.clone();
                self.execute(|ctx| ctx.set_property_value(&object, property, value))
            }
            Step::Insert {
                object,
                property,
                index,
                related,
            } => {
                let object = self.id(object)?;
                let related = self.id(related)?;
                let index = *index;
                self.execute(|ctx| match index {
                    Some(index) => ctx.insert_related_object(&object, property, index, &related),
                    None => ctx.add_related_object(&object, property, &related),
                })
            }
            Step::Remove {
                object,
                property,
                related,
            } => {
                let object = self.id(object)?;
                let related = self.id(related)?;
                self.execute(|ctx| ctx.remove_related_object(&object, property, &related))
            }
            Step::Replace {
                object,
                property,
                index,
                related,
            } => {
                let object = self.id(object)?;
                let related = self.id(related)?;
                let index = *index;
                self.execute(|ctx| ctx.replace_related_object(&object, property, index, &related))
            }
            Step::SetCollection {
                object,
                property,
                related,
            } => {
                let object = self.id(object)?;
                let related = self.ids(related)?;
                self.execute(|ctx| ctx.set_related_objects(&object, property, related))
            }
            Step::Delete { object } => {
                let object = self.id(object)?;
                self.execute(|ctx| ctx.delete_object(&object))
            }
            Step::Unload { object } => {
                let object = self.id(object)?;
                self.execute(|ctx| ctx.unload_object(&object))
            }
            Step::Commit => {
                let tx = self.active()?;
                Ok(self.hierarchy.commit(tx)?)
            }
            Step::Rollback => {
                let tx = self.active()?;
                Ok(self.hierarchy.rollback(tx)?)
            }
            Step::BeginSub => {
                let tx = self.active()?;
                let sub = self.hierarchy.create_sub_transaction(tx)?;
                self.stack.push(sub);
                Ok(())
            }
            Step::CommitSub => {
                let sub = self.active_sub()?;
                self.hierarchy.commit(sub)?;
                self.hierarchy.discard(sub)?;
                self.stack.pop();
                Ok(())
            }
            Step::DiscardSub => {
                let sub = self.active_sub()?;
                self.hierarchy.discard(sub)?;
                self.stack.pop();
                Ok(())
            }
        }
    }

    fn active_sub(&self) -> CliResult<TransactionId> {
        if self.stack.len() < 2 {
            return Err(CliError::NoSubTransaction);
        }
        self.active()
    }

    /// Replaces every known object ID in `text` with its alias.
    fn render(&self, text: &str) -> String {
        self.aliases
            .iter()
            .fold(text.to_string(), |text, (alias, id)| {
                text.replace(&id.to_string(), alias)
            })
    }

    fn report(&mut self) -> CliResult<Vec<ObjectReport>> {
        let tx = self.active()?;
        let mapping = Arc::clone(self.hierarchy.mapping());
        let mut reports = Vec::with_capacity(self.aliases.len());
        for (alias, id) in self.aliases.clone() {
            let mut state = self.hierarchy.object_state(tx, &id)?;
            if state == ObjectState::NotLoadedYet {
                self.execute(|ctx| ctx.ensure_data_available(&id))?;
                state = self.hierarchy.object_state(tx, &id)?;
            }
            let mut report = ObjectReport {
                alias,
                class: id.class_id().to_string(),
                state: state.to_string(),
                values: BTreeMap::new(),
                relations: BTreeMap::new(),
            };
            if matches!(state, ObjectState::Deleted | ObjectState::Invalid) {
                reports.push(report);
                continue;
            }

            let class = mapping.class(id.class_id())?;
            let container_values = self.execute(|ctx| Ok(ctx.get_object(&id)?.values().clone()))?;
            for (property, value) in container_values {
                if class.default_value(&property).is_some() {
                    report.values.insert(property, value.to_string());
                }
            }

            for definition in class.end_points() {
                let Some(property) = definition.property_name() else {
                    continue;
                };
                let related = match definition.cardinality() {
                    Cardinality::One => self
                        .execute(|ctx| ctx.get_related_object(&id, property))?
                        .into_iter()
                        .collect(),
                    Cardinality::Many => {
                        self.execute(|ctx| ctx.get_related_objects(&id, property))?
                    }
                };
                let related = related
                    .iter()
                    .map(|object| self.render(&object.to_string()))
                    .collect();
                report.relations.insert(property.to_string(), related);
            }
            reports.push(report);
        }
        Ok(reports)
    }
}
