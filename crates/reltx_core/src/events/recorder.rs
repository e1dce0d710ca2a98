//! A listener that records every event it sees.

use super::{ClientTransactionListener, CommitContext};
use crate::end_point::RelationEndPointId;
use crate::error::CoreResult;
use crate::mapping::EndPointDefinition;
use crate::object::{ClassId, ObjectId, Value};
use crate::types::TransactionId;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;

/// One recorded notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum RecordedEvent {
    ObjectsLoading {
        objects: Vec<ObjectId>,
    },
    ObjectsLoaded {
        objects: Vec<ObjectId>,
    },
    ObjectsUnloading {
        objects: Vec<ObjectId>,
    },
    ObjectsUnloaded {
        objects: Vec<ObjectId>,
    },
    NewObjectCreating {
        class: ClassId,
    },
    ObjectDeleting {
        object: ObjectId,
    },
    ObjectDeleted {
        object: ObjectId,
    },
    PropertyValueChanging {
        object: ObjectId,
        property: String,
        old: Value,
        new: Value,
    },
    PropertyValueChanged {
        object: ObjectId,
        property: String,
        old: Value,
        new: Value,
    },
    RelationChanging {
        object: ObjectId,
        end_point: String,
        old: Option<ObjectId>,
        new: Option<ObjectId>,
    },
    RelationChanged {
        object: ObjectId,
        end_point: String,
        old: Option<ObjectId>,
        new: Option<ObjectId>,
    },
    VirtualEndPointStateUpdated {
        end_point: String,
        has_changed: Option<bool>,
    },
    Committing {
        objects: Vec<ObjectId>,
    },
    Committed {
        objects: Vec<ObjectId>,
    },
    RollingBack {
        objects: Vec<ObjectId>,
    },
    RolledBack {
        objects: Vec<ObjectId>,
    },
    SubTransactionCreated {
        sub_transaction: TransactionId,
    },
    Discarded,
}

fn opt(object: Option<&ObjectId>) -> String {
    object.map_or_else(|| "null".to_string(), ToString::to_string)
}

fn list(objects: &[ObjectId]) -> String {
    objects
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for RecordedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectsLoading { objects } => write!(f, "objects loading [{}]", list(objects)),
            Self::ObjectsLoaded { objects } => write!(f, "objects loaded [{}]", list(objects)),
            Self::ObjectsUnloading { objects } => {
                write!(f, "objects unloading [{}]", list(objects))
            }
            Self::ObjectsUnloaded { objects } => write!(f, "objects unloaded [{}]", list(objects)),
            Self::NewObjectCreating { class } => write!(f, "new object creating: {class}"),
            Self::ObjectDeleting { object } => write!(f, "object deleting: {object}"),
            Self::ObjectDeleted { object } => write!(f, "object deleted: {object}"),
            Self::PropertyValueChanging {
                object,
                property,
                old,
                new,
            } => write!(f, "property changing: {object}.{property} {old} -> {new}"),
            Self::PropertyValueChanged {
                object,
                property,
                old,
                new,
            } => write!(f, "property changed: {object}.{property} {old} -> {new}"),
            Self::RelationChanging {
                object,
                end_point,
                old,
                new,
            } => write!(
                f,
                "relation changing: {object} {end_point} {} -> {}",
                opt(old.as_ref()),
                opt(new.as_ref())
            ),
            Self::RelationChanged {
                object,
                end_point,
                old,
                new,
            } => write!(
                f,
                "relation changed: {object} {end_point} {} -> {}",
                opt(old.as_ref()),
                opt(new.as_ref())
            ),
            Self::VirtualEndPointStateUpdated {
                end_point,
                has_changed,
            } => match has_changed {
                Some(changed) => write!(f, "end-point state updated: {end_point} changed={changed}"),
                None => write!(f, "end-point state updated: {end_point} unregistered"),
            },
            Self::Committing { objects } => write!(f, "committing [{}]", list(objects)),
            Self::Committed { objects } => write!(f, "committed [{}]", list(objects)),
            Self::RollingBack { objects } => write!(f, "rolling back [{}]", list(objects)),
            Self::RolledBack { objects } => write!(f, "rolled back [{}]", list(objects)),
            Self::SubTransactionCreated { sub_transaction } => {
                write!(f, "sub-transaction created: {sub_transaction}")
            }
            Self::Discarded => write!(f, "discarded"),
        }
    }
}

/// Records the events of every transaction it is attached to.
///
/// Unregistration notifications are not recorded; they fire for every
/// container and end-point on commit and would drown the rest.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<(TransactionId, RecordedEvent)>>,
}

impl EventRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events with their transactions.
    #[must_use]
    pub fn events(&self) -> Vec<(TransactionId, RecordedEvent)> {
        self.events.lock().clone()
    }

    /// Returns the recorded events without transactions.
    #[must_use]
    pub fn event_kinds(&self) -> Vec<RecordedEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Drains the recorded events.
    pub fn take(&self) -> Vec<(TransactionId, RecordedEvent)> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Forgets every recorded event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, tx: TransactionId, event: RecordedEvent) {
        self.events.lock().push((tx, event));
    }
}

impl ClientTransactionListener for EventRecorder {
    fn objects_loading(&self, tx: TransactionId, objects: &[ObjectId]) -> CoreResult<()> {
        self.push(
            tx,
            RecordedEvent::ObjectsLoading {
                objects: objects.to_vec(),
            },
        );
        Ok(())
    }

    fn objects_loaded(&self, tx: TransactionId, objects: &[ObjectId]) {
        self.push(
            tx,
            RecordedEvent::ObjectsLoaded {
                objects: objects.to_vec(),
            },
        );
    }

    fn objects_unloading(&self, tx: TransactionId, objects: &[ObjectId]) -> CoreResult<()> {
        self.push(
            tx,
            RecordedEvent::ObjectsUnloading {
                objects: objects.to_vec(),
            },
        );
        Ok(())
    }

    fn objects_unloaded(&self, tx: TransactionId, objects: &[ObjectId]) {
        self.push(
            tx,
            RecordedEvent::ObjectsUnloaded {
                objects: objects.to_vec(),
            },
        );
    }

    fn new_object_creating(&self, tx: TransactionId, class_id: &ClassId) -> CoreResult<()> {
        self.push(
            tx,
            RecordedEvent::NewObjectCreating {
                class: class_id.clone(),
            },
        );
        Ok(())
    }

    fn object_deleting(&self, tx: TransactionId, object: &ObjectId) -> CoreResult<()> {
        self.push(
            tx,
            RecordedEvent::ObjectDeleting {
                object: object.clone(),
            },
        );
        Ok(())
    }

    fn object_deleted(&self, tx: TransactionId, object: &ObjectId) {
        self.push(
            tx,
            RecordedEvent::ObjectDeleted {
                object: object.clone(),
            },
        );
    }

    fn property_value_changing(
        &self,
        tx: TransactionId,
        object: &ObjectId,
        property: &str,
        old: &Value,
        new: &Value,
    ) -> CoreResult<()> {
        self.push(
            tx,
            RecordedEvent::PropertyValueChanging {
                object: object.clone(),
                property: property.to_string(),
                old: old.clone(),
                new: new.clone(),
            },
        );
        Ok(())
    }

    fn property_value_changed(
        &self,
        tx: TransactionId,
        object: &ObjectId,
        property: &str,
        old: &Value,
        new: &Value,
    ) {
        self.push(
            tx,
            RecordedEvent::PropertyValueChanged {
                object: object.clone(),
                property: property.to_string(),
                old: old.clone(),
                new: new.clone(),
            },
        );
    }

    fn relation_changing(
        &self,
        tx: TransactionId,
        object: &ObjectId,
        end_point: &EndPointDefinition,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> CoreResult<()> {
        self.push(
            tx,
            RecordedEvent::RelationChanging {
                object: object.clone(),
                end_point: end_point.full_name(),
                old: old.cloned(),
                new: new.cloned(),
            },
        );
        Ok(())
    }

    fn relation_changed(
        &self,
        tx: TransactionId,
        object: &ObjectId,
        end_point: &EndPointDefinition,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) {
        self.push(
            tx,
            RecordedEvent::RelationChanged {
                object: object.clone(),
                end_point: end_point.full_name(),
                old: old.cloned(),
                new: new.cloned(),
            },
        );
    }

    fn virtual_end_point_state_updated(
        &self,
        tx: TransactionId,
        end_point: &RelationEndPointId,
        has_changed: Option<bool>,
    ) {
        self.push(
            tx,
            RecordedEvent::VirtualEndPointStateUpdated {
                end_point: end_point.to_string(),
                has_changed,
            },
        );
    }

    fn transaction_committing(
        &self,
        tx: TransactionId,
        objects: &[ObjectId],
        _context: &mut CommitContext<'_>,
    ) -> CoreResult<()> {
        self.push(
            tx,
            RecordedEvent::Committing {
                objects: objects.to_vec(),
            },
        );
        Ok(())
    }

    fn transaction_committed(&self, tx: TransactionId, objects: &[ObjectId]) {
        self.push(
            tx,
            RecordedEvent::Committed {
                objects: objects.to_vec(),
            },
        );
    }

    fn transaction_rolling_back(
        &self,
        tx: TransactionId,
        objects: &[ObjectId],
        _context: &mut CommitContext<'_>,
    ) -> CoreResult<()> {
        self.push(
            tx,
            RecordedEvent::RollingBack {
                objects: objects.to_vec(),
            },
        );
        Ok(())
    }

    fn transaction_rolled_back(&self, tx: TransactionId, objects: &[ObjectId]) {
        self.push(
            tx,
            RecordedEvent::RolledBack {
                objects: objects.to_vec(),
            },
        );
    }

    fn sub_transaction_created(&self, tx: TransactionId, sub_transaction: TransactionId) {
        self.push(tx, RecordedEvent::SubTransactionCreated { sub_transaction });
    }

    fn transaction_discarded(&self, tx: TransactionId) {
        self.push(tx, RecordedEvent::Discarded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn records_in_order() {
        let recorder = EventRecorder::new();
        let tx = TransactionId::new(3);
        let order = ObjectId::new("Order", Uuid::from_u128(1));

        recorder.object_deleting(tx, &order).unwrap();
        recorder.object_deleted(tx, &order);

        assert_eq!(
            recorder.event_kinds(),
            vec![
                RecordedEvent::ObjectDeleting {
                    object: order.clone()
                },
                RecordedEvent::ObjectDeleted { object: order },
            ]
        );
        assert_eq!(recorder.take().len(), 2);
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn display_and_json() {
        let event = RecordedEvent::Discarded;
        assert_eq!(event.to_string(), "discarded");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"discarded"}"#);
    }
}
