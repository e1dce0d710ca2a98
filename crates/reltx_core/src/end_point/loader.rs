//! Lazy loading seam of the end-point manager.

use super::id::RelationEndPointId;
use crate::data::DataContainer;
use crate::error::CoreResult;
use crate::object::ObjectId;

/// Loads data on behalf of the [`RelationEndPointManager`].
///
/// The manager never talks to storage or to a parent transaction directly;
/// the transaction hands it a loader for the duration of one call.
///
/// [`RelationEndPointManager`]: super::RelationEndPointManager
pub trait LazyLoader {
    /// Returns the registered container of `object`, loading and
    /// registering it first if necessary.
    ///
    /// The flag is `true` if the container was loaded by this call, in
    /// which case the caller registers its end-points.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound`, `ObjectInvalid`, a listener veto, or a
    /// storage error.
    fn ensure_data_container(&mut self, object: &ObjectId) -> CoreResult<(&DataContainer, bool)>;

    /// Returns the objects originally related through a virtual end-point.
    ///
    /// # Errors
    ///
    /// Propagates errors of the underlying source.
    fn load_related_object_ids(
        &mut self,
        end_point: &RelationEndPointId,
    ) -> CoreResult<Vec<ObjectId>>;
}
