//! Entity contract.

use crate::id::EntityId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// A record kept in a synchronized collection.
///
/// Entities are value-like: the store owns the authoritative sequence and
/// hands out clones. Each entity type names the shape of its creation input
/// (`Draft`, the entity without an id) and of its partial update (`Patch`).
///
/// # Invariants
///
/// - `from_draft` must carry the given id through unchanged
/// - `apply_patch` must never change the id
pub trait SyncEntity:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Creation input: every field the caller chooses, without an id.
    type Draft: Clone + fmt::Debug + Send + Sync + 'static;

    /// Partial update applied in place.
    type Patch: Clone + fmt::Debug + Send + Sync + 'static;

    /// Short name of the entity family, used in log fields.
    const KIND: &'static str;

    /// Returns the entity's identifier.
    fn id(&self) -> &EntityId;

    /// Builds the optimistic entity for a create, merging the id and
    /// default fields (creation timestamp) with the draft.
    fn from_draft(id: EntityId, draft: &Self::Draft, created_at: u64) -> Self;

    /// Applies a patch in place.
    fn apply_patch(&mut self, patch: &Self::Patch);
}

/// A numeric field whose value is clamped into a closed range before it is
/// applied locally or sent to the remote service.
pub struct BoundedField<E> {
    /// Field name as understood by the remote service.
    pub name: &'static str,
    /// Inclusive lower bound.
    pub min: i64,
    /// Inclusive upper bound.
    pub max: i64,
    set: fn(&mut E, i64),
}

impl<E> BoundedField<E> {
    /// Creates a bounded field.
    ///
    /// `min` must not exceed `max`.
    pub const fn new(name: &'static str, min: i64, max: i64, set: fn(&mut E, i64)) -> Self {
        assert!(min <= max, "bounded field range is empty");
        Self {
            name,
            min,
            max,
            set,
        }
    }

    /// Saturates `value` into `[min, max]`.
    #[must_use]
    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(self.min, self.max)
    }

    /// Writes an already-clamped value into the entity.
    pub fn apply(&self, entity: &mut E, value: i64) {
        (self.set)(entity, value);
    }
}

impl<E> Clone for BoundedField<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for BoundedField<E> {}

impl<E> fmt::Debug for BoundedField<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedField")
            .field("name", &self.name)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish()
    }
}
