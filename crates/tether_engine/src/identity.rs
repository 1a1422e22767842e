//! Temporary identifier allocation and reconciliation.
//!
//! Temporary ids come from a process-wide monotonic counter combined with a
//! seed taken from the wall clock the first time an id is allocated. The
//! counter makes collisions within a process impossible; the seed keeps ids
//! left in a snapshot by an earlier run from being issued again.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tether_protocol::{EntityId, SyncEntity};
use tracing::warn;

static PROCESS_SEED: LazyLock<u64> = LazyLock::new(unix_millis);
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Result of merging a create response into a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The temporary entity was replaced in place.
    Replaced {
        /// Position of the replaced entity.
        index: usize,
    },
    /// The canonical id was already present elsewhere, so the temporary
    /// entity was removed instead of duplicating it.
    Collapsed,
    /// No entity carried the temporary id any more; the response was dropped.
    Dropped,
}

/// Issues temporary identifiers and retires each of them exactly once.
///
/// # Invariants
///
/// - An issued id differs from every other id issued in this process
/// - An id is outstanding from issue until [`retire`](Self::retire)
/// - A retired id is never issued again
#[derive(Debug, Default)]
pub struct IdentityReconciler {
    outstanding: Mutex<HashSet<EntityId>>,
}

impl IdentityReconciler {
    /// Creates a reconciler with no outstanding ids.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh temporary identifier.
    pub fn new_temporary_id(&self) -> EntityId {
        let sequence = NEXT_SEQUENCE.fetch_add(1, Ordering::SeqCst);
        let id = EntityId::temporary(*PROCESS_SEED, sequence);
        self.outstanding.lock().insert(id.clone());
        id
    }

    /// Returns true if `id` was issued here and not yet retired.
    pub fn is_outstanding(&self, id: &EntityId) -> bool {
        self.outstanding.lock().contains(id)
    }

    /// Number of ids issued and not yet retired.
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.lock().len()
    }

    /// Retires `id`. Returns false if it was not outstanding.
    pub fn retire(&self, id: &EntityId) -> bool {
        self.outstanding.lock().remove(id)
    }

    /// Replaces the entity carrying `temporary` with `canonical`, keeping its
    /// position, and retires `temporary`.
    pub fn reconcile<E: SyncEntity>(
        &self,
        collection: &mut Vec<E>,
        temporary: &EntityId,
        canonical: E,
    ) -> Reconciliation {
        if !self.retire(temporary) {
            warn!(temporary = %temporary, "reconciling an id that is not outstanding");
        }

        let Some(index) = collection.iter().position(|e| e.id() == temporary) else {
            return Reconciliation::Dropped;
        };

        if collection.iter().any(|e| e.id() == canonical.id()) {
            collection.remove(index);
            return Reconciliation::Collapsed;
        }

        collection[index] = canonical;
        Reconciliation::Replaced { index }
    }

    /// Removes the entity carrying `temporary` and retires the id.
    ///
    /// Returns true if an entity was removed.
    pub fn discard<E: SyncEntity>(&self, collection: &mut Vec<E>, temporary: &EntityId) -> bool {
        self.retire(temporary);
        let before = collection.len();
        collection.retain(|e| e.id() != temporary);
        collection.len() != before
    }
}
