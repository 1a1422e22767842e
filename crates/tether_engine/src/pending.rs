//! In-flight mutation tracking.

use crate::config::InFlightPolicy;
use crate::error::{StoreError, StoreResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tether_protocol::{EntityId, MutationKind, RemoteError};
use tokio::task::JoinHandle;
use tracing::warn;

/// How the remote phase of a mutation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// An update, delete or field update was confirmed.
    Committed,
    /// A create was confirmed and the temporary entity now carries the
    /// permanent id.
    Reconciled {
        /// Id used during the optimistic phase.
        temporary: EntityId,
        /// Id assigned by the remote service.
        permanent: EntityId,
    },
    /// A create was confirmed but its temporary entity had already left the
    /// collection (deleted or replaced by hydration), so the response was
    /// dropped.
    Dropped {
        /// Id used during the optimistic phase.
        temporary: EntityId,
        /// Id assigned by the remote service.
        permanent: EntityId,
    },
    /// The remote call failed and the optimistic change was reverted.
    RolledBack {
        /// The failure reported by the remote service.
        error: RemoteError,
    },
    /// The background task was cancelled before it could settle.
    Aborted,
}

impl MutationOutcome {
    /// Returns true if the remote service accepted the mutation.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            MutationOutcome::Committed
                | MutationOutcome::Reconciled { .. }
                | MutationOutcome::Dropped { .. }
        )
    }

    /// Returns the permanent id assigned to a created entity.
    pub fn permanent_id(&self) -> Option<&EntityId> {
        match self {
            MutationOutcome::Reconciled { permanent, .. }
            | MutationOutcome::Dropped { permanent, .. } => Some(permanent),
            _ => None,
        }
    }
}

/// Handle to a mutation whose optimistic effect is applied and whose remote
/// phase runs in the background.
///
/// Dropping the handle does not cancel the remote phase.
#[derive(Debug)]
pub struct PendingMutation {
    kind: MutationKind,
    target: EntityId,
    task: JoinHandle<MutationOutcome>,
}

impl PendingMutation {
    pub(crate) fn new(
        kind: MutationKind,
        target: EntityId,
        task: JoinHandle<MutationOutcome>,
    ) -> Self {
        Self { kind, target, task }
    }

    /// Kind of mutation.
    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    /// Entity targeted by the mutation. For creates this is the temporary id.
    pub fn target(&self) -> &EntityId {
        &self.target
    }

    /// Returns true once the remote phase has finished.
    pub fn is_settled(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the remote phase to finish.
    pub async fn settled(self) -> MutationOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(kind = %self.kind, id = %self.target, error = %e, "mutation task did not complete");
                MutationOutcome::Aborted
            }
        }
    }
}

/// Per-entity count of mutations whose remote phase has not settled.
#[derive(Debug, Default, Clone)]
pub(crate) struct InFlightRegistry {
    counts: Arc<Mutex<HashMap<EntityId, usize>>>,
}

impl InFlightRegistry {
    /// Registers a mutation on `id`, honouring `policy`.
    pub(crate) fn acquire(
        &self,
        id: &EntityId,
        policy: InFlightPolicy,
    ) -> StoreResult<InFlightToken> {
        let mut counts = self.counts.lock();
        if policy == InFlightPolicy::Reject && counts.contains_key(id) {
            return Err(StoreError::MutationInFlight { id: id.clone() });
        }
        *counts.entry(id.clone()).or_insert(0) += 1;
        Ok(self.token(id))
    }

    /// Registers a mutation on `id` unconditionally.
    pub(crate) fn register(&self, id: &EntityId) -> InFlightToken {
        *self.counts.lock().entry(id.clone()).or_insert(0) += 1;
        self.token(id)
    }

    fn token(&self, id: &EntityId) -> InFlightToken {
        InFlightToken {
            registry: self.clone(),
            id: id.clone(),
        }
    }

    /// Number of unsettled mutations on `id`.
    pub(crate) fn count(&self, id: &EntityId) -> usize {
        self.counts.lock().get(id).copied().unwrap_or(0)
    }

    fn release(&self, id: &EntityId) {
        let mut counts = self.counts.lock();
        if let Some(count) = counts.get_mut(id) {
            *count -= 1;
            if *count == 0 {
                counts.remove(id);
            }
        }
    }
}

/// Marks one mutation on an entity as in flight until dropped.
#[derive(Debug)]
pub(crate) struct InFlightToken {
    registry: InFlightRegistry,
    id: EntityId,
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}
