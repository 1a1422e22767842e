//! Error types for entity stores.

use tether_protocol::{EntityId, RemoteError};
use tether_storage::StorageError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by an entity store.
///
/// Remote failures of a mutation are never returned here: the mutation has
/// already returned when its remote phase fails, and the failure is reported
/// through [`crate::MutationOutcome::RolledBack`] instead.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Snapshot backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot codec error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// A remote call made outside of a mutation failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The entity already has a mutation in flight and the store rejects
    /// overlapping mutations.
    #[error("mutation already in flight for entity {id}")]
    MutationInFlight {
        /// The entity targeted by both mutations.
        id: EntityId,
    },

    /// A hydration is already running.
    #[error("hydration already in progress for store {store}")]
    AlreadyHydrating {
        /// Store name.
        store: String,
    },
}

impl StoreError {
    /// Returns true if this wraps a remote failure that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Remote(e) if e.is_retryable())
    }
}
