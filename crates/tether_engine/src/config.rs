//! Configuration for entity stores.

use crate::error::StoreResult;

/// How a store treats a new mutation on an entity that already has one in
/// flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InFlightPolicy {
    /// Start the mutation anyway. Each mutation captures its own rollback
    /// snapshot, so a late failure of an earlier mutation discards later
    /// optimistic changes.
    #[default]
    Overlap,
    /// Refuse the mutation with [`crate::StoreError::MutationInFlight`]
    /// without touching the collection.
    Reject,
}

/// Configuration for an entity store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store name: the snapshot key and the `store` field of every log line.
    pub name: String,
    /// Policy for overlapping mutations on the same entity.
    pub in_flight: InFlightPolicy,
    /// Whether to seed the collection from the persisted snapshot at open.
    pub restore_snapshot: bool,
}

impl StoreConfig {
    /// Creates a configuration with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            in_flight: InFlightPolicy::Overlap,
            restore_snapshot: true,
        }
    }

    /// Sets the in-flight policy.
    pub fn with_in_flight_policy(mut self, policy: InFlightPolicy) -> Self {
        self.in_flight = policy;
        self
    }

    /// Sets whether the persisted snapshot is loaded at open.
    pub fn with_restore_snapshot(mut self, restore: bool) -> Self {
        self.restore_snapshot = restore;
        self
    }

    /// Checks that the name can be used as a snapshot key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Storage`] with an invalid-name error.
    pub fn validate(&self) -> StoreResult<()> {
        tether_storage::validate_name(&self.name)?;
        Ok(())
    }
}
