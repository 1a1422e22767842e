//! Snapshot store trait definition.

use crate::error::{StorageError, StorageResult};
use std::sync::Arc;

/// Durable key-value storage for store snapshots.
///
/// Snapshot stores are **opaque byte stores**. Each store name maps to at
/// most one snapshot, replaced as a whole on every save.
///
/// # Invariants
///
/// - `load` returns exactly the bytes of the last successful `save`
/// - A failed `save` leaves the previous snapshot readable
/// - Implementations must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemorySnapshotStore`] - For testing
/// - [`super::FileSnapshotStore`] - For persistent storage
pub trait SnapshotStore: Send + Sync {
    /// Loads the snapshot saved under `name`.
    ///
    /// Returns `None` if nothing was ever saved under that name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the backend cannot be read.
    fn load(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the snapshot saved under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the write fails.
    fn save(&self, name: &str, snapshot: &[u8]) -> StorageResult<()>;

    /// Removes the snapshot saved under `name`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the removal fails.
    fn remove(&self, name: &str) -> StorageResult<()>;

    /// Lists the names that currently hold a snapshot, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be enumerated.
    fn names(&self) -> StorageResult<Vec<String>>;
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for Arc<S> {
    fn load(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        (**self).load(name)
    }

    fn save(&self, name: &str, snapshot: &[u8]) -> StorageResult<()> {
        (**self).save(name, snapshot)
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        (**self).remove(name)
    }

    fn names(&self) -> StorageResult<Vec<String>> {
        (**self).names()
    }
}

/// Checks that `name` is usable as a snapshot key.
///
/// Names must be non-empty and contain only ASCII alphanumerics, `-` and `_`,
/// so they map safely onto file names.
///
/// # Errors
///
/// Returns [`StorageError::InvalidName`] otherwise.
pub fn validate_name(name: &str) -> StorageResult<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}
