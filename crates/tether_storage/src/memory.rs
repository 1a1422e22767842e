//! In-memory snapshot store for testing.

use crate::backend::{validate_name, SnapshotStore};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// An in-memory snapshot store.
///
/// This store keeps all snapshots in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// It also counts writes and can be switched into a failing mode, which
/// lets tests observe how often a store persists and how it copes with a
/// broken backend.
///
/// # Example
///
/// ```rust
/// use tether_storage::{InMemorySnapshotStore, SnapshotStore};
///
/// let store = InMemorySnapshotStore::new();
/// store.save("goals", b"[1]").unwrap();
/// store.save("goals", b"[1,2]").unwrap();
/// assert_eq!(store.writes(), 2);
/// assert_eq!(store.load("goals").unwrap(), Some(b"[1,2]".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<String, Vec<u8>>>,
    writes: AtomicU64,
    fail_writes: AtomicBool,
}

impl InMemorySnapshotStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with one snapshot.
    ///
    /// Useful for testing restart scenarios.
    #[must_use]
    pub fn with_snapshot(name: &str, snapshot: Vec<u8>) -> Self {
        let store = Self::new();
        store.snapshots.write().insert(name.to_string(), snapshot);
        store
    }

    /// Returns the number of successful saves since creation.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `save` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_name(name)?;
        Ok(self.snapshots.read().get(name).cloned())
    }

    fn save(&self, name: &str, snapshot: &[u8]) -> StorageResult<()> {
        validate_name(name)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!(
                "writes disabled for snapshot {name}"
            )));
        }

        self.snapshots
            .write()
            .insert(name.to_string(), snapshot.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        self.snapshots.write().remove(name);
        Ok(())
    }

    fn names(&self) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self.snapshots.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
