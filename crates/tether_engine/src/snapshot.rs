//! Snapshot encoding.
//!
//! A snapshot is the whole collection as a JSON array, with no header and no
//! version field. It is loaded as a whole and saved as a whole.

use crate::error::StoreResult;
use std::collections::HashSet;
use tether_protocol::SyncEntity;
use tether_storage::SnapshotStore;

/// Encodes a collection.
pub fn encode_snapshot<E: SyncEntity>(entities: &[E]) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(entities)?)
}

/// Decodes a collection.
pub fn decode_snapshot<E: SyncEntity>(bytes: &[u8]) -> StoreResult<Vec<E>> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Loads and decodes the snapshot saved under `name`.
pub fn load_snapshot<E: SyncEntity>(
    persistence: &dyn SnapshotStore,
    name: &str,
) -> StoreResult<Option<Vec<E>>> {
    match persistence.load(name)? {
        Some(bytes) => Ok(Some(decode_snapshot(&bytes)?)),
        None => Ok(None),
    }
}

/// Drops every entity whose id already appeared earlier in the sequence.
///
/// Returns the deduplicated collection and the number of entities dropped.
pub(crate) fn dedupe_by_id<E: SyncEntity>(entities: Vec<E>) -> (Vec<E>, usize) {
    let total = entities.len();
    let mut seen = HashSet::with_capacity(total);
    let unique: Vec<E> = entities
        .into_iter()
        .filter(|e| seen.insert(e.id().clone()))
        .collect();
    let dropped = total - unique.len();
    (unique, dropped)
}
