//! CLI command implementations.

pub mod dump;
pub mod inspect;

use clap::ValueEnum;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tether_protocol::EntityId;
use tether_storage::{FileSnapshotStore, SnapshotStore, StorageError};
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    /// The snapshot directory does not exist.
    #[error("no snapshot directory at {0}")]
    NotADirectory(PathBuf),

    /// No snapshot is stored under the requested name.
    #[error("no snapshot named {0}")]
    SnapshotNotFound(String),

    /// The snapshot is valid JSON but not an array of entities.
    #[error("snapshot {0} is not a JSON array")]
    NotAnArray(String),

    /// Snapshot directory error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Snapshot or output encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Opens an existing snapshot directory.
pub fn open_dir(dir: &Path) -> CliResult<FileSnapshotStore> {
    if !dir.is_dir() {
        return Err(CliError::NotADirectory(dir.to_path_buf()));
    }
    Ok(FileSnapshotStore::open(dir)?)
}

/// Loads the snapshot `name` as untyped entities.
///
/// Snapshots are read without knowing their entity type, so every family
/// can be inspected with the same code.
pub fn load_entities(store: &dyn SnapshotStore, name: &str) -> CliResult<Vec<Value>> {
    let bytes = store
        .load(name)?
        .ok_or_else(|| CliError::SnapshotNotFound(name.to_string()))?;
    match serde_json::from_slice(&bytes)? {
        Value::Array(entities) => Ok(entities),
        _ => Err(CliError::NotAnArray(name.to_string())),
    }
}

/// Reads the `id` field of an untyped entity.
pub fn entity_id(entity: &Value) -> Option<EntityId> {
    entity.get("id").and_then(Value::as_str).map(EntityId::from)
}

/// Returns true if the entity still carries a temporary id.
pub fn is_temporary(entity: &Value) -> bool {
    entity_id(entity).is_some_and(|id| id.is_temporary())
}
