//! File-based snapshot store for persistent storage.

use crate::backend::{validate_name, SnapshotStore};
use crate::error::StorageResult;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const SNAPSHOT_EXTENSION: &str = "json";
const PARTIAL_EXTENSION: &str = "json.partial";

/// A directory of snapshot files, one `<name>.json` per store.
///
/// Snapshots survive process restarts.
///
/// # Durability
///
/// `save` writes the new snapshot to `<name>.json.partial`, calls
/// `File::sync_all()` and then renames it over `<name>.json`. A crash
/// mid-save leaves either the old or the new snapshot, never a torn one.
///
/// # Thread Safety
///
/// Saves are serialized by an internal lock, so concurrent saves of the
/// same store never interleave on the partial file.
///
/// # Example
///
/// ```no_run
/// use tether_storage::{FileSnapshotStore, SnapshotStore};
/// use std::path::Path;
///
/// let store = FileSnapshotStore::open(Path::new("snapshots")).unwrap();
/// store.save("notes", b"[]").unwrap();
/// ```
#[derive(Debug)]
pub struct FileSnapshotStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSnapshotStore {
    /// Opens a snapshot directory, creating it (and its parents) if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the snapshot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file that holds the snapshot for `name`.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{SNAPSHOT_EXTENSION}"))
    }

    fn partial_path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{PARTIAL_EXTENSION}"))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_name(name)?;
        match fs::read(self.path_for(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, name: &str, snapshot: &[u8]) -> StorageResult<()> {
        validate_name(name)?;
        let _guard = self.write_lock.lock();

        let partial = self.partial_path_for(name);
        let target = self.path_for(name);
        {
            let mut file = File::create(&partial)?;
            file.write_all(snapshot)?;
            file.sync_all()?;
        }
        fs::rename(&partial, &target)?;

        debug!(snapshot = name, bytes = snapshot.len(), "snapshot written");
        Ok(())
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn names(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
