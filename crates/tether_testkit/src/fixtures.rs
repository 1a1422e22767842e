//! Test fixtures and store helpers.
//!
//! Provides sample entities and convenience constructors for stores backed
//! by in-memory or temporary-directory persistence.

use std::path::Path;
use tempfile::TempDir;
use tether_engine::{EntityStore, MemoryRemote, StoreConfig};
use tether_models::{Goal, GoalDraft, Note, NoteDraft, PROGRESS};
use tether_protocol::{EntityId, SyncEntity};
use tether_storage::{FileSnapshotStore, InMemorySnapshotStore};

/// A store backed by [`MemoryRemote`] and [`InMemorySnapshotStore`].
pub type MemoryStore<E> = EntityStore<E, MemoryRemote<E>, InMemorySnapshotStore>;

/// A store backed by [`MemoryRemote`] and [`FileSnapshotStore`].
pub type FileStore<E> = EntityStore<E, MemoryRemote<E>, FileSnapshotStore>;

/// Creation time used by every fixture entity.
pub const FIXTURE_CREATED_AT: u64 = 1_700_000_000_000;

/// Builds a note with a permanent id.
pub fn note(id: &str, title: &str) -> Note {
    Note::from_draft(
        EntityId::from(id),
        &NoteDraft::titled(title),
        FIXTURE_CREATED_AT,
    )
}

/// Builds a note with a permanent id and body text.
pub fn note_with_content(id: &str, title: &str, content: &str) -> Note {
    Note::from_draft(
        EntityId::from(id),
        &NoteDraft::titled(title).with_content(content),
        FIXTURE_CREATED_AT,
    )
}

/// Builds a goal with a permanent id and the given progress.
pub fn goal(id: &str, title: &str, progress: i64) -> Goal {
    let mut goal = Goal::from_draft(
        EntityId::from(id),
        &GoalDraft::titled(title),
        FIXTURE_CREATED_AT,
    );
    PROGRESS.apply(&mut goal, PROGRESS.clamp(progress));
    goal
}

/// A small server-side note collection, newest first.
pub fn sample_notes() -> Vec<Note> {
    let mut pinned = note("note-3", "Packing list");
    pinned.pinned = true;
    vec![
        pinned,
        note_with_content("note-2", "Meeting notes", "Agenda: roadmap, hiring"),
        note_with_content("note-1", "Groceries", "eggs, rice, coffee"),
    ]
}

/// A small server-side goal collection, newest first.
pub fn sample_goals() -> Vec<Goal> {
    vec![
        goal("goal-3", "Read 12 books", 25),
        goal("goal-2", "Run a marathon", 60),
        goal("goal-1", "Learn Rust", 100),
    ]
}

/// Opens a note store whose remote holds `server`.
pub fn memory_note_store(server: Vec<Note>) -> MemoryStore<Note> {
    EntityStore::open(
        StoreConfig::new("notes"),
        MemoryRemote::with_entities(server),
        InMemorySnapshotStore::new(),
    )
    .expect("Failed to open note store")
}

/// Opens a goal store whose remote holds `server` and understands the
/// `progress` field.
pub fn memory_goal_store(server: Vec<Goal>) -> MemoryStore<Goal> {
    EntityStore::open(
        StoreConfig::new("goals"),
        MemoryRemote::with_entities(server).with_field(PROGRESS),
        InMemorySnapshotStore::new(),
    )
    .expect("Failed to open goal store")
}

/// A snapshot directory removed when dropped.
pub struct TempSnapshotDir {
    dir: TempDir,
}

impl TempSnapshotDir {
    /// Creates an empty snapshot directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Opens a snapshot store over the directory. Several stores may be
    /// opened over the same directory, one after another.
    pub fn snapshot_store(&self) -> FileSnapshotStore {
        FileSnapshotStore::open(self.dir.path()).expect("Failed to open snapshot directory")
    }

    /// Opens an entity store persisting into the directory.
    pub fn open_store<E: SyncEntity>(&self, name: &str, remote: MemoryRemote<E>) -> FileStore<E> {
        EntityStore::open(StoreConfig::new(name), remote, self.snapshot_store())
            .expect("Failed to open file-backed store")
    }
}

impl Default for TempSnapshotDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tether_engine::StoreState;

    #[test]
    fn samples_have_unique_permanent_ids() {
        let ids: HashSet<_> = sample_notes()
            .into_iter()
            .map(|n| n.id)
            .chain(sample_goals().into_iter().map(|g| g.id))
            .collect();
        assert_eq!(ids.len(), 6);
        assert!(ids.iter().all(|id| !id.is_temporary()));
    }

    #[test]
    fn goal_fixture_clamps_progress() {
        assert_eq!(goal("g", "g", 140).progress, 100);
        assert!(goal("g", "g", 100).is_complete());
    }

    #[tokio::test]
    async fn memory_stores_hydrate_from_samples() {
        let notes = memory_note_store(sample_notes());
        notes.hydrate().await.unwrap();
        assert_eq!(notes.snapshot(), sample_notes());

        let goals = memory_goal_store(sample_goals());
        goals.hydrate().await.unwrap();
        assert_eq!(goals.state(), StoreState::Ready);
        assert_eq!(goals.len(), 3);
    }

    #[tokio::test]
    async fn file_store_reopens_from_directory() {
        let dir = TempSnapshotDir::new();

        let store = dir.open_store("notes", MemoryRemote::with_entities(sample_notes()));
        store.hydrate().await.unwrap();
        drop(store);

        let reopened = dir.open_store::<Note>("notes", MemoryRemote::new());
        assert_eq!(reopened.snapshot(), sample_notes());
        assert!(dir.path().join("notes.json").exists());
    }
}
