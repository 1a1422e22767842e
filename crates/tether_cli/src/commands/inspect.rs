//! Inspect command implementation.

use super::{is_temporary, load_entities, open_dir, CliResult, OutputFormat};
use serde::Serialize;
use std::path::Path;
use tether_storage::SnapshotStore;
use tracing::warn;

/// Snapshot directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Directory path.
    pub path: String,
    /// One entry per snapshot, sorted by name.
    pub snapshots: Vec<SnapshotSummary>,
}

/// Summary of a single snapshot.
#[derive(Debug, Serialize)]
pub struct SnapshotSummary {
    /// Store name.
    pub name: String,
    /// File size in bytes.
    pub size: u64,
    /// Number of entities.
    pub entity_count: usize,
    /// Entities still carrying a temporary id: creates that had not
    /// resolved when the snapshot was written.
    pub temporary_count: usize,
    /// Why the snapshot could not be read, if it could not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Collects a summary of every snapshot in `dir`.
pub fn collect(dir: &Path) -> CliResult<InspectResult> {
    let store = open_dir(dir)?;
    let mut snapshots = Vec::new();

    for name in store.names()? {
        let size = std::fs::metadata(store.path_for(&name))
            .map(|m| m.len())
            .unwrap_or(0);
        let summary = match load_entities(&store, &name) {
            Ok(entities) => SnapshotSummary {
                size,
                entity_count: entities.len(),
                temporary_count: entities.iter().filter(|e| is_temporary(e)).count(),
                error: None,
                name,
            },
            Err(e) => {
                warn!(snapshot = %name, error = %e, "unreadable snapshot");
                SnapshotSummary {
                    size,
                    entity_count: 0,
                    temporary_count: 0,
                    error: Some(e.to_string()),
                    name,
                }
            }
        };
        snapshots.push(summary);
    }

    Ok(InspectResult {
        path: dir.display().to_string(),
        snapshots,
    })
}

/// Runs the inspect command.
pub fn run(dir: &Path, format: OutputFormat) -> CliResult<()> {
    let result = collect(dir)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text_output(&result),
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Tether Snapshot Inspection");
    println!("==========================");
    println!();
    println!("Path: {}", result.path);
    println!();

    if result.snapshots.is_empty() {
        println!("No snapshots.");
        return;
    }

    println!("Snapshots:");
    for snapshot in &result.snapshots {
        match &snapshot.error {
            Some(error) => println!("  {:<16} unreadable: {}", snapshot.name, error),
            None => println!(
                "  {:<16} {} entities, {} unconfirmed, {}",
                snapshot.name,
                snapshot.entity_count,
                snapshot.temporary_count,
                format_size(snapshot.size)
            ),
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::open_dir;

    #[test]
    fn summarizes_each_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_dir(dir.path()).unwrap();
        store
            .save(
                "notes",
                br#"[{"id":"tmp:18c:1","title":"a"},{"id":"n1","title":"b"}]"#,
            )
            .unwrap();
        store.save("goals", b"[]").unwrap();
        store.save("broken", b"{").unwrap();

        let result = collect(dir.path()).unwrap();
        let names: Vec<&str> = result.snapshots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["broken", "goals", "notes"]);

        let notes = &result.snapshots[2];
        assert_eq!(notes.entity_count, 2);
        assert_eq!(notes.temporary_count, 1);
        assert!(notes.size > 0);

        assert!(result.snapshots[0].error.is_some());
        assert_eq!(result.snapshots[1].entity_count, 0);
    }

    #[tokio::test]
    async fn counts_unconfirmed_creates_written_by_a_store() {
        use tether_engine::{EntityStore, GatedRemote, StoreConfig};
        use tether_models::{Note, NoteDraft};
        use tether_testkit::{sample_notes, TempSnapshotDir};

        let dir = TempSnapshotDir::new();
        let (remote, mut calls) = GatedRemote::<Note>::new();
        let store = EntityStore::open_with_seed(
            StoreConfig::new("notes"),
            remote,
            dir.snapshot_store(),
            sample_notes(),
        )
        .unwrap();

        // The create call is never answered
        let _pending = store.create(NoteDraft::titled("draft"));
        let _call = calls.next().await.unwrap();

        let result = collect(dir.path()).unwrap();
        assert_eq!(result.snapshots.len(), 1);
        assert_eq!(result.snapshots[0].entity_count, 4);
        assert_eq!(result.snapshots[0].temporary_count, 1);
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(12), "12 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
