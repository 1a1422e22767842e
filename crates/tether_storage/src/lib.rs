//! # Tether Storage
//!
//! Snapshot persistence for Tether stores.
//!
//! A snapshot is the full collection of one store at one instant. Backends
//! are **opaque byte stores** keyed by store name - they do not interpret
//! the bytes they keep.
//!
//! ## Design Principles
//!
//! - A snapshot is loaded as a whole and saved as a whole
//! - No versioning or migration format
//! - Must be `Send + Sync` so background tasks can persist
//! - The engine owns the snapshot encoding
//!
//! ## Available Backends
//!
//! - [`InMemorySnapshotStore`] - For testing and ephemeral stores
//! - [`FileSnapshotStore`] - One JSON file per store in a directory
//!
//! ## Example
//!
//! ```rust
//! use tether_storage::{InMemorySnapshotStore, SnapshotStore};
//!
//! let store = InMemorySnapshotStore::new();
//! store.save("notes", b"[]").unwrap();
//! assert_eq!(store.load("notes").unwrap(), Some(b"[]".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{validate_name, SnapshotStore};
pub use error::{StorageError, StorageResult};
pub use file::FileSnapshotStore;
pub use memory::InMemorySnapshotStore;
