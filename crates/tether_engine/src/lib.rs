//! # Tether Engine
//!
//! Optimistic entity stores for Tether.
//!
//! This crate provides:
//! - [`EntityStore`], an immediately-consistent local copy of a remote
//!   entity collection
//! - Temporary identifier allocation and reconciliation
//! - Rollback of optimistic changes after remote failures
//! - Snapshot persistence after every state change
//! - In-process remote services for tests and demos
//!
//! ## Architecture
//!
//! Every mutation runs in two phases:
//! 1. Apply the change locally, persist the collection and notify
//!    subscribers (synchronous, never fails on remote errors)
//! 2. Call the remote service in a background task, then either replace the
//!    local entity with the canonical one or roll the change back
//!
//! Each phase ends with a persisted, published collection.
//!
//! ## Key Invariants
//!
//! - The remote service is authoritative; its responses replace local state
//! - Temporary ids are unique within a process and never reach the service
//!   as a permanent id
//! - A collection never holds two entities with the same id
//! - A failed update, delete or field update restores the whole collection
//!   captured when it started

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod identity;
mod pending;
mod remote;
mod snapshot;
mod store;

pub use config::{InFlightPolicy, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use identity::{IdentityReconciler, Reconciliation};
pub use pending::{MutationOutcome, PendingMutation};
pub use remote::{GatedCall, GatedCalls, GatedRemote, MemoryRemote, RemoteCall};
pub use snapshot::{decode_snapshot, encode_snapshot, load_snapshot};
pub use store::{EntityStore, StoreState, StoreStats};
