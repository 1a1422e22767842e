//! # Tether Protocol
//!
//! Entity and remote-service contracts shared by every Tether crate.
//!
//! This crate provides:
//! - `EntityId` with the temporary/permanent distinction
//! - The `SyncEntity` trait implemented by every synchronized record
//! - `BoundedField` for clamped field mutators
//! - The `RemoteService` contract and its tagged `RemoteError`
//!
//! This is a pure contract crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod error;
mod id;
mod operation;
mod remote;

pub use entity::{BoundedField, SyncEntity};
pub use error::{RemoteError, RemoteResult};
pub use id::{EntityId, TEMPORARY_PREFIX};
pub use operation::MutationKind;
pub use remote::RemoteService;
