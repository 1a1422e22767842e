//! # Tether Models
//!
//! The entity families synchronized by the productivity app:
//!
//! - [`Note`] - free-form notes with a title, body and pin flag
//! - [`Goal`] - goals with a 0-100 progress field ([`PROGRESS`])
//!
//! Each family provides its `Draft` (creation input) and `Patch`
//! (partial update) types.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod goal;
mod note;

pub use goal::{Goal, GoalDraft, GoalPatch, PROGRESS};
pub use note::{Note, NoteDraft, NotePatch};
