//! Mutation kinds.

use std::fmt;

/// Kind of user-triggered mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// A new entity was inserted under a temporary id.
    Create,
    /// A patch was applied to an existing entity.
    Update,
    /// An entity was removed.
    Delete,
    /// A single bounded field was set.
    FieldUpdate,
}

impl MutationKind {
    /// Returns the lowercase name used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
            MutationKind::FieldUpdate => "field_update",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
