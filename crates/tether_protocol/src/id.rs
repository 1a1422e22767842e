//! Entity identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix reserved for client-issued temporary identifiers.
///
/// Permanent identifiers are issued by the remote service and never start
/// with this prefix.
pub const TEMPORARY_PREFIX: &str = "tmp:";

/// Unique identifier for an entity.
///
/// An identifier is either:
/// - **permanent**: issued by the remote service when a create succeeds
/// - **temporary**: issued locally at optimistic insertion and retired when
///   the matching create call resolves
///
/// Both kinds are plain strings on the wire.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates an identifier from its string form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds a temporary identifier from a process seed and a sequence number.
    #[must_use]
    pub fn temporary(seed: u64, sequence: u64) -> Self {
        Self(format!("{TEMPORARY_PREFIX}{seed:x}:{sequence}"))
    }

    /// Returns true if this identifier was issued locally and still awaits
    /// a server-assigned replacement.
    #[inline]
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }

    /// Returns the string form.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier and returns the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
