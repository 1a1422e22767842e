//! Notes.

use serde::{Deserialize, Serialize};
use tether_protocol::{EntityId, SyncEntity};

/// A note with a title and free-form content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Identifier (temporary until the create call resolves).
    pub id: EntityId,
    /// Title shown in lists.
    pub title: String,
    /// Body text.
    #[serde(default)]
    pub content: String,
    /// Pinned notes are listed first by the UI.
    #[serde(default)]
    pub pinned: bool,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: u64,
}

/// Input for creating a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    /// Title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Whether the note starts pinned.
    pub pinned: bool,
}

impl NoteDraft {
    /// Creates a draft with a title and empty content.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
}

/// Partial update of a note. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New pin state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

impl NotePatch {
    /// A patch that only changes the title.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// A patch that only changes the content.
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// A patch that only changes the pin state.
    pub fn pinned(pinned: bool) -> Self {
        Self {
            pinned: Some(pinned),
            ..Self::default()
        }
    }
}

impl SyncEntity for Note {
    type Draft = NoteDraft;
    type Patch = NotePatch;

    const KIND: &'static str = "note";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_draft(id: EntityId, draft: &NoteDraft, created_at: u64) -> Self {
        Self {
            id,
            title: draft.title.clone(),
            content: draft.content.clone(),
            pinned: draft.pinned,
            created_at,
        }
    }

    fn apply_patch(&mut self, patch: &NotePatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(content) = &patch.content {
            self.content.clone_from(content);
        }
        if let Some(pinned) = patch.pinned {
            self.pinned = pinned;
        }
    }
}
