//! Goals.

use serde::{Deserialize, Serialize};
use tether_protocol::{BoundedField, EntityId, SyncEntity};

/// Goal progress in percent, clamped to `0..=100`.
pub const PROGRESS: BoundedField<Goal> = BoundedField::new("progress", 0, 100, set_progress);

fn set_progress(goal: &mut Goal, value: i64) {
    goal.progress = value;
}

/// A goal tracked towards completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    /// Identifier (temporary until the create call resolves).
    pub id: EntityId,
    /// Title.
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Completion in percent (see [`PROGRESS`]).
    #[serde(default)]
    pub progress: i64,
    /// Target date as `YYYY-MM-DD`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl Goal {
    /// Returns true once progress reaches the upper bound.
    pub fn is_complete(&self) -> bool {
        self.progress >= PROGRESS.max
    }
}

/// Input for creating a goal. New goals start at zero progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalDraft {
    /// Title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Target date as `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
}

impl GoalDraft {
    /// Creates a draft with a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the target date.
    #[must_use]
    pub fn due(mut self, date: impl Into<String>) -> Self {
        self.target_date = Some(date.into());
        self
    }
}

/// Partial update of a goal. `None` fields are left untouched.
///
/// Progress is not part of the patch; it goes through [`PROGRESS`] so that
/// it is always clamped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalPatch {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New target date; `Some(None)` clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<Option<String>>,
}

impl GoalPatch {
    /// A patch that only changes the title.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// A patch that only changes the description.
    pub fn description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }
}

impl SyncEntity for Goal {
    type Draft = GoalDraft;
    type Patch = GoalPatch;

    const KIND: &'static str = "goal";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_draft(id: EntityId, draft: &GoalDraft, created_at: u64) -> Self {
        Self {
            id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            progress: PROGRESS.min,
            target_date: draft.target_date.clone(),
            created_at,
        }
    }

    fn apply_patch(&mut self, patch: &GoalPatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(target_date) = &patch.target_date {
            self.target_date.clone_from(target_date);
        }
    }
}
