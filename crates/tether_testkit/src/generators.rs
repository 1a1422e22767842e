//! Property-based test generators using proptest.
//!
//! Provides strategies for entity drafts, patches, identifiers and whole
//! operation scripts.

use proptest::prelude::*;
use tether_models::{GoalDraft, GoalPatch, NoteDraft, NotePatch};
use tether_protocol::EntityId;

/// Strategy for generating permanent entity ids.
pub fn permanent_id_strategy() -> impl Strategy<Value = EntityId> {
    "[a-z0-9]{8}(-[a-z0-9]{4}){0,3}".prop_map(EntityId::new)
}

/// Strategy for generating ids that look like temporary ids.
pub fn temporary_id_strategy() -> impl Strategy<Value = EntityId> {
    (any::<u64>(), 1..u64::MAX).prop_map(|(seed, sequence)| EntityId::temporary(seed, sequence))
}

/// Strategy for generating valid store names.
pub fn store_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_-]{1,32}").expect("Invalid regex")
}

fn title_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,23}"
}

fn body_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ,.\n]{0,64}"
}

/// Strategy for generating note drafts.
pub fn note_draft_strategy() -> impl Strategy<Value = NoteDraft> {
    (title_strategy(), body_strategy(), any::<bool>()).prop_map(|(title, content, pinned)| {
        NoteDraft {
            title,
            content,
            pinned,
        }
    })
}

/// Strategy for generating note patches that set at least one field.
pub fn note_patch_strategy() -> impl Strategy<Value = NotePatch> {
    (
        prop::option::of(title_strategy()),
        prop::option::of(body_strategy()),
        prop::option::of(any::<bool>()),
    )
        .prop_filter("patch must change something", |(t, c, p)| {
            t.is_some() || c.is_some() || p.is_some()
        })
        .prop_map(|(title, content, pinned)| NotePatch {
            title,
            content,
            pinned,
        })
}

fn date_strategy() -> impl Strategy<Value = String> {
    (2024u32..2030, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| format!("{y:04}-{m:02}-{d:02}"))
}

/// Strategy for generating goal drafts.
pub fn goal_draft_strategy() -> impl Strategy<Value = GoalDraft> {
    (
        title_strategy(),
        body_strategy(),
        prop::option::of(date_strategy()),
    )
        .prop_map(|(title, description, target_date)| GoalDraft {
            title,
            description,
            target_date,
        })
}

/// Strategy for generating goal patches that set at least one field.
pub fn goal_patch_strategy() -> impl Strategy<Value = GoalPatch> {
    (
        prop::option::of(title_strategy()),
        prop::option::of(body_strategy()),
        prop::option::of(prop::option::of(date_strategy())),
    )
        .prop_filter("patch must change something", |(t, d, td)| {
            t.is_some() || d.is_some() || td.is_some()
        })
        .prop_map(|(title, description, target_date)| GoalPatch {
            title,
            description,
            target_date,
        })
}

/// Strategy for progress values, mostly in range and sometimes far out of
/// it.
pub fn progress_value_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![
        4 => 0i64..=100,
        1 => -1_000i64..0,
        1 => 101i64..1_000,
        1 => Just(i64::MIN),
        1 => Just(i64::MAX),
    ]
}

/// One step of a goal-store script.
///
/// Steps address entities by `slot`, an index taken modulo the current
/// collection length when the step runs; on an empty collection such steps
/// are skipped.
#[derive(Debug, Clone)]
pub enum GoalOperation {
    /// Create a goal.
    Create(GoalDraft),
    /// Patch a goal.
    Update {
        /// Position of the target.
        slot: usize,
        /// Patch to apply.
        patch: GoalPatch,
    },
    /// Set a goal's progress.
    SetProgress {
        /// Position of the target.
        slot: usize,
        /// Requested value, before clamping.
        value: i64,
    },
    /// Delete a goal.
    Delete {
        /// Position of the target.
        slot: usize,
    },
    /// Reload the collection from the remote service.
    Hydrate,
}

/// A script step: the operation and whether its remote call fails.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    /// The operation.
    pub operation: GoalOperation,
    /// Whether the remote call made for the operation fails.
    pub fail: bool,
}

/// Strategy for generating goal operations.
pub fn goal_operation_strategy() -> impl Strategy<Value = GoalOperation> {
    let slot = 0usize..16;
    prop_oneof![
        3 => goal_draft_strategy().prop_map(GoalOperation::Create),
        2 => (slot.clone(), goal_patch_strategy())
            .prop_map(|(slot, patch)| GoalOperation::Update { slot, patch }),
        2 => (slot.clone(), progress_value_strategy())
            .prop_map(|(slot, value)| GoalOperation::SetProgress { slot, value }),
        1 => slot.prop_map(|slot| GoalOperation::Delete { slot }),
        1 => Just(GoalOperation::Hydrate),
    ]
}

/// Strategy for generating script steps; roughly one in four fails.
pub fn script_step_strategy() -> impl Strategy<Value = ScriptStep> {
    (goal_operation_strategy(), prop::bool::weighted(0.25))
        .prop_map(|(operation, fail)| ScriptStep { operation, fail })
}

/// Strategy for generating a script.
pub fn script_strategy(min_steps: usize, max_steps: usize) -> impl Strategy<Value = Vec<ScriptStep>> {
    prop::collection::vec(script_step_strategy(), min_steps..max_steps)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
