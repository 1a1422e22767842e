//! Script runner checking store invariants.
//!
//! A script is run one step at a time against a goal store backed by
//! [`MemoryRemote`](tether_engine::MemoryRemote), each mutation settling
//! before the next begins. With no overlap between mutations the store must
//! converge after every step:
//!
//! - no two entities share an id
//! - no temporary id is left in the collection
//! - the local collection equals the server collection, order included
//! - the persisted snapshot equals the local collection

use crate::fixtures::{memory_goal_store, MemoryStore};
use crate::generators::{GoalOperation, ScriptStep};
use std::collections::HashSet;
use tether_engine::{load_snapshot, MutationOutcome, PendingMutation, StoreResult};
use tether_models::{Goal, PROGRESS};
use tether_protocol::EntityId;

/// Counters collected while running a script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Steps run.
    pub steps: usize,
    /// Steps skipped because the collection was empty.
    pub skipped: usize,
    /// Mutations the remote service accepted.
    pub accepted: usize,
    /// Mutations rolled back.
    pub rolled_back: usize,
    /// Hydrations that succeeded.
    pub hydrations: usize,
    /// Hydrations that failed.
    pub failed_hydrations: usize,
}

/// Runs scripts against a goal store and records invariant violations.
pub struct ScenarioRunner {
    store: MemoryStore<Goal>,
    report: ScenarioReport,
    violations: Vec<String>,
}

impl ScenarioRunner {
    /// Opens a goal store whose remote holds `server` and hydrates it.
    pub async fn start(server: Vec<Goal>) -> Self {
        let store = memory_goal_store(server);
        store.hydrate().await.expect("Initial hydration failed");
        let mut runner = Self {
            store,
            report: ScenarioReport::default(),
            violations: Vec::new(),
        };
        runner.check("start");
        runner
    }

    /// The store under test.
    pub fn store(&self) -> &MemoryStore<Goal> {
        &self.store
    }

    /// Counters so far.
    pub fn report(&self) -> &ScenarioReport {
        &self.report
    }

    /// Violations found so far, each prefixed with the step that caused it.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Panics if any violation was found.
    pub fn assert_consistent(&self) {
        assert!(
            self.violations.is_empty(),
            "store invariants violated:\n{}",
            self.violations.join("\n")
        );
    }

    /// Runs every step of `script`.
    pub async fn run(&mut self, script: &[ScriptStep]) {
        for step in script {
            self.step(step).await;
        }
    }

    /// Runs one step and checks the invariants afterwards.
    pub async fn step(&mut self, step: &ScriptStep) {
        let label = format!("step {} ({:?})", self.report.steps, step.operation);
        self.report.steps += 1;

        if let GoalOperation::Hydrate = step.operation {
            self.hydrate(step.fail, &label).await;
            self.check(&label);
            return;
        }

        let Some(pending) = self.start_mutation(step) else {
            self.report.skipped += 1;
            return;
        };

        let outcome = match pending {
            Ok(pending) => pending.settled().await,
            Err(e) => {
                self.violations
                    .push(format!("{label}: mutation refused: {e}"));
                return;
            }
        };

        match (&outcome, step.fail) {
            (MutationOutcome::RolledBack { .. }, true) => self.report.rolled_back += 1,
            (outcome, false) if outcome.is_success() => self.report.accepted += 1,
            (outcome, fail) => self
                .violations
                .push(format!("{label}: unexpected outcome {outcome:?} (fail = {fail})")),
        }
        self.check(&label);
    }

    async fn hydrate(&mut self, fail: bool, label: &str) {
        if fail {
            self.store.remote().fail_next(1);
        }
        match (self.store.hydrate().await, fail) {
            (Ok(_), false) => self.report.hydrations += 1,
            (Err(_), true) => self.report.failed_hydrations += 1,
            (result, _) => self
                .violations
                .push(format!("{label}: unexpected hydration result {result:?}")),
        }
    }

    fn start_mutation(&self, step: &ScriptStep) -> Option<StoreResult<PendingMutation>> {
        let target = match &step.operation {
            GoalOperation::Create(_) | GoalOperation::Hydrate => None,
            GoalOperation::Update { slot, .. }
            | GoalOperation::SetProgress { slot, .. }
            | GoalOperation::Delete { slot } => Some(self.target(*slot)?),
        };

        if step.fail {
            self.store.remote().fail_next(1);
        }

        let pending = match (&step.operation, target) {
            (GoalOperation::Create(draft), _) => Ok(self.store.create(draft.clone())),
            (GoalOperation::Update { patch, .. }, Some(id)) => {
                self.store.update(&id, patch.clone())
            }
            (GoalOperation::SetProgress { value, .. }, Some(id)) => {
                self.store.update_field(&id, &PROGRESS, *value)
            }
            (GoalOperation::Delete { .. }, Some(id)) => self.store.delete(&id),
            _ => return None,
        };
        Some(pending)
    }

    fn target(&self, slot: usize) -> Option<EntityId> {
        let collection = self.store.snapshot();
        if collection.is_empty() {
            return None;
        }
        Some(collection[slot % collection.len()].id.clone())
    }

    fn check(&mut self, label: &str) {
        let local = self.store.snapshot();

        let mut seen = HashSet::new();
        for goal in &local {
            if !seen.insert(goal.id.clone()) {
                self.violations
                    .push(format!("{label}: duplicate id {}", goal.id));
            }
            if goal.id.is_temporary() {
                self.violations
                    .push(format!("{label}: temporary id {} left behind", goal.id));
            }
            if !(PROGRESS.min..=PROGRESS.max).contains(&goal.progress) {
                self.violations.push(format!(
                    "{label}: progress {} out of range on {}",
                    goal.progress, goal.id
                ));
            }
        }

        if local != self.store.remote().entities() {
            self.violations
                .push(format!("{label}: local collection differs from server"));
        }

        match load_snapshot::<Goal>(self.store.persistence(), self.store.name()) {
            Ok(Some(persisted)) if persisted == local => {}
            Ok(Some(_)) => self
                .violations
                .push(format!("{label}: persisted snapshot differs from local")),
            Ok(None) => self
                .violations
                .push(format!("{label}: nothing persisted")),
            Err(e) => self
                .violations
                .push(format!("{label}: persisted snapshot unreadable: {e}")),
        }
    }
}

/// Runs `script` on a fresh current-thread runtime and returns the runner.
pub fn run_script(server: Vec<Goal>, script: &[ScriptStep]) -> ScenarioRunner {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");
    runtime.block_on(async {
        let mut runner = ScenarioRunner::start(server).await;
        runner.run(script).await;
        runner
    })
}
