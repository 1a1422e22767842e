//! Optimistic entity store.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::identity::{unix_millis, IdentityReconciler, Reconciliation};
use crate::pending::{InFlightRegistry, MutationOutcome, PendingMutation};
use crate::snapshot::{dedupe_by_id, encode_snapshot, load_snapshot};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;
use tether_protocol::{
    BoundedField, EntityId, MutationKind, RemoteError, RemoteResult, RemoteService, SyncEntity,
};
use tether_storage::SnapshotStore;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Lifecycle of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Opened; serving the persisted or seeded collection.
    Init,
    /// Waiting for the remote collection.
    Hydrating,
    /// The collection was replaced by the remote collection.
    Ready,
    /// The last hydration failed; serving the collection as it was.
    Stale,
}

impl StoreState {
    /// Returns true once a hydration has succeeded.
    pub fn is_hydrated(&self) -> bool {
        matches!(self, StoreState::Ready)
    }

    /// Returns true if a hydration can start.
    pub fn can_hydrate(&self) -> bool {
        !matches!(self, StoreState::Hydrating)
    }
}

/// Counters describing what a store has done since it was opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Mutations whose optimistic effect was applied.
    pub mutations_started: u64,
    /// Updates, deletes and field updates confirmed by the remote service.
    pub commits: u64,
    /// Creates whose temporary entity was swapped for the canonical one.
    pub reconciliations: u64,
    /// Creates confirmed after their temporary entity had vanished.
    pub dropped_reconciliations: u64,
    /// Mutations reverted after a remote failure.
    pub rollbacks: u64,
    /// Successful hydrations.
    pub hydrations: u64,
    /// Snapshot saves that failed.
    pub persistence_failures: u64,
    /// Time of the last successful hydration.
    pub last_hydrated_at: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// An immediately-consistent local copy of a remote entity collection.
///
/// Every mutation is applied to the local collection at once, persisted,
/// published to subscribers, and then confirmed against the remote service
/// in a background task:
///
/// - on success the canonical entity returned by the service replaces the
///   local one (for creates, the temporary id is swapped for the permanent
///   id at the same position)
/// - on failure the optimistic change is reverted: creates remove their
///   temporary entity, every other mutation restores the full collection
///   captured when it started
///
/// The resulting collection is persisted and published after the remote
/// phase as well, whatever its outcome.
///
/// # Overlapping mutations
///
/// With [`crate::InFlightPolicy::Overlap`] nothing serializes mutations on
/// the same entity. If mutation A fails after mutation B applied, A's
/// rollback restores the collection from before A and discards B's change,
/// even when B was confirmed. The same holds for changes to other entities
/// made while A was in flight. `hydrate` replaces the whole collection and
/// can likewise overwrite optimistic changes still in flight.
///
/// # Runtime
///
/// Mutations spawn their remote phase with `tokio::spawn` and must be
/// called from within a Tokio runtime.
///
/// # Example
///
/// ```rust,ignore
/// use tether_engine::{EntityStore, MemoryRemote, StoreConfig};
/// use tether_models::{Note, NoteDraft};
/// use tether_storage::InMemorySnapshotStore;
///
/// let store = EntityStore::open(
///     StoreConfig::new("notes"),
///     MemoryRemote::<Note>::new(),
///     InMemorySnapshotStore::new(),
/// )?;
/// store.hydrate().await?;
///
/// let pending = store.create(NoteDraft::titled("Groceries"));
/// // The note is visible immediately under a temporary id
/// assert_eq!(store.len(), 1);
/// let outcome = pending.settled().await;
/// ```
pub struct EntityStore<E, R, P> {
    shared: Arc<Shared<E, R, P>>,
}

impl<E, R, P> Clone for EntityStore<E, R, P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<E, R, P> {
    config: StoreConfig,
    remote: R,
    persistence: P,
    ids: IdentityReconciler,
    collection: Mutex<Vec<E>>,
    publisher: watch::Sender<Vec<E>>,
    state: RwLock<StoreState>,
    stats: RwLock<StoreStats>,
    in_flight: InFlightRegistry,
}

impl<E, R, P> EntityStore<E, R, P>
where
    E: SyncEntity,
    R: RemoteService<E> + 'static,
    P: SnapshotStore + 'static,
{
    /// Opens a store, seeding the collection from the persisted snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured name is not a valid snapshot key.
    pub fn open(config: StoreConfig, remote: R, persistence: P) -> StoreResult<Self> {
        Self::open_with_seed(config, remote, persistence, Vec::new())
    }

    /// Opens a store. `seed` is used when no snapshot is persisted, when
    /// the snapshot cannot be read, or when snapshot restore is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured name is not a valid snapshot key.
    pub fn open_with_seed(
        config: StoreConfig,
        remote: R,
        persistence: P,
        seed: Vec<E>,
    ) -> StoreResult<Self> {
        config.validate()?;

        let initial = if config.restore_snapshot {
            match load_snapshot::<E>(&persistence, &config.name) {
                Ok(Some(snapshot)) => {
                    debug!(store = %config.name, entities = snapshot.len(), "snapshot restored");
                    snapshot
                }
                Ok(None) => seed,
                Err(e) => {
                    warn!(store = %config.name, error = %e, "snapshot unreadable, starting from seed");
                    seed
                }
            }
        } else {
            seed
        };

        let (initial, dropped) = dedupe_by_id(initial);
        if dropped > 0 {
            warn!(store = %config.name, dropped, "duplicate ids collapsed at open");
        }

        let (publisher, _) = watch::channel(initial.clone());

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                remote,
                persistence,
                ids: IdentityReconciler::new(),
                collection: Mutex::new(initial),
                publisher,
                state: RwLock::new(StoreState::Init),
                stats: RwLock::new(StoreStats::default()),
                in_flight: InFlightRegistry::default(),
            }),
        })
    }

    /// Replaces the collection with the remote collection.
    ///
    /// On failure the collection is left untouched, the state becomes
    /// [`StoreState::Stale`] and the error is returned. No retry is made.
    ///
    /// Returns the number of entities loaded.
    pub async fn hydrate(&self) -> StoreResult<usize> {
        let shared = &self.shared;
        {
            let mut state = shared.state.write();
            if !state.can_hydrate() {
                return Err(StoreError::AlreadyHydrating {
                    store: shared.config.name.clone(),
                });
            }
            *state = StoreState::Hydrating;
        }

        match shared.remote.get_all().await {
            Ok(entities) => {
                let (entities, dropped) = dedupe_by_id(entities);
                if dropped > 0 {
                    warn!(store = %shared.config.name, dropped, "duplicate ids in remote collection");
                }
                let count = entities.len();
                shared.commit(|collection| *collection = entities);

                *shared.state.write() = StoreState::Ready;
                {
                    let mut stats = shared.stats.write();
                    stats.hydrations += 1;
                    stats.last_hydrated_at = Some(Instant::now());
                }
                info!(store = %shared.config.name, entities = count, "hydrated");
                Ok(count)
            }
            Err(error) => {
                warn!(store = %shared.config.name, error = %error, "hydration failed, keeping local collection");
                *shared.state.write() = StoreState::Stale;
                shared.stats.write().last_error = Some(error.to_string());
                Err(error.into())
            }
        }
    }

    /// Inserts a new entity at the head of the collection under a temporary
    /// id, then creates it remotely.
    pub fn create(&self, draft: E::Draft) -> PendingMutation {
        let shared = &self.shared;
        let temporary = shared.ids.new_temporary_id();
        let token = shared.in_flight.register(&temporary);

        let entity = E::from_draft(temporary.clone(), &draft, unix_millis());
        shared.commit(|collection| collection.insert(0, entity));
        shared.stats.write().mutations_started += 1;
        debug!(store = %shared.config.name, kind = E::KIND, temporary = %temporary, "optimistic create");

        let task_shared = Arc::clone(shared);
        let target = temporary.clone();
        let task = tokio::spawn(async move {
            let _token = token;
            let result = task_shared.remote.create(&draft).await;
            task_shared.settle_create(&temporary, result)
        });

        PendingMutation::new(MutationKind::Create, target, task)
    }

    /// Applies `patch` to the entity `id`, then updates it remotely.
    ///
    /// An unknown id leaves the collection unchanged; the remote call is
    /// still made.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MutationInFlight`] under the reject policy.
    pub fn update(&self, id: &EntityId, patch: E::Patch) -> StoreResult<PendingMutation> {
        let shared = &self.shared;
        let token = shared.in_flight.acquire(id, shared.config.in_flight)?;

        let previous = shared.commit(|collection| {
            let previous = collection.clone();
            if let Some(entity) = collection.iter_mut().find(|e| e.id() == id) {
                entity.apply_patch(&patch);
            }
            previous
        });
        shared.stats.write().mutations_started += 1;
        debug!(store = %shared.config.name, kind = E::KIND, id = %id, "optimistic update");

        let task_shared = Arc::clone(shared);
        let target = id.clone();
        let task = tokio::spawn(async move {
            let _token = token;
            let result = task_shared.remote.update(&target, &patch).await;
            task_shared.settle_replace(MutationKind::Update, &target, previous, result)
        });

        Ok(PendingMutation::new(MutationKind::Update, id.clone(), task))
    }

    /// Removes the entity `id`, then deletes it remotely.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MutationInFlight`] under the reject policy.
    pub fn delete(&self, id: &EntityId) -> StoreResult<PendingMutation> {
        let shared = &self.shared;
        let token = shared.in_flight.acquire(id, shared.config.in_flight)?;

        let previous = shared.commit(|collection| {
            let previous = collection.clone();
            collection.retain(|e| e.id() != id);
            previous
        });
        shared.stats.write().mutations_started += 1;
        debug!(store = %shared.config.name, kind = E::KIND, id = %id, "optimistic delete");

        let task_shared = Arc::clone(shared);
        let target = id.clone();
        let task = tokio::spawn(async move {
            let _token = token;
            let result = task_shared.remote.delete(&target).await;
            task_shared.settle_delete(&target, previous, result)
        });

        Ok(PendingMutation::new(MutationKind::Delete, id.clone(), task))
    }

    /// Sets a bounded field on the entity `id`, then updates it remotely.
    ///
    /// `value` is clamped into the field's range before it is applied and
    /// before it is sent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MutationInFlight`] under the reject policy.
    pub fn update_field(
        &self,
        id: &EntityId,
        field: &BoundedField<E>,
        value: i64,
    ) -> StoreResult<PendingMutation> {
        let shared = &self.shared;
        let token = shared.in_flight.acquire(id, shared.config.in_flight)?;

        let clamped = field.clamp(value);
        if clamped != value {
            debug!(store = %shared.config.name, field = field.name, value, clamped, "value clamped");
        }

        let previous = shared.commit(|collection| {
            let previous = collection.clone();
            if let Some(entity) = collection.iter_mut().find(|e| e.id() == id) {
                field.apply(entity, clamped);
            }
            previous
        });
        shared.stats.write().mutations_started += 1;
        debug!(store = %shared.config.name, kind = E::KIND, id = %id, field = field.name, "optimistic field update");

        let task_shared = Arc::clone(shared);
        let target = id.clone();
        let name = field.name;
        let task = tokio::spawn(async move {
            let _token = token;
            let result = task_shared.remote.update_field(&target, name, clamped).await;
            task_shared.settle_replace(MutationKind::FieldUpdate, &target, previous, result)
        });

        Ok(PendingMutation::new(MutationKind::FieldUpdate, id.clone(), task))
    }

    /// Returns a copy of the current collection.
    pub fn snapshot(&self) -> Vec<E> {
        self.shared.collection.lock().clone()
    }

    /// Returns a copy of the entity `id`.
    pub fn get(&self, id: &EntityId) -> Option<E> {
        self.shared
            .collection
            .lock()
            .iter()
            .find(|e| e.id() == id)
            .cloned()
    }

    /// Number of entities in the collection.
    pub fn len(&self) -> usize {
        self.shared.collection.lock().len()
    }

    /// Returns true if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.shared.collection.lock().is_empty()
    }

    /// Subscribes to the collection. The receiver sees every new value
    /// published after an optimistic apply, a reconciliation, a rollback or
    /// a hydration.
    pub fn subscribe(&self) -> watch::Receiver<Vec<E>> {
        self.shared.publisher.subscribe()
    }

    /// Number of unsettled mutations on `id`.
    pub fn in_flight(&self, id: &EntityId) -> usize {
        self.shared.in_flight.count(id)
    }
}

impl<E, R, P> EntityStore<E, R, P> {
    /// Store name.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StoreState {
        *self.shared.state.read()
    }

    /// Current statistics.
    pub fn stats(&self) -> StoreStats {
        self.shared.stats.read().clone()
    }

    /// The injected remote service.
    pub fn remote(&self) -> &R {
        &self.shared.remote
    }

    /// The injected snapshot store.
    pub fn persistence(&self) -> &P {
        &self.shared.persistence
    }
}

impl<E, R, P> Shared<E, R, P>
where
    E: SyncEntity,
    P: SnapshotStore,
{
    /// Mutates the collection, then persists and publishes the result while
    /// still holding the lock, so saves and notifications keep the order of
    /// the changes that caused them.
    fn commit<T>(&self, mutate: impl FnOnce(&mut Vec<E>) -> T) -> T {
        let mut collection = self.collection.lock();
        let result = mutate(&mut collection);
        self.persist(&collection);
        self.publisher.send_replace(collection.clone());
        result
    }

    fn persist(&self, collection: &[E]) {
        let saved = encode_snapshot(collection).and_then(|bytes| {
            self.persistence
                .save(&self.config.name, &bytes)
                .map_err(StoreError::from)
        });

        if let Err(e) = saved {
            warn!(store = %self.config.name, error = %e, "snapshot save failed");
            let mut stats = self.stats.write();
            stats.persistence_failures += 1;
            stats.last_error = Some(e.to_string());
        }
    }

    fn settle_create(&self, temporary: &EntityId, result: RemoteResult<E>) -> MutationOutcome {
        match result {
            Ok(canonical) => {
                let permanent = canonical.id().clone();
                if permanent.is_temporary() {
                    warn!(store = %self.config.name, permanent = %permanent, "remote returned an id with the temporary prefix");
                }

                let reconciliation =
                    self.commit(|collection| self.ids.reconcile(collection, temporary, canonical));

                match reconciliation {
                    Reconciliation::Replaced { .. } | Reconciliation::Collapsed => {
                        self.stats.write().reconciliations += 1;
                        debug!(store = %self.config.name, temporary = %temporary, permanent = %permanent, "create reconciled");
                        MutationOutcome::Reconciled {
                            temporary: temporary.clone(),
                            permanent,
                        }
                    }
                    Reconciliation::Dropped => {
                        self.stats.write().dropped_reconciliations += 1;
                        debug!(store = %self.config.name, temporary = %temporary, permanent = %permanent, "temporary entity gone, create response dropped");
                        MutationOutcome::Dropped {
                            temporary: temporary.clone(),
                            permanent,
                        }
                    }
                }
            }
            Err(error) => {
                self.commit(|collection| self.ids.discard(collection, temporary));
                self.record_rollback(MutationKind::Create, temporary, &error);
                MutationOutcome::RolledBack { error }
            }
        }
    }

    fn settle_replace(
        &self,
        kind: MutationKind,
        id: &EntityId,
        previous: Vec<E>,
        result: RemoteResult<E>,
    ) -> MutationOutcome {
        match result {
            Ok(canonical) => {
                self.commit(|collection| {
                    let moved = canonical.id() != id;
                    if moved && collection.iter().any(|e| e.id() == canonical.id()) {
                        warn!(store = %self.config.name, kind = %kind, id = %id, canonical = %canonical.id(), "remote returned an id already in the collection, keeping local entity");
                        return;
                    }
                    if let Some(slot) = collection.iter_mut().find(|e| e.id() == id) {
                        *slot = canonical;
                    }
                });
                self.record_commit(kind, id);
                MutationOutcome::Committed
            }
            Err(error) => {
                self.commit(|collection| *collection = previous);
                self.record_rollback(kind, id, &error);
                MutationOutcome::RolledBack { error }
            }
        }
    }

    fn settle_delete(
        &self,
        id: &EntityId,
        previous: Vec<E>,
        result: RemoteResult<()>,
    ) -> MutationOutcome {
        match result {
            Ok(()) => {
                self.commit(|_| ());
                self.record_commit(MutationKind::Delete, id);
                MutationOutcome::Committed
            }
            Err(error) => {
                self.commit(|collection| *collection = previous);
                self.record_rollback(MutationKind::Delete, id, &error);
                MutationOutcome::RolledBack { error }
            }
        }
    }

    fn record_commit(&self, kind: MutationKind, id: &EntityId) {
        self.stats.write().commits += 1;
        debug!(store = %self.config.name, kind = %kind, id = %id, "mutation confirmed");
    }

    fn record_rollback(&self, kind: MutationKind, id: &EntityId, error: &RemoteError) {
        warn!(store = %self.config.name, kind = %kind, id = %id, error = %error, "remote call failed, rolled back");
        let mut stats = self.stats.write();
        stats.rollbacks += 1;
        stats.last_error = Some(error.to_string());
    }
}
