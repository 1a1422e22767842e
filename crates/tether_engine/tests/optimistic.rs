//! Optimistic apply, reconciliation and rollback through the public API.

use std::sync::Arc;
use tether_engine::{
    EntityStore, GatedRemote, InFlightPolicy, MemoryRemote, MutationOutcome, RemoteCall,
    StoreConfig, StoreError, StoreState,
};
use tether_models::{Goal, GoalDraft, Note, NoteDraft, NotePatch, PROGRESS};
use tether_protocol::{EntityId, RemoteError, SyncEntity};
use tether_storage::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore};

fn note(id: &str, title: &str) -> Note {
    Note::from_draft(EntityId::from(id), &NoteDraft::titled(title), 1)
}

fn goal(id: &str, title: &str) -> Goal {
    Goal::from_draft(EntityId::from(id), &GoalDraft::titled(title), 1)
}

fn memory_notes(
    server: Vec<Note>,
) -> EntityStore<Note, MemoryRemote<Note>, InMemorySnapshotStore> {
    EntityStore::open(
        StoreConfig::new("notes"),
        MemoryRemote::with_entities(server),
        InMemorySnapshotStore::new(),
    )
    .unwrap()
}

fn gated_notes(
    seed: Vec<Note>,
    policy: InFlightPolicy,
) -> (
    EntityStore<Note, GatedRemote<Note>, InMemorySnapshotStore>,
    tether_engine::GatedCalls<Note>,
) {
    let (remote, calls) = GatedRemote::new();
    let store = EntityStore::open_with_seed(
        StoreConfig::new("notes").with_in_flight_policy(policy),
        remote,
        InMemorySnapshotStore::new(),
        seed,
    )
    .unwrap();
    (store, calls)
}

#[tokio::test]
async fn create_success_reconciles_in_place() {
    let store = memory_notes(vec![note("n1", "existing")]);
    store.hydrate().await.unwrap();

    let pending = store.create(NoteDraft::titled("groceries"));
    let temporary = pending.target().clone();
    assert!(temporary.is_temporary());

    // Visible immediately at the head
    let optimistic = store.snapshot();
    assert_eq!(optimistic.len(), 2);
    assert_eq!(optimistic[0].id, temporary);
    assert_eq!(optimistic[0].title, "groceries");

    let outcome = pending.settled().await;
    let MutationOutcome::Reconciled { permanent, .. } = &outcome else {
        panic!("unexpected outcome {outcome:?}");
    };

    let collection = store.snapshot();
    assert_eq!(collection.len(), 2);
    assert_eq!(&collection[0].id, permanent);
    assert_eq!(collection[0], store.remote().entities()[0]);
    assert!(collection.iter().all(|n| n.id != temporary));
    assert_eq!(store.stats().reconciliations, 1);
}

#[tokio::test]
async fn create_reconciles_at_the_temporary_position() {
    let (store, mut calls) = gated_notes(vec![note("n1", "a")], InFlightPolicy::Overlap);

    let first = store.create(NoteDraft::titled("first"));
    let first_call = calls.next().await.unwrap();
    let second = store.create(NoteDraft::titled("second"));
    let second_call = calls.next().await.unwrap();
    assert_eq!(first_call.call(), &RemoteCall::Create);

    // [second, first, n1]
    assert_eq!(store.snapshot()[1].id, *first.target());

    first_call.reply_entity(note("server-1", "first"));
    assert!(first.settled().await.is_success());

    let collection = store.snapshot();
    assert_eq!(collection[0].id, *second.target());
    assert_eq!(collection[1], note("server-1", "first"));
    assert_eq!(collection[2].id.as_str(), "n1");

    second_call.reply_entity(note("server-2", "second"));
    second.settled().await;
    let ids: Vec<String> = store
        .snapshot()
        .into_iter()
        .map(|n| n.id.into_string())
        .collect();
    assert_eq!(ids, ["server-2", "server-1", "n1"]);
}

#[tokio::test]
async fn create_failure_restores_collection() {
    let store = memory_notes(vec![note("n1", "existing")]);
    store.hydrate().await.unwrap();
    let before = store.snapshot();

    store.remote().fail_next(1);
    let pending = store.create(NoteDraft::titled("doomed"));
    let temporary = pending.target().clone();

    let outcome = pending.settled().await;
    assert!(matches!(outcome, MutationOutcome::RolledBack { .. }));
    assert_eq!(store.snapshot(), before);
    assert!(store.get(&temporary).is_none());
    assert_eq!(store.remote().entities(), before);
}

#[tokio::test]
async fn update_failure_restores_previous_collection() {
    let store = memory_notes(vec![note("n1", "a"), note("n2", "b")]);
    store.hydrate().await.unwrap();
    let c0 = store.snapshot();

    store.remote().fail_next(1);
    let pending = store
        .update(&EntityId::from("n2"), NotePatch::title("changed"))
        .unwrap();
    assert_eq!(store.get(&EntityId::from("n2")).unwrap().title, "changed");

    let outcome = pending.settled().await;
    assert_eq!(
        outcome,
        MutationOutcome::RolledBack {
            error: RemoteError::transport_retryable("injected failure")
        }
    );
    assert_eq!(store.snapshot(), c0);
    assert_eq!(store.stats().rollbacks, 1);
}

#[tokio::test]
async fn update_success_takes_canonical_entity() {
    let store = memory_notes(vec![note("n1", "a")]);
    store.hydrate().await.unwrap();

    let outcome = store
        .update(&EntityId::from("n1"), NotePatch::pinned(true))
        .unwrap()
        .settled()
        .await;

    assert_eq!(outcome, MutationOutcome::Committed);
    assert_eq!(store.snapshot(), store.remote().entities());
    assert!(store.snapshot()[0].pinned);
}

#[tokio::test]
async fn update_reply_with_taken_id_keeps_local_entity() {
    let (store, mut calls) = gated_notes(
        vec![note("n1", "a"), note("n2", "b")],
        InFlightPolicy::Overlap,
    );

    let pending = store
        .update(&EntityId::from("n1"), NotePatch::title("x"))
        .unwrap();
    let call = calls.next().await.unwrap();
    call.reply_entity(note("n2", "x"));
    let outcome = pending.settled().await;

    assert_eq!(outcome, MutationOutcome::Committed);
    let ids: Vec<_> = store.snapshot().into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![EntityId::from("n1"), EntityId::from("n2")]);
    assert_eq!(store.get(&EntityId::from("n1")).unwrap().title, "x");
    assert_eq!(store.get(&EntityId::from("n2")).unwrap().title, "b");
}

#[tokio::test]
async fn update_of_unknown_id_still_calls_remote() {
    let store = memory_notes(vec![note("n1", "a")]);
    store.hydrate().await.unwrap();
    let before = store.snapshot();

    let pending = store
        .update(&EntityId::from("ghost"), NotePatch::title("x"))
        .unwrap();
    assert_eq!(store.snapshot(), before);

    let outcome = pending.settled().await;
    assert_eq!(
        outcome,
        MutationOutcome::RolledBack {
            error: RemoteError::NotFound(EntityId::from("ghost"))
        }
    );
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn field_updates_are_clamped_before_apply_and_send() {
    let store = EntityStore::open(
        StoreConfig::new("goals"),
        MemoryRemote::with_entities(vec![goal("g1", "run")]).with_field(PROGRESS),
        InMemorySnapshotStore::new(),
    )
    .unwrap();
    store.hydrate().await.unwrap();
    let id = EntityId::from("g1");

    let pending = store.update_field(&id, &PROGRESS, 150).unwrap();
    assert_eq!(store.get(&id).unwrap().progress, 100);
    assert_eq!(pending.settled().await, MutationOutcome::Committed);
    assert_eq!(store.get(&id).unwrap().progress, 100);

    let pending = store.update_field(&id, &PROGRESS, -10).unwrap();
    assert_eq!(store.get(&id).unwrap().progress, 0);
    pending.settled().await;
    assert_eq!(store.remote().entities()[0].progress, 0);

    let sent: Vec<i64> = store
        .remote()
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            RemoteCall::UpdateField { value, .. } => Some(value),
            _ => None,
        })
        .collect();
    assert_eq!(sent, [100, 0]);
}

#[tokio::test]
async fn field_update_failure_restores_previous_collection() {
    let store = EntityStore::open(
        StoreConfig::new("goals"),
        MemoryRemote::with_entities(vec![goal("g1", "run")]).with_field(PROGRESS),
        InMemorySnapshotStore::new(),
    )
    .unwrap();
    store.hydrate().await.unwrap();
    let c0 = store.snapshot();

    store.remote().set_failing(true);
    let outcome = store
        .update_field(&EntityId::from("g1"), &PROGRESS, 60)
        .unwrap()
        .settled()
        .await;

    assert!(matches!(outcome, MutationOutcome::RolledBack { .. }));
    assert_eq!(store.snapshot(), c0);
}

#[tokio::test]
async fn delete_failure_restores_entity_at_original_index() {
    let store = memory_notes(vec![note("a", "a"), note("b", "b"), note("c", "c")]);
    store.hydrate().await.unwrap();
    let c0 = store.snapshot();

    store.remote().fail_next(1);
    let pending = store.delete(&EntityId::from("b")).unwrap();
    assert_eq!(store.len(), 2);

    assert!(matches!(
        pending.settled().await,
        MutationOutcome::RolledBack { .. }
    ));
    assert_eq!(store.snapshot(), c0);
    assert_eq!(store.snapshot()[1].id.as_str(), "b");
}

#[tokio::test]
async fn delete_success_removes_entity() {
    let store = memory_notes(vec![note("a", "a"), note("b", "b")]);
    store.hydrate().await.unwrap();

    let outcome = store
        .delete(&EntityId::from("a"))
        .unwrap()
        .settled()
        .await;

    assert_eq!(outcome, MutationOutcome::Committed);
    assert_eq!(store.snapshot(), vec![note("b", "b")]);
    assert_eq!(store.remote().entities(), store.snapshot());
}

#[tokio::test]
async fn hydration_is_idempotent() {
    let server = vec![note("n2", "b"), note("n1", "a")];
    let store = memory_notes(server.clone());

    assert_eq!(store.hydrate().await.unwrap(), 2);
    assert_eq!(store.snapshot(), server);
    assert_eq!(store.hydrate().await.unwrap(), 2);
    assert_eq!(store.snapshot(), server);

    assert_eq!(store.state(), StoreState::Ready);
    assert_eq!(store.stats().hydrations, 2);
}

#[tokio::test]
async fn hydration_failure_keeps_local_collection() {
    let store = EntityStore::open_with_seed(
        StoreConfig::new("notes"),
        MemoryRemote::with_entities(vec![note("server", "s")]),
        InMemorySnapshotStore::new(),
        vec![note("seed", "s")],
    )
    .unwrap();
    store.remote().set_failing(true);

    let result = store.hydrate().await;

    assert!(matches!(result, Err(StoreError::Remote(_))));
    assert!(result.unwrap_err().is_retryable());
    assert_eq!(store.state(), StoreState::Stale);
    assert_eq!(store.snapshot(), vec![note("seed", "s")]);

    // A later attempt may still succeed
    store.remote().set_failing(false);
    store.hydrate().await.unwrap();
    assert_eq!(store.state(), StoreState::Ready);
    assert_eq!(store.snapshot(), vec![note("server", "s")]);
}

#[tokio::test]
async fn hydration_collapses_duplicate_ids() {
    let store = memory_notes(vec![note("n1", "first"), note("n1", "second")]);

    assert_eq!(store.hydrate().await.unwrap(), 1);
    assert_eq!(store.snapshot(), vec![note("n1", "first")]);
}

#[tokio::test]
async fn concurrent_hydration_is_refused() {
    let (store, mut calls) = gated_notes(Vec::new(), InFlightPolicy::Overlap);

    let background = tokio::spawn({
        let store = store.clone();
        async move { store.hydrate().await }
    });
    let call = calls.next().await.unwrap();
    assert_eq!(store.state(), StoreState::Hydrating);

    assert!(matches!(
        store.hydrate().await,
        Err(StoreError::AlreadyHydrating { .. })
    ));

    call.reply_entities(vec![note("n1", "a")]);
    assert_eq!(background.await.unwrap().unwrap(), 1);
    assert_eq!(store.state(), StoreState::Ready);
}

/// Two updates on the same entity overlap. The second is confirmed, then the
/// first fails: its rollback restores the collection from before the first
/// update, discarding the confirmed second change.
#[tokio::test]
async fn failed_update_discards_later_confirmed_update() {
    let (store, mut calls) = gated_notes(vec![note("n1", "original")], InFlightPolicy::Overlap);
    let id = EntityId::from("n1");
    let c0 = store.snapshot();

    let first = store.update(&id, NotePatch::title("a")).unwrap();
    let first_call = calls.next().await.unwrap();

    let second = store.update(&id, NotePatch::content("b")).unwrap();
    let second_call = calls.next().await.unwrap();
    assert_eq!(store.in_flight(&id), 2);

    let mut confirmed = note("n1", "original");
    confirmed.content = "b".to_string();
    second_call.reply_entity(confirmed.clone());
    assert_eq!(second.settled().await, MutationOutcome::Committed);
    assert_eq!(store.get(&id), Some(confirmed));

    first_call.fail(RemoteError::Timeout);
    assert_eq!(
        first.settled().await,
        MutationOutcome::RolledBack {
            error: RemoteError::Timeout
        }
    );

    assert_eq!(store.snapshot(), c0);
    assert_eq!(store.get(&id).unwrap().content, "");
    assert_eq!(store.in_flight(&id), 0);
}

/// A rollback also discards optimistic changes to other entities applied
/// while the failing mutation was in flight.
#[tokio::test]
async fn failed_update_discards_changes_to_other_entities() {
    let (store, mut calls) = gated_notes(
        vec![note("n1", "one"), note("n2", "two")],
        InFlightPolicy::Overlap,
    );
    let c0 = store.snapshot();

    let first = store
        .update(&EntityId::from("n1"), NotePatch::title("x"))
        .unwrap();
    let first_call = calls.next().await.unwrap();

    let _second = store
        .update(&EntityId::from("n2"), NotePatch::title("y"))
        .unwrap();
    let _second_call = calls.next().await.unwrap();
    assert_eq!(store.get(&EntityId::from("n2")).unwrap().title, "y");

    first_call.fail(RemoteError::Rejected("invalid title".into()));
    first.settled().await;

    assert_eq!(store.snapshot(), c0);
}

#[tokio::test]
async fn reject_policy_refuses_overlapping_mutations() {
    let (store, mut calls) = gated_notes(vec![note("n1", "original")], InFlightPolicy::Reject);
    let id = EntityId::from("n1");

    let first = store.update(&id, NotePatch::title("a")).unwrap();
    let call = calls.next().await.unwrap();
    let optimistic = store.snapshot();

    for refused in [
        store.update(&id, NotePatch::content("b")).map(|_| ()),
        store.delete(&id).map(|_| ()),
    ] {
        assert!(matches!(
            refused,
            Err(StoreError::MutationInFlight { ref id }) if id.as_str() == "n1"
        ));
    }
    assert_eq!(store.snapshot(), optimistic);
    assert!(calls.try_next().is_none());

    call.reply_entity(note("n1", "a"));
    first.settled().await;
    assert_eq!(store.in_flight(&id), 0);
    assert!(store.update(&id, NotePatch::content("b")).is_ok());
}

#[tokio::test]
async fn hydration_overwrites_pending_create() {
    let (store, mut calls) = gated_notes(Vec::new(), InFlightPolicy::Overlap);

    let hydration = tokio::spawn({
        let store = store.clone();
        async move { store.hydrate().await }
    });
    let get_all = calls.next().await.unwrap();

    let create = store.create(NoteDraft::titled("early"));
    let create_call = calls.next().await.unwrap();
    assert_eq!(store.len(), 1);

    get_all.reply_entities(vec![note("n1", "server")]);
    hydration.await.unwrap().unwrap();
    assert_eq!(store.snapshot(), vec![note("n1", "server")]);

    create_call.reply_entity(note("n2", "early"));
    let outcome = create.settled().await;
    assert!(matches!(outcome, MutationOutcome::Dropped { .. }));
    assert_eq!(outcome.permanent_id().map(EntityId::as_str), Some("n2"));
    assert_eq!(store.snapshot(), vec![note("n1", "server")]);
    assert_eq!(store.stats().dropped_reconciliations, 1);
}

#[tokio::test]
async fn create_resolving_after_delete_is_dropped() {
    let (store, mut calls) = gated_notes(Vec::new(), InFlightPolicy::Overlap);

    let create = store.create(NoteDraft::titled("short-lived"));
    let create_call = calls.next().await.unwrap();
    let temporary = create.target().clone();

    let delete = store.delete(&temporary).unwrap();
    let delete_call = calls.next().await.unwrap();
    assert!(store.is_empty());

    create_call.reply_entity(note("n1", "short-lived"));
    assert!(matches!(
        create.settled().await,
        MutationOutcome::Dropped { .. }
    ));

    delete_call.reply_done();
    delete.settled().await;
    assert!(store.is_empty());
}

#[tokio::test]
async fn canonical_id_already_present_is_not_duplicated() {
    let (store, mut calls) = gated_notes(vec![note("n1", "dup")], InFlightPolicy::Overlap);

    let create = store.create(NoteDraft::titled("dup"));
    let create_call = calls.next().await.unwrap();
    assert_eq!(store.len(), 2);

    create_call.reply_entity(note("n1", "dup"));
    let outcome = create.settled().await;

    assert!(matches!(outcome, MutationOutcome::Reconciled { .. }));
    assert_eq!(store.snapshot(), vec![note("n1", "dup")]);
}

#[tokio::test]
async fn every_state_change_is_persisted_and_published() {
    let store = memory_notes(Vec::new());
    let mut updates = store.subscribe();

    let pending = store.create(NoteDraft::titled("a"));
    assert!(updates.has_changed().unwrap());
    assert!(updates.borrow_and_update()[0].id.is_temporary());
    assert_eq!(store.persistence().writes(), 1);

    pending.settled().await;
    assert!(updates.has_changed().unwrap());
    assert!(!updates.borrow_and_update()[0].id.is_temporary());
    assert_eq!(store.persistence().writes(), 2);

    let persisted: Vec<Note> = tether_engine::load_snapshot(store.persistence(), "notes")
        .unwrap()
        .unwrap();
    assert_eq!(persisted, store.snapshot());

    store.remote().fail_next(1);
    let id = store.snapshot()[0].id.clone();
    store.delete(&id).unwrap().settled().await;
    assert_eq!(store.persistence().writes(), 4);
}

#[tokio::test]
async fn persistence_failures_do_not_fail_mutations() {
    let store = memory_notes(Vec::new());
    store.persistence().set_fail_writes(true);

    let outcome = store.create(NoteDraft::titled("a")).settled().await;

    assert!(outcome.is_success());
    assert_eq!(store.len(), 1);
    let stats = store.stats();
    assert_eq!(stats.persistence_failures, 2);
    assert!(stats.last_error.is_some());
}

#[tokio::test]
async fn snapshot_survives_reopen() {
    let persistence = Arc::new(InMemorySnapshotStore::new());

    let store = EntityStore::open(
        StoreConfig::new("notes"),
        MemoryRemote::<Note>::new(),
        Arc::clone(&persistence),
    )
    .unwrap();
    store.create(NoteDraft::titled("kept")).settled().await;
    let saved = store.snapshot();
    drop(store);

    let reopened = EntityStore::open(
        StoreConfig::new("notes"),
        MemoryRemote::<Note>::new(),
        Arc::clone(&persistence),
    )
    .unwrap();
    assert_eq!(reopened.snapshot(), saved);
    assert_eq!(reopened.state(), StoreState::Init);
}

#[tokio::test]
async fn file_snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let store = EntityStore::open(
        StoreConfig::new("goals"),
        MemoryRemote::<Goal>::new().with_field(PROGRESS),
        FileSnapshotStore::open(dir.path()).unwrap(),
    )
    .unwrap();
    store.create(GoalDraft::titled("marathon")).settled().await;
    let id = store.snapshot()[0].id.clone();
    store
        .update_field(&id, &PROGRESS, 42)
        .unwrap()
        .settled()
        .await;
    let saved = store.snapshot();
    drop(store);

    let files = FileSnapshotStore::open(dir.path()).unwrap();
    assert_eq!(files.names().unwrap(), vec!["goals".to_string()]);

    let reopened = EntityStore::open(
        StoreConfig::new("goals"),
        MemoryRemote::<Goal>::new(),
        files,
    )
    .unwrap();
    assert_eq!(reopened.snapshot(), saved);
    assert_eq!(reopened.snapshot()[0].progress, 42);
}
