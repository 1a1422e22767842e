//! In-process remote services.
//!
//! - [`MemoryRemote`] behaves like a real service backed by a vector, with
//!   failure injection and a call log
//! - [`GatedRemote`] parks every call until the test resolves it, giving
//!   full control over the order in which remote calls complete

use crate::identity::unix_millis;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tether_protocol::{BoundedField, EntityId, RemoteError, RemoteResult, RemoteService, SyncEntity};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// A call received by an in-process remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `get_all`.
    GetAll,
    /// `create`.
    Create,
    /// `update`.
    Update {
        /// Target entity.
        id: EntityId,
    },
    /// `delete`.
    Delete {
        /// Target entity.
        id: EntityId,
    },
    /// `update_field`.
    UpdateField {
        /// Target entity.
        id: EntityId,
        /// Field name.
        field: &'static str,
        /// Value as received.
        value: i64,
    },
}

/// An in-memory remote service.
///
/// Keeps the server-side collection newest first, assigns permanent ids
/// (UUID v4 strings) and creation times, and records every call. A failed
/// call never changes the server-side collection.
pub struct MemoryRemote<E: SyncEntity> {
    entities: RwLock<Vec<E>>,
    fields: Vec<BoundedField<E>>,
    calls: RwLock<Vec<RemoteCall>>,
    failing: AtomicBool,
    fail_next: AtomicU64,
}

impl<E: SyncEntity> MemoryRemote<E> {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::with_entities(Vec::new())
    }

    /// Creates a remote holding `entities`.
    pub fn with_entities(entities: Vec<E>) -> Self {
        Self {
            entities: RwLock::new(entities),
            fields: Vec::new(),
            calls: RwLock::new(Vec::new()),
            failing: AtomicBool::new(false),
            fail_next: AtomicU64::new(0),
        }
    }

    /// Registers a bounded field so that `update_field` can set it.
    #[must_use]
    pub fn with_field(mut self, field: BoundedField<E>) -> Self {
        self.fields.push(field);
        self
    }

    /// Returns a copy of the server-side collection.
    pub fn entities(&self) -> Vec<E> {
        self.entities.read().clone()
    }

    /// Replaces the server-side collection.
    pub fn set_entities(&self, entities: Vec<E>) {
        *self.entities.write() = entities;
    }

    /// Returns every call received so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.read().clone()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.calls.write().clear();
    }

    /// Makes every call fail until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes the next `count` calls fail.
    pub fn fail_next(&self, count: u64) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    fn receive(&self, call: RemoteCall) -> RemoteResult<()> {
        self.calls.write().push(call);

        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::transport_retryable("remote unavailable"));
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RemoteError::transport_retryable("injected failure"));
        }
        Ok(())
    }

    fn modify(&self, id: &EntityId, change: impl FnOnce(&mut E)) -> RemoteResult<E> {
        let mut entities = self.entities.write();
        let entity = entities
            .iter_mut()
            .find(|e| e.id() == id)
            .ok_or_else(|| RemoteError::NotFound(id.clone()))?;
        change(entity);
        Ok(entity.clone())
    }
}

impl<E: SyncEntity> Default for MemoryRemote<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: SyncEntity> RemoteService<E> for MemoryRemote<E> {
    async fn get_all(&self) -> RemoteResult<Vec<E>> {
        self.receive(RemoteCall::GetAll)?;
        Ok(self.entities())
    }

    async fn create(&self, draft: &E::Draft) -> RemoteResult<E> {
        self.receive(RemoteCall::Create)?;
        let id = EntityId::new(Uuid::new_v4().to_string());
        let entity = E::from_draft(id, draft, unix_millis());
        self.entities.write().insert(0, entity.clone());
        Ok(entity)
    }

    async fn update(&self, id: &EntityId, patch: &E::Patch) -> RemoteResult<E> {
        self.receive(RemoteCall::Update { id: id.clone() })?;
        self.modify(id, |entity| entity.apply_patch(patch))
    }

    async fn delete(&self, id: &EntityId) -> RemoteResult<()> {
        self.receive(RemoteCall::Delete { id: id.clone() })?;
        let mut entities = self.entities.write();
        let index = entities
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| RemoteError::NotFound(id.clone()))?;
        entities.remove(index);
        Ok(())
    }

    async fn update_field(
        &self,
        id: &EntityId,
        field: &'static str,
        value: i64,
    ) -> RemoteResult<E> {
        self.receive(RemoteCall::UpdateField {
            id: id.clone(),
            field,
            value,
        })?;
        let bounded = self
            .fields
            .iter()
            .find(|f| f.name == field)
            .copied()
            .ok_or_else(|| RemoteError::Rejected(format!("unknown field {field}")))?;
        self.modify(id, |entity| bounded.apply(entity, bounded.clamp(value)))
    }
}

/// Reply to a parked call.
#[derive(Debug)]
enum GatedReply<E> {
    Entities(Vec<E>),
    Entity(E),
    Done,
}

/// A call parked by a [`GatedRemote`], waiting for the test to resolve it.
#[derive(Debug)]
pub struct GatedCall<E> {
    call: RemoteCall,
    reply: oneshot::Sender<RemoteResult<GatedReply<E>>>,
}

impl<E> GatedCall<E> {
    /// The call as received.
    pub fn call(&self) -> &RemoteCall {
        &self.call
    }

    /// Resolves a `get_all` call.
    pub fn reply_entities(self, entities: Vec<E>) {
        self.resolve(Ok(GatedReply::Entities(entities)));
    }

    /// Resolves a `create`, `update` or `update_field` call.
    pub fn reply_entity(self, entity: E) {
        self.resolve(Ok(GatedReply::Entity(entity)));
    }

    /// Resolves a `delete` call.
    pub fn reply_done(self) {
        self.resolve(Ok(GatedReply::Done));
    }

    /// Fails the call.
    pub fn fail(self, error: RemoteError) {
        self.resolve(Err(error));
    }

    fn resolve(self, reply: RemoteResult<GatedReply<E>>) {
        // The caller may have been cancelled; nothing waits for the reply then.
        let _ = self.reply.send(reply);
    }
}

/// Receiving side of a [`GatedRemote`].
#[derive(Debug)]
pub struct GatedCalls<E> {
    receiver: mpsc::UnboundedReceiver<GatedCall<E>>,
}

impl<E> GatedCalls<E> {
    /// Waits for the next parked call. Returns `None` once the remote is
    /// dropped and every call has been taken.
    pub async fn next(&mut self) -> Option<GatedCall<E>> {
        self.receiver.recv().await
    }

    /// Takes a parked call without waiting.
    pub fn try_next(&mut self) -> Option<GatedCall<E>> {
        self.receiver.try_recv().ok()
    }
}

/// A remote service whose calls complete only when the test says so.
///
/// Every call is forwarded to the paired [`GatedCalls`] and waits there
/// until it is replied to or failed. Dropping a [`GatedCall`] without
/// resolving it fails the call with a fatal transport error.
#[derive(Debug)]
pub struct GatedRemote<E> {
    sender: mpsc::UnboundedSender<GatedCall<E>>,
}

impl<E: SyncEntity> GatedRemote<E> {
    /// Creates a gated remote and the receiver for its calls.
    pub fn new() -> (Self, GatedCalls<E>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, GatedCalls { receiver })
    }

    async fn roundtrip(&self, call: RemoteCall) -> RemoteResult<GatedReply<E>> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(GatedCall { call, reply })
            .map_err(|_| RemoteError::transport_fatal("gate closed"))?;
        response
            .await
            .map_err(|_| RemoteError::transport_fatal("gated call dropped without reply"))?
    }

    async fn roundtrip_entity(&self, call: RemoteCall) -> RemoteResult<E> {
        match self.roundtrip(call).await? {
            GatedReply::Entity(entity) => Ok(entity),
            other => Err(RemoteError::Server(format!(
                "expected an entity reply, got {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl<E: SyncEntity> RemoteService<E> for GatedRemote<E> {
    async fn get_all(&self) -> RemoteResult<Vec<E>> {
        match self.roundtrip(RemoteCall::GetAll).await? {
            GatedReply::Entities(entities) => Ok(entities),
            other => Err(RemoteError::Server(format!(
                "expected an entities reply, got {other:?}"
            ))),
        }
    }

    async fn create(&self, _draft: &E::Draft) -> RemoteResult<E> {
        self.roundtrip_entity(RemoteCall::Create).await
    }

    async fn update(&self, id: &EntityId, _patch: &E::Patch) -> RemoteResult<E> {
        self.roundtrip_entity(RemoteCall::Update { id: id.clone() })
            .await
    }

    async fn delete(&self, id: &EntityId) -> RemoteResult<()> {
        match self.roundtrip(RemoteCall::Delete { id: id.clone() }).await? {
            GatedReply::Done => Ok(()),
            other => Err(RemoteError::Server(format!(
                "expected a done reply, got {other:?}"
            ))),
        }
    }

    async fn update_field(
        &self,
        id: &EntityId,
        field: &'static str,
        value: i64,
    ) -> RemoteResult<E> {
        self.roundtrip_entity(RemoteCall::UpdateField {
            id: id.clone(),
            field,
            value,
        })
        .await
    }
}
