//! Remote service contract.

use crate::entity::SyncEntity;
use crate::error::RemoteResult;
use crate::id::EntityId;
use async_trait::async_trait;
use std::sync::Arc;

/// A remote service performs the network calls for one entity family.
///
/// This trait abstracts the transport, allowing different implementations
/// (HTTP clients, in-process fakes for tests). Every call may fail; callers
/// make exactly one attempt per user-triggered mutation.
#[async_trait]
pub trait RemoteService<E: SyncEntity>: Send + Sync {
    /// Fetches the full ordered collection.
    async fn get_all(&self) -> RemoteResult<Vec<E>>;

    /// Creates an entity. The service assigns the permanent id.
    async fn create(&self, draft: &E::Draft) -> RemoteResult<E>;

    /// Applies a patch and returns the full canonical entity.
    async fn update(&self, id: &EntityId, patch: &E::Patch) -> RemoteResult<E>;

    /// Deletes an entity.
    async fn delete(&self, id: &EntityId) -> RemoteResult<()>;

    /// Sets a bounded field. `value` is already clamped by the caller.
    async fn update_field(
        &self,
        id: &EntityId,
        field: &'static str,
        value: i64,
    ) -> RemoteResult<E>;
}

#[async_trait]
impl<E, R> RemoteService<E> for Arc<R>
where
    E: SyncEntity,
    R: RemoteService<E> + ?Sized,
{
    async fn get_all(&self) -> RemoteResult<Vec<E>> {
        (**self).get_all().await
    }

    async fn create(&self, draft: &E::Draft) -> RemoteResult<E> {
        (**self).create(draft).await
    }

    async fn update(&self, id: &EntityId, patch: &E::Patch) -> RemoteResult<E> {
        (**self).update(id, patch).await
    }

    async fn delete(&self, id: &EntityId) -> RemoteResult<()> {
        (**self).delete(id).await
    }

    async fn update_field(
        &self,
        id: &EntityId,
        field: &'static str,
        value: i64,
    ) -> RemoteResult<E> {
        (**self).update_field(id, field, value).await
    }
}
