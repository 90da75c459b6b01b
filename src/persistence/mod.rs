//! Persistence - backend contract, backends, and the persistence capability.
//!
//! A backend ([`PersistenceService`]) serves one or more named spaces. The
//! [`SpaceRouter`] aggregates backends and decides which space owns each
//! identifier; [`SpacePersistence`] is the per-object capability that writes
//! through it.

mod capability;
mod document;
mod error;
mod in_memory;
mod router;
mod timeout;

use std::sync::Arc;

use async_trait::async_trait;

use crate::object::Model;

pub use capability::{PersistenceCapability, PersistenceCapabilityProvider, SpacePersistence};
pub use document::{DocumentMetadata, DocumentRecord};
pub use error::BackendError;
pub use in_memory::InMemoryPersistence;
pub use router::SpaceRouter;
pub use timeout::{TimeoutPersistence, WithTimeout};

/// A stored object as seen by reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRecord {
    pub id: String,
    pub model: Model,
    /// Last successful write time; the sole tiebreaker between spaces.
    pub persisted: Option<i64>,
    pub rev: Option<String>,
}

impl PersistedRecord {
    pub fn from_model(id: impl Into<String>, model: Model) -> Self {
        PersistedRecord {
            id: id.into(),
            persisted: model.persisted(),
            rev: None,
            model,
        }
    }
}

/// The contract every storage backend implements, per space.
#[async_trait]
pub trait PersistenceService: Send + Sync {
    async fn list_spaces(&self) -> Result<Vec<String>, BackendError>;

    /// Ids held in `space`; `None` when the space is unknown to this backend.
    async fn list_objects(&self, space: &str) -> Result<Option<Vec<String>>, BackendError>;

    /// `false` if the object already exists or the space is unknown.
    async fn create_object(&self, space: &str, id: &str, model: &Model)
        -> Result<bool, BackendError>;

    async fn read_object(&self, space: &str, id: &str) -> Result<Option<Model>, BackendError>;

    /// `false` if the object is absent.
    async fn update_object(&self, space: &str, id: &str, model: &Model)
        -> Result<bool, BackendError>;

    async fn delete_object(&self, space: &str, id: &str) -> Result<bool, BackendError>;

    /// Read the full record. Backends that track revisions override this.
    async fn read_record(
        &self,
        space: &str,
        id: &str,
    ) -> Result<Option<PersistedRecord>, BackendError> {
        Ok(self
            .read_object(space, id)
            .await?
            .map(|model| PersistedRecord::from_model(id, model)))
    }
}

#[async_trait]
impl<P: PersistenceService + ?Sized> PersistenceService for Arc<P> {
    async fn list_spaces(&self) -> Result<Vec<String>, BackendError> {
        (**self).list_spaces().await
    }

    async fn list_objects(&self, space: &str) -> Result<Option<Vec<String>>, BackendError> {
        (**self).list_objects(space).await
    }

    async fn create_object(
        &self,
        space: &str,
        id: &str,
        model: &Model,
    ) -> Result<bool, BackendError> {
        (**self).create_object(space, id, model).await
    }

    async fn read_object(&self, space: &str, id: &str) -> Result<Option<Model>, BackendError> {
        (**self).read_object(space, id).await
    }

    async fn update_object(
        &self,
        space: &str,
        id: &str,
        model: &Model,
    ) -> Result<bool, BackendError> {
        (**self).update_object(space, id, model).await
    }

    async fn delete_object(&self, space: &str, id: &str) -> Result<bool, BackendError> {
        (**self).delete_object(space, id).await
    }

    async fn read_record(
        &self,
        space: &str,
        id: &str,
    ) -> Result<Option<PersistedRecord>, BackendError> {
        (**self).read_record(space, id).await
    }
}
