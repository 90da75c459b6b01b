//! InMemoryPersistence - HashMap-backed multi-space backend for tests and development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{BackendError, DocumentRecord, PersistedRecord, PersistenceService};
use crate::object::Model;

type Spaces = HashMap<String, HashMap<String, DocumentRecord>>;

/// In-memory backend serving a fixed set of spaces.
///
/// Records are kept in the document wire shape: every write bumps `_rev`
/// and deletes leave `_deleted` tombstones. Clone-friendly via Arc.
#[derive(Clone)]
pub struct InMemoryPersistence {
    order: Arc<Vec<String>>,
    storage: Arc<RwLock<Spaces>>,
    owner: String,
}

impl InMemoryPersistence {
    /// Create a backend serving the given spaces, all empty.
    pub fn new<I, S>(spaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order: Vec<String> = spaces.into_iter().map(Into::into).collect();
        let storage = order
            .iter()
            .map(|space| (space.clone(), HashMap::new()))
            .collect();
        InMemoryPersistence {
            order: Arc::new(order),
            storage: Arc::new(RwLock::new(storage)),
            owner: String::new(),
        }
    }

    /// Set the owner recorded in document metadata.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// The raw document for an id, tombstones included.
    pub fn document(&self, space: &str, id: &str) -> Option<DocumentRecord> {
        self.read(space)
            .ok()
            .and_then(|storage| storage.get(space).and_then(|docs| docs.get(id)).cloned())
    }

    fn read(&self, space: &str) -> Result<RwLockReadGuard<'_, Spaces>, BackendError> {
        self.storage.read().map_err(|_| BackendError::Unreachable {
            space: space.to_string(),
            message: "lock poisoned".into(),
        })
    }

    fn write(&self, space: &str) -> Result<RwLockWriteGuard<'_, Spaces>, BackendError> {
        self.storage.write().map_err(|_| BackendError::Unreachable {
            space: space.to_string(),
            message: "lock poisoned".into(),
        })
    }
}

#[async_trait]
impl PersistenceService for InMemoryPersistence {
    async fn list_spaces(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.order.as_ref().clone())
    }

    async fn list_objects(&self, space: &str) -> Result<Option<Vec<String>>, BackendError> {
        let storage = self.read(space)?;
        Ok(storage.get(space).map(|docs| {
            let mut ids: Vec<String> = docs
                .values()
                .filter(|doc| !doc.deleted)
                .map(|doc| doc.id.clone())
                .collect();
            ids.sort_unstable();
            ids
        }))
    }

    async fn create_object(
        &self,
        space: &str,
        id: &str,
        model: &Model,
    ) -> Result<bool, BackendError> {
        let mut storage = self.write(space)?;
        let docs = match storage.get_mut(space) {
            Some(docs) => docs,
            None => return Ok(false),
        };

        match docs.get_mut(id) {
            Some(doc) if !doc.deleted => Ok(false),
            Some(tombstone) => {
                // Recreate over a tombstone, continuing its revision history.
                tombstone.deleted = false;
                tombstone.set_model(model.clone());
                tombstone.bump_revision();
                Ok(true)
            }
            None => {
                let mut doc = DocumentRecord::new(id, model.clone(), self.owner.clone());
                doc.bump_revision();
                docs.insert(id.to_string(), doc);
                Ok(true)
            }
        }
    }

    async fn read_object(&self, space: &str, id: &str) -> Result<Option<Model>, BackendError> {
        Ok(self.read_record(space, id).await?.map(|record| record.model))
    }

    async fn update_object(
        &self,
        space: &str,
        id: &str,
        model: &Model,
    ) -> Result<bool, BackendError> {
        let mut storage = self.write(space)?;
        match storage.get_mut(space).and_then(|docs| docs.get_mut(id)) {
            Some(doc) if !doc.deleted => {
                doc.set_model(model.clone());
                doc.bump_revision();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_object(&self, space: &str, id: &str) -> Result<bool, BackendError> {
        let mut storage = self.write(space)?;
        match storage.get_mut(space).and_then(|docs| docs.get_mut(id)) {
            Some(doc) if !doc.deleted => {
                doc.deleted = true;
                doc.bump_revision();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn read_record(
        &self,
        space: &str,
        id: &str,
    ) -> Result<Option<PersistedRecord>, BackendError> {
        let storage = self.read(space)?;
        Ok(storage
            .get(space)
            .and_then(|docs| docs.get(id))
            .filter(|doc| !doc.deleted)
            .map(DocumentRecord::to_record))
    }
}
