//! ObjectService - instantiates domain objects and caches them by id.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::debug;

use super::{DomainObject, Model};
use crate::capability::CapabilityRegistry;
use crate::error::Result;
use crate::identifier::Identifier;
use crate::persistence::SpaceRouter;

/// Resolves identifiers to live domain objects.
#[async_trait]
pub trait ObjectLookup: Send + Sync {
    async fn get(&self, id: &Identifier) -> Result<Option<DomainObject>>;
}

/// Creates domain objects once per identifier and keeps them cached.
///
/// Objects are never destroyed here, only evicted; an evicted object stays
/// usable by anyone still holding it.
pub struct ObjectService {
    router: Arc<SpaceRouter>,
    capabilities: Arc<CapabilityRegistry>,
    cache: RwLock<HashMap<Identifier, DomainObject>>,
    default_namespace: String,
}

impl ObjectService {
    pub fn new(
        router: Arc<SpaceRouter>,
        capabilities: Arc<CapabilityRegistry>,
        default_namespace: impl Into<String>,
    ) -> Self {
        ObjectService {
            router,
            capabilities,
            cache: RwLock::new(HashMap::new()),
            default_namespace: default_namespace.into(),
        }
    }

    pub fn capabilities(&self) -> &Arc<CapabilityRegistry> {
        &self.capabilities
    }

    /// Build a domain object for `model`, generating an id when none is given.
    ///
    /// If an object with that id is already cached, the cached object is
    /// returned and `model` is ignored.
    pub fn instantiate(&self, model: Model, id: Option<Identifier>) -> DomainObject {
        let id = id.unwrap_or_else(|| Identifier::generate(self.default_namespace.clone()));

        if let Some(existing) = self.cached(&id) {
            return existing;
        }

        let bindings = self.capabilities.resolve(&model);
        let object = DomainObject::new(id.clone(), model, bindings);

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.entry(id).or_insert(object).clone()
    }

    /// The cached object for `id`, or the stored one read from its space.
    ///
    /// `Ok(None)` when no space holds the id.
    pub async fn get(&self, id: &Identifier) -> Result<Option<DomainObject>> {
        if let Some(object) = self.cached(id) {
            return Ok(Some(object));
        }

        match self.router.read(id).await? {
            Some(model) => Ok(Some(self.instantiate(model, Some(id.clone())))),
            None => {
                debug!(%id, space = %self.router.space_for(id), "object not found");
                Ok(None)
            }
        }
    }

    /// Drop `id` from the cache. Returns the evicted object, if any.
    pub fn evict(&self, id: &Identifier) -> Option<DomainObject> {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn clear(&self) {
        self.cache.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn cached(&self, id: &Identifier) -> Option<DomainObject> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

#[async_trait]
impl ObjectLookup for ObjectService {
    async fn get(&self, id: &Identifier) -> Result<Option<DomainObject>> {
        ObjectService::get(self, id).await
    }
}
