//! Platform - the composition root.
//!
//! Builds every service once, in dependency order, and hands out shared
//! handles. Nothing in the crate is a process-wide singleton; a platform's
//! services live until [`Platform::shutdown`] and the last handle drop.

use std::sync::Arc;

use tracing::info;

use crate::capability::{
    CapabilityDecorator, CapabilityProvider, CapabilityRegistry, MutationCapabilityProvider,
    TypeCapabilityProvider, PERSISTENCE,
};
use crate::composition::{
    CompositionCapabilityProvider, CompositionCollection, CompositionProvider,
    CompositionRegistry, DefaultCompositionProvider, DEFAULT_PRIORITY,
};
use crate::config::PlatformConfig;
use crate::error::{Error, Result};
use crate::events::ListenerId;
use crate::identifier::Identifier;
use crate::lock::LockManager;
use crate::object::{DomainObject, Model, ObjectService};
use crate::persistence::{
    PersistenceCapabilityProvider, PersistenceService, SpaceRouter, WithTimeout,
};
use crate::queued::{PersistenceQueue, QueuingPersistenceDecorator};
use crate::reconcile::SpaceMap;
use crate::transaction::{Editor, TransactingPersistenceDecorator, TransactionService};

pub struct PlatformBuilder {
    config: PlatformConfig,
    backends: Vec<Arc<dyn PersistenceService>>,
    capability_providers: Vec<Arc<dyn CapabilityProvider>>,
    capability_decorators: Vec<Arc<dyn CapabilityDecorator>>,
    composition_providers: Vec<(Arc<dyn CompositionProvider>, i32)>,
}

impl PlatformBuilder {
    /// Add a storage backend. Backends are asked for their spaces in the
    /// order they were added; the first to claim a space serves it.
    pub fn backend<P: PersistenceService + 'static>(mut self, backend: P) -> Self {
        self.backends.push(Arc::new(backend));
        self
    }

    /// Add a capability provider. It runs after the built-in providers, so
    /// it can replace them.
    pub fn capability_provider<P: CapabilityProvider + 'static>(mut self, provider: P) -> Self {
        self.capability_providers.push(Arc::new(provider));
        self
    }

    /// Add a capability decorator, applied outside the built-in ones.
    pub fn capability_decorator<D: CapabilityDecorator + 'static>(mut self, decorator: D) -> Self {
        self.capability_decorators.push(Arc::new(decorator));
        self
    }

    pub fn composition_provider<P: CompositionProvider + 'static>(
        mut self,
        provider: P,
        priority: i32,
    ) -> Self {
        self.composition_providers.push((Arc::new(provider), priority));
        self
    }

    /// Wire every service and reconcile the configured spaces.
    pub async fn build(self) -> Platform {
        let PlatformBuilder {
            config,
            backends,
            capability_providers,
            capability_decorators,
            composition_providers,
        } = self;

        let backends = match config.backend_timeout() {
            Some(limit) => backends
                .into_iter()
                .map(|backend| Arc::new(backend.with_timeout(limit)) as Arc<dyn PersistenceService>)
                .collect(),
            None => backends,
        };

        let router = Arc::new(SpaceRouter::new(backends, config.default_space.clone()));
        router.bootstrap().await;

        let locks = Arc::new(LockManager::new());
        let queue = Arc::new(PersistenceQueue::new(config.queue_delay()));
        let transactions = Arc::new(TransactionService::new());

        let capabilities = Arc::new(CapabilityRegistry::new());
        capabilities.register_provider(Arc::new(TypeCapabilityProvider));
        capabilities.register_provider(Arc::new(MutationCapabilityProvider));
        capabilities.register_provider(Arc::new(PersistenceCapabilityProvider::new(
            Arc::clone(&router),
            Arc::clone(&locks),
        )));
        // Transacting wraps queuing: deferred writes are queued on commit.
        capabilities.register_decorator(Arc::new(QueuingPersistenceDecorator::new(Arc::clone(
            &queue,
        ))));
        capabilities.register_decorator(Arc::new(TransactingPersistenceDecorator::new(
            Arc::clone(&transactions),
        )));

        let objects = Arc::new(ObjectService::new(
            Arc::clone(&router),
            Arc::clone(&capabilities),
            config.default_namespace.clone(),
        ));

        let composition = Arc::new(CompositionRegistry::new(objects.clone()));
        composition.register_provider(Arc::new(DefaultCompositionProvider), DEFAULT_PRIORITY);
        for (provider, priority) in composition_providers {
            composition.register_provider(provider, priority);
        }
        capabilities.register_provider(Arc::new(CompositionCapabilityProvider::new(&composition)));

        for provider in capability_providers {
            capabilities.register_provider(provider);
        }
        for decorator in capability_decorators {
            capabilities.register_decorator(decorator);
        }

        let editor = Editor::new(Arc::clone(&transactions));
        info!(
            spaces = ?router.known_spaces(),
            default_space = %config.default_space,
            "platform ready"
        );

        Platform {
            config,
            router,
            locks,
            queue,
            transactions,
            capabilities,
            objects,
            composition,
            editor,
        }
    }
}

/// Every service of one running platform.
pub struct Platform {
    config: PlatformConfig,
    router: Arc<SpaceRouter>,
    locks: Arc<LockManager>,
    queue: Arc<PersistenceQueue>,
    transactions: Arc<TransactionService>,
    capabilities: Arc<CapabilityRegistry>,
    objects: Arc<ObjectService>,
    composition: Arc<CompositionRegistry>,
    editor: Editor,
}

impl Platform {
    pub fn builder(config: PlatformConfig) -> PlatformBuilder {
        PlatformBuilder {
            config,
            backends: Vec::new(),
            capability_providers: Vec::new(),
            capability_decorators: Vec::new(),
            composition_providers: Vec::new(),
        }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<SpaceRouter> {
        &self.router
    }

    pub fn space_map(&self) -> Option<&SpaceMap> {
        self.router.space_map()
    }

    pub fn locks(&self) -> &Arc<LockManager> {
        &self.locks
    }

    pub fn queue(&self) -> &Arc<PersistenceQueue> {
        &self.queue
    }

    pub fn transactions(&self) -> &Arc<TransactionService> {
        &self.transactions
    }

    pub fn capabilities(&self) -> &Arc<CapabilityRegistry> {
        &self.capabilities
    }

    pub fn objects(&self) -> &Arc<ObjectService> {
        &self.objects
    }

    pub fn composition_registry(&self) -> &Arc<CompositionRegistry> {
        &self.composition
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn instantiate(&self, model: Model, id: Option<Identifier>) -> DomainObject {
        self.objects.instantiate(model, id)
    }

    pub async fn get(&self, id: &Identifier) -> Result<Option<DomainObject>> {
        self.objects.get(id).await
    }

    /// A new collection over `parent`'s children, if any provider serves it.
    pub fn composition(&self, parent: &DomainObject) -> Option<Arc<CompositionCollection>> {
        self.composition.composition(parent)
    }

    /// Change an object's model and persist it.
    pub async fn mutate<F>(&self, object: &DomainObject, mutator: F) -> Result<bool>
    where
        F: FnOnce(&mut Model) -> bool,
    {
        if !object.require_mutation()?.mutate(mutator, None)? {
            return Ok(false);
        }
        self.save(object).await
    }

    /// Persist `object` through its (decorated) persistence capability.
    pub async fn save(&self, object: &DomainObject) -> Result<bool> {
        let persistence = object.persistence().ok_or_else(|| Error::MissingCapability {
            id: object.id().clone(),
            capability: PERSISTENCE.to_string(),
        })?;
        persistence.persist().await
    }

    /// Call `listener` with the new model after every mutation of `object`.
    pub fn observe<F>(&self, object: &DomainObject, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Model) + Send + Sync + 'static,
    {
        Ok(object.require_mutation()?.listen(listener))
    }

    /// Delete `id` from its space and drop it from the cache and lock registry.
    pub async fn delete(&self, id: &Identifier) -> Result<bool> {
        let deleted = self.router.delete(id).await?;
        self.objects.evict(id);
        self.locks.release(&id.to_string());
        Ok(deleted)
    }

    /// Write everything still queued, clear the object cache and drop idle locks.
    pub async fn shutdown(&self) -> Result<()> {
        self.queue.flush().await?;
        self.objects.clear();
        let released = self.locks.prune();
        info!(released_locks = released, "platform shut down");
        Ok(())
    }
}
