use std::sync::Arc;

use async_trait::async_trait;

use super::queue::settled;
use super::PersistenceQueue;
use crate::capability::{
    Capability, CapabilityBinding, CapabilityDecorator, CapabilityError, PERSISTENCE,
};
use crate::error::Result;
use crate::identifier::Identifier;
use crate::object::DomainObject;
use crate::persistence::PersistenceCapability;

/// Persistence capability whose writes go through a [`PersistenceQueue`].
///
/// `persist()` resolves once the queued write completes; `refresh()` and the
/// accessors forward to the wrapped capability.
pub struct QueuingPersistence {
    inner: Arc<dyn PersistenceCapability>,
    queue: Arc<PersistenceQueue>,
}

impl QueuingPersistence {
    pub fn new(inner: Arc<dyn PersistenceCapability>, queue: Arc<PersistenceQueue>) -> Self {
        QueuingPersistence { inner, queue }
    }

    /// Access the wrapped capability.
    pub fn inner(&self) -> &Arc<dyn PersistenceCapability> {
        &self.inner
    }
}

#[async_trait]
impl PersistenceCapability for QueuingPersistence {
    fn identifier(&self) -> &Identifier {
        self.inner.identifier()
    }

    fn space(&self) -> String {
        self.inner.space()
    }

    async fn persist(&self) -> Result<bool> {
        let pending = self.queue.enqueue(Arc::clone(&self.inner));
        settled(pending).await
    }

    async fn refresh(&self) -> Result<()> {
        self.inner.refresh().await
    }
}

/// Builder trait for routing a persistence capability through a queue.
pub trait Queueable {
    fn queued(self, queue: &Arc<PersistenceQueue>) -> QueuingPersistence;
}

impl Queueable for Arc<dyn PersistenceCapability> {
    fn queued(self, queue: &Arc<PersistenceQueue>) -> QueuingPersistence {
        QueuingPersistence::new(self, Arc::clone(queue))
    }
}

/// Rewraps every `persistence` binding so its writes are queued.
pub struct QueuingPersistenceDecorator {
    queue: Arc<PersistenceQueue>,
}

impl QueuingPersistenceDecorator {
    pub fn new(queue: Arc<PersistenceQueue>) -> Self {
        QueuingPersistenceDecorator { queue }
    }
}

impl CapabilityDecorator for QueuingPersistenceDecorator {
    fn decorate(&self, name: &str, binding: CapabilityBinding) -> CapabilityBinding {
        if name != PERSISTENCE {
            return binding;
        }
        let queue = Arc::clone(&self.queue);
        binding.wrap(Arc::new(move |_: &DomainObject, capability: Capability| {
            queue_persistence(capability, &queue)
        }))
    }
}

fn queue_persistence(
    capability: Capability,
    queue: &Arc<PersistenceQueue>,
) -> Result<Capability, CapabilityError> {
    Ok(match capability {
        Capability::Persistence(inner) => Capability::Persistence(Arc::new(inner.queued(queue))),
        other => other,
    })
}
