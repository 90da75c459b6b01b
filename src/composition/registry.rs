use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::{CompositionCollection, CompositionProvider};
use crate::identifier::Identifier;
use crate::object::{DomainObject, Model, ObjectLookup};

/// Priority of the built-in provider. Higher priorities are consulted first.
pub const DEFAULT_PRIORITY: i32 = 0;

struct Registered {
    provider: Arc<dyn CompositionProvider>,
    priority: i32,
    seq: u64,
}

/// Ordered composition providers plus the lookup used to resolve children.
///
/// Providers are consulted by descending priority; among equal priorities
/// the most recently registered comes first.
pub struct CompositionRegistry {
    providers: RwLock<Vec<Registered>>,
    next_seq: AtomicU64,
    lookup: Arc<dyn ObjectLookup>,
}

impl CompositionRegistry {
    pub fn new(lookup: Arc<dyn ObjectLookup>) -> Self {
        CompositionRegistry {
            providers: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            lookup,
        }
    }

    pub fn register_provider(&self, provider: Arc<dyn CompositionProvider>, priority: i32) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.push(Registered {
            provider,
            priority,
            seq,
        });
        providers.sort_by(|a, b| b.priority.cmp(&a.priority).then(b.seq.cmp(&a.seq)));
    }

    pub fn len(&self) -> usize {
        self.providers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The provider that would serve `parent`, if any.
    pub fn provider_for(&self, parent: &DomainObject) -> Option<Arc<dyn CompositionProvider>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|registered| registered.provider.applies_to(parent))
            .map(|registered| Arc::clone(&registered.provider))
    }

    /// Whether any provider would serve an object carrying `model`.
    ///
    /// Capabilities are resolved before the object exists, so providers are
    /// asked about a detached object with this model and an empty id.
    pub fn serves(&self, model: &Model) -> bool {
        let candidate = DomainObject::new(Identifier::new("", ""), model.clone(), HashMap::new());
        self.provider_for(&candidate).is_some()
    }

    /// A new, unloaded collection for `parent`; `None` when no provider applies.
    pub fn composition(&self, parent: &DomainObject) -> Option<Arc<CompositionCollection>> {
        let provider = self.provider_for(parent);
        if provider.is_none() {
            debug!(id = %parent.id(), "no composition provider applies");
        }
        provider.map(|provider| {
            Arc::new(CompositionCollection::new(
                parent.clone(),
                provider,
                Arc::clone(&self.lookup),
            ))
        })
    }
}
