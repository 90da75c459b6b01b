//! Domain objects - identified, model-bearing entities with capabilities.
//!
//! A `DomainObject` is a cheap handle (`Arc` inside); clones refer to the same
//! object. The model can only be changed through capabilities.

mod model;
mod service;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use serde_json::Value;
use tracing::warn;

use crate::capability::{
    Capability, CapabilityBinding, CapabilityError, MutationCapability, Used, MUTATION,
    PERSISTENCE,
};
use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::persistence::PersistenceCapability;

pub use model::{now_millis, Model};
pub use service::{ObjectLookup, ObjectService};

struct ObjectInner {
    id: Identifier,
    model: RwLock<Model>,
    bindings: HashMap<String, CapabilityBinding>,
    cached: Mutex<HashMap<String, Capability>>,
}

#[derive(Clone)]
pub struct DomainObject {
    inner: Arc<ObjectInner>,
}

impl DomainObject {
    pub(crate) fn new(
        id: Identifier,
        model: Model,
        bindings: HashMap<String, CapabilityBinding>,
    ) -> Self {
        DomainObject {
            inner: Arc::new(ObjectInner {
                id,
                model: RwLock::new(model),
                bindings,
                cached: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.inner.id
    }

    /// Snapshot of the current model.
    pub fn model(&self) -> Model {
        self.inner
            .model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read the model without cloning it.
    pub fn with_model<R>(&self, f: impl FnOnce(&Model) -> R) -> R {
        let model = self.inner.model.read().unwrap_or_else(PoisonError::into_inner);
        f(&model)
    }

    pub(crate) fn set_model(&self, model: Model) {
        *self.inner.model.write().unwrap_or_else(PoisonError::into_inner) = model;
    }

    /// Edit the live model in place under its write lock.
    pub(crate) fn update_model<R>(&self, f: impl FnOnce(&mut Model) -> R) -> R {
        let mut model = self.inner.model.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut model)
    }

    pub fn downgrade(&self) -> WeakDomainObject {
        WeakDomainObject {
            id: self.inner.id.clone(),
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// True when both handles refer to the same live object.
    pub fn ptr_eq(&self, other: &DomainObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.inner.bindings.contains_key(name)
    }

    pub fn capability_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a capability, surfacing construction failures.
    ///
    /// Unknown names yield `Ok(None)`. Dynamic bindings are built on every
    /// call; cached ones once per object.
    pub fn try_capability(&self, name: &str) -> Result<Option<Capability>, CapabilityError> {
        let binding = match self.inner.bindings.get(name) {
            Some(binding) => binding,
            None => return Ok(None),
        };

        match binding {
            CapabilityBinding::Value(capability) => Ok(Some(capability.clone())),
            CapabilityBinding::Dynamic(_) => binding.produce(self).map(Some),
            CapabilityBinding::Cached(_) => {
                if let Some(capability) = self.cached(name) {
                    return Ok(Some(capability));
                }
                // Built outside the cache lock: factories may look up other
                // capabilities on this same object.
                let built = binding.produce(self)?;
                let mut cached = self.inner.cached.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(Some(cached.entry(name.to_string()).or_insert(built).clone()))
            }
        }
    }

    /// Resolve a capability; unknown names and construction failures yield `None`.
    pub fn get_capability(&self, name: &str) -> Option<Capability> {
        match self.try_capability(name) {
            Ok(capability) => capability,
            Err(err) => {
                warn!(id = %self.id(), capability = name, error = %err, "capability construction failed");
                None
            }
        }
    }

    /// Invoke a capability if it is invocable, otherwise hand it back.
    pub fn use_capability(&self, name: &str, args: &[Value]) -> Result<Option<Used>> {
        let capability = match self.try_capability(name)? {
            Some(capability) => capability,
            None => return Ok(None),
        };

        if let Capability::Custom(invocable) = &capability {
            if let Some(result) = invocable.invoke(args) {
                return Ok(Some(Used::Invoked(result?)));
            }
        }
        Ok(Some(Used::Capability(capability)))
    }

    pub fn persistence(&self) -> Option<Arc<dyn PersistenceCapability>> {
        self.get_capability(PERSISTENCE)
            .and_then(|capability| capability.as_persistence().cloned())
    }

    pub fn mutation(&self) -> Option<Arc<MutationCapability>> {
        self.get_capability(MUTATION)
            .and_then(|capability| capability.as_mutation().cloned())
    }

    /// Like [`mutation`](Self::mutation) but an error when absent.
    pub fn require_mutation(&self) -> Result<Arc<MutationCapability>> {
        self.mutation().ok_or_else(|| Error::MissingCapability {
            id: self.id().clone(),
            capability: MUTATION.to_string(),
        })
    }

    fn cached(&self, name: &str) -> Option<Capability> {
        self.inner
            .cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

impl std::fmt::Debug for DomainObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainObject")
            .field("id", &self.inner.id)
            .field("capabilities", &self.capability_names())
            .finish()
    }
}

/// Non-owning handle held by capabilities that point back at their object.
#[derive(Clone)]
pub struct WeakDomainObject {
    id: Identifier,
    inner: Weak<ObjectInner>,
}

impl WeakDomainObject {
    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn upgrade(&self) -> Result<DomainObject> {
        self.inner
            .upgrade()
            .map(|inner| DomainObject { inner })
            .ok_or_else(|| Error::ObjectDropped(self.id.clone()))
    }
}
