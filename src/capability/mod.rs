//! Capabilities - named behavior attached to a domain object.
//!
//! Providers contribute [`CapabilityBinding`]s for a model; decorators then
//! rewrap bindings by name. A binding says how its capability is produced:
//!
//! - `Value`: one shared value, identical for every object.
//! - `Cached`: built once per object on first access, then reused.
//! - `Dynamic`: built anew on every access (e.g. composition collections).

mod builtin;
mod mutation;
mod provider;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::composition::CompositionCollection;
use crate::object::DomainObject;
use crate::persistence::PersistenceCapability;

pub use builtin::{MutationCapabilityProvider, TypeCapabilityProvider};
pub use mutation::MutationCapability;
pub use provider::{CapabilityDecorator, CapabilityProvider, CapabilityRegistry};

pub const TYPE: &str = "type";
pub const MUTATION: &str = "mutation";
pub const PERSISTENCE: &str = "persistence";
pub const COMPOSITION: &str = "composition";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("failed to construct capability '{name}': {message}")]
    Construction { name: String, message: String },
    #[error("capability '{name}' failed: {message}")]
    Invocation { name: String, message: String },
}

/// A capability with a synchronous `invoke` entry point.
pub trait Invocable: Send + Sync {
    /// `None` means the capability has no invoke behavior and is used as-is.
    fn invoke(&self, _args: &[Value]) -> Option<Result<Value, CapabilityError>> {
        None
    }
}

#[derive(Clone)]
pub enum Capability {
    Value(Value),
    Persistence(Arc<dyn PersistenceCapability>),
    Mutation(Arc<MutationCapability>),
    Composition(Arc<CompositionCollection>),
    Custom(Arc<dyn Invocable>),
}

impl Capability {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Capability::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_persistence(&self) -> Option<&Arc<dyn PersistenceCapability>> {
        match self {
            Capability::Persistence(persistence) => Some(persistence),
            _ => None,
        }
    }

    pub fn as_mutation(&self) -> Option<&Arc<MutationCapability>> {
        match self {
            Capability::Mutation(mutation) => Some(mutation),
            _ => None,
        }
    }

    pub fn as_composition(&self) -> Option<&Arc<CompositionCollection>> {
        match self {
            Capability::Composition(collection) => Some(collection),
            _ => None,
        }
    }
}

/// Outcome of [`DomainObject::use_capability`].
#[derive(Clone)]
pub enum Used {
    /// The capability's `invoke` ran and produced this value.
    Invoked(Value),
    /// The capability has no `invoke`; here it is.
    Capability(Capability),
}

pub type CapabilityFactory =
    Arc<dyn Fn(&DomainObject) -> Result<Capability, CapabilityError> + Send + Sync>;

/// Rewraps a produced capability for a specific object.
pub type CapabilityWrapper =
    Arc<dyn Fn(&DomainObject, Capability) -> Result<Capability, CapabilityError> + Send + Sync>;

#[derive(Clone)]
pub enum CapabilityBinding {
    Value(Capability),
    Cached(CapabilityFactory),
    Dynamic(CapabilityFactory),
}

impl CapabilityBinding {
    pub fn cached<F>(factory: F) -> Self
    where
        F: Fn(&DomainObject) -> Result<Capability, CapabilityError> + Send + Sync + 'static,
    {
        CapabilityBinding::Cached(Arc::new(factory))
    }

    pub fn dynamic<F>(factory: F) -> Self
    where
        F: Fn(&DomainObject) -> Result<Capability, CapabilityError> + Send + Sync + 'static,
    {
        CapabilityBinding::Dynamic(Arc::new(factory))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, CapabilityBinding::Dynamic(_))
    }

    /// Produce the capability for `object`.
    pub fn produce(&self, object: &DomainObject) -> Result<Capability, CapabilityError> {
        match self {
            CapabilityBinding::Value(capability) => Ok(capability.clone()),
            CapabilityBinding::Cached(factory) | CapabilityBinding::Dynamic(factory) => {
                factory(object)
            }
        }
    }

    /// Wrap whatever this binding produces, per object.
    ///
    /// A shared value becomes a cached per-object binding so each object gets
    /// its own wrapper; cached and dynamic bindings keep their kind.
    pub fn wrap(self, wrapper: CapabilityWrapper) -> Self {
        match self {
            CapabilityBinding::Value(capability) => {
                CapabilityBinding::cached(move |object| wrapper(object, capability.clone()))
            }
            CapabilityBinding::Cached(factory) => {
                CapabilityBinding::cached(move |object| wrapper(object, factory(object)?))
            }
            CapabilityBinding::Dynamic(factory) => {
                CapabilityBinding::dynamic(move |object| wrapper(object, factory(object)?))
            }
        }
    }
}
