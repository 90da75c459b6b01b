//! Composition - ordered parent/child containment between domain objects.
//!
//! A [`CompositionRegistry`] picks the provider for a parent; each call to
//! [`CompositionRegistry::composition`] yields a fresh
//! [`CompositionCollection`] bound to that parent.

mod capability;
mod collection;
mod default_provider;
mod registry;

use async_trait::async_trait;

use crate::error::Result;
use crate::identifier::Identifier;
use crate::object::DomainObject;

pub use capability::CompositionCapabilityProvider;
pub use collection::{CompositionChange, CompositionCollection, CompositionEvent, ADD, LOAD, REMOVE};
pub use default_provider::DefaultCompositionProvider;
pub use registry::{CompositionRegistry, DEFAULT_PRIORITY};

/// Resolves and edits the children of the parents it applies to.
#[async_trait]
pub trait CompositionProvider: Send + Sync {
    fn applies_to(&self, parent: &DomainObject) -> bool;

    /// Child identifiers of `parent`, in order.
    async fn load(&self, parent: &DomainObject) -> Result<Vec<Identifier>>;

    async fn add(&self, parent: &DomainObject, child: &Identifier) -> Result<()>;

    async fn remove(&self, parent: &DomainObject, child: &Identifier) -> Result<()>;
}
