//! Domain-object persistence coordination.
//!
//! Domain objects carry a JSON model and a per-type set of capabilities.
//! Writes go through a persistence capability that is decorated twice: an
//! active transaction defers them, and a queue batches them behind an async
//! mutex. Objects may live in several storage spaces; reconciliation picks
//! one authoritative space per id at startup.
//!
//! [`Platform`] wires all of it together.

pub mod capability;
pub mod composition;
pub mod config;
mod error;
pub mod events;
mod identifier;
pub mod lock;
pub mod object;
pub mod persistence;
mod platform;
pub mod queued;
pub mod reconcile;
pub mod transaction;

pub use capability::{Capability, CapabilityBinding, CapabilityProvider, Used};
pub use composition::{CompositionCollection, CompositionEvent, CompositionProvider};
pub use config::{ConfigError, PlatformConfig};
pub use error::{Error, Result, UsageError};
pub use identifier::Identifier;
pub use lock::{AsyncMutex, LockManager};
pub use object::{DomainObject, Model, ObjectLookup, ObjectService};
pub use persistence::{
    BackendError, InMemoryPersistence, PersistenceCapability, PersistenceService, SpaceRouter,
};
pub use platform::{Platform, PlatformBuilder};
pub use reconcile::{SpaceMap, SpaceReconciler};
pub use transaction::{Editor, EditorState, Transaction, TransactionService};
