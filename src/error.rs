use thiserror::Error;

use crate::capability::CapabilityError;
use crate::identifier::Identifier;
use crate::lock::LockError;
use crate::persistence::BackendError;

/// Programming errors: the caller used the API out of order.
///
/// These fail fast and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("composition collection is not loaded")]
    NotLoaded,
    #[error("child {0} not found in composition")]
    ChildNotFound(Identifier),
    #[error("already editing")]
    AlreadyEditing,
    #[error("not editing")]
    NotEditing,
    #[error("a transaction is already active")]
    TransactionActive,
    #[error("transaction has already been committed or cancelled")]
    TransactionClosed,
}

/// Crate-level error.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error(transparent)]
    Lock(#[from] LockError),
    /// The object a capability was built for has been dropped from every cache.
    #[error("domain object {0} is no longer available")]
    ObjectDropped(Identifier),
    #[error("domain object {id} has no '{capability}' capability")]
    MissingCapability { id: Identifier, capability: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
