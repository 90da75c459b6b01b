use thiserror::Error;

/// Error type for async mutex operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The critical section dropped its release handle without releasing.
    #[error("critical section for '{0}' ended without releasing")]
    Abandoned(String),
}
