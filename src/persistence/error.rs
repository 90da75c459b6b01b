use thiserror::Error;

/// Failures reported by, or on behalf of, a persistence backend.
///
/// Surfaced to callers as rejected futures; this layer never retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("unknown persistence space '{0}'")]
    UnknownSpace(String),
    #[error("persistence space '{space}' is unreachable: {message}")]
    Unreachable { space: String, message: String },
    #[error("{operation} of '{id}' was rejected by space '{space}'")]
    Rejected {
        operation: &'static str,
        space: String,
        id: String,
    },
    #[error("{operation} in space '{space}' timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        space: String,
        after_ms: u64,
    },
    #[error("record serialization failed: {0}")]
    Serde(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serde(err.to_string())
    }
}
