//! Async mutual exclusion for one logical resource at a time.
//!
//! `AsyncMutex` hands out exclusive access strictly in acquisition order.
//! `LockManager` lazily creates one mutex per resource key.

mod error;
mod lock_manager;
mod mutex;

pub use error::LockError;
pub use lock_manager::LockManager;
pub use mutex::{AsyncMutex, Release};
