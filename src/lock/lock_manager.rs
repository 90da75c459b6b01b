use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::AsyncMutex;

/// Per-key mutex registry.
///
/// Lazily creates one `AsyncMutex` per unique key and returns the same `Arc`
/// for repeated lookups, so every caller guarding a resource contends on the
/// same queue.
#[derive(Default)]
pub struct LockManager {
    locks: Mutex<HashMap<String, Arc<AsyncMutex>>>,
}

impl LockManager {
    pub fn new() -> Self {
        LockManager {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get (or create) the mutex for the given key.
    pub fn get_lock(&self, key: &str) -> Arc<AsyncMutex> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(key)))
            .clone()
    }

    /// Forget the mutex for `key` if nobody outside the manager holds it.
    ///
    /// Handles are only cloned under the registry lock, so an entry with no
    /// outside holders has no waiters either. Returns whether it was removed.
    pub fn release(&self, key: &str) -> bool {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        match locks.get(key) {
            Some(lock) if Arc::strong_count(lock) == 1 => {
                locks.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Forget every mutex nobody outside the manager holds.
    pub fn prune(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
