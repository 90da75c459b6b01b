use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{oneshot, OwnedMutexGuard};

use super::LockError;
use crate::error::Error;

type GuardSlot = Arc<Mutex<Option<OwnedMutexGuard<()>>>>;

fn free(slot: &GuardSlot) {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take();
}

/// FIFO async mutex guarding one logical resource.
///
/// Backed by `tokio::sync::Mutex`, which queues waiters fairly, so critical
/// sections start in the order `acquire`/`run_exclusive` were first polled.
pub struct AsyncMutex {
    name: String,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl AsyncMutex {
    pub fn new(name: impl Into<String>) -> Self {
        AsyncMutex {
            name: name.into(),
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `work` with exclusive access and wait for it to release.
    ///
    /// `work` receives a [`Release`] handle and may hand it to another task;
    /// the mutex stays held until `release` is called or the handle is
    /// dropped. If `work` itself fails, the error is returned and the next
    /// waiter runs regardless of where the handle went.
    pub async fn acquire<T, F>(&self, work: F) -> Result<T, Error>
    where
        F: FnOnce(Release<T>) -> Result<(), Error>,
    {
        let guard = self.gate.clone().lock_owned().await;
        let slot: GuardSlot = Arc::new(Mutex::new(Some(guard)));
        let (tx, rx) = oneshot::channel();

        let release = Release {
            slot: Arc::clone(&slot),
            tx: Some(tx),
        };

        if let Err(err) = work(release) {
            free(&slot);
            return Err(err);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(LockError::Abandoned(self.name.clone()).into()),
        }
    }

    /// Run an async callback with exclusive access, releasing with its output.
    pub async fn run_exclusive<F, Fut, T>(&self, callback: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.gate.lock().await;
        callback().await
    }

    pub fn is_locked(&self) -> bool {
        self.gate.try_lock().is_err()
    }
}

/// Handle that ends a critical section started by [`AsyncMutex::acquire`].
pub struct Release<T> {
    slot: GuardSlot,
    tx: Option<oneshot::Sender<Result<T, Error>>>,
}

impl<T> Release<T> {
    /// Resolve the pending `acquire` with `result` and admit the next waiter.
    pub fn release(mut self, result: Result<T, Error>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
        free(&self.slot);
    }
}

impl<T> Drop for Release<T> {
    fn drop(&mut self) {
        free(&self.slot);
    }
}
