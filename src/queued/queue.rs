use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::ValueGroups;
use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::lock::{AsyncMutex, LockError};
use crate::persistence::PersistenceCapability;

type Waiter = oneshot::Sender<Result<bool>>;

struct PendingPersist {
    target: Arc<dyn PersistenceCapability>,
    waiters: Vec<Waiter>,
}

impl PendingPersist {
    fn targets(&self, other: &Arc<dyn PersistenceCapability>) -> bool {
        Arc::as_ptr(&self.target) as *const () == Arc::as_ptr(other) as *const ()
    }
}

struct QueueState {
    groups: ValueGroups<Identifier, PendingPersist>,
    scheduled: bool,
}

/// Batches persist requests and dispatches them one group at a time.
///
/// Requests made within `delay` of each other are drained together. A repeat
/// request for a capability that is already waiting joins that pending write
/// instead of queueing another; a request for the same id through a different
/// handle opens a new group so neither value is lost.
pub struct PersistenceQueue {
    state: Mutex<QueueState>,
    drain: AsyncMutex,
    delay: Duration,
}

impl PersistenceQueue {
    pub fn new(delay: Duration) -> Self {
        PersistenceQueue {
            state: Mutex::new(QueueState {
                groups: ValueGroups::new(),
                scheduled: false,
            }),
            drain: AsyncMutex::new("persistence-queue"),
            delay,
        }
    }

    /// Queue a write. The receiver resolves with the write's outcome.
    pub fn enqueue(self: &Arc<Self>, target: Arc<dyn PersistenceCapability>) -> oneshot::Receiver<Result<bool>> {
        let (tx, rx) = oneshot::channel();
        let id = target.identifier().clone();

        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;
        match state.groups.latest_mut(&id) {
            Some(pending) if pending.targets(&target) => {
                pending.waiters.push(tx);
                debug!(%id, "coalesced persist into pending write");
            }
            _ => {
                let group = state.groups.put(
                    id.clone(),
                    PendingPersist {
                        target,
                        waiters: vec![tx],
                    },
                );
                debug!(%id, group, "queued persist");
            }
        }

        if !state.scheduled {
            state.scheduled = true;
            let queue = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(queue.delay).await;
                if let Err(err) = queue.flush().await {
                    warn!(error = %err, "persistence queue drain failed");
                }
            });
        }
        rx
    }

    /// Drain every queued group now, in order.
    pub async fn flush(&self) -> Result<()> {
        while self.drain_once().await? {}
        Ok(())
    }

    /// Number of queued groups not yet dispatched.
    pub fn pending_groups(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .groups
            .len()
    }

    /// Dispatch the oldest group. `false` when there was nothing to do.
    async fn drain_once(&self) -> Result<bool> {
        self.drain
            .acquire(|release| {
                let group = {
                    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
                    let group = state.groups.poll();
                    if group.is_none() {
                        state.scheduled = false;
                    }
                    group
                };

                let group = match group {
                    Some(group) => group,
                    None => {
                        release.release(Ok(false));
                        return Ok(());
                    }
                };

                debug!(writes = group.len(), "draining persistence group");
                tokio::spawn(async move {
                    let outcomes =
                        join_all(group.iter().map(|(_, pending)| pending.target.persist())).await;

                    for ((id, pending), outcome) in group.into_iter().zip(outcomes) {
                        if let Err(err) = &outcome {
                            warn!(%id, error = %err, "queued persist failed");
                        }
                        for waiter in pending.waiters {
                            let _ = waiter.send(outcome.clone());
                        }
                    }
                    release.release(Ok(true));
                });
                Ok(())
            })
            .await
    }
}

/// Await a queued write, treating a dropped sender as an abandoned drain.
pub(crate) async fn settled(rx: oneshot::Receiver<Result<bool>>) -> Result<bool> {
    rx.await
        .map_err(|_| Error::from(LockError::Abandoned("persistence-queue".into())))?
}
