use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, UsageError};
use crate::identifier::Identifier;
use crate::persistence::PersistenceCapability;

struct Dirty {
    objects: Vec<(Identifier, Arc<dyn PersistenceCapability>)>,
    open: bool,
}

/// An ordered set of objects whose writes are deferred until commit.
///
/// Once committed or cancelled a transaction is closed and cannot be reused.
pub struct Transaction {
    id: Uuid,
    dirty: Mutex<Dirty>,
}

impl Transaction {
    pub fn new() -> Self {
        Transaction {
            id: Uuid::new_v4(),
            dirty: Mutex::new(Dirty {
                objects: Vec::new(),
                open: true,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Record an object for commit. Re-adding an object keeps its first
    /// position and the latest handle.
    pub fn add(&self, persistence: Arc<dyn PersistenceCapability>) -> Result<()> {
        let mut dirty = self.lock();
        if !dirty.open {
            return Err(UsageError::TransactionClosed.into());
        }

        let id = persistence.identifier().clone();
        match dirty.objects.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = persistence,
            None => {
                debug!(transaction = %self.id, %id, "object added to transaction");
                dirty.objects.push((id, persistence));
            }
        }
        Ok(())
    }

    /// Identifiers recorded so far, in record order.
    pub fn dirty(&self) -> Vec<Identifier> {
        self.lock().objects.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Write every recorded object, dispatched in record order.
    ///
    /// All writes run to completion; the first failure is returned.
    pub async fn commit(&self) -> Result<()> {
        let objects = self.close()?;
        info!(transaction = %self.id, objects = objects.len(), "committing transaction");

        let outcomes = join_all(objects.iter().map(|(_, persistence)| persistence.persist())).await;
        first_failure(&objects, outcomes.into_iter().map(|outcome| outcome.map(|_| ())))
    }

    /// Discard local changes to every recorded object.
    pub async fn cancel(&self) -> Result<()> {
        self.abandon()?.await
    }

    /// Close the transaction now and hand back the discard work.
    ///
    /// Nothing can be recorded once this returns, even if the returned
    /// future is never polled. The future refreshes every object that was
    /// recorded before the close.
    pub fn abandon(&self) -> Result<BoxFuture<'static, Result<()>>> {
        let objects = self.close()?;
        info!(transaction = %self.id, objects = objects.len(), "cancelling transaction");

        Ok(async move {
            let outcomes =
                join_all(objects.iter().map(|(_, persistence)| persistence.refresh())).await;
            first_failure(&objects, outcomes)
        }
        .boxed())
    }

    fn close(&self) -> Result<Vec<(Identifier, Arc<dyn PersistenceCapability>)>> {
        let mut dirty = self.lock();
        if !dirty.open {
            return Err(UsageError::TransactionClosed.into());
        }
        dirty.open = false;
        Ok(std::mem::take(&mut dirty.objects))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Dirty> {
        self.dirty.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

fn first_failure(
    objects: &[(Identifier, Arc<dyn PersistenceCapability>)],
    outcomes: impl IntoIterator<Item = Result<()>>,
) -> Result<()> {
    let mut first = None;
    for ((id, _), outcome) in objects.iter().zip(outcomes) {
        if let Err(err) = outcome {
            warn!(%id, error = %err, "transaction write failed");
            first.get_or_insert(err);
        }
    }
    first.map_or(Ok(()), Err)
}
