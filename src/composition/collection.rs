use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::join_all;
use tracing::{debug, warn};

use super::CompositionProvider;
use crate::error::{Result, UsageError};
use crate::events::{Emitter, ListenerId};
use crate::identifier::Identifier;
use crate::object::{DomainObject, ObjectLookup};

pub const LOAD: &str = "load";
pub const ADD: &str = "add";
pub const REMOVE: &str = "remove";

pub enum CompositionEvent {
    Load { children: Vec<DomainObject> },
    Add { child: DomainObject, index: usize },
    Remove { child: DomainObject, index: usize },
}

/// A provider call issued but not yet settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionChange {
    Add(Identifier),
    Remove(Identifier),
}

/// Runtime view of one parent's children.
///
/// The child list exists only once [`load`](Self::load) has resolved;
/// until then `add`, `remove` and `children` fail with
/// [`UsageError::NotLoaded`]. Collections are not shared: every
/// `composition()` call creates a new one.
pub struct CompositionCollection {
    parent: DomainObject,
    provider: Arc<dyn CompositionProvider>,
    lookup: Arc<dyn ObjectLookup>,
    children: Mutex<Option<Vec<DomainObject>>>,
    pending: Mutex<Vec<CompositionChange>>,
    emitter: Emitter<CompositionEvent>,
}

impl CompositionCollection {
    pub fn new(
        parent: DomainObject,
        provider: Arc<dyn CompositionProvider>,
        lookup: Arc<dyn ObjectLookup>,
    ) -> Self {
        CompositionCollection {
            parent,
            provider,
            lookup,
            children: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
            emitter: Emitter::new(),
        }
    }

    pub fn parent(&self) -> &DomainObject {
        &self.parent
    }

    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&CompositionEvent) + Send + Sync + 'static,
    {
        self.emitter.on(event, listener)
    }

    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.emitter.off(event, id)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded().is_some()
    }

    /// The loaded children, in order.
    pub fn children(&self) -> Result<Vec<DomainObject>> {
        self.loaded()
            .as_ref()
            .cloned()
            .ok_or_else(|| UsageError::NotLoaded.into())
    }

    /// Provider calls still in flight, oldest first.
    pub fn pending(&self) -> Vec<CompositionChange> {
        self.pending_log().clone()
    }

    /// Fetch every child and replace the in-memory list.
    ///
    /// Children keep the order of the provider's id list regardless of which
    /// fetch finishes first. Ids that resolve to nothing are skipped. Each
    /// call fetches anew.
    pub async fn load(&self) -> Result<Vec<DomainObject>> {
        let ids = self.provider.load(&self.parent).await?;
        let fetched = join_all(ids.iter().map(|id| self.lookup.get(id))).await;

        let mut children = Vec::with_capacity(ids.len());
        for (id, result) in ids.iter().zip(fetched) {
            match result? {
                Some(child) => children.push(child),
                None => {
                    warn!(parent = %self.parent.id(), child = %id, "composition child not found");
                }
            }
        }

        *self.loaded() = Some(children.clone());
        debug!(parent = %self.parent.id(), children = children.len(), "composition loaded");
        self.emitter.emit(
            LOAD,
            &CompositionEvent::Load {
                children: children.clone(),
            },
        );
        Ok(children)
    }

    /// Append `child`, updating the parent's stored composition first unless
    /// `skip_persistence_update` is set.
    pub async fn add(&self, child: &DomainObject, skip_persistence_update: bool) -> Result<()> {
        if !self.is_loaded() {
            return Err(UsageError::NotLoaded.into());
        }

        if !skip_persistence_update {
            self.track(
                CompositionChange::Add(child.id().clone()),
                self.provider.add(&self.parent, child.id()),
            )
            .await?;
        }

        let index = {
            let mut loaded = self.loaded();
            let children = loaded.as_mut().ok_or(UsageError::NotLoaded)?;
            children.push(child.clone());
            children.len() - 1
        };
        self.emitter.emit(
            ADD,
            &CompositionEvent::Add {
                child: child.clone(),
                index,
            },
        );
        Ok(())
    }

    /// Remove `child` from the parent and from the in-memory list.
    pub async fn remove(&self, child: &DomainObject) -> Result<()> {
        let id = child.id().clone();
        if self.index_of(&id)?.is_none() {
            return Err(UsageError::ChildNotFound(id).into());
        }

        self.track(
            CompositionChange::Remove(id.clone()),
            self.provider.remove(&self.parent, &id),
        )
        .await?;

        let (removed, index) = {
            let mut loaded = self.loaded();
            let children = loaded.as_mut().ok_or(UsageError::NotLoaded)?;
            let index = children
                .iter()
                .position(|candidate| *candidate.id() == id)
                .ok_or_else(|| UsageError::ChildNotFound(id.clone()))?;
            (children.remove(index), index)
        };
        self.emitter.emit(
            REMOVE,
            &CompositionEvent::Remove {
                child: removed,
                index,
            },
        );
        Ok(())
    }

    fn index_of(&self, id: &Identifier) -> Result<Option<usize>> {
        let loaded = self.loaded();
        let children = loaded.as_ref().ok_or(UsageError::NotLoaded)?;
        Ok(children.iter().position(|candidate| candidate.id() == id))
    }

    async fn track<F>(&self, change: CompositionChange, call: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        self.pending_log().push(change.clone());
        let result = call.await;
        let mut pending = self.pending_log();
        if let Some(position) = pending.iter().position(|entry| *entry == change) {
            pending.remove(position);
        }
        result
    }

    fn loaded(&self) -> MutexGuard<'_, Option<Vec<DomainObject>>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_log(&self) -> MutexGuard<'_, Vec<CompositionChange>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CompositionCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionCollection")
            .field("parent", self.parent.id())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
