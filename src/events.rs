//! Emitter - synchronous, name-keyed listener registry.
//!
//! Listeners run inline on `emit`, in registration order, so observers see
//! events in exactly the order the emitting code produced them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle returned by [`Emitter::on`], used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct Emitter<E> {
    listeners: Arc<RwLock<HashMap<String, Vec<(ListenerId, Listener<E>)>>>>,
    next_id: AtomicU64,
}

impl<E> Emitter<E> {
    pub fn new() -> Self {
        Emitter {
            listeners: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered for `event`.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        match listeners.get_mut(event) {
            Some(event_listeners) => {
                let before = event_listeners.len();
                event_listeners.retain(|(listener_id, _)| *listener_id != id);
                event_listeners.len() != before
            }
            None => false,
        }
    }

    pub fn emit(&self, event: &str, data: &E) {
        // Snapshot so a listener may register or remove listeners re-entrantly.
        let snapshot: Vec<Listener<E>> = {
            let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            match listeners.get(event) {
                Some(event_listeners) => event_listeners
                    .iter()
                    .map(|(_, listener)| Arc::clone(listener))
                    .collect(),
                None => return,
            }
        };
        for listener in snapshot {
            listener(data);
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}
