use crate::error::Result;
use crate::events::{Emitter, ListenerId};
use crate::object::{now_millis, DomainObject, Model, WeakDomainObject};

const MUTATION_EVENT: &str = "mutation";

/// The only public path for changing a domain object's model.
///
/// Listeners registered with [`listen`](Self::listen) observe every applied
/// mutation, including models applied by `refresh()`.
pub struct MutationCapability {
    object: WeakDomainObject,
    emitter: Emitter<Model>,
}

impl MutationCapability {
    pub fn new(object: &DomainObject) -> Self {
        MutationCapability {
            object: object.downgrade(),
            emitter: Emitter::new(),
        }
    }

    /// Apply `mutator` to a copy of the model.
    ///
    /// Returning `false` from the mutator discards the change. Otherwise the
    /// copy replaces the model, `modified` is stamped with `timestamp` (or
    /// now) unless the mutator set it itself, and listeners are notified.
    pub fn mutate<F>(&self, mutator: F, timestamp: Option<i64>) -> Result<bool>
    where
        F: FnOnce(&mut Model) -> bool,
    {
        let object = self.object.upgrade()?;
        let before = object.model();
        let mut next = before.clone();

        if !mutator(&mut next) {
            return Ok(false);
        }

        if next.modified() == before.modified() {
            next.set_modified(timestamp.unwrap_or_else(now_millis));
        }

        object.set_model(next.clone());
        self.emitter.emit(MUTATION_EVENT, &next);
        Ok(true)
    }

    /// Replace the model wholesale, keeping its own timestamps.
    pub(crate) fn apply(&self, model: Model) -> Result<()> {
        let object = self.object.upgrade()?;
        object.set_model(model.clone());
        self.emitter.emit(MUTATION_EVENT, &model);
        Ok(())
    }

    pub fn listen<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Model) + Send + Sync + 'static,
    {
        self.emitter.on(MUTATION_EVENT, listener)
    }

    pub fn unlisten(&self, id: ListenerId) -> bool {
        self.emitter.off(MUTATION_EVENT, id)
    }
}
