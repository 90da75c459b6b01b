use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{BackendError, SpaceRouter};
use crate::capability::{Capability, CapabilityBinding, CapabilityProvider, PERSISTENCE};
use crate::error::Result;
use crate::identifier::Identifier;
use crate::lock::LockManager;
use crate::object::{now_millis, DomainObject, Model, WeakDomainObject};

/// Per-object persistence behavior.
///
/// Decorators (queueing, transactions) implement this trait too and forward
/// to the capability they wrap.
#[async_trait]
pub trait PersistenceCapability: Send + Sync {
    fn identifier(&self) -> &Identifier;

    /// The space this object is (or will be) stored in.
    fn space(&self) -> String;

    /// Write the object's current model. Resolves once the write completes.
    async fn persist(&self) -> Result<bool>;

    /// Replace the object's model with the stored one, discarding local changes.
    async fn refresh(&self) -> Result<()>;
}

/// Writes one domain object through the space router.
///
/// Operations on the same object are serialized through a keyed mutex, so a
/// refresh never interleaves with a persist of the same object.
pub struct SpacePersistence {
    id: Identifier,
    object: WeakDomainObject,
    router: Arc<SpaceRouter>,
    locks: Arc<LockManager>,
}

impl SpacePersistence {
    pub fn new(object: &DomainObject, router: Arc<SpaceRouter>, locks: Arc<LockManager>) -> Self {
        SpacePersistence {
            id: object.id().clone(),
            object: object.downgrade(),
            router,
            locks,
        }
    }

    async fn write(&self, object: &DomainObject) -> Result<bool> {
        let space = self.space();
        let backend = self.router.backend(&space)?;

        let key = self.router.storage_key(&self.id);

        let mut model = object.model();
        let first_write = model.persisted().is_none();
        let stamp = model.modified().unwrap_or_else(now_millis);
        model.set_persisted(stamp);

        let (operation, written) = if first_write {
            ("create", backend.create_object(&space, &key, &model).await?)
        } else {
            ("update", backend.update_object(&space, &key, &model).await?)
        };

        if !written {
            return Err(BackendError::Rejected {
                operation,
                space,
                id: self.id.to_string(),
            }
            .into());
        }

        // Stamp only the field we wrote so concurrent edits survive.
        object.update_model(|current| current.set_persisted(stamp));

        if first_write {
            self.router.assign(&self.id, &space);
        }
        debug!(id = %self.id, %space, operation, "persisted");
        Ok(true)
    }

    /// Run `work` under this object's keyed mutex, dropping the mutex from
    /// the manager afterwards if no other operation is waiting on it.
    async fn exclusive<F, Fut, T>(&self, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let key = self.id.to_string();
        let lock = self.locks.get_lock(&key);
        let output = lock.run_exclusive(work).await;
        drop(lock);
        self.locks.release(&key);
        output
    }

    async fn reload(&self, object: &DomainObject) -> Result<()> {
        let stored: Option<Model> = self.router.read(&self.id).await?;
        match stored {
            Some(model) => match object.mutation() {
                Some(mutation) => mutation.apply(model),
                None => {
                    object.set_model(model);
                    Ok(())
                }
            },
            None => {
                debug!(id = %self.id, "refresh found no stored record; keeping local model");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl PersistenceCapability for SpacePersistence {
    fn identifier(&self) -> &Identifier {
        &self.id
    }

    fn space(&self) -> String {
        self.router.space_for(&self.id)
    }

    async fn persist(&self) -> Result<bool> {
        let object = self.object.upgrade()?;
        self.exclusive(|| self.write(&object)).await
    }

    async fn refresh(&self) -> Result<()> {
        let object = self.object.upgrade()?;
        self.exclusive(|| self.reload(&object)).await
    }
}

/// Binds a [`SpacePersistence`] to every object, built once per object.
pub struct PersistenceCapabilityProvider {
    router: Arc<SpaceRouter>,
    locks: Arc<LockManager>,
}

impl PersistenceCapabilityProvider {
    pub fn new(router: Arc<SpaceRouter>, locks: Arc<LockManager>) -> Self {
        PersistenceCapabilityProvider { router, locks }
    }
}

impl CapabilityProvider for PersistenceCapabilityProvider {
    fn capabilities(&self, _model: &Model) -> Vec<(String, CapabilityBinding)> {
        let router = Arc::clone(&self.router);
        let locks = Arc::clone(&self.locks);
        vec![(
            PERSISTENCE.to_string(),
            CapabilityBinding::cached(move |object| {
                Ok(Capability::Persistence(Arc::new(SpacePersistence::new(
                    object,
                    Arc::clone(&router),
                    Arc::clone(&locks),
                ))))
            }),
        )]
    }
}
