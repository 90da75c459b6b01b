use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::TransactionService;
use crate::capability::{
    Capability, CapabilityBinding, CapabilityDecorator, CapabilityError, PERSISTENCE,
};
use crate::error::{Error, Result, UsageError};
use crate::identifier::Identifier;
use crate::object::DomainObject;
use crate::persistence::PersistenceCapability;

/// Persistence capability that defers writes while a transaction is active.
///
/// A deferred `persist()` resolves `Ok(true)` as soon as the object is
/// recorded; the real write happens on commit. With no open transaction,
/// calls go straight to the wrapped capability.
pub struct TransactingPersistence {
    inner: Arc<dyn PersistenceCapability>,
    transactions: Arc<TransactionService>,
}

impl TransactingPersistence {
    pub fn new(inner: Arc<dyn PersistenceCapability>, transactions: Arc<TransactionService>) -> Self {
        TransactingPersistence {
            inner,
            transactions,
        }
    }
}

#[async_trait]
impl PersistenceCapability for TransactingPersistence {
    fn identifier(&self) -> &Identifier {
        self.inner.identifier()
    }

    fn space(&self) -> String {
        self.inner.space()
    }

    async fn persist(&self) -> Result<bool> {
        if let Some(transaction) = self.transactions.active() {
            match transaction.add(Arc::clone(&self.inner)) {
                Ok(()) => return Ok(true),
                // Already committing or cancelling; nothing left to defer into.
                Err(Error::Usage(UsageError::TransactionClosed)) => {
                    debug!(id = %self.identifier(), "transaction closed; writing directly");
                }
                Err(err) => return Err(err),
            }
        }
        self.inner.persist().await
    }

    async fn refresh(&self) -> Result<()> {
        self.inner.refresh().await
    }
}

/// Rewraps every `persistence` binding with [`TransactingPersistence`].
pub struct TransactingPersistenceDecorator {
    transactions: Arc<TransactionService>,
}

impl TransactingPersistenceDecorator {
    pub fn new(transactions: Arc<TransactionService>) -> Self {
        TransactingPersistenceDecorator { transactions }
    }
}

impl CapabilityDecorator for TransactingPersistenceDecorator {
    fn decorate(&self, name: &str, binding: CapabilityBinding) -> CapabilityBinding {
        if name != PERSISTENCE {
            return binding;
        }
        let transactions = Arc::clone(&self.transactions);
        binding.wrap(Arc::new(move |_: &DomainObject, capability: Capability| {
            defer_persistence(capability, &transactions)
        }))
    }
}

fn defer_persistence(
    capability: Capability,
    transactions: &Arc<TransactionService>,
) -> Result<Capability, CapabilityError> {
    Ok(match capability {
        Capability::Persistence(inner) => Capability::Persistence(Arc::new(
            TransactingPersistence::new(inner, Arc::clone(transactions)),
        )),
        other => other,
    })
}
