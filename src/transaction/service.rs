use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::Transaction;
use crate::error::{Result, UsageError};

/// Holds the single active transaction.
#[derive(Default)]
pub struct TransactionService {
    active: Mutex<Option<Arc<Transaction>>>,
}

impl TransactionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new transaction. Fails while another one is active.
    pub fn start(&self) -> Result<Arc<Transaction>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.is_some() {
            return Err(UsageError::TransactionActive.into());
        }
        let transaction = Arc::new(Transaction::new());
        debug!(transaction = %transaction.id(), "transaction started");
        *active = Some(Arc::clone(&transaction));
        Ok(transaction)
    }

    pub fn active(&self) -> Option<Arc<Transaction>> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// End `transaction` if it is the active one.
    pub fn end(&self, transaction: &Arc<Transaction>) -> bool {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            Some(current) if Arc::ptr_eq(current, transaction) => {
                *active = None;
                debug!(transaction = %transaction.id(), "transaction ended");
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn one_transaction_at_a_time() {
        let service = TransactionService::new();
        let first = service.start().unwrap();
        assert!(service.is_active());
        assert!(matches!(
            service.start(),
            Err(Error::Usage(UsageError::TransactionActive))
        ));

        assert!(service.end(&first));
        assert!(!service.is_active());
        assert!(service.start().is_ok());
    }

    #[test]
    fn ending_a_stale_transaction_is_ignored() {
        let service = TransactionService::new();
        let stale = service.start().unwrap();
        service.end(&stale);
        let current = service.start().unwrap();

        assert!(!service.end(&stale));
        assert!(Arc::ptr_eq(&service.active().unwrap(), &current));
    }
}
