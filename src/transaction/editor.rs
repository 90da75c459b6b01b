use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::{info, warn};

use super::TransactionService;
use crate::error::{Result, UsageError};
use crate::events::{Emitter, ListenerId};

/// Event fired with the new editing flag whenever it changes.
pub const IS_EDITING: &str = "isEditing";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Idle,
    Editing,
    Saving,
}

/// Modal edit session over the transaction service.
///
/// Only one edit session exists at a time. `cancel` returns to `Idle`
/// before its discard work runs, so observers see "not editing" at once.
pub struct Editor {
    transactions: Arc<TransactionService>,
    state: Mutex<EditorState>,
    emitter: Emitter<bool>,
}

impl Editor {
    pub fn new(transactions: Arc<TransactionService>) -> Self {
        Editor {
            transactions,
            state: Mutex::new(EditorState::Idle),
            emitter: Emitter::new(),
        }
    }

    pub fn state(&self) -> EditorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_editing(&self) -> bool {
        self.state() == EditorState::Editing
    }

    pub fn on_editing<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.emitter.on(IS_EDITING, listener)
    }

    pub fn off_editing(&self, id: ListenerId) -> bool {
        self.emitter.off(IS_EDITING, id)
    }

    /// Begin editing; persists are deferred until `save` or `cancel`.
    pub fn edit(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != EditorState::Idle {
                return Err(UsageError::AlreadyEditing.into());
            }
            let transaction = self.transactions.start()?;
            info!(transaction = %transaction.id(), "editing started");
            *state = EditorState::Editing;
        }
        self.emitter.emit(IS_EDITING, &true);
        Ok(())
    }

    /// Commit the edit session. The editor returns to `Idle` and the
    /// transaction ends whether or not the commit succeeds.
    pub async fn save(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != EditorState::Editing {
                return Err(UsageError::NotEditing.into());
            }
            *state = EditorState::Saving;
        }

        let transaction = self.transactions.active();
        let result = match &transaction {
            Some(transaction) => transaction.commit().await,
            None => Ok(()),
        };
        if let Some(transaction) = &transaction {
            self.transactions.end(transaction);
        }
        if let Err(err) = &result {
            warn!(error = %err, "save failed; leaving edit mode");
        }

        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = EditorState::Idle;
        self.emitter.emit(IS_EDITING, &false);
        result
    }

    /// Abandon the edit session.
    ///
    /// Without an active session this resolves immediately. Otherwise the
    /// editor is `Idle` and the transaction has ended by the time this
    /// returns, so later persists write through even if the future is
    /// dropped. The future only discards the local changes recorded so far.
    pub fn cancel(&self) -> BoxFuture<'static, Result<()>> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != EditorState::Editing {
                return async { Ok(()) }.boxed();
            }
            *state = EditorState::Idle;
        }

        let discard = match self.transactions.active() {
            Some(transaction) => {
                let discard = transaction.abandon();
                self.transactions.end(&transaction);
                Some(discard)
            }
            None => None,
        };
        self.emitter.emit(IS_EDITING, &false);

        async move {
            let result = match discard {
                Some(Ok(discard)) => discard.await,
                Some(Err(err)) => Err(err),
                None => Ok(()),
            };
            if let Err(err) = &result {
                warn!(error = %err, "discarding edits failed");
            }
            result
        }
        .boxed()
    }
}
