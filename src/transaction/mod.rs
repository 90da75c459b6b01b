//! Transactions - deferred, all-or-nothing batches of persists.
//!
//! While a [`Transaction`] is active, the [`TransactingPersistence`]
//! decorator records objects instead of writing them. `commit` writes every
//! recorded object; `cancel` discards local changes by refreshing them from
//! storage. The [`Editor`] drives this as a modal edit session.

mod capability;
mod editor;
mod service;
mod transaction;

pub use capability::{TransactingPersistence, TransactingPersistenceDecorator};
pub use editor::{Editor, EditorState, IS_EDITING};
pub use service::TransactionService;
pub use transaction::Transaction;
