//! Queued persistence - batches `persist()` calls behind the async mutex.
//!
//! The decorator ([`QueuingPersistenceDecorator`]) replaces every object's
//! persistence capability with one that hands writes to a shared
//! [`PersistenceQueue`]. The queue packs pending writes into [`ValueGroups`]
//! and dispatches one group per drain cycle.

mod capability;
mod queue;
mod value_groups;

pub use capability::{QueuingPersistence, QueuingPersistenceDecorator, Queueable};
pub use queue::PersistenceQueue;
pub use value_groups::ValueGroups;
