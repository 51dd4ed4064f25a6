//! Lock client contract and the in-process lock manager.

mod index_entry;
mod manager;

pub use index_entry::IndexEntryLock;
pub use manager::{LockManager, LockMode, LockResource, TxLocks};

use crate::error::LockError;
use crate::types::{NodeId, RelationshipId};

/// Per-transaction handle used to acquire locks.
///
/// Acquisition may block until the lock is granted. Re-acquiring a lock already
/// held by the same transaction is a no-op. Locks are released together by
/// [`LockClient::release_all`] when the owning transaction ends; the statement
/// layer never releases individual locks.
pub trait LockClient: Send + Sync {
    /// Exclusive lock on a single node.
    fn acquire_node_write_lock(&self, node: NodeId) -> Result<(), LockError>;

    /// Exclusive lock on a single relationship.
    fn acquire_relationship_write_lock(&self, rel: RelationshipId) -> Result<(), LockError>;

    /// Exclusive lock on graph-level properties.
    fn acquire_graph_write_lock(&self) -> Result<(), LockError>;

    /// Exclusive lock on the whole schema.
    fn acquire_schema_write_lock(&self) -> Result<(), LockError>;

    /// Shared lock on the whole schema.
    fn acquire_schema_read_lock(&self) -> Result<(), LockError>;

    /// Exclusive lock on one entry of a uniqueness index.
    fn acquire_index_entry_write_lock(&self, entry: &IndexEntryLock) -> Result<(), LockError>;

    /// Releases every lock held by the transaction.
    fn release_all(&self);

    /// Marks the transaction terminated; pending and future acquisitions fail
    /// with [`LockError::Terminated`].
    fn terminate(&self);
}
