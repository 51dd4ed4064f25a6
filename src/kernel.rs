use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::api::{KernelTransaction, LockingStatementOperations};
use crate::config::KernelOptions;
use crate::locking::{LockClient, LockManager};
use crate::schema::SchemaStateCache;
use crate::storage::MemoryStore;
use crate::types::TxId;

/// Locked operations over the in-memory store.
pub type KernelOperations =
    LockingStatementOperations<MemoryStore, MemoryStore, MemoryStore, SchemaStateCache>;

/// Transaction handed out by [`Kernel::begin_transaction`].
pub type Transaction = KernelTransaction<MemoryStore, KernelOperations>;

/// Wires a store, the schema-state cache and a lock manager together.
///
/// ```
/// use sombra_kernel::{Kernel, KernelOptions, LabelId, PropId};
///
/// let kernel = Kernel::new(KernelOptions::default());
/// let tx = kernel.begin_transaction();
/// let index = tx.schema_statement().index_create(LabelId(3), PropId(5))?;
/// assert_eq!((index.label(), index.prop()), (LabelId(3), PropId(5)));
/// tx.commit()?;
/// # Ok::<(), sombra_kernel::KernelError>(())
/// ```
pub struct Kernel {
    options: KernelOptions,
    store: Arc<MemoryStore>,
    schema_state: Arc<SchemaStateCache>,
    locks: LockManager,
    ops: Arc<KernelOperations>,
    next_tx: AtomicU64,
}

impl Kernel {
    pub fn new(options: KernelOptions) -> Self {
        let schema_state = Arc::new(SchemaStateCache::new(options.schema_state_capacity));
        let store = Arc::new(MemoryStore::new(Arc::clone(&schema_state)));
        let ops = Arc::new(LockingStatementOperations::new(
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::clone(&schema_state),
        ));
        let locks = LockManager::new(options.lock_wait_timeout());
        info!(
            lock_wait_timeout_ms = ?options.lock_wait_timeout_ms,
            schema_state_capacity = options.schema_state_capacity,
            "kernel started"
        );
        Self {
            options,
            store,
            schema_state,
            locks,
            ops,
            next_tx: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> &KernelOptions {
        &self.options
    }

    /// Backing store, for node and relationship allocation.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn schema_state(&self) -> &Arc<SchemaStateCache> {
        &self.schema_state
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    /// Opens a transaction with its own lock client.
    pub fn begin_transaction(&self) -> Transaction {
        let id = TxId(self.next_tx.fetch_add(1, Ordering::SeqCst) + 1);
        let locks: Arc<dyn LockClient> = Arc::new(self.locks.client(id));
        KernelTransaction::new(id, locks, Arc::clone(&self.store), Arc::clone(&self.ops))
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locking::{LockMode, LockResource};
    use crate::types::{LabelId, NodeId};

    #[test]
    fn transactions_get_distinct_ids() {
        let kernel = Kernel::default();
        let a = kernel.begin_transaction();
        let b = kernel.begin_transaction();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn statement_locks_are_released_on_commit() {
        let kernel = Kernel::default();
        let node = kernel.store().node_create();
        let tx = kernel.begin_transaction();
        assert!(tx.data_statement().node_add_label(node, LabelId(1)).unwrap());
        let resource = LockResource::Node(node);
        assert!(kernel
            .lock_manager()
            .is_held(tx.id(), &resource, LockMode::Exclusive));
        tx.commit().unwrap();
        assert!(!kernel
            .lock_manager()
            .is_held(tx.id(), &resource, LockMode::Exclusive));
        assert_eq!(kernel.lock_manager().locked_resources(), 0);
        assert!(kernel.store().node_create() > NodeId(1));
    }
}
