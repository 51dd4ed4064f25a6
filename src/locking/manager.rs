use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use crate::error::LockError;
use crate::types::{NodeId, RelationshipId, TxId};

use super::{IndexEntryLock, LockClient};

/// Lockable resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LockResource {
    /// A single node.
    Node(NodeId),
    /// A single relationship.
    Relationship(RelationshipId),
    /// Graph-level properties.
    Graph,
    /// All index and constraint definitions.
    Schema,
    /// One entry of a uniqueness index.
    IndexEntry(IndexEntryLock),
}

impl fmt::Display for LockResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockResource::Node(id) => write!(f, "node({id})"),
            LockResource::Relationship(id) => write!(f, "relationship({id})"),
            LockResource::Graph => f.write_str("graph"),
            LockResource::Schema => f.write_str("schema"),
            LockResource::IndexEntry(entry) => write!(f, "{entry}"),
        }
    }
}

/// Lock mode requested for a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    /// Compatible with other shared holders.
    Shared,
    /// Compatible with nothing held by other transactions.
    Exclusive,
}

#[derive(Default, Debug)]
struct ResourceState {
    exclusive: Option<TxId>,
    shared: FxHashSet<TxId>,
}

impl ResourceState {
    fn holds(&self, tx: TxId, mode: LockMode) -> bool {
        match mode {
            LockMode::Exclusive => self.exclusive == Some(tx),
            LockMode::Shared => self.exclusive == Some(tx) || self.shared.contains(&tx),
        }
    }

    fn grantable(&self, tx: TxId, mode: LockMode) -> bool {
        let exclusive_ok = self.exclusive.map_or(true, |owner| owner == tx);
        match mode {
            LockMode::Shared => exclusive_ok,
            LockMode::Exclusive => exclusive_ok && self.shared.iter().all(|&holder| holder == tx),
        }
    }

    fn grant(&mut self, tx: TxId, mode: LockMode) {
        match mode {
            LockMode::Exclusive => self.exclusive = Some(tx),
            LockMode::Shared => {
                self.shared.insert(tx);
            }
        }
    }

    fn release(&mut self, tx: TxId) {
        if self.exclusive == Some(tx) {
            self.exclusive = None;
        }
        self.shared.remove(&tx);
    }

    fn is_free(&self) -> bool {
        self.exclusive.is_none() && self.shared.is_empty()
    }
}

struct Inner {
    table: Mutex<FxHashMap<LockResource, ResourceState>>,
    released: Condvar,
    wait_timeout: Option<Duration>,
}

/// Shared/exclusive lock table shared by all transactions of a kernel.
///
/// Waits are bounded by the configured timeout instead of running deadlock
/// detection.
#[derive(Clone)]
pub struct LockManager {
    inner: Arc<Inner>,
}

impl LockManager {
    /// Creates a lock manager; `wait_timeout` of `None` waits indefinitely.
    pub fn new(wait_timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(FxHashMap::default()),
                released: Condvar::new(),
                wait_timeout,
            }),
        }
    }

    /// Returns the lock client for transaction `tx`.
    pub fn client(&self, tx: TxId) -> TxLocks {
        TxLocks {
            tx,
            manager: self.clone(),
            held: Mutex::new(Vec::new()),
            terminated: AtomicBool::new(false),
        }
    }

    /// Returns `true` when `tx` currently holds `resource` in at least `mode`.
    pub fn is_held(&self, tx: TxId, resource: &LockResource, mode: LockMode) -> bool {
        self.inner
            .table
            .lock()
            .get(resource)
            .is_some_and(|state| state.holds(tx, mode))
    }

    /// Number of resources with at least one holder.
    pub fn locked_resources(&self) -> usize {
        self.inner.table.lock().len()
    }

    /// Acquires `resource` for `tx`, returning `true` when the lock was newly granted.
    fn acquire(
        &self,
        tx: TxId,
        resource: &LockResource,
        mode: LockMode,
        terminated: &AtomicBool,
    ) -> Result<bool, LockError> {
        let started = Instant::now();
        let deadline = self.inner.wait_timeout.map(|timeout| started + timeout);
        let mut table = self.inner.table.lock();
        let mut waited = false;
        loop {
            if terminated.load(Ordering::SeqCst) {
                return Err(LockError::Terminated { tx });
            }
            let state = table.entry(resource.clone()).or_default();
            if state.holds(tx, mode) {
                return Ok(false);
            }
            if state.grantable(tx, mode) {
                state.grant(tx, mode);
                if waited {
                    debug!(
                        tx_id = tx.0,
                        %resource,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "lock granted after wait"
                    );
                }
                return Ok(true);
            }
            if state.is_free() {
                table.remove(resource);
            }
            waited = true;
            match deadline {
                Some(deadline) => {
                    if self.inner.released.wait_until(&mut table, deadline).timed_out() {
                        let waited_ms = started.elapsed().as_millis() as u64;
                        warn!(tx_id = tx.0, %resource, waited_ms, "lock wait timed out");
                        return Err(LockError::Timeout {
                            resource: resource.to_string(),
                            waited_ms,
                        });
                    }
                }
                None => self.inner.released.wait(&mut table),
            }
        }
    }

    fn release_all(&self, tx: TxId, held: &[LockResource]) {
        if held.is_empty() {
            return;
        }
        let mut table = self.inner.table.lock();
        for resource in held {
            if let Some(state) = table.get_mut(resource) {
                state.release(tx);
                if state.is_free() {
                    table.remove(resource);
                }
            }
        }
        drop(table);
        self.inner.released.notify_all();
    }

    fn wake_waiters(&self) {
        let _table = self.inner.table.lock();
        self.inner.released.notify_all();
    }
}

/// Lock client of a single transaction.
pub struct TxLocks {
    tx: TxId,
    manager: LockManager,
    held: Mutex<Vec<LockResource>>,
    terminated: AtomicBool,
}

impl TxLocks {
    /// Owning transaction.
    pub fn tx(&self) -> TxId {
        self.tx
    }

    /// Number of distinct resources this transaction holds.
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    fn acquire(&self, resource: LockResource, mode: LockMode) -> Result<(), LockError> {
        trace!(tx_id = self.tx.0, %resource, ?mode, "acquiring lock");
        let granted = self
            .manager
            .acquire(self.tx, &resource, mode, &self.terminated)?;
        if granted {
            let mut held = self.held.lock();
            if !held.contains(&resource) {
                held.push(resource);
            }
        }
        Ok(())
    }
}

impl LockClient for TxLocks {
    fn acquire_node_write_lock(&self, node: NodeId) -> Result<(), LockError> {
        self.acquire(LockResource::Node(node), LockMode::Exclusive)
    }

    fn acquire_relationship_write_lock(&self, rel: RelationshipId) -> Result<(), LockError> {
        self.acquire(LockResource::Relationship(rel), LockMode::Exclusive)
    }

    fn acquire_graph_write_lock(&self) -> Result<(), LockError> {
        self.acquire(LockResource::Graph, LockMode::Exclusive)
    }

    fn acquire_schema_write_lock(&self) -> Result<(), LockError> {
        self.acquire(LockResource::Schema, LockMode::Exclusive)
    }

    fn acquire_schema_read_lock(&self) -> Result<(), LockError> {
        self.acquire(LockResource::Schema, LockMode::Shared)
    }

    fn acquire_index_entry_write_lock(&self, entry: &IndexEntryLock) -> Result<(), LockError> {
        self.acquire(LockResource::IndexEntry(entry.clone()), LockMode::Exclusive)
    }

    fn release_all(&self) {
        let held = std::mem::take(&mut *self.held.lock());
        trace!(tx_id = self.tx.0, count = held.len(), "releasing locks");
        self.manager.release_all(self.tx, &held);
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
        self.manager.wake_waiters();
    }
}

impl Drop for TxLocks {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    #[test]
    fn reacquiring_is_reentrant() -> Result<(), LockError> {
        let manager = LockManager::new(Some(Duration::from_millis(100)));
        let locks = manager.client(TxId(1));
        locks.acquire_node_write_lock(NodeId(7))?;
        locks.acquire_node_write_lock(NodeId(7))?;
        assert_eq!(locks.held_count(), 1);
        locks.release_all();
        assert_eq!(locks.held_count(), 0);
        assert_eq!(manager.locked_resources(), 0);
        Ok(())
    }

    #[test]
    fn schema_readers_share() -> Result<(), LockError> {
        let manager = LockManager::new(Some(Duration::from_millis(100)));
        let a = manager.client(TxId(1));
        let b = manager.client(TxId(2));
        a.acquire_schema_read_lock()?;
        b.acquire_schema_read_lock()?;
        assert!(manager.is_held(TxId(1), &LockResource::Schema, LockMode::Shared));
        assert!(manager.is_held(TxId(2), &LockResource::Schema, LockMode::Shared));
        Ok(())
    }

    #[test]
    fn schema_writer_excludes_readers() {
        let manager = LockManager::new(Some(Duration::from_millis(50)));
        let writer = manager.client(TxId(1));
        let reader = manager.client(TxId(2));
        writer.acquire_schema_write_lock().unwrap();
        let err = reader.acquire_schema_read_lock().unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
        writer.release_all();
        reader.acquire_schema_read_lock().unwrap();
    }

    #[test]
    fn shared_holder_may_upgrade_when_alone() -> Result<(), LockError> {
        let manager = LockManager::new(Some(Duration::from_millis(50)));
        let locks = manager.client(TxId(1));
        locks.acquire_schema_read_lock()?;
        locks.acquire_schema_write_lock()?;
        assert!(manager.is_held(TxId(1), &LockResource::Schema, LockMode::Exclusive));
        assert_eq!(locks.held_count(), 1);
        Ok(())
    }

    #[test]
    fn waiter_proceeds_after_release() {
        let manager = LockManager::new(None);
        let first = manager.client(TxId(1));
        first.acquire_node_write_lock(NodeId(1)).unwrap();
        let acquired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&acquired);
        let manager_clone = manager.clone();
        let handle = thread::spawn(move || {
            let second = manager_clone.client(TxId(2));
            second.acquire_node_write_lock(NodeId(1)).unwrap();
            flag.store(true, Ordering::SeqCst);
            second.release_all();
        });
        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst), "second writer must wait");
        first.release_all();
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn terminated_client_fails_fast() {
        let manager = LockManager::new(None);
        let locks = manager.client(TxId(3));
        locks.terminate();
        assert_eq!(
            locks.acquire_graph_write_lock(),
            Err(LockError::Terminated { tx: TxId(3) })
        );
        assert_eq!(locks.held_count(), 0);
    }

    #[test]
    fn terminate_aborts_a_pending_wait() {
        let manager = LockManager::new(None);
        let holder = manager.client(TxId(1));
        holder.acquire_node_write_lock(NodeId(1)).unwrap();
        let waiter = Arc::new(manager.client(TxId(2)));
        let handle = {
            let waiter = Arc::clone(&waiter);
            thread::spawn(move || waiter.acquire_node_write_lock(NodeId(1)))
        };
        thread::sleep(Duration::from_millis(50));
        waiter.terminate();
        assert_eq!(
            handle.join().unwrap(),
            Err(LockError::Terminated { tx: TxId(2) })
        );
        let node = LockResource::Node(NodeId(1));
        assert!(manager.is_held(TxId(1), &node, LockMode::Exclusive));
        assert!(!manager.is_held(TxId(2), &node, LockMode::Exclusive));
        assert_eq!(waiter.held_count(), 0);
    }

    #[test]
    fn dropping_client_releases_locks() {
        let manager = LockManager::new(Some(Duration::from_millis(50)));
        {
            let locks = manager.client(TxId(1));
            locks.acquire_graph_write_lock().unwrap();
        }
        let other = manager.client(TxId(2));
        other.acquire_graph_write_lock().unwrap();
    }
}
