use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{KernelError, Result};
use crate::locking::LockClient;
use crate::types::TxId;

use super::statement::{DataStatement, ReadStatement, SchemaStatement, StatementState};

/// The state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Transaction is open and accepts statements.
    Active,
    /// Transaction committed; its locks are released.
    Committed,
    /// Transaction rolled back; its locks are released.
    RolledBack,
}

/// A kernel transaction handing out statement facades.
///
/// `R` serves entity reads and `O` every locked operation, usually a
/// [`LockingStatementOperations`](super::LockingStatementOperations) over the
/// backing store. Statements borrow the transaction; once it is committed or
/// rolled back every statement call fails with
/// [`KernelError::TransactionClosed`]. Locks are held until the transaction
/// ends and are released together.
///
/// Writes are applied by the backing operations as they happen; buffering
/// until commit belongs to the transaction manager.
///
/// Dropping an active transaction rolls it back.
pub struct KernelTransaction<R, O> {
    id: TxId,
    state: Mutex<TxState>,
    statement: StatementState,
    reads: Arc<R>,
    ops: Arc<O>,
    started: Instant,
}

impl<R, O> KernelTransaction<R, O> {
    pub fn new(id: TxId, locks: Arc<dyn LockClient>, reads: Arc<R>, ops: Arc<O>) -> Self {
        debug!(tx_id = id.0, "transaction started");
        Self {
            id,
            state: Mutex::new(TxState::Active),
            statement: StatementState::new(id, locks),
            reads,
            ops,
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> TxId {
        self.id
    }

    pub fn state(&self) -> TxState {
        *self.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == TxState::Active
    }

    /// Facade for schema reads and the schema-state cache.
    pub fn read_statement(&self) -> ReadStatement<'_, R, O> {
        ReadStatement::new(self)
    }

    /// Facade for entity reads and writes.
    pub fn data_statement(&self) -> DataStatement<'_, R, O> {
        DataStatement::new(self)
    }

    /// Facade for index and constraint management.
    pub fn schema_statement(&self) -> SchemaStatement<'_, R, O> {
        SchemaStatement::new(self)
    }

    /// Commits the transaction and releases its locks.
    pub fn commit(&self) -> Result<()> {
        self.finish(TxState::Committed)?;
        debug!(
            tx_id = self.id.0,
            duration_ms = self.started.elapsed().as_millis() as u64,
            "transaction committed"
        );
        Ok(())
    }

    /// Rolls the transaction back and releases its locks.
    pub fn rollback(&self) -> Result<()> {
        self.finish(TxState::RolledBack)?;
        debug!(tx_id = self.id.0, "transaction rolled back");
        Ok(())
    }

    /// Interrupts the transaction's lock waits.
    ///
    /// Pending and future lock acquisitions fail with
    /// [`LockError::Terminated`](crate::LockError::Terminated) and the statement
    /// that requested them applies nothing. The transaction stays open until it
    /// is rolled back.
    pub fn terminate(&self) {
        if self.is_open() {
            warn!(tx_id = self.id.0, "transaction terminated");
            self.statement.locks().terminate();
        }
    }

    pub(crate) fn assert_open(&self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }
        warn!(tx_id = self.id.0, state = ?self.state(), "statement used after transaction end");
        Err(KernelError::TransactionClosed { tx: self.id })
    }

    pub(crate) fn statement(&self) -> &StatementState {
        &self.statement
    }

    pub(crate) fn reads(&self) -> &R {
        &self.reads
    }

    pub(crate) fn ops(&self) -> &O {
        &self.ops
    }

    fn finish(&self, next: TxState) -> Result<()> {
        let mut state = self.state.lock();
        if *state != TxState::Active {
            return Err(KernelError::TransactionClosed { tx: self.id });
        }
        *state = next;
        drop(state);
        self.statement.locks().release_all();
        Ok(())
    }
}

impl<R, O> Drop for KernelTransaction<R, O> {
    fn drop(&mut self) {
        if self.is_open() {
            warn!(tx_id = self.id.0, "transaction dropped while open; rolling back");
            let _ = self.finish(TxState::RolledBack);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locking::LockManager;
    use std::time::Duration;

    fn transaction(manager: &LockManager, id: u64) -> KernelTransaction<(), ()> {
        let locks: Arc<dyn LockClient> = Arc::new(manager.client(TxId(id)));
        KernelTransaction::new(TxId(id), locks, Arc::new(()), Arc::new(()))
    }

    #[test]
    fn commit_closes_and_releases() {
        let manager = LockManager::new(Some(Duration::from_millis(50)));
        let tx = transaction(&manager, 1);
        tx.statement().locks().acquire_graph_write_lock().unwrap();
        assert_eq!(manager.locked_resources(), 1);
        tx.commit().unwrap();
        assert_eq!(tx.state(), TxState::Committed);
        assert_eq!(manager.locked_resources(), 0);
        assert!(matches!(
            tx.assert_open(),
            Err(KernelError::TransactionClosed { tx: TxId(1) })
        ));
    }

    #[test]
    fn second_end_is_rejected() {
        let manager = LockManager::new(None);
        let tx = transaction(&manager, 2);
        tx.rollback().unwrap();
        assert!(matches!(
            tx.commit(),
            Err(KernelError::TransactionClosed { .. })
        ));
        assert_eq!(tx.state(), TxState::RolledBack);
    }

    #[test]
    fn terminated_transaction_cannot_lock() {
        let manager = LockManager::new(Some(Duration::from_millis(50)));
        let tx = transaction(&manager, 4);
        tx.terminate();
        assert!(tx.is_open());
        assert_eq!(
            tx.statement().locks().acquire_graph_write_lock(),
            Err(crate::error::LockError::Terminated { tx: TxId(4) })
        );
        tx.rollback().unwrap();
        assert_eq!(manager.locked_resources(), 0);
    }

    #[test]
    fn drop_rolls_back_open_transaction() {
        let manager = LockManager::new(Some(Duration::from_millis(50)));
        {
            let tx = transaction(&manager, 3);
            tx.statement().locks().acquire_schema_write_lock().unwrap();
        }
        assert_eq!(manager.locked_resources(), 0);
    }
}
