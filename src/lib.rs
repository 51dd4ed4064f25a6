//! Transactional statement layer of the Sombra graph kernel.
//!
//! Every access to nodes, relationships, properties and schema rules goes
//! through a statement obtained from an open [`KernelTransaction`]. Statements
//! forward to [`LockingStatementOperations`], which takes the lock an operation
//! needs from the transaction's [`LockClient`] before handing the call to the
//! backing store.

pub mod api;
pub mod config;
pub mod error;
mod kernel;
pub mod locking;
pub mod logging;
pub mod schema;
pub mod storage;
pub mod types;

pub use api::{
    DataStatement, EntityReadOperations, EntityWriteOperations, KernelTransaction,
    LockingStatementOperations, ReadStatement, SchemaReadOperations, SchemaStateOperations,
    SchemaStatement, SchemaWriteOperations, StatementState, TxState,
};
pub use config::KernelOptions;
pub use error::{EntityKind, ErrorCategory, KernelError, LockError, Result};
pub use kernel::{Kernel, KernelOperations, Transaction};
pub use locking::{IndexEntryLock, LockClient, LockManager, LockMode, LockResource, TxLocks};
pub use schema::{IndexDescriptor, InternalIndexState, SchemaStateCache, UniquenessConstraint};
pub use storage::{DefinedProperty, MemoryStore, Property, Value};
pub use types::{
    LabelId, NodeId, PropId, RelTypeId, RelationshipId, TxId, NO_SUCH_LABEL, NO_SUCH_PROPERTY_KEY,
};
