//! Statement layer: operation contracts, the locking decorator, statement
//! facades and the transaction that hands them out.

mod locking;
pub mod operations;
pub mod statement;
mod transaction;

pub use locking::LockingStatementOperations;
pub use operations::{
    EntityReadOperations, EntityWriteOperations, SchemaReadOperations, SchemaStateOperations,
    SchemaWriteOperations,
};
pub use statement::{DataStatement, ReadStatement, SchemaStatement, StatementState};
pub use transaction::{KernelTransaction, TxState};
