use std::fmt;

use thiserror::Error;

use crate::schema::{IndexDescriptor, UniquenessConstraint};
use crate::types::{LabelId, NodeId, PropId, TxId};

/// Result alias used throughout the kernel.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Kind of entity referenced by a not-found error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityKind {
    /// A node.
    Node,
    /// A relationship.
    Relationship,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Node => f.write_str("node"),
            EntityKind::Relationship => f.write_str("relationship"),
        }
    }
}

/// Coarse failure class callers can branch on without matching every variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorCategory {
    /// The statement or transaction was already closed.
    Lifecycle,
    /// A referenced entity or schema rule does not exist.
    NotFound,
    /// The requested schema object already exists in an equivalent or conflicting form.
    Conflict,
    /// A write (or constraint creation) would break a uniqueness constraint.
    Validation,
    /// A drop targeted a schema object that cannot be dropped.
    MalformedDrop,
    /// The lock manager refused or aborted a lock acquisition.
    Lock,
    /// Invalid configuration or logging setup.
    Config,
}

/// Failure reported by a lock client while acquiring a lock.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The wait for `resource` exceeded the configured bound.
    #[error("timed out after {waited_ms}ms waiting for {resource}")]
    Timeout {
        /// Diagnostic rendering of the contended resource.
        resource: String,
        /// Milliseconds spent waiting before giving up.
        waited_ms: u64,
    },
    /// The owning transaction was terminated while (or before) waiting.
    #[error("transaction {tx} was terminated")]
    Terminated {
        /// Terminated transaction.
        tx: TxId,
    },
}

/// Every failure the statement layer can surface.
///
/// The locking layer never produces these itself apart from [`KernelError::Lock`];
/// everything else comes unchanged from the backing operations or the statement
/// facades.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Operation attempted through a transaction that is no longer open.
    #[error("transaction {tx} is closed")]
    TransactionClosed {
        /// The closed transaction.
        tx: TxId,
    },
    /// Referenced node or relationship does not exist.
    #[error("{kind} {id} not found")]
    EntityNotFound {
        /// Entity kind.
        kind: EntityKind,
        /// Raw entity id.
        id: u64,
    },
    /// Referenced index does not exist.
    #[error("{0} not found")]
    IndexNotFound(IndexDescriptor),
    /// No schema rule exists for the label/property pair.
    #[error("no schema rule for label {label} and property key {prop}")]
    SchemaRuleNotFound {
        /// Label id of the lookup.
        label: LabelId,
        /// Property key id of the lookup.
        prop: PropId,
    },
    /// An index already exists for the label/property pair.
    #[error("{0} already exists")]
    AlreadyIndexed(IndexDescriptor),
    /// A uniqueness constraint already covers the label/property pair.
    #[error("{0} already exists")]
    AlreadyConstrained(UniquenessConstraint),
    /// Index creation failed for a reason other than a conflict.
    #[error("unable to add {descriptor}: {reason}")]
    AddIndexFailure {
        /// Index that could not be created.
        descriptor: IndexDescriptor,
        /// Human readable cause.
        reason: String,
    },
    /// Constraint creation failed, typically because existing data violates it.
    #[error("unable to create {constraint}: {reason}")]
    CreateConstraintFailure {
        /// Constraint that could not be created.
        constraint: UniquenessConstraint,
        /// Human readable cause.
        reason: String,
    },
    /// A write would introduce a duplicate under a uniqueness constraint.
    #[error("node {node} violates {constraint}: value {value} already held by node {existing}")]
    ConstraintValidation {
        /// The violated constraint.
        constraint: UniquenessConstraint,
        /// Node whose write was rejected.
        node: NodeId,
        /// Node already holding the value.
        existing: NodeId,
        /// Rendered property value.
        value: String,
    },
    /// A node cannot be deleted while relationships still reference it.
    #[error("node {node} still has {relationships} relationship(s)")]
    NodeHasRelationships {
        /// Node whose deletion was refused.
        node: NodeId,
        /// Number of attached relationships.
        relationships: usize,
    },
    /// Index drop failed.
    #[error("unable to drop {descriptor}: {reason}")]
    DropIndexFailure {
        /// Index that could not be dropped.
        descriptor: IndexDescriptor,
        /// Human readable cause.
        reason: String,
    },
    /// Constraint drop failed.
    #[error("unable to drop {constraint}: {reason}")]
    DropConstraintFailure {
        /// Constraint that could not be dropped.
        constraint: UniquenessConstraint,
        /// Human readable cause.
        reason: String,
    },
    /// Lock acquisition failed; no mutation was applied.
    #[error("lock acquisition failed: {0}")]
    Lock(#[from] LockError),
    /// Configuration or logging setup error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl KernelError {
    /// Returns the failure class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            KernelError::TransactionClosed { .. } => ErrorCategory::Lifecycle,
            KernelError::EntityNotFound { .. }
            | KernelError::IndexNotFound(_)
            | KernelError::SchemaRuleNotFound { .. } => ErrorCategory::NotFound,
            KernelError::AlreadyIndexed(_)
            | KernelError::AlreadyConstrained(_)
            | KernelError::AddIndexFailure { .. } => ErrorCategory::Conflict,
            KernelError::CreateConstraintFailure { .. }
            | KernelError::ConstraintValidation { .. }
            | KernelError::NodeHasRelationships { .. } => ErrorCategory::Validation,
            KernelError::DropIndexFailure { .. } | KernelError::DropConstraintFailure { .. } => {
                ErrorCategory::MalformedDrop
            }
            KernelError::Lock(_) => ErrorCategory::Lock,
            KernelError::Config(_) => ErrorCategory::Config,
        }
    }

    pub(crate) fn node_not_found(node: NodeId) -> Self {
        KernelError::EntityNotFound {
            kind: EntityKind::Node,
            id: node.0,
        }
    }

    pub(crate) fn relationship_not_found(rel: crate::types::RelationshipId) -> Self {
        KernelError::EntityNotFound {
            kind: EntityKind::Relationship,
            id: rel.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_taxonomy() {
        let index = IndexDescriptor::new(LabelId(3), PropId(5));
        let constraint = UniquenessConstraint::new(LabelId(3), PropId(5));
        assert_eq!(
            KernelError::TransactionClosed { tx: TxId(1) }.category(),
            ErrorCategory::Lifecycle
        );
        assert_eq!(
            KernelError::node_not_found(NodeId(4)).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            KernelError::AlreadyIndexed(index).category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            KernelError::AlreadyConstrained(constraint).category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            KernelError::DropIndexFailure {
                descriptor: index,
                reason: "missing".into()
            }
            .category(),
            ErrorCategory::MalformedDrop
        );
        assert_eq!(
            KernelError::NodeHasRelationships {
                node: NodeId(2),
                relationships: 1
            }
            .category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            KernelError::from(LockError::Terminated { tx: TxId(9) }).category(),
            ErrorCategory::Lock
        );
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = KernelError::node_not_found(NodeId(17));
        assert_eq!(err.to_string(), "node 17 not found");
    }
}
