//! Capability contracts implemented by the backing store and by the locking layer.
//!
//! Every operation receives the [`StatementState`] of the calling transaction so
//! implementations can reach its lock client.

use std::hash::Hash;

use crate::error::Result;
use crate::schema::{IndexDescriptor, InternalIndexState, UniquenessConstraint};
use crate::storage::props::{DefinedProperty, Property};
use crate::types::{LabelId, NodeId, PropId, RelationshipId};

use super::statement::StatementState;

/// Reads of node, relationship and graph data.
pub trait EntityReadOperations {
    fn node_get_property(&self, state: &StatementState, node: NodeId, prop: PropId)
        -> Result<Property>;

    fn relationship_get_property(
        &self,
        state: &StatementState,
        rel: RelationshipId,
        prop: PropId,
    ) -> Result<Property>;

    fn graph_get_property(&self, state: &StatementState, prop: PropId) -> Result<Property>;

    fn node_has_label(&self, state: &StatementState, node: NodeId, label: LabelId)
        -> Result<bool>;

    /// Ids of every node carrying `label`, in ascending order.
    fn nodes_get_for_label(&self, state: &StatementState, label: LabelId) -> Result<Vec<NodeId>>;
}

/// Mutations of node, relationship and graph data.
///
/// Property writes return the previous value, or [`Property::NoProperty`] when
/// there was none.
pub trait EntityWriteOperations {
    /// Returns `true` when the label was newly added.
    fn node_add_label(&self, state: &StatementState, node: NodeId, label: LabelId)
        -> Result<bool>;

    /// Returns `true` when the label was present and got removed.
    fn node_remove_label(
        &self,
        state: &StatementState,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool>;

    fn node_set_property(
        &self,
        state: &StatementState,
        node: NodeId,
        property: DefinedProperty,
    ) -> Result<Property>;

    fn node_remove_property(
        &self,
        state: &StatementState,
        node: NodeId,
        prop: PropId,
    ) -> Result<Property>;

    fn relationship_set_property(
        &self,
        state: &StatementState,
        rel: RelationshipId,
        property: DefinedProperty,
    ) -> Result<Property>;

    fn relationship_remove_property(
        &self,
        state: &StatementState,
        rel: RelationshipId,
        prop: PropId,
    ) -> Result<Property>;

    fn graph_set_property(&self, state: &StatementState, property: DefinedProperty)
        -> Result<Property>;

    fn graph_remove_property(&self, state: &StatementState, prop: PropId) -> Result<Property>;

    fn node_delete(&self, state: &StatementState, node: NodeId) -> Result<()>;

    fn relationship_delete(&self, state: &StatementState, rel: RelationshipId) -> Result<()>;
}

/// Enumeration and inspection of indexes and constraints.
pub trait SchemaReadOperations {
    /// Regular (non-constraint) indexes on `label`.
    fn indexes_get_for_label(
        &self,
        state: &StatementState,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>>;

    /// Regular index on `(label, prop)`; fails with `SchemaRuleNotFound` when absent.
    fn index_get_for_label_and_property_key(
        &self,
        state: &StatementState,
        label: LabelId,
        prop: PropId,
    ) -> Result<IndexDescriptor>;

    fn indexes_get_all(&self, state: &StatementState) -> Result<Vec<IndexDescriptor>>;

    /// Constraint-backing indexes on `label`.
    fn unique_indexes_get_for_label(
        &self,
        state: &StatementState,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>>;

    fn unique_indexes_get_all(&self, state: &StatementState) -> Result<Vec<IndexDescriptor>>;

    fn index_get_state(
        &self,
        state: &StatementState,
        descriptor: &IndexDescriptor,
    ) -> Result<InternalIndexState>;

    /// Id of the constraint owning `descriptor`, `None` for regular indexes.
    fn index_get_owning_uniqueness_constraint_id(
        &self,
        state: &StatementState,
        descriptor: &IndexDescriptor,
    ) -> Result<Option<u64>>;

    /// Schema rule id under which `descriptor` was committed.
    fn index_get_committed_id(
        &self,
        state: &StatementState,
        descriptor: &IndexDescriptor,
    ) -> Result<u64>;

    /// Population failure message, `None` unless the index is `Failed`.
    fn index_get_failure(
        &self,
        state: &StatementState,
        descriptor: &IndexDescriptor,
    ) -> Result<Option<String>>;

    fn constraints_get_for_label_and_property_key(
        &self,
        state: &StatementState,
        label: LabelId,
        prop: PropId,
    ) -> Result<Vec<UniquenessConstraint>>;

    fn constraints_get_for_label(
        &self,
        state: &StatementState,
        label: LabelId,
    ) -> Result<Vec<UniquenessConstraint>>;

    fn constraints_get_all(&self, state: &StatementState) -> Result<Vec<UniquenessConstraint>>;
}

/// Creation and removal of indexes and constraints.
pub trait SchemaWriteOperations {
    fn index_create(
        &self,
        state: &StatementState,
        label: LabelId,
        prop: PropId,
    ) -> Result<IndexDescriptor>;

    /// Drops a regular index.
    fn index_drop(&self, state: &StatementState, descriptor: &IndexDescriptor) -> Result<()>;

    /// Drops a constraint-backing index.
    fn unique_index_drop(&self, state: &StatementState, descriptor: &IndexDescriptor)
        -> Result<()>;

    /// Creates the constraint together with its backing unique index.
    fn uniqueness_constraint_create(
        &self,
        state: &StatementState,
        label: LabelId,
        prop: PropId,
    ) -> Result<UniquenessConstraint>;

    /// Drops the constraint and releases its backing index.
    fn constraint_drop(&self, state: &StatementState, constraint: &UniquenessConstraint)
        -> Result<()>;
}

/// Memoised state derived from the current schema.
pub trait SchemaStateOperations {
    fn schema_state_get_or_create<K, V, F>(
        &self,
        state: &StatementState,
        key: K,
        creator: F,
    ) -> Result<V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: FnOnce(&K) -> V;

    fn schema_state_contains<K>(&self, state: &StatementState, key: &K) -> Result<bool>
    where
        K: Hash + Eq + Send + Sync + 'static;
}
