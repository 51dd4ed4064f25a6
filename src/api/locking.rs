use std::hash::Hash;
use std::sync::Arc;

use crate::error::Result;
use crate::schema::{IndexDescriptor, InternalIndexState, UniquenessConstraint};
use crate::storage::props::{DefinedProperty, Property};
use crate::types::{LabelId, NodeId, PropId, RelationshipId};

use super::operations::{
    EntityWriteOperations, SchemaReadOperations, SchemaStateOperations, SchemaWriteOperations,
};
use super::statement::StatementState;

/// Acquires the lock an operation needs, then forwards to the wrapped implementation.
///
/// Every method takes exactly one lock from the statement's lock client before
/// delegating, so a failed acquisition leaves all state untouched. Delegate
/// results and errors are returned unchanged.
///
/// | operations | lock |
/// |---|---|
/// | node labels, properties, delete | node write lock |
/// | relationship properties, delete | relationship write lock |
/// | graph properties | graph write lock |
/// | index/constraint create and drop | schema write lock |
/// | schema reads, schema state | schema read lock |
/// | `index_get_failure` | none |
pub struct LockingStatementOperations<E, R, W, S> {
    entity_write: Arc<E>,
    schema_read: Arc<R>,
    schema_write: Arc<W>,
    schema_state: Arc<S>,
}

impl<E, R, W, S> LockingStatementOperations<E, R, W, S> {
    pub fn new(
        entity_write: Arc<E>,
        schema_read: Arc<R>,
        schema_write: Arc<W>,
        schema_state: Arc<S>,
    ) -> Self {
        Self {
            entity_write,
            schema_read,
            schema_write,
            schema_state,
        }
    }
}

impl<E, R, W, S> EntityWriteOperations for LockingStatementOperations<E, R, W, S>
where
    E: EntityWriteOperations,
{
    fn node_add_label(
        &self,
        state: &StatementState,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        state.locks().acquire_node_write_lock(node)?;
        self.entity_write.node_add_label(state, node, label)
    }

    fn node_remove_label(
        &self,
        state: &StatementState,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        state.locks().acquire_node_write_lock(node)?;
        self.entity_write.node_remove_label(state, node, label)
    }

    fn node_set_property(
        &self,
        state: &StatementState,
        node: NodeId,
        property: DefinedProperty,
    ) -> Result<Property> {
        state.locks().acquire_node_write_lock(node)?;
        self.entity_write.node_set_property(state, node, property)
    }

    fn node_remove_property(
        &self,
        state: &StatementState,
        node: NodeId,
        prop: PropId,
    ) -> Result<Property> {
        state.locks().acquire_node_write_lock(node)?;
        self.entity_write.node_remove_property(state, node, prop)
    }

    fn relationship_set_property(
        &self,
        state: &StatementState,
        rel: RelationshipId,
        property: DefinedProperty,
    ) -> Result<Property> {
        state.locks().acquire_relationship_write_lock(rel)?;
        self.entity_write.relationship_set_property(state, rel, property)
    }

    fn relationship_remove_property(
        &self,
        state: &StatementState,
        rel: RelationshipId,
        prop: PropId,
    ) -> Result<Property> {
        state.locks().acquire_relationship_write_lock(rel)?;
        self.entity_write.relationship_remove_property(state, rel, prop)
    }

    fn graph_set_property(
        &self,
        state: &StatementState,
        property: DefinedProperty,
    ) -> Result<Property> {
        state.locks().acquire_graph_write_lock()?;
        self.entity_write.graph_set_property(state, property)
    }

    fn graph_remove_property(&self, state: &StatementState, prop: PropId) -> Result<Property> {
        state.locks().acquire_graph_write_lock()?;
        self.entity_write.graph_remove_property(state, prop)
    }

    fn node_delete(&self, state: &StatementState, node: NodeId) -> Result<()> {
        state.locks().acquire_node_write_lock(node)?;
        self.entity_write.node_delete(state, node)
    }

    fn relationship_delete(&self, state: &StatementState, rel: RelationshipId) -> Result<()> {
        state.locks().acquire_relationship_write_lock(rel)?;
        self.entity_write.relationship_delete(state, rel)
    }
}

impl<E, R, W, S> SchemaWriteOperations for LockingStatementOperations<E, R, W, S>
where
    W: SchemaWriteOperations,
{
    fn index_create(
        &self,
        state: &StatementState,
        label: LabelId,
        prop: PropId,
    ) -> Result<IndexDescriptor> {
        state.locks().acquire_schema_write_lock()?;
        self.schema_write.index_create(state, label, prop)
    }

    fn index_drop(&self, state: &StatementState, descriptor: &IndexDescriptor) -> Result<()> {
        state.locks().acquire_schema_write_lock()?;
        self.schema_write.index_drop(state, descriptor)
    }

    fn unique_index_drop(
        &self,
        state: &StatementState,
        descriptor: &IndexDescriptor,
    ) -> Result<()> {
        state.locks().acquire_schema_write_lock()?;
        self.schema_write.unique_index_drop(state, descriptor)
    }

    fn uniqueness_constraint_create(
        &self,
        state: &StatementState,
        label: LabelId,
        prop: PropId,
    ) -> Result<UniquenessConstraint> {
        state.locks().acquire_schema_write_lock()?;
        self.schema_write
            .uniqueness_constraint_create(state, label, prop)
    }

    fn constraint_drop(
        &self,
        state: &StatementState,
        constraint: &UniquenessConstraint,
    ) -> Result<()> {
        state.locks().acquire_schema_write_lock()?;
        self.schema_write.constraint_drop(state, constraint)
    }
}

impl<E, R, W, S> SchemaReadOperations for LockingStatementOperations<E, R, W, S>
where
    R: SchemaReadOperations,
{
    fn indexes_get_for_label(
        &self,
        state: &StatementState,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        state.locks().acquire_schema_read_lock()?;
        self.schema_read.indexes_get_for_label(state, label)
    }

    fn index_get_for_label_and_property_key(
        &self,
        state: &StatementState,
        label: LabelId,
        prop: PropId,
    ) -> Result<IndexDescriptor> {
        state.locks().acquire_schema_read_lock()?;
        self.schema_read
            .index_get_for_label_and_property_key(state, label, prop)
    }

    fn indexes_get_all(&self, state: &StatementState) -> Result<Vec<IndexDescriptor>> {
        state.locks().acquire_schema_read_lock()?;
        self.schema_read.indexes_get_all(state)
    }

    fn unique_indexes_get_for_label(
        &self,
        state: &StatementState,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        state.locks().acquire_schema_read_lock()?;
        self.schema_read.unique_indexes_get_for_label(state, label)
    }

    fn unique_indexes_get_all(&self, state: &StatementState) -> Result<Vec<IndexDescriptor>> {
        state.locks().acquire_schema_read_lock()?;
        self.schema_read.unique_indexes_get_all(state)
    }

    fn index_get_state(
        &self,
        state: &StatementState,
        descriptor: &IndexDescriptor,
    ) -> Result<InternalIndexState> {
        state.locks().acquire_schema_read_lock()?;
        self.schema_read.index_get_state(state, descriptor)
    }

    fn index_get_owning_uniqueness_constraint_id(
        &self,
        state: &StatementState,
        descriptor: &IndexDescriptor,
    ) -> Result<Option<u64>> {
        state.locks().acquire_schema_read_lock()?;
        self.schema_read
            .index_get_owning_uniqueness_constraint_id(state, descriptor)
    }

    fn index_get_committed_id(
        &self,
        state: &StatementState,
        descriptor: &IndexDescriptor,
    ) -> Result<u64> {
        state.locks().acquire_schema_read_lock()?;
        self.schema_read.index_get_committed_id(state, descriptor)
    }

    fn index_get_failure(
        &self,
        state: &StatementState,
        descriptor: &IndexDescriptor,
    ) -> Result<Option<String>> {
        // no lock
        self.schema_read.index_get_failure(state, descriptor)
    }

    fn constraints_get_for_label_and_property_key(
        &self,
        state: &StatementState,
        label: LabelId,
        prop: PropId,
    ) -> Result<Vec<UniquenessConstraint>> {
        state.locks().acquire_schema_read_lock()?;
        self.schema_read
            .constraints_get_for_label_and_property_key(state, label, prop)
    }

    fn constraints_get_for_label(
        &self,
        state: &StatementState,
        label: LabelId,
    ) -> Result<Vec<UniquenessConstraint>> {
        state.locks().acquire_schema_read_lock()?;
        self.schema_read.constraints_get_for_label(state, label)
    }

    fn constraints_get_all(&self, state: &StatementState) -> Result<Vec<UniquenessConstraint>> {
        state.locks().acquire_schema_read_lock()?;
        self.schema_read.constraints_get_all(state)
    }
}

impl<E, R, W, S> SchemaStateOperations for LockingStatementOperations<E, R, W, S>
where
    S: SchemaStateOperations,
{
    fn schema_state_get_or_create<K, V, F>(
        &self,
        state: &StatementState,
        key: K,
        creator: F,
    ) -> Result<V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: FnOnce(&K) -> V,
    {
        state.locks().acquire_schema_read_lock()?;
        self.schema_state
            .schema_state_get_or_create(state, key, creator)
    }

    fn schema_state_contains<K>(&self, state: &StatementState, key: &K) -> Result<bool>
    where
        K: Hash + Eq + Send + Sync + 'static,
    {
        state.locks().acquire_schema_read_lock()?;
        self.schema_state.schema_state_contains(state, key)
    }
}
