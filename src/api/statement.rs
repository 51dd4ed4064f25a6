//! Per-transaction statement handles.
//!
//! A facade borrows its [`KernelTransaction`], checks that the transaction is
//! still open before every call, and forwards to the transaction's operations
//! (normally the locking layer over a backing store).

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::error::Result;
use crate::locking::LockClient;
use crate::schema::{IndexDescriptor, InternalIndexState, UniquenessConstraint};
use crate::storage::props::{DefinedProperty, Property};
use crate::types::{LabelId, NodeId, PropId, RelationshipId, TxId};

use super::operations::{
    EntityReadOperations, EntityWriteOperations, SchemaReadOperations, SchemaStateOperations,
    SchemaWriteOperations,
};
use super::transaction::KernelTransaction;

/// State handed to every operation: the calling transaction and its lock client.
#[derive(Clone)]
pub struct StatementState {
    tx: TxId,
    locks: Arc<dyn LockClient>,
}

impl StatementState {
    pub fn new(tx: TxId, locks: Arc<dyn LockClient>) -> Self {
        Self { tx, locks }
    }

    /// Transaction the statement belongs to.
    pub fn tx(&self) -> TxId {
        self.tx
    }

    /// Lock client of the owning transaction.
    pub fn locks(&self) -> &dyn LockClient {
        self.locks.as_ref()
    }
}

impl fmt::Debug for StatementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementState").field("tx", &self.tx).finish()
    }
}

/// Schema reads and the schema-state cache.
pub struct ReadStatement<'t, R, O> {
    tx: &'t KernelTransaction<R, O>,
}

impl<'t, R, O> ReadStatement<'t, R, O> {
    pub(crate) fn new(tx: &'t KernelTransaction<R, O>) -> Self {
        Self { tx }
    }
}

impl<R, O: SchemaReadOperations> ReadStatement<'_, R, O> {
    pub fn indexes_get_for_label(&self, label: LabelId) -> Result<Vec<IndexDescriptor>> {
        self.tx.assert_open()?;
        self.tx.ops().indexes_get_for_label(self.tx.statement(), label)
    }

    pub fn index_get_for_label_and_property_key(
        &self,
        label: LabelId,
        prop: PropId,
    ) -> Result<IndexDescriptor> {
        self.tx.assert_open()?;
        self.tx
            .ops()
            .index_get_for_label_and_property_key(self.tx.statement(), label, prop)
    }

    pub fn indexes_get_all(&self) -> Result<Vec<IndexDescriptor>> {
        self.tx.assert_open()?;
        self.tx.ops().indexes_get_all(self.tx.statement())
    }

    pub fn unique_indexes_get_for_label(&self, label: LabelId) -> Result<Vec<IndexDescriptor>> {
        self.tx.assert_open()?;
        self.tx
            .ops()
            .unique_indexes_get_for_label(self.tx.statement(), label)
    }

    pub fn unique_indexes_get_all(&self) -> Result<Vec<IndexDescriptor>> {
        self.tx.assert_open()?;
        self.tx.ops().unique_indexes_get_all(self.tx.statement())
    }

    pub fn index_get_state(&self, descriptor: &IndexDescriptor) -> Result<InternalIndexState> {
        self.tx.assert_open()?;
        self.tx.ops().index_get_state(self.tx.statement(), descriptor)
    }

    pub fn index_get_owning_uniqueness_constraint_id(
        &self,
        descriptor: &IndexDescriptor,
    ) -> Result<Option<u64>> {
        self.tx.assert_open()?;
        self.tx
            .ops()
            .index_get_owning_uniqueness_constraint_id(self.tx.statement(), descriptor)
    }

    pub fn index_get_committed_id(&self, descriptor: &IndexDescriptor) -> Result<u64> {
        self.tx.assert_open()?;
        self.tx
            .ops()
            .index_get_committed_id(self.tx.statement(), descriptor)
    }

    pub fn index_get_failure(&self, descriptor: &IndexDescriptor) -> Result<Option<String>> {
        self.tx.assert_open()?;
        self.tx.ops().index_get_failure(self.tx.statement(), descriptor)
    }

    pub fn constraints_get_for_label_and_property_key(
        &self,
        label: LabelId,
        prop: PropId,
    ) -> Result<Vec<UniquenessConstraint>> {
        self.tx.assert_open()?;
        self.tx
            .ops()
            .constraints_get_for_label_and_property_key(self.tx.statement(), label, prop)
    }

    pub fn constraints_get_for_label(&self, label: LabelId) -> Result<Vec<UniquenessConstraint>> {
        self.tx.assert_open()?;
        self.tx
            .ops()
            .constraints_get_for_label(self.tx.statement(), label)
    }

    pub fn constraints_get_all(&self) -> Result<Vec<UniquenessConstraint>> {
        self.tx.assert_open()?;
        self.tx.ops().constraints_get_all(self.tx.statement())
    }
}

impl<R, O: SchemaStateOperations> ReadStatement<'_, R, O> {
    /// Returns the value cached for `key`, computing it with `creator` on a miss.
    pub fn schema_state_get_or_create<K, V, F>(&self, key: K, creator: F) -> Result<V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: FnOnce(&K) -> V,
    {
        self.tx.assert_open()?;
        self.tx
            .ops()
            .schema_state_get_or_create(self.tx.statement(), key, creator)
    }

    pub fn schema_state_contains<K>(&self, key: &K) -> Result<bool>
    where
        K: Hash + Eq + Send + Sync + 'static,
    {
        self.tx.assert_open()?;
        self.tx.ops().schema_state_contains(self.tx.statement(), key)
    }
}

/// Node, relationship and graph reads and writes.
///
/// Reads naming [`NO_SUCH_PROPERTY_KEY`](crate::types::NO_SUCH_PROPERTY_KEY) or
/// [`NO_SUCH_LABEL`](crate::types::NO_SUCH_LABEL) answer "absent" without
/// reaching the store.
pub struct DataStatement<'t, R, O> {
    tx: &'t KernelTransaction<R, O>,
}

impl<'t, R, O> DataStatement<'t, R, O> {
    pub(crate) fn new(tx: &'t KernelTransaction<R, O>) -> Self {
        Self { tx }
    }
}

impl<R: EntityReadOperations, O> DataStatement<'_, R, O> {
    pub fn node_get_property(&self, node: NodeId, prop: PropId) -> Result<Property> {
        self.tx.assert_open()?;
        if prop.is_sentinel() {
            return Ok(Property::none(prop));
        }
        self.tx.reads().node_get_property(self.tx.statement(), node, prop)
    }

    pub fn relationship_get_property(&self, rel: RelationshipId, prop: PropId) -> Result<Property> {
        self.tx.assert_open()?;
        if prop.is_sentinel() {
            return Ok(Property::none(prop));
        }
        self.tx
            .reads()
            .relationship_get_property(self.tx.statement(), rel, prop)
    }

    pub fn graph_get_property(&self, prop: PropId) -> Result<Property> {
        self.tx.assert_open()?;
        if prop.is_sentinel() {
            return Ok(Property::none(prop));
        }
        self.tx.reads().graph_get_property(self.tx.statement(), prop)
    }

    pub fn node_has_label(&self, node: NodeId, label: LabelId) -> Result<bool> {
        self.tx.assert_open()?;
        if label.is_sentinel() {
            return Ok(false);
        }
        self.tx.reads().node_has_label(self.tx.statement(), node, label)
    }

    pub fn nodes_get_for_label(&self, label: LabelId) -> Result<Vec<NodeId>> {
        self.tx.assert_open()?;
        if label.is_sentinel() {
            return Ok(Vec::new());
        }
        self.tx.reads().nodes_get_for_label(self.tx.statement(), label)
    }
}

impl<R, O: EntityWriteOperations> DataStatement<'_, R, O> {
    pub fn node_add_label(&self, node: NodeId, label: LabelId) -> Result<bool> {
        self.tx.assert_open()?;
        self.tx.ops().node_add_label(self.tx.statement(), node, label)
    }

    pub fn node_remove_label(&self, node: NodeId, label: LabelId) -> Result<bool> {
        self.tx.assert_open()?;
        self.tx.ops().node_remove_label(self.tx.statement(), node, label)
    }

    pub fn node_set_property(&self, node: NodeId, property: DefinedProperty) -> Result<Property> {
        self.tx.assert_open()?;
        self.tx
            .ops()
            .node_set_property(self.tx.statement(), node, property)
    }

    pub fn node_remove_property(&self, node: NodeId, prop: PropId) -> Result<Property> {
        self.tx.assert_open()?;
        self.tx
            .ops()
            .node_remove_property(self.tx.statement(), node, prop)
    }

    pub fn relationship_set_property(
        &self,
        rel: RelationshipId,
        property: DefinedProperty,
    ) -> Result<Property> {
        self.tx.assert_open()?;
        self.tx
            .ops()
            .relationship_set_property(self.tx.statement(), rel, property)
    }

    pub fn relationship_remove_property(
        &self,
        rel: RelationshipId,
        prop: PropId,
    ) -> Result<Property> {
        self.tx.assert_open()?;
        self.tx
            .ops()
            .relationship_remove_property(self.tx.statement(), rel, prop)
    }

    pub fn graph_set_property(&self, property: DefinedProperty) -> Result<Property> {
        self.tx.assert_open()?;
        self.tx.ops().graph_set_property(self.tx.statement(), property)
    }

    pub fn graph_remove_property(&self, prop: PropId) -> Result<Property> {
        self.tx.assert_open()?;
        self.tx.ops().graph_remove_property(self.tx.statement(), prop)
    }

    pub fn node_delete(&self, node: NodeId) -> Result<()> {
        self.tx.assert_open()?;
        self.tx.ops().node_delete(self.tx.statement(), node)
    }

    pub fn relationship_delete(&self, rel: RelationshipId) -> Result<()> {
        self.tx.assert_open()?;
        self.tx.ops().relationship_delete(self.tx.statement(), rel)
    }
}

/// Index and constraint creation and removal.
///
/// Schema reads are available through [`SchemaStatement::read`].
pub struct SchemaStatement<'t, R, O> {
    read: ReadStatement<'t, R, O>,
}

impl<'t, R, O> SchemaStatement<'t, R, O> {
    pub(crate) fn new(tx: &'t KernelTransaction<R, O>) -> Self {
        Self {
            read: ReadStatement::new(tx),
        }
    }

    /// Read facade over the same transaction.
    pub fn read(&self) -> &ReadStatement<'t, R, O> {
        &self.read
    }

    fn tx(&self) -> &'t KernelTransaction<R, O> {
        self.read.tx
    }
}

impl<R, O: SchemaWriteOperations> SchemaStatement<'_, R, O> {
    pub fn index_create(&self, label: LabelId, prop: PropId) -> Result<IndexDescriptor> {
        let tx = self.tx();
        tx.assert_open()?;
        tx.ops().index_create(tx.statement(), label, prop)
    }

    pub fn index_drop(&self, descriptor: &IndexDescriptor) -> Result<()> {
        let tx = self.tx();
        tx.assert_open()?;
        tx.ops().index_drop(tx.statement(), descriptor)
    }

    pub fn unique_index_drop(&self, descriptor: &IndexDescriptor) -> Result<()> {
        let tx = self.tx();
        tx.assert_open()?;
        tx.ops().unique_index_drop(tx.statement(), descriptor)
    }

    pub fn uniqueness_constraint_create(
        &self,
        label: LabelId,
        prop: PropId,
    ) -> Result<UniquenessConstraint> {
        let tx = self.tx();
        tx.assert_open()?;
        tx.ops().uniqueness_constraint_create(tx.statement(), label, prop)
    }

    pub fn constraint_drop(&self, constraint: &UniquenessConstraint) -> Result<()> {
        let tx = self.tx();
        tx.assert_open()?;
        tx.ops().constraint_drop(tx.statement(), constraint)
    }
}
