use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::api::operations::{
    EntityReadOperations, EntityWriteOperations, SchemaReadOperations, SchemaWriteOperations,
};
use crate::api::statement::StatementState;
use crate::error::{KernelError, Result};
use crate::locking::IndexEntryLock;
use crate::schema::{IndexDescriptor, InternalIndexState, SchemaStateCache, UniquenessConstraint};
use crate::types::{LabelId, NodeId, PropId, RelTypeId, RelationshipId};

use super::props::{DefinedProperty, Property, Value};

type PropertyMap = FxHashMap<PropId, DefinedProperty>;

#[derive(Default)]
struct NodeRecord {
    labels: BTreeSet<LabelId>,
    props: PropertyMap,
}

struct RelRecord {
    rel_type: RelTypeId,
    start: NodeId,
    end: NodeId,
    props: PropertyMap,
}

struct IndexRule {
    id: u64,
    owner: Option<u64>,
    unique: bool,
    state: InternalIndexState,
    failure: Option<String>,
    entries: FxHashMap<Value, BTreeSet<NodeId>>,
}

impl IndexRule {
    fn insert(&mut self, value: &Value, node: NodeId) {
        self.entries.entry(value.clone()).or_default().insert(node);
    }

    fn remove(&mut self, value: &Value, node: NodeId) {
        if let Some(nodes) = self.entries.get_mut(value) {
            nodes.remove(&node);
            if nodes.is_empty() {
                self.entries.remove(value);
            }
        }
    }

    /// First node other than `node` indexed under `value`.
    fn holder(&self, value: &Value, node: NodeId) -> Option<NodeId> {
        self.entries
            .get(value)?
            .iter()
            .copied()
            .find(|&holder| holder != node)
    }
}

#[derive(Default)]
struct GraphState {
    next_node: u64,
    next_rel: u64,
    next_rule: u64,
    nodes: FxHashMap<NodeId, NodeRecord>,
    rels: FxHashMap<RelationshipId, RelRecord>,
    graph_props: PropertyMap,
    indexes: BTreeMap<IndexDescriptor, IndexRule>,
    constraints: BTreeMap<UniquenessConstraint, u64>,
}

impl GraphState {
    fn node(&self, node: NodeId) -> Result<&NodeRecord> {
        self.nodes
            .get(&node)
            .ok_or_else(|| KernelError::node_not_found(node))
    }

    fn node_mut(&mut self, node: NodeId) -> Result<&mut NodeRecord> {
        self.nodes
            .get_mut(&node)
            .ok_or_else(|| KernelError::node_not_found(node))
    }

    fn rel_mut(&mut self, rel: RelationshipId) -> Result<&mut RelRecord> {
        self.rels
            .get_mut(&rel)
            .ok_or_else(|| KernelError::relationship_not_found(rel))
    }

    fn next_rule_id(&mut self) -> u64 {
        self.next_rule += 1;
        self.next_rule
    }

    fn index(&self, descriptor: &IndexDescriptor) -> Result<&IndexRule> {
        self.indexes
            .get(descriptor)
            .ok_or(KernelError::IndexNotFound(*descriptor))
    }

    /// Labels among `labels` whose `prop` is under a uniqueness constraint.
    fn constrained_labels<'a>(
        &'a self,
        labels: impl IntoIterator<Item = &'a LabelId> + 'a,
        prop: PropId,
    ) -> impl Iterator<Item = LabelId> + 'a {
        labels.into_iter().copied().filter(move |&label| {
            self.constraints
                .contains_key(&UniquenessConstraint::new(label, prop))
        })
    }

    /// Fails when another node already holds `value` under a constraint on `(label, prop)`.
    fn check_unique(&self, node: NodeId, label: LabelId, prop: PropId, value: &Value) -> Result<()> {
        let constraint = UniquenessConstraint::new(label, prop);
        if !self.constraints.contains_key(&constraint) {
            return Ok(());
        }
        let holder = self
            .indexes
            .get(&constraint.index())
            .and_then(|rule| rule.holder(value, node));
        match holder {
            Some(existing) => Err(KernelError::ConstraintValidation {
                constraint,
                node,
                existing,
                value: value.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Moves `node` from `old` to `new` in every index on `prop` for `labels`.
    fn reindex(
        &mut self,
        node: NodeId,
        labels: &BTreeSet<LabelId>,
        prop: PropId,
        old: Option<&Value>,
        new: Option<&Value>,
    ) {
        for (descriptor, rule) in self.indexes.iter_mut() {
            if descriptor.prop() != prop || !labels.contains(&descriptor.label()) {
                continue;
            }
            if let Some(old) = old {
                rule.remove(old, node);
            }
            if let Some(new) = new {
                rule.insert(new, node);
            }
        }
    }

    /// Adds or removes every property of `node` in the indexes on `label`.
    fn reindex_label(&mut self, node: NodeId, label: LabelId, props: &PropertyMap, insert: bool) {
        for (descriptor, rule) in self.indexes.iter_mut() {
            if descriptor.label() != label {
                continue;
            }
            if let Some(property) = props.get(&descriptor.prop()) {
                if insert {
                    rule.insert(property.value_ref(), node);
                } else {
                    rule.remove(property.value_ref(), node);
                }
            }
        }
    }

    /// Builds the entries of an index on `descriptor` from existing nodes.
    fn populate(&self, descriptor: &IndexDescriptor) -> FxHashMap<Value, BTreeSet<NodeId>> {
        let mut entries: FxHashMap<Value, BTreeSet<NodeId>> = FxHashMap::default();
        for (&id, record) in &self.nodes {
            if !record.labels.contains(&descriptor.label()) {
                continue;
            }
            if let Some(property) = record.props.get(&descriptor.prop()) {
                entries.entry(property.value()).or_default().insert(id);
            }
        }
        entries
    }

    fn descriptors(&self, unique: bool, label: Option<LabelId>) -> Vec<IndexDescriptor> {
        self.indexes
            .iter()
            .filter(|(descriptor, rule)| {
                rule.unique == unique && label.map_or(true, |label| descriptor.label() == label)
            })
            .map(|(descriptor, _)| *descriptor)
            .collect()
    }
}

fn previous(key: PropId, old: Option<DefinedProperty>) -> Property {
    old.map_or_else(|| Property::none(key), Property::Defined)
}

/// In-memory graph and schema store implementing the entity and schema contracts.
///
/// Writes apply immediately. Writes touching a `(label, property)` pair under a
/// uniqueness constraint first take the matching [`IndexEntryLock`] through the
/// statement's lock client, then re-check for duplicates under the store lock;
/// a violating write changes nothing. Every schema change flushes the shared
/// schema-state cache.
pub struct MemoryStore {
    state: RwLock<GraphState>,
    schema_state: Arc<SchemaStateCache>,
}

impl MemoryStore {
    pub fn new(schema_state: Arc<SchemaStateCache>) -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            schema_state,
        }
    }

    /// Allocates a node with no labels or properties.
    pub fn node_create(&self) -> NodeId {
        let mut graph = self.state.write();
        graph.next_node += 1;
        let id = NodeId(graph.next_node);
        graph.nodes.insert(id, NodeRecord::default());
        trace!(node = id.0, "node created");
        id
    }

    /// Allocates a relationship between two existing nodes.
    pub fn relationship_create(
        &self,
        rel_type: RelTypeId,
        start: NodeId,
        end: NodeId,
    ) -> Result<RelationshipId> {
        let mut graph = self.state.write();
        graph.node(start)?;
        graph.node(end)?;
        graph.next_rel += 1;
        let id = RelationshipId(graph.next_rel);
        graph.rels.insert(
            id,
            RelRecord {
                rel_type,
                start,
                end,
                props: PropertyMap::default(),
            },
        );
        trace!(rel = id.0, rel_type = rel_type.0, "relationship created");
        Ok(id)
    }

    /// Type and `(start, end)` endpoints of `rel`.
    pub fn relationship_endpoints(
        &self,
        rel: RelationshipId,
    ) -> Result<(RelTypeId, NodeId, NodeId)> {
        let graph = self.state.read();
        let record = graph
            .rels
            .get(&rel)
            .ok_or_else(|| KernelError::relationship_not_found(rel))?;
        Ok((record.rel_type, record.start, record.end))
    }

    /// Records a population failure for `descriptor`.
    pub fn mark_index_failed(
        &self,
        descriptor: &IndexDescriptor,
        reason: impl Into<String>,
    ) -> Result<()> {
        let mut graph = self.state.write();
        let rule = graph
            .indexes
            .get_mut(descriptor)
            .ok_or(KernelError::IndexNotFound(*descriptor))?;
        rule.state = InternalIndexState::Failed;
        rule.failure = Some(reason.into());
        drop(graph);
        debug!(label = descriptor.label().0, prop = descriptor.prop().0, "index marked failed");
        self.schema_state.flush();
        Ok(())
    }

    /// Nodes indexed under `value` in the index on `descriptor`, ascending.
    pub fn index_lookup(&self, descriptor: &IndexDescriptor, value: &Value) -> Result<Vec<NodeId>> {
        let graph = self.state.read();
        let rule = graph.index(descriptor)?;
        Ok(rule
            .entries
            .get(value)
            .map(|nodes| nodes.iter().copied().collect())
            .unwrap_or_default())
    }

    fn lock_index_entries(
        &self,
        state: &StatementState,
        labels: Vec<LabelId>,
        prop: PropId,
        value: &Value,
    ) -> Result<()> {
        for label in labels {
            let entry = IndexEntryLock::for_value(label, prop, value);
            state.locks().acquire_index_entry_write_lock(&entry)?;
        }
        Ok(())
    }
}

impl EntityReadOperations for MemoryStore {
    fn node_get_property(&self, _state: &StatementState, node: NodeId, prop: PropId) -> Result<Property> {
        let graph = self.state.read();
        let record = graph.node(node)?;
        Ok(previous(prop, record.props.get(&prop).cloned()))
    }

    fn relationship_get_property(
        &self,
        _state: &StatementState,
        rel: RelationshipId,
        prop: PropId,
    ) -> Result<Property> {
        let graph = self.state.read();
        let record = graph
            .rels
            .get(&rel)
            .ok_or_else(|| KernelError::relationship_not_found(rel))?;
        Ok(previous(prop, record.props.get(&prop).cloned()))
    }

    fn graph_get_property(&self, _state: &StatementState, prop: PropId) -> Result<Property> {
        let graph = self.state.read();
        Ok(previous(prop, graph.graph_props.get(&prop).cloned()))
    }

    fn node_has_label(&self, _state: &StatementState, node: NodeId, label: LabelId) -> Result<bool> {
        let graph = self.state.read();
        Ok(graph.node(node)?.labels.contains(&label))
    }

    fn nodes_get_for_label(&self, _state: &StatementState, label: LabelId) -> Result<Vec<NodeId>> {
        let graph = self.state.read();
        let mut nodes: Vec<NodeId> = graph
            .nodes
            .iter()
            .filter(|(_, record)| record.labels.contains(&label))
            .map(|(&id, _)| id)
            .collect();
        nodes.sort_unstable();
        Ok(nodes)
    }
}

impl EntityWriteOperations for MemoryStore {
    fn node_add_label(&self, state: &StatementState, node: NodeId, label: LabelId) -> Result<bool> {
        let guarded: Vec<(PropId, Value)> = {
            let graph = self.state.read();
            let record = graph.node(node)?;
            if record.labels.contains(&label) {
                return Ok(false);
            }
            record
                .props
                .values()
                .filter(|property| {
                    graph
                        .constraints
                        .contains_key(&UniquenessConstraint::new(label, property.key()))
                })
                .map(|property| (property.key(), property.value()))
                .collect()
        };
        for (prop, value) in &guarded {
            self.lock_index_entries(state, vec![label], *prop, value)?;
        }

        let mut graph = self.state.write();
        let record = graph.node(node)?;
        if record.labels.contains(&label) {
            return Ok(false);
        }
        for property in record.props.values() {
            graph.check_unique(node, label, property.key(), property.value_ref())?;
        }
        let record = graph.node_mut(node)?;
        record.labels.insert(label);
        let props = record.props.clone();
        graph.reindex_label(node, label, &props, true);
        trace!(node = node.0, label = label.0, "label added");
        Ok(true)
    }

    fn node_remove_label(
        &self,
        _state: &StatementState,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        let mut graph = self.state.write();
        let record = graph.node_mut(node)?;
        if !record.labels.remove(&label) {
            return Ok(false);
        }
        let props = record.props.clone();
        graph.reindex_label(node, label, &props, false);
        trace!(node = node.0, label = label.0, "label removed");
        Ok(true)
    }

    fn node_set_property(
        &self,
        state: &StatementState,
        node: NodeId,
        property: DefinedProperty,
    ) -> Result<Property> {
        let key = property.key();
        let guarded: Vec<LabelId> = {
            let graph = self.state.read();
            let record = graph.node(node)?;
            if let Some(old) = record.props.get(&key) {
                if old.value_ref().same_variant(property.value_ref()) && old.has_equal_value(&property) {
                    return Ok(Property::Defined(old.clone()));
                }
            }
            graph.constrained_labels(&record.labels, key).collect()
        };
        self.lock_index_entries(state, guarded, key, property.value_ref())?;

        let mut graph = self.state.write();
        let labels = graph.node(node)?.labels.clone();
        for &label in &labels {
            graph.check_unique(node, label, key, property.value_ref())?;
        }
        let new_value = property.value();
        let old = graph.node_mut(node)?.props.insert(key, property);
        graph.reindex(
            node,
            &labels,
            key,
            old.as_ref().map(DefinedProperty::value_ref),
            Some(&new_value),
        );
        trace!(node = node.0, prop = key.0, "node property set");
        Ok(previous(key, old))
    }

    fn node_remove_property(
        &self,
        _state: &StatementState,
        node: NodeId,
        prop: PropId,
    ) -> Result<Property> {
        let mut graph = self.state.write();
        let record = graph.node_mut(node)?;
        let Some(old) = record.props.remove(&prop) else {
            return Ok(Property::none(prop));
        };
        let labels = record.labels.clone();
        graph.reindex(node, &labels, prop, Some(old.value_ref()), None);
        trace!(node = node.0, prop = prop.0, "node property removed");
        Ok(Property::Defined(old))
    }

    fn relationship_set_property(
        &self,
        _state: &StatementState,
        rel: RelationshipId,
        property: DefinedProperty,
    ) -> Result<Property> {
        let mut graph = self.state.write();
        let key = property.key();
        let old = graph.rel_mut(rel)?.props.insert(key, property);
        Ok(previous(key, old))
    }

    fn relationship_remove_property(
        &self,
        _state: &StatementState,
        rel: RelationshipId,
        prop: PropId,
    ) -> Result<Property> {
        let mut graph = self.state.write();
        let old = graph.rel_mut(rel)?.props.remove(&prop);
        Ok(previous(prop, old))
    }

    fn graph_set_property(&self, _state: &StatementState, property: DefinedProperty) -> Result<Property> {
        let mut graph = self.state.write();
        let key = property.key();
        let old = graph.graph_props.insert(key, property);
        Ok(previous(key, old))
    }

    fn graph_remove_property(&self, _state: &StatementState, prop: PropId) -> Result<Property> {
        let mut graph = self.state.write();
        let old = graph.graph_props.remove(&prop);
        Ok(previous(prop, old))
    }

    fn node_delete(&self, _state: &StatementState, node: NodeId) -> Result<()> {
        let mut graph = self.state.write();
        graph.node(node)?;
        let relationships = graph
            .rels
            .values()
            .filter(|rel| rel.start == node || rel.end == node)
            .count();
        if relationships > 0 {
            return Err(KernelError::NodeHasRelationships { node, relationships });
        }
        let record = graph
            .nodes
            .remove(&node)
            .ok_or_else(|| KernelError::node_not_found(node))?;
        for &label in &record.labels {
            graph.reindex_label(node, label, &record.props, false);
        }
        trace!(node = node.0, "node deleted");
        Ok(())
    }

    fn relationship_delete(&self, _state: &StatementState, rel: RelationshipId) -> Result<()> {
        let mut graph = self.state.write();
        graph
            .rels
            .remove(&rel)
            .ok_or_else(|| KernelError::relationship_not_found(rel))?;
        trace!(rel = rel.0, "relationship deleted");
        Ok(())
    }
}

impl SchemaReadOperations for MemoryStore {
    fn indexes_get_for_label(
        &self,
        _state: &StatementState,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        Ok(self.state.read().descriptors(false, Some(label)))
    }

    fn index_get_for_label_and_property_key(
        &self,
        _state: &StatementState,
        label: LabelId,
        prop: PropId,
    ) -> Result<IndexDescriptor> {
        let descriptor = IndexDescriptor::new(label, prop);
        match self.state.read().indexes.get(&descriptor) {
            Some(rule) if !rule.unique => Ok(descriptor),
            _ => Err(KernelError::SchemaRuleNotFound { label, prop }),
        }
    }

    fn indexes_get_all(&self, _state: &StatementState) -> Result<Vec<IndexDescriptor>> {
        Ok(self.state.read().descriptors(false, None))
    }

    fn unique_indexes_get_for_label(
        &self,
        _state: &StatementState,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        Ok(self.state.read().descriptors(true, Some(label)))
    }

    fn unique_indexes_get_all(&self, _state: &StatementState) -> Result<Vec<IndexDescriptor>> {
        Ok(self.state.read().descriptors(true, None))
    }

    fn index_get_state(
        &self,
        _state: &StatementState,
        descriptor: &IndexDescriptor,
    ) -> Result<InternalIndexState> {
        Ok(self.state.read().index(descriptor)?.state)
    }

    fn index_get_owning_uniqueness_constraint_id(
        &self,
        _state: &StatementState,
        descriptor: &IndexDescriptor,
    ) -> Result<Option<u64>> {
        Ok(self.state.read().index(descriptor)?.owner)
    }

    fn index_get_committed_id(
        &self,
        _state: &StatementState,
        descriptor: &IndexDescriptor,
    ) -> Result<u64> {
        Ok(self.state.read().index(descriptor)?.id)
    }

    fn index_get_failure(
        &self,
        _state: &StatementState,
        descriptor: &IndexDescriptor,
    ) -> Result<Option<String>> {
        Ok(self.state.read().index(descriptor)?.failure.clone())
    }

    fn constraints_get_for_label_and_property_key(
        &self,
        _state: &StatementState,
        label: LabelId,
        prop: PropId,
    ) -> Result<Vec<UniquenessConstraint>> {
        let constraint = UniquenessConstraint::new(label, prop);
        let graph = self.state.read();
        Ok(graph
            .constraints
            .contains_key(&constraint)
            .then_some(constraint)
            .into_iter()
            .collect())
    }

    fn constraints_get_for_label(
        &self,
        _state: &StatementState,
        label: LabelId,
    ) -> Result<Vec<UniquenessConstraint>> {
        let graph = self.state.read();
        Ok(graph
            .constraints
            .keys()
            .filter(|constraint| constraint.label() == label)
            .copied()
            .collect())
    }

    fn constraints_get_all(&self, _state: &StatementState) -> Result<Vec<UniquenessConstraint>> {
        Ok(self.state.read().constraints.keys().copied().collect())
    }
}

impl SchemaWriteOperations for MemoryStore {
    fn index_create(
        &self,
        _state: &StatementState,
        label: LabelId,
        prop: PropId,
    ) -> Result<IndexDescriptor> {
        let descriptor = IndexDescriptor::new(label, prop);
        let mut graph = self.state.write();
        let constraint = UniquenessConstraint::new(label, prop);
        if graph.constraints.contains_key(&constraint) {
            return Err(KernelError::AlreadyConstrained(constraint));
        }
        if graph.indexes.contains_key(&descriptor) {
            return Err(KernelError::AlreadyIndexed(descriptor));
        }
        let entries = graph.populate(&descriptor);
        let id = graph.next_rule_id();
        graph.indexes.insert(
            descriptor,
            IndexRule {
                id,
                owner: None,
                unique: false,
                state: InternalIndexState::Online,
                failure: None,
                entries,
            },
        );
        drop(graph);
        debug!(label = label.0, prop = prop.0, rule_id = id, "index created");
        self.schema_state.flush();
        Ok(descriptor)
    }

    fn index_drop(&self, _state: &StatementState, descriptor: &IndexDescriptor) -> Result<()> {
        let mut graph = self.state.write();
        match graph.indexes.get(descriptor) {
            None => {
                return Err(KernelError::DropIndexFailure {
                    descriptor: *descriptor,
                    reason: "no such index".to_owned(),
                })
            }
            Some(rule) if rule.unique => {
                return Err(KernelError::DropIndexFailure {
                    descriptor: *descriptor,
                    reason: "index belongs to a uniqueness constraint".to_owned(),
                })
            }
            Some(_) => {}
        }
        graph.indexes.remove(descriptor);
        drop(graph);
        debug!(
            label = descriptor.label().0,
            prop = descriptor.prop().0,
            "index dropped"
        );
        self.schema_state.flush();
        Ok(())
    }

    fn unique_index_drop(&self, _state: &StatementState, descriptor: &IndexDescriptor) -> Result<()> {
        let mut graph = self.state.write();
        match graph.indexes.get(descriptor) {
            Some(rule) if rule.unique => {}
            Some(_) => {
                return Err(KernelError::DropIndexFailure {
                    descriptor: *descriptor,
                    reason: "index is not a uniqueness index".to_owned(),
                })
            }
            None => {
                return Err(KernelError::DropIndexFailure {
                    descriptor: *descriptor,
                    reason: "no such index".to_owned(),
                })
            }
        }
        graph.indexes.remove(descriptor);
        // a constraint cannot outlive the index enforcing it
        graph
            .constraints
            .remove(&UniquenessConstraint::new(descriptor.label(), descriptor.prop()));
        drop(graph);
        debug!(
            label = descriptor.label().0,
            prop = descriptor.prop().0,
            "unique index dropped"
        );
        self.schema_state.flush();
        Ok(())
    }

    fn uniqueness_constraint_create(
        &self,
        _state: &StatementState,
        label: LabelId,
        prop: PropId,
    ) -> Result<UniquenessConstraint> {
        let constraint = UniquenessConstraint::new(label, prop);
        let descriptor = constraint.index();
        let mut graph = self.state.write();
        if graph.constraints.contains_key(&constraint) {
            return Err(KernelError::AlreadyConstrained(constraint));
        }
        if graph.indexes.contains_key(&descriptor) {
            return Err(KernelError::AlreadyIndexed(descriptor));
        }
        let entries = graph.populate(&descriptor);
        if let Some((value, nodes)) = entries.iter().find(|(_, nodes)| nodes.len() > 1) {
            let ids: Vec<String> = nodes.iter().map(|node| node.to_string()).collect();
            return Err(KernelError::CreateConstraintFailure {
                constraint,
                reason: format!("nodes {} share the value {value}", ids.join(", ")),
            });
        }
        let index_id = graph.next_rule_id();
        let constraint_id = graph.next_rule_id();
        graph.indexes.insert(
            descriptor,
            IndexRule {
                id: index_id,
                owner: Some(constraint_id),
                unique: true,
                state: InternalIndexState::Online,
                failure: None,
                entries,
            },
        );
        graph.constraints.insert(constraint, constraint_id);
        drop(graph);
        debug!(
            label = label.0,
            prop = prop.0,
            rule_id = constraint_id,
            "uniqueness constraint created"
        );
        self.schema_state.flush();
        Ok(constraint)
    }

    fn constraint_drop(&self, _state: &StatementState, constraint: &UniquenessConstraint) -> Result<()> {
        let mut graph = self.state.write();
        if graph.constraints.remove(constraint).is_none() {
            return Err(KernelError::DropConstraintFailure {
                constraint: *constraint,
                reason: "no such constraint".to_owned(),
            });
        }
        graph.indexes.remove(&constraint.index());
        drop(graph);
        debug!(
            label = constraint.label().0,
            prop = constraint.prop().0,
            "uniqueness constraint dropped"
        );
        self.schema_state.flush();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LockError;
    use crate::locking::{LockClient, LockManager, LockMode, LockResource};
    use crate::types::TxId;
    use std::time::Duration;

    fn setup() -> (MemoryStore, Arc<SchemaStateCache>, LockManager, StatementState) {
        let cache = Arc::new(SchemaStateCache::default());
        let store = MemoryStore::new(Arc::clone(&cache));
        let manager = LockManager::new(Some(Duration::from_millis(50)));
        let locks: Arc<dyn LockClient> = Arc::new(manager.client(TxId(1)));
        (store, cache, manager, StatementState::new(TxId(1), locks))
    }

    #[test]
    fn set_property_returns_previous_value() {
        let (store, _, _, state) = setup();
        let node = store.node_create();
        let first = store
            .node_set_property(&state, node, DefinedProperty::new(PropId(1), 10))
            .unwrap();
        assert!(!first.is_defined());
        let second = store
            .node_set_property(&state, node, DefinedProperty::new(PropId(1), 11))
            .unwrap();
        assert_eq!(second.value(), Some(Value::Int(10)));
        let removed = store.node_remove_property(&state, node, PropId(1)).unwrap();
        assert_eq!(removed.value(), Some(Value::Int(11)));
        let missing = store.node_get_property(&state, node, PropId(1)).unwrap();
        assert_eq!(missing, Property::none(PropId(1)));
    }

    #[test]
    fn missing_entities_are_reported() {
        let (store, _, _, state) = setup();
        let err = store
            .node_add_label(&state, NodeId(99), LabelId(1))
            .unwrap_err();
        assert!(matches!(err, KernelError::EntityNotFound { id: 99, .. }));
        let err = store
            .relationship_remove_property(&state, RelationshipId(4), PropId(1))
            .unwrap_err();
        assert!(matches!(err, KernelError::EntityNotFound { id: 4, .. }));
    }

    #[test]
    fn index_tracks_label_and_property_changes() {
        let (store, _, _, state) = setup();
        let node = store.node_create();
        store
            .node_set_property(&state, node, DefinedProperty::new(PropId(2), "a"))
            .unwrap();
        let descriptor = store.index_create(&state, LabelId(1), PropId(2)).unwrap();
        assert!(store.index_lookup(&descriptor, &Value::from("a")).unwrap().is_empty());

        store.node_add_label(&state, node, LabelId(1)).unwrap();
        assert_eq!(store.index_lookup(&descriptor, &Value::from("a")).unwrap(), vec![node]);

        store
            .node_set_property(&state, node, DefinedProperty::new(PropId(2), "b"))
            .unwrap();
        assert!(store.index_lookup(&descriptor, &Value::from("a")).unwrap().is_empty());
        assert_eq!(store.index_lookup(&descriptor, &Value::from("b")).unwrap(), vec![node]);

        store.node_delete(&state, node).unwrap();
        assert!(store.index_lookup(&descriptor, &Value::from("b")).unwrap().is_empty());
    }

    #[test]
    fn duplicate_value_is_rejected_without_side_effects() {
        let (store, _, manager, state) = setup();
        store
            .uniqueness_constraint_create(&state, LabelId(1), PropId(2))
            .unwrap();
        let a = store.node_create();
        let b = store.node_create();
        for node in [a, b] {
            store.node_add_label(&state, node, LabelId(1)).unwrap();
        }
        store
            .node_set_property(&state, a, DefinedProperty::new(PropId(2), 5))
            .unwrap();
        let err = store
            .node_set_property(&state, b, DefinedProperty::new(PropId(2), 5i64))
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::ConstraintValidation { node, existing, .. } if node == b && existing == a
        ));
        assert!(!store.node_get_property(&state, b, PropId(2)).unwrap().is_defined());
        let entry = IndexEntryLock::for_value(LabelId(1), PropId(2), &Value::Int(5));
        assert!(manager.is_held(TxId(1), &LockResource::IndexEntry(entry), LockMode::Exclusive));
    }

    #[test]
    fn label_add_checks_constraints() {
        let (store, _, _, state) = setup();
        store
            .uniqueness_constraint_create(&state, LabelId(1), PropId(2))
            .unwrap();
        let a = store.node_create();
        let b = store.node_create();
        store.node_add_label(&state, a, LabelId(1)).unwrap();
        for node in [a, b] {
            store
                .node_set_property(&state, node, DefinedProperty::new(PropId(2), "x"))
                .unwrap();
        }
        let err = store.node_add_label(&state, b, LabelId(1)).unwrap_err();
        assert!(matches!(err, KernelError::ConstraintValidation { .. }));
        assert!(!store.node_has_label(&state, b, LabelId(1)).unwrap());
    }

    #[test]
    fn constraint_over_duplicates_fails() {
        let (store, _, _, state) = setup();
        for _ in 0..2 {
            let node = store.node_create();
            store.node_add_label(&state, node, LabelId(4)).unwrap();
            store
                .node_set_property(&state, node, DefinedProperty::new(PropId(4), true))
                .unwrap();
        }
        let err = store
            .uniqueness_constraint_create(&state, LabelId(4), PropId(4))
            .unwrap_err();
        assert!(matches!(err, KernelError::CreateConstraintFailure { .. }));
        assert!(store.unique_indexes_get_all(&state).unwrap().is_empty());
        assert!(store.constraints_get_all(&state).unwrap().is_empty());
    }

    #[test]
    fn schema_rules_get_increasing_ids() {
        let (store, _, _, state) = setup();
        let index = store.index_create(&state, LabelId(1), PropId(1)).unwrap();
        let constraint = store
            .uniqueness_constraint_create(&state, LabelId(2), PropId(1))
            .unwrap();
        let index_id = store.index_get_committed_id(&state, &index).unwrap();
        let unique_id = store
            .index_get_committed_id(&state, &constraint.index())
            .unwrap();
        assert!(unique_id > index_id);
        let owner = store
            .index_get_owning_uniqueness_constraint_id(&state, &constraint.index())
            .unwrap();
        assert!(owner.is_some_and(|owner| owner > unique_id));
        assert_eq!(
            store
                .index_get_owning_uniqueness_constraint_id(&state, &index)
                .unwrap(),
            None
        );
    }

    #[test]
    fn failed_index_reports_reason() {
        let (store, _, _, state) = setup();
        let index = store.index_create(&state, LabelId(1), PropId(1)).unwrap();
        assert_eq!(store.index_get_failure(&state, &index).unwrap(), None);
        store.mark_index_failed(&index, "disk full").unwrap();
        assert_eq!(
            store.index_get_state(&state, &index).unwrap(),
            InternalIndexState::Failed
        );
        assert_eq!(
            store.index_get_failure(&state, &index).unwrap().as_deref(),
            Some("disk full")
        );
    }

    #[test]
    fn drop_rules_are_checked() {
        let (store, _, _, state) = setup();
        let constraint = store
            .uniqueness_constraint_create(&state, LabelId(1), PropId(1))
            .unwrap();
        let err = store.index_drop(&state, &constraint.index()).unwrap_err();
        assert!(matches!(err, KernelError::DropIndexFailure { .. }));
        let regular = store.index_create(&state, LabelId(2), PropId(1)).unwrap();
        let err = store.unique_index_drop(&state, &regular).unwrap_err();
        assert!(matches!(err, KernelError::DropIndexFailure { .. }));

        store.unique_index_drop(&state, &constraint.index()).unwrap();
        assert!(store.constraints_get_all(&state).unwrap().is_empty());
        let err = store.constraint_drop(&state, &constraint).unwrap_err();
        assert!(matches!(err, KernelError::DropConstraintFailure { .. }));
    }

    #[test]
    fn relationship_properties_round_trip() {
        let (store, _, _, state) = setup();
        let a = store.node_create();
        let b = store.node_create();
        let rel = store.relationship_create(RelTypeId(7), a, b).unwrap();
        assert_eq!(store.relationship_endpoints(rel).unwrap(), (RelTypeId(7), a, b));
        store
            .relationship_set_property(&state, rel, DefinedProperty::new(PropId(1), vec![1i16, 2]))
            .unwrap();
        let value = store.relationship_get_property(&state, rel, PropId(1)).unwrap();
        assert!(value.value_equals(&Value::from(vec![1i64, 2])));
        store.relationship_delete(&state, rel).unwrap();
        assert!(store.relationship_endpoints(rel).is_err());
        assert!(store.relationship_create(RelTypeId(7), a, NodeId(42)).is_err());
    }

    #[test]
    fn node_with_relationships_cannot_be_deleted() {
        let (store, _, _, state) = setup();
        let a = store.node_create();
        let b = store.node_create();
        let rel = store.relationship_create(RelTypeId(1), a, b).unwrap();

        let err = store.node_delete(&state, b).unwrap_err();
        assert!(matches!(
            err,
            KernelError::NodeHasRelationships { node, relationships: 1 } if node == b
        ));
        assert_eq!(store.relationship_endpoints(rel).unwrap(), (RelTypeId(1), a, b));

        store.relationship_delete(&state, rel).unwrap();
        store.node_delete(&state, b).unwrap();
        assert!(store.node_get_property(&state, b, PropId(1)).is_err());
    }

    #[derive(Default)]
    struct EntryLocks {
        taken: parking_lot::Mutex<Vec<IndexEntryLock>>,
    }

    impl LockClient for EntryLocks {
        fn acquire_node_write_lock(&self, _node: NodeId) -> std::result::Result<(), LockError> {
            Ok(())
        }

        fn acquire_relationship_write_lock(
            &self,
            _rel: RelationshipId,
        ) -> std::result::Result<(), LockError> {
            Ok(())
        }

        fn acquire_graph_write_lock(&self) -> std::result::Result<(), LockError> {
            Ok(())
        }

        fn acquire_schema_write_lock(&self) -> std::result::Result<(), LockError> {
            Ok(())
        }

        fn acquire_schema_read_lock(&self) -> std::result::Result<(), LockError> {
            Ok(())
        }

        fn acquire_index_entry_write_lock(
            &self,
            entry: &IndexEntryLock,
        ) -> std::result::Result<(), LockError> {
            self.taken.lock().push(entry.clone());
            Ok(())
        }

        fn release_all(&self) {}

        fn terminate(&self) {}
    }

    #[test]
    fn rewriting_an_identical_value_skips_index_maintenance() {
        let store = MemoryStore::new(Arc::new(SchemaStateCache::default()));
        let locks = Arc::new(EntryLocks::default());
        let client: Arc<dyn LockClient> = locks.clone();
        let state = StatementState::new(TxId(1), client);
        let index = store
            .uniqueness_constraint_create(&state, LabelId(1), PropId(1))
            .unwrap()
            .index();
        let node = store.node_create();
        store.node_add_label(&state, node, LabelId(1)).unwrap();

        store
            .node_set_property(&state, node, DefinedProperty::new(PropId(1), 5))
            .unwrap();
        assert_eq!(locks.taken.lock().len(), 1);

        let previous = store
            .node_set_property(&state, node, DefinedProperty::new(PropId(1), 5))
            .unwrap();
        assert_eq!(previous.value(), Some(Value::Int(5)));
        assert_eq!(locks.taken.lock().len(), 1);
        assert_eq!(store.index_lookup(&index, &Value::Int(5)).unwrap(), vec![node]);

        // equal value, different width: a real write
        let previous = store
            .node_set_property(&state, node, DefinedProperty::new(PropId(1), 5i64))
            .unwrap();
        assert_eq!(previous.value(), Some(Value::Int(5)));
        assert_eq!(locks.taken.lock().len(), 2);
        assert_eq!(store.index_lookup(&index, &Value::Long(5)).unwrap(), vec![node]);
        let stored = store.node_get_property(&state, node, PropId(1)).unwrap();
        assert!(matches!(stored.value(), Some(Value::Long(5))));
    }

    #[test]
    fn schema_changes_flush_schema_state() {
        let (store, cache, _, state) = setup();
        let _: u32 = cache.get_or_create("plan", |_| 1);
        store.index_create(&state, LabelId(1), PropId(1)).unwrap();
        assert!(!cache.contains(&"plan"));
    }
}
