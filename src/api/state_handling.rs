use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::api::{
    EntityReadOps, EntityWriteOps, KernelStatement, KeyReadOps, KeyWriteOps, SchemaReadOps,
    SchemaStateOps, SchemaStateValue, SchemaWriteOps,
};
use crate::counts::CountsDelta;
use crate::kernel::SchemaState;
use crate::schema::{IndexDescriptor, IndexState, UniquenessConstraint};
use crate::store::{ConstraintIndexCreator, IndexFailure, StoreReadLayer};
use crate::txstate::{PropertyLookup, TxState};
use crate::types::{
    Direction, KernelError, LabelId, NodeId, PropKeyId, RelId, RelationshipData, Result, RuleId,
    TokenKind, TypeId, NO_SUCH_NODE,
};
use crate::value::{Property, PropertyValue};

fn changes(st: &KernelStatement) -> Option<&TxState> {
    st.tx_state_ref().filter(|tx| tx.has_changes())
}

fn degree_contribution(rel: &RelationshipData, node: NodeId, direction: Direction) -> i64 {
    let outgoing = i64::from(rel.start == node);
    let incoming = i64::from(rel.end == node);
    match direction {
        Direction::Outgoing => outgoing,
        Direction::Incoming => incoming,
        Direction::Both => outgoing + incoming,
    }
}

/// Bottom layer: answers every operation from committed state merged with the
/// transaction's overlay, and records writes in the overlay.
///
/// Reads without recorded changes go straight to the store. Otherwise each entity falls
/// in one of three cases: deleted in this transaction (not found), created in this
/// transaction (overlay only), or committed (store merged with the overlay diff).
pub struct StateHandlingLayer {
    store: Arc<dyn StoreReadLayer>,
    constraint_index_creator: Arc<dyn ConstraintIndexCreator>,
    schema_state: Arc<SchemaState>,
}

impl StateHandlingLayer {
    /// Layer over `store`.
    pub fn new(
        store: Arc<dyn StoreReadLayer>,
        constraint_index_creator: Arc<dyn ConstraintIndexCreator>,
        schema_state: Arc<SchemaState>,
    ) -> Self {
        Self {
            store,
            constraint_index_creator,
            schema_state,
        }
    }

    /// Committed indexes of both kinds on `label`; data writes never see uncommitted ones.
    fn all_indexes_for_label(&self, label: LabelId) -> Vec<IndexDescriptor> {
        let mut indexes = self.store.indexes_get_for_label(label);
        indexes.extend(self.store.unique_indexes_get_for_label(label));
        indexes
    }

    fn committed_node_property(
        &self,
        st: &KernelStatement,
        node: NodeId,
        key: PropKeyId,
    ) -> Result<bool> {
        if st
            .tx_state_ref()
            .is_some_and(|tx| tx.node_is_added_in_this_tx(node))
        {
            return Ok(false);
        }
        Ok(self.store.node_get_property(node, key)?.is_some())
    }

    fn committed_relationship_property(
        &self,
        st: &KernelStatement,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<bool> {
        if st
            .tx_state_ref()
            .is_some_and(|tx| tx.relationship_is_added_in_this_tx(relationship))
        {
            return Ok(false);
        }
        Ok(self
            .store
            .relationship_get_property(relationship, key)?
            .is_some())
    }

    fn update_indexes_for_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        key: PropKeyId,
        before: Option<&PropertyValue>,
        after: Option<&PropertyValue>,
    ) -> Result<()> {
        for label in self.node_get_labels(st, node)? {
            for index in self.all_indexes_for_label(label) {
                if index.property_key == key {
                    st.tx_state()
                        .index_do_update_property(index, node, before, after);
                }
            }
        }
        Ok(())
    }

    fn update_indexes_for_label(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
        added: bool,
    ) -> Result<()> {
        for index in self.all_indexes_for_label(label) {
            if let Some(value) = self.node_get_property(st, node, index.property_key)? {
                let (before, after) = if added {
                    (None, Some(&value))
                } else {
                    (Some(&value), None)
                };
                st.tx_state()
                    .index_do_update_property(index, node, before, after);
            }
        }
        Ok(())
    }

    fn merge_schema<T: Ord + Copy>(
        committed: Vec<T>,
        diff: Option<&crate::txstate::DiffSets<T>>,
        keep: impl Fn(&T) -> bool,
    ) -> Vec<T> {
        let merged: BTreeSet<T> = match diff {
            Some(diff) => diff.apply(committed).filter(|item| keep(item)).collect(),
            None => committed.into_iter().filter(|item| keep(item)).collect(),
        };
        merged.into_iter().collect()
    }
}

impl EntityReadOps for StateHandlingLayer {
    fn node_exists(&self, st: &mut KernelStatement, node: NodeId) -> Result<bool> {
        if let Some(tx) = changes(st) {
            if tx.node_is_deleted_in_this_tx(node) {
                return Ok(false);
            }
            if tx.node_is_added_in_this_tx(node) {
                return Ok(true);
            }
        }
        Ok(self.store.node_exists(node))
    }

    fn relationship_exists(&self, st: &mut KernelStatement, relationship: RelId) -> Result<bool> {
        if let Some(tx) = changes(st) {
            if tx.relationship_is_deleted_in_this_tx(relationship) {
                return Ok(false);
            }
            if tx.relationship_is_added_in_this_tx(relationship) {
                return Ok(true);
            }
        }
        Ok(self.store.relationship_exists(relationship))
    }

    fn node_has_label(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        if let Some(tx) = changes(st) {
            if tx.node_is_deleted_in_this_tx(node) {
                return Err(KernelError::node_not_found(node));
            }
            if let Some(diff) = tx.node_label_diff(node) {
                if diff.is_added(&label) {
                    return Ok(true);
                }
                if diff.is_removed(&label) {
                    return Ok(false);
                }
            }
            if tx.node_is_added_in_this_tx(node) {
                return Ok(false);
            }
        }
        self.store.node_has_label(node, label)
    }

    fn node_get_labels(&self, st: &mut KernelStatement, node: NodeId) -> Result<Vec<LabelId>> {
        let Some(tx) = changes(st) else {
            return self.store.node_get_labels(node);
        };
        if tx.node_is_deleted_in_this_tx(node) {
            return Err(KernelError::node_not_found(node));
        }
        let committed = if tx.node_is_added_in_this_tx(node) {
            Vec::new()
        } else {
            self.store.node_get_labels(node)?
        };
        Ok(match tx.node_label_diff(node) {
            Some(diff) => {
                let labels: BTreeSet<LabelId> = diff.apply(committed).collect();
                labels.into_iter().collect()
            }
            None => committed,
        })
    }

    fn nodes_get_for_label(&self, st: &mut KernelStatement, label: LabelId) -> Result<Vec<NodeId>> {
        let committed = self.store.nodes_get_for_label(label);
        let Some(tx) = changes(st) else {
            return Ok(committed);
        };
        let mut nodes: BTreeSet<NodeId> = match tx.nodes_with_label_changed(label) {
            Some(diff) => diff.apply(committed).collect(),
            None => committed.into_iter().collect(),
        };
        nodes.retain(|node| !tx.node_is_deleted_in_this_tx(*node));
        Ok(nodes.into_iter().collect())
    }

    fn nodes_get_all(&self, st: &mut KernelStatement) -> Result<Vec<NodeId>> {
        let committed = self.store.nodes_get_all();
        let Some(tx) = changes(st) else {
            return Ok(committed);
        };
        let nodes: BTreeSet<NodeId> = tx.added_and_removed_nodes().apply(committed).collect();
        Ok(nodes.into_iter().collect())
    }

    fn relationships_get_all(&self, st: &mut KernelStatement) -> Result<Vec<RelId>> {
        let committed = self.store.relationships_get_all();
        let Some(tx) = changes(st) else {
            return Ok(committed);
        };
        let rels: BTreeSet<RelId> = tx
            .added_and_removed_relationships()
            .apply(committed)
            .collect();
        Ok(rels.into_iter().collect())
    }

    fn node_get_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        if let Some(tx) = changes(st) {
            if tx.node_is_deleted_in_this_tx(node) {
                return Err(KernelError::node_not_found(node));
            }
            if let Some(diff) = tx.node_property_diff(node) {
                match diff.lookup(key) {
                    PropertyLookup::Set(value) => return Ok(Some(value.clone())),
                    PropertyLookup::Removed => return Ok(None),
                    PropertyLookup::Untouched => {}
                }
            }
            if tx.node_is_added_in_this_tx(node) {
                return Ok(None);
            }
        }
        self.store.node_get_property(node, key)
    }

    fn node_get_all_properties(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
    ) -> Result<Vec<Property>> {
        let Some(tx) = changes(st) else {
            return self.store.node_get_all_properties(node);
        };
        if tx.node_is_deleted_in_this_tx(node) {
            return Err(KernelError::node_not_found(node));
        }
        let committed = if tx.node_is_added_in_this_tx(node) {
            Vec::new()
        } else {
            self.store.node_get_all_properties(node)?
        };
        Ok(match tx.node_property_diff(node) {
            Some(diff) => diff.apply(committed),
            None => committed,
        })
    }

    fn relationship_get_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        if let Some(tx) = changes(st) {
            if tx.relationship_is_deleted_in_this_tx(relationship) {
                return Err(KernelError::relationship_not_found(relationship));
            }
            if let Some(diff) = tx.relationship_property_diff(relationship) {
                match diff.lookup(key) {
                    PropertyLookup::Set(value) => return Ok(Some(value.clone())),
                    PropertyLookup::Removed => return Ok(None),
                    PropertyLookup::Untouched => {}
                }
            }
            if tx.relationship_is_added_in_this_tx(relationship) {
                return Ok(None);
            }
        }
        self.store.relationship_get_property(relationship, key)
    }

    fn relationship_get_all_properties(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
    ) -> Result<Vec<Property>> {
        let Some(tx) = changes(st) else {
            return self.store.relationship_get_all_properties(relationship);
        };
        if tx.relationship_is_deleted_in_this_tx(relationship) {
            return Err(KernelError::relationship_not_found(relationship));
        }
        let committed = if tx.relationship_is_added_in_this_tx(relationship) {
            Vec::new()
        } else {
            self.store.relationship_get_all_properties(relationship)?
        };
        Ok(match tx.relationship_property_diff(relationship) {
            Some(diff) => diff.apply(committed),
            None => committed,
        })
    }

    fn node_get_relationships(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        direction: Direction,
        types: &[TypeId],
    ) -> Result<Vec<RelationshipData>> {
        let Some(tx) = changes(st) else {
            return self.store.node_get_relationships(node, direction, types);
        };
        if tx.node_is_deleted_in_this_tx(node) {
            return Err(KernelError::node_not_found(node));
        }
        let committed = if tx.node_is_added_in_this_tx(node) {
            Vec::new()
        } else {
            self.store.node_get_relationships(node, direction, types)?
        };
        let mut rels: Vec<RelationshipData> = committed
            .into_iter()
            .filter(|rel| !tx.relationship_is_deleted_in_this_tx(rel.id))
            .collect();
        rels.extend(tx.added_relationships(node, direction, types).copied());
        Ok(rels)
    }

    fn node_get_degree(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        direction: Direction,
        ty: Option<TypeId>,
    ) -> Result<u64> {
        let Some(tx) = changes(st) else {
            return self.store.node_get_degree(node, direction, ty);
        };
        if tx.node_is_deleted_in_this_tx(node) {
            return Err(KernelError::node_not_found(node));
        }
        let types: Vec<TypeId> = ty.into_iter().collect();
        let mut degree = if tx.node_is_added_in_this_tx(node) {
            0
        } else {
            self.store.node_get_degree(node, direction, ty)? as i64
        };
        for rel in tx.removed_relationships(node, direction, &types) {
            degree -= degree_contribution(rel, node, direction);
        }
        for rel in tx.added_relationships(node, direction, &types) {
            degree += degree_contribution(rel, node, direction);
        }
        Ok(degree.max(0) as u64)
    }

    fn node_get_relationship_types(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
    ) -> Result<Vec<TypeId>> {
        if changes(st).is_none() {
            return self.store.node_get_relationship_types(node);
        }
        let types: BTreeSet<TypeId> = self
            .node_get_relationships(st, node, Direction::Both, &[])?
            .into_iter()
            .map(|rel| rel.ty)
            .collect();
        Ok(types.into_iter().collect())
    }

    fn relationship_get_data(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
    ) -> Result<RelationshipData> {
        if let Some(tx) = changes(st) {
            if tx.relationship_is_deleted_in_this_tx(relationship) {
                return Err(KernelError::relationship_not_found(relationship));
            }
            if tx.relationship_is_added_in_this_tx(relationship) {
                return tx
                    .relationship_data(relationship)
                    .copied()
                    .ok_or_else(|| KernelError::relationship_not_found(relationship));
            }
        }
        self.store.relationship_get_data(relationship)
    }

    fn nodes_get_from_index_seek(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
        value: &PropertyValue,
    ) -> Result<Vec<NodeId>> {
        let committed = self.store.index_seek(&index, value)?;
        let Some(tx) = changes(st) else {
            return Ok(committed);
        };
        let mut nodes: BTreeSet<NodeId> = match tx.index_updates_for_seek(&index, value) {
            Some(diff) => diff.apply(committed).collect(),
            None => committed.into_iter().collect(),
        };
        nodes.retain(|node| !tx.node_is_deleted_in_this_tx(*node));
        Ok(nodes.into_iter().collect())
    }

    fn nodes_get_from_index_scan(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<Vec<NodeId>> {
        let committed = self.store.index_scan(&index)?;
        let Some(tx) = changes(st) else {
            return Ok(committed);
        };
        let diff = tx.index_updates_for_scan(&index);
        let mut nodes: BTreeSet<NodeId> = diff.apply(committed).collect();
        nodes.retain(|node| !tx.node_is_deleted_in_this_tx(*node));
        Ok(nodes.into_iter().collect())
    }

    fn node_get_from_unique_index_seek(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
        value: &PropertyValue,
    ) -> Result<NodeId> {
        let nodes = self.nodes_get_from_index_seek(st, index, value)?;
        match nodes.as_slice() {
            [] => Ok(NO_SUCH_NODE),
            [node] => Ok(*node),
            [first, second, ..] => Err(KernelError::Invariant(format!(
                "unique {index} holds nodes {first} and {second} for value {value}"
            ))),
        }
    }

    fn count_nodes(&self, st: &mut KernelStatement, label: Option<LabelId>) -> Result<i64> {
        let committed = self.store.count_nodes(label);
        match changes(st) {
            Some(tx) => Ok(committed + CountsDelta::new(tx, self.store.as_ref()).for_nodes(label)?),
            None => Ok(committed),
        }
    }

    fn count_relationships(
        &self,
        st: &mut KernelStatement,
        start: Option<LabelId>,
        ty: Option<TypeId>,
        end: Option<LabelId>,
    ) -> Result<i64> {
        if start.is_some() && end.is_some() {
            return Err(KernelError::UnsupportedOperation(
                "counting relationships with both endpoint labels constrained",
            ));
        }
        let committed = self.store.count_relationships(start, ty, end);
        match changes(st) {
            Some(tx) => Ok(committed
                + CountsDelta::new(tx, self.store.as_ref()).for_relationships(start, ty, end)?),
            None => Ok(committed),
        }
    }
}

impl EntityWriteOps for StateHandlingLayer {
    fn node_create(&self, st: &mut KernelStatement) -> Result<NodeId> {
        let node = self.store.reserve_node_id();
        st.tx_state().node_do_create(node);
        Ok(node)
    }

    fn node_delete(&self, st: &mut KernelStatement, node: NodeId) -> Result<()> {
        if !self.node_exists(st, node)? {
            return Err(KernelError::node_not_found(node));
        }
        let tx = st.tx_state();
        let created_here = tx.node_is_added_in_this_tx(node);
        if created_here
            && tx
                .node_state(node)
                .is_some_and(|state| !state.added_relationships().is_empty())
        {
            return Err(KernelError::NodeStillHasRelationships(node));
        }
        tx.node_do_delete(node);
        if created_here {
            self.store.release_node_id(node);
        }
        Ok(())
    }

    fn relationship_create(
        &self,
        st: &mut KernelStatement,
        ty: TypeId,
        start: NodeId,
        end: NodeId,
    ) -> Result<RelId> {
        for node in [start, end] {
            if !self.node_exists(st, node)? {
                return Err(KernelError::node_not_found(node));
            }
        }
        let id = self.store.reserve_relationship_id();
        st.tx_state().relationship_do_create(RelationshipData {
            id,
            ty,
            start,
            end,
        });
        Ok(id)
    }

    fn relationship_delete(&self, st: &mut KernelStatement, relationship: RelId) -> Result<()> {
        let data = self.relationship_get_data(st, relationship)?;
        let tx = st.tx_state();
        let created_here = tx.relationship_is_added_in_this_tx(relationship);
        tx.relationship_do_delete(data);
        if created_here {
            self.store.release_relationship_id(relationship);
        }
        Ok(())
    }

    fn node_add_label(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        if self.node_has_label(st, node, label)? {
            return Ok(false);
        }
        st.tx_state().node_do_add_label(label, node);
        self.update_indexes_for_label(st, node, label, true)?;
        Ok(true)
    }

    fn node_remove_label(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        if !self.node_has_label(st, node, label)? {
            return Ok(false);
        }
        // Index entries are keyed by the current value, read before the label goes.
        self.update_indexes_for_label(st, node, label, false)?;
        st.tx_state().node_do_remove_label(label, node);
        Ok(true)
    }

    fn node_set_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        property: Property,
    ) -> Result<Option<PropertyValue>> {
        let previous = self.node_get_property(st, node, property.key)?;
        let committed = self.committed_node_property(st, node, property.key)?;
        self.update_indexes_for_property(
            st,
            node,
            property.key,
            previous.as_ref(),
            Some(&property.value),
        )?;
        st.tx_state()
            .node_do_set_property(node, property.key, property.value, committed);
        Ok(previous)
    }

    fn node_remove_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        let previous = self.node_get_property(st, node, key)?;
        if previous.is_none() {
            return Ok(None);
        }
        let committed = self.committed_node_property(st, node, key)?;
        self.update_indexes_for_property(st, node, key, previous.as_ref(), None)?;
        st.tx_state().node_do_remove_property(node, key, committed);
        Ok(previous)
    }

    fn relationship_set_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        property: Property,
    ) -> Result<Option<PropertyValue>> {
        let previous = self.relationship_get_property(st, relationship, property.key)?;
        let committed = self.committed_relationship_property(st, relationship, property.key)?;
        st.tx_state().relationship_do_set_property(
            relationship,
            property.key,
            property.value,
            committed,
        );
        Ok(previous)
    }

    fn relationship_remove_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        let previous = self.relationship_get_property(st, relationship, key)?;
        if previous.is_none() {
            return Ok(None);
        }
        let committed = self.committed_relationship_property(st, relationship, key)?;
        st.tx_state()
            .relationship_do_remove_property(relationship, key, committed);
        Ok(previous)
    }
}

impl SchemaReadOps for StateHandlingLayer {
    fn index_get_for_label_and_property_key(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<IndexDescriptor> {
        let descriptor = IndexDescriptor::new(label, key);
        if self
            .indexes_get_for_label(st, label)?
            .contains(&descriptor)
        {
            Ok(descriptor)
        } else {
            Err(KernelError::IndexNotFound(descriptor))
        }
    }

    fn indexes_get_for_label(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        Ok(Self::merge_schema(
            self.store.indexes_get_for_label(label),
            changes(st).map(TxState::index_diff),
            |index| index.label == label,
        ))
    }

    fn indexes_get_all(&self, st: &mut KernelStatement) -> Result<Vec<IndexDescriptor>> {
        let committed = self
            .store
            .index_rules_get_all()
            .into_iter()
            .filter(|rule| !rule.is_constraint_index())
            .map(|rule| rule.descriptor)
            .collect();
        Ok(Self::merge_schema(
            committed,
            changes(st).map(TxState::index_diff),
            |_| true,
        ))
    }

    fn unique_indexes_get_for_label(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        Ok(Self::merge_schema(
            self.store.unique_indexes_get_for_label(label),
            changes(st).map(TxState::constraint_index_diff),
            |index| index.label == label,
        ))
    }

    fn unique_indexes_get_all(&self, st: &mut KernelStatement) -> Result<Vec<IndexDescriptor>> {
        let committed = self
            .store
            .index_rules_get_all()
            .into_iter()
            .filter(|rule| rule.is_constraint_index())
            .map(|rule| rule.descriptor)
            .collect();
        Ok(Self::merge_schema(
            committed,
            changes(st).map(TxState::constraint_index_diff),
            |_| true,
        ))
    }

    fn index_get_state(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<IndexState> {
        if let Some(tx) = changes(st) {
            if tx.index_diff().is_added(&index) || tx.constraint_index_diff().is_added(&index) {
                return Ok(IndexState::Populating);
            }
        }
        self.store.index_get_state(&index)
    }

    fn index_get_failure(
        &self,
        _st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<Option<IndexFailure>> {
        self.store.index_get_failure(&index)
    }

    fn index_get_owning_uniqueness_constraint_id(
        &self,
        _st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<Option<RuleId>> {
        Ok(self.store.index_rule_required(&index)?.owning_constraint())
    }

    fn constraints_get_for_label_and_property_key(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<Vec<UniquenessConstraint>> {
        Ok(self
            .constraints_get_for_label(st, label)?
            .into_iter()
            .filter(|constraint| constraint.property_key == key)
            .collect())
    }

    fn constraints_get_for_label(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
    ) -> Result<Vec<UniquenessConstraint>> {
        Ok(Self::merge_schema(
            self.store.constraints_get_for_label(label),
            changes(st).map(TxState::constraint_diff),
            |constraint| constraint.label == label,
        ))
    }

    fn constraints_get_all(&self, st: &mut KernelStatement) -> Result<Vec<UniquenessConstraint>> {
        let committed = self
            .store
            .constraint_rules_get_all()
            .into_iter()
            .map(|rule| rule.constraint)
            .collect();
        Ok(Self::merge_schema(
            committed,
            changes(st).map(TxState::constraint_diff),
            |_| true,
        ))
    }
}

impl SchemaWriteOps for StateHandlingLayer {
    fn index_create(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<IndexDescriptor> {
        let descriptor = IndexDescriptor::new(label, key);
        st.tx_state().index_rule_do_add(descriptor);
        debug!(%descriptor, "index staged");
        Ok(descriptor)
    }

    fn index_drop(&self, st: &mut KernelStatement, index: IndexDescriptor) -> Result<()> {
        st.tx_state().index_rule_do_drop(index);
        Ok(())
    }

    fn uniqueness_constraint_create(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<UniquenessConstraint> {
        let constraint = UniquenessConstraint::new(label, key);
        let tx = st.tx_state();
        if tx.constraint_do_un_remove(&constraint) {
            tx.constraint_index_do_un_remove(&constraint.index_descriptor());
            return Ok(constraint);
        }
        if self.store.constraint_rule(&constraint).is_some() {
            return Err(KernelError::AlreadyConstrained(constraint));
        }
        let index = self
            .constraint_index_creator
            .create_uniqueness_constraint_index(constraint)?;
        st.tx_state().constraint_do_add(constraint, index);
        Ok(constraint)
    }

    fn constraint_drop(
        &self,
        st: &mut KernelStatement,
        constraint: UniquenessConstraint,
    ) -> Result<()> {
        // The backing index of a constraint added here was committed on its own.
        if let Some(index) = st.tx_state().constraint_index_created_in_tx(&constraint) {
            self.constraint_index_creator
                .drop_uniqueness_constraint_index(index)?;
        }
        st.tx_state().constraint_do_drop(constraint);
        Ok(())
    }
}

impl KeyReadOps for StateHandlingLayer {
    fn token_get_for_name(
        &self,
        _st: &mut KernelStatement,
        kind: TokenKind,
        name: &str,
    ) -> Result<u32> {
        Ok(self.store.token_get_for_name(kind, name).unwrap_or(u32::MAX))
    }

    fn token_get_name(
        &self,
        _st: &mut KernelStatement,
        kind: TokenKind,
        id: u32,
    ) -> Result<String> {
        self.store.token_get_name(kind, id)
    }

    fn tokens_get_all(
        &self,
        _st: &mut KernelStatement,
        kind: TokenKind,
    ) -> Result<Vec<(u32, String)>> {
        Ok(self.store.tokens_get_all(kind))
    }
}

impl KeyWriteOps for StateHandlingLayer {
    fn token_get_or_create_for_name(
        &self,
        _st: &mut KernelStatement,
        kind: TokenKind,
        name: &str,
    ) -> Result<u32> {
        self.store.token_get_or_create(kind, name)
    }
}

impl SchemaStateOps for StateHandlingLayer {
    fn schema_state_get_or_create(
        &self,
        _st: &mut KernelStatement,
        key: &str,
        create: &mut dyn FnMut() -> SchemaStateValue,
    ) -> Result<SchemaStateValue> {
        Ok(self.schema_state.get_or_create(key, create))
    }

    fn schema_state_contains(&self, _st: &mut KernelStatement, key: &str) -> Result<bool> {
        Ok(self.schema_state.contains(key))
    }

    fn schema_state_flush(&self, _st: &mut KernelStatement) -> Result<()> {
        self.schema_state.clear();
        Ok(())
    }
}
