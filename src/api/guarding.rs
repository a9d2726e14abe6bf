use std::sync::Arc;

use crate::api::{
    EntityReadOps, EntityWriteOps, KernelStatement, KeyReadOps, KeyWriteOps, SchemaReadOps,
    SchemaStateOps, SchemaStateValue, SchemaWriteOps, StatementOperationParts,
};
use crate::schema::{IndexDescriptor, IndexState, UniquenessConstraint};
use crate::store::{Guard, IndexFailure};
use crate::types::{
    Direction, LabelId, NodeId, PropKeyId, RelId, RelationshipData, Result, RuleId, TokenKind,
    TypeId,
};
use crate::value::{Property, PropertyValue};

/// Outermost layer: fails fast once the transaction was marked for termination or the
/// guard refuses to let it continue. Wraps every capability, token and schema state
/// access included.
pub struct GuardingLayer {
    guard: Arc<dyn Guard>,
    entity_read: Arc<dyn EntityReadOps>,
    entity_write: Arc<dyn EntityWriteOps>,
    schema_read: Arc<dyn SchemaReadOps>,
    schema_write: Arc<dyn SchemaWriteOps>,
    key_read: Arc<dyn KeyReadOps>,
    key_write: Arc<dyn KeyWriteOps>,
    schema_state: Arc<dyn SchemaStateOps>,
}

impl GuardingLayer {
    /// Layer over the capabilities currently on top of `below`.
    pub fn new(guard: Arc<dyn Guard>, below: &StatementOperationParts) -> Self {
        Self {
            guard,
            entity_read: below.entity_read_arc(),
            entity_write: below.entity_write_arc(),
            schema_read: below.schema_read_arc(),
            schema_write: below.schema_write_arc(),
            key_read: below.key_read_arc(),
            key_write: below.key_write_arc(),
            schema_state: below.schema_state_arc(),
        }
    }

    fn check(&self, st: &KernelStatement) -> Result<()> {
        st.assert_not_terminated()?;
        self.guard.check(st.started())
    }
}

impl EntityReadOps for GuardingLayer {
    fn node_exists(&self, st: &mut KernelStatement, node: NodeId) -> Result<bool> {
        self.check(st)?;
        self.entity_read.node_exists(st, node)
    }

    fn relationship_exists(&self, st: &mut KernelStatement, relationship: RelId) -> Result<bool> {
        self.check(st)?;
        self.entity_read.relationship_exists(st, relationship)
    }

    fn node_has_label(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        self.check(st)?;
        self.entity_read.node_has_label(st, node, label)
    }

    fn node_get_labels(&self, st: &mut KernelStatement, node: NodeId) -> Result<Vec<LabelId>> {
        self.check(st)?;
        self.entity_read.node_get_labels(st, node)
    }

    fn nodes_get_for_label(&self, st: &mut KernelStatement, label: LabelId) -> Result<Vec<NodeId>> {
        self.check(st)?;
        self.entity_read.nodes_get_for_label(st, label)
    }

    fn nodes_get_all(&self, st: &mut KernelStatement) -> Result<Vec<NodeId>> {
        self.check(st)?;
        self.entity_read.nodes_get_all(st)
    }

    fn relationships_get_all(&self, st: &mut KernelStatement) -> Result<Vec<RelId>> {
        self.check(st)?;
        self.entity_read.relationships_get_all(st)
    }

    fn node_get_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        self.check(st)?;
        self.entity_read.node_get_property(st, node, key)
    }

    fn node_get_all_properties(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
    ) -> Result<Vec<Property>> {
        self.check(st)?;
        self.entity_read.node_get_all_properties(st, node)
    }

    fn relationship_get_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        self.check(st)?;
        self.entity_read
            .relationship_get_property(st, relationship, key)
    }

    fn relationship_get_all_properties(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
    ) -> Result<Vec<Property>> {
        self.check(st)?;
        self.entity_read
            .relationship_get_all_properties(st, relationship)
    }

    fn node_get_relationships(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        direction: Direction,
        types: &[TypeId],
    ) -> Result<Vec<RelationshipData>> {
        self.check(st)?;
        self.entity_read
            .node_get_relationships(st, node, direction, types)
    }

    fn node_get_degree(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        direction: Direction,
        ty: Option<TypeId>,
    ) -> Result<u64> {
        self.check(st)?;
        self.entity_read.node_get_degree(st, node, direction, ty)
    }

    fn node_get_relationship_types(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
    ) -> Result<Vec<TypeId>> {
        self.check(st)?;
        self.entity_read.node_get_relationship_types(st, node)
    }

    fn relationship_get_data(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
    ) -> Result<RelationshipData> {
        self.check(st)?;
        self.entity_read.relationship_get_data(st, relationship)
    }

    fn nodes_get_from_index_seek(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
        value: &PropertyValue,
    ) -> Result<Vec<NodeId>> {
        self.check(st)?;
        self.entity_read.nodes_get_from_index_seek(st, index, value)
    }

    fn nodes_get_from_index_scan(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<Vec<NodeId>> {
        self.check(st)?;
        self.entity_read.nodes_get_from_index_scan(st, index)
    }

    fn node_get_from_unique_index_seek(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
        value: &PropertyValue,
    ) -> Result<NodeId> {
        self.check(st)?;
        self.entity_read
            .node_get_from_unique_index_seek(st, index, value)
    }

    fn count_nodes(&self, st: &mut KernelStatement, label: Option<LabelId>) -> Result<i64> {
        self.check(st)?;
        self.entity_read.count_nodes(st, label)
    }

    fn count_relationships(
        &self,
        st: &mut KernelStatement,
        start: Option<LabelId>,
        ty: Option<TypeId>,
        end: Option<LabelId>,
    ) -> Result<i64> {
        self.check(st)?;
        self.entity_read.count_relationships(st, start, ty, end)
    }
}

impl EntityWriteOps for GuardingLayer {
    fn node_create(&self, st: &mut KernelStatement) -> Result<NodeId> {
        self.check(st)?;
        self.entity_write.node_create(st)
    }

    fn node_delete(&self, st: &mut KernelStatement, node: NodeId) -> Result<()> {
        self.check(st)?;
        self.entity_write.node_delete(st, node)
    }

    fn relationship_create(
        &self,
        st: &mut KernelStatement,
        ty: TypeId,
        start: NodeId,
        end: NodeId,
    ) -> Result<RelId> {
        self.check(st)?;
        self.entity_write.relationship_create(st, ty, start, end)
    }

    fn relationship_delete(&self, st: &mut KernelStatement, relationship: RelId) -> Result<()> {
        self.check(st)?;
        self.entity_write.relationship_delete(st, relationship)
    }

    fn node_add_label(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        self.check(st)?;
        self.entity_write.node_add_label(st, node, label)
    }

    fn node_remove_label(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        self.check(st)?;
        self.entity_write.node_remove_label(st, node, label)
    }

    fn node_set_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        property: Property,
    ) -> Result<Option<PropertyValue>> {
        self.check(st)?;
        self.entity_write.node_set_property(st, node, property)
    }

    fn node_remove_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        self.check(st)?;
        self.entity_write.node_remove_property(st, node, key)
    }

    fn relationship_set_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        property: Property,
    ) -> Result<Option<PropertyValue>> {
        self.check(st)?;
        self.entity_write
            .relationship_set_property(st, relationship, property)
    }

    fn relationship_remove_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        self.check(st)?;
        self.entity_write
            .relationship_remove_property(st, relationship, key)
    }
}

impl SchemaReadOps for GuardingLayer {
    fn index_get_for_label_and_property_key(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<IndexDescriptor> {
        self.check(st)?;
        self.schema_read
            .index_get_for_label_and_property_key(st, label, key)
    }

    fn indexes_get_for_label(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        self.check(st)?;
        self.schema_read.indexes_get_for_label(st, label)
    }

    fn indexes_get_all(&self, st: &mut KernelStatement) -> Result<Vec<IndexDescriptor>> {
        self.check(st)?;
        self.schema_read.indexes_get_all(st)
    }

    fn unique_indexes_get_for_label(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        self.check(st)?;
        self.schema_read.unique_indexes_get_for_label(st, label)
    }

    fn unique_indexes_get_all(&self, st: &mut KernelStatement) -> Result<Vec<IndexDescriptor>> {
        self.check(st)?;
        self.schema_read.unique_indexes_get_all(st)
    }

    fn index_get_state(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<IndexState> {
        self.check(st)?;
        self.schema_read.index_get_state(st, index)
    }

    fn index_get_failure(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<Option<IndexFailure>> {
        self.check(st)?;
        self.schema_read.index_get_failure(st, index)
    }

    fn index_get_owning_uniqueness_constraint_id(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<Option<RuleId>> {
        self.check(st)?;
        self.schema_read
            .index_get_owning_uniqueness_constraint_id(st, index)
    }

    fn constraints_get_for_label_and_property_key(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<Vec<UniquenessConstraint>> {
        self.check(st)?;
        self.schema_read
            .constraints_get_for_label_and_property_key(st, label, key)
    }

    fn constraints_get_for_label(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
    ) -> Result<Vec<UniquenessConstraint>> {
        self.check(st)?;
        self.schema_read.constraints_get_for_label(st, label)
    }

    fn constraints_get_all(&self, st: &mut KernelStatement) -> Result<Vec<UniquenessConstraint>> {
        self.check(st)?;
        self.schema_read.constraints_get_all(st)
    }
}

impl SchemaWriteOps for GuardingLayer {
    fn index_create(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<IndexDescriptor> {
        self.check(st)?;
        self.schema_write.index_create(st, label, key)
    }

    fn index_drop(&self, st: &mut KernelStatement, index: IndexDescriptor) -> Result<()> {
        self.check(st)?;
        self.schema_write.index_drop(st, index)
    }

    fn uniqueness_constraint_create(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<UniquenessConstraint> {
        self.check(st)?;
        self.schema_write.uniqueness_constraint_create(st, label, key)
    }

    fn constraint_drop(
        &self,
        st: &mut KernelStatement,
        constraint: UniquenessConstraint,
    ) -> Result<()> {
        self.check(st)?;
        self.schema_write.constraint_drop(st, constraint)
    }
}

impl KeyReadOps for GuardingLayer {
    fn token_get_for_name(
        &self,
        st: &mut KernelStatement,
        kind: TokenKind,
        name: &str,
    ) -> Result<u32> {
        self.check(st)?;
        self.key_read.token_get_for_name(st, kind, name)
    }

    fn token_get_name(&self, st: &mut KernelStatement, kind: TokenKind, id: u32) -> Result<String> {
        self.check(st)?;
        self.key_read.token_get_name(st, kind, id)
    }

    fn tokens_get_all(
        &self,
        st: &mut KernelStatement,
        kind: TokenKind,
    ) -> Result<Vec<(u32, String)>> {
        self.check(st)?;
        self.key_read.tokens_get_all(st, kind)
    }
}

impl KeyWriteOps for GuardingLayer {
    fn token_get_or_create_for_name(
        &self,
        st: &mut KernelStatement,
        kind: TokenKind,
        name: &str,
    ) -> Result<u32> {
        self.check(st)?;
        self.key_write.token_get_or_create_for_name(st, kind, name)
    }
}

impl SchemaStateOps for GuardingLayer {
    fn schema_state_get_or_create(
        &self,
        st: &mut KernelStatement,
        key: &str,
        create: &mut dyn FnMut() -> SchemaStateValue,
    ) -> Result<SchemaStateValue> {
        self.check(st)?;
        self.schema_state.schema_state_get_or_create(st, key, create)
    }

    fn schema_state_contains(&self, st: &mut KernelStatement, key: &str) -> Result<bool> {
        self.check(st)?;
        self.schema_state.schema_state_contains(st, key)
    }

    fn schema_state_flush(&self, st: &mut KernelStatement) -> Result<()> {
        self.check(st)?;
        self.schema_state.schema_state_flush(st)
    }
}
