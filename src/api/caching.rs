use std::sync::Arc;

use crate::api::{EntityReadOps, EntityWriteOps, KernelStatement};
use crate::schema::IndexDescriptor;
use crate::types::{Direction, LabelId, NodeId, PropKeyId, RelId, RelationshipData, Result, TypeId};
use crate::value::{Property, PropertyValue};

/// Memoizes label and property reads of nodes for the life of a statement.
///
/// Reads answered here already include the transaction's overlay, so every write that
/// could change a memoized answer evicts the node first.
pub struct CachingLayer {
    read: Arc<dyn EntityReadOps>,
    write: Arc<dyn EntityWriteOps>,
}

impl CachingLayer {
    /// Layer over the given delegates.
    pub fn new(read: Arc<dyn EntityReadOps>, write: Arc<dyn EntityWriteOps>) -> Self {
        Self { read, write }
    }

    fn labels(&self, st: &mut KernelStatement, node: NodeId) -> Result<Vec<LabelId>> {
        if let Some(labels) = st.cached_labels(node) {
            return Ok(labels);
        }
        let labels = self.read.node_get_labels(st, node)?;
        st.cache_labels(node, labels.clone());
        Ok(labels)
    }

    fn properties(&self, st: &mut KernelStatement, node: NodeId) -> Result<Vec<Property>> {
        if let Some(properties) = st.cached_properties(node) {
            return Ok(properties);
        }
        let properties = self.read.node_get_all_properties(st, node)?;
        st.cache_properties(node, properties.clone());
        Ok(properties)
    }
}

impl EntityReadOps for CachingLayer {
    fn node_exists(&self, st: &mut KernelStatement, node: NodeId) -> Result<bool> {
        self.read.node_exists(st, node)
    }

    fn relationship_exists(&self, st: &mut KernelStatement, relationship: RelId) -> Result<bool> {
        self.read.relationship_exists(st, relationship)
    }

    fn node_has_label(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        Ok(self.labels(st, node)?.binary_search(&label).is_ok())
    }

    fn node_get_labels(&self, st: &mut KernelStatement, node: NodeId) -> Result<Vec<LabelId>> {
        self.labels(st, node)
    }

    fn nodes_get_for_label(&self, st: &mut KernelStatement, label: LabelId) -> Result<Vec<NodeId>> {
        self.read.nodes_get_for_label(st, label)
    }

    fn nodes_get_all(&self, st: &mut KernelStatement) -> Result<Vec<NodeId>> {
        self.read.nodes_get_all(st)
    }

    fn relationships_get_all(&self, st: &mut KernelStatement) -> Result<Vec<RelId>> {
        self.read.relationships_get_all(st)
    }

    fn node_get_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        Ok(self
            .properties(st, node)?
            .into_iter()
            .find(|property| property.key == key)
            .map(|property| property.value))
    }

    fn node_get_all_properties(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
    ) -> Result<Vec<Property>> {
        self.properties(st, node)
    }

    fn relationship_get_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        self.read.relationship_get_property(st, relationship, key)
    }

    fn relationship_get_all_properties(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
    ) -> Result<Vec<Property>> {
        self.read.relationship_get_all_properties(st, relationship)
    }

    fn node_get_relationships(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        direction: Direction,
        types: &[TypeId],
    ) -> Result<Vec<RelationshipData>> {
        self.read.node_get_relationships(st, node, direction, types)
    }

    fn node_get_degree(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        direction: Direction,
        ty: Option<TypeId>,
    ) -> Result<u64> {
        self.read.node_get_degree(st, node, direction, ty)
    }

    fn node_get_relationship_types(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
    ) -> Result<Vec<TypeId>> {
        self.read.node_get_relationship_types(st, node)
    }

    fn relationship_get_data(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
    ) -> Result<RelationshipData> {
        self.read.relationship_get_data(st, relationship)
    }

    fn nodes_get_from_index_seek(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
        value: &PropertyValue,
    ) -> Result<Vec<NodeId>> {
        self.read.nodes_get_from_index_seek(st, index, value)
    }

    fn nodes_get_from_index_scan(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<Vec<NodeId>> {
        self.read.nodes_get_from_index_scan(st, index)
    }

    fn node_get_from_unique_index_seek(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
        value: &PropertyValue,
    ) -> Result<NodeId> {
        self.read.node_get_from_unique_index_seek(st, index, value)
    }

    fn count_nodes(&self, st: &mut KernelStatement, label: Option<LabelId>) -> Result<i64> {
        self.read.count_nodes(st, label)
    }

    fn count_relationships(
        &self,
        st: &mut KernelStatement,
        start: Option<LabelId>,
        ty: Option<TypeId>,
        end: Option<LabelId>,
    ) -> Result<i64> {
        self.read.count_relationships(st, start, ty, end)
    }
}

impl EntityWriteOps for CachingLayer {
    fn node_create(&self, st: &mut KernelStatement) -> Result<NodeId> {
        self.write.node_create(st)
    }

    fn node_delete(&self, st: &mut KernelStatement, node: NodeId) -> Result<()> {
        st.invalidate_node(node);
        self.write.node_delete(st, node)
    }

    fn relationship_create(
        &self,
        st: &mut KernelStatement,
        ty: TypeId,
        start: NodeId,
        end: NodeId,
    ) -> Result<RelId> {
        self.write.relationship_create(st, ty, start, end)
    }

    fn relationship_delete(&self, st: &mut KernelStatement, relationship: RelId) -> Result<()> {
        self.write.relationship_delete(st, relationship)
    }

    fn node_add_label(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        st.invalidate_node(node);
        self.write.node_add_label(st, node, label)
    }

    fn node_remove_label(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        st.invalidate_node(node);
        self.write.node_remove_label(st, node, label)
    }

    fn node_set_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        property: Property,
    ) -> Result<Option<PropertyValue>> {
        st.invalidate_node(node);
        self.write.node_set_property(st, node, property)
    }

    fn node_remove_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        st.invalidate_node(node);
        self.write.node_remove_property(st, node, key)
    }

    fn relationship_set_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        property: Property,
    ) -> Result<Option<PropertyValue>> {
        self.write.relationship_set_property(st, relationship, property)
    }

    fn relationship_remove_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        self.write.relationship_remove_property(st, relationship, key)
    }
}
