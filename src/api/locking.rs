use std::sync::Arc;

use crate::api::{
    EntityReadOps, EntityWriteOps, KernelStatement, SchemaReadOps, SchemaStateOps,
    SchemaStateValue, SchemaWriteOps,
};
use crate::schema::{IndexDescriptor, IndexState, UniquenessConstraint};
use crate::store::IndexFailure;
use crate::types::{LabelId, NodeId, PropKeyId, RelId, Result, RuleId, TypeId};
use crate::value::{Property, PropertyValue};

/// Takes the lock each operation needs before delegating.
///
/// Data writes hold the schema lock shared, so the constraints they were validated
/// against cannot change before commit, plus an exclusive lock on every node they touch.
/// Schema writes hold the schema lock exclusively.
pub struct LockingLayer {
    entity_read: Arc<dyn EntityReadOps>,
    entity_write: Arc<dyn EntityWriteOps>,
    schema_read: Arc<dyn SchemaReadOps>,
    schema_write: Arc<dyn SchemaWriteOps>,
    schema_state: Arc<dyn SchemaStateOps>,
}

impl LockingLayer {
    /// Layer over the given delegates.
    pub fn new(
        entity_read: Arc<dyn EntityReadOps>,
        entity_write: Arc<dyn EntityWriteOps>,
        schema_read: Arc<dyn SchemaReadOps>,
        schema_write: Arc<dyn SchemaWriteOps>,
        schema_state: Arc<dyn SchemaStateOps>,
    ) -> Self {
        Self {
            entity_read,
            entity_write,
            schema_read,
            schema_write,
            schema_state,
        }
    }

    fn lock_node_for_write(st: &mut KernelStatement, node: NodeId) -> Result<()> {
        let locks = st.locks();
        locks.acquire_schema_read_lock()?;
        locks.acquire_node_write_lock(node)
    }

    /// Endpoints are locked in id order so two transactions linking the same pair cannot
    /// deadlock on each other.
    fn lock_endpoints(st: &mut KernelStatement, start: NodeId, end: NodeId) -> Result<()> {
        let locks = st.locks();
        locks.acquire_schema_read_lock()?;
        let (low, high) = if start <= end { (start, end) } else { (end, start) };
        locks.acquire_node_write_lock(low)?;
        if high != low {
            locks.acquire_node_write_lock(high)?;
        }
        Ok(())
    }

    /// Read-only transactions skip the shared schema lock on schema reads.
    fn lock_schema_for_read(st: &mut KernelStatement) -> Result<()> {
        if st.has_tx_state_with_changes() {
            st.locks().acquire_schema_read_lock()?;
        }
        Ok(())
    }
}

impl EntityWriteOps for LockingLayer {
    fn node_create(&self, st: &mut KernelStatement) -> Result<NodeId> {
        st.locks().acquire_schema_read_lock()?;
        self.entity_write.node_create(st)
    }

    fn node_delete(&self, st: &mut KernelStatement, node: NodeId) -> Result<()> {
        Self::lock_node_for_write(st, node)?;
        self.entity_write.node_delete(st, node)
    }

    fn relationship_create(
        &self,
        st: &mut KernelStatement,
        ty: TypeId,
        start: NodeId,
        end: NodeId,
    ) -> Result<RelId> {
        Self::lock_endpoints(st, start, end)?;
        self.entity_write.relationship_create(st, ty, start, end)
    }

    fn relationship_delete(&self, st: &mut KernelStatement, relationship: RelId) -> Result<()> {
        let data = self.entity_read.relationship_get_data(st, relationship)?;
        Self::lock_endpoints(st, data.start, data.end)?;
        st.locks().acquire_relationship_write_lock(relationship)?;
        self.entity_write.relationship_delete(st, relationship)
    }

    fn node_add_label(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        Self::lock_node_for_write(st, node)?;
        self.entity_write.node_add_label(st, node, label)
    }

    fn node_remove_label(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        Self::lock_node_for_write(st, node)?;
        self.entity_write.node_remove_label(st, node, label)
    }

    fn node_set_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        property: Property,
    ) -> Result<Option<PropertyValue>> {
        Self::lock_node_for_write(st, node)?;
        self.entity_write.node_set_property(st, node, property)
    }

    fn node_remove_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        Self::lock_node_for_write(st, node)?;
        self.entity_write.node_remove_property(st, node, key)
    }

    fn relationship_set_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        property: Property,
    ) -> Result<Option<PropertyValue>> {
        let locks = st.locks();
        locks.acquire_schema_read_lock()?;
        locks.acquire_relationship_write_lock(relationship)?;
        self.entity_write
            .relationship_set_property(st, relationship, property)
    }

    fn relationship_remove_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        let locks = st.locks();
        locks.acquire_schema_read_lock()?;
        locks.acquire_relationship_write_lock(relationship)?;
        self.entity_write
            .relationship_remove_property(st, relationship, key)
    }
}

impl SchemaReadOps for LockingLayer {
    fn index_get_for_label_and_property_key(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<IndexDescriptor> {
        Self::lock_schema_for_read(st)?;
        self.schema_read
            .index_get_for_label_and_property_key(st, label, key)
    }

    fn indexes_get_for_label(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        Self::lock_schema_for_read(st)?;
        self.schema_read.indexes_get_for_label(st, label)
    }

    fn indexes_get_all(&self, st: &mut KernelStatement) -> Result<Vec<IndexDescriptor>> {
        Self::lock_schema_for_read(st)?;
        self.schema_read.indexes_get_all(st)
    }

    fn unique_indexes_get_for_label(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        Self::lock_schema_for_read(st)?;
        self.schema_read.unique_indexes_get_for_label(st, label)
    }

    fn unique_indexes_get_all(&self, st: &mut KernelStatement) -> Result<Vec<IndexDescriptor>> {
        Self::lock_schema_for_read(st)?;
        self.schema_read.unique_indexes_get_all(st)
    }

    fn index_get_state(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<IndexState> {
        Self::lock_schema_for_read(st)?;
        self.schema_read.index_get_state(st, index)
    }

    fn index_get_failure(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<Option<IndexFailure>> {
        Self::lock_schema_for_read(st)?;
        self.schema_read.index_get_failure(st, index)
    }

    fn index_get_owning_uniqueness_constraint_id(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<Option<RuleId>> {
        Self::lock_schema_for_read(st)?;
        self.schema_read
            .index_get_owning_uniqueness_constraint_id(st, index)
    }

    fn constraints_get_for_label_and_property_key(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<Vec<UniquenessConstraint>> {
        Self::lock_schema_for_read(st)?;
        self.schema_read
            .constraints_get_for_label_and_property_key(st, label, key)
    }

    fn constraints_get_for_label(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
    ) -> Result<Vec<UniquenessConstraint>> {
        Self::lock_schema_for_read(st)?;
        self.schema_read.constraints_get_for_label(st, label)
    }

    fn constraints_get_all(&self, st: &mut KernelStatement) -> Result<Vec<UniquenessConstraint>> {
        Self::lock_schema_for_read(st)?;
        self.schema_read.constraints_get_all(st)
    }
}

impl SchemaWriteOps for LockingLayer {
    fn index_create(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<IndexDescriptor> {
        st.locks().acquire_schema_write_lock()?;
        self.schema_write.index_create(st, label, key)
    }

    fn index_drop(&self, st: &mut KernelStatement, index: IndexDescriptor) -> Result<()> {
        st.locks().acquire_schema_write_lock()?;
        self.schema_write.index_drop(st, index)
    }

    fn uniqueness_constraint_create(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<UniquenessConstraint> {
        st.locks().acquire_schema_write_lock()?;
        self.schema_write.uniqueness_constraint_create(st, label, key)
    }

    fn constraint_drop(
        &self,
        st: &mut KernelStatement,
        constraint: UniquenessConstraint,
    ) -> Result<()> {
        st.locks().acquire_schema_write_lock()?;
        self.schema_write.constraint_drop(st, constraint)
    }
}

impl SchemaStateOps for LockingLayer {
    fn schema_state_get_or_create(
        &self,
        st: &mut KernelStatement,
        key: &str,
        create: &mut dyn FnMut() -> SchemaStateValue,
    ) -> Result<SchemaStateValue> {
        st.locks().acquire_schema_read_lock()?;
        self.schema_state.schema_state_get_or_create(st, key, create)
    }

    fn schema_state_contains(&self, st: &mut KernelStatement, key: &str) -> Result<bool> {
        st.locks().acquire_schema_read_lock()?;
        self.schema_state.schema_state_contains(st, key)
    }

    fn schema_state_flush(&self, st: &mut KernelStatement) -> Result<()> {
        st.locks().acquire_schema_read_lock()?;
        self.schema_state.schema_state_flush(st)
    }
}
