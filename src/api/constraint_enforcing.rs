use std::sync::Arc;

use tracing::trace;

use crate::api::{EntityReadOps, EntityWriteOps, KernelStatement, SchemaReadOps};
use crate::schema::{IndexDescriptor, IndexState};
use crate::types::{
    Direction, KernelError, LabelId, NodeId, PropKeyId, RelId, RelationshipData, Result, TypeId,
    NO_SUCH_NODE,
};
use crate::value::{Property, PropertyValue};

/// Enforces uniqueness constraints on label and property writes, and serializes unique
/// index lookups against concurrent writers of the same index entry.
pub struct ConstraintEnforcingLayer {
    read: Arc<dyn EntityReadOps>,
    write: Arc<dyn EntityWriteOps>,
    schema_read: Arc<dyn SchemaReadOps>,
}

impl ConstraintEnforcingLayer {
    /// Layer over the given delegates.
    pub fn new(
        read: Arc<dyn EntityReadOps>,
        write: Arc<dyn EntityWriteOps>,
        schema_read: Arc<dyn SchemaReadOps>,
    ) -> Self {
        Self {
            read,
            write,
            schema_read,
        }
    }

    fn assert_index_online(&self, st: &mut KernelStatement, index: IndexDescriptor) -> Result<()> {
        match self.schema_read.index_get_state(st, index)? {
            IndexState::Online => Ok(()),
            IndexState::Populating => Err(KernelError::IndexPopulating(index)),
            IndexState::Failed => {
                let failure = self
                    .schema_read
                    .index_get_failure(st, index)?
                    .map(|failure| failure.to_string())
                    .unwrap_or_else(|| String::from("population failed"));
                Err(KernelError::IndexBroken {
                    descriptor: index,
                    failure,
                })
            }
        }
    }

    /// Fails if a node other than `node` already holds `value` under `(label, key)`.
    ///
    /// The index entry stays write-locked until the transaction ends, so no concurrent
    /// transaction can claim the same value before this one commits.
    fn validate(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
        key: PropKeyId,
        value: &PropertyValue,
    ) -> Result<()> {
        let index = IndexDescriptor::new(label, key);
        self.lookup_for_validation(st, index, value)
            .map_err(unable_to_validate)
            .and_then(|existing| {
                if existing != NO_SUCH_NODE && existing != node {
                    Err(KernelError::UniquePropertyConstraintViolation {
                        label,
                        property_key: key,
                        value: value.clone(),
                        existing,
                    })
                } else {
                    Ok(())
                }
            })
    }

    fn lookup_for_validation(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
        value: &PropertyValue,
    ) -> Result<NodeId> {
        self.assert_index_online(st, index)?;
        st.locks().acquire_index_entry_write_lock(
            index.label,
            index.property_key,
            &value.value_as_string(),
        )?;
        self.read.node_get_from_unique_index_seek(st, index, value)
    }
}

fn unable_to_validate(err: KernelError) -> KernelError {
    match err {
        KernelError::IndexNotFound(_)
        | KernelError::IndexBroken { .. }
        | KernelError::IndexPopulating(_) => KernelError::UnableToValidateConstraint {
            cause: Box::new(err),
        },
        other => other,
    }
}

impl EntityReadOps for ConstraintEnforcingLayer {
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
        self.read.node_has_label(st, node, label)
    }

    fn node_get_labels(&self, st: &mut KernelStatement, node: NodeId) -> Result<Vec<LabelId>> {
        self.read.node_get_labels(st, node)
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
        self.read.node_get_property(st, node, key)
    }

    fn node_get_all_properties(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
    ) -> Result<Vec<Property>> {
        self.read.node_get_all_properties(st, node)
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

    /// Looks a value up in a unique index.
    ///
    /// Starts under a shared entry lock. A miss is retried under an exclusive lock, which
    /// is kept when the value is still absent so the caller may claim it. A hit under the
    /// exclusive lock is downgraded to a shared one before returning.
    fn node_get_from_unique_index_seek(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
        value: &PropertyValue,
    ) -> Result<NodeId> {
        self.assert_index_online(st, index)?;
        let entry = value.value_as_string();
        let (label, key) = (index.label, index.property_key);

        let shared = st
            .locks()
            .releasable_index_entry_read_lock(label, key, &entry)?;
        let found = self.read.node_get_from_unique_index_seek(st, index, value)?;
        if found != NO_SUCH_NODE {
            shared.register_with_transaction(st.locks());
            return Ok(found);
        }
        shared.release()?;

        let exclusive = st
            .locks()
            .releasable_index_entry_write_lock(label, key, &entry)?;
        let found = self.read.node_get_from_unique_index_seek(st, index, value)?;
        if found == NO_SUCH_NODE {
            exclusive.register_with_transaction(st.locks());
            return Ok(found);
        }
        trace!(%index, node = found.0, "unique entry appeared, downgrading");
        let shared = st
            .locks()
            .releasable_index_entry_read_lock(label, key, &entry)?;
        shared.register_with_transaction(st.locks());
        exclusive.release()?;
        Ok(found)
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

impl EntityWriteOps for ConstraintEnforcingLayer {
    fn node_create(&self, st: &mut KernelStatement) -> Result<NodeId> {
        self.write.node_create(st)
    }

    fn node_delete(&self, st: &mut KernelStatement, node: NodeId) -> Result<()> {
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
        for constraint in self.schema_read.constraints_get_for_label(st, label)? {
            let key = constraint.property_key;
            if let Some(value) = self.read.node_get_property(st, node, key)? {
                self.validate(st, node, label, key, &value)?;
            }
        }
        self.write.node_add_label(st, node, label)
    }

    fn node_remove_label(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        label: LabelId,
    ) -> Result<bool> {
        self.write.node_remove_label(st, node, label)
    }

    fn node_set_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        property: Property,
    ) -> Result<Option<PropertyValue>> {
        for label in self.read.node_get_labels(st, node)? {
            let constrained = !self
                .schema_read
                .constraints_get_for_label_and_property_key(st, label, property.key)?
                .is_empty();
            if constrained {
                self.validate(st, node, label, property.key, &property.value)?;
            }
        }
        self.write.node_set_property(st, node, property)
    }

    fn node_remove_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
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
