use crate::api::{EntityWriteOps, KernelStatement, KeyWriteOps, SchemaWriteOps};
use crate::schema::{IndexDescriptor, UniquenessConstraint};
use crate::types::{KernelError, LabelId, NodeId, PropKeyId, RelId, Result, TokenKind, TypeId};
use crate::value::{Property, PropertyValue};

/// Refuses every write with [`KernelError::ReadOnlyDatabase`] without reaching the layers
/// below.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadOnlyLayer;

impl EntityWriteOps for ReadOnlyLayer {
    fn node_create(&self, _st: &mut KernelStatement) -> Result<NodeId> {
        Err(KernelError::ReadOnlyDatabase)
    }

    fn node_delete(&self, _st: &mut KernelStatement, _node: NodeId) -> Result<()> {
        Err(KernelError::ReadOnlyDatabase)
    }

    fn relationship_create(
        &self,
        _st: &mut KernelStatement,
        _ty: TypeId,
        _start: NodeId,
        _end: NodeId,
    ) -> Result<RelId> {
        Err(KernelError::ReadOnlyDatabase)
    }

    fn relationship_delete(&self, _st: &mut KernelStatement, _relationship: RelId) -> Result<()> {
        Err(KernelError::ReadOnlyDatabase)
    }

    fn node_add_label(
        &self,
        _st: &mut KernelStatement,
        _node: NodeId,
        _label: LabelId,
    ) -> Result<bool> {
        Err(KernelError::ReadOnlyDatabase)
    }

    fn node_remove_label(
        &self,
        _st: &mut KernelStatement,
        _node: NodeId,
        _label: LabelId,
    ) -> Result<bool> {
        Err(KernelError::ReadOnlyDatabase)
    }

    fn node_set_property(
        &self,
        _st: &mut KernelStatement,
        _node: NodeId,
        _property: Property,
    ) -> Result<Option<PropertyValue>> {
        Err(KernelError::ReadOnlyDatabase)
    }

    fn node_remove_property(
        &self,
        _st: &mut KernelStatement,
        _node: NodeId,
        _key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        Err(KernelError::ReadOnlyDatabase)
    }

    fn relationship_set_property(
        &self,
        _st: &mut KernelStatement,
        _relationship: RelId,
        _property: Property,
    ) -> Result<Option<PropertyValue>> {
        Err(KernelError::ReadOnlyDatabase)
    }

    fn relationship_remove_property(
        &self,
        _st: &mut KernelStatement,
        _relationship: RelId,
        _key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        Err(KernelError::ReadOnlyDatabase)
    }
}

impl SchemaWriteOps for ReadOnlyLayer {
    fn index_create(
        &self,
        _st: &mut KernelStatement,
        _label: LabelId,
        _key: PropKeyId,
    ) -> Result<IndexDescriptor> {
        Err(KernelError::ReadOnlyDatabase)
    }

    fn index_drop(&self, _st: &mut KernelStatement, _index: IndexDescriptor) -> Result<()> {
        Err(KernelError::ReadOnlyDatabase)
    }

    fn uniqueness_constraint_create(
        &self,
        _st: &mut KernelStatement,
        _label: LabelId,
        _key: PropKeyId,
    ) -> Result<UniquenessConstraint> {
        Err(KernelError::ReadOnlyDatabase)
    }

    fn constraint_drop(
        &self,
        _st: &mut KernelStatement,
        _constraint: UniquenessConstraint,
    ) -> Result<()> {
        Err(KernelError::ReadOnlyDatabase)
    }
}

impl KeyWriteOps for ReadOnlyLayer {
    fn token_get_or_create_for_name(
        &self,
        _st: &mut KernelStatement,
        _kind: TokenKind,
        _name: &str,
    ) -> Result<u32> {
        Err(KernelError::ReadOnlyDatabase)
    }
}
