use std::any::Any;
use std::sync::Arc;

use crate::api::KernelStatement;
use crate::schema::{IndexDescriptor, IndexState, UniquenessConstraint};
use crate::store::IndexFailure;
use crate::types::{
    Direction, LabelId, NodeId, PropKeyId, RelId, RelationshipData, Result, RuleId, TokenKind,
    TypeId,
};
use crate::value::{Property, PropertyValue};

/// Value cached in the shared schema state.
pub type SchemaStateValue = Arc<dyn Any + Send + Sync>;

/// Reads of nodes, relationships, their labels and properties, and index lookups.
pub trait EntityReadOps: Send + Sync {
    /// Whether `node` exists as seen by the transaction.
    fn node_exists(&self, st: &mut KernelStatement, node: NodeId) -> Result<bool>;
    /// Whether `relationship` exists as seen by the transaction.
    fn relationship_exists(&self, st: &mut KernelStatement, relationship: RelId) -> Result<bool>;
    /// Whether `node` carries `label`.
    fn node_has_label(&self, st: &mut KernelStatement, node: NodeId, label: LabelId)
        -> Result<bool>;
    /// Labels of `node`, ascending.
    fn node_get_labels(&self, st: &mut KernelStatement, node: NodeId) -> Result<Vec<LabelId>>;
    /// Nodes carrying `label`, ascending.
    fn nodes_get_for_label(&self, st: &mut KernelStatement, label: LabelId) -> Result<Vec<NodeId>>;
    /// Every node.
    fn nodes_get_all(&self, st: &mut KernelStatement) -> Result<Vec<NodeId>>;
    /// Every relationship.
    fn relationships_get_all(&self, st: &mut KernelStatement) -> Result<Vec<RelId>>;
    /// Value of `key` on `node`.
    fn node_get_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>>;
    /// Every property of `node`, ordered by key.
    fn node_get_all_properties(&self, st: &mut KernelStatement, node: NodeId)
        -> Result<Vec<Property>>;
    /// Value of `key` on `relationship`.
    fn relationship_get_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>>;
    /// Every property of `relationship`, ordered by key.
    fn relationship_get_all_properties(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
    ) -> Result<Vec<Property>>;
    /// Relationships of `node` in `direction` with one of `types` (all when empty).
    fn node_get_relationships(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        direction: Direction,
        types: &[TypeId],
    ) -> Result<Vec<RelationshipData>>;
    /// Degree of `node` in `direction`, optionally of one type.
    fn node_get_degree(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        direction: Direction,
        ty: Option<TypeId>,
    ) -> Result<u64>;
    /// Relationship types present at `node`, ascending.
    fn node_get_relationship_types(&self, st: &mut KernelStatement, node: NodeId)
        -> Result<Vec<TypeId>>;
    /// Type and endpoints of `relationship`.
    fn relationship_get_data(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
    ) -> Result<RelationshipData>;
    /// Nodes whose indexed value equals `value`.
    fn nodes_get_from_index_seek(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
        value: &PropertyValue,
    ) -> Result<Vec<NodeId>>;
    /// Every node in the index.
    fn nodes_get_from_index_scan(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<Vec<NodeId>>;
    /// The single node a unique index holds under `value`, or
    /// [`NO_SUCH_NODE`](crate::types::NO_SUCH_NODE).
    fn node_get_from_unique_index_seek(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
        value: &PropertyValue,
    ) -> Result<NodeId>;
    /// Number of nodes with `label` (all nodes when `None`).
    fn count_nodes(&self, st: &mut KernelStatement, label: Option<LabelId>) -> Result<i64>;
    /// Number of relationships matching the pattern.
    fn count_relationships(
        &self,
        st: &mut KernelStatement,
        start: Option<LabelId>,
        ty: Option<TypeId>,
        end: Option<LabelId>,
    ) -> Result<i64>;
}

/// Mutations of nodes, relationships, labels and properties.
pub trait EntityWriteOps: Send + Sync {
    /// Creates a node.
    fn node_create(&self, st: &mut KernelStatement) -> Result<NodeId>;
    /// Deletes `node`.
    fn node_delete(&self, st: &mut KernelStatement, node: NodeId) -> Result<()>;
    /// Creates a relationship of type `ty` from `start` to `end`.
    fn relationship_create(
        &self,
        st: &mut KernelStatement,
        ty: TypeId,
        start: NodeId,
        end: NodeId,
    ) -> Result<RelId>;
    /// Deletes `relationship`.
    fn relationship_delete(&self, st: &mut KernelStatement, relationship: RelId) -> Result<()>;
    /// Adds `label` to `node`; `false` if it was already there.
    fn node_add_label(&self, st: &mut KernelStatement, node: NodeId, label: LabelId)
        -> Result<bool>;
    /// Removes `label` from `node`; `false` if it was not there.
    fn node_remove_label(&self, st: &mut KernelStatement, node: NodeId, label: LabelId)
        -> Result<bool>;
    /// Sets a property on `node`, returning the previous value.
    fn node_set_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        property: Property,
    ) -> Result<Option<PropertyValue>>;
    /// Removes `key` from `node`, returning the previous value.
    fn node_remove_property(
        &self,
        st: &mut KernelStatement,
        node: NodeId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>>;
    /// Sets a property on `relationship`, returning the previous value.
    fn relationship_set_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        property: Property,
    ) -> Result<Option<PropertyValue>>;
    /// Removes `key` from `relationship`, returning the previous value.
    fn relationship_remove_property(
        &self,
        st: &mut KernelStatement,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>>;
}

/// Reads of index and constraint definitions.
pub trait SchemaReadOps: Send + Sync {
    /// The plain index on `(label, key)`, or [`KernelError::IndexNotFound`](crate::KernelError::IndexNotFound).
    fn index_get_for_label_and_property_key(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<IndexDescriptor>;
    /// Plain indexes on `label`.
    fn indexes_get_for_label(&self, st: &mut KernelStatement, label: LabelId)
        -> Result<Vec<IndexDescriptor>>;
    /// Every plain index.
    fn indexes_get_all(&self, st: &mut KernelStatement) -> Result<Vec<IndexDescriptor>>;
    /// Constraint-backing indexes on `label`.
    fn unique_indexes_get_for_label(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>>;
    /// Every constraint-backing index.
    fn unique_indexes_get_all(&self, st: &mut KernelStatement) -> Result<Vec<IndexDescriptor>>;
    /// Population state of an index.
    fn index_get_state(&self, st: &mut KernelStatement, index: IndexDescriptor)
        -> Result<IndexState>;
    /// Failure of a failed index.
    fn index_get_failure(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<Option<IndexFailure>>;
    /// Rule id of the constraint owning a constraint-backing index.
    fn index_get_owning_uniqueness_constraint_id(
        &self,
        st: &mut KernelStatement,
        index: IndexDescriptor,
    ) -> Result<Option<RuleId>>;
    /// Constraints on `(label, key)`.
    fn constraints_get_for_label_and_property_key(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<Vec<UniquenessConstraint>>;
    /// Constraints on `label`.
    fn constraints_get_for_label(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
    ) -> Result<Vec<UniquenessConstraint>>;
    /// Every constraint.
    fn constraints_get_all(&self, st: &mut KernelStatement) -> Result<Vec<UniquenessConstraint>>;
}

/// Creation and removal of indexes and constraints.
pub trait SchemaWriteOps: Send + Sync {
    /// Creates a plain index on `(label, key)`.
    fn index_create(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<IndexDescriptor>;
    /// Drops a plain index.
    fn index_drop(&self, st: &mut KernelStatement, index: IndexDescriptor) -> Result<()>;
    /// Creates a uniqueness constraint on `(label, key)` with its backing index.
    fn uniqueness_constraint_create(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<UniquenessConstraint>;
    /// Drops a uniqueness constraint and its backing index.
    fn constraint_drop(&self, st: &mut KernelStatement, constraint: UniquenessConstraint)
        -> Result<()>;
}

/// Token lookups.
pub trait KeyReadOps: Send + Sync {
    /// Id of `name`, or `u32::MAX` when it was never interned.
    fn token_get_for_name(&self, st: &mut KernelStatement, kind: TokenKind, name: &str)
        -> Result<u32>;
    /// Name of token `id`.
    fn token_get_name(&self, st: &mut KernelStatement, kind: TokenKind, id: u32)
        -> Result<String>;
    /// Every token of `kind`.
    fn tokens_get_all(&self, st: &mut KernelStatement, kind: TokenKind)
        -> Result<Vec<(u32, String)>>;
}

/// Token creation.
pub trait KeyWriteOps: Send + Sync {
    /// Id of `name`, interning it if needed.
    fn token_get_or_create_for_name(
        &self,
        st: &mut KernelStatement,
        kind: TokenKind,
        name: &str,
    ) -> Result<u32>;
}

/// Access to the process-wide schema state cache.
pub trait SchemaStateOps: Send + Sync {
    /// Cached value under `key`, computing it with `create` when absent.
    fn schema_state_get_or_create(
        &self,
        st: &mut KernelStatement,
        key: &str,
        create: &mut dyn FnMut() -> SchemaStateValue,
    ) -> Result<SchemaStateValue>;
    /// Whether `key` is cached.
    fn schema_state_contains(&self, st: &mut KernelStatement, key: &str) -> Result<bool>;
    /// Drops every cached value.
    fn schema_state_flush(&self, st: &mut KernelStatement) -> Result<()>;
}
