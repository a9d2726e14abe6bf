//! Caller-facing views over the operations stack.
//!
//! Every call first asserts that the owning statement is still open. Sentinel ids produced
//! by failed token lookups (`NO_SUCH_LABEL`, `NO_SUCH_PROPERTY_KEY`, ...) short-circuit to
//! an empty answer without reaching the layers.

use std::any::Any;
use std::sync::Arc;

use crate::api::{KernelStatement, SchemaStateValue, StatementOperationParts};
use crate::schema::{IndexDescriptor, IndexState, UniquenessConstraint};
use crate::store::IndexFailure;
use crate::types::{
    Direction, KernelError, LabelId, NodeId, PropKeyId, RelId, RelationshipData, Result, RuleId,
    TokenKind, TypeId, NO_SUCH_LABEL, NO_SUCH_NODE, NO_SUCH_PROPERTY_KEY,
    NO_SUCH_RELATIONSHIP, NO_SUCH_RELATIONSHIP_TYPE,
};
use crate::value::{Property, PropertyValue};

/// Reads of data, schema, tokens and schema state.
pub struct ReadOperations<'a> {
    parts: &'a StatementOperationParts,
    st: &'a mut KernelStatement,
}

impl<'a> ReadOperations<'a> {
    pub(crate) fn new(parts: &'a StatementOperationParts, st: &'a mut KernelStatement) -> Self {
        Self { parts, st }
    }

    /// Whether the node exists as seen by this transaction.
    pub fn node_exists(&mut self, node: NodeId) -> Result<bool> {
        self.st.assert_open()?;
        if node == NO_SUCH_NODE {
            return Ok(false);
        }
        self.parts.entity_read().node_exists(self.st, node)
    }

    /// Whether the relationship exists as seen by this transaction.
    pub fn relationship_exists(&mut self, relationship: RelId) -> Result<bool> {
        self.st.assert_open()?;
        if relationship == NO_SUCH_RELATIONSHIP {
            return Ok(false);
        }
        self.parts
            .entity_read()
            .relationship_exists(self.st, relationship)
    }

    /// Whether the node carries `label`.
    pub fn node_has_label(&mut self, node: NodeId, label: LabelId) -> Result<bool> {
        self.st.assert_open()?;
        if label == NO_SUCH_LABEL {
            return Ok(false);
        }
        self.parts.entity_read().node_has_label(self.st, node, label)
    }

    /// Labels of the node, ascending.
    pub fn node_get_labels(&mut self, node: NodeId) -> Result<Vec<LabelId>> {
        self.st.assert_open()?;
        self.parts.entity_read().node_get_labels(self.st, node)
    }

    /// Nodes carrying `label`.
    pub fn nodes_get_for_label(&mut self, label: LabelId) -> Result<Vec<NodeId>> {
        self.st.assert_open()?;
        if label == NO_SUCH_LABEL {
            return Ok(Vec::new());
        }
        self.parts.entity_read().nodes_get_for_label(self.st, label)
    }

    /// Every node.
    pub fn nodes_get_all(&mut self) -> Result<Vec<NodeId>> {
        self.st.assert_open()?;
        self.parts.entity_read().nodes_get_all(self.st)
    }

    /// Every relationship.
    pub fn relationships_get_all(&mut self) -> Result<Vec<RelId>> {
        self.st.assert_open()?;
        self.parts.entity_read().relationships_get_all(self.st)
    }

    /// Value of one node property.
    pub fn node_get_property(
        &mut self,
        node: NodeId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        self.st.assert_open()?;
        if key == NO_SUCH_PROPERTY_KEY {
            return Ok(None);
        }
        self.parts.entity_read().node_get_property(self.st, node, key)
    }

    /// Every property of the node.
    pub fn node_get_all_properties(&mut self, node: NodeId) -> Result<Vec<Property>> {
        self.st.assert_open()?;
        self.parts
            .entity_read()
            .node_get_all_properties(self.st, node)
    }

    /// Value of one relationship property.
    pub fn relationship_get_property(
        &mut self,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        self.st.assert_open()?;
        if key == NO_SUCH_PROPERTY_KEY {
            return Ok(None);
        }
        self.parts
            .entity_read()
            .relationship_get_property(self.st, relationship, key)
    }

    /// Every property of the relationship.
    pub fn relationship_get_all_properties(&mut self, relationship: RelId) -> Result<Vec<Property>> {
        self.st.assert_open()?;
        self.parts
            .entity_read()
            .relationship_get_all_properties(self.st, relationship)
    }

    /// Relationships of the node in `direction`; an empty `types` matches all types.
    pub fn node_get_relationships(
        &mut self,
        node: NodeId,
        direction: Direction,
        types: &[TypeId],
    ) -> Result<Vec<RelationshipData>> {
        self.st.assert_open()?;
        self.parts
            .entity_read()
            .node_get_relationships(self.st, node, direction, types)
    }

    /// Number of relationships of the node in `direction`, optionally of one type.
    pub fn node_get_degree(
        &mut self,
        node: NodeId,
        direction: Direction,
        ty: Option<TypeId>,
    ) -> Result<u64> {
        self.st.assert_open()?;
        if ty == Some(NO_SUCH_RELATIONSHIP_TYPE) {
            return Ok(0);
        }
        self.parts
            .entity_read()
            .node_get_degree(self.st, node, direction, ty)
    }

    /// Types of the node's relationships.
    pub fn node_get_relationship_types(&mut self, node: NodeId) -> Result<Vec<TypeId>> {
        self.st.assert_open()?;
        self.parts
            .entity_read()
            .node_get_relationship_types(self.st, node)
    }

    /// Type and endpoints of the relationship.
    pub fn relationship_get_data(&mut self, relationship: RelId) -> Result<RelationshipData> {
        self.st.assert_open()?;
        self.parts
            .entity_read()
            .relationship_get_data(self.st, relationship)
    }

    /// Nodes whose indexed property equals `value`.
    pub fn nodes_get_from_index_seek(
        &mut self,
        index: IndexDescriptor,
        value: &PropertyValue,
    ) -> Result<Vec<NodeId>> {
        self.st.assert_open()?;
        self.parts
            .entity_read()
            .nodes_get_from_index_seek(self.st, index, value)
    }

    /// Every node in the index.
    pub fn nodes_get_from_index_scan(&mut self, index: IndexDescriptor) -> Result<Vec<NodeId>> {
        self.st.assert_open()?;
        self.parts
            .entity_read()
            .nodes_get_from_index_scan(self.st, index)
    }

    /// The node holding `value` in a unique index, or `NO_SUCH_NODE`.
    ///
    /// On return the transaction holds a lock on the index entry: shared when a node was
    /// found, exclusive when none was.
    pub fn node_get_from_unique_index_seek(
        &mut self,
        index: IndexDescriptor,
        value: &PropertyValue,
    ) -> Result<NodeId> {
        self.st.assert_open()?;
        self.parts
            .entity_read()
            .node_get_from_unique_index_seek(self.st, index, value)
    }

    /// Number of nodes, optionally restricted to one label.
    pub fn count_nodes(&mut self, label: Option<LabelId>) -> Result<i64> {
        self.st.assert_open()?;
        if label == Some(NO_SUCH_LABEL) {
            return Ok(0);
        }
        self.parts.entity_read().count_nodes(self.st, label)
    }

    /// Number of relationships matching `(start)-[ty]->(end)`; `None` matches anything.
    pub fn count_relationships(
        &mut self,
        start: Option<LabelId>,
        ty: Option<TypeId>,
        end: Option<LabelId>,
    ) -> Result<i64> {
        self.st.assert_open()?;
        if start == Some(NO_SUCH_LABEL)
            || end == Some(NO_SUCH_LABEL)
            || ty == Some(NO_SUCH_RELATIONSHIP_TYPE)
        {
            return Ok(0);
        }
        self.parts
            .entity_read()
            .count_relationships(self.st, start, ty, end)
    }

    /// The index on `(label, key)`.
    pub fn index_get_for_label_and_property_key(
        &mut self,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<IndexDescriptor> {
        self.st.assert_open()?;
        if label == NO_SUCH_LABEL || key == NO_SUCH_PROPERTY_KEY {
            return Err(KernelError::IndexNotFound(IndexDescriptor::new(label, key)));
        }
        self.parts
            .schema_read()
            .index_get_for_label_and_property_key(self.st, label, key)
    }

    /// Plain indexes on `label`.
    pub fn indexes_get_for_label(&mut self, label: LabelId) -> Result<Vec<IndexDescriptor>> {
        self.st.assert_open()?;
        if label == NO_SUCH_LABEL {
            return Ok(Vec::new());
        }
        self.parts.schema_read().indexes_get_for_label(self.st, label)
    }

    /// Every plain index.
    pub fn indexes_get_all(&mut self) -> Result<Vec<IndexDescriptor>> {
        self.st.assert_open()?;
        self.parts.schema_read().indexes_get_all(self.st)
    }

    /// Constraint-backing indexes on `label`.
    pub fn unique_indexes_get_for_label(
        &mut self,
        label: LabelId,
    ) -> Result<Vec<IndexDescriptor>> {
        self.st.assert_open()?;
        if label == NO_SUCH_LABEL {
            return Ok(Vec::new());
        }
        self.parts
            .schema_read()
            .unique_indexes_get_for_label(self.st, label)
    }

    /// Every constraint-backing index.
    pub fn unique_indexes_get_all(&mut self) -> Result<Vec<IndexDescriptor>> {
        self.st.assert_open()?;
        self.parts.schema_read().unique_indexes_get_all(self.st)
    }

    /// Population state of the index.
    pub fn index_get_state(&mut self, index: IndexDescriptor) -> Result<IndexState> {
        self.st.assert_open()?;
        self.parts.schema_read().index_get_state(self.st, index)
    }

    /// Why population of the index failed, if it did.
    pub fn index_get_failure(&mut self, index: IndexDescriptor) -> Result<Option<IndexFailure>> {
        self.st.assert_open()?;
        self.parts.schema_read().index_get_failure(self.st, index)
    }

    /// Rule id of the constraint owning the index.
    pub fn index_get_owning_uniqueness_constraint_id(
        &mut self,
        index: IndexDescriptor,
    ) -> Result<Option<RuleId>> {
        self.st.assert_open()?;
        self.parts
            .schema_read()
            .index_get_owning_uniqueness_constraint_id(self.st, index)
    }

    /// Constraints on `(label, key)`.
    pub fn constraints_get_for_label_and_property_key(
        &mut self,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<Vec<UniquenessConstraint>> {
        self.st.assert_open()?;
        if label == NO_SUCH_LABEL || key == NO_SUCH_PROPERTY_KEY {
            return Ok(Vec::new());
        }
        self.parts
            .schema_read()
            .constraints_get_for_label_and_property_key(self.st, label, key)
    }

    /// Constraints on `label`.
    pub fn constraints_get_for_label(
        &mut self,
        label: LabelId,
    ) -> Result<Vec<UniquenessConstraint>> {
        self.st.assert_open()?;
        if label == NO_SUCH_LABEL {
            return Ok(Vec::new());
        }
        self.parts
            .schema_read()
            .constraints_get_for_label(self.st, label)
    }

    /// Every constraint.
    pub fn constraints_get_all(&mut self) -> Result<Vec<UniquenessConstraint>> {
        self.st.assert_open()?;
        self.parts.schema_read().constraints_get_all(self.st)
    }

    /// Label id for `name`, or `NO_SUCH_LABEL`.
    pub fn label_get_for_name(&mut self, name: &str) -> Result<LabelId> {
        self.token_for_name(TokenKind::Label, name).map(LabelId)
    }

    /// Name of a label.
    pub fn label_get_name(&mut self, label: LabelId) -> Result<String> {
        self.token_name(TokenKind::Label, label.0)
    }

    /// Every label token.
    pub fn labels_get_all(&mut self) -> Result<Vec<(LabelId, String)>> {
        Ok(self
            .tokens_all(TokenKind::Label)?
            .into_iter()
            .map(|(id, name)| (LabelId(id), name))
            .collect())
    }

    /// Property key id for `name`, or `NO_SUCH_PROPERTY_KEY`.
    pub fn property_key_get_for_name(&mut self, name: &str) -> Result<PropKeyId> {
        self.token_for_name(TokenKind::PropertyKey, name)
            .map(PropKeyId)
    }

    /// Name of a property key.
    pub fn property_key_get_name(&mut self, key: PropKeyId) -> Result<String> {
        self.token_name(TokenKind::PropertyKey, key.0)
    }

    /// Every property key token.
    pub fn property_keys_get_all(&mut self) -> Result<Vec<(PropKeyId, String)>> {
        Ok(self
            .tokens_all(TokenKind::PropertyKey)?
            .into_iter()
            .map(|(id, name)| (PropKeyId(id), name))
            .collect())
    }

    /// Relationship type id for `name`, or `NO_SUCH_RELATIONSHIP_TYPE`.
    pub fn relationship_type_get_for_name(&mut self, name: &str) -> Result<TypeId> {
        self.token_for_name(TokenKind::RelationshipType, name)
            .map(TypeId)
    }

    /// Name of a relationship type.
    pub fn relationship_type_get_name(&mut self, ty: TypeId) -> Result<String> {
        self.token_name(TokenKind::RelationshipType, ty.0)
    }

    /// Every relationship type token.
    pub fn relationship_types_get_all(&mut self) -> Result<Vec<(TypeId, String)>> {
        Ok(self
            .tokens_all(TokenKind::RelationshipType)?
            .into_iter()
            .map(|(id, name)| (TypeId(id), name))
            .collect())
    }

    fn token_for_name(&mut self, kind: TokenKind, name: &str) -> Result<u32> {
        self.st.assert_open()?;
        self.parts.key_read().token_get_for_name(self.st, kind, name)
    }

    fn token_name(&mut self, kind: TokenKind, id: u32) -> Result<String> {
        self.st.assert_open()?;
        self.parts.key_read().token_get_name(self.st, kind, id)
    }

    fn tokens_all(&mut self, kind: TokenKind) -> Result<Vec<(u32, String)>> {
        self.st.assert_open()?;
        self.parts.key_read().tokens_get_all(self.st, kind)
    }

    /// Schema-derived value cached under `key`, computed by `create` when absent.
    ///
    /// Fails with [`KernelError::Invariant`] if the cached value has another type.
    pub fn schema_state_get_or_create<T, F>(&mut self, key: &str, create: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        self.st.assert_open()?;
        let mut create = Some(create);
        let mut factory = || -> SchemaStateValue {
            match create.take() {
                Some(create) => Arc::new(create()),
                None => Arc::new(()),
            }
        };
        let value = self
            .parts
            .schema_state()
            .schema_state_get_or_create(self.st, key, &mut factory)?;
        value
            .downcast::<T>()
            .map_err(|_| KernelError::Invariant(format!("schema state entry {key:?} has another type")))
    }

    /// Whether `key` is cached in the schema state.
    pub fn schema_state_contains(&mut self, key: &str) -> Result<bool> {
        self.st.assert_open()?;
        self.parts
            .schema_state()
            .schema_state_contains(self.st, key)
    }

    /// Drops every schema state entry.
    pub fn schema_state_flush(&mut self) -> Result<()> {
        self.st.assert_open()?;
        self.parts.schema_state().schema_state_flush(self.st)
    }
}

/// Node and relationship writes. Obtaining this view marks the transaction as a data
/// writer.
pub struct DataWriteOperations<'a> {
    parts: &'a StatementOperationParts,
    st: &'a mut KernelStatement,
}

impl<'a> DataWriteOperations<'a> {
    pub(crate) fn new(
        parts: &'a StatementOperationParts,
        st: &'a mut KernelStatement,
    ) -> Result<Self> {
        st.assert_open()?;
        st.upgrade_to_data_write()?;
        Ok(Self { parts, st })
    }

    /// Creates a node.
    pub fn node_create(&mut self) -> Result<NodeId> {
        self.st.assert_open()?;
        self.parts.entity_write().node_create(self.st)
    }

    /// Deletes a node. The node must have no relationships by commit time.
    pub fn node_delete(&mut self, node: NodeId) -> Result<()> {
        self.st.assert_open()?;
        self.parts.entity_write().node_delete(self.st, node)
    }

    /// Creates a relationship `start -[ty]-> end`.
    pub fn relationship_create(&mut self, ty: TypeId, start: NodeId, end: NodeId) -> Result<RelId> {
        self.st.assert_open()?;
        self.parts
            .entity_write()
            .relationship_create(self.st, ty, start, end)
    }

    /// Deletes a relationship.
    pub fn relationship_delete(&mut self, relationship: RelId) -> Result<()> {
        self.st.assert_open()?;
        self.parts
            .entity_write()
            .relationship_delete(self.st, relationship)
    }

    /// Adds a label; `false` if the node already had it.
    pub fn node_add_label(&mut self, node: NodeId, label: LabelId) -> Result<bool> {
        self.st.assert_open()?;
        self.parts.entity_write().node_add_label(self.st, node, label)
    }

    /// Removes a label; `false` if the node did not have it.
    pub fn node_remove_label(&mut self, node: NodeId, label: LabelId) -> Result<bool> {
        self.st.assert_open()?;
        if label == NO_SUCH_LABEL {
            return Ok(false);
        }
        self.parts
            .entity_write()
            .node_remove_label(self.st, node, label)
    }

    /// Sets a node property, returning the previous value.
    pub fn node_set_property(
        &mut self,
        node: NodeId,
        property: Property,
    ) -> Result<Option<PropertyValue>> {
        self.st.assert_open()?;
        self.parts
            .entity_write()
            .node_set_property(self.st, node, property)
    }

    /// Removes a node property, returning the previous value.
    pub fn node_remove_property(
        &mut self,
        node: NodeId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        self.st.assert_open()?;
        if key == NO_SUCH_PROPERTY_KEY {
            return Ok(None);
        }
        self.parts
            .entity_write()
            .node_remove_property(self.st, node, key)
    }

    /// Sets a relationship property, returning the previous value.
    pub fn relationship_set_property(
        &mut self,
        relationship: RelId,
        property: Property,
    ) -> Result<Option<PropertyValue>> {
        self.st.assert_open()?;
        self.parts
            .entity_write()
            .relationship_set_property(self.st, relationship, property)
    }

    /// Removes a relationship property, returning the previous value.
    pub fn relationship_remove_property(
        &mut self,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        self.st.assert_open()?;
        if key == NO_SUCH_PROPERTY_KEY {
            return Ok(None);
        }
        self.parts
            .entity_write()
            .relationship_remove_property(self.st, relationship, key)
    }
}

/// Index and constraint writes. Obtaining this view marks the transaction as a schema
/// writer.
pub struct SchemaWriteOperations<'a> {
    parts: &'a StatementOperationParts,
    st: &'a mut KernelStatement,
}

impl<'a> SchemaWriteOperations<'a> {
    pub(crate) fn new(
        parts: &'a StatementOperationParts,
        st: &'a mut KernelStatement,
    ) -> Result<Self> {
        st.assert_open()?;
        st.upgrade_to_schema_write()?;
        Ok(Self { parts, st })
    }

    /// Creates a plain index on `(label, key)`.
    pub fn index_create(&mut self, label: LabelId, key: PropKeyId) -> Result<IndexDescriptor> {
        self.st.assert_open()?;
        self.parts.schema_write().index_create(self.st, label, key)
    }

    /// Drops a plain index.
    pub fn index_drop(&mut self, index: IndexDescriptor) -> Result<()> {
        self.st.assert_open()?;
        self.parts.schema_write().index_drop(self.st, index)
    }

    /// Creates a uniqueness constraint on `(label, key)` together with its backing index.
    pub fn uniqueness_constraint_create(
        &mut self,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<UniquenessConstraint> {
        self.st.assert_open()?;
        self.parts
            .schema_write()
            .uniqueness_constraint_create(self.st, label, key)
    }

    /// Drops a uniqueness constraint and its backing index.
    pub fn constraint_drop(&mut self, constraint: UniquenessConstraint) -> Result<()> {
        self.st.assert_open()?;
        self.parts
            .schema_write()
            .constraint_drop(self.st, constraint)
    }
}

/// Token creation. Tokens are committed immediately and do not change the transaction
/// type.
pub struct TokenWriteOperations<'a> {
    parts: &'a StatementOperationParts,
    st: &'a mut KernelStatement,
}

impl<'a> TokenWriteOperations<'a> {
    pub(crate) fn new(parts: &'a StatementOperationParts, st: &'a mut KernelStatement) -> Self {
        Self { parts, st }
    }

    /// Label id for `name`, creating the label if needed.
    pub fn label_get_or_create_for_name(&mut self, name: &str) -> Result<LabelId> {
        self.get_or_create(TokenKind::Label, name).map(LabelId)
    }

    /// Property key id for `name`, creating the key if needed.
    pub fn property_key_get_or_create_for_name(&mut self, name: &str) -> Result<PropKeyId> {
        self.get_or_create(TokenKind::PropertyKey, name)
            .map(PropKeyId)
    }

    /// Relationship type id for `name`, creating the type if needed.
    pub fn relationship_type_get_or_create_for_name(&mut self, name: &str) -> Result<TypeId> {
        self.get_or_create(TokenKind::RelationshipType, name)
            .map(TypeId)
    }

    fn get_or_create(&mut self, kind: TokenKind, name: &str) -> Result<u32> {
        self.st.assert_open()?;
        self.parts
            .key_write()
            .token_get_or_create_for_name(self.st, kind, name)
    }
}
