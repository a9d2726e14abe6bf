use crate::counts::{CountsKey, CountsValue};
use crate::schema::{ConstraintRule, IndexDescriptor, IndexRule, IndexState, UniquenessConstraint};
use crate::store::IndexFailure;
use crate::types::{
    Direction, KernelError, LabelId, NodeId, PropKeyId, RelId, RelationshipData, Result, RuleId,
    TokenKind, TxId, TypeId,
};
use crate::value::{Property, PropertyValue};

/// Committed-state access used by the bottom of the operations stack.
///
/// Every read observes only durable state and knows nothing about open transactions.
/// Besides reads, the layer hands out entity and rule ids and interns tokens, both of
/// which take effect immediately and outside any transaction.
pub trait StoreReadLayer: Send + Sync {
    /// Whether `node` exists.
    fn node_exists(&self, node: NodeId) -> bool;
    /// Labels of `node`, ascending.
    fn node_get_labels(&self, node: NodeId) -> Result<Vec<LabelId>>;
    /// Whether `node` carries `label`.
    fn node_has_label(&self, node: NodeId, label: LabelId) -> Result<bool>;
    /// Value of `key` on `node`.
    fn node_get_property(&self, node: NodeId, key: PropKeyId) -> Result<Option<PropertyValue>>;
    /// Every property of `node`, ordered by key.
    fn node_get_all_properties(&self, node: NodeId) -> Result<Vec<Property>>;
    /// Every node id, ascending.
    fn nodes_get_all(&self) -> Vec<NodeId>;
    /// Nodes carrying `label`, ascending.
    fn nodes_get_for_label(&self, label: LabelId) -> Vec<NodeId>;
    /// Relationships of `node` in `direction` with one of `types` (all when empty).
    fn node_get_relationships(
        &self,
        node: NodeId,
        direction: Direction,
        types: &[TypeId],
    ) -> Result<Vec<RelationshipData>>;
    /// Number of relationships of `node` in `direction`, optionally of one type.
    /// A loop counts once for each of its ends it matches.
    fn node_get_degree(&self, node: NodeId, direction: Direction, ty: Option<TypeId>)
        -> Result<u64>;
    /// Distinct relationship types at `node`, ascending.
    fn node_get_relationship_types(&self, node: NodeId) -> Result<Vec<TypeId>>;

    /// Whether `relationship` exists.
    fn relationship_exists(&self, relationship: RelId) -> bool;
    /// Type and endpoints of `relationship`.
    fn relationship_get_data(&self, relationship: RelId) -> Result<RelationshipData>;
    /// Value of `key` on `relationship`.
    fn relationship_get_property(
        &self,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>>;
    /// Every property of `relationship`, ordered by key.
    fn relationship_get_all_properties(&self, relationship: RelId) -> Result<Vec<Property>>;
    /// Every relationship id, ascending.
    fn relationships_get_all(&self) -> Vec<RelId>;

    /// Every index rule, plain and constraint-backing.
    fn index_rules_get_all(&self) -> Vec<IndexRule>;
    /// Index rule for `descriptor`, of either kind.
    fn index_rule(&self, descriptor: &IndexDescriptor) -> Option<IndexRule>;
    /// Every constraint rule.
    fn constraint_rules_get_all(&self) -> Vec<ConstraintRule>;
    /// Rule of `constraint`.
    fn constraint_rule(&self, constraint: &UniquenessConstraint) -> Option<ConstraintRule>;
    /// Population state of the index for `descriptor`.
    fn index_get_state(&self, descriptor: &IndexDescriptor) -> Result<IndexState>;
    /// Failure of the index for `descriptor`, if it failed.
    fn index_get_failure(&self, descriptor: &IndexDescriptor) -> Result<Option<IndexFailure>>;
    /// Nodes indexed under `value`.
    fn index_seek(&self, descriptor: &IndexDescriptor, value: &PropertyValue)
        -> Result<Vec<NodeId>>;
    /// Every indexed node.
    fn index_scan(&self, descriptor: &IndexDescriptor) -> Result<Vec<NodeId>>;

    /// Id of the token `name`, if interned.
    fn token_get_for_name(&self, kind: TokenKind, name: &str) -> Option<u32>;
    /// Id of the token `name`, interning it if needed.
    fn token_get_or_create(&self, kind: TokenKind, name: &str) -> Result<u32>;
    /// Name of token `id`.
    fn token_get_name(&self, kind: TokenKind, id: u32) -> Result<String>;
    /// Every token of `kind` in id order.
    fn tokens_get_all(&self, kind: TokenKind) -> Vec<(u32, String)>;

    /// Committed value of one counter.
    fn counts_get(&self, key: &CountsKey) -> CountsValue;
    /// Last committed transaction id.
    fn last_committed_tx(&self) -> TxId;

    /// Reserves a fresh node id.
    fn reserve_node_id(&self) -> NodeId;
    /// Reserves a fresh relationship id.
    fn reserve_relationship_id(&self) -> RelId;
    /// Reserves a fresh schema rule id.
    fn reserve_rule_id(&self) -> RuleId;
    /// Returns an unused node id.
    fn release_node_id(&self, node: NodeId);
    /// Returns an unused relationship id.
    fn release_relationship_id(&self, relationship: RelId);

    /// Plain (non-constraint) indexes on `label`.
    fn indexes_get_for_label(&self, label: LabelId) -> Vec<IndexDescriptor> {
        self.index_rules_get_all()
            .into_iter()
            .filter(|rule| !rule.is_constraint_index() && rule.descriptor.label == label)
            .map(|rule| rule.descriptor)
            .collect()
    }

    /// Constraint-backing indexes on `label`.
    fn unique_indexes_get_for_label(&self, label: LabelId) -> Vec<IndexDescriptor> {
        self.index_rules_get_all()
            .into_iter()
            .filter(|rule| rule.is_constraint_index() && rule.descriptor.label == label)
            .map(|rule| rule.descriptor)
            .collect()
    }

    /// Uniqueness constraints on `label`.
    fn constraints_get_for_label(&self, label: LabelId) -> Vec<UniquenessConstraint> {
        self.constraint_rules_get_all()
            .into_iter()
            .map(|rule| rule.constraint)
            .filter(|constraint| constraint.label == label)
            .collect()
    }

    /// Committed node count for `label` (ANY when `None`).
    fn count_nodes(&self, label: Option<LabelId>) -> i64 {
        self.counts_get(&CountsKey::node(label)).second
    }

    /// Committed relationship count for the pattern.
    fn count_relationships(
        &self,
        start: Option<LabelId>,
        ty: Option<TypeId>,
        end: Option<LabelId>,
    ) -> i64 {
        self.counts_get(&CountsKey::relationship(start, ty, end))
            .second
    }

    /// Index rule for `descriptor`, or [`KernelError::IndexNotFound`].
    fn index_rule_required(&self, descriptor: &IndexDescriptor) -> Result<IndexRule> {
        self.index_rule(descriptor)
            .ok_or(KernelError::IndexNotFound(*descriptor))
    }
}
