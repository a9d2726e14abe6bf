use std::collections::{BTreeMap, BTreeSet};

use crate::schema::{IndexDescriptor, UniquenessConstraint};
use crate::txstate::{DiffSets, PropertyDiffSets, TxStateVisitor};
use crate::types::{
    Direction, KernelError, LabelId, NodeId, PropKeyId, RelId, RelationshipData, Result, RuleId,
    TypeId,
};
use crate::value::PropertyValue;

/// Overlay state of one node.
#[derive(Clone, Debug, Default)]
pub struct NodeState {
    labels: DiffSets<LabelId>,
    properties: PropertyDiffSets,
    added_relationships: BTreeSet<RelId>,
    removed_relationships: BTreeSet<RelId>,
}

impl NodeState {
    /// Label changes.
    pub fn labels(&self) -> &DiffSets<LabelId> {
        &self.labels
    }

    /// Property changes.
    pub fn properties(&self) -> &PropertyDiffSets {
        &self.properties
    }

    /// Relationships created in this transaction touching the node.
    pub fn added_relationships(&self) -> &BTreeSet<RelId> {
        &self.added_relationships
    }

    /// Committed relationships of the node deleted in this transaction.
    pub fn removed_relationships(&self) -> &BTreeSet<RelId> {
        &self.removed_relationships
    }
}

/// Per-index pending updates, keyed by property value.
type IndexUpdates = BTreeMap<PropertyValue, DiffSets<NodeId>>;

/// Transaction-local overlay of uncommitted changes.
///
/// Owned by exactly one transaction. Only records what the transaction did; every
/// validation (existence, idempotence, uniqueness) happens in the operation layers before
/// the overlay is touched.
#[derive(Debug, Default)]
pub struct TxState {
    nodes: DiffSets<NodeId>,
    relationships: DiffSets<RelId>,
    node_states: BTreeMap<NodeId, NodeState>,
    relationship_properties: BTreeMap<RelId, PropertyDiffSets>,
    relationship_data: BTreeMap<RelId, RelationshipData>,
    label_nodes: BTreeMap<LabelId, DiffSets<NodeId>>,
    index_changes: DiffSets<IndexDescriptor>,
    constraint_index_changes: DiffSets<IndexDescriptor>,
    constraint_changes: DiffSets<UniquenessConstraint>,
    created_constraint_indexes: BTreeMap<UniquenessConstraint, RuleId>,
    index_updates: BTreeMap<IndexDescriptor, IndexUpdates>,
    has_changes: bool,
}

impl TxState {
    /// Creates an empty overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any write was recorded.
    pub fn has_changes(&self) -> bool {
        self.has_changes
    }

    /// Whether any schema change (index or constraint) was recorded.
    pub fn has_schema_changes(&self) -> bool {
        !self.index_changes.is_empty()
            || !self.constraint_index_changes.is_empty()
            || !self.constraint_changes.is_empty()
    }

    /// Whether any node or relationship change was recorded.
    pub fn has_data_changes(&self) -> bool {
        !self.nodes.is_empty()
            || !self.relationships.is_empty()
            || !self.node_states.is_empty()
            || !self.relationship_properties.is_empty()
    }

    fn node_state_mut(&mut self, node: NodeId) -> &mut NodeState {
        self.has_changes = true;
        self.node_states.entry(node).or_default()
    }

    // ---- nodes ----------------------------------------------------------------

    /// Records creation of `node`.
    pub fn node_do_create(&mut self, node: NodeId) {
        self.has_changes = true;
        self.nodes.add(node);
    }

    /// Records deletion of `node`, discarding every pending change on it.
    pub fn node_do_delete(&mut self, node: NodeId) {
        self.has_changes = true;
        self.nodes.remove(node);
        self.node_states.remove(&node);
        for diff in self.label_nodes.values_mut() {
            diff.forget(&node);
        }
        for updates in self.index_updates.values_mut() {
            for diff in updates.values_mut() {
                diff.forget(&node);
            }
        }
    }

    /// Whether `node` was created in this transaction.
    pub fn node_is_added_in_this_tx(&self, node: NodeId) -> bool {
        self.nodes.is_added(&node)
    }

    /// Whether committed `node` was deleted in this transaction.
    pub fn node_is_deleted_in_this_tx(&self, node: NodeId) -> bool {
        self.nodes.is_removed(&node)
    }

    /// Created and deleted nodes.
    pub fn added_and_removed_nodes(&self) -> &DiffSets<NodeId> {
        &self.nodes
    }

    /// Overlay state of `node`, if it was touched.
    pub fn node_state(&self, node: NodeId) -> Option<&NodeState> {
        self.node_states.get(&node)
    }

    // ---- labels ---------------------------------------------------------------

    /// Records `label` added to `node`.
    pub fn node_do_add_label(&mut self, label: LabelId, node: NodeId) {
        self.node_state_mut(node).labels.add(label);
        self.label_nodes.entry(label).or_default().add(node);
    }

    /// Records `label` removed from `node`.
    pub fn node_do_remove_label(&mut self, label: LabelId, node: NodeId) {
        self.node_state_mut(node).labels.remove(label);
        self.label_nodes.entry(label).or_default().remove(node);
    }

    /// Label diff of `node`.
    pub fn node_label_diff(&self, node: NodeId) -> Option<&DiffSets<LabelId>> {
        self.node_states.get(&node).map(|state| &state.labels)
    }

    /// Nodes that gained or lost `label`.
    pub fn nodes_with_label_changed(&self, label: LabelId) -> Option<&DiffSets<NodeId>> {
        self.label_nodes.get(&label)
    }

    /// Every label touched by this transaction with its node diff.
    pub fn label_changes(&self) -> impl Iterator<Item = (LabelId, &DiffSets<NodeId>)> {
        self.label_nodes
            .iter()
            .filter(|(_, diff)| !diff.is_empty())
            .map(|(label, diff)| (*label, diff))
    }

    // ---- properties -----------------------------------------------------------

    /// Records `key = value` on `node`; `committed` tells whether the stored node has the key.
    pub fn node_do_set_property(
        &mut self,
        node: NodeId,
        key: PropKeyId,
        value: PropertyValue,
        committed: bool,
    ) {
        self.node_state_mut(node)
            .properties
            .set(key, value, committed);
    }

    /// Records removal of `key` from `node`.
    pub fn node_do_remove_property(&mut self, node: NodeId, key: PropKeyId, committed: bool) {
        self.node_state_mut(node).properties.remove(key, committed);
    }

    /// Property diff of `node`.
    pub fn node_property_diff(&self, node: NodeId) -> Option<&PropertyDiffSets> {
        self.node_states.get(&node).map(|state| &state.properties)
    }

    /// Records `key = value` on `relationship`.
    pub fn relationship_do_set_property(
        &mut self,
        relationship: RelId,
        key: PropKeyId,
        value: PropertyValue,
        committed: bool,
    ) {
        self.has_changes = true;
        self.relationship_properties
            .entry(relationship)
            .or_default()
            .set(key, value, committed);
    }

    /// Records removal of `key` from `relationship`.
    pub fn relationship_do_remove_property(
        &mut self,
        relationship: RelId,
        key: PropKeyId,
        committed: bool,
    ) {
        self.has_changes = true;
        self.relationship_properties
            .entry(relationship)
            .or_default()
            .remove(key, committed);
    }

    /// Property diff of `relationship`.
    pub fn relationship_property_diff(&self, relationship: RelId) -> Option<&PropertyDiffSets> {
        self.relationship_properties.get(&relationship)
    }

    // ---- relationships --------------------------------------------------------

    /// Records creation of a relationship.
    pub fn relationship_do_create(&mut self, data: RelationshipData) {
        self.has_changes = true;
        self.relationships.add(data.id);
        self.relationship_data.insert(data.id, data);
        self.node_state_mut(data.start)
            .added_relationships
            .insert(data.id);
        self.node_state_mut(data.end).added_relationships.insert(data.id);
    }

    /// Records deletion of a relationship. `data` is its committed or pending shape.
    pub fn relationship_do_delete(&mut self, data: RelationshipData) {
        self.has_changes = true;
        let created_here = self.relationships.is_added(&data.id);
        self.relationships.remove(data.id);
        self.relationship_properties.remove(&data.id);
        if created_here {
            self.relationship_data.remove(&data.id);
            for node in [data.start, data.end] {
                if let Some(state) = self.node_states.get_mut(&node) {
                    state.added_relationships.remove(&data.id);
                }
            }
        } else {
            self.relationship_data.insert(data.id, data);
            // Deleted endpoints have had their state discarded already.
            for node in [data.start, data.end] {
                if !self.nodes.is_removed(&node) {
                    self.node_state_mut(node)
                        .removed_relationships
                        .insert(data.id);
                }
            }
        }
    }

    /// Whether `relationship` was created in this transaction.
    pub fn relationship_is_added_in_this_tx(&self, relationship: RelId) -> bool {
        self.relationships.is_added(&relationship)
    }

    /// Whether committed `relationship` was deleted in this transaction.
    pub fn relationship_is_deleted_in_this_tx(&self, relationship: RelId) -> bool {
        self.relationships.is_removed(&relationship)
    }

    /// Created and deleted relationships.
    pub fn added_and_removed_relationships(&self) -> &DiffSets<RelId> {
        &self.relationships
    }

    /// Shape of a relationship created or deleted in this transaction.
    pub fn relationship_data(&self, relationship: RelId) -> Option<&RelationshipData> {
        self.relationship_data.get(&relationship)
    }

    /// Relationships created in this transaction at `node` matching `direction`/`types`.
    pub fn added_relationships<'a>(
        &'a self,
        node: NodeId,
        direction: Direction,
        types: &'a [TypeId],
    ) -> impl Iterator<Item = &'a RelationshipData> + 'a {
        self.node_states
            .get(&node)
            .into_iter()
            .flat_map(|state| state.added_relationships.iter())
            .filter_map(move |rel| self.relationship_data.get(rel))
            .filter(move |data| data.matches(node, direction, types))
    }

    /// Committed relationships at `node` deleted in this transaction matching `direction`/`types`.
    pub fn removed_relationships<'a>(
        &'a self,
        node: NodeId,
        direction: Direction,
        types: &'a [TypeId],
    ) -> impl Iterator<Item = &'a RelationshipData> + 'a {
        self.node_states
            .get(&node)
            .into_iter()
            .flat_map(|state| state.removed_relationships.iter())
            .filter_map(move |rel| self.relationship_data.get(rel))
            .filter(move |data| data.matches(node, direction, types))
    }

    // ---- index updates --------------------------------------------------------

    /// Moves `node` from the `before` value to the `after` value of `descriptor`.
    pub fn index_do_update_property(
        &mut self,
        descriptor: IndexDescriptor,
        node: NodeId,
        before: Option<&PropertyValue>,
        after: Option<&PropertyValue>,
    ) {
        self.has_changes = true;
        let updates = self.index_updates.entry(descriptor).or_default();
        if let Some(before) = before {
            updates.entry(before.clone()).or_default().remove(node);
        }
        if let Some(after) = after {
            updates.entry(after.clone()).or_default().add(node);
        }
        updates.retain(|_, diff| !diff.is_empty());
    }

    /// Pending updates for an exact-match lookup.
    pub fn index_updates_for_seek(
        &self,
        descriptor: &IndexDescriptor,
        value: &PropertyValue,
    ) -> Option<&DiffSets<NodeId>> {
        self.index_updates.get(descriptor)?.get(value)
    }

    /// Pending updates for a full index scan: nodes entering and leaving the index.
    pub fn index_updates_for_scan(&self, descriptor: &IndexDescriptor) -> DiffSets<NodeId> {
        let mut entering = BTreeSet::new();
        let mut leaving = BTreeSet::new();
        if let Some(updates) = self.index_updates.get(descriptor) {
            for diff in updates.values() {
                entering.extend(diff.added().iter().copied());
                leaving.extend(diff.removed().iter().copied());
            }
        }
        let mut diff = DiffSets::new();
        for node in leaving.difference(&entering) {
            diff.remove(*node);
        }
        for node in entering {
            diff.add(node);
        }
        diff
    }

    // ---- schema ---------------------------------------------------------------

    /// Records a new plain index. Cancels a pending drop of the same index.
    pub fn index_rule_do_add(&mut self, descriptor: IndexDescriptor) {
        self.has_changes = true;
        self.index_changes.add(descriptor);
    }

    /// Records a dropped plain index.
    pub fn index_rule_do_drop(&mut self, descriptor: IndexDescriptor) {
        self.has_changes = true;
        self.index_changes.remove(descriptor);
    }

    /// Records a new constraint-backing index.
    pub fn constraint_index_rule_do_add(&mut self, descriptor: IndexDescriptor) {
        self.has_changes = true;
        self.constraint_index_changes.add(descriptor);
    }

    /// Records a dropped constraint-backing index.
    pub fn constraint_index_do_drop(&mut self, descriptor: IndexDescriptor) {
        self.has_changes = true;
        self.constraint_index_changes.remove(descriptor);
    }

    /// Undoes a pending drop of a constraint-backing index.
    pub fn constraint_index_do_un_remove(&mut self, descriptor: &IndexDescriptor) -> bool {
        self.constraint_index_changes.un_remove(descriptor)
    }

    /// Records a new uniqueness constraint backed by index rule `index`.
    pub fn constraint_do_add(&mut self, constraint: UniquenessConstraint, index: RuleId) {
        self.has_changes = true;
        self.constraint_changes.add(constraint);
        self.created_constraint_indexes.insert(constraint, index);
    }

    /// Records a dropped constraint.
    ///
    /// A constraint added in this transaction is forgotten together with its entry in
    /// [`constraint_indexes_created_in_tx`](Self::constraint_indexes_created_in_tx); the
    /// caller drops that index by rule id. A committed constraint is staged for removal
    /// along with its backing index.
    pub fn constraint_do_drop(&mut self, constraint: UniquenessConstraint) {
        self.has_changes = true;
        self.constraint_changes.remove(constraint);
        if self.created_constraint_indexes.remove(&constraint).is_none() {
            self.constraint_index_do_drop(constraint.index_descriptor());
        }
    }

    /// Undoes a pending drop of a constraint.
    pub fn constraint_do_un_remove(&mut self, constraint: &UniquenessConstraint) -> bool {
        self.constraint_changes.un_remove(constraint)
    }

    /// Plain index changes.
    pub fn index_diff(&self) -> &DiffSets<IndexDescriptor> {
        &self.index_changes
    }

    /// Constraint index changes.
    pub fn constraint_index_diff(&self) -> &DiffSets<IndexDescriptor> {
        &self.constraint_index_changes
    }

    /// Constraint changes.
    pub fn constraint_diff(&self) -> &DiffSets<UniquenessConstraint> {
        &self.constraint_changes
    }

    /// Index rule built for `constraint` in this transaction, if it was added here.
    pub fn constraint_index_created_in_tx(&self, constraint: &UniquenessConstraint) -> Option<RuleId> {
        self.created_constraint_indexes.get(constraint).copied()
    }

    /// Constraint indexes built for constraints added in this transaction.
    pub fn constraint_indexes_created_in_tx(
        &self,
    ) -> impl Iterator<Item = (UniquenessConstraint, RuleId)> + '_ {
        self.created_constraint_indexes
            .iter()
            .map(|(constraint, rule)| (*constraint, *rule))
    }

    // ---- traversal ------------------------------------------------------------

    /// Feeds every change to `visitor` in commit order.
    pub fn accept<V: TxStateVisitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        for node in self.nodes.added() {
            visitor.visit_created_node(*node)?;
        }
        for rel in self.relationships.added() {
            visitor.visit_created_relationship(self.data_of(*rel)?)?;
        }
        for (node, state) in &self.node_states {
            if !state.labels.is_empty() {
                visitor.visit_node_label_changes(
                    *node,
                    state.labels.added(),
                    state.labels.removed(),
                )?;
            }
        }
        for (node, state) in &self.node_states {
            if !state.properties.is_empty() {
                visitor.visit_node_property_changes(*node, &state.properties)?;
            }
        }
        for (rel, changes) in &self.relationship_properties {
            if !changes.is_empty() {
                visitor.visit_relationship_property_changes(*rel, changes)?;
            }
        }
        for rel in self.relationships.removed() {
            visitor.visit_deleted_relationship(self.data_of(*rel)?)?;
        }
        for node in self.nodes.removed() {
            visitor.visit_deleted_node(*node)?;
        }
        for descriptor in self.index_changes.added() {
            visitor.visit_added_index(*descriptor, false)?;
        }
        for descriptor in self.constraint_index_changes.added() {
            visitor.visit_added_index(*descriptor, true)?;
        }
        for descriptor in self.index_changes.removed() {
            visitor.visit_removed_index(*descriptor, false)?;
        }
        for descriptor in self.constraint_index_changes.removed() {
            visitor.visit_removed_index(*descriptor, true)?;
        }
        for constraint in self.constraint_changes.added() {
            visitor.visit_added_constraint(*constraint)?;
        }
        for constraint in self.constraint_changes.removed() {
            visitor.visit_removed_constraint(*constraint)?;
        }
        Ok(())
    }

    fn data_of(&self, rel: RelId) -> Result<&RelationshipData> {
        self.relationship_data
            .get(&rel)
            .ok_or_else(|| KernelError::Invariant(format!("relationship {rel} has no recorded shape")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl TxStateVisitor for Recorder {
        fn visit_created_node(&mut self, node: NodeId) -> Result<()> {
            self.events.push(format!("+node {node}"));
            Ok(())
        }
        fn visit_deleted_node(&mut self, node: NodeId) -> Result<()> {
            self.events.push(format!("-node {node}"));
            Ok(())
        }
        fn visit_node_label_changes(
            &mut self,
            node: NodeId,
            added: &BTreeSet<LabelId>,
            removed: &BTreeSet<LabelId>,
        ) -> Result<()> {
            self.events
                .push(format!("labels {node} +{} -{}", added.len(), removed.len()));
            Ok(())
        }
        fn visit_added_index(&mut self, d: IndexDescriptor, constraint: bool) -> Result<()> {
            self.events.push(format!("+index {} {constraint}", d.label));
            Ok(())
        }
        fn visit_removed_index(&mut self, d: IndexDescriptor, constraint: bool) -> Result<()> {
            self.events.push(format!("-index {} {constraint}", d.label));
            Ok(())
        }
        fn visit_added_constraint(&mut self, c: UniquenessConstraint) -> Result<()> {
            self.events.push(format!("+constraint {}", c.label));
            Ok(())
        }
    }

    #[test]
    fn deleting_a_created_node_discards_everything() {
        let mut tx = TxState::new();
        let node = NodeId(7);
        tx.node_do_create(node);
        tx.node_do_add_label(LabelId(1), node);
        tx.node_do_set_property(node, PropKeyId(2), PropertyValue::Int(3), false);
        tx.index_do_update_property(
            IndexDescriptor::new(LabelId(1), PropKeyId(2)),
            node,
            None,
            Some(&PropertyValue::Int(3)),
        );
        tx.node_do_delete(node);

        assert!(tx.has_changes());
        assert!(!tx.has_data_changes());
        assert!(tx.node_state(node).is_none());
        let descriptor = IndexDescriptor::new(LabelId(1), PropKeyId(2));
        let seek = tx.index_updates_for_seek(&descriptor, &PropertyValue::Int(3));
        assert!(seek.map_or(true, DiffSets::is_empty));
    }

    #[test]
    fn relationship_created_and_deleted_leaves_no_trace() {
        let mut tx = TxState::new();
        let data = RelationshipData {
            id: RelId(1),
            ty: TypeId(0),
            start: NodeId(1),
            end: NodeId(2),
        };
        tx.relationship_do_create(data);
        assert_eq!(tx.added_relationships(NodeId(2), Direction::Incoming, &[]).count(), 1);
        tx.relationship_do_delete(data);
        assert!(tx.added_and_removed_relationships().is_empty());
        assert_eq!(tx.added_relationships(NodeId(1), Direction::Both, &[]).count(), 0);
        assert!(tx.relationship_data(RelId(1)).is_none());
    }

    #[test]
    fn value_change_moves_node_between_index_entries() {
        let mut tx = TxState::new();
        let descriptor = IndexDescriptor::new(LabelId(1), PropKeyId(1));
        let a = PropertyValue::from("a");
        let b = PropertyValue::from("b");
        tx.index_do_update_property(descriptor, NodeId(4), Some(&a), Some(&b));

        let old = tx.index_updates_for_seek(&descriptor, &a).cloned().unwrap_or_default();
        assert!(old.is_removed(&NodeId(4)));
        let new = tx.index_updates_for_seek(&descriptor, &b).cloned().unwrap_or_default();
        assert!(new.is_added(&NodeId(4)));

        let scan = tx.index_updates_for_scan(&descriptor);
        assert!(scan.is_added(&NodeId(4)));
        assert!(!scan.is_removed(&NodeId(4)));
    }

    #[test]
    fn visitor_sees_changes_in_commit_order() {
        let mut tx = TxState::new();
        tx.node_do_delete(NodeId(1));
        tx.node_do_create(NodeId(2));
        tx.node_do_add_label(LabelId(5), NodeId(2));
        tx.index_rule_do_drop(IndexDescriptor::new(LabelId(3), PropKeyId(0)));
        tx.constraint_index_rule_do_add(IndexDescriptor::new(LabelId(4), PropKeyId(0)));
        tx.constraint_do_add(UniquenessConstraint::new(LabelId(4), PropKeyId(0)), RuleId(9));

        let mut recorder = Recorder::default();
        tx.accept(&mut recorder).expect("visit");
        assert_eq!(
            recorder.events,
            vec![
                "+node 2",
                "labels 2 +1 -0",
                "-node 1",
                "+index 4 true",
                "-index 3 false",
                "+constraint 4",
            ]
        );
    }

    #[test]
    fn dropping_a_constraint_added_here_forgets_its_index() {
        let mut tx = TxState::new();
        let constraint = UniquenessConstraint::new(LabelId(2), PropKeyId(3));
        tx.constraint_do_add(constraint, RuleId(7));
        assert_eq!(tx.constraint_index_created_in_tx(&constraint), Some(RuleId(7)));

        tx.constraint_do_drop(constraint);
        assert_eq!(tx.constraint_index_created_in_tx(&constraint), None);
        assert!(tx.constraint_diff().is_empty());
        assert!(tx.constraint_index_diff().is_empty());

        tx.constraint_do_add(constraint, RuleId(8));
        assert_eq!(
            tx.constraint_indexes_created_in_tx().collect::<Vec<_>>(),
            vec![(constraint, RuleId(8))]
        );
    }

    #[test]
    fn dropping_a_committed_constraint_stages_its_index_removal() {
        let mut tx = TxState::new();
        let constraint = UniquenessConstraint::new(LabelId(2), PropKeyId(3));
        tx.constraint_do_drop(constraint);
        assert!(tx.constraint_diff().is_removed(&constraint));
        assert!(tx
            .constraint_index_diff()
            .is_removed(&constraint.index_descriptor()));
    }

    #[test]
    fn recreating_a_dropped_index_cancels_out() {
        let mut tx = TxState::new();
        let descriptor = IndexDescriptor::new(LabelId(1), PropKeyId(1));
        tx.index_rule_do_drop(descriptor);
        tx.index_rule_do_add(descriptor);
        assert!(tx.index_diff().is_empty());
        assert!(!tx.has_schema_changes());
    }
}
