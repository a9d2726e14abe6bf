use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::counts::LabelField;
use crate::schema::{
    ConstraintRule, IndexDescriptor, IndexRule, IndexRuleKind, UniquenessConstraint,
};
use crate::store::{Command, StoreReadLayer};
use crate::txstate::{PropertyDiffSets, TxState, TxStateVisitor};
use crate::types::{KernelError, LabelId, NodeId, RelId, RelationshipData, Result, RuleId};

/// Turns a transaction overlay into the ordered commands of its commit.
///
/// Label fields are written whole, so the committed labels are read from the store and
/// combined with the overlay's label diff. Rule ids for new schema rules are reserved from
/// the store here.
pub(crate) struct CommandBuilder<'a> {
    store: &'a dyn StoreReadLayer,
    provider: &'a str,
    constraint_indexes: FxHashMap<UniquenessConstraint, RuleId>,
    commands: Vec<Command>,
}

impl<'a> CommandBuilder<'a> {
    pub(crate) fn new(store: &'a dyn StoreReadLayer, provider: &'a str) -> Self {
        Self {
            store,
            provider,
            constraint_indexes: FxHashMap::default(),
            commands: Vec::new(),
        }
    }

    /// Commands for every change in `tx`, in visit order.
    pub(crate) fn build(mut self, tx: &TxState) -> Result<Vec<Command>> {
        self.constraint_indexes = tx.constraint_indexes_created_in_tx().collect();
        tx.accept(&mut self)?;
        Ok(self.commands)
    }

    fn committed_labels(&self, node: NodeId) -> Result<Vec<LabelId>> {
        if self.store.node_exists(node) {
            self.store.node_get_labels(node)
        } else {
            Ok(Vec::new())
        }
    }

    fn index_rule_id(&self, descriptor: IndexDescriptor) -> Result<RuleId> {
        self.store
            .index_rule(&descriptor)
            .map(|rule| rule.id)
            .ok_or_else(|| {
                KernelError::Invariant(format!(
                    "{descriptor} should exist while the schema write lock is held"
                ))
            })
    }
}

impl TxStateVisitor for CommandBuilder<'_> {
    fn visit_created_node(&mut self, node: NodeId) -> Result<()> {
        self.commands.push(Command::CreateNode(node));
        Ok(())
    }

    fn visit_created_relationship(&mut self, relationship: &RelationshipData) -> Result<()> {
        self.commands.push(Command::CreateRelationship(*relationship));
        Ok(())
    }

    fn visit_node_label_changes(
        &mut self,
        node: NodeId,
        added: &BTreeSet<LabelId>,
        removed: &BTreeSet<LabelId>,
    ) -> Result<()> {
        let before = self.committed_labels(node)?;
        let after = before
            .iter()
            .copied()
            .filter(|label| !removed.contains(label))
            .chain(added.iter().copied());
        let after = LabelField::from_labels(after);
        let before = LabelField::from_labels(before);
        if before != after {
            self.commands.push(Command::NodeLabels {
                node,
                before,
                after,
            });
        }
        Ok(())
    }

    fn visit_node_property_changes(
        &mut self,
        node: NodeId,
        changes: &PropertyDiffSets,
    ) -> Result<()> {
        for (key, value) in changes.added().iter().chain(changes.changed()) {
            self.commands.push(Command::SetNodeProperty {
                node,
                key: *key,
                value: value.clone(),
            });
        }
        for key in changes.removed() {
            self.commands
                .push(Command::RemoveNodeProperty { node, key: *key });
        }
        Ok(())
    }

    fn visit_relationship_property_changes(
        &mut self,
        relationship: RelId,
        changes: &PropertyDiffSets,
    ) -> Result<()> {
        for (key, value) in changes.added().iter().chain(changes.changed()) {
            self.commands.push(Command::SetRelationshipProperty {
                relationship,
                key: *key,
                value: value.clone(),
            });
        }
        for key in changes.removed() {
            self.commands.push(Command::RemoveRelationshipProperty {
                relationship,
                key: *key,
            });
        }
        Ok(())
    }

    fn visit_deleted_relationship(&mut self, relationship: &RelationshipData) -> Result<()> {
        self.commands.push(Command::DeleteRelationship(*relationship));
        Ok(())
    }

    fn visit_deleted_node(&mut self, node: NodeId) -> Result<()> {
        let labels = LabelField::from_labels(self.committed_labels(node)?);
        self.commands.push(Command::DeleteNode { node, labels });
        Ok(())
    }

    fn visit_added_index(&mut self, descriptor: IndexDescriptor, constraint_index: bool) -> Result<()> {
        let kind = if constraint_index {
            IndexRuleKind::ConstraintIndex { owner: None }
        } else {
            IndexRuleKind::General
        };
        let rule = IndexRule {
            id: self.store.reserve_rule_id(),
            descriptor,
            provider: self.provider.to_owned(),
            kind,
        };
        self.commands.push(Command::CreateIndexRule(rule));
        Ok(())
    }

    fn visit_removed_index(
        &mut self,
        descriptor: IndexDescriptor,
        _constraint_index: bool,
    ) -> Result<()> {
        let id = self.index_rule_id(descriptor)?;
        self.commands.push(Command::DropIndexRule(id));
        Ok(())
    }

    fn visit_added_constraint(&mut self, constraint: UniquenessConstraint) -> Result<()> {
        let owned_index = match self.constraint_indexes.get(&constraint) {
            Some(index) => *index,
            None => self.index_rule_id(constraint.index_descriptor())?,
        };
        let id = self.store.reserve_rule_id();
        self.commands.push(Command::CreateConstraintRule(ConstraintRule {
            id,
            constraint,
            owned_index,
        }));
        self.commands.push(Command::SetConstraintIndexOwner {
            index: owned_index,
            owner: id,
        });
        Ok(())
    }

    fn visit_removed_constraint(&mut self, constraint: UniquenessConstraint) -> Result<()> {
        let rule = self.store.constraint_rule(&constraint).ok_or_else(|| {
            KernelError::Invariant(format!(
                "{constraint} should exist while the schema write lock is held"
            ))
        })?;
        self.commands.push(Command::DropConstraintRule(rule.id));
        Ok(())
    }
}
