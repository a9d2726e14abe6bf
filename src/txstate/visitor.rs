use std::collections::BTreeSet;

use crate::schema::{IndexDescriptor, UniquenessConstraint};
use crate::txstate::PropertyDiffSets;
use crate::types::{LabelId, NodeId, RelId, RelationshipData, Result};

/// Receives the changes of a [`super::TxState`] in commit order.
///
/// Order: created nodes, created relationships, node label changes, node property
/// changes, relationship property changes, deleted relationships, deleted nodes, added
/// indexes, removed indexes, added constraints, removed constraints. Within each group
/// elements arrive in ascending id order. Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait TxStateVisitor {
    /// A node was created.
    fn visit_created_node(&mut self, node: NodeId) -> Result<()> {
        Ok(())
    }

    /// A relationship was created.
    fn visit_created_relationship(&mut self, relationship: &RelationshipData) -> Result<()> {
        Ok(())
    }

    /// A node gained and/or lost labels.
    fn visit_node_label_changes(
        &mut self,
        node: NodeId,
        added: &BTreeSet<LabelId>,
        removed: &BTreeSet<LabelId>,
    ) -> Result<()> {
        Ok(())
    }

    /// Node properties changed.
    fn visit_node_property_changes(
        &mut self,
        node: NodeId,
        changes: &PropertyDiffSets,
    ) -> Result<()> {
        Ok(())
    }

    /// Relationship properties changed.
    fn visit_relationship_property_changes(
        &mut self,
        relationship: RelId,
        changes: &PropertyDiffSets,
    ) -> Result<()> {
        Ok(())
    }

    /// A committed relationship was deleted.
    fn visit_deleted_relationship(&mut self, relationship: &RelationshipData) -> Result<()> {
        Ok(())
    }

    /// A committed node was deleted.
    fn visit_deleted_node(&mut self, node: NodeId) -> Result<()> {
        Ok(())
    }

    /// An index was added. `constraint_index` marks indexes backing a uniqueness constraint.
    fn visit_added_index(&mut self, descriptor: IndexDescriptor, constraint_index: bool) -> Result<()> {
        Ok(())
    }

    /// An index was dropped.
    fn visit_removed_index(
        &mut self,
        descriptor: IndexDescriptor,
        constraint_index: bool,
    ) -> Result<()> {
        Ok(())
    }

    /// A uniqueness constraint was added.
    fn visit_added_constraint(&mut self, constraint: UniquenessConstraint) -> Result<()> {
        Ok(())
    }

    /// A uniqueness constraint was dropped.
    fn visit_removed_constraint(&mut self, constraint: UniquenessConstraint) -> Result<()> {
        Ok(())
    }
}
