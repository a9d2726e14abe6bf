use crate::store::StoreReadLayer;
use crate::txstate::TxState;
use crate::types::{Direction, KernelError, LabelId, NodeId, Result, TypeId};

/// Count changes an open transaction would apply on commit.
///
/// Mirrors the commit-time decomposition of [`super::CountsRecordState`]: nodes whose labels
/// changed contribute their committed degree, created and deleted relationships contribute
/// one each based on their endpoints' labels after the transaction.
pub struct CountsDelta<'a> {
    tx: &'a TxState,
    store: &'a dyn StoreReadLayer,
}

impl<'a> CountsDelta<'a> {
    /// Delta view of `tx` over `store`.
    pub fn new(tx: &'a TxState, store: &'a dyn StoreReadLayer) -> Self {
        Self { tx, store }
    }

    /// Change in the number of nodes with `label` (ANY when `None`).
    pub fn for_nodes(&self, label: Option<LabelId>) -> Result<i64> {
        let nodes = self.tx.added_and_removed_nodes();
        let Some(label) = label else {
            return Ok(nodes.delta());
        };
        let mut delta = self
            .tx
            .nodes_with_label_changed(label)
            .map_or(0, |diff| diff.delta());
        for node in nodes.removed() {
            if self.store.node_has_label(*node, label)? {
                delta -= 1;
            }
        }
        Ok(delta)
    }

    /// Change in the number of relationships matching the pattern.
    ///
    /// At most one endpoint label may be given; constraining both is unsupported.
    pub fn for_relationships(
        &self,
        start: Option<LabelId>,
        ty: Option<TypeId>,
        end: Option<LabelId>,
    ) -> Result<i64> {
        if start.is_some() && end.is_some() {
            return Err(KernelError::UnsupportedOperation(
                "counting relationships with both endpoint labels constrained",
            ));
        }
        let rels = self.tx.added_and_removed_relationships();
        let mut delta = 0i64;
        for (ids, sign) in [(rels.added(), 1i64), (rels.removed(), -1i64)] {
            for rel in ids {
                let data = self.tx.relationship_data(*rel).ok_or_else(|| {
                    KernelError::Invariant(format!("relationship {rel} has no recorded shape"))
                })?;
                if ty.is_some_and(|ty| ty != data.ty) {
                    continue;
                }
                let matches = match (start, end) {
                    (Some(label), _) => self.has_label_after(data.start, label)?,
                    (_, Some(label)) => self.has_label_after(data.end, label)?,
                    (None, None) => true,
                };
                if matches {
                    delta += sign;
                }
            }
        }

        let (label, direction) = match (start, end) {
            (Some(label), _) => (label, Direction::Outgoing),
            (_, Some(label)) => (label, Direction::Incoming),
            (None, None) => return Ok(delta),
        };
        if let Some(diff) = self.tx.nodes_with_label_changed(label) {
            for node in diff.added() {
                if !self.tx.node_is_added_in_this_tx(*node) {
                    delta += self.store.node_get_degree(*node, direction, ty)? as i64;
                }
            }
            for node in diff.removed() {
                delta -= self.store.node_get_degree(*node, direction, ty)? as i64;
            }
        }
        for node in self.tx.added_and_removed_nodes().removed() {
            if self.store.node_has_label(*node, label)? {
                delta -= self.store.node_get_degree(*node, direction, ty)? as i64;
            }
        }
        Ok(delta)
    }

    fn has_label_after(&self, node: NodeId, label: LabelId) -> Result<bool> {
        if self.tx.node_is_deleted_in_this_tx(node) {
            return Ok(false);
        }
        if let Some(diff) = self.tx.node_label_diff(node) {
            if diff.is_added(&label) {
                return Ok(true);
            }
            if diff.is_removed(&label) {
                return Ok(false);
            }
        }
        if self.tx.node_is_added_in_this_tx(node) {
            return Ok(false);
        }
        self.store.node_has_label(node, label)
    }
}
