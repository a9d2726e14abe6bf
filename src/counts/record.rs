use smallvec::SmallVec;

use crate::counts::CountsState;
use crate::types::{LabelId, RuleId, TypeId};

/// Number of labels a node record stores inline before spilling to a dynamic record.
pub const INLINE_LABEL_CAPACITY: usize = 4;

/// Label storage of a node record: inline for small sets, dynamic beyond that.
///
/// Both forms hold labels sorted and without duplicates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelField {
    /// Labels stored in the record itself.
    Inline(SmallVec<[LabelId; INLINE_LABEL_CAPACITY]>),
    /// Labels stored in an overflow record.
    Dynamic(Vec<LabelId>),
}

impl Default for LabelField {
    fn default() -> Self {
        LabelField::Inline(SmallVec::new())
    }
}

impl LabelField {
    /// Builds a field from any label collection, picking the storage form by size.
    pub fn from_labels(labels: impl IntoIterator<Item = LabelId>) -> Self {
        let mut sorted: Vec<LabelId> = labels.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() <= INLINE_LABEL_CAPACITY {
            LabelField::Inline(SmallVec::from_vec(sorted))
        } else {
            LabelField::Dynamic(sorted)
        }
    }

    /// Labels in ascending order.
    pub fn labels(&self) -> &[LabelId] {
        match self {
            LabelField::Inline(labels) => labels.as_slice(),
            LabelField::Dynamic(labels) => labels.as_slice(),
        }
    }

    /// Whether the labels fit in the record.
    pub fn is_inline(&self) -> bool {
        matches!(self, LabelField::Inline(_))
    }

    /// Whether `label` is present.
    pub fn contains(&self, label: LabelId) -> bool {
        self.labels().binary_search(&label).is_ok()
    }

    /// Symmetric difference `(added, removed)` going from `before` to `after`.
    pub fn diff(before: &LabelField, after: &LabelField) -> (Vec<LabelId>, Vec<LabelId>) {
        let (old, new) = (before.labels(), after.labels());
        let mut added = Vec::new();
        let mut removed = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < old.len() && j < new.len() {
            match old[i].cmp(&new[j]) {
                std::cmp::Ordering::Less => {
                    removed.push(old[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    added.push(new[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        removed.extend_from_slice(&old[i..]);
        added.extend_from_slice(&new[j..]);
        (added, removed)
    }
}

/// Committed degree of a node for one relationship type.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TypedDegree {
    /// Relationship type.
    pub ty: TypeId,
    /// Relationships starting at the node (loops included).
    pub outgoing: u64,
    /// Relationships ending at the node (loops included).
    pub incoming: u64,
}

/// Counter deltas accumulated while a transaction's commands are applied.
///
/// Node transitions contribute a label term weighted by the node's degree *before* the
/// transaction; relationship transitions contribute a term using endpoint labels
/// *after* the transaction. Together they count every label/relationship pairing once.
#[derive(Clone, Debug, Default)]
pub struct CountsRecordState {
    deltas: CountsState,
}

impl CountsRecordState {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a node transition. `None` before means created, `None` after means deleted.
    /// `degrees` is the node's committed degree per type before this transaction.
    pub fn node_changed(
        &mut self,
        before: Option<&LabelField>,
        after: Option<&LabelField>,
        degrees: &[TypedDegree],
    ) {
        let empty = LabelField::default();
        match (before.is_some(), after.is_some()) {
            (false, true) => self.deltas.increment_node_count(None, 1),
            (true, false) => self.deltas.increment_node_count(None, -1),
            _ => {}
        }
        let (added, removed) = LabelField::diff(before.unwrap_or(&empty), after.unwrap_or(&empty));
        for label in added {
            self.label_changed(label, 1, degrees);
        }
        for label in removed {
            self.label_changed(label, -1, degrees);
        }
    }

    fn label_changed(&mut self, label: LabelId, delta: i64, degrees: &[TypedDegree]) {
        self.deltas.increment_node_count(Some(label), delta);
        for degree in degrees {
            let out = degree.outgoing as i64 * delta;
            let inc = degree.incoming as i64 * delta;
            let ty = Some(degree.ty);
            self.deltas
                .increment_relationship_count(Some(label), None, None, out);
            self.deltas
                .increment_relationship_count(Some(label), ty, None, out);
            self.deltas
                .increment_relationship_count(None, None, Some(label), inc);
            self.deltas
                .increment_relationship_count(None, ty, Some(label), inc);
        }
    }

    /// Records a relationship created (`delta = 1`) or deleted (`delta = -1`), given the
    /// labels its endpoints carry after the transaction.
    pub fn relationship_changed(
        &mut self,
        ty: TypeId,
        start_labels: &[LabelId],
        end_labels: &[LabelId],
        delta: i64,
    ) {
        let ty = Some(ty);
        self.deltas.increment_relationship_count(None, None, None, delta);
        self.deltas.increment_relationship_count(None, ty, None, delta);
        for label in start_labels {
            self.deltas
                .increment_relationship_count(Some(*label), None, None, delta);
            self.deltas
                .increment_relationship_count(Some(*label), ty, None, delta);
        }
        for label in end_labels {
            self.deltas
                .increment_relationship_count(None, None, Some(*label), delta);
            self.deltas
                .increment_relationship_count(None, ty, Some(*label), delta);
        }
    }

    /// Records `delta` index updates on `index`.
    pub fn index_updated(&mut self, index: RuleId, delta: i64) {
        self.deltas.increment_index_updates(index, delta);
    }

    /// Whether any non-zero delta was recorded.
    pub fn has_changes(&self) -> bool {
        self.deltas.non_zero().next().is_some()
    }

    /// The accumulated deltas with zero entries dropped.
    pub fn into_deltas(self) -> CountsState {
        let mut out = CountsState::new();
        for (key, value) in self.deltas.non_zero() {
            out.apply(key, value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(ids: &[u32]) -> LabelField {
        LabelField::from_labels(ids.iter().map(|id| LabelId(*id)))
    }

    #[test]
    fn label_field_spills_to_dynamic() {
        assert!(labels(&[1, 2, 3, 4]).is_inline());
        let big = labels(&[9, 1, 2, 3, 4, 1]);
        assert!(!big.is_inline());
        assert_eq!(big.labels().len(), 5);
        assert_eq!(big.labels()[0], LabelId(1));
    }

    #[test]
    fn diff_works_across_storage_forms() {
        let (added, removed) = LabelField::diff(&labels(&[1, 3]), &labels(&[3, 4, 5, 6, 7]));
        assert_eq!(added, vec![LabelId(4), LabelId(5), LabelId(6), LabelId(7)]);
        assert_eq!(removed, vec![LabelId(1)]);
    }

    #[test]
    fn label_added_to_connected_node_counts_its_degree() {
        let mut record = CountsRecordState::new();
        let degrees = [TypedDegree {
            ty: TypeId(0),
            outgoing: 2,
            incoming: 1,
        }];
        record.node_changed(Some(&labels(&[])), Some(&labels(&[5])), &degrees);
        let deltas = record.into_deltas();
        assert_eq!(deltas.node_count(Some(LabelId(5))), 1);
        assert_eq!(deltas.node_count(None), 0);
        assert_eq!(deltas.relationship_count(Some(LabelId(5)), Some(TypeId(0)), None), 2);
        assert_eq!(deltas.relationship_count(None, None, Some(LabelId(5))), 1);
        assert_eq!(deltas.relationship_count(None, None, None), 0);
    }

    #[test]
    fn created_node_with_new_relationship_is_counted_once() {
        let mut record = CountsRecordState::new();
        record.node_changed(None, Some(&labels(&[1])), &[]);
        record.node_changed(None, Some(&labels(&[2])), &[]);
        record.relationship_changed(TypeId(3), &[LabelId(1)], &[LabelId(2)], 1);
        let deltas = record.into_deltas();
        assert_eq!(deltas.node_count(None), 2);
        assert_eq!(deltas.relationship_count(Some(LabelId(1)), Some(TypeId(3)), None), 1);
        assert_eq!(deltas.relationship_count(None, Some(TypeId(3)), Some(LabelId(2))), 1);
        assert_eq!(deltas.relationship_count(None, None, None), 1);
    }
}
