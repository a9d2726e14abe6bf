use std::collections::BTreeMap;

use serde::Serialize;

use crate::counts::{CountsKey, CountsValue};
use crate::types::{LabelId, RuleId, TypeId};

/// Ordered map of counters.
///
/// Used both for the committed totals a store tracks and for the per-transaction deltas
/// that are folded into them. Counters never fail; a missing key reads as zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CountsState {
    counts: BTreeMap<CountsKey, CountsValue>,
}

impl CountsState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a counter; absent keys are zero.
    pub fn get(&self, key: &CountsKey) -> CountsValue {
        self.counts.get(key).copied().unwrap_or_default()
    }

    /// Whether `key` has an entry, even a zero one.
    pub fn contains(&self, key: &CountsKey) -> bool {
        self.counts.contains_key(key)
    }

    /// Adds `delta` to `key`.
    pub fn apply(&mut self, key: CountsKey, delta: CountsValue) {
        self.counts.entry(key).or_default().add(delta);
    }

    /// Overwrites `key`.
    pub fn replace(&mut self, key: CountsKey, value: CountsValue) {
        self.counts.insert(key, value);
    }

    /// Adds `delta` to the node counter for `label`.
    pub fn increment_node_count(&mut self, label: Option<LabelId>, delta: i64) {
        if delta != 0 {
            self.apply(CountsKey::node(label), CountsValue::count(delta));
        }
    }

    /// Adds `delta` to the relationship counter for the pattern.
    pub fn increment_relationship_count(
        &mut self,
        start: Option<LabelId>,
        ty: Option<TypeId>,
        end: Option<LabelId>,
        delta: i64,
    ) {
        if delta != 0 {
            self.apply(
                CountsKey::relationship(start, ty, end),
                CountsValue::count(delta),
            );
        }
    }

    /// Adds `delta` to the update register of an index.
    pub fn increment_index_updates(&mut self, index: RuleId, delta: i64) {
        if delta != 0 {
            self.apply(
                CountsKey::IndexStatistics { index },
                CountsValue::new(delta, 0),
            );
        }
    }

    /// Sets the update count and size of an index.
    pub fn replace_index_statistics(&mut self, index: RuleId, updates: i64, size: i64) {
        self.replace(
            CountsKey::IndexStatistics { index },
            CountsValue::new(updates, size),
        );
    }

    /// Sets the sample of an index.
    pub fn replace_index_sample(&mut self, index: RuleId, unique: i64, size: i64) {
        self.replace(
            CountsKey::IndexSample { index },
            CountsValue::new(unique, size),
        );
    }

    /// Drops both counters of an index.
    pub fn remove_index(&mut self, index: RuleId) {
        self.counts.remove(&CountsKey::IndexStatistics { index });
        self.counts.remove(&CountsKey::IndexSample { index });
    }

    /// Count of nodes with `label`.
    pub fn node_count(&self, label: Option<LabelId>) -> i64 {
        self.get(&CountsKey::node(label)).second
    }

    /// Count of relationships matching the pattern.
    pub fn relationship_count(
        &self,
        start: Option<LabelId>,
        ty: Option<TypeId>,
        end: Option<LabelId>,
    ) -> i64 {
        self.get(&CountsKey::relationship(start, ty, end)).second
    }

    /// Folds every counter of `delta` into this state.
    pub fn merge(&mut self, delta: &CountsState) {
        for (key, value) in delta.iter() {
            self.apply(*key, *value);
        }
    }

    /// Every counter, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&CountsKey, &CountsValue)> {
        self.counts.iter()
    }

    /// Counters whose value is non-zero, in key order.
    pub fn non_zero(&self) -> impl Iterator<Item = (CountsKey, CountsValue)> + '_ {
        self.counts
            .iter()
            .filter(|(_, value)| !value.is_zero())
            .map(|(key, value)| (*key, *value))
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no key is stored.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
