use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::counts::{CountsKey, CountsRecordState, CountsState, CountsValue, LabelField};
use crate::types::{LabelId, RuleId, TypeId};

/// One counter whose tracked value disagrees with a recomputation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Difference {
    /// The counter.
    pub key: CountsKey,
    /// Tracked first register.
    pub expected_first: i64,
    /// Tracked second register.
    pub expected_second: i64,
    /// Recomputed first register.
    pub actual_first: i64,
    /// Recomputed second register.
    pub actual_second: i64,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected ({}, {}) but was ({}, {})",
            self.key, self.expected_first, self.expected_second, self.actual_first, self.actual_second
        )
    }
}

/// Compares tracked counters against a full recomputation.
///
/// Pure: neither input is modified, so running it twice yields the same report.
pub struct CountsVerifier<'a> {
    expected: &'a CountsState,
}

impl<'a> CountsVerifier<'a> {
    /// Verifier for the tracked counters `expected`.
    pub fn new(expected: &'a CountsState) -> Self {
        Self { expected }
    }

    /// Every key whose value differs; a key missing on one side reads as zero there.
    pub fn verify(&self, actual: &CountsState) -> Vec<Difference> {
        let keys: BTreeSet<CountsKey> = self
            .expected
            .iter()
            .map(|(key, _)| *key)
            .chain(actual.iter().map(|(key, _)| *key))
            .collect();
        keys.into_iter()
            .filter_map(|key| {
                let expected = self.expected.get(&key);
                let actual = actual.get(&key);
                (expected != actual).then(|| difference(key, expected, actual))
            })
            .collect()
    }
}

fn difference(key: CountsKey, expected: CountsValue, actual: CountsValue) -> Difference {
    Difference {
        key,
        expected_first: expected.first,
        expected_second: expected.second,
        actual_first: actual.first,
        actual_second: actual.second,
    }
}

/// Rebuilds every counter from a full scan.
///
/// The caller feeds each live node, relationship and index; [`CountsComputer::finish`]
/// returns the resulting state.
#[derive(Default)]
pub struct CountsComputer {
    record: CountsRecordState,
    indexes: Vec<(RuleId, i64, i64)>,
}

impl CountsComputer {
    /// Starts an empty computation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one live node.
    pub fn node(&mut self, labels: &LabelField) {
        self.record.node_changed(None, Some(labels), &[]);
    }

    /// Counts one live relationship with its endpoints' labels.
    pub fn relationship(&mut self, ty: TypeId, start_labels: &[LabelId], end_labels: &[LabelId]) {
        self.record
            .relationship_changed(ty, start_labels, end_labels, 1);
    }

    /// Records the scanned size and distinct value count of an index.
    pub fn index(&mut self, index: RuleId, unique_values: i64, size: i64) {
        self.indexes.push((index, unique_values, size));
    }

    /// The recomputed counters. Index update registers restart at zero.
    pub fn finish(self) -> CountsState {
        let mut state = self.record.into_deltas();
        for (index, unique, size) in self.indexes {
            state.replace_index_statistics(index, 0, size);
            state.replace_index_sample(index, unique, size);
        }
        state
    }
}
