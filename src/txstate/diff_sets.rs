use std::collections::{BTreeMap, BTreeSet};

use crate::types::PropKeyId;
use crate::value::{Property, PropertyValue};

/// Added/removed pair over an ordered element type.
///
/// `added` and `removed` are kept disjoint: adding an element that is pending removal
/// cancels the removal and vice versa.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffSets<T: Ord> {
    added: BTreeSet<T>,
    removed: BTreeSet<T>,
}

impl<T: Ord> Default for DiffSets<T> {
    fn default() -> Self {
        Self {
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }
}

impl<T: Ord + Clone> DiffSets<T> {
    /// Creates an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `element` as added. Returns `false` if it was already added.
    pub fn add(&mut self, element: T) -> bool {
        if self.removed.remove(&element) {
            return true;
        }
        self.added.insert(element)
    }

    /// Records `element` as removed. Returns `false` if it was already removed.
    pub fn remove(&mut self, element: T) -> bool {
        if self.added.remove(&element) {
            return true;
        }
        self.removed.insert(element)
    }

    /// Cancels a pending removal of `element`, if any.
    pub fn un_remove(&mut self, element: &T) -> bool {
        self.removed.remove(element)
    }

    /// Whether `element` is pending addition.
    pub fn is_added(&self, element: &T) -> bool {
        self.added.contains(element)
    }

    /// Whether `element` is pending removal.
    pub fn is_removed(&self, element: &T) -> bool {
        self.removed.contains(element)
    }

    /// Pending additions, in order.
    pub fn added(&self) -> &BTreeSet<T> {
        &self.added
    }

    /// Pending removals, in order.
    pub fn removed(&self) -> &BTreeSet<T> {
        &self.removed
    }

    /// Whether the diff records nothing.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Net change in cardinality this diff applies to a base set.
    pub fn delta(&self) -> i64 {
        self.added.len() as i64 - self.removed.len() as i64
    }

    /// Overlays this diff on a committed sequence.
    ///
    /// Yields committed elements that are neither removed nor re-added, followed by every
    /// added element. Committed input is assumed free of duplicates.
    pub fn apply<'a, I>(&'a self, committed: I) -> impl Iterator<Item = T> + 'a
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'a,
    {
        committed
            .into_iter()
            .filter(move |item| !self.removed.contains(item) && !self.added.contains(item))
            .chain(self.added.iter().cloned())
    }

    /// Drops `element` from both sides.
    pub fn forget(&mut self, element: &T) {
        self.added.remove(element);
        self.removed.remove(element);
    }
}

/// Property changes of a single entity.
///
/// `added` holds keys the committed entity did not have, `changed` holds keys it had,
/// `removed` holds committed keys that were deleted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyDiffSets {
    added: BTreeMap<PropKeyId, PropertyValue>,
    changed: BTreeMap<PropKeyId, PropertyValue>,
    removed: BTreeSet<PropKeyId>,
}

/// Outcome of a property lookup against the overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyLookup<'a> {
    /// The transaction set this value.
    Set(&'a PropertyValue),
    /// The transaction removed the key.
    Removed,
    /// The transaction never touched the key.
    Untouched,
}

impl PropertyDiffSets {
    /// Records `key = value`; `committed` tells whether the stored entity has the key.
    pub fn set(&mut self, key: PropKeyId, value: PropertyValue, committed: bool) {
        if committed {
            self.removed.remove(&key);
            self.changed.insert(key, value);
        } else {
            self.added.insert(key, value);
        }
    }

    /// Records removal of `key`; `committed` tells whether the stored entity has the key.
    pub fn remove(&mut self, key: PropKeyId, committed: bool) {
        self.added.remove(&key);
        self.changed.remove(&key);
        if committed {
            self.removed.insert(key);
        }
    }

    /// Looks a key up in the overlay.
    pub fn lookup(&self, key: PropKeyId) -> PropertyLookup<'_> {
        if let Some(value) = self.added.get(&key).or_else(|| self.changed.get(&key)) {
            PropertyLookup::Set(value)
        } else if self.removed.contains(&key) {
            PropertyLookup::Removed
        } else {
            PropertyLookup::Untouched
        }
    }

    /// Overlays the changes on committed properties, ordered by key.
    pub fn apply(&self, committed: impl IntoIterator<Item = Property>) -> Vec<Property> {
        let mut merged: BTreeMap<PropKeyId, PropertyValue> = committed
            .into_iter()
            .filter(|p| !self.removed.contains(&p.key))
            .map(|p| (p.key, p.value))
            .collect();
        for (key, value) in self.changed.iter().chain(self.added.iter()) {
            merged.insert(*key, value.clone());
        }
        merged
            .into_iter()
            .map(|(key, value)| Property { key, value })
            .collect()
    }

    /// Keys newly added.
    pub fn added(&self) -> &BTreeMap<PropKeyId, PropertyValue> {
        &self.added
    }

    /// Keys whose committed value was replaced.
    pub fn changed(&self) -> &BTreeMap<PropKeyId, PropertyValue> {
        &self.changed
    }

    /// Committed keys removed.
    pub fn removed(&self) -> &BTreeSet<PropKeyId> {
        &self.removed
    }

    /// Whether nothing was changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn add_cancels_pending_removal() {
        let mut diff = DiffSets::new();
        assert!(diff.remove(4u64));
        assert!(diff.add(4));
        assert!(diff.is_empty());
        assert!(diff.add(5));
        assert!(!diff.add(5));
        assert!(diff.remove(5));
        assert!(diff.is_empty());
    }

    #[test]
    fn un_remove_only_touches_removals() {
        let mut diff = DiffSets::new();
        diff.remove(1u64);
        diff.add(2);
        assert!(diff.un_remove(&1));
        assert!(!diff.un_remove(&2));
        assert!(diff.is_added(&2));
        assert!(!diff.is_removed(&1));
    }

    #[test]
    fn property_overlay_merges_by_key() {
        let mut diff = PropertyDiffSets::default();
        diff.set(PropKeyId(1), PropertyValue::Int(10), true);
        diff.set(PropKeyId(3), PropertyValue::from("new"), false);
        diff.remove(PropKeyId(2), true);
        let committed = vec![
            Property::new(PropKeyId(1), 1i64),
            Property::new(PropKeyId(2), 2i64),
        ];
        let merged = diff.apply(committed);
        assert_eq!(
            merged,
            vec![
                Property::new(PropKeyId(1), 10i64),
                Property::new(PropKeyId(3), "new"),
            ]
        );
        assert_eq!(diff.lookup(PropKeyId(2)), PropertyLookup::Removed);
        assert_eq!(diff.lookup(PropKeyId(9)), PropertyLookup::Untouched);
    }

    #[test]
    fn removing_an_added_property_leaves_no_trace() {
        let mut diff = PropertyDiffSets::default();
        diff.set(PropKeyId(1), PropertyValue::Bool(true), false);
        diff.remove(PropKeyId(1), false);
        assert!(diff.is_empty());
    }

    proptest! {
        #[test]
        fn apply_yields_committed_minus_removed_plus_added(
            committed in proptest::collection::btree_set(0u64..64, 0..32),
            ops in proptest::collection::vec((any::<bool>(), 0u64..64), 0..48),
        ) {
            let mut diff = DiffSets::new();
            for (is_add, element) in ops {
                if is_add {
                    diff.add(element);
                } else {
                    diff.remove(element);
                }
            }
            prop_assert!(diff.added().is_disjoint(diff.removed()));

            let first: Vec<u64> = diff.apply(committed.iter().copied()).collect();
            let second: Vec<u64> = diff.apply(committed.iter().copied()).collect();
            prop_assert_eq!(&first, &second);

            let unique: BTreeSet<u64> = first.iter().copied().collect();
            prop_assert_eq!(unique.len(), first.len());

            let expected: BTreeSet<u64> = committed
                .difference(diff.removed())
                .copied()
                .chain(diff.added().iter().copied())
                .collect();
            prop_assert_eq!(unique, expected);
        }
    }
}
