use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{LabelId, RuleId, TypeId};

/// Identity of one counter.
///
/// `None` in a label or type position is the ANY wildcard: the aggregate over every
/// value of that field. Keys order by variant first, then field-wise, with ANY sorting
/// before concrete ids.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountsKey {
    /// Nodes carrying `label`.
    Node {
        /// Label, or ANY.
        label: Option<LabelId>,
    },
    /// Relationships of `ty` from a node with `start` to a node with `end`.
    Relationship {
        /// Start node label, or ANY.
        start: Option<LabelId>,
        /// Relationship type, or ANY.
        ty: Option<TypeId>,
        /// End node label, or ANY.
        end: Option<LabelId>,
    },
    /// Update count and size of an index.
    IndexStatistics {
        /// Index rule.
        index: RuleId,
    },
    /// Distinct values and sample size of an index.
    IndexSample {
        /// Index rule.
        index: RuleId,
    },
}

impl CountsKey {
    /// Node counter for `label`.
    pub const fn node(label: Option<LabelId>) -> Self {
        CountsKey::Node { label }
    }

    /// Relationship counter for the given pattern.
    pub const fn relationship(
        start: Option<LabelId>,
        ty: Option<TypeId>,
        end: Option<LabelId>,
    ) -> Self {
        CountsKey::Relationship { start, ty, end }
    }
}

struct Any<'a, T>(&'a Option<T>);

impl<T: fmt::Display> fmt::Display for Any<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value}"),
            None => f.write_str("*"),
        }
    }
}

impl fmt::Display for CountsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountsKey::Node { label } => write!(f, "(:{})", Any(label)),
            CountsKey::Relationship { start, ty, end } => {
                write!(f, "(:{})-[:{}]->(:{})", Any(start), Any(ty), Any(end))
            }
            CountsKey::IndexStatistics { index } => write!(f, "index-statistics({index})"),
            CountsKey::IndexSample { index } => write!(f, "index-sample({index})"),
        }
    }
}

/// A pair of signed counters.
///
/// Node and relationship keys keep their count in `second` with `first` unused; index
/// statistics keep `(updates, size)`, index samples `(unique, size)`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CountsValue {
    /// First register.
    pub first: i64,
    /// Second register.
    pub second: i64,
}

impl CountsValue {
    /// Creates a value from both registers.
    pub const fn new(first: i64, second: i64) -> Self {
        Self { first, second }
    }

    /// A plain count.
    pub const fn count(count: i64) -> Self {
        Self {
            first: 0,
            second: count,
        }
    }

    /// Whether both registers are zero.
    pub const fn is_zero(&self) -> bool {
        self.first == 0 && self.second == 0
    }

    /// Adds `other` register-wise.
    pub fn add(&mut self, other: CountsValue) {
        self.first += other.first;
        self.second += other.second;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_order_by_kind_then_fields() {
        let mut keys = vec![
            CountsKey::IndexSample { index: RuleId(1) },
            CountsKey::relationship(None, Some(TypeId(2)), None),
            CountsKey::node(Some(LabelId(3))),
            CountsKey::node(None),
            CountsKey::relationship(None, None, None),
        ];
        keys.sort();
        assert_eq!(keys[0], CountsKey::node(None));
        assert_eq!(keys[1], CountsKey::node(Some(LabelId(3))));
        assert_eq!(keys[2], CountsKey::relationship(None, None, None));
        assert_eq!(keys[4], CountsKey::IndexSample { index: RuleId(1) });
    }

    #[test]
    fn wildcard_renders_as_star() {
        let key = CountsKey::relationship(Some(LabelId(1)), None, None);
        assert_eq!(key.to_string(), "(:1)-[:*]->(:*)");
    }
}
