//! Schema descriptors and the persisted rules that back them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{LabelId, PropKeyId, RuleId};

/// An index over `(label, property key)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Indexed label.
    pub label: LabelId,
    /// Indexed property key.
    pub property_key: PropKeyId,
}

impl IndexDescriptor {
    /// Creates a descriptor.
    pub const fn new(label: LabelId, property_key: PropKeyId) -> Self {
        Self {
            label,
            property_key,
        }
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "index :{}({})", self.label, self.property_key)
    }
}

/// Uniqueness constraint over `(label, property key)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct UniquenessConstraint {
    /// Constrained label.
    pub label: LabelId,
    /// Constrained property key.
    pub property_key: PropKeyId,
}

impl UniquenessConstraint {
    /// Creates a constraint.
    pub const fn new(label: LabelId, property_key: PropKeyId) -> Self {
        Self {
            label,
            property_key,
        }
    }

    /// Descriptor of the unique index that enforces this constraint.
    pub const fn index_descriptor(&self) -> IndexDescriptor {
        IndexDescriptor::new(self.label, self.property_key)
    }

    /// Whether the constraint covers exactly this `(label, key)` pair.
    pub fn matches(&self, label: LabelId, property_key: PropKeyId) -> bool {
        self.label == label && self.property_key == property_key
    }
}

impl fmt::Display for UniquenessConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uniqueness constraint :{}({})",
            self.label, self.property_key
        )
    }
}

/// Population state of an index.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// Still being built from existing data.
    Populating,
    /// Ready to serve lookups.
    Online,
    /// Population failed; the index cannot serve lookups.
    Failed,
}

/// Whether an index rule is a plain index or backs a uniqueness constraint.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexRuleKind {
    /// A general, user-created index.
    General,
    /// An index created to back a uniqueness constraint; `owner` is set once the
    /// constraint rule itself has been committed.
    ConstraintIndex {
        /// Owning constraint rule, if committed.
        owner: Option<RuleId>,
    },
}

/// Persisted index rule.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexRule {
    /// Rule id.
    pub id: RuleId,
    /// Indexed `(label, key)`.
    pub descriptor: IndexDescriptor,
    /// Name of the index provider that owns the index data.
    pub provider: String,
    /// General or constraint-backing.
    pub kind: IndexRuleKind,
}

impl IndexRule {
    /// Whether this rule backs a uniqueness constraint.
    pub fn is_constraint_index(&self) -> bool {
        matches!(self.kind, IndexRuleKind::ConstraintIndex { .. })
    }

    /// The owning constraint rule, if any.
    pub fn owning_constraint(&self) -> Option<RuleId> {
        match self.kind {
            IndexRuleKind::ConstraintIndex { owner } => owner,
            IndexRuleKind::General => None,
        }
    }
}

/// Persisted uniqueness constraint rule.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRule {
    /// Rule id.
    pub id: RuleId,
    /// The constraint.
    pub constraint: UniquenessConstraint,
    /// The index rule enforcing it.
    pub owned_index: RuleId,
}

/// Any persisted schema rule.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaRule {
    /// An index rule.
    Index(IndexRule),
    /// A constraint rule.
    Constraint(ConstraintRule),
}

impl SchemaRule {
    /// Rule id.
    pub fn id(&self) -> RuleId {
        match self {
            SchemaRule::Index(rule) => rule.id,
            SchemaRule::Constraint(rule) => rule.id,
        }
    }

    /// Label the rule applies to.
    pub fn label(&self) -> LabelId {
        match self {
            SchemaRule::Index(rule) => rule.descriptor.label,
            SchemaRule::Constraint(rule) => rule.constraint.label,
        }
    }
}
