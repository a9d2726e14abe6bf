use std::fmt;

use crate::types::{LabelId, NodeId, PropKeyId, RelId};

/// Something a transaction can lock.
///
/// Equality and hashing are structural, so two acquisitions for the same entity or the
/// same index entry always contend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockResource {
    /// A node.
    Node(NodeId),
    /// A relationship.
    Relationship(RelId),
    /// Graph-level properties.
    Graph,
    /// The schema as a whole.
    Schema,
    /// One value of one `(label, property key)` index.
    IndexEntry {
        /// Label.
        label: LabelId,
        /// Property key.
        property_key: PropKeyId,
        /// Canonical string form of the value.
        value: String,
    },
}

impl LockResource {
    /// Resource class name, used in diagnostics.
    pub fn class_name(&self) -> &'static str {
        match self {
            LockResource::Node(_) => "node",
            LockResource::Relationship(_) => "relationship",
            LockResource::Graph => "graph",
            LockResource::Schema => "schema",
            LockResource::IndexEntry { .. } => "index_entry",
        }
    }
}

impl fmt::Display for LockResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockResource::Node(id) => write!(f, "node({id})"),
            LockResource::Relationship(id) => write!(f, "relationship({id})"),
            LockResource::Graph => f.write_str("graph"),
            LockResource::Schema => f.write_str("schema"),
            LockResource::IndexEntry {
                label,
                property_key,
                value,
            } => write!(f, "index_entry({label}, {property_key}, {value:?})"),
        }
    }
}

/// Shared or exclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LockType {
    /// Shared lock; compatible with other readers.
    Read,
    /// Exclusive lock.
    Write,
}

impl LockType {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            LockType::Read => "read",
            LockType::Write => "write",
        }
    }
}

impl fmt::Display for LockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity under which a transaction holds locks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockClientId(pub u64);

impl fmt::Display for LockClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
