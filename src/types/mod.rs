//! Identifier newtypes and small shared enums used across the kernel.
//!
//! Every token and entity is a dense, non-negative integer. Failed token lookups
//! upstream produce the reserved sentinel values defined here; they must never be
//! confused with an ordinary id.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::error::{ErrorKind, KernelError, Result};

/// Identifier of a node record.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub u64);
/// Identifier of a relationship record.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct RelId(pub u64);
/// Interned label token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct LabelId(pub u32);
/// Interned property key token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct PropKeyId(pub u32);
/// Interned relationship type token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct TypeId(pub u32);
/// Identifier of a persisted schema rule (index or constraint).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct RuleId(pub u64);
/// Identifier assigned to a committed transaction by the commit process.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct TxId(pub u64);

/// Sentinel returned by label lookups that found nothing.
pub const NO_SUCH_LABEL: LabelId = LabelId(u32::MAX);
/// Sentinel returned by property key lookups that found nothing.
pub const NO_SUCH_PROPERTY_KEY: PropKeyId = PropKeyId(u32::MAX);
/// Sentinel returned by relationship type lookups that found nothing.
pub const NO_SUCH_RELATIONSHIP_TYPE: TypeId = TypeId(u32::MAX);
/// Sentinel for "no node".
pub const NO_SUCH_NODE: NodeId = NodeId(u64::MAX);
/// Sentinel for "no relationship".
pub const NO_SUCH_RELATIONSHIP: RelId = RelId(u64::MAX);

/// Transaction id of an empty store: nothing committed yet.
pub const BASE_TX_ID: TxId = TxId(1);

impl LabelId {
    /// Returns `true` unless this is the [`NO_SUCH_LABEL`] sentinel.
    pub const fn is_defined(self) -> bool {
        self.0 != NO_SUCH_LABEL.0
    }
}

impl PropKeyId {
    /// Returns `true` unless this is the [`NO_SUCH_PROPERTY_KEY`] sentinel.
    pub const fn is_defined(self) -> bool {
        self.0 != NO_SUCH_PROPERTY_KEY.0
    }
}

impl TypeId {
    /// Returns `true` unless this is the [`NO_SUCH_RELATIONSHIP_TYPE`] sentinel.
    pub const fn is_defined(self) -> bool {
        self.0 != NO_SUCH_RELATIONSHIP_TYPE.0
    }
}

impl NodeId {
    /// Returns `true` unless this is the [`NO_SUCH_NODE`] sentinel.
    pub const fn is_defined(self) -> bool {
        self.0 != NO_SUCH_NODE.0
    }
}

macro_rules! display_as_inner {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

display_as_inner!(NodeId, RelId, LabelId, PropKeyId, TypeId, RuleId, TxId);

impl From<u32> for LabelId {
    fn from(value: u32) -> Self {
        LabelId(value)
    }
}

impl From<u32> for PropKeyId {
    fn from(value: u32) -> Self {
        PropKeyId(value)
    }
}

impl From<u32> for TypeId {
    fn from(value: u32) -> Self {
        TypeId(value)
    }
}

/// Relationship direction as seen from one of its end nodes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Relationships starting at the node.
    Outgoing,
    /// Relationships ending at the node.
    Incoming,
    /// Either direction; loops are reported once.
    Both,
}

impl Direction {
    /// Whether a relationship `start -> end` matches this direction from `node`.
    pub fn matches(self, node: NodeId, start: NodeId, end: NodeId) -> bool {
        match self {
            Direction::Outgoing => start == node,
            Direction::Incoming => end == node,
            Direction::Both => start == node || end == node,
        }
    }
}

/// Type and endpoints of a relationship.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct RelationshipData {
    /// Relationship id.
    pub id: RelId,
    /// Relationship type token.
    pub ty: TypeId,
    /// Start node.
    pub start: NodeId,
    /// End node.
    pub end: NodeId,
}

impl RelationshipData {
    /// Whether the relationship starts and ends at the same node.
    pub fn is_loop(&self) -> bool {
        self.start == self.end
    }

    /// Whether this relationship touches `node` in `direction` and has one of `types`
    /// (an empty type list matches every type).
    pub fn matches(&self, node: NodeId, direction: Direction, types: &[TypeId]) -> bool {
        direction.matches(node, self.start, self.end) && (types.is_empty() || types.contains(&self.ty))
    }
}

/// Kind of entity referenced by a not-found or lock error.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A node.
    Node,
    /// A relationship.
    Relationship,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Node => f.write_str("node"),
            EntityType::Relationship => f.write_str("relationship"),
        }
    }
}

/// Kind of token referenced by a token error.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Label token.
    Label,
    /// Property key token.
    PropertyKey,
    /// Relationship type token.
    RelationshipType,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Label => f.write_str("label"),
            TokenKind::PropertyKey => f.write_str("property key"),
            TokenKind::RelationshipType => f.write_str("relationship type"),
        }
    }
}
