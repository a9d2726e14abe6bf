use std::time::{SystemTime, UNIX_EPOCH};

use crate::counts::LabelField;
use crate::schema::{ConstraintRule, IndexRule};
use crate::types::{NodeId, PropKeyId, RelId, RelationshipData, RuleId, TokenKind, TxId};
use crate::value::PropertyValue;

/// One storage mutation produced at commit.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Interns a token under a fixed id.
    CreateToken {
        /// Token kind.
        kind: TokenKind,
        /// Assigned id.
        id: u32,
        /// Token name.
        name: String,
    },
    /// Creates an empty node record.
    CreateNode(NodeId),
    /// Replaces the label field of a node.
    NodeLabels {
        /// Node.
        node: NodeId,
        /// Committed labels before the transaction.
        before: LabelField,
        /// Labels after the transaction.
        after: LabelField,
    },
    /// Sets a node property.
    SetNodeProperty {
        /// Node.
        node: NodeId,
        /// Key.
        key: PropKeyId,
        /// New value.
        value: PropertyValue,
    },
    /// Removes a node property.
    RemoveNodeProperty {
        /// Node.
        node: NodeId,
        /// Key.
        key: PropKeyId,
    },
    /// Creates a relationship record.
    CreateRelationship(RelationshipData),
    /// Sets a relationship property.
    SetRelationshipProperty {
        /// Relationship.
        relationship: RelId,
        /// Key.
        key: PropKeyId,
        /// New value.
        value: PropertyValue,
    },
    /// Removes a relationship property.
    RemoveRelationshipProperty {
        /// Relationship.
        relationship: RelId,
        /// Key.
        key: PropKeyId,
    },
    /// Deletes a relationship record.
    DeleteRelationship(RelationshipData),
    /// Deletes a node record that carried `labels`.
    DeleteNode {
        /// Node.
        node: NodeId,
        /// Committed labels at deletion.
        labels: LabelField,
    },
    /// Persists an index rule.
    CreateIndexRule(IndexRule),
    /// Removes an index rule and its data.
    DropIndexRule(RuleId),
    /// Persists a constraint rule.
    CreateConstraintRule(ConstraintRule),
    /// Removes a constraint rule.
    DropConstraintRule(RuleId),
    /// Links a constraint index to the constraint that owns it.
    SetConstraintIndexOwner {
        /// Index rule.
        index: RuleId,
        /// Constraint rule.
        owner: RuleId,
    },
}

impl Command {
    /// Whether the command changes schema rules.
    pub fn is_schema(&self) -> bool {
        matches!(
            self,
            Command::CreateIndexRule(_)
                | Command::DropIndexRule(_)
                | Command::CreateConstraintRule(_)
                | Command::DropConstraintRule(_)
                | Command::SetConstraintIndexOwner { .. }
        )
    }
}

/// Metadata carried with a committed batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionHeader {
    /// Last committed transaction the batch was prepared against.
    pub last_committed_tx_when_started: TxId,
    /// Wall clock at transaction start, milliseconds since the Unix epoch.
    pub started_at_ms: u64,
    /// Wall clock at commit, milliseconds since the Unix epoch.
    pub committed_at_ms: u64,
}

impl TransactionHeader {
    /// Header for a batch prepared against `last_committed` and started at `started_at_ms`.
    pub fn new(last_committed: TxId, started_at_ms: u64) -> Self {
        Self {
            last_committed_tx_when_started: last_committed,
            started_at_ms,
            committed_at_ms: now_millis(),
        }
    }
}

/// Ordered commands of one transaction plus its header.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionRepresentation {
    /// Header.
    pub header: TransactionHeader,
    /// Commands in application order.
    pub commands: Vec<Command>,
}

impl TransactionRepresentation {
    /// Wraps `commands` with `header`.
    pub fn new(header: TransactionHeader, commands: Vec<Command>) -> Self {
        Self { header, commands }
    }

    /// Whether any command changes schema rules.
    pub fn has_schema_changes(&self) -> bool {
        self.commands.iter().any(Command::is_schema)
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
