use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::locking::LockResource;
use crate::schema::{IndexDescriptor, UniquenessConstraint};
use crate::types::{EntityType, LabelId, NodeId, PropKeyId, TokenKind};
use crate::value::PropertyValue;

/// Result alias used throughout the kernel.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Coarse classification of every [`KernelError`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Entity, token, index or constraint is absent.
    NotFound,
    /// A schema or uniqueness rule was violated, or a declaration was malformed.
    ConstraintViolation,
    /// The caller broke the transaction/statement protocol.
    ProtocolViolation,
    /// A write reached a read-only database.
    ReadOnly,
    /// The statement or transaction was aborted by a guard, a lock wait or termination.
    Aborted,
    /// An internal invariant was violated; not recoverable.
    Unexpected,
    /// Configuration could not be loaded.
    Configuration,
}

/// Why a transaction was marked for termination.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TerminationReason {
    /// Explicit operator or administrative request.
    Terminated,
    /// The guard's time budget was exhausted.
    Timeout,
    /// The database is shutting down or switching role.
    DatabaseUnavailable,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Terminated => f.write_str("terminated"),
            TerminationReason::Timeout => f.write_str("timed out"),
            TerminationReason::DatabaseUnavailable => f.write_str("database unavailable"),
        }
    }
}

/// Histogram of locks that could not be released, by lock type and resource class.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LockReleaseSummary {
    /// Failed releases keyed by lock type (`read`/`write`).
    pub by_lock_type: BTreeMap<&'static str, usize>,
    /// Failed releases keyed by resource class (`node`, `schema`, ...).
    pub by_resource_class: BTreeMap<&'static str, usize>,
    /// First failure message, for context.
    pub first_failure: String,
}

impl fmt::Display for LockReleaseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lock types {:?}, resource classes {:?}; first failure: {}",
            self.by_lock_type, self.by_resource_class, self.first_failure
        )
    }
}

/// Every failure the kernel can surface.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("{entity} {id} not found")]
    EntityNotFound { entity: EntityType, id: u64 },
    #[error("{kind} token {id} not found")]
    TokenNotFound { kind: TokenKind, id: u32 },
    #[error("{0} not found")]
    IndexNotFound(IndexDescriptor),
    #[error("{0} not found")]
    ConstraintNotFound(UniquenessConstraint),

    #[error("illegal {kind} name {name:?}")]
    IllegalTokenName { kind: TokenKind, name: String },
    #[error("node {existing} already has label {label} and property {property_key} = {value}")]
    UniquePropertyConstraintViolation {
        label: LabelId,
        property_key: PropKeyId,
        value: PropertyValue,
        existing: NodeId,
    },
    #[error("there is already an index for {0}")]
    AlreadyIndexed(IndexDescriptor),
    #[error("there is already a constraint {0}")]
    AlreadyConstrained(UniquenessConstraint),
    #[error("{0} belongs to a uniqueness constraint and cannot be dropped on its own")]
    IndexBelongsToConstraint(IndexDescriptor),
    #[error("existing data violates {constraint}: nodes {first} and {second} share value {value}")]
    ConstraintVerificationFailed {
        constraint: UniquenessConstraint,
        first: NodeId,
        second: NodeId,
        value: PropertyValue,
    },
    #[error("cannot delete node {0}: it still has relationships")]
    NodeStillHasRelationships(NodeId),
    #[error("unable to add {descriptor}")]
    AddIndexFailure {
        descriptor: IndexDescriptor,
        #[source]
        cause: Box<KernelError>,
    },
    #[error("unable to drop {descriptor}")]
    DropIndexFailure {
        descriptor: IndexDescriptor,
        #[source]
        cause: Box<KernelError>,
    },
    #[error("unable to create {constraint}")]
    CreateConstraintFailure {
        constraint: UniquenessConstraint,
        #[source]
        cause: Box<KernelError>,
    },
    #[error("unable to drop {constraint}")]
    DropConstraintFailure {
        constraint: UniquenessConstraint,
        #[source]
        cause: Box<KernelError>,
    },
    #[error("unable to validate constraint")]
    UnableToValidateConstraint {
        #[source]
        cause: Box<KernelError>,
    },
    #[error("{descriptor} is broken: {failure}")]
    IndexBroken {
        descriptor: IndexDescriptor,
        failure: String,
    },
    #[error("{0} is still populating")]
    IndexPopulating(IndexDescriptor),

    #[error("{0}")]
    InvalidTransactionType(&'static str),
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    #[error("this database is read only")]
    ReadOnlyDatabase,

    #[error("transaction has been {0}")]
    TransactionTerminated(TerminationReason),
    #[error("guard aborted operation: {0}")]
    GuardAbort(String),
    #[error("deadlock detected while acquiring {lock_type} lock on {resource}")]
    DeadlockDetected {
        resource: LockResource,
        lock_type: &'static str,
    },
    #[error("timed out acquiring {lock_type} lock on {resource}")]
    LockTimeout {
        resource: LockResource,
        lock_type: &'static str,
    },
    #[error("database is shut down")]
    DatabaseShutdown,

    #[error("failed to release locks: {0}")]
    LockRelease(LockReleaseSummary),
    #[error("transaction failure: {message}")]
    TransactionFailure {
        message: &'static str,
        #[source]
        cause: Option<Box<KernelError>>,
    },
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KernelError {
    /// Classifies the error into the kernel's taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::EntityNotFound { .. }
            | KernelError::TokenNotFound { .. }
            | KernelError::IndexNotFound(_)
            | KernelError::ConstraintNotFound(_) => ErrorKind::NotFound,
            KernelError::IllegalTokenName { .. }
            | KernelError::UniquePropertyConstraintViolation { .. }
            | KernelError::AlreadyIndexed(_)
            | KernelError::AlreadyConstrained(_)
            | KernelError::IndexBelongsToConstraint(_)
            | KernelError::ConstraintVerificationFailed { .. }
            | KernelError::NodeStillHasRelationships(_)
            | KernelError::AddIndexFailure { .. }
            | KernelError::DropIndexFailure { .. }
            | KernelError::CreateConstraintFailure { .. }
            | KernelError::DropConstraintFailure { .. }
            | KernelError::UnableToValidateConstraint { .. }
            | KernelError::IndexBroken { .. }
            | KernelError::IndexPopulating(_) => ErrorKind::ConstraintViolation,
            KernelError::InvalidTransactionType(_) | KernelError::IllegalState(_) => {
                ErrorKind::ProtocolViolation
            }
            KernelError::ReadOnlyDatabase => ErrorKind::ReadOnly,
            KernelError::TransactionTerminated(_)
            | KernelError::GuardAbort(_)
            | KernelError::DeadlockDetected { .. }
            | KernelError::LockTimeout { .. }
            | KernelError::DatabaseShutdown => ErrorKind::Aborted,
            KernelError::LockRelease(_)
            | KernelError::TransactionFailure { .. }
            | KernelError::UnsupportedOperation(_)
            | KernelError::Invariant(_)
            | KernelError::Io(_) => ErrorKind::Unexpected,
            KernelError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub(crate) fn node_not_found(node: NodeId) -> Self {
        KernelError::EntityNotFound {
            entity: EntityType::Node,
            id: node.0,
        }
    }

    pub(crate) fn relationship_not_found(rel: crate::types::RelId) -> Self {
        KernelError::EntityNotFound {
            entity: EntityType::Relationship,
            id: rel.0,
        }
    }
}
