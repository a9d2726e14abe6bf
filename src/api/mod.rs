//! Statement operations: the capability traits, the layers implementing them and the
//! caller-facing views.
//!
//! The stack is assembled once per kernel by [`build_statement_operations`]. Each layer
//! owns handles to the layer below for the capabilities it wraps; a call travels from the
//! guarding layer down to [`StateHandlingLayer`], which merges the transaction overlay with
//! the committed store.

mod caching;
mod constraint_enforcing;
mod facade;
mod guarding;
mod integrity;
mod locking;
mod operations;
mod parts;
mod read_only;
mod state_handling;
mod statement;

pub use caching::CachingLayer;
pub use constraint_enforcing::ConstraintEnforcingLayer;
pub use facade::{DataWriteOperations, ReadOperations, SchemaWriteOperations, TokenWriteOperations};
pub use guarding::GuardingLayer;
pub use integrity::DataIntegrityLayer;
pub use locking::LockingLayer;
pub use operations::{
    EntityReadOps, EntityWriteOps, KeyReadOps, KeyWriteOps, SchemaReadOps, SchemaStateOps,
    SchemaStateValue, SchemaWriteOps,
};
pub use parts::{build_statement_operations, CakeCollaborators, StatementOperationParts};
pub use read_only::ReadOnlyLayer;
pub use state_handling::StateHandlingLayer;
pub use statement::{KernelStatement, TerminationFlag, TransactionType};
