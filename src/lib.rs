//! Transactional kernel of an embedded property-graph database.
//!
//! A [`Kernel`] hands out pooled [`KernelTransaction`]s. Each transaction records its
//! writes in a [`txstate::TxState`] overlay that reads merge with the committed
//! [`store::StoreReadLayer`]. Operations pass through a stack of layers (guarding,
//! locking, data integrity, constraint enforcement, caching, state handling) before they
//! reach the overlay. On commit the overlay becomes an ordered batch of
//! [`store::Command`]s applied atomically by a [`store::TransactionCommitProcess`].
//!
//! Node and relationship counts are maintained per label and type through
//! [`counts::CountsDelta`] and can be recomputed from scratch by
//! [`counts::CountsVerifier`].

#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod counts;
pub mod error;
pub mod kernel;
pub mod locking;
pub mod schema;
pub mod store;
pub mod txstate;
pub mod types;
pub mod value;

pub use config::KernelConfig;
pub use error::{ErrorKind, KernelError, Result, TerminationReason};
pub use kernel::{
    CounterMonitor, Kernel, KernelBuilder, KernelTransaction, KernelTransactions, SchemaState,
    Statement, TransactionHandle, TransactionMonitor,
};
pub use schema::{IndexDescriptor, IndexState, UniquenessConstraint};
pub use types::{LabelId, NodeId, PropKeyId, RelId, TxId, TypeId};
pub use value::{Property, PropertyValue};
