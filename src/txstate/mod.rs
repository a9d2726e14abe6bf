//! Transaction-local overlay of uncommitted changes.
//!
//! A [`TxState`] is created lazily on the first write of a transaction and records
//! created/deleted entities, label and property diffs, pending index updates and schema
//! changes. Reads merge it with committed store state; commit turns it into commands by
//! walking it with a [`TxStateVisitor`].

mod diff_sets;
mod state;
mod visitor;

pub use diff_sets::{DiffSets, PropertyDiffSets, PropertyLookup};
pub use state::{NodeState, TxState};
pub use visitor::TxStateVisitor;
