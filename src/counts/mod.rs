//! Cardinality counters: nodes by label, relationships by endpoint label and type, and
//! index statistics.
//!
//! Committed totals live in a [`CountsState`] owned by the store. Each commit folds in
//! the deltas a [`CountsRecordState`] accumulates while the transaction's commands are
//! applied; open transactions see their own pending changes through [`CountsDelta`].
//! [`CountsComputer`] rebuilds the totals from a full scan and [`CountsVerifier`] reports
//! where they diverge.

mod delta;
mod key;
mod record;
mod state;
mod verifier;

pub use delta::CountsDelta;
pub use key::{CountsKey, CountsValue};
pub use record::{CountsRecordState, LabelField, TypedDegree, INLINE_LABEL_CAPACITY};
pub use state::CountsState;
pub use verifier::{CountsComputer, CountsVerifier, Difference};
