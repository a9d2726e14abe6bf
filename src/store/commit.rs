use crate::store::TransactionRepresentation;
use crate::types::{Result, TxId};

/// Sink for committed command batches.
///
/// Batches are applied atomically and in call order; the returned id is the one the
/// batch was committed under.
pub trait TransactionCommitProcess: Send + Sync {
    /// Applies `transaction` and returns its id.
    fn commit(&self, transaction: TransactionRepresentation) -> Result<TxId>;
}
