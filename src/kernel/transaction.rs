use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::api::{
    DataWriteOperations, KernelStatement, ReadOperations, SchemaWriteOperations,
    StatementOperationParts, TokenWriteOperations, TransactionType,
};
use crate::error::TerminationReason;
use crate::kernel::commit::CommandBuilder;
use crate::kernel::handle::TransactionSlot;
use crate::kernel::pool::Shared;
use crate::kernel::TransactionHandle;
use crate::store::{now_millis, TransactionHeader, TransactionRepresentation};
use crate::txstate::TxState;
use crate::types::{KernelError, Result, TxId};

/// One logical transaction against the kernel.
///
/// Mark it with [`success`](Self::success) and [`close`](Self::close) it to commit.
/// Closing without `success`, or dropping it unclosed, rolls it back. The instance
/// returns to the pool when dropped.
pub struct KernelTransaction {
    shared: Arc<Shared>,
    slot: Arc<TransactionSlot>,
    statement: Option<KernelStatement>,
    success: bool,
    failure: bool,
    last_committed_tx_when_started: TxId,
    started_at_ms: u64,
}

impl KernelTransaction {
    pub(crate) fn new(
        shared: Arc<Shared>,
        slot: Arc<TransactionSlot>,
        statement: KernelStatement,
        last_committed_tx_when_started: TxId,
    ) -> Self {
        Self {
            shared,
            slot,
            statement: Some(statement),
            success: false,
            failure: false,
            last_committed_tx_when_started,
            started_at_ms: now_millis(),
        }
    }

    /// Marks the transaction for commit on close.
    pub fn success(&mut self) {
        self.success = true;
    }

    /// Marks the transaction for rollback on close, overriding `success`.
    pub fn failure(&mut self) {
        self.failure = true;
    }

    /// Opens a statement. Operations are only accepted while one is open.
    pub fn acquire_statement(&mut self) -> Result<Statement<'_>> {
        let st = self
            .statement
            .as_mut()
            .ok_or(KernelError::IllegalState("transaction is closed"))?;
        if st.is_closed() {
            return Err(KernelError::IllegalState("transaction is closed"));
        }
        st.assert_not_terminated()?;
        st.acquire_statement();
        Ok(Statement {
            parts: &self.shared.parts,
            st,
        })
    }

    /// Handle for observing or terminating this transaction from elsewhere.
    pub fn handle(&self) -> TransactionHandle {
        TransactionHandle::new(Arc::clone(&self.slot))
    }

    /// Asks the transaction to stop; see [`TransactionHandle::mark_for_termination`].
    pub fn mark_for_termination(&self, reason: TerminationReason) -> bool {
        self.handle().mark_for_termination(reason)
    }

    /// Reason the transaction was marked for termination, if it was.
    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.statement
            .as_ref()
            .and_then(KernelStatement::termination_reason)
    }

    /// Whether the transaction has not been closed yet.
    pub fn is_open(&self) -> bool {
        self.statement.as_ref().is_some_and(|st| !st.is_closed())
    }

    /// Whether the transaction has recorded any write.
    pub fn has_changes(&self) -> bool {
        self.statement
            .as_ref()
            .is_some_and(KernelStatement::has_tx_state_with_changes)
    }

    /// Kind of writes performed so far.
    pub fn transaction_type(&self) -> TransactionType {
        self.statement
            .as_ref()
            .map_or(TransactionType::Any, KernelStatement::transaction_type)
    }

    /// Last committed transaction when this one started.
    pub fn last_committed_tx_when_started(&self) -> TxId {
        self.last_committed_tx_when_started
    }

    /// Commits or rolls back, returning the id of the committed batch.
    ///
    /// Returns `None` for a rollback or a commit with nothing to write. A transaction
    /// marked for termination always rolls back; if it was also marked successful the
    /// caller gets [`KernelError::TransactionTerminated`].
    pub fn close(mut self) -> Result<Option<TxId>> {
        let shared = Arc::clone(&self.shared);
        let st = self
            .statement
            .as_mut()
            .ok_or(KernelError::IllegalState("transaction is closed"))?;
        if st.is_closed() {
            return Err(KernelError::IllegalState("transaction is closed"));
        }
        let client = st.locks().client().0;
        if st.force_close_statement() {
            warn!(client, "statement left open at transaction close");
        }

        let outcome = if let Some(reason) = st.termination_reason() {
            let rolled_back = rollback(&shared, st);
            shared.monitor.transaction_terminated();
            debug!(client, %reason, "terminated transaction closed");
            match rolled_back {
                Err(err) => Err(err),
                Ok(()) if self.success => Err(KernelError::TransactionTerminated(reason)),
                Ok(()) => Ok(None),
            }
        } else if self.failure || !self.success {
            match rollback(&shared, st) {
                Err(err) => Err(err),
                Ok(()) if self.success => Err(KernelError::TransactionFailure {
                    message: "transaction rolled back even though it was marked successful",
                    cause: None,
                }),
                Ok(()) => Ok(None),
            }
        } else {
            let header =
                TransactionHeader::new(self.last_committed_tx_when_started, self.started_at_ms);
            commit(&shared, st, header)
        };

        st.mark_closed();
        self.slot.close();
        outcome
    }
}

impl Drop for KernelTransaction {
    fn drop(&mut self) {
        let Some(mut st) = self.statement.take() else {
            return;
        };
        if !st.is_closed() {
            let client = st.locks().client().0;
            warn!(client, "transaction dropped without close, rolling back");
            st.force_close_statement();
            if let Err(err) = rollback(&self.shared, &mut st) {
                error!(client, error = %err, "rollback of dropped transaction failed");
            }
            st.mark_closed();
            self.slot.close();
        }
        self.shared.release(Arc::clone(&self.slot), st);
    }
}

fn commit(shared: &Shared, st: &mut KernelStatement, header: TransactionHeader) -> Result<Option<TxId>> {
    let client = st.locks().client().0;
    let outcome = match st.take_tx_state() {
        Some(tx) if tx.has_changes() => {
            let built = CommandBuilder::new(
                shared.store.as_ref(),
                &shared.config.default_index_provider,
            )
            .build(&tx);
            let committed = built.and_then(|commands| {
                shared
                    .commit_process
                    .commit(TransactionRepresentation::new(header, commands))
            });
            match committed {
                Ok(id) => {
                    if tx.has_schema_changes() {
                        shared.schema_state.clear();
                    }
                    Ok(Some(id))
                }
                Err(err) => {
                    if let Err(undo) = undo(shared, &tx) {
                        error!(client, error = %undo, "cleanup after failed commit failed");
                    }
                    Err(err)
                }
            }
        }
        _ => Ok(None),
    };
    let released = st.locks().release_locks();
    match outcome {
        Ok(id) => {
            shared.monitor.transaction_committed();
            debug!(client, tx = ?id.map(|id| id.0), "transaction committed");
            released.map(|()| id)
        }
        Err(err) => {
            shared.monitor.transaction_rolled_back();
            warn!(client, error = %err, "commit failed, transaction rolled back");
            Err(err)
        }
    }
}

fn rollback(shared: &Shared, st: &mut KernelStatement) -> Result<()> {
    let undone = match st.take_tx_state() {
        Some(tx) => undo(shared, &tx),
        None => Ok(()),
    };
    let released = st.locks().release_locks();
    shared.monitor.transaction_rolled_back();
    debug!(client = st.locks().client().0, "transaction rolled back");
    undone.and(released)
}

/// Reverts the side effects a transaction had outside its overlay: constraint indexes
/// built for it and ids reserved for its new entities.
fn undo(shared: &Shared, tx: &TxState) -> Result<()> {
    let mut result = Ok(());
    for (constraint, index) in tx.constraint_indexes_created_in_tx() {
        if let Err(err) = shared
            .constraint_index_creator
            .drop_uniqueness_constraint_index(index)
        {
            error!(%constraint, index = index.0, error = %err, "could not drop constraint index");
            if result.is_ok() {
                result = Err(KernelError::TransactionFailure {
                    message: "could not drop a constraint index created in the transaction",
                    cause: Some(Box::new(err)),
                });
            }
        }
    }
    for node in tx.added_and_removed_nodes().added() {
        shared.store.release_node_id(*node);
    }
    for relationship in tx.added_and_removed_relationships().added() {
        shared.store.release_relationship_id(*relationship);
    }
    result
}

/// An open statement of a [`KernelTransaction`].
///
/// Closing the last statement drops the statement cache. Dropping the value closes it.
pub struct Statement<'a> {
    parts: &'a StatementOperationParts,
    st: &'a mut KernelStatement,
}

impl Statement<'_> {
    /// Read operations.
    pub fn read_operations(&mut self) -> ReadOperations<'_> {
        ReadOperations::new(self.parts, self.st)
    }

    /// Data write operations. Fails if the transaction already wrote schema.
    pub fn data_write_operations(&mut self) -> Result<DataWriteOperations<'_>> {
        DataWriteOperations::new(self.parts, self.st)
    }

    /// Schema write operations. Fails if the transaction already wrote data.
    pub fn schema_write_operations(&mut self) -> Result<SchemaWriteOperations<'_>> {
        SchemaWriteOperations::new(self.parts, self.st)
    }

    /// Token creation.
    pub fn token_write_operations(&mut self) -> TokenWriteOperations<'_> {
        TokenWriteOperations::new(self.parts, self.st)
    }

    /// Opens another statement on the same transaction.
    pub fn nested(&mut self) -> Statement<'_> {
        self.st.acquire_statement();
        Statement {
            parts: self.parts,
            st: &mut *self.st,
        }
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.st.release_statement() {
            debug!(error = %err, "statement already closed");
        }
    }
}
