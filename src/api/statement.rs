use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::TerminationReason;
use crate::locking::LockHolder;
use crate::txstate::TxState;
use crate::types::{KernelError, LabelId, NodeId, Result};
use crate::value::Property;

/// What a transaction has written so far. Upgrades only go from `Any` to one of the others.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransactionType {
    /// Nothing written yet.
    Any,
    /// Data written.
    Data,
    /// Schema written.
    Schema,
}

impl TransactionType {
    fn upgrade_to_data(self) -> Result<Self> {
        match self {
            TransactionType::Schema => Err(KernelError::InvalidTransactionType(
                "cannot perform data updates in a transaction that has performed schema updates",
            )),
            _ => Ok(TransactionType::Data),
        }
    }

    fn upgrade_to_schema(self) -> Result<Self> {
        match self {
            TransactionType::Data => Err(KernelError::InvalidTransactionType(
                "cannot perform schema updates in a transaction that has performed data updates",
            )),
            _ => Ok(TransactionType::Schema),
        }
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    reuse: u64,
    open: bool,
    reason: Option<TerminationReason>,
}

/// Termination request shared between a transaction and whoever may terminate it.
///
/// Also carries the lifecycle of the pooled instance: how often it was reused and whether
/// a logical transaction is open on it. Requests stamped with an older reuse count are
/// refused under the same lock that advances it.
#[derive(Debug, Default)]
pub struct TerminationFlag {
    state: Mutex<Lifecycle>,
}

impl TerminationFlag {
    /// Records a termination request against the current transaction. The first reason
    /// wins.
    pub fn mark(&self, reason: TerminationReason) {
        self.state.lock().reason.get_or_insert(reason);
    }

    /// Records a termination request if the transaction opened at reuse count `reuse` is
    /// still open. Returns whether it was.
    pub(crate) fn mark_if_current(&self, reuse: u64, reason: TerminationReason) -> bool {
        let mut state = self.state.lock();
        if !state.open || state.reuse != reuse {
            return false;
        }
        state.reason.get_or_insert(reason);
        true
    }

    /// Reason of a pending termination request.
    pub fn reason(&self) -> Option<TerminationReason> {
        self.state.lock().reason
    }

    /// Reason of the transaction opened at reuse count `reuse`, if it is still current.
    pub(crate) fn reason_if_current(&self, reuse: u64) -> Option<TerminationReason> {
        let state = self.state.lock();
        if state.reuse == reuse {
            state.reason
        } else {
            None
        }
    }

    pub(crate) fn reuse_count(&self) -> u64 {
        self.state.lock().reuse
    }

    /// Reuse count of the open transaction, if one is open.
    pub(crate) fn open_reuse(&self) -> Option<u64> {
        let state = self.state.lock();
        state.open.then_some(state.reuse)
    }

    pub(crate) fn is_open_at(&self, reuse: u64) -> bool {
        let state = self.state.lock();
        state.open && state.reuse == reuse
    }

    /// Starts a new logical transaction with no pending request. Returns its reuse count.
    pub(crate) fn open(&self) -> u64 {
        let mut state = self.state.lock();
        state.open = true;
        state.reason = None;
        state.reuse
    }

    /// Ends the current logical transaction; requests stamped with its reuse count are
    /// refused from now on.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.open = false;
        state.reuse += 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum CacheKey {
    Labels(NodeId),
    Properties(NodeId),
}

#[derive(Clone, Debug)]
enum Cached {
    Labels(Vec<LabelId>),
    Properties(Vec<Property>),
}

/// Per-transaction context every operation layer works against.
///
/// Holds the lazily created [`TxState`], the transaction's [`LockHolder`], the caching
/// layer's statement memo, the transaction type and the termination flag. A statement is
/// open while its reference count is positive.
pub struct KernelStatement {
    tx_state: Option<TxState>,
    locks: LockHolder,
    cache: LruCache<CacheKey, Cached>,
    tx_type: TransactionType,
    started: Instant,
    termination: Arc<TerminationFlag>,
    statement_refs: usize,
    closed: bool,
}

impl KernelStatement {
    pub(crate) fn new(
        locks: LockHolder,
        cache_capacity: NonZeroUsize,
        termination: Arc<TerminationFlag>,
    ) -> Self {
        Self {
            tx_state: None,
            locks,
            cache: LruCache::new(cache_capacity),
            tx_type: TransactionType::Any,
            started: Instant::now(),
            termination,
            statement_refs: 0,
            closed: false,
        }
    }

    /// Prepares a pooled context for a new logical transaction.
    pub(crate) fn reset(&mut self) {
        self.tx_state = None;
        self.cache.clear();
        self.tx_type = TransactionType::Any;
        self.started = Instant::now();
        self.statement_refs = 0;
        self.closed = false;
    }

    /// Whether an overlay exists.
    pub fn has_tx_state(&self) -> bool {
        self.tx_state.is_some()
    }

    /// Whether an overlay exists and recorded any write.
    pub fn has_tx_state_with_changes(&self) -> bool {
        self.tx_state.as_ref().is_some_and(TxState::has_changes)
    }

    /// The overlay, created on first use.
    pub fn tx_state(&mut self) -> &mut TxState {
        self.tx_state.get_or_insert_with(TxState::new)
    }

    /// The overlay, if one exists.
    pub fn tx_state_ref(&self) -> Option<&TxState> {
        self.tx_state.as_ref()
    }

    pub(crate) fn take_tx_state(&mut self) -> Option<TxState> {
        self.tx_state.take()
    }

    /// Locks of the transaction.
    pub fn locks(&mut self) -> &mut LockHolder {
        &mut self.locks
    }

    /// Current transaction type.
    pub fn transaction_type(&self) -> TransactionType {
        self.tx_type
    }

    /// Marks the transaction as a data writer.
    pub fn upgrade_to_data_write(&mut self) -> Result<()> {
        self.tx_type = self.tx_type.upgrade_to_data()?;
        Ok(())
    }

    /// Marks the transaction as a schema writer.
    pub fn upgrade_to_schema_write(&mut self) -> Result<()> {
        self.tx_type = self.tx_type.upgrade_to_schema()?;
        Ok(())
    }

    /// When the transaction started.
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Reason the transaction was marked for termination, if it was.
    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.termination.reason()
    }

    /// Fails if the transaction was marked for termination.
    pub fn assert_not_terminated(&self) -> Result<()> {
        match self.termination.reason() {
            Some(reason) => Err(KernelError::TransactionTerminated(reason)),
            None => Ok(()),
        }
    }

    /// Fails unless the transaction and a statement on it are open.
    pub fn assert_open(&self) -> Result<()> {
        if self.closed {
            return Err(KernelError::IllegalState("transaction is closed"));
        }
        if self.statement_refs == 0 {
            return Err(KernelError::IllegalState("statement has been closed"));
        }
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
    }

    pub(crate) fn statement_refs(&self) -> usize {
        self.statement_refs
    }

    pub(crate) fn acquire_statement(&mut self) {
        self.statement_refs += 1;
    }

    pub(crate) fn release_statement(&mut self) -> Result<()> {
        if self.statement_refs == 0 {
            return Err(KernelError::IllegalState("released a statement that is not open"));
        }
        self.statement_refs -= 1;
        if self.statement_refs == 0 {
            self.cache.clear();
        }
        Ok(())
    }

    /// Closes a statement left open, returning whether there was one.
    pub(crate) fn force_close_statement(&mut self) -> bool {
        if self.statement_refs == 0 {
            return false;
        }
        debug!(refs = self.statement_refs, "force closing statement");
        self.statement_refs = 0;
        self.cache.clear();
        true
    }

    pub(crate) fn cached_labels(&mut self, node: NodeId) -> Option<Vec<LabelId>> {
        match self.cache.get(&CacheKey::Labels(node)) {
            Some(Cached::Labels(labels)) => Some(labels.clone()),
            _ => None,
        }
    }

    pub(crate) fn cache_labels(&mut self, node: NodeId, labels: Vec<LabelId>) {
        self.cache.put(CacheKey::Labels(node), Cached::Labels(labels));
    }

    pub(crate) fn cached_properties(&mut self, node: NodeId) -> Option<Vec<Property>> {
        match self.cache.get(&CacheKey::Properties(node)) {
            Some(Cached::Properties(properties)) => Some(properties.clone()),
            _ => None,
        }
    }

    pub(crate) fn cache_properties(&mut self, node: NodeId, properties: Vec<Property>) {
        self.cache
            .put(CacheKey::Properties(node), Cached::Properties(properties));
    }

    pub(crate) fn invalidate_node(&mut self, node: NodeId) {
        self.cache.pop(&CacheKey::Labels(node));
        self.cache.pop(&CacheKey::Properties(node));
    }

    pub(crate) fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locking::{InProcessLockManager, LockClientId};

    fn statement() -> KernelStatement {
        let locks = LockHolder::new(Arc::new(InProcessLockManager::default()), LockClientId(1));
        let capacity = NonZeroUsize::new(4).expect("non-zero");
        KernelStatement::new(locks, capacity, Arc::default())
    }

    #[test]
    fn data_then_schema_is_rejected() {
        let mut st = statement();
        st.upgrade_to_data_write().expect("any -> data");
        st.upgrade_to_data_write().expect("data -> data");
        let err = st.upgrade_to_schema_write().expect_err("data -> schema");
        assert!(matches!(err, KernelError::InvalidTransactionType(_)));
    }

    #[test]
    fn schema_then_data_is_rejected() {
        let mut st = statement();
        st.upgrade_to_schema_write().expect("any -> schema");
        assert!(st.upgrade_to_data_write().is_err());
        assert_eq!(st.transaction_type(), TransactionType::Schema);
    }

    #[test]
    fn statement_refs_gate_operations() {
        let mut st = statement();
        assert!(st.assert_open().is_err());
        st.acquire_statement();
        st.acquire_statement();
        st.release_statement().expect("release");
        assert!(st.assert_open().is_ok());
        st.release_statement().expect("release");
        assert!(matches!(
            st.release_statement(),
            Err(KernelError::IllegalState(_))
        ));
    }

    #[test]
    fn first_termination_reason_wins() {
        let st = statement();
        st.termination.mark(TerminationReason::Timeout);
        st.termination.mark(TerminationReason::Terminated);
        assert!(matches!(
            st.assert_not_terminated(),
            Err(KernelError::TransactionTerminated(TerminationReason::Timeout))
        ));
    }

    #[test]
    fn cache_is_dropped_when_last_statement_closes() {
        let mut st = statement();
        st.acquire_statement();
        st.cache_labels(NodeId(1), vec![LabelId(2)]);
        assert_eq!(st.cached_labels(NodeId(1)), Some(vec![LabelId(2)]));
        st.release_statement().expect("release");
        assert_eq!(st.cached_labels(NodeId(1)), None);
    }
}
