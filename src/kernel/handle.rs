use std::sync::Arc;

use tracing::debug;

use crate::api::TerminationFlag;
use crate::error::TerminationReason;

/// Shared, pooled identity of one transaction instance.
///
/// The reuse count advances each time the instance is handed out again, so a handle
/// taken for an earlier logical transaction no longer matches. Reuse count, open state
/// and termination reason change together under the termination flag's lock.
#[derive(Debug, Default)]
pub(crate) struct TransactionSlot {
    termination: Arc<TerminationFlag>,
}

impl TransactionSlot {
    pub(crate) fn termination(&self) -> Arc<TerminationFlag> {
        Arc::clone(&self.termination)
    }

    pub(crate) fn reuse_count(&self) -> u64 {
        self.termination.reuse_count()
    }

    /// Handle on the transaction open on this slot, if any.
    pub(crate) fn open_handle(self: &Arc<Self>) -> Option<TransactionHandle> {
        let reuse = self.termination.open_reuse()?;
        Some(TransactionHandle {
            slot: Arc::clone(self),
            reuse,
        })
    }

    /// Starts a new logical transaction on this slot.
    pub(crate) fn open(&self) {
        self.termination.open();
    }

    /// Ends the current logical transaction; handles taken so far become stale.
    pub(crate) fn close(&self) {
        self.termination.close();
    }
}

/// Reference to one logical transaction, usable from any thread.
#[derive(Clone, Debug)]
pub struct TransactionHandle {
    slot: Arc<TransactionSlot>,
    reuse: u64,
}

impl TransactionHandle {
    pub(crate) fn new(slot: Arc<TransactionSlot>) -> Self {
        let reuse = slot.reuse_count();
        Self { slot, reuse }
    }

    /// Reuse count of the pooled instance when this handle was taken.
    pub fn reuse_count(&self) -> u64 {
        self.reuse
    }

    /// Whether the logical transaction this handle refers to is still open.
    pub fn is_open(&self) -> bool {
        self.slot.termination.is_open_at(self.reuse)
    }

    /// Asks the transaction to stop. Its next guarded operation fails with `reason`.
    ///
    /// Returns `false`, and does nothing, if the transaction already closed, even when
    /// its pooled instance has since been reused.
    pub fn mark_for_termination(&self, reason: TerminationReason) -> bool {
        if !self.slot.termination.mark_if_current(self.reuse, reason) {
            debug!(reuse = self.reuse, "termination of stale transaction ignored");
            return false;
        }
        debug!(reuse = self.reuse, %reason, "transaction marked for termination");
        true
    }

    /// Reason the transaction was marked for termination, if it is still current.
    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.slot.termination.reason_if_current(self.reuse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handles_cannot_terminate_the_next_transaction() {
        let slot = Arc::new(TransactionSlot::default());
        slot.open();
        let first = TransactionHandle::new(Arc::clone(&slot));
        slot.close();
        slot.open();
        let second = TransactionHandle::new(Arc::clone(&slot));

        assert!(!first.mark_for_termination(TerminationReason::Terminated));
        assert_eq!(second.termination_reason(), None);
        assert!(second.mark_for_termination(TerminationReason::Timeout));
        assert_eq!(
            second.termination_reason(),
            Some(TerminationReason::Timeout)
        );
    }

    #[test]
    fn closed_transactions_ignore_termination() {
        let slot = Arc::new(TransactionSlot::default());
        slot.open();
        let handle = TransactionHandle::new(Arc::clone(&slot));
        assert!(handle.is_open());
        slot.close();

        assert!(!handle.is_open());
        assert!(!handle.mark_for_termination(TerminationReason::Terminated));
        assert_eq!(slot.termination().reason(), None);
    }

    #[test]
    fn racing_reuse_never_terminates_the_next_transaction() {
        let slot = Arc::new(TransactionSlot::default());
        for _ in 0..200 {
            slot.open();
            let stale = TransactionHandle::new(Arc::clone(&slot));
            let marker = std::thread::spawn(move || {
                stale.mark_for_termination(TerminationReason::Terminated)
            });
            slot.close();
            slot.open();
            let next = TransactionHandle::new(Arc::clone(&slot));
            // A mark that landed before the close is cleared by the reopen.
            marker.join().expect("marker thread");
            assert_eq!(next.termination_reason(), None);
            slot.close();
        }
    }
}
