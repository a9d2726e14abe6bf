use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Observer of transaction lifecycle events.
///
/// Implementations must be cheap; they are called on the committing thread.
pub trait TransactionMonitor: Send + Sync {
    /// A transaction was handed out by the pool.
    fn transaction_started(&self);

    /// A transaction committed.
    fn transaction_committed(&self);

    /// A transaction rolled back, explicitly or after a failed commit.
    fn transaction_rolled_back(&self);

    /// A transaction that had been marked for termination was closed.
    fn transaction_terminated(&self);
}

/// A [`TransactionMonitor`] that records nothing.
#[derive(Default)]
pub struct NoopMonitor;

impl TransactionMonitor for NoopMonitor {
    fn transaction_started(&self) {}
    fn transaction_committed(&self) {}
    fn transaction_rolled_back(&self) {}
    fn transaction_terminated(&self) {}
}

/// A [`TransactionMonitor`] backed by atomic counters.
#[derive(Default)]
pub struct CounterMonitor {
    /// Transactions started.
    pub started: AtomicU64,
    /// Transactions committed.
    pub committed: AtomicU64,
    /// Transactions rolled back.
    pub rolled_back: AtomicU64,
    /// Terminated transactions closed.
    pub terminated: AtomicU64,
}

impl CounterMonitor {
    /// Shared counter monitor.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of the counters.
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            terminated: self.terminated.load(Ordering::Relaxed),
        }
    }
}

impl TransactionMonitor for CounterMonitor {
    fn transaction_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    fn transaction_committed(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    fn transaction_rolled_back(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    fn transaction_terminated(&self) {
        self.terminated.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of a [`CounterMonitor`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MonitorSnapshot {
    /// Transactions started.
    pub started: u64,
    /// Transactions committed.
    pub committed: u64,
    /// Transactions rolled back.
    pub rolled_back: u64,
    /// Terminated transactions closed.
    pub terminated: u64,
}
