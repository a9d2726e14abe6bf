use std::time::{Duration, Instant};

use crate::error::TerminationReason;
use crate::types::{KernelError, Result};

/// Resource check run before every guarded operation.
pub trait Guard: Send + Sync {
    /// Fails if the transaction started at `started` may not continue.
    fn check(&self, started: Instant) -> Result<()>;
}

/// Guard that never aborts.
#[derive(Default)]
pub struct NoopGuard;

impl Guard for NoopGuard {
    fn check(&self, _started: Instant) -> Result<()> {
        Ok(())
    }
}

/// Guard that aborts transactions older than a fixed budget.
pub struct TimeoutGuard {
    budget: Duration,
}

impl TimeoutGuard {
    /// Allows each transaction `budget` of wall-clock time.
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }
}

impl Guard for TimeoutGuard {
    fn check(&self, started: Instant) -> Result<()> {
        if started.elapsed() > self.budget {
            return Err(KernelError::TransactionTerminated(TerminationReason::Timeout));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_guard_aborts_old_transactions() {
        let guard = TimeoutGuard::new(Duration::from_millis(10));
        assert!(guard.check(Instant::now()).is_ok());
        let old = Instant::now() - Duration::from_millis(50);
        assert!(matches!(
            guard.check(old),
            Err(KernelError::TransactionTerminated(TerminationReason::Timeout))
        ));
    }
}
