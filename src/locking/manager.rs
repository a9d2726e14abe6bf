use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::locking::{LockClientId, LockResource, LockType};
use crate::types::{KernelError, Result};

/// Blocking read/write lock service keyed by [`LockResource`].
///
/// Locks are reentrant per client: every successful acquisition must be matched by one
/// release of the same type. Implementations may fail an acquisition to break a
/// deadlock or bound a wait; such failures surface as ordinary errors.
pub trait LockManager: Send + Sync {
    /// Acquires a shared lock, blocking while another client holds it exclusively.
    fn get_read_lock(&self, client: LockClientId, resource: &LockResource) -> Result<()>;

    /// Acquires an exclusive lock, blocking while any other client holds it.
    fn get_write_lock(&self, client: LockClientId, resource: &LockResource) -> Result<()>;

    /// Releases one shared hold.
    fn release_read_lock(&self, client: LockClientId, resource: &LockResource) -> Result<()>;

    /// Releases one exclusive hold.
    fn release_write_lock(&self, client: LockClientId, resource: &LockResource) -> Result<()>;
}

#[derive(Default, Debug)]
struct ResourceLock {
    readers: FxHashMap<LockClientId, u32>,
    writer: Option<(LockClientId, u32)>,
}

impl ResourceLock {
    fn is_free(&self) -> bool {
        self.readers.is_empty() && self.writer.is_none()
    }

    fn blockers(&self, client: LockClientId, lock_type: LockType) -> Vec<LockClientId> {
        let mut out = Vec::new();
        if let Some((writer, _)) = self.writer {
            if writer != client {
                out.push(writer);
            }
        }
        if lock_type == LockType::Write {
            out.extend(self.readers.keys().copied().filter(|reader| *reader != client));
        }
        out
    }
}

#[derive(Default)]
struct LockTable {
    locks: FxHashMap<LockResource, ResourceLock>,
    waiting: FxHashMap<LockClientId, (LockResource, LockType)>,
}

impl LockTable {
    fn blockers(
        &self,
        client: LockClientId,
        resource: &LockResource,
        lock_type: LockType,
    ) -> Vec<LockClientId> {
        self.locks
            .get(resource)
            .map(|lock| lock.blockers(client, lock_type))
            .unwrap_or_default()
    }

    /// Whether `client` waiting on `resource` would close a cycle in the wait-for graph.
    fn would_deadlock(
        &self,
        client: LockClientId,
        resource: &LockResource,
        lock_type: LockType,
    ) -> bool {
        let mut queue: VecDeque<LockClientId> =
            self.blockers(client, resource, lock_type).into();
        let mut seen = FxHashSet::default();
        while let Some(holder) = queue.pop_front() {
            if holder == client {
                return true;
            }
            if !seen.insert(holder) {
                continue;
            }
            if let Some((waited, waited_type)) = self.waiting.get(&holder) {
                queue.extend(self.blockers(holder, waited, *waited_type));
            }
        }
        false
    }

    fn grant(&mut self, client: LockClientId, resource: &LockResource, lock_type: LockType) {
        let lock = self.locks.entry(resource.clone()).or_default();
        match lock_type {
            LockType::Read => *lock.readers.entry(client).or_insert(0) += 1,
            LockType::Write => match &mut lock.writer {
                Some((_, count)) => *count += 1,
                None => lock.writer = Some((client, 1)),
            },
        }
    }
}

/// In-process [`LockManager`] with deadlock detection and an optional wait bound.
///
/// A write request by the only reader of a resource is granted in place (upgrade). A
/// request that would wait on a client already waiting, directly or transitively, on
/// the requester fails with [`KernelError::DeadlockDetected`].
pub struct InProcessLockManager {
    table: Mutex<LockTable>,
    released: Condvar,
    timeout: Option<Duration>,
}

impl Default for InProcessLockManager {
    fn default() -> Self {
        Self::new(None)
    }
}

impl InProcessLockManager {
    /// Creates a manager. `timeout` bounds how long one acquisition may wait.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
            timeout,
        }
    }

    /// Number of holds `client` has of `lock_type` on `resource`.
    pub fn hold_count(
        &self,
        client: LockClientId,
        resource: &LockResource,
        lock_type: LockType,
    ) -> u32 {
        let table = self.table.lock();
        let Some(lock) = table.locks.get(resource) else {
            return 0;
        };
        match lock_type {
            LockType::Read => lock.readers.get(&client).copied().unwrap_or(0),
            LockType::Write => match lock.writer {
                Some((writer, count)) if writer == client => count,
                _ => 0,
            },
        }
    }

    /// Number of resources currently locked by anyone.
    pub fn locked_resources(&self) -> usize {
        self.table.lock().locks.len()
    }

    fn acquire(
        &self,
        client: LockClientId,
        resource: &LockResource,
        lock_type: LockType,
    ) -> Result<()> {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut table = self.table.lock();
        loop {
            if table.blockers(client, resource, lock_type).is_empty() {
                table.waiting.remove(&client);
                table.grant(client, resource, lock_type);
                trace!(client = client.0, %resource, lock = lock_type.as_str(), "lock granted");
                return Ok(());
            }
            if table.would_deadlock(client, resource, lock_type) {
                table.waiting.remove(&client);
                return Err(KernelError::DeadlockDetected {
                    resource: resource.clone(),
                    lock_type: lock_type.as_str(),
                });
            }
            table
                .waiting
                .insert(client, (resource.clone(), lock_type));
            trace!(client = client.0, %resource, lock = lock_type.as_str(), "waiting for lock");
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    let timed_out = now >= deadline
                        || self
                            .released
                            .wait_for(&mut table, deadline - now)
                            .timed_out();
                    if timed_out && !table.blockers(client, resource, lock_type).is_empty() {
                        table.waiting.remove(&client);
                        return Err(KernelError::LockTimeout {
                            resource: resource.clone(),
                            lock_type: lock_type.as_str(),
                        });
                    }
                }
                None => self.released.wait(&mut table),
            }
        }
    }

    fn release(
        &self,
        client: LockClientId,
        resource: &LockResource,
        lock_type: LockType,
    ) -> Result<()> {
        let mut table = self.table.lock();
        let not_held = || {
            KernelError::Invariant(format!(
                "client {client} does not hold a {lock_type} lock on {resource}"
            ))
        };
        let lock = table.locks.get_mut(resource).ok_or_else(not_held)?;
        match lock_type {
            LockType::Read => {
                let count = lock.readers.get_mut(&client).ok_or_else(not_held)?;
                *count -= 1;
                if *count == 0 {
                    lock.readers.remove(&client);
                }
            }
            LockType::Write => match &mut lock.writer {
                Some((writer, count)) if *writer == client => {
                    *count -= 1;
                    if *count == 0 {
                        lock.writer = None;
                    }
                }
                _ => return Err(not_held()),
            },
        }
        if lock.is_free() {
            table.locks.remove(resource);
        }
        drop(table);
        trace!(client = client.0, %resource, lock = lock_type.as_str(), "lock released");
        self.released.notify_all();
        Ok(())
    }
}

impl LockManager for InProcessLockManager {
    fn get_read_lock(&self, client: LockClientId, resource: &LockResource) -> Result<()> {
        self.acquire(client, resource, LockType::Read)
    }

    fn get_write_lock(&self, client: LockClientId, resource: &LockResource) -> Result<()> {
        self.acquire(client, resource, LockType::Write)
    }

    fn release_read_lock(&self, client: LockClientId, resource: &LockResource) -> Result<()> {
        self.release(client, resource, LockType::Read)
    }

    fn release_write_lock(&self, client: LockClientId, resource: &LockResource) -> Result<()> {
        self.release(client, resource, LockType::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    use crate::types::{ErrorKind, NodeId};

    const A: LockClientId = LockClientId(1);
    const B: LockClientId = LockClientId(2);

    #[test]
    fn reentrant_and_upgradable() -> Result<()> {
        let manager = InProcessLockManager::default();
        let node = LockResource::Node(NodeId(1));
        manager.get_read_lock(A, &node)?;
        manager.get_read_lock(A, &node)?;
        manager.get_write_lock(A, &node)?;
        assert_eq!(manager.hold_count(A, &node, LockType::Read), 2);
        assert_eq!(manager.hold_count(A, &node, LockType::Write), 1);
        manager.release_write_lock(A, &node)?;
        manager.release_read_lock(A, &node)?;
        manager.release_read_lock(A, &node)?;
        assert_eq!(manager.locked_resources(), 0);
        Ok(())
    }

    #[test]
    fn releasing_unheld_lock_fails() {
        let manager = InProcessLockManager::default();
        let err = manager
            .release_write_lock(A, &LockResource::Schema)
            .expect_err("nothing held");
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn writer_waits_for_readers() -> Result<()> {
        let manager = Arc::new(InProcessLockManager::default());
        manager.get_read_lock(A, &LockResource::Schema)?;
        let (tx, rx) = mpsc::channel();
        let waiter = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                manager.get_write_lock(B, &LockResource::Schema)?;
                tx.send(()).ok();
                manager.release_write_lock(B, &LockResource::Schema)
            })
        };
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        manager.release_read_lock(A, &LockResource::Schema)?;
        rx.recv_timeout(Duration::from_secs(5))
            .expect("writer granted after reader left");
        waiter.join().expect("thread")?;
        Ok(())
    }

    #[test]
    fn cycle_is_reported_as_deadlock() -> Result<()> {
        let manager = Arc::new(InProcessLockManager::default());
        let first = LockResource::Node(NodeId(1));
        let second = LockResource::Node(NodeId(2));
        manager.get_write_lock(A, &first)?;
        manager.get_write_lock(B, &second)?;

        let waiter = {
            let manager = Arc::clone(&manager);
            let first = first.clone();
            thread::spawn(move || manager.get_write_lock(B, &first))
        };
        // Let B start waiting on `first`.
        while manager.table.lock().waiting.get(&B).is_none() {
            thread::yield_now();
        }
        let err = manager
            .get_write_lock(A, &second)
            .expect_err("A would wait on B which waits on A");
        assert!(matches!(err, KernelError::DeadlockDetected { .. }));

        manager.release_write_lock(A, &first)?;
        waiter.join().expect("thread")?;
        Ok(())
    }

    #[test]
    fn bounded_wait_times_out() -> Result<()> {
        let manager = Arc::new(InProcessLockManager::new(Some(Duration::from_millis(20))));
        manager.get_write_lock(A, &LockResource::Graph)?;
        let other = Arc::clone(&manager);
        let err = thread::spawn(move || other.get_read_lock(B, &LockResource::Graph))
            .join()
            .expect("thread")
            .expect_err("A holds the graph");
        assert!(matches!(err, KernelError::LockTimeout { .. }));
        Ok(())
    }
}
