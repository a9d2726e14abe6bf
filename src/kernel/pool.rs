use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::api::{KernelStatement, StatementOperationParts};
use crate::config::KernelConfig;
use crate::error::TerminationReason;
use crate::kernel::handle::TransactionSlot;
use crate::kernel::{KernelTransaction, SchemaState, TransactionHandle, TransactionMonitor};
use crate::locking::{LockClientId, LockHolder, LockManager};
use crate::store::{ConstraintIndexCreator, StoreReadLayer, TransactionCommitProcess};
use crate::types::{KernelError, Result};

/// A closed transaction instance waiting to be handed out again.
struct Pooled {
    slot: Arc<TransactionSlot>,
    statement: KernelStatement,
}

/// Everything transactions of one kernel share.
pub(crate) struct Shared {
    pub(crate) parts: StatementOperationParts,
    pub(crate) store: Arc<dyn StoreReadLayer>,
    pub(crate) commit_process: Arc<dyn TransactionCommitProcess>,
    pub(crate) constraint_index_creator: Arc<dyn ConstraintIndexCreator>,
    pub(crate) lock_manager: Arc<dyn LockManager>,
    pub(crate) schema_state: Arc<SchemaState>,
    pub(crate) monitor: Arc<dyn TransactionMonitor>,
    pub(crate) config: KernelConfig,
    running: AtomicBool,
    next_client: AtomicU64,
    pool: Mutex<Vec<Pooled>>,
    registry: RwLock<Vec<Arc<TransactionSlot>>>,
}

impl Shared {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        parts: StatementOperationParts,
        store: Arc<dyn StoreReadLayer>,
        commit_process: Arc<dyn TransactionCommitProcess>,
        constraint_index_creator: Arc<dyn ConstraintIndexCreator>,
        lock_manager: Arc<dyn LockManager>,
        schema_state: Arc<SchemaState>,
        monitor: Arc<dyn TransactionMonitor>,
        config: KernelConfig,
    ) -> Self {
        Self {
            parts,
            store,
            commit_process,
            constraint_index_creator,
            lock_manager,
            schema_state,
            monitor,
            config,
            running: AtomicBool::new(true),
            next_client: AtomicU64::new(1),
            pool: Mutex::new(Vec::new()),
            registry: RwLock::new(Vec::new()),
        }
    }

    fn create_instance(&self) -> Pooled {
        let slot = Arc::new(TransactionSlot::default());
        let client = LockClientId(self.next_client.fetch_add(1, Ordering::Relaxed));
        let locks = LockHolder::new(Arc::clone(&self.lock_manager), client);
        let capacity =
            NonZeroUsize::new(self.config.statement_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let statement = KernelStatement::new(locks, capacity, slot.termination());
        self.registry.write().push(Arc::clone(&slot));
        debug!(client = client.0, "transaction instance created");
        Pooled { slot, statement }
    }

    /// Takes back a closed instance, keeping it for reuse while the pool has room.
    pub(crate) fn release(&self, slot: Arc<TransactionSlot>, statement: KernelStatement) {
        if self.running.load(Ordering::Acquire) {
            let mut pool = self.pool.lock();
            if pool.len() < self.config.transaction_pool_size {
                pool.push(Pooled { slot, statement });
                return;
            }
        }
        self.dispose(&slot);
    }

    fn dispose(&self, slot: &Arc<TransactionSlot>) {
        self.registry
            .write()
            .retain(|known| !Arc::ptr_eq(known, slot));
    }
}

/// Pool and registry of the kernel's transactions.
///
/// Instances are registered when created and unregistered when disposed, never merely
/// because they are reused.
#[derive(Clone)]
pub struct KernelTransactions {
    shared: Arc<Shared>,
}

impl KernelTransactions {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Opens a transaction, reusing a pooled instance when one is free.
    ///
    /// Fails with [`KernelError::DatabaseShutdown`] once the kernel stopped.
    pub fn new_instance(&self) -> Result<KernelTransaction> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(KernelError::DatabaseShutdown);
        }
        let pooled = self.shared.pool.lock().pop();
        let Pooled {
            slot,
            mut statement,
        } = match pooled {
            Some(pooled) => pooled,
            None => self.shared.create_instance(),
        };
        statement.reset();
        slot.open();
        self.shared.monitor.transaction_started();
        let last_committed = self.shared.store.last_committed_tx();
        debug!(
            client = statement.locks().client().0,
            reuse = slot.reuse_count(),
            last_committed = last_committed.0,
            "transaction started"
        );
        Ok(KernelTransaction::new(
            Arc::clone(&self.shared),
            slot,
            statement,
            last_committed,
        ))
    }

    /// Handles of the transactions open right now.
    ///
    /// Best effort: transactions may open or close while the registry is walked.
    pub fn active_transactions(&self) -> Vec<TransactionHandle> {
        self.shared
            .registry
            .read()
            .iter()
            .filter_map(|slot| slot.open_handle())
            .collect()
    }

    /// Number of instances known to the registry, open or pooled.
    pub fn registered_instances(&self) -> usize {
        self.shared.registry.read().len()
    }

    /// Number of closed instances waiting for reuse.
    pub fn pooled_instances(&self) -> usize {
        self.shared.pool.lock().len()
    }

    /// Marks every open transaction for termination and drops the pooled instances.
    pub fn dispose_all(&self) {
        let mut marked = 0usize;
        for handle in self.active_transactions() {
            if handle.mark_for_termination(TerminationReason::DatabaseUnavailable) {
                marked += 1;
            }
        }
        let pooled: Vec<Pooled> = self.shared.pool.lock().drain(..).collect();
        for instance in &pooled {
            self.shared.dispose(&instance.slot);
        }
        info!(marked, disposed = pooled.len(), "transactions disposed");
    }

    /// Refuses new transactions and terminates the open ones.
    pub fn shutdown(&self) {
        self.shared.running.store(false, Ordering::Release);
        self.dispose_all();
    }

    /// Whether new transactions are accepted.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}
