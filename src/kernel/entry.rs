use std::sync::Arc;

use tracing::info;

use crate::api::{build_statement_operations, CakeCollaborators};
use crate::config::KernelConfig;
use crate::kernel::pool::Shared;
use crate::kernel::{
    KernelTransaction, KernelTransactions, NoopMonitor, SchemaState, TransactionMonitor,
};
use crate::locking::{InProcessLockManager, LockManager};
use crate::store::{
    ConstraintIndexCreator, Guard, InMemoryStore, NoopGuard, StoreConstraintIndexCreator,
    StoreReadLayer, TimeoutGuard, TransactionCommitProcess,
};
use crate::types::Result;

/// Entry point: owns the operations stack and the transaction pool.
///
/// ```
/// use sombra_kernel::{Kernel, KernelConfig};
///
/// # fn main() -> sombra_kernel::Result<()> {
/// let kernel = Kernel::new(KernelConfig::default());
/// let mut tx = kernel.begin_transaction()?;
/// {
///     let mut statement = tx.acquire_statement()?;
///     let node = statement.data_write_operations()?.node_create()?;
///     assert!(statement.read_operations().node_exists(node)?);
/// }
/// tx.success();
/// assert!(tx.close()?.is_some());
/// # Ok(())
/// # }
/// ```
pub struct Kernel {
    store: Arc<dyn StoreReadLayer>,
    schema_state: Arc<SchemaState>,
    transactions: KernelTransactions,
    config: KernelConfig,
}

impl Kernel {
    /// Kernel over a fresh [`InMemoryStore`].
    pub fn new(config: KernelConfig) -> Self {
        Self::builder(config).build()
    }

    /// Builder for supplying a custom store, monitor, guard or lock manager.
    pub fn builder(config: KernelConfig) -> KernelBuilder {
        KernelBuilder {
            config,
            store: None,
            monitor: None,
            guard: None,
            lock_manager: None,
            constraint_index_creator: None,
        }
    }

    /// Starts a transaction.
    pub fn begin_transaction(&self) -> Result<KernelTransaction> {
        self.transactions.new_instance()
    }

    /// Pool and registry of transactions.
    pub fn transactions(&self) -> &KernelTransactions {
        &self.transactions
    }

    /// Committed state.
    pub fn store(&self) -> &Arc<dyn StoreReadLayer> {
        &self.store
    }

    /// Process-wide schema state.
    pub fn schema_state(&self) -> &Arc<SchemaState> {
        &self.schema_state
    }

    /// Effective configuration.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Refuses new transactions and terminates the open ones.
    pub fn shutdown(&self) {
        info!("kernel shutting down");
        self.transactions.shutdown();
    }
}

/// Builder for [`Kernel`].
pub struct KernelBuilder {
    config: KernelConfig,
    store: Option<(Arc<dyn StoreReadLayer>, Arc<dyn TransactionCommitProcess>)>,
    monitor: Option<Arc<dyn TransactionMonitor>>,
    guard: Option<Arc<dyn Guard>>,
    lock_manager: Option<Arc<dyn LockManager>>,
    constraint_index_creator: Option<Arc<dyn ConstraintIndexCreator>>,
}

impl KernelBuilder {
    /// Committed state and the process that commits to it.
    pub fn store(
        mut self,
        store: Arc<dyn StoreReadLayer>,
        commit_process: Arc<dyn TransactionCommitProcess>,
    ) -> Self {
        self.store = Some((store, commit_process));
        self
    }

    /// Lifecycle observer.
    pub fn monitor(mut self, monitor: Arc<dyn TransactionMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Resource guard, replacing the one derived from the transaction timeout.
    pub fn guard(mut self, guard: Arc<dyn Guard>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Lock manager shared by all transactions.
    pub fn lock_manager(mut self, lock_manager: Arc<dyn LockManager>) -> Self {
        self.lock_manager = Some(lock_manager);
        self
    }

    /// Builder of constraint-backing indexes.
    pub fn constraint_index_creator(mut self, creator: Arc<dyn ConstraintIndexCreator>) -> Self {
        self.constraint_index_creator = Some(creator);
        self
    }

    /// Assembles the kernel.
    pub fn build(self) -> Kernel {
        let KernelBuilder {
            config,
            store,
            monitor,
            guard,
            lock_manager,
            constraint_index_creator,
        } = self;

        let (store, commit_process) = store.unwrap_or_else(|| {
            let store = Arc::new(
                InMemoryStore::new().verify_counts_on_commit(config.verify_counts_on_commit),
            );
            (store.clone() as Arc<dyn StoreReadLayer>, store as Arc<dyn TransactionCommitProcess>)
        });
        let constraint_index_creator = constraint_index_creator.unwrap_or_else(|| {
            Arc::new(StoreConstraintIndexCreator::new(
                Arc::clone(&store),
                Arc::clone(&commit_process),
                config.default_index_provider.clone(),
            ))
        });
        let guard: Arc<dyn Guard> = match (guard, config.transaction_timeout_duration()) {
            (Some(guard), _) => guard,
            (None, Some(budget)) => Arc::new(TimeoutGuard::new(budget)),
            (None, None) => Arc::new(NoopGuard),
        };
        let lock_manager = lock_manager.unwrap_or_else(|| {
            Arc::new(InProcessLockManager::new(
                config.lock_acquisition_timeout_duration(),
            ))
        });
        let monitor = monitor.unwrap_or_else(|| Arc::new(NoopMonitor));
        let schema_state = Arc::new(SchemaState::new());

        let parts = build_statement_operations(CakeCollaborators {
            store: Arc::clone(&store),
            constraint_index_creator: Arc::clone(&constraint_index_creator),
            schema_state: Arc::clone(&schema_state),
            guard,
            read_only: config.read_only,
        });
        let shared = Shared::new(
            parts,
            Arc::clone(&store),
            commit_process,
            constraint_index_creator,
            lock_manager,
            Arc::clone(&schema_state),
            monitor,
            config.clone(),
        );
        info!(
            read_only = config.read_only,
            pool = config.transaction_pool_size,
            "kernel started"
        );
        Kernel {
            store,
            schema_state,
            transactions: KernelTransactions::new(Arc::new(shared)),
            config,
        }
    }
}
