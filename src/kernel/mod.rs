//! Transaction lifecycle: the kernel entry point, the transaction pool and registry,
//! commit and rollback, and the process-wide schema state.

mod commit;
mod entry;
mod handle;
mod monitor;
mod pool;
mod schema_state;
mod transaction;

pub use entry::{Kernel, KernelBuilder};
pub use handle::TransactionHandle;
pub use monitor::{CounterMonitor, MonitorSnapshot, NoopMonitor, TransactionMonitor};
pub use pool::KernelTransactions;
pub use schema_state::SchemaState;
pub use transaction::{KernelTransaction, Statement};
