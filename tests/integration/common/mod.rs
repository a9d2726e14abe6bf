#![allow(dead_code)]

use std::sync::Arc;

use sombra_kernel::store::InMemoryStore;
use sombra_kernel::{Kernel, KernelConfig, Result, Statement};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Kernel over an in-memory store the test keeps a handle to.
pub fn kernel_with_store(config: KernelConfig) -> (Kernel, Arc<InMemoryStore>) {
    init_tracing();
    let store = Arc::new(InMemoryStore::new());
    let kernel = Kernel::builder(config)
        .store(store.clone(), store.clone())
        .build();
    (kernel, store)
}

pub fn kernel() -> Kernel {
    kernel_with_store(KernelConfig::default()).0
}

/// Runs `work` in its own transaction and commits it.
pub fn commit<T>(
    kernel: &Kernel,
    work: impl FnOnce(&mut Statement<'_>) -> Result<T>,
) -> Result<T> {
    let mut tx = kernel.begin_transaction()?;
    let value = {
        let mut statement = tx.acquire_statement()?;
        work(&mut statement)?
    };
    tx.success();
    tx.close()?;
    Ok(value)
}

/// Runs `work` in its own transaction and rolls it back.
pub fn read<T>(kernel: &Kernel, work: impl FnOnce(&mut Statement<'_>) -> Result<T>) -> Result<T> {
    let mut tx = kernel.begin_transaction()?;
    let value = {
        let mut statement = tx.acquire_statement()?;
        work(&mut statement)?
    };
    tx.close()?;
    Ok(value)
}
