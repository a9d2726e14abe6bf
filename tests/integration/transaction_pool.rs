//! Pooling, registry, termination and shutdown of kernel transactions.

#![allow(missing_docs)]

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sombra_kernel::kernel::MonitorSnapshot;
use sombra_kernel::locking::InProcessLockManager;
use sombra_kernel::store::InMemoryStore;
use sombra_kernel::{
    CounterMonitor, Kernel, KernelConfig, KernelError, Property, Result, TerminationReason,
};

use common::{commit, init_tracing, kernel, kernel_with_store, read};

#[test]
fn closed_transactions_return_to_the_pool() -> Result<()> {
    let kernel = kernel();
    let transactions = kernel.transactions();

    let tx = kernel.begin_transaction()?;
    assert_eq!(transactions.registered_instances(), 1);
    assert_eq!(transactions.pooled_instances(), 0);
    tx.close()?;
    assert_eq!(transactions.pooled_instances(), 1);

    let tx = kernel.begin_transaction()?;
    assert_eq!(transactions.registered_instances(), 1);
    assert_eq!(transactions.pooled_instances(), 0);
    drop(tx);
    assert_eq!(transactions.pooled_instances(), 1);
    Ok(())
}

#[test]
fn surplus_instances_are_disposed() -> Result<()> {
    let (kernel, _) = kernel_with_store(KernelConfig::default().transaction_pool_size(1));
    let open: Vec<_> = (0..3)
        .map(|_| kernel.begin_transaction())
        .collect::<Result<_>>()?;
    assert_eq!(kernel.transactions().registered_instances(), 3);
    assert_eq!(kernel.transactions().active_transactions().len(), 3);

    for tx in open {
        tx.close()?;
    }
    assert_eq!(kernel.transactions().registered_instances(), 1);
    assert_eq!(kernel.transactions().pooled_instances(), 1);
    assert!(kernel.transactions().active_transactions().is_empty());
    Ok(())
}

#[test]
fn terminated_transactions_fail_fast_and_roll_back() -> Result<()> {
    let kernel = kernel();
    let mut tx = kernel.begin_transaction()?;
    let handle = tx.handle();
    let node = {
        let mut st = tx.acquire_statement()?;
        let node = st.data_write_operations()?.node_create()?;
        assert!(handle.mark_for_termination(TerminationReason::Terminated));
        let err = st
            .read_operations()
            .node_exists(node)
            .expect_err("terminated");
        assert!(matches!(
            err,
            KernelError::TransactionTerminated(TerminationReason::Terminated)
        ));
        node
    };
    assert!(matches!(
        tx.acquire_statement().err(),
        Some(KernelError::TransactionTerminated(_))
    ));
    assert_eq!(tx.termination_reason(), Some(TerminationReason::Terminated));

    tx.success();
    let err = tx.close().expect_err("terminated transactions do not commit");
    assert!(matches!(err, KernelError::TransactionTerminated(_)));
    assert!(!handle.is_open());

    read(&kernel, |st| {
        assert!(!st.read_operations().node_exists(node)?);
        Ok(())
    })
}

#[test]
fn terminated_transactions_cannot_touch_tokens_or_schema_state() -> Result<()> {
    let kernel = kernel();
    let mut tx = kernel.begin_transaction()?;
    let handle = tx.handle();
    {
        let mut st = tx.acquire_statement()?;
        st.read_operations()
            .schema_state_get_or_create("k", || 1_u64)?;
        assert!(handle.mark_for_termination(TerminationReason::Terminated));

        let terminated =
            |err: KernelError| matches!(err, KernelError::TransactionTerminated(_));
        let err = st
            .token_write_operations()
            .label_get_or_create_for_name("Leaked")
            .expect_err("terminated");
        assert!(terminated(err));
        let err = st
            .read_operations()
            .label_get_for_name("Leaked")
            .expect_err("terminated");
        assert!(terminated(err));
        let err = st
            .read_operations()
            .schema_state_contains("k")
            .expect_err("terminated");
        assert!(terminated(err));
        let err = st
            .read_operations()
            .schema_state_flush()
            .expect_err("terminated");
        assert!(terminated(err));
    }
    drop(tx);

    read(&kernel, |st| {
        assert!(st.read_operations().schema_state_contains("k")?);
        assert!(st.read_operations().labels_get_all()?.is_empty());
        Ok(())
    })
}

#[test]
fn stale_handles_do_not_reach_the_next_transaction() -> Result<()> {
    let kernel = kernel();
    let tx = kernel.begin_transaction()?;
    let stale = tx.handle();
    tx.close()?;

    let mut next = kernel.begin_transaction()?;
    assert_eq!(next.handle().reuse_count(), stale.reuse_count() + 1);
    assert!(!stale.mark_for_termination(TerminationReason::Terminated));
    {
        let mut st = next.acquire_statement()?;
        st.data_write_operations()?.node_create()?;
    }
    next.success();
    assert!(next.close()?.is_some());
    Ok(())
}

#[test]
fn shutdown_terminates_open_transactions() -> Result<()> {
    let kernel = kernel();
    let mut tx = kernel.begin_transaction()?;
    kernel.shutdown();
    assert!(!kernel.transactions().is_running());
    assert_eq!(
        tx.termination_reason(),
        Some(TerminationReason::DatabaseUnavailable)
    );
    assert!(matches!(
        kernel.begin_transaction().err(),
        Some(KernelError::DatabaseShutdown)
    ));
    assert!(tx.acquire_statement().is_err());
    assert_eq!(tx.close()?, None);
    assert_eq!(kernel.transactions().pooled_instances(), 0);
    Ok(())
}

#[test]
fn transactions_over_budget_are_terminated() -> Result<()> {
    let (kernel, _) =
        kernel_with_store(KernelConfig::default().transaction_timeout(Duration::from_millis(5)));
    let mut tx = kernel.begin_transaction()?;
    let mut st = tx.acquire_statement()?;
    thread::sleep(Duration::from_millis(30));
    let err = st
        .read_operations()
        .nodes_get_all()
        .expect_err("over budget");
    assert!(matches!(
        err,
        KernelError::TransactionTerminated(TerminationReason::Timeout)
    ));
    Ok(())
}

#[test]
fn monitor_sees_every_outcome() -> Result<()> {
    init_tracing();
    let monitor = CounterMonitor::new();
    let kernel = Kernel::builder(KernelConfig::default())
        .monitor(monitor.clone())
        .build();

    commit(&kernel, |st| st.data_write_operations()?.node_create())?;
    read(&kernel, |st| st.read_operations().nodes_get_all())?;
    let tx = kernel.begin_transaction()?;
    tx.mark_for_termination(TerminationReason::Terminated);
    tx.close()?;

    assert_eq!(
        monitor.snapshot(),
        MonitorSnapshot {
            started: 3,
            committed: 1,
            rolled_back: 2,
            terminated: 1,
        }
    );
    Ok(())
}

#[test]
fn locks_are_released_when_transactions_close() -> Result<()> {
    init_tracing();
    let store = Arc::new(InMemoryStore::new());
    let locks = Arc::new(InProcessLockManager::new(Some(Duration::from_secs(5))));
    let kernel = Kernel::builder(KernelConfig::default())
        .store(store.clone(), store)
        .lock_manager(locks.clone())
        .build();

    let (label, key) = commit(&kernel, |st| {
        let label = st.token_write_operations().label_get_or_create_for_name("L")?;
        let key = st.token_write_operations().property_key_get_or_create_for_name("k")?;
        Ok((label, key))
    })?;

    let mut tx = kernel.begin_transaction()?;
    {
        let mut st = tx.acquire_statement()?;
        let mut write = st.data_write_operations()?;
        let node = write.node_create()?;
        write.node_add_label(node, label)?;
        write.node_set_property(node, Property::new(key, 1i64))?;
    }
    assert!(locks.locked_resources() > 0);
    tx.success();
    tx.close()?;
    assert_eq!(locks.locked_resources(), 0);

    let mut tx = kernel.begin_transaction()?;
    {
        let mut st = tx.acquire_statement()?;
        st.schema_write_operations()?.index_create(label, key)?;
    }
    assert!(locks.locked_resources() > 0);
    drop(tx);
    assert_eq!(locks.locked_resources(), 0);
    Ok(())
}
