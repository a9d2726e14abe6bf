//! Loading kernel settings from TOML files and their effect on a running kernel.

#![allow(missing_docs)]

mod common;

use std::fs;
use std::time::Duration;

use sombra_kernel::{ErrorKind, Kernel, KernelConfig, KernelError, Result};
use tempfile::tempdir;

use common::{commit, init_tracing, read};

#[test]
fn file_settings_drive_the_kernel() -> Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("kernel.toml");
    fs::write(
        &path,
        "read_only = true\ntransaction_pool_size = 2\nlock_acquisition_timeout_ms = 100\n",
    )?;

    let config = KernelConfig::from_file(&path)?;
    assert_eq!(config.transaction_pool_size, 2);
    assert_eq!(config.lock_acquisition_timeout_ms, Some(100));

    let kernel = Kernel::new(config);
    assert!(kernel.config().read_only);
    read(&kernel, |st| {
        let err = st
            .data_write_operations()?
            .node_create()
            .expect_err("read only");
        assert!(matches!(err, KernelError::ReadOnlyDatabase));
        Ok(())
    })
}

#[test]
fn saved_settings_load_back_identically() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("saved.toml");
    let config = KernelConfig::default()
        .transaction_timeout(Duration::from_secs(30))
        .statement_cache_capacity(16)
        .verify_counts_on_commit(true);
    fs::write(&path, config.to_toml_string()?)?;
    assert_eq!(KernelConfig::from_file(&path)?, config);

    let kernel = Kernel::new(KernelConfig::from_file(&path)?);
    commit(&kernel, |st| st.data_write_operations()?.node_create())?;
    read(&kernel, |st| {
        assert_eq!(st.read_operations().count_nodes(None)?, 1);
        Ok(())
    })
}

#[test]
fn bad_files_are_configuration_errors() -> Result<()> {
    let dir = tempdir()?;
    let missing = KernelConfig::from_file(dir.path().join("absent.toml")).expect_err("missing");
    assert_eq!(missing.kind(), ErrorKind::Configuration);

    let path = dir.path().join("broken.toml");
    fs::write(&path, "transaction_pool_size = \"many\"\n")?;
    let broken = KernelConfig::from_file(&path).expect_err("wrong type");
    assert_eq!(broken.kind(), ErrorKind::Configuration);
    Ok(())
}
