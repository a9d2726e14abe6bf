use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::IN_MEMORY_PROVIDER;
use crate::types::{KernelError, Result};

/// Kernel settings, loadable from TOML.
///
/// Every key is optional; missing keys take the defaults of [`KernelConfig::default`].
///
/// ```toml
/// read_only = false
/// transaction_pool_size = 64
/// transaction_timeout_ms = 30000
/// statement_cache_capacity = 1024
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KernelConfig {
    /// Refuse every write with `ReadOnlyDatabase`.
    pub read_only: bool,
    /// Closed transactions kept for reuse; surplus instances are disposed.
    pub transaction_pool_size: usize,
    /// Wall-clock budget per transaction, in milliseconds.
    pub transaction_timeout_ms: Option<u64>,
    /// Bound on a single lock wait, in milliseconds.
    pub lock_acquisition_timeout_ms: Option<u64>,
    /// Entries memoized per statement by the caching layer.
    pub statement_cache_capacity: usize,
    /// Provider stamped on new index rules.
    pub default_index_provider: String,
    /// Recompute counts after every commit and log divergences.
    pub verify_counts_on_commit: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            transaction_pool_size: 64,
            transaction_timeout_ms: None,
            lock_acquisition_timeout_ms: None,
            statement_cache_capacity: 1024,
            default_index_provider: IN_MEMORY_PROVIDER.to_owned(),
            verify_counts_on_commit: false,
        }
    }
}

impl KernelConfig {
    /// Parses TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| KernelError::Configuration(err.to_string()))
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            KernelError::Configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Serializes to TOML text.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| KernelError::Configuration(err.to_string()))
    }

    /// Sets read-only mode.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Sets the transaction pool size.
    pub fn transaction_pool_size(mut self, size: usize) -> Self {
        self.transaction_pool_size = size;
        self
    }

    /// Sets the per-transaction time budget.
    pub fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Sets the lock wait bound.
    pub fn lock_acquisition_timeout(mut self, timeout: Duration) -> Self {
        self.lock_acquisition_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Sets the per-statement cache capacity.
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    /// Sets the provider stamped on new index rules.
    pub fn default_index_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_index_provider = provider.into();
        self
    }

    /// Enables the post-commit counts check.
    pub fn verify_counts_on_commit(mut self, verify: bool) -> Self {
        self.verify_counts_on_commit = verify;
        self
    }

    pub(crate) fn transaction_timeout_duration(&self) -> Option<Duration> {
        self.transaction_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn lock_acquisition_timeout_duration(&self) -> Option<Duration> {
        self.lock_acquisition_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() -> Result<()> {
        let config = KernelConfig::from_toml_str("read_only = true\ntransaction_timeout_ms = 250\n")?;
        assert!(config.read_only);
        assert_eq!(config.transaction_timeout_duration(), Some(Duration::from_millis(250)));
        assert_eq!(config.transaction_pool_size, 64);
        assert_eq!(config.default_index_provider, IN_MEMORY_PROVIDER);
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = KernelConfig::from_toml_str("page_size = 4096\n").expect_err("unknown key");
        assert!(matches!(err, KernelError::Configuration(_)));
    }

    #[test]
    fn builder_round_trips_through_toml() -> Result<()> {
        let config = KernelConfig::default()
            .transaction_pool_size(4)
            .lock_acquisition_timeout(Duration::from_millis(50))
            .verify_counts_on_commit(true);
        let text = config.to_toml_string()?;
        assert_eq!(KernelConfig::from_toml_str(&text)?, config);
        Ok(())
    }
}
