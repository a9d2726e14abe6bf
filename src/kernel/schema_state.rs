use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::api::SchemaStateValue;

/// Process-wide cache of values derived from the schema.
///
/// Entries are computed on demand and dropped wholesale whenever a transaction commits a
/// schema change.
#[derive(Default)]
pub struct SchemaState {
    entries: RwLock<FxHashMap<String, SchemaStateValue>>,
}

impl SchemaState {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value under `key`, computing and storing it with `create` when absent.
    pub fn get_or_create(
        &self,
        key: &str,
        create: &mut dyn FnMut() -> SchemaStateValue,
    ) -> SchemaStateValue {
        if let Some(value) = self.entries.read().get(key) {
            return value.clone();
        }
        let mut entries = self.entries.write();
        entries
            .entry(key.to_owned())
            .or_insert_with(|| create())
            .clone()
    }

    /// Whether `key` is cached.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        if !entries.is_empty() {
            debug!(entries = entries.len(), "schema state cleared");
            entries.clear();
        }
    }
}
