use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::schema::IndexState;
use crate::types::{KernelError, NodeId, Result, RuleId};
use crate::value::PropertyValue;

/// Name of the bundled in-memory index provider.
pub const IN_MEMORY_PROVIDER: &str = "in-memory-1.0";

/// Why an index cannot serve lookups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexFailure {
    /// Two nodes share a value in an index that must be unique.
    Duplicate {
        /// First node.
        first: NodeId,
        /// Second node.
        second: NodeId,
        /// Shared value.
        value: PropertyValue,
    },
    /// Provider-specific failure.
    Provider(String),
}

impl fmt::Display for IndexFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexFailure::Duplicate {
                first,
                second,
                value,
            } => write!(f, "nodes {first} and {second} share value {value}"),
            IndexFailure::Provider(message) => f.write_str(message),
        }
    }
}

/// Storage for index data, addressed by index rule id.
pub trait IndexProvider: Send + Sync {
    /// Provider name stamped on index rules.
    fn name(&self) -> &str;

    /// Creates an index and populates it from `entries`. Unique indexes fail on duplicates.
    fn create(&self, index: RuleId, unique: bool, entries: Vec<(PropertyValue, NodeId)>);

    /// Removes an index and its data.
    fn drop_index(&self, index: RuleId);

    /// Moves `node` from `before` to `after`. `None` means absent.
    fn update(
        &self,
        index: RuleId,
        node: NodeId,
        before: Option<&PropertyValue>,
        after: Option<&PropertyValue>,
    );

    /// Nodes indexed under exactly `value`.
    fn seek(&self, index: RuleId, value: &PropertyValue) -> Result<Vec<NodeId>>;

    /// Every indexed node.
    fn scan(&self, index: RuleId) -> Result<Vec<NodeId>>;

    /// Population state.
    fn state(&self, index: RuleId) -> Option<IndexState>;

    /// Failure of a [`IndexState::Failed`] index.
    fn failure(&self, index: RuleId) -> Option<IndexFailure>;

    /// `(distinct values, indexed entries)`.
    fn sample(&self, index: RuleId) -> (i64, i64);
}

#[derive(Debug)]
struct MemoryIndex {
    entries: BTreeMap<PropertyValue, BTreeSet<NodeId>>,
    state: IndexState,
    failure: Option<IndexFailure>,
}

/// [`IndexProvider`] keeping every index in ordered in-memory maps.
#[derive(Default)]
pub struct InMemoryIndexProvider {
    indexes: RwLock<FxHashMap<RuleId, MemoryIndex>>,
}

impl InMemoryIndexProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    fn missing(index: RuleId) -> KernelError {
        KernelError::Invariant(format!("index rule {index} has no data in {IN_MEMORY_PROVIDER}"))
    }
}

impl IndexProvider for InMemoryIndexProvider {
    fn name(&self) -> &str {
        IN_MEMORY_PROVIDER
    }

    fn create(&self, index: RuleId, unique: bool, entries: Vec<(PropertyValue, NodeId)>) {
        let mut map: BTreeMap<PropertyValue, BTreeSet<NodeId>> = BTreeMap::new();
        for (value, node) in entries {
            map.entry(value).or_default().insert(node);
        }
        let failure = if unique {
            map.iter().find_map(|(value, nodes)| {
                let mut it = nodes.iter();
                match (it.next(), it.next()) {
                    (Some(first), Some(second)) => Some(IndexFailure::Duplicate {
                        first: *first,
                        second: *second,
                        value: value.clone(),
                    }),
                    _ => None,
                }
            })
        } else {
            None
        };
        let state = if failure.is_some() {
            IndexState::Failed
        } else {
            IndexState::Online
        };
        self.indexes.write().insert(
            index,
            MemoryIndex {
                entries: map,
                state,
                failure,
            },
        );
    }

    fn drop_index(&self, index: RuleId) {
        self.indexes.write().remove(&index);
    }

    fn update(
        &self,
        index: RuleId,
        node: NodeId,
        before: Option<&PropertyValue>,
        after: Option<&PropertyValue>,
    ) {
        let mut indexes = self.indexes.write();
        let Some(data) = indexes.get_mut(&index) else {
            return;
        };
        if let Some(before) = before {
            if let Some(nodes) = data.entries.get_mut(before) {
                nodes.remove(&node);
                if nodes.is_empty() {
                    data.entries.remove(before);
                }
            }
        }
        if let Some(after) = after {
            data.entries.entry(after.clone()).or_default().insert(node);
        }
    }

    fn seek(&self, index: RuleId, value: &PropertyValue) -> Result<Vec<NodeId>> {
        let indexes = self.indexes.read();
        let data = indexes.get(&index).ok_or_else(|| Self::missing(index))?;
        Ok(data
            .entries
            .get(value)
            .map(|nodes| nodes.iter().copied().collect())
            .unwrap_or_default())
    }

    fn scan(&self, index: RuleId) -> Result<Vec<NodeId>> {
        let indexes = self.indexes.read();
        let data = indexes.get(&index).ok_or_else(|| Self::missing(index))?;
        let nodes: BTreeSet<NodeId> = data.entries.values().flatten().copied().collect();
        Ok(nodes.into_iter().collect())
    }

    fn state(&self, index: RuleId) -> Option<IndexState> {
        self.indexes.read().get(&index).map(|data| data.state)
    }

    fn failure(&self, index: RuleId) -> Option<IndexFailure> {
        self.indexes
            .read()
            .get(&index)
            .and_then(|data| data.failure.clone())
    }

    fn sample(&self, index: RuleId) -> (i64, i64) {
        self.indexes.read().get(&index).map_or((0, 0), |data| {
            let size: usize = data.entries.values().map(BTreeSet::len).sum();
            (data.entries.len() as i64, size as i64)
        })
    }
}

/// Providers by name.
///
/// Lookups of an unknown provider yield `None`; callers applying commands treat that as a
/// no-op so a temporarily missing provider does not block commit or replay.
#[derive(Clone, Default)]
pub struct IndexProviderMap {
    providers: FxHashMap<String, Arc<dyn IndexProvider>>,
}

impl IndexProviderMap {
    /// Map holding only the in-memory provider.
    pub fn in_memory() -> Self {
        let mut map = Self::default();
        map.register(Arc::new(InMemoryIndexProvider::new()));
        map
    }

    /// Adds or replaces a provider under its own name.
    pub fn register(&mut self, provider: Arc<dyn IndexProvider>) {
        self.providers.insert(provider.name().to_owned(), provider);
    }

    /// Provider called `name`, warning when it is unavailable.
    pub fn apply_to(&self, name: &str) -> Option<&dyn IndexProvider> {
        let provider = self.providers.get(name).map(|p| p.as_ref());
        if provider.is_none() {
            warn!(provider = name, "index provider unavailable; skipping index update");
        }
        provider
    }

    /// Provider called `name`.
    pub fn get(&self, name: &str) -> Option<&dyn IndexProvider> {
        self.providers.get(name).map(|p| p.as_ref())
    }
}
