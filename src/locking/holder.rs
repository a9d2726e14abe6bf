use std::sync::Arc;

use tracing::{error, trace, warn};

use crate::error::LockReleaseSummary;
use crate::locking::{LockClientId, LockManager, LockResource, LockType};
use crate::types::{KernelError, LabelId, NodeId, PropKeyId, RelId, Result};

fn acquire_on(
    manager: &dyn LockManager,
    client: LockClientId,
    resource: &LockResource,
    lock_type: LockType,
) -> Result<()> {
    match lock_type {
        LockType::Read => manager.get_read_lock(client, resource),
        LockType::Write => manager.get_write_lock(client, resource),
    }
}

fn release_on(
    manager: &dyn LockManager,
    client: LockClientId,
    resource: &LockResource,
    lock_type: LockType,
) -> Result<()> {
    match lock_type {
        LockType::Read => manager.release_read_lock(client, resource),
        LockType::Write => manager.release_write_lock(client, resource),
    }
}

/// Locks held by one transaction.
///
/// Every acquisition is recorded; [`LockHolder::release_locks`] releases all of them at
/// transaction end, in acquisition order, attempting every release even when some fail.
pub struct LockHolder {
    manager: Arc<dyn LockManager>,
    client: LockClientId,
    held: Vec<(LockResource, LockType)>,
}

impl LockHolder {
    /// Creates an empty holder acting as `client`.
    pub fn new(manager: Arc<dyn LockManager>, client: LockClientId) -> Self {
        Self {
            manager,
            client,
            held: Vec::new(),
        }
    }

    /// Lock client identity of the owning transaction.
    pub fn client(&self) -> LockClientId {
        self.client
    }

    /// Number of holds awaiting release.
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    fn acquire(&mut self, resource: LockResource, lock_type: LockType) -> Result<()> {
        acquire_on(self.manager.as_ref(), self.client, &resource, lock_type)?;
        self.held.push((resource, lock_type));
        Ok(())
    }

    /// Shared lock on a node.
    pub fn acquire_node_read_lock(&mut self, node: NodeId) -> Result<()> {
        self.acquire(LockResource::Node(node), LockType::Read)
    }

    /// Exclusive lock on a node.
    pub fn acquire_node_write_lock(&mut self, node: NodeId) -> Result<()> {
        self.acquire(LockResource::Node(node), LockType::Write)
    }

    /// Shared lock on a relationship.
    pub fn acquire_relationship_read_lock(&mut self, rel: RelId) -> Result<()> {
        self.acquire(LockResource::Relationship(rel), LockType::Read)
    }

    /// Exclusive lock on a relationship.
    pub fn acquire_relationship_write_lock(&mut self, rel: RelId) -> Result<()> {
        self.acquire(LockResource::Relationship(rel), LockType::Write)
    }

    /// Exclusive lock on graph properties.
    pub fn acquire_graph_write_lock(&mut self) -> Result<()> {
        self.acquire(LockResource::Graph, LockType::Write)
    }

    /// Shared schema lock.
    pub fn acquire_schema_read_lock(&mut self) -> Result<()> {
        self.acquire(LockResource::Schema, LockType::Read)
    }

    /// Exclusive schema lock.
    pub fn acquire_schema_write_lock(&mut self) -> Result<()> {
        self.acquire(LockResource::Schema, LockType::Write)
    }

    /// Exclusive lock on one index entry, held until transaction end.
    pub fn acquire_index_entry_write_lock(
        &mut self,
        label: LabelId,
        property_key: PropKeyId,
        value: &str,
    ) -> Result<()> {
        self.acquire(index_entry(label, property_key, value), LockType::Write)
    }

    /// Shared lock on one index entry that the caller may give back early.
    pub fn releasable_index_entry_read_lock(
        &self,
        label: LabelId,
        property_key: PropKeyId,
        value: &str,
    ) -> Result<ReleasableLock> {
        self.releasable(index_entry(label, property_key, value), LockType::Read)
    }

    /// Exclusive lock on one index entry that the caller may give back early.
    pub fn releasable_index_entry_write_lock(
        &self,
        label: LabelId,
        property_key: PropKeyId,
        value: &str,
    ) -> Result<ReleasableLock> {
        self.releasable(index_entry(label, property_key, value), LockType::Write)
    }

    fn releasable(&self, resource: LockResource, lock_type: LockType) -> Result<ReleasableLock> {
        acquire_on(self.manager.as_ref(), self.client, &resource, lock_type)?;
        Ok(ReleasableLock {
            manager: Arc::clone(&self.manager),
            client: self.client,
            resource: Some((resource, lock_type)),
        })
    }

    /// Releases every recorded hold and clears the record.
    ///
    /// Release failures are collected; if any occurred a single
    /// [`KernelError::LockRelease`] describes them by lock type and resource class.
    pub fn release_locks(&mut self) -> Result<()> {
        let mut summary: Option<LockReleaseSummary> = None;
        for (resource, lock_type) in self.held.drain(..) {
            if let Err(err) = release_on(self.manager.as_ref(), self.client, &resource, lock_type) {
                let summary = summary.get_or_insert_with(|| LockReleaseSummary {
                    first_failure: err.to_string(),
                    ..LockReleaseSummary::default()
                });
                *summary.by_lock_type.entry(lock_type.as_str()).or_insert(0) += 1;
                *summary
                    .by_resource_class
                    .entry(resource.class_name())
                    .or_insert(0) += 1;
            }
        }
        trace!(client = self.client.0, "locks released");
        match summary {
            None => Ok(()),
            Some(summary) => {
                error!(client = self.client.0, %summary, "failed to release locks");
                Err(KernelError::LockRelease(summary))
            }
        }
    }
}

fn index_entry(label: LabelId, property_key: PropKeyId, value: &str) -> LockResource {
    LockResource::IndexEntry {
        label,
        property_key,
        value: value.to_owned(),
    }
}

/// A held lock not yet recorded with its transaction.
///
/// Either [`ReleasableLock::register_with_transaction`] hands it to the transaction's
/// [`LockHolder`] or [`ReleasableLock::release`] gives it back immediately. Dropping it
/// without doing either releases it.
#[must_use = "register the lock with the transaction or release it"]
pub struct ReleasableLock {
    manager: Arc<dyn LockManager>,
    client: LockClientId,
    resource: Option<(LockResource, LockType)>,
}

impl ReleasableLock {
    /// Keeps the lock until the transaction releases its locks.
    pub fn register_with_transaction(mut self, holder: &mut LockHolder) {
        if let Some(held) = self.resource.take() {
            holder.held.push(held);
        }
    }

    /// Releases the lock now.
    pub fn release(mut self) -> Result<()> {
        match self.resource.take() {
            Some((resource, lock_type)) => {
                release_on(self.manager.as_ref(), self.client, &resource, lock_type)
            }
            None => Ok(()),
        }
    }
}

impl Drop for ReleasableLock {
    fn drop(&mut self) {
        if let Some((resource, lock_type)) = self.resource.take() {
            if let Err(err) = release_on(self.manager.as_ref(), self.client, &resource, lock_type) {
                warn!(client = self.client.0, %resource, error = %err, "abandoned lock release failed");
            }
        }
    }
}
