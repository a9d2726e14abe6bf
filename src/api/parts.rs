use std::sync::Arc;

use crate::api::{
    CachingLayer, ConstraintEnforcingLayer, DataIntegrityLayer, EntityReadOps, EntityWriteOps,
    GuardingLayer, KeyReadOps, KeyWriteOps, LockingLayer, ReadOnlyLayer, SchemaReadOps,
    SchemaStateOps, SchemaWriteOps, StateHandlingLayer,
};
use crate::kernel::SchemaState;
use crate::store::{ConstraintIndexCreator, Guard, StoreReadLayer};

/// One handle per operation capability, each pointing at the top-most layer that
/// implements it.
///
/// A layer wraps only the capabilities it has a concern in; the `with_*` overrides replace
/// those and leave the rest pointing at the layer below.
#[derive(Clone)]
pub struct StatementOperationParts {
    entity_read: Arc<dyn EntityReadOps>,
    entity_write: Arc<dyn EntityWriteOps>,
    schema_read: Arc<dyn SchemaReadOps>,
    schema_write: Arc<dyn SchemaWriteOps>,
    key_read: Arc<dyn KeyReadOps>,
    key_write: Arc<dyn KeyWriteOps>,
    schema_state: Arc<dyn SchemaStateOps>,
}

impl StatementOperationParts {
    /// Parts backed by a single implementation of every capability.
    pub fn uniform<L>(layer: Arc<L>) -> Self
    where
        L: EntityReadOps
            + EntityWriteOps
            + SchemaReadOps
            + SchemaWriteOps
            + KeyReadOps
            + KeyWriteOps
            + SchemaStateOps
            + 'static,
    {
        Self {
            entity_read: layer.clone(),
            entity_write: layer.clone(),
            schema_read: layer.clone(),
            schema_write: layer.clone(),
            key_read: layer.clone(),
            key_write: layer.clone(),
            schema_state: layer,
        }
    }

    /// Entity reads.
    pub fn entity_read(&self) -> &dyn EntityReadOps {
        self.entity_read.as_ref()
    }

    /// Entity writes.
    pub fn entity_write(&self) -> &dyn EntityWriteOps {
        self.entity_write.as_ref()
    }

    /// Schema reads.
    pub fn schema_read(&self) -> &dyn SchemaReadOps {
        self.schema_read.as_ref()
    }

    /// Schema writes.
    pub fn schema_write(&self) -> &dyn SchemaWriteOps {
        self.schema_write.as_ref()
    }

    /// Token reads.
    pub fn key_read(&self) -> &dyn KeyReadOps {
        self.key_read.as_ref()
    }

    /// Token writes.
    pub fn key_write(&self) -> &dyn KeyWriteOps {
        self.key_write.as_ref()
    }

    /// Schema state access.
    pub fn schema_state(&self) -> &dyn SchemaStateOps {
        self.schema_state.as_ref()
    }

    /// Replaces entity reads.
    pub fn with_entity_read(mut self, ops: Arc<dyn EntityReadOps>) -> Self {
        self.entity_read = ops;
        self
    }

    /// Replaces entity writes.
    pub fn with_entity_write(mut self, ops: Arc<dyn EntityWriteOps>) -> Self {
        self.entity_write = ops;
        self
    }

    /// Replaces schema reads.
    pub fn with_schema_read(mut self, ops: Arc<dyn SchemaReadOps>) -> Self {
        self.schema_read = ops;
        self
    }

    /// Replaces schema writes.
    pub fn with_schema_write(mut self, ops: Arc<dyn SchemaWriteOps>) -> Self {
        self.schema_write = ops;
        self
    }

    /// Replaces token reads.
    pub fn with_key_read(mut self, ops: Arc<dyn KeyReadOps>) -> Self {
        self.key_read = ops;
        self
    }

    /// Replaces token writes.
    pub fn with_key_write(mut self, ops: Arc<dyn KeyWriteOps>) -> Self {
        self.key_write = ops;
        self
    }

    /// Replaces schema state access.
    pub fn with_schema_state(mut self, ops: Arc<dyn SchemaStateOps>) -> Self {
        self.schema_state = ops;
        self
    }

    pub(crate) fn entity_read_arc(&self) -> Arc<dyn EntityReadOps> {
        Arc::clone(&self.entity_read)
    }

    pub(crate) fn entity_write_arc(&self) -> Arc<dyn EntityWriteOps> {
        Arc::clone(&self.entity_write)
    }

    pub(crate) fn schema_read_arc(&self) -> Arc<dyn SchemaReadOps> {
        Arc::clone(&self.schema_read)
    }

    pub(crate) fn schema_write_arc(&self) -> Arc<dyn SchemaWriteOps> {
        Arc::clone(&self.schema_write)
    }

    pub(crate) fn key_read_arc(&self) -> Arc<dyn KeyReadOps> {
        Arc::clone(&self.key_read)
    }

    pub(crate) fn key_write_arc(&self) -> Arc<dyn KeyWriteOps> {
        Arc::clone(&self.key_write)
    }

    pub(crate) fn schema_state_arc(&self) -> Arc<dyn SchemaStateOps> {
        Arc::clone(&self.schema_state)
    }
}

/// Collaborators the operations stack is built from.
pub struct CakeCollaborators {
    /// Committed state.
    pub store: Arc<dyn StoreReadLayer>,
    /// Builder of constraint-backing indexes.
    pub constraint_index_creator: Arc<dyn ConstraintIndexCreator>,
    /// Process-wide schema state.
    pub schema_state: Arc<SchemaState>,
    /// Resource guard.
    pub guard: Arc<dyn Guard>,
    /// Whether every write must be refused.
    pub read_only: bool,
}

/// Assembles the operations stack bottom-up: state handling, caching, constraint
/// enforcement, data integrity, locking, guarding, and the read-only gate when requested.
pub fn build_statement_operations(collaborators: CakeCollaborators) -> StatementOperationParts {
    let CakeCollaborators {
        store,
        constraint_index_creator,
        schema_state,
        guard,
        read_only,
    } = collaborators;

    let state_handling = Arc::new(StateHandlingLayer::new(
        store,
        constraint_index_creator,
        schema_state,
    ));
    let mut parts = StatementOperationParts::uniform(state_handling);

    let caching = Arc::new(CachingLayer::new(parts.entity_read_arc(), parts.entity_write_arc()));
    parts = parts
        .with_entity_read(caching.clone())
        .with_entity_write(caching);

    let enforcing = Arc::new(ConstraintEnforcingLayer::new(
        parts.entity_read_arc(),
        parts.entity_write_arc(),
        parts.schema_read_arc(),
    ));
    parts = parts
        .with_entity_read(enforcing.clone())
        .with_entity_write(enforcing);

    let integrity = Arc::new(DataIntegrityLayer::new(
        parts.key_write_arc(),
        parts.schema_read_arc(),
        parts.schema_write_arc(),
    ));
    parts = parts
        .with_key_write(integrity.clone())
        .with_schema_write(integrity);

    let locking = Arc::new(LockingLayer::new(
        parts.entity_read_arc(),
        parts.entity_write_arc(),
        parts.schema_read_arc(),
        parts.schema_write_arc(),
        parts.schema_state_arc(),
    ));
    parts = parts
        .with_entity_write(locking.clone())
        .with_schema_read(locking.clone())
        .with_schema_write(locking.clone())
        .with_schema_state(locking);

    let guarding = Arc::new(GuardingLayer::new(guard, &parts));
    parts = parts
        .with_entity_read(guarding.clone())
        .with_entity_write(guarding.clone())
        .with_schema_read(guarding.clone())
        .with_schema_write(guarding.clone())
        .with_key_read(guarding.clone())
        .with_key_write(guarding.clone())
        .with_schema_state(guarding);

    if read_only {
        let gate = Arc::new(ReadOnlyLayer);
        parts = parts
            .with_entity_write(gate.clone())
            .with_schema_write(gate.clone())
            .with_key_write(gate);
    }
    parts
}
