use std::sync::Arc;

use tracing::info;

use crate::schema::{IndexRule, IndexRuleKind, IndexState, UniquenessConstraint};
use crate::store::{
    Command, IndexFailure, StoreReadLayer, TransactionCommitProcess, TransactionHeader,
    TransactionRepresentation,
};
use crate::types::{KernelError, Result, RuleId};

/// Builds and tears down the unique indexes that back uniqueness constraints.
pub trait ConstraintIndexCreator: Send + Sync {
    /// Creates and populates a unique index for `constraint`, verifying existing data.
    ///
    /// Returns the committed index rule id. If existing nodes share a value the index is
    /// dropped again and [`KernelError::ConstraintVerificationFailed`] names them.
    fn create_uniqueness_constraint_index(&self, constraint: UniquenessConstraint)
        -> Result<RuleId>;

    /// Drops the constraint index rule `index` created by this component.
    fn drop_uniqueness_constraint_index(&self, index: RuleId) -> Result<()>;
}

/// [`ConstraintIndexCreator`] that commits index rules through the commit process in
/// their own batches, outside the requesting transaction.
pub struct StoreConstraintIndexCreator {
    store: Arc<dyn StoreReadLayer>,
    commit: Arc<dyn TransactionCommitProcess>,
    provider: String,
}

impl StoreConstraintIndexCreator {
    /// Creator stamping `provider` on the rules it writes.
    pub fn new(
        store: Arc<dyn StoreReadLayer>,
        commit: Arc<dyn TransactionCommitProcess>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            store,
            commit,
            provider: provider.into(),
        }
    }

    fn commit_one(&self, command: Command) -> Result<()> {
        let header = TransactionHeader::new(self.store.last_committed_tx(), 0);
        self.commit
            .commit(TransactionRepresentation::new(header, vec![command]))?;
        Ok(())
    }
}

impl ConstraintIndexCreator for StoreConstraintIndexCreator {
    fn create_uniqueness_constraint_index(
        &self,
        constraint: UniquenessConstraint,
    ) -> Result<RuleId> {
        let descriptor = constraint.index_descriptor();
        let rule = IndexRule {
            id: self.store.reserve_rule_id(),
            descriptor,
            provider: self.provider.clone(),
            kind: IndexRuleKind::ConstraintIndex { owner: None },
        };
        let id = rule.id;
        self.commit_one(Command::CreateIndexRule(rule))?;
        info!(%constraint, index = id.0, "constraint index populated");

        if self.store.index_get_state(&descriptor)? == IndexState::Failed {
            let failure = self.store.index_get_failure(&descriptor)?;
            self.drop_uniqueness_constraint_index(id)?;
            return Err(match failure {
                Some(IndexFailure::Duplicate {
                    first,
                    second,
                    value,
                }) => KernelError::ConstraintVerificationFailed {
                    constraint,
                    first,
                    second,
                    value,
                },
                Some(other) => KernelError::IndexBroken {
                    descriptor,
                    failure: other.to_string(),
                },
                None => KernelError::IndexBroken {
                    descriptor,
                    failure: String::from("population failed"),
                },
            });
        }
        Ok(id)
    }

    fn drop_uniqueness_constraint_index(&self, index: RuleId) -> Result<()> {
        self.commit_one(Command::DropIndexRule(index))?;
        info!(index = index.0, "constraint index dropped");
        Ok(())
    }
}
