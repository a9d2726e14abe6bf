use std::sync::Arc;

use crate::api::{KernelStatement, KeyWriteOps, SchemaReadOps, SchemaWriteOps};
use crate::schema::{IndexDescriptor, UniquenessConstraint};
use crate::types::{KernelError, LabelId, PropKeyId, Result, TokenKind};

/// Rejects malformed token names and conflicting schema declarations before they reach
/// the overlay.
pub struct DataIntegrityLayer {
    key_write: Arc<dyn KeyWriteOps>,
    schema_read: Arc<dyn SchemaReadOps>,
    schema_write: Arc<dyn SchemaWriteOps>,
}

impl DataIntegrityLayer {
    /// Layer over the given delegates.
    pub fn new(
        key_write: Arc<dyn KeyWriteOps>,
        schema_read: Arc<dyn SchemaReadOps>,
        schema_write: Arc<dyn SchemaWriteOps>,
    ) -> Self {
        Self {
            key_write,
            schema_read,
            schema_write,
        }
    }

    fn check_index_absent(&self, st: &mut KernelStatement, index: IndexDescriptor) -> Result<()> {
        if self
            .schema_read
            .indexes_get_for_label(st, index.label)?
            .contains(&index)
        {
            return Err(KernelError::AlreadyIndexed(index));
        }
        if self
            .schema_read
            .unique_indexes_get_for_label(st, index.label)?
            .contains(&index)
        {
            return Err(KernelError::AlreadyConstrained(UniquenessConstraint::new(
                index.label,
                index.property_key,
            )));
        }
        Ok(())
    }

    fn check_droppable(&self, st: &mut KernelStatement, index: IndexDescriptor) -> Result<()> {
        if self
            .schema_read
            .unique_indexes_get_for_label(st, index.label)?
            .contains(&index)
        {
            return Err(KernelError::IndexBelongsToConstraint(index));
        }
        if !self
            .schema_read
            .indexes_get_for_label(st, index.label)?
            .contains(&index)
        {
            return Err(KernelError::IndexNotFound(index));
        }
        Ok(())
    }

    fn check_constraint_absent(
        &self,
        st: &mut KernelStatement,
        constraint: UniquenessConstraint,
    ) -> Result<()> {
        let existing = self.schema_read.constraints_get_for_label_and_property_key(
            st,
            constraint.label,
            constraint.property_key,
        )?;
        if !existing.is_empty() {
            return Err(KernelError::AlreadyConstrained(constraint));
        }
        let index = constraint.index_descriptor();
        if self
            .schema_read
            .indexes_get_for_label(st, constraint.label)?
            .contains(&index)
        {
            return Err(KernelError::AlreadyIndexed(index));
        }
        Ok(())
    }
}

impl KeyWriteOps for DataIntegrityLayer {
    fn token_get_or_create_for_name(
        &self,
        st: &mut KernelStatement,
        kind: TokenKind,
        name: &str,
    ) -> Result<u32> {
        if name.is_empty() {
            return Err(KernelError::IllegalTokenName {
                kind,
                name: name.to_owned(),
            });
        }
        self.key_write.token_get_or_create_for_name(st, kind, name)
    }
}

impl SchemaWriteOps for DataIntegrityLayer {
    fn index_create(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<IndexDescriptor> {
        let descriptor = IndexDescriptor::new(label, key);
        self.check_index_absent(st, descriptor)
            .map_err(|cause| KernelError::AddIndexFailure {
                descriptor,
                cause: Box::new(cause),
            })?;
        self.schema_write.index_create(st, label, key)
    }

    fn index_drop(&self, st: &mut KernelStatement, index: IndexDescriptor) -> Result<()> {
        self.check_droppable(st, index)
            .map_err(|cause| KernelError::DropIndexFailure {
                descriptor: index,
                cause: Box::new(cause),
            })?;
        self.schema_write.index_drop(st, index)
    }

    fn uniqueness_constraint_create(
        &self,
        st: &mut KernelStatement,
        label: LabelId,
        key: PropKeyId,
    ) -> Result<UniquenessConstraint> {
        let constraint = UniquenessConstraint::new(label, key);
        self.check_constraint_absent(st, constraint)
            .map_err(|cause| KernelError::CreateConstraintFailure {
                constraint,
                cause: Box::new(cause),
            })?;
        self.schema_write.uniqueness_constraint_create(st, label, key)
    }

    fn constraint_drop(
        &self,
        st: &mut KernelStatement,
        constraint: UniquenessConstraint,
    ) -> Result<()> {
        let exists = self
            .schema_read
            .constraints_get_for_label_and_property_key(
                st,
                constraint.label,
                constraint.property_key,
            )?
            .contains(&constraint);
        if !exists {
            return Err(KernelError::DropConstraintFailure {
                constraint,
                cause: Box::new(KernelError::ConstraintNotFound(constraint)),
            });
        }
        self.schema_write.constraint_drop(st, constraint)
    }
}
