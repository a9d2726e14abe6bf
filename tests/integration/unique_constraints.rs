//! Uniqueness constraints: validation of writes, verification of existing data, the
//! constraint index lifecycle and the locked unique lookup under real contention.

#![allow(missing_docs)]

mod common;

use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use sombra_kernel::store::StoreReadLayer;
use sombra_kernel::types::NO_SUCH_NODE;
use sombra_kernel::{
    IndexDescriptor, IndexState, KernelConfig, KernelError, LabelId, NodeId, PropKeyId,
    Property, PropertyValue, Result, UniquenessConstraint,
};

use common::{commit, kernel, kernel_with_store, read};

fn tokens(kernel: &sombra_kernel::Kernel) -> Result<(LabelId, PropKeyId)> {
    commit(kernel, |st| {
        let label = st.token_write_operations().label_get_or_create_for_name("User")?;
        let key = st.token_write_operations().property_key_get_or_create_for_name("email")?;
        Ok((label, key))
    })
}

fn user(
    kernel: &sombra_kernel::Kernel,
    label: LabelId,
    key: PropKeyId,
    email: &str,
) -> Result<NodeId> {
    commit(kernel, |st| {
        let mut write = st.data_write_operations()?;
        let node = write.node_create()?;
        write.node_add_label(node, label)?;
        write.node_set_property(node, Property::new(key, email))?;
        Ok(node)
    })
}

fn constrain(
    kernel: &sombra_kernel::Kernel,
    label: LabelId,
    key: PropKeyId,
) -> Result<UniquenessConstraint> {
    commit(kernel, |st| {
        st.schema_write_operations()?
            .uniqueness_constraint_create(label, key)
    })
}

#[test]
fn duplicate_values_are_rejected() -> Result<()> {
    let kernel = kernel();
    let (label, key) = tokens(&kernel)?;
    constrain(&kernel, label, key)?;
    let first = user(&kernel, label, key, "ada@example.com")?;

    let err = user(&kernel, label, key, "ada@example.com").expect_err("duplicate email");
    match err {
        KernelError::UniquePropertyConstraintViolation {
            existing, value, ..
        } => {
            assert_eq!(existing, first);
            assert_eq!(value, PropertyValue::from("ada@example.com"));
        }
        other => panic!("unexpected error {other:?}"),
    }

    user(&kernel, label, key, "grace@example.com")?;
    read(&kernel, |st| {
        assert_eq!(st.read_operations().count_nodes(Some(label))?, 2);
        Ok(())
    })
}

#[test]
fn duplicates_inside_one_transaction_are_rejected() -> Result<()> {
    let kernel = kernel();
    let (label, key) = tokens(&kernel)?;
    constrain(&kernel, label, key)?;

    let err = commit(&kernel, |st| {
        let mut write = st.data_write_operations()?;
        let a = write.node_create()?;
        write.node_set_property(a, Property::new(key, "same"))?;
        write.node_add_label(a, label)?;
        let b = write.node_create()?;
        write.node_set_property(b, Property::new(key, "same"))?;
        write.node_add_label(b, label)?;
        Ok(())
    })
    .expect_err("second label add collides");
    assert!(matches!(
        err,
        KernelError::UniquePropertyConstraintViolation { .. }
    ));
    Ok(())
}

#[test]
fn existing_duplicates_fail_verification() -> Result<()> {
    let kernel = kernel();
    let (label, key) = tokens(&kernel)?;
    user(&kernel, label, key, "dup")?;
    user(&kernel, label, key, "dup")?;

    let err = constrain(&kernel, label, key).expect_err("data is not unique");
    assert!(matches!(
        err,
        KernelError::ConstraintVerificationFailed { .. }
    ));

    read(&kernel, |st| {
        let mut ops = st.read_operations();
        assert!(ops.constraints_get_all()?.is_empty());
        assert!(ops.unique_indexes_get_all()?.is_empty());
        Ok(())
    })
}

#[test]
fn rolled_back_constraint_leaves_no_index_behind() -> Result<()> {
    let kernel = kernel();
    let (label, key) = tokens(&kernel)?;

    read(&kernel, |st| {
        st.schema_write_operations()?
            .uniqueness_constraint_create(label, key)?;
        let mut ops = st.read_operations();
        assert_eq!(
            ops.constraints_get_for_label(label)?,
            vec![UniquenessConstraint::new(label, key)]
        );
        Ok(())
    })?;

    read(&kernel, |st| {
        let mut ops = st.read_operations();
        assert!(ops.constraints_get_all()?.is_empty());
        assert!(ops.unique_indexes_get_all()?.is_empty());
        Ok(())
    })
}

fn recreate_in_one_transaction(
    st: &mut sombra_kernel::kernel::Statement<'_>,
    label: LabelId,
    key: PropKeyId,
) -> Result<()> {
    let constraint = st
        .schema_write_operations()?
        .uniqueness_constraint_create(label, key)?;
    st.schema_write_operations()?.constraint_drop(constraint)?;
    st.schema_write_operations()?
        .uniqueness_constraint_create(label, key)?;
    assert_eq!(
        st.read_operations().unique_indexes_get_for_label(label)?,
        vec![IndexDescriptor::new(label, key)]
    );
    Ok(())
}

#[test]
fn recreated_constraint_rolls_back_without_orphans() -> Result<()> {
    let kernel = kernel();
    let (label, key) = tokens(&kernel)?;

    read(&kernel, |st| recreate_in_one_transaction(st, label, key))?;

    assert!(kernel.store().index_rules_get_all().is_empty());
    read(&kernel, |st| {
        let mut ops = st.read_operations();
        assert!(ops.constraints_get_all()?.is_empty());
        assert!(ops.unique_indexes_get_all()?.is_empty());
        Ok(())
    })?;
    let index = commit(&kernel, |st| st.schema_write_operations()?.index_create(label, key))?;
    assert_eq!(index, IndexDescriptor::new(label, key));
    Ok(())
}

#[test]
fn recreated_constraint_commits_one_owned_index() -> Result<()> {
    let kernel = kernel();
    let (label, key) = tokens(&kernel)?;

    commit(&kernel, |st| recreate_in_one_transaction(st, label, key))?;

    let rules = kernel.store().index_rules_get_all();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].descriptor, IndexDescriptor::new(label, key));
    read(&kernel, |st| {
        let mut ops = st.read_operations();
        assert_eq!(
            ops.constraints_get_all()?,
            vec![UniquenessConstraint::new(label, key)]
        );
        let index = IndexDescriptor::new(label, key);
        assert_eq!(ops.index_get_state(index)?, IndexState::Online);
        assert!(ops.index_get_owning_uniqueness_constraint_id(index)?.is_some());
        Ok(())
    })
}

#[test]
fn committed_constraint_owns_an_online_index() -> Result<()> {
    let kernel = kernel();
    let (label, key) = tokens(&kernel)?;
    let constraint = constrain(&kernel, label, key)?;
    let index = IndexDescriptor::new(label, key);

    read(&kernel, |st| {
        let mut ops = st.read_operations();
        assert_eq!(ops.unique_indexes_get_for_label(label)?, vec![index]);
        assert_eq!(ops.index_get_state(index)?, IndexState::Online);
        assert!(ops.index_get_owning_uniqueness_constraint_id(index)?.is_some());
        assert!(ops.indexes_get_for_label(label)?.is_empty());
        Ok(())
    })?;

    let err = constrain(&kernel, label, key).expect_err("already constrained");
    assert!(matches!(err, KernelError::CreateConstraintFailure { .. }));

    let err = commit(&kernel, |st| st.schema_write_operations()?.index_drop(index))
        .expect_err("index belongs to the constraint");
    assert!(matches!(err, KernelError::DropIndexFailure { .. }));

    commit(&kernel, |st| st.schema_write_operations()?.constraint_drop(constraint))?;
    read(&kernel, |st| {
        let mut ops = st.read_operations();
        assert!(ops.constraints_get_all()?.is_empty());
        assert!(ops.unique_indexes_get_all()?.is_empty());
        Ok(())
    })
}

#[test]
fn unique_seek_sees_uncommitted_nodes() -> Result<()> {
    let kernel = kernel();
    let (label, key) = tokens(&kernel)?;
    constrain(&kernel, label, key)?;
    let index = IndexDescriptor::new(label, key);
    let value = PropertyValue::from("mine");

    read(&kernel, |st| {
        assert_eq!(
            st.read_operations()
                .node_get_from_unique_index_seek(index, &value)?,
            NO_SUCH_NODE
        );
        let mut write = st.data_write_operations()?;
        let node = write.node_create()?;
        write.node_add_label(node, label)?;
        write.node_set_property(node, Property::new(key, value.clone()))?;
        assert_eq!(
            st.read_operations()
                .node_get_from_unique_index_seek(index, &value)?,
            node
        );
        Ok(())
    })
}

#[test]
fn concurrent_get_or_create_produces_one_node() -> Result<()> {
    let config = KernelConfig::default().lock_acquisition_timeout(Duration::from_secs(10));
    let (kernel, store) = kernel_with_store(config);
    let (label, key) = tokens(&kernel)?;
    constrain(&kernel, label, key)?;
    let index = IndexDescriptor::new(label, key);
    let value = PropertyValue::from("singleton");

    const WORKERS: usize = 8;
    let barrier = Barrier::new(WORKERS);
    let outcomes: Vec<Result<(NodeId, bool)>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    commit(&kernel, |st| {
                        let found = st
                            .read_operations()
                            .node_get_from_unique_index_seek(index, &value)?;
                        if found != NO_SUCH_NODE {
                            return Ok((found, false));
                        }
                        let mut write = st.data_write_operations()?;
                        let node = write.node_create()?;
                        write.node_add_label(node, label)?;
                        write.node_set_property(node, Property::new(key, value.clone()))?;
                        Ok((node, true))
                    })
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker panicked"))
            .collect()
    });

    let outcomes = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
    let created: Vec<NodeId> = outcomes
        .iter()
        .filter(|(_, created)| *created)
        .map(|(node, _)| *node)
        .collect();
    assert_eq!(created.len(), 1);
    assert!(outcomes.iter().all(|(node, _)| *node == created[0]));

    read(&kernel, |st| {
        assert_eq!(st.read_operations().count_nodes(Some(label))?, 1);
        Ok(())
    })?;
    assert!(store.verify_counts().is_empty());
    Ok(())
}
