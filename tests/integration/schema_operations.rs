//! Index lifecycle, schema integrity checks and index lookups through the overlay.

#![allow(missing_docs)]

mod common;

use sombra_kernel::types::{TokenKind, NO_SUCH_LABEL};
use sombra_kernel::{
    IndexDescriptor, IndexState, Kernel, KernelError, LabelId, PropKeyId, Property,
    PropertyValue, Result,
};

use common::{commit, kernel, read};

fn tokens(kernel: &Kernel) -> Result<(LabelId, PropKeyId)> {
    commit(kernel, |st| {
        let label = st.token_write_operations().label_get_or_create_for_name("City")?;
        let key = st.token_write_operations().property_key_get_or_create_for_name("name")?;
        Ok((label, key))
    })
}

#[test]
fn indexes_come_online_when_committed() -> Result<()> {
    let kernel = kernel();
    let (label, key) = tokens(&kernel)?;
    let index = commit(&kernel, |st| {
        let index = st.schema_write_operations()?.index_create(label, key)?;
        let mut ops = st.read_operations();
        assert_eq!(ops.index_get_state(index)?, IndexState::Populating);
        assert_eq!(ops.indexes_get_for_label(label)?, vec![index]);
        Ok(index)
    })?;

    read(&kernel, |st| {
        let mut ops = st.read_operations();
        assert_eq!(ops.index_get_state(index)?, IndexState::Online);
        assert_eq!(ops.index_get_for_label_and_property_key(label, key)?, index);
        assert_eq!(ops.indexes_get_all()?, vec![index]);
        assert_eq!(ops.index_get_failure(index)?, None);
        Ok(())
    })
}

#[test]
fn schema_integrity_is_checked() -> Result<()> {
    let kernel = kernel();
    let (label, key) = tokens(&kernel)?;
    commit(&kernel, |st| st.schema_write_operations()?.index_create(label, key))?;

    let err = commit(&kernel, |st| st.schema_write_operations()?.index_create(label, key))
        .expect_err("already indexed");
    match err {
        KernelError::AddIndexFailure { cause, .. } => {
            assert!(matches!(*cause, KernelError::AlreadyIndexed(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let other = IndexDescriptor::new(label, PropKeyId(key.0 + 100));
    let err = commit(&kernel, |st| st.schema_write_operations()?.index_drop(other))
        .expect_err("no such index");
    match err {
        KernelError::DropIndexFailure { cause, .. } => {
            assert!(matches!(*cause, KernelError::IndexNotFound(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let err = commit(&kernel, |st| {
        st.schema_write_operations()?
            .uniqueness_constraint_create(label, key)
    })
    .expect_err("a plain index already covers the pair");
    assert!(matches!(err, KernelError::CreateConstraintFailure { .. }));
    Ok(())
}

#[test]
fn dropping_and_recreating_in_one_transaction_cancels_out() -> Result<()> {
    let kernel = kernel();
    let (label, key) = tokens(&kernel)?;
    let index = commit(&kernel, |st| st.schema_write_operations()?.index_create(label, key))?;

    commit(&kernel, |st| {
        let mut schema = st.schema_write_operations()?;
        schema.index_drop(index)?;
        schema.index_create(label, key)?;
        Ok(())
    })?;

    read(&kernel, |st| {
        let mut ops = st.read_operations();
        assert_eq!(ops.indexes_get_all()?, vec![index]);
        assert_eq!(ops.index_get_state(index)?, IndexState::Online);
        Ok(())
    })
}

#[test]
fn index_lookups_see_uncommitted_changes() -> Result<()> {
    let kernel = kernel();
    let (label, key) = tokens(&kernel)?;
    let index = commit(&kernel, |st| st.schema_write_operations()?.index_create(label, key))?;
    let (paris, rome) = commit(&kernel, |st| {
        let mut write = st.data_write_operations()?;
        let paris = write.node_create()?;
        write.node_add_label(paris, label)?;
        write.node_set_property(paris, Property::new(key, "Paris"))?;
        let rome = write.node_create()?;
        write.node_add_label(rome, label)?;
        write.node_set_property(rome, Property::new(key, "Rome"))?;
        Ok((paris, rome))
    })?;

    read(&kernel, |st| {
        let mut write = st.data_write_operations()?;
        write.node_set_property(paris, Property::new(key, "Lutetia"))?;
        write.node_remove_label(rome, label)?;
        let madrid = write.node_create()?;
        write.node_set_property(madrid, Property::new(key, "Madrid"))?;
        write.node_add_label(madrid, label)?;

        let mut ops = st.read_operations();
        assert!(ops
            .nodes_get_from_index_seek(index, &PropertyValue::from("Paris"))?
            .is_empty());
        assert_eq!(
            ops.nodes_get_from_index_seek(index, &PropertyValue::from("Lutetia"))?,
            vec![paris]
        );
        assert!(ops
            .nodes_get_from_index_seek(index, &PropertyValue::from("Rome"))?
            .is_empty());
        let mut scanned = ops.nodes_get_from_index_scan(index)?;
        scanned.sort();
        assert_eq!(scanned, vec![paris, madrid]);
        Ok(())
    })?;

    read(&kernel, |st| {
        assert_eq!(
            st.read_operations()
                .nodes_get_from_index_seek(index, &PropertyValue::from("Rome"))?,
            vec![rome]
        );
        Ok(())
    })
}

#[test]
fn token_names_are_validated() -> Result<()> {
    let kernel = kernel();
    read(&kernel, |st| {
        let err = st
            .token_write_operations()
            .label_get_or_create_for_name("")
            .expect_err("empty name");
        assert!(matches!(
            err,
            KernelError::IllegalTokenName {
                kind: TokenKind::Label,
                ..
            }
        ));
        let first = st
            .token_write_operations()
            .relationship_type_get_or_create_for_name("ROAD")?;
        let again = st
            .token_write_operations()
            .relationship_type_get_or_create_for_name("ROAD")?;
        assert_eq!(first, again);
        Ok(())
    })
}

#[test]
fn sentinel_tokens_never_match_an_index() -> Result<()> {
    let kernel = kernel();
    let (_, key) = tokens(&kernel)?;
    read(&kernel, |st| {
        let err = st
            .read_operations()
            .index_get_for_label_and_property_key(NO_SUCH_LABEL, key)
            .expect_err("sentinel label");
        assert!(matches!(err, KernelError::IndexNotFound(_)));
        assert!(st
            .read_operations()
            .constraints_get_for_label(NO_SUCH_LABEL)?
            .is_empty());
        Ok(())
    })
}
