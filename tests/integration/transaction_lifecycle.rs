//! End-to-end transaction lifecycle: commit, rollback, read-your-own-writes and the
//! transaction-type lattice.

#![allow(missing_docs)]

mod common;

use sombra_kernel::types::Direction;
use sombra_kernel::{
    ErrorKind, KernelConfig, KernelError, NodeId, Property, PropertyValue, Result,
};

use common::{commit, kernel, kernel_with_store, read};

#[test]
fn committed_writes_are_visible_to_later_transactions() -> Result<()> {
    let kernel = kernel();
    let (node, person, name) = commit(&kernel, |st| {
        let person = st.token_write_operations().label_get_or_create_for_name("Person")?;
        let name = st
            .token_write_operations()
            .property_key_get_or_create_for_name("name")?;
        let mut write = st.data_write_operations()?;
        let node = write.node_create()?;
        assert!(write.node_add_label(node, person)?);
        write.node_set_property(node, Property::new(name, "Ada"))?;
        Ok((node, person, name))
    })?;

    read(&kernel, |st| {
        let mut ops = st.read_operations();
        assert!(ops.node_exists(node)?);
        assert_eq!(ops.node_get_labels(node)?, vec![person]);
        assert_eq!(
            ops.node_get_property(node, name)?,
            Some(PropertyValue::from("Ada"))
        );
        assert_eq!(ops.count_nodes(Some(person))?, 1);
        assert_eq!(ops.count_nodes(None)?, 1);
        assert_eq!(ops.label_get_name(person)?, "Person");
        Ok(())
    })
}

#[test]
fn transactions_without_success_roll_back() -> Result<()> {
    let kernel = kernel();
    let mut tx = kernel.begin_transaction()?;
    let node = {
        let mut st = tx.acquire_statement()?;
        let node = st.data_write_operations()?.node_create()?;
        assert!(st.read_operations().node_exists(node)?);
        node
    };
    assert!(tx.has_changes());
    assert_eq!(tx.close()?, None);

    read(&kernel, |st| {
        assert!(!st.read_operations().node_exists(node)?);
        assert_eq!(st.read_operations().count_nodes(None)?, 0);
        Ok(())
    })
}

#[test]
fn dropping_an_open_transaction_rolls_it_back() -> Result<()> {
    let kernel = kernel();
    let node = {
        let mut tx = kernel.begin_transaction()?;
        let mut st = tx.acquire_statement()?;
        st.data_write_operations()?.node_create()?
    };
    read(&kernel, |st| {
        assert!(!st.read_operations().node_exists(node)?);
        Ok(())
    })
}

#[test]
fn success_and_failure_together_roll_back_with_an_error() -> Result<()> {
    let kernel = kernel();
    let mut tx = kernel.begin_transaction()?;
    {
        let mut st = tx.acquire_statement()?;
        st.data_write_operations()?.node_create()?;
    }
    tx.success();
    tx.failure();
    let err = tx.close().expect_err("marked failed");
    assert!(matches!(err, KernelError::TransactionFailure { .. }));
    read(&kernel, |st| {
        assert_eq!(st.read_operations().count_nodes(None)?, 0);
        Ok(())
    })
}

#[test]
fn empty_commit_writes_nothing() -> Result<()> {
    let (kernel, store) = kernel_with_store(KernelConfig::default());
    let mut tx = kernel.begin_transaction()?;
    {
        let mut st = tx.acquire_statement()?;
        st.read_operations().nodes_get_all()?;
    }
    tx.success();
    assert_eq!(tx.close()?, None);
    assert!(store.transaction_log().is_empty());
    Ok(())
}

#[test]
fn overlay_merges_with_committed_state() -> Result<()> {
    let kernel = kernel();
    let (node, age, city) = commit(&kernel, |st| {
        let age = st.token_write_operations().property_key_get_or_create_for_name("age")?;
        let city = st.token_write_operations().property_key_get_or_create_for_name("city")?;
        let mut write = st.data_write_operations()?;
        let node = write.node_create()?;
        write.node_set_property(node, Property::new(age, 36i64))?;
        write.node_set_property(node, Property::new(city, "London"))?;
        Ok((node, age, city))
    })?;

    commit(&kernel, |st| {
        let mut write = st.data_write_operations()?;
        assert_eq!(
            write.node_set_property(node, Property::new(age, 37i64))?,
            Some(PropertyValue::Int(36))
        );
        assert_eq!(
            write.node_remove_property(node, city)?,
            Some(PropertyValue::from("London"))
        );
        assert_eq!(write.node_remove_property(node, city)?, None);

        let mut ops = st.read_operations();
        assert_eq!(ops.node_get_property(node, age)?, Some(PropertyValue::Int(37)));
        assert_eq!(ops.node_get_property(node, city)?, None);
        assert_eq!(
            ops.node_get_all_properties(node)?,
            vec![Property::new(age, 37i64)]
        );
        Ok(())
    })?;

    read(&kernel, |st| {
        assert_eq!(
            st.read_operations().node_get_all_properties(node)?,
            vec![Property::new(age, 37i64)]
        );
        Ok(())
    })
}

#[test]
fn label_changes_are_idempotent() -> Result<()> {
    let kernel = kernel();
    let (node, label) = commit(&kernel, |st| {
        let label = st.token_write_operations().label_get_or_create_for_name("Tag")?;
        let node = st.data_write_operations()?.node_create()?;
        Ok((node, label))
    })?;

    commit(&kernel, |st| {
        let mut write = st.data_write_operations()?;
        assert!(write.node_add_label(node, label)?);
        assert!(!write.node_add_label(node, label)?);
        assert!(write.node_remove_label(node, label)?);
        assert!(!write.node_remove_label(node, label)?);
        assert!(write.node_add_label(node, label)?);
        assert_eq!(st.read_operations().count_nodes(Some(label))?, 1);
        Ok(())
    })?;

    read(&kernel, |st| {
        let mut ops = st.read_operations();
        assert!(ops.node_has_label(node, label)?);
        assert_eq!(ops.nodes_get_for_label(label)?, vec![node]);
        Ok(())
    })
}

#[test]
fn relationships_and_degrees_follow_the_overlay() -> Result<()> {
    let kernel = kernel();
    let (a, b, knows) = commit(&kernel, |st| {
        let knows = st
            .token_write_operations()
            .relationship_type_get_or_create_for_name("KNOWS")?;
        let mut write = st.data_write_operations()?;
        let a = write.node_create()?;
        let b = write.node_create()?;
        write.relationship_create(knows, a, b)?;
        Ok((a, b, knows))
    })?;

    commit(&kernel, |st| {
        let rel = st.data_write_operations()?.relationship_create(knows, b, a)?;
        let mut ops = st.read_operations();
        assert_eq!(ops.node_get_degree(a, Direction::Both, None)?, 2);
        assert_eq!(ops.node_get_degree(a, Direction::Incoming, Some(knows))?, 1);
        assert_eq!(ops.node_get_relationship_types(a)?, vec![knows]);
        assert_eq!(ops.count_relationships(None, Some(knows), None)?, 2);
        let data = ops.relationship_get_data(rel)?;
        assert_eq!((data.start, data.end), (b, a));
        Ok(())
    })?;

    read(&kernel, |st| {
        let mut ops = st.read_operations();
        assert_eq!(ops.node_get_relationships(b, Direction::Outgoing, &[])?.len(), 1);
        assert_eq!(ops.count_relationships(None, None, None)?, 2);
        Ok(())
    })
}

#[test]
fn deleting_a_connected_node_fails_at_commit() -> Result<()> {
    let kernel = kernel();
    let (a, _) = commit(&kernel, |st| {
        let ty = st
            .token_write_operations()
            .relationship_type_get_or_create_for_name("LINKS")?;
        let mut write = st.data_write_operations()?;
        let a = write.node_create()?;
        let b = write.node_create()?;
        write.relationship_create(ty, a, b)?;
        Ok((a, b))
    })?;

    let err = commit(&kernel, |st| st.data_write_operations()?.node_delete(a))
        .expect_err("node still has a relationship");
    assert!(matches!(err, KernelError::NodeStillHasRelationships(node) if node == a));

    read(&kernel, |st| {
        assert!(st.read_operations().node_exists(a)?);
        Ok(())
    })
}

#[test]
fn missing_entities_are_reported() -> Result<()> {
    let kernel = kernel();
    read(&kernel, |st| {
        let err = st
            .read_operations()
            .node_get_labels(NodeId(42))
            .expect_err("no such node");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(st.read_operations().label_get_for_name("Nope")?.0, u32::MAX);
        assert_eq!(st.read_operations().count_nodes(Some(sombra_kernel::types::NO_SUCH_LABEL))?, 0);
        Ok(())
    })
}

#[test]
fn data_and_schema_writes_do_not_mix() -> Result<()> {
    let kernel = kernel();
    let (label, key) = commit(&kernel, |st| {
        let label = st.token_write_operations().label_get_or_create_for_name("L")?;
        let key = st.token_write_operations().property_key_get_or_create_for_name("k")?;
        Ok((label, key))
    })?;

    read(&kernel, |st| {
        st.data_write_operations()?.node_create()?;
        let err = st.schema_write_operations().err().expect("data writer");
        assert!(matches!(err, KernelError::InvalidTransactionType(_)));
        Ok(())
    })?;

    read(&kernel, |st| {
        st.schema_write_operations()?.index_create(label, key)?;
        let err = st.data_write_operations().err().expect("schema writer");
        assert!(matches!(err, KernelError::InvalidTransactionType(_)));
        Ok(())
    })
}

#[test]
fn nested_statements_share_the_transaction() -> Result<()> {
    let kernel = kernel();
    let mut tx = kernel.begin_transaction()?;
    {
        let mut outer = tx.acquire_statement()?;
        let node = {
            let mut inner = outer.nested();
            inner.data_write_operations()?.node_create()?
        };
        assert!(outer.read_operations().node_exists(node)?);
    }
    tx.success();
    assert!(tx.close()?.is_some());
    Ok(())
}

#[test]
fn read_only_kernels_refuse_writes() -> Result<()> {
    let (kernel, _) = kernel_with_store(KernelConfig::default().read_only(true));
    read(&kernel, |st| {
        let err = st
            .data_write_operations()?
            .node_create()
            .expect_err("read only");
        assert!(matches!(err, KernelError::ReadOnlyDatabase));
        let err = st
            .token_write_operations()
            .label_get_or_create_for_name("Person")
            .expect_err("read only");
        assert_eq!(err.kind(), ErrorKind::ReadOnly);
        assert!(st.read_operations().nodes_get_all()?.is_empty());
        Ok(())
    })
}

#[test]
fn schema_state_is_flushed_by_schema_commits() -> Result<()> {
    let kernel = kernel();
    read(&kernel, |st| {
        let plan = st
            .read_operations()
            .schema_state_get_or_create("plan", || String::from("scan"))?;
        assert_eq!(plan.as_str(), "scan");
        let again = st
            .read_operations()
            .schema_state_get_or_create("plan", || String::from("seek"))?;
        assert_eq!(again.as_str(), "scan");
        Ok(())
    })?;
    assert!(kernel.schema_state().contains("plan"));

    commit(&kernel, |st| {
        let label = st.token_write_operations().label_get_or_create_for_name("L")?;
        let key = st.token_write_operations().property_key_get_or_create_for_name("k")?;
        st.schema_write_operations()?.index_create(label, key)?;
        Ok(())
    })?;
    assert!(!kernel.schema_state().contains("plan"));
    Ok(())
}
