//! Counts stay consistent with the graph: inside open transactions (store counts plus
//! the transaction's delta) and after commit (maintained counts versus a full rebuild).

#![allow(missing_docs)]

mod common;

use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sombra_kernel::types::Direction;
use sombra_kernel::{KernelConfig, KernelError, LabelId, NodeId, Result, Statement, TypeId};

use common::{commit, kernel_with_store, read};

/// Checks every count the kernel reports against a scan of the same transaction's view.
fn assert_counts_match_scan(st: &mut Statement<'_>, labels: &[LabelId], types: &[TypeId]) -> Result<()> {
    let mut ops = st.read_operations();
    let nodes = ops.nodes_get_all()?;
    assert_eq!(ops.count_nodes(None)?, nodes.len() as i64);
    for label in labels {
        let labelled = ops.nodes_get_for_label(*label)?.len() as i64;
        assert_eq!(ops.count_nodes(Some(*label))?, labelled, "nodes with {label}");
    }

    let mut shapes = Vec::new();
    for rel in ops.relationships_get_all()? {
        shapes.push(ops.relationship_get_data(rel)?);
    }
    assert_eq!(ops.count_relationships(None, None, None)?, shapes.len() as i64);
    for ty in types.iter().copied().map(Some).chain([None]) {
        let typed: Vec<_> = shapes
            .iter()
            .filter(|data| ty.map_or(true, |ty| data.ty == ty))
            .collect();
        assert_eq!(ops.count_relationships(None, ty, None)?, typed.len() as i64);
        for label in labels {
            let mut from = 0;
            let mut to = 0;
            for data in &typed {
                if ops.node_has_label(data.start, *label)? {
                    from += 1;
                }
                if ops.node_has_label(data.end, *label)? {
                    to += 1;
                }
            }
            assert_eq!(ops.count_relationships(Some(*label), ty, None)?, from);
            assert_eq!(ops.count_relationships(None, ty, Some(*label))?, to);
        }
    }
    Ok(())
}

/// Applies one random mutation to the transaction's view of the graph.
fn mutate(
    st: &mut Statement<'_>,
    rng: &mut ChaCha8Rng,
    labels: &[LabelId],
    types: &[TypeId],
) -> Result<()> {
    let nodes: Vec<NodeId> = st.read_operations().nodes_get_all()?;
    let label = *labels.choose(rng).expect("labels");
    match (rng.gen_range(0..7), nodes.choose(rng).copied()) {
        (0, _) | (_, None) => {
            let mut write = st.data_write_operations()?;
            let node = write.node_create()?;
            if rng.gen_bool(0.5) {
                write.node_add_label(node, label)?;
            }
        }
        (1, Some(node)) => {
            st.data_write_operations()?.node_add_label(node, label)?;
        }
        (2, Some(node)) => {
            st.data_write_operations()?.node_remove_label(node, label)?;
        }
        (3, Some(start)) => {
            let end = *nodes.choose(rng).expect("nodes");
            let ty = *types.choose(rng).expect("types");
            st.data_write_operations()?.relationship_create(ty, start, end)?;
        }
        (4, Some(_)) => {
            let rels = st.read_operations().relationships_get_all()?;
            if let Some(rel) = rels.choose(rng) {
                st.data_write_operations()?.relationship_delete(*rel)?;
            }
        }
        (_, Some(node)) => {
            let attached = st
                .read_operations()
                .node_get_relationships(node, Direction::Both, &[])?;
            if attached.is_empty() {
                st.data_write_operations()?.node_delete(node)?;
            }
        }
    }
    Ok(())
}

fn run_workload(seed: u64, transactions: usize) -> Result<()> {
    let (kernel, store) = kernel_with_store(KernelConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (labels, types) = commit(&kernel, |st| {
        let mut tokens = st.token_write_operations();
        let labels = vec![
            tokens.label_get_or_create_for_name("A")?,
            tokens.label_get_or_create_for_name("B")?,
        ];
        let types = vec![
            tokens.relationship_type_get_or_create_for_name("X")?,
            tokens.relationship_type_get_or_create_for_name("Y")?,
        ];
        Ok((labels, types))
    })?;

    for _ in 0..transactions {
        let keep = rng.gen_bool(0.7);
        let steps = rng.gen_range(1..8);
        let mut tx = kernel.begin_transaction()?;
        {
            let mut st = tx.acquire_statement()?;
            for _ in 0..steps {
                mutate(&mut st, &mut rng, &labels, &types)?;
            }
            assert_counts_match_scan(&mut st, &labels, &types)?;
        }
        if keep {
            tx.success();
        }
        tx.close()?;
        assert_eq!(store.verify_counts(), Vec::new());
    }

    read(&kernel, |st| assert_counts_match_scan(st, &labels, &types))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn counts_match_the_graph(seed in any::<u64>(), transactions in 1usize..12) {
        run_workload(seed, transactions).map_err(|err| TestCaseError::fail(err.to_string()))?;
    }
}

#[test]
fn deleting_a_labelled_node_decrements_every_dimension() -> Result<()> {
    let (kernel, store) = kernel_with_store(KernelConfig::default());
    let (node, label, ty) = commit(&kernel, |st| {
        let label = st.token_write_operations().label_get_or_create_for_name("A")?;
        let ty = st
            .token_write_operations()
            .relationship_type_get_or_create_for_name("X")?;
        let mut write = st.data_write_operations()?;
        let node = write.node_create()?;
        write.node_add_label(node, label)?;
        let other = write.node_create()?;
        write.relationship_create(ty, node, other)?;
        Ok((node, label, ty))
    })?;

    commit(&kernel, |st| {
        let rel = st
            .read_operations()
            .node_get_relationships(node, Direction::Outgoing, &[])?[0]
            .id;
        let mut write = st.data_write_operations()?;
        write.relationship_delete(rel)?;
        write.node_delete(node)?;
        let mut ops = st.read_operations();
        assert_eq!(ops.count_nodes(Some(label))?, 0);
        assert_eq!(ops.count_nodes(None)?, 1);
        assert_eq!(ops.count_relationships(Some(label), Some(ty), None)?, 0);
        Ok(())
    })?;
    assert!(store.verify_counts().is_empty());
    Ok(())
}

#[test]
fn both_endpoint_labels_are_unsupported() -> Result<()> {
    let (kernel, _) = kernel_with_store(KernelConfig::default());
    let label = commit(&kernel, |st| {
        st.token_write_operations().label_get_or_create_for_name("A")
    })?;
    read(&kernel, |st| {
        let err = st
            .read_operations()
            .count_relationships(Some(label), None, Some(label))
            .expect_err("both ends constrained");
        assert!(matches!(err, KernelError::UnsupportedOperation(_)));
        Ok(())
    })
}
