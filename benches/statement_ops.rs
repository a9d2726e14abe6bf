#![forbid(unsafe_code)]
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sombra_kernel::{
    IndexDescriptor, Kernel, KernelConfig, LabelId, NodeId, PropKeyId, Property,
    PropertyValue,
};

const NODE_COUNT: usize = 4_096;
const VALUE_DOMAIN: i64 = 1_000;

fn statement_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel/statement");
    group.sample_size(40);
    let mut harness = StatementHarness::new(NODE_COUNT, VALUE_DOMAIN);

    group.throughput(Throughput::Elements(1));
    group.bench_function("create_node_commit", |b| {
        b.iter(|| black_box(harness.create_node()));
    });

    group.throughput(Throughput::Elements(1));
    group.bench_function("index_seek_with_overlay", |b| {
        b.iter(|| black_box(harness.seek_with_overlay()));
    });

    group.throughput(Throughput::Elements(64));
    group.bench_function("cached_property_reads", |b| {
        b.iter(|| black_box(harness.cached_reads(64)));
    });

    group.throughput(Throughput::Elements(1));
    group.bench_function("count_with_delta", |b| {
        b.iter(|| black_box(harness.count_with_delta()));
    });

    group.finish();
}

struct StatementHarness {
    kernel: Kernel,
    label: LabelId,
    key: PropKeyId,
    index: IndexDescriptor,
    nodes: Vec<NodeId>,
    domain: i64,
    rng: ChaCha8Rng,
}

impl StatementHarness {
    fn new(node_count: usize, domain: i64) -> Self {
        let kernel = Kernel::new(KernelConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(0xC0FFEE);

        let mut tx = kernel.begin_transaction().expect("tx");
        let (label, key, index) = {
            let mut st = tx.acquire_statement().expect("statement");
            let label = st
                .token_write_operations()
                .label_get_or_create_for_name("Item")
                .expect("label");
            let key = st
                .token_write_operations()
                .property_key_get_or_create_for_name("value")
                .expect("key");
            let index = st
                .schema_write_operations()
                .expect("schema")
                .index_create(label, key)
                .expect("index");
            (label, key, index)
        };
        tx.success();
        tx.close().expect("commit schema");

        let mut tx = kernel.begin_transaction().expect("tx");
        let mut nodes = Vec::with_capacity(node_count);
        {
            let mut st = tx.acquire_statement().expect("statement");
            let mut write = st.data_write_operations().expect("write");
            for _ in 0..node_count {
                let node = write.node_create().expect("node");
                write.node_add_label(node, label).expect("label");
                write
                    .node_set_property(node, Property::new(key, rng.gen_range(0..domain)))
                    .expect("property");
                nodes.push(node);
            }
        }
        tx.success();
        tx.close().expect("commit data");

        Self {
            kernel,
            label,
            key,
            index,
            nodes,
            domain,
            rng,
        }
    }

    fn create_node(&mut self) -> NodeId {
        let mut tx = self.kernel.begin_transaction().expect("tx");
        let node = {
            let mut st = tx.acquire_statement().expect("statement");
            let mut write = st.data_write_operations().expect("write");
            let node = write.node_create().expect("node");
            write.node_add_label(node, self.label).expect("label");
            node
        };
        tx.success();
        tx.close().expect("commit");
        node
    }

    fn seek_with_overlay(&mut self) -> usize {
        let value = PropertyValue::Int(self.rng.gen_range(0..self.domain));
        let node = self.nodes[self.rng.gen_range(0..self.nodes.len())];
        let mut tx = self.kernel.begin_transaction().expect("tx");
        let found = {
            let mut st = tx.acquire_statement().expect("statement");
            st.data_write_operations()
                .expect("write")
                .node_set_property(node, Property::new(self.key, value.clone()))
                .expect("property");
            st.read_operations()
                .nodes_get_from_index_seek(self.index, &value)
                .expect("seek")
                .len()
        };
        tx.close().expect("rollback");
        found
    }

    fn cached_reads(&mut self, reads: usize) -> usize {
        let node = self.nodes[self.rng.gen_range(0..self.nodes.len())];
        let mut tx = self.kernel.begin_transaction().expect("tx");
        let hits = {
            let mut st = tx.acquire_statement().expect("statement");
            let mut ops = st.read_operations();
            (0..reads)
                .filter(|_| {
                    ops.node_get_property(node, self.key)
                        .expect("property")
                        .is_some()
                })
                .count()
        };
        tx.close().expect("close");
        hits
    }

    fn count_with_delta(&mut self) -> i64 {
        let node = self.nodes[self.rng.gen_range(0..self.nodes.len())];
        let mut tx = self.kernel.begin_transaction().expect("tx");
        let count = {
            let mut st = tx.acquire_statement().expect("statement");
            st.data_write_operations()
                .expect("write")
                .node_remove_label(node, self.label)
                .expect("label");
            st.read_operations()
                .count_nodes(Some(self.label))
                .expect("count")
        };
        tx.close().expect("rollback");
        count
    }
}

criterion_group!(benches, statement_ops);
criterion_main!(benches);
