use std::collections::{BTreeMap, BTreeSet};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use crate::counts::{
    CountsComputer, CountsKey, CountsRecordState, CountsState, CountsValue, CountsVerifier,
    Difference, LabelField, TypedDegree,
};
use crate::schema::{
    ConstraintRule, IndexDescriptor, IndexRule, IndexRuleKind, IndexState, UniquenessConstraint,
};
use crate::store::{
    Command, IndexFailure, IndexProviderMap, StoreReadLayer, TokenHolders,
    TransactionCommitProcess, TransactionHeader, TransactionRepresentation,
};
use crate::types::{
    Direction, KernelError, LabelId, NodeId, PropKeyId, RelId, RelationshipData, Result, RuleId,
    TokenKind, TxId, TypeId, BASE_TX_ID,
};
use crate::value::{Property, PropertyValue};

#[derive(Default)]
struct IdGenerator {
    next: u64,
    freed: Vec<u64>,
}

impl IdGenerator {
    fn reserve(&mut self) -> u64 {
        self.freed.pop().unwrap_or_else(|| {
            let id = self.next;
            self.next += 1;
            id
        })
    }

    fn release(&mut self, id: u64) {
        if id < self.next && !self.freed.contains(&id) {
            self.freed.push(id);
        }
    }

    fn mark_used(&mut self, id: u64) {
        self.freed.retain(|freed| *freed != id);
        if id >= self.next {
            self.next = id + 1;
        }
    }
}

#[derive(Debug, Default)]
struct NodeRecord {
    labels: LabelField,
    properties: BTreeMap<PropKeyId, PropertyValue>,
    relationships: BTreeSet<RelId>,
}

#[derive(Debug)]
struct RelationshipRecord {
    data: RelationshipData,
    properties: BTreeMap<PropKeyId, PropertyValue>,
}

struct StoreData {
    nodes: BTreeMap<NodeId, NodeRecord>,
    relationships: BTreeMap<RelId, RelationshipRecord>,
    label_scan: BTreeMap<LabelId, BTreeSet<NodeId>>,
    index_rules: BTreeMap<RuleId, IndexRule>,
    constraint_rules: BTreeMap<RuleId, ConstraintRule>,
    counts: CountsState,
    last_tx: TxId,
    log: Vec<TransactionRepresentation>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            relationships: BTreeMap::new(),
            label_scan: BTreeMap::new(),
            index_rules: BTreeMap::new(),
            constraint_rules: BTreeMap::new(),
            counts: CountsState::new(),
            last_tx: BASE_TX_ID,
            log: Vec::new(),
        }
    }
}

impl StoreData {
    fn node(&self, node: NodeId) -> Result<&NodeRecord> {
        self.nodes
            .get(&node)
            .ok_or_else(|| KernelError::node_not_found(node))
    }

    fn relationship(&self, rel: RelId) -> Result<&RelationshipRecord> {
        self.relationships
            .get(&rel)
            .ok_or_else(|| KernelError::relationship_not_found(rel))
    }

    fn index_rule_for(&self, descriptor: &IndexDescriptor) -> Option<&IndexRule> {
        self.index_rules
            .values()
            .find(|rule| rule.descriptor == *descriptor)
    }

    fn degrees(&self, node: NodeId) -> Vec<TypedDegree> {
        let Some(record) = self.nodes.get(&node) else {
            return Vec::new();
        };
        let mut by_type: BTreeMap<TypeId, TypedDegree> = BTreeMap::new();
        for rel in &record.relationships {
            let Some(rel) = self.relationships.get(rel) else {
                continue;
            };
            let entry = by_type.entry(rel.data.ty).or_insert(TypedDegree {
                ty: rel.data.ty,
                outgoing: 0,
                incoming: 0,
            });
            if rel.data.start == node {
                entry.outgoing += 1;
            }
            if rel.data.end == node {
                entry.incoming += 1;
            }
        }
        by_type.into_values().collect()
    }

    fn labels_of(&self, node: NodeId) -> Vec<LabelId> {
        self.nodes
            .get(&node)
            .map(|record| record.labels.labels().to_vec())
            .unwrap_or_default()
    }

    /// Indexed value of every touched node for every rule.
    fn index_entries(
        &self,
        rules: &[IndexRule],
        nodes: &FxHashSet<NodeId>,
    ) -> FxHashMap<(RuleId, NodeId), PropertyValue> {
        let mut entries = FxHashMap::default();
        for node in nodes {
            let Some(record) = self.nodes.get(node) else {
                continue;
            };
            for rule in rules {
                if !record.labels.contains(rule.descriptor.label) {
                    continue;
                }
                if let Some(value) = record.properties.get(&rule.descriptor.property_key) {
                    entries.insert((rule.id, *node), value.clone());
                }
            }
        }
        entries
    }

    fn population_entries(&self, descriptor: &IndexDescriptor) -> Vec<(PropertyValue, NodeId)> {
        self.label_scan
            .get(&descriptor.label)
            .into_iter()
            .flatten()
            .filter_map(|node| {
                let record = self.nodes.get(node)?;
                let value = record.properties.get(&descriptor.property_key)?;
                Some((value.clone(), *node))
            })
            .collect()
    }
}

/// Records created and removed by the commands of one batch seen so far.
struct Staged<T> {
    created: FxHashSet<T>,
    removed: FxHashSet<T>,
}

impl<T> Default for Staged<T> {
    fn default() -> Self {
        Self {
            created: FxHashSet::default(),
            removed: FxHashSet::default(),
        }
    }
}

impl<T: Copy + Eq + std::hash::Hash> Staged<T> {
    fn live(&self, committed: bool, id: &T) -> bool {
        (committed || self.created.contains(id)) && !self.removed.contains(id)
    }

    fn create(&mut self, id: T) {
        self.removed.remove(&id);
        self.created.insert(id);
    }

    fn remove(&mut self, id: T) {
        self.created.remove(&id);
        self.removed.insert(id);
    }
}

/// Reference committed store kept entirely in memory.
///
/// Applies command batches atomically under one write lock, maintains the label scan,
/// the indexes of its [`IndexProviderMap`] and the committed counts, and keeps every
/// applied batch in an ordered log that [`InMemoryStore::replay`] can rebuild from.
pub struct InMemoryStore {
    data: RwLock<StoreData>,
    tokens: TokenHolders,
    node_ids: Mutex<IdGenerator>,
    relationship_ids: Mutex<IdGenerator>,
    rule_ids: Mutex<IdGenerator>,
    providers: IndexProviderMap,
    verify_counts_on_commit: bool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Empty store with the in-memory index provider.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            tokens: TokenHolders::default(),
            node_ids: Mutex::new(IdGenerator::default()),
            relationship_ids: Mutex::new(IdGenerator::default()),
            rule_ids: Mutex::new(IdGenerator::default()),
            providers: IndexProviderMap::in_memory(),
            verify_counts_on_commit: false,
        }
    }

    /// Replaces the index providers.
    pub fn with_providers(mut self, providers: IndexProviderMap) -> Self {
        self.providers = providers;
        self
    }

    /// Runs the counts verifier after every commit and logs divergence.
    pub fn verify_counts_on_commit(mut self, enabled: bool) -> Self {
        self.verify_counts_on_commit = enabled;
        self
    }

    /// Rebuilds a store by applying `log` to an empty one.
    pub fn replay(log: impl IntoIterator<Item = TransactionRepresentation>) -> Result<Self> {
        let store = Self::new();
        for transaction in log {
            store.commit(transaction)?;
        }
        Ok(store)
    }

    /// Every applied batch, in commit order.
    pub fn transaction_log(&self) -> Vec<TransactionRepresentation> {
        self.data.read().log.clone()
    }

    /// Snapshot of the committed counters.
    pub fn counts(&self) -> CountsState {
        self.data.read().counts.clone()
    }

    /// Recomputes every counter from a full scan and reports divergence from the tracked ones.
    pub fn verify_counts(&self) -> Vec<Difference> {
        let data = self.data.read();
        self.verify_counts_locked(&data)
    }

    fn verify_counts_locked(&self, data: &StoreData) -> Vec<Difference> {
        let mut computer = CountsComputer::new();
        for record in data.nodes.values() {
            computer.node(&record.labels);
        }
        for rel in data.relationships.values() {
            computer.relationship(
                rel.data.ty,
                &data.labels_of(rel.data.start),
                &data.labels_of(rel.data.end),
            );
        }
        for rule in data.index_rules.values() {
            if let Some(provider) = self.providers.get(&rule.provider) {
                let (unique, size) = provider.sample(rule.id);
                computer.index(rule.id, unique, size);
            }
        }
        let mut actual = computer.finish();
        // Update registers cannot be recomputed from a scan.
        for (key, value) in data.counts.iter() {
            if let CountsKey::IndexStatistics { .. } = key {
                let mut recomputed = actual.get(key);
                recomputed.first = value.first;
                actual.replace(*key, recomputed);
            }
        }
        CountsVerifier::new(&data.counts).verify(&actual)
    }

    /// Rejects a batch before any of it is applied.
    ///
    /// Covers every way [`apply`](Self::apply) can fail, taking earlier commands of the
    /// same batch into account, so a batch either applies whole or leaves no trace.
    fn validate(&self, data: &StoreData, commands: &[Command]) -> Result<()> {
        let mut nodes = Staged::default();
        let mut relationships = Staged::default();
        let mut rules = Staged::default();
        let mut next_token: FxHashMap<TokenKind, u32> = FxHashMap::default();
        let mut rel_delta: FxHashMap<NodeId, i64> = FxHashMap::default();
        for command in commands {
            match command {
                Command::CreateToken { kind, id, name } => {
                    let holder = self.tokens.holder(*kind);
                    if holder.id_of(name) == Some(*id) {
                        continue;
                    }
                    let next = next_token.entry(*kind).or_insert_with(|| holder.len());
                    if *id != *next {
                        return Err(KernelError::Invariant(format!(
                            "{kind} token {id} ({name:?}) restored out of order"
                        )));
                    }
                    *next += 1;
                }
                Command::CreateNode(node) => {
                    if nodes.live(data.nodes.contains_key(node), node) {
                        return Err(KernelError::Invariant(format!("node {node} already exists")));
                    }
                    nodes.create(*node);
                }
                Command::NodeLabels { node, .. }
                | Command::SetNodeProperty { node, .. }
                | Command::RemoveNodeProperty { node, .. } => {
                    if !nodes.live(data.nodes.contains_key(node), node) {
                        return Err(KernelError::node_not_found(*node));
                    }
                }
                Command::CreateRelationship(rel) => {
                    for end in [rel.start, rel.end] {
                        if !nodes.live(data.nodes.contains_key(&end), &end) {
                            return Err(KernelError::node_not_found(end));
                        }
                    }
                    relationships.create(rel.id);
                    *rel_delta.entry(rel.start).or_default() += 1;
                    if !rel.is_loop() {
                        *rel_delta.entry(rel.end).or_default() += 1;
                    }
                }
                Command::SetRelationshipProperty { relationship, .. }
                | Command::RemoveRelationshipProperty { relationship, .. } => {
                    let committed = data.relationships.contains_key(relationship);
                    if !relationships.live(committed, relationship) {
                        return Err(KernelError::relationship_not_found(*relationship));
                    }
                }
                Command::DeleteRelationship(rel) => {
                    if !relationships.live(data.relationships.contains_key(&rel.id), &rel.id) {
                        return Err(KernelError::relationship_not_found(rel.id));
                    }
                    relationships.remove(rel.id);
                    *rel_delta.entry(rel.start).or_default() -= 1;
                    if !rel.is_loop() {
                        *rel_delta.entry(rel.end).or_default() -= 1;
                    }
                }
                Command::DeleteNode { node, .. } => {
                    let committed = data.nodes.get(node);
                    if !nodes.live(committed.is_some(), node) {
                        return Err(KernelError::node_not_found(*node));
                    }
                    let remaining = committed.map_or(0, |record| record.relationships.len() as i64)
                        + rel_delta.get(node).copied().unwrap_or(0);
                    if remaining > 0 {
                        return Err(KernelError::NodeStillHasRelationships(*node));
                    }
                    nodes.remove(*node);
                }
                Command::CreateIndexRule(rule) => rules.create(rule.id),
                Command::DropIndexRule(id) => rules.remove(*id),
                Command::SetConstraintIndexOwner { index, .. } => {
                    if !rules.live(data.index_rules.contains_key(index), index) {
                        return Err(KernelError::Invariant(format!(
                            "constraint index rule {index} does not exist"
                        )));
                    }
                }
                Command::CreateConstraintRule(_) | Command::DropConstraintRule(_) => {}
            }
        }
        Ok(())
    }

    fn record_counts(&self, data: &StoreData, commands: &[Command]) -> CountsRecordState {
        let mut final_labels: FxHashMap<NodeId, &[LabelId]> = FxHashMap::default();
        for command in commands {
            match command {
                Command::CreateNode(node) => {
                    final_labels.insert(*node, &[]);
                }
                Command::NodeLabels { node, after, .. } => {
                    final_labels.insert(*node, after.labels());
                }
                Command::DeleteNode { node, .. } => {
                    final_labels.insert(*node, &[]);
                }
                _ => {}
            }
        }
        let labels_after = |node: NodeId| -> Vec<LabelId> {
            match final_labels.get(&node) {
                Some(labels) => labels.to_vec(),
                None => data.labels_of(node),
            }
        };

        let mut record = CountsRecordState::new();
        for command in commands {
            match command {
                Command::CreateNode(_) => {
                    record.node_changed(None, Some(&LabelField::default()), &[]);
                }
                Command::NodeLabels {
                    node,
                    before,
                    after,
                } => {
                    record.node_changed(Some(before), Some(after), &data.degrees(*node));
                }
                Command::DeleteNode { node, labels } => {
                    record.node_changed(Some(labels), None, &data.degrees(*node));
                }
                Command::CreateRelationship(rel) => {
                    record.relationship_changed(
                        rel.ty,
                        &labels_after(rel.start),
                        &labels_after(rel.end),
                        1,
                    );
                }
                Command::DeleteRelationship(rel) => {
                    record.relationship_changed(
                        rel.ty,
                        &labels_after(rel.start),
                        &labels_after(rel.end),
                        -1,
                    );
                }
                _ => {}
            }
        }
        record
    }

    fn apply(&self, data: &mut StoreData, command: &Command) -> Result<()> {
        match command {
            Command::CreateToken { kind, id, name } => {
                let holder = self.tokens.holder(*kind);
                if holder.id_of(name) != Some(*id) {
                    holder.restore(*id, name)?;
                }
            }
            Command::CreateNode(node) => {
                self.node_ids.lock().mark_used(node.0);
                data.nodes.insert(*node, NodeRecord::default());
            }
            Command::NodeLabels { node, after, .. } => {
                let record = data
                    .nodes
                    .get_mut(node)
                    .ok_or_else(|| KernelError::node_not_found(*node))?;
                let (added, removed) = LabelField::diff(&record.labels, after);
                record.labels = after.clone();
                for label in added {
                    data.label_scan.entry(label).or_default().insert(*node);
                }
                for label in removed {
                    if let Some(nodes) = data.label_scan.get_mut(&label) {
                        nodes.remove(node);
                    }
                }
            }
            Command::SetNodeProperty { node, key, value } => {
                data.nodes
                    .get_mut(node)
                    .ok_or_else(|| KernelError::node_not_found(*node))?
                    .properties
                    .insert(*key, value.clone());
            }
            Command::RemoveNodeProperty { node, key } => {
                data.nodes
                    .get_mut(node)
                    .ok_or_else(|| KernelError::node_not_found(*node))?
                    .properties
                    .remove(key);
            }
            Command::CreateRelationship(rel) => {
                self.relationship_ids.lock().mark_used(rel.id.0);
                for end in [rel.start, rel.end] {
                    data.nodes
                        .get_mut(&end)
                        .ok_or_else(|| KernelError::node_not_found(end))?
                        .relationships
                        .insert(rel.id);
                }
                data.relationships.insert(
                    rel.id,
                    RelationshipRecord {
                        data: *rel,
                        properties: BTreeMap::new(),
                    },
                );
            }
            Command::SetRelationshipProperty {
                relationship,
                key,
                value,
            } => {
                data.relationships
                    .get_mut(relationship)
                    .ok_or_else(|| KernelError::relationship_not_found(*relationship))?
                    .properties
                    .insert(*key, value.clone());
            }
            Command::RemoveRelationshipProperty { relationship, key } => {
                data.relationships
                    .get_mut(relationship)
                    .ok_or_else(|| KernelError::relationship_not_found(*relationship))?
                    .properties
                    .remove(key);
            }
            Command::DeleteRelationship(rel) => {
                data.relationships.remove(&rel.id);
                for end in [rel.start, rel.end] {
                    if let Some(record) = data.nodes.get_mut(&end) {
                        record.relationships.remove(&rel.id);
                    }
                }
                self.relationship_ids.lock().release(rel.id.0);
            }
            Command::DeleteNode { node, .. } => {
                if let Some(record) = data.nodes.remove(node) {
                    for label in record.labels.labels() {
                        if let Some(nodes) = data.label_scan.get_mut(label) {
                            nodes.remove(node);
                        }
                    }
                }
                self.node_ids.lock().release(node.0);
            }
            Command::CreateIndexRule(rule) => {
                self.rule_ids.lock().mark_used(rule.id.0);
                data.index_rules.insert(rule.id, rule.clone());
                if let Some(provider) = self.providers.apply_to(&rule.provider) {
                    let entries = data.population_entries(&rule.descriptor);
                    provider.create(rule.id, rule.is_constraint_index(), entries);
                    let (unique, size) = provider.sample(rule.id);
                    data.counts.replace_index_statistics(rule.id, 0, size);
                    data.counts.replace_index_sample(rule.id, unique, size);
                }
                info!(descriptor = %rule.descriptor, rule = rule.id.0, "index rule created");
            }
            Command::DropIndexRule(id) => {
                if let Some(rule) = data.index_rules.remove(id) {
                    if let Some(provider) = self.providers.apply_to(&rule.provider) {
                        provider.drop_index(*id);
                    }
                    data.counts.remove_index(*id);
                    info!(descriptor = %rule.descriptor, rule = id.0, "index rule dropped");
                }
            }
            Command::CreateConstraintRule(rule) => {
                self.rule_ids.lock().mark_used(rule.id.0);
                data.constraint_rules.insert(rule.id, rule.clone());
                info!(constraint = %rule.constraint, rule = rule.id.0, "constraint rule created");
            }
            Command::DropConstraintRule(id) => {
                if let Some(rule) = data.constraint_rules.remove(id) {
                    info!(constraint = %rule.constraint, rule = id.0, "constraint rule dropped");
                }
            }
            Command::SetConstraintIndexOwner { index, owner } => {
                let rule = data.index_rules.get_mut(index).ok_or_else(|| {
                    KernelError::Invariant(format!("constraint index rule {index} does not exist"))
                })?;
                rule.kind = IndexRuleKind::ConstraintIndex {
                    owner: Some(*owner),
                };
            }
        }
        Ok(())
    }

    fn maintain_indexes(
        &self,
        data: &mut StoreData,
        rules: &[IndexRule],
        before: &FxHashMap<(RuleId, NodeId), PropertyValue>,
        after: &FxHashMap<(RuleId, NodeId), PropertyValue>,
        record: &mut CountsRecordState,
    ) {
        let keys: BTreeSet<(RuleId, NodeId)> = before.keys().chain(after.keys()).copied().collect();
        let mut touched_rules = BTreeSet::new();
        for (rule_id, node) in keys {
            let old = before.get(&(rule_id, node));
            let new = after.get(&(rule_id, node));
            if old == new {
                continue;
            }
            let Some(rule) = rules.iter().find(|rule| rule.id == rule_id) else {
                continue;
            };
            if !data.index_rules.contains_key(&rule_id) {
                continue;
            }
            if let Some(provider) = self.providers.apply_to(&rule.provider) {
                provider.update(rule_id, node, old, new);
                record.index_updated(rule_id, 1);
                touched_rules.insert((rule_id, rule.provider.clone()));
            }
        }
        for (rule_id, provider) in touched_rules {
            if let Some(provider) = self.providers.get(&provider) {
                let (unique, size) = provider.sample(rule_id);
                let updates = data
                    .counts
                    .get(&CountsKey::IndexStatistics { index: rule_id })
                    .first;
                data.counts.replace_index_statistics(rule_id, updates, size);
                data.counts.replace_index_sample(rule_id, unique, size);
            }
        }
    }
}

fn touched_nodes(commands: &[Command]) -> FxHashSet<NodeId> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::CreateNode(node)
            | Command::NodeLabels { node, .. }
            | Command::SetNodeProperty { node, .. }
            | Command::RemoveNodeProperty { node, .. }
            | Command::DeleteNode { node, .. } => Some(*node),
            _ => None,
        })
        .collect()
}

impl TransactionCommitProcess for InMemoryStore {
    fn commit(&self, transaction: TransactionRepresentation) -> Result<TxId> {
        let mut data = self.data.write();
        self.validate(&data, &transaction.commands)?;
        let mut record = self.record_counts(&data, &transaction.commands);
        let touched = touched_nodes(&transaction.commands);
        let rules: Vec<IndexRule> = data.index_rules.values().cloned().collect();
        let before = data.index_entries(&rules, &touched);

        for command in &transaction.commands {
            self.apply(&mut data, command)?;
        }

        let after = data.index_entries(&rules, &touched);
        self.maintain_indexes(&mut data, &rules, &before, &after, &mut record);
        let deltas = record.into_deltas();
        data.counts.merge(&deltas);

        data.last_tx = TxId(data.last_tx.0 + 1);
        let id = data.last_tx;
        debug!(
            tx = id.0,
            commands = transaction.commands.len(),
            prepared_against = transaction.header.last_committed_tx_when_started.0,
            "transaction applied"
        );
        data.log.push(transaction);

        if self.verify_counts_on_commit {
            let differences = self.verify_counts_locked(&data);
            if !differences.is_empty() {
                let report = serde_json::to_string(&differences)
                    .unwrap_or_else(|err| format!("<unserializable: {err}>"));
                warn!(tx = id.0, differences = %report, "counts diverged from full scan");
            }
        }
        Ok(id)
    }
}

impl StoreReadLayer for InMemoryStore {
    fn node_exists(&self, node: NodeId) -> bool {
        self.data.read().nodes.contains_key(&node)
    }

    fn node_get_labels(&self, node: NodeId) -> Result<Vec<LabelId>> {
        Ok(self.data.read().node(node)?.labels.labels().to_vec())
    }

    fn node_has_label(&self, node: NodeId, label: LabelId) -> Result<bool> {
        Ok(self.data.read().node(node)?.labels.contains(label))
    }

    fn node_get_property(&self, node: NodeId, key: PropKeyId) -> Result<Option<PropertyValue>> {
        Ok(self.data.read().node(node)?.properties.get(&key).cloned())
    }

    fn node_get_all_properties(&self, node: NodeId) -> Result<Vec<Property>> {
        Ok(self
            .data
            .read()
            .node(node)?
            .properties
            .iter()
            .map(|(key, value)| Property::new(*key, value.clone()))
            .collect())
    }

    fn nodes_get_all(&self) -> Vec<NodeId> {
        self.data.read().nodes.keys().copied().collect()
    }

    fn nodes_get_for_label(&self, label: LabelId) -> Vec<NodeId> {
        self.data
            .read()
            .label_scan
            .get(&label)
            .map(|nodes| nodes.iter().copied().collect())
            .unwrap_or_default()
    }

    fn node_get_relationships(
        &self,
        node: NodeId,
        direction: Direction,
        types: &[TypeId],
    ) -> Result<Vec<RelationshipData>> {
        let data = self.data.read();
        Ok(data
            .node(node)?
            .relationships
            .iter()
            .filter_map(|rel| data.relationships.get(rel))
            .map(|rel| rel.data)
            .filter(|rel| rel.matches(node, direction, types))
            .collect())
    }

    fn node_get_degree(
        &self,
        node: NodeId,
        direction: Direction,
        ty: Option<TypeId>,
    ) -> Result<u64> {
        let data = self.data.read();
        data.node(node)?;
        Ok(data
            .degrees(node)
            .into_iter()
            .filter(|degree| ty.map_or(true, |ty| ty == degree.ty))
            .map(|degree| match direction {
                Direction::Outgoing => degree.outgoing,
                Direction::Incoming => degree.incoming,
                Direction::Both => degree.outgoing + degree.incoming,
            })
            .sum())
    }

    fn node_get_relationship_types(&self, node: NodeId) -> Result<Vec<TypeId>> {
        let data = self.data.read();
        data.node(node)?;
        Ok(data.degrees(node).into_iter().map(|degree| degree.ty).collect())
    }

    fn relationship_exists(&self, relationship: RelId) -> bool {
        self.data.read().relationships.contains_key(&relationship)
    }

    fn relationship_get_data(&self, relationship: RelId) -> Result<RelationshipData> {
        Ok(self.data.read().relationship(relationship)?.data)
    }

    fn relationship_get_property(
        &self,
        relationship: RelId,
        key: PropKeyId,
    ) -> Result<Option<PropertyValue>> {
        Ok(self
            .data
            .read()
            .relationship(relationship)?
            .properties
            .get(&key)
            .cloned())
    }

    fn relationship_get_all_properties(&self, relationship: RelId) -> Result<Vec<Property>> {
        Ok(self
            .data
            .read()
            .relationship(relationship)?
            .properties
            .iter()
            .map(|(key, value)| Property::new(*key, value.clone()))
            .collect())
    }

    fn relationships_get_all(&self) -> Vec<RelId> {
        self.data.read().relationships.keys().copied().collect()
    }

    fn index_rules_get_all(&self) -> Vec<IndexRule> {
        self.data.read().index_rules.values().cloned().collect()
    }

    fn index_rule(&self, descriptor: &IndexDescriptor) -> Option<IndexRule> {
        self.data.read().index_rule_for(descriptor).cloned()
    }

    fn constraint_rules_get_all(&self) -> Vec<ConstraintRule> {
        self.data.read().constraint_rules.values().cloned().collect()
    }

    fn constraint_rule(&self, constraint: &UniquenessConstraint) -> Option<ConstraintRule> {
        self.data
            .read()
            .constraint_rules
            .values()
            .find(|rule| rule.constraint == *constraint)
            .cloned()
    }

    fn index_get_state(&self, descriptor: &IndexDescriptor) -> Result<IndexState> {
        let rule = self.index_rule_required(descriptor)?;
        Ok(self
            .providers
            .get(&rule.provider)
            .and_then(|provider| provider.state(rule.id))
            .unwrap_or(IndexState::Populating))
    }

    fn index_get_failure(&self, descriptor: &IndexDescriptor) -> Result<Option<IndexFailure>> {
        let rule = self.index_rule_required(descriptor)?;
        Ok(self
            .providers
            .get(&rule.provider)
            .and_then(|provider| provider.failure(rule.id)))
    }

    fn index_seek(&self, descriptor: &IndexDescriptor, value: &PropertyValue) -> Result<Vec<NodeId>> {
        let rule = self.index_rule_required(descriptor)?;
        match self.providers.get(&rule.provider) {
            Some(provider) => provider.seek(rule.id, value),
            None => Ok(Vec::new()),
        }
    }

    fn index_scan(&self, descriptor: &IndexDescriptor) -> Result<Vec<NodeId>> {
        let rule = self.index_rule_required(descriptor)?;
        match self.providers.get(&rule.provider) {
            Some(provider) => provider.scan(rule.id),
            None => Ok(Vec::new()),
        }
    }

    fn token_get_for_name(&self, kind: TokenKind, name: &str) -> Option<u32> {
        self.tokens.holder(kind).id_of(name)
    }

    fn token_get_or_create(&self, kind: TokenKind, name: &str) -> Result<u32> {
        let holder = self.tokens.holder(kind);
        if let Some(id) = holder.id_of(name) {
            return Ok(id);
        }
        let mut data = self.data.write();
        let (id, created) = holder.get_or_create(name);
        if created {
            let header = TransactionHeader::new(data.last_tx, 0);
            let command = Command::CreateToken {
                kind,
                id,
                name: name.to_owned(),
            };
            data.last_tx = TxId(data.last_tx.0 + 1);
            data.log
                .push(TransactionRepresentation::new(header, vec![command]));
            debug!(%kind, id, name, "token created");
        }
        Ok(id)
    }

    fn token_get_name(&self, kind: TokenKind, id: u32) -> Result<String> {
        self.tokens.holder(kind).name_of(id)
    }

    fn tokens_get_all(&self, kind: TokenKind) -> Vec<(u32, String)> {
        self.tokens.holder(kind).all()
    }

    fn counts_get(&self, key: &CountsKey) -> CountsValue {
        self.data.read().counts.get(key)
    }

    fn last_committed_tx(&self) -> TxId {
        self.data.read().last_tx
    }

    fn reserve_node_id(&self) -> NodeId {
        NodeId(self.node_ids.lock().reserve())
    }

    fn reserve_relationship_id(&self) -> RelId {
        RelId(self.relationship_ids.lock().reserve())
    }

    fn reserve_rule_id(&self) -> RuleId {
        RuleId(self.rule_ids.lock().reserve())
    }

    fn release_node_id(&self, node: NodeId) {
        self.node_ids.lock().release(node.0);
    }

    fn release_relationship_id(&self, relationship: RelId) {
        self.relationship_ids.lock().release(relationship.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::IN_MEMORY_PROVIDER;

    fn batch(commands: Vec<Command>) -> TransactionRepresentation {
        TransactionRepresentation::new(TransactionHeader::new(BASE_TX_ID, 0), commands)
    }

    fn labels(ids: &[u32]) -> LabelField {
        LabelField::from_labels(ids.iter().map(|id| LabelId(*id)))
    }

    fn person(store: &InMemoryStore, name: &str) -> Result<NodeId> {
        let node = store.reserve_node_id();
        store.commit(batch(vec![
            Command::CreateNode(node),
            Command::NodeLabels {
                node,
                before: LabelField::default(),
                after: labels(&[0]),
            },
            Command::SetNodeProperty {
                node,
                key: PropKeyId(0),
                value: PropertyValue::from(name),
            },
        ]))?;
        Ok(node)
    }

    #[test]
    fn commit_applies_and_counts() -> Result<()> {
        let store = InMemoryStore::new();
        let a = person(&store, "a")?;
        let b = person(&store, "b")?;
        let rel = RelationshipData {
            id: store.reserve_relationship_id(),
            ty: TypeId(1),
            start: a,
            end: b,
        };
        store.commit(batch(vec![Command::CreateRelationship(rel)]))?;

        assert_eq!(store.node_get_labels(a)?, vec![LabelId(0)]);
        assert_eq!(store.node_get_degree(a, Direction::Outgoing, None)?, 1);
        assert_eq!(store.count_nodes(None), 2);
        assert_eq!(store.count_nodes(Some(LabelId(0))), 2);
        assert_eq!(store.count_relationships(Some(LabelId(0)), Some(TypeId(1)), None), 1);
        assert!(store.verify_counts().is_empty());
        Ok(())
    }

    #[test]
    fn deleting_connected_node_is_rejected_atomically() -> Result<()> {
        let store = InMemoryStore::new();
        let a = person(&store, "a")?;
        let rel = RelationshipData {
            id: store.reserve_relationship_id(),
            ty: TypeId(0),
            start: a,
            end: a,
        };
        store.commit(batch(vec![Command::CreateRelationship(rel)]))?;
        let err = store
            .commit(batch(vec![Command::DeleteNode {
                node: a,
                labels: labels(&[0]),
            }]))
            .expect_err("loop still attached");
        assert!(matches!(err, KernelError::NodeStillHasRelationships(n) if n == a));
        assert!(store.node_exists(a));
        Ok(())
    }

    #[test]
    fn failing_batches_leave_no_trace() -> Result<()> {
        let store = InMemoryStore::new();
        let a = person(&store, "a")?;
        let committed = store.last_committed_tx();
        let log = store.transaction_log().len();

        let err = store
            .commit(batch(vec![
                Command::SetNodeProperty {
                    node: a,
                    key: PropKeyId(0),
                    value: PropertyValue::from("changed"),
                },
                Command::SetConstraintIndexOwner {
                    index: RuleId(99),
                    owner: RuleId(100),
                },
            ]))
            .expect_err("owner of a missing index");
        assert!(matches!(err, KernelError::Invariant(_)));

        let ghost = RelId(42);
        let err = store
            .commit(batch(vec![
                Command::RemoveNodeProperty {
                    node: a,
                    key: PropKeyId(0),
                },
                Command::SetRelationshipProperty {
                    relationship: ghost,
                    key: PropKeyId(0),
                    value: PropertyValue::from(1i64),
                },
            ]))
            .expect_err("missing relationship");
        assert!(matches!(err, KernelError::EntityNotFound { .. }));

        assert_eq!(
            store.node_get_property(a, PropKeyId(0))?,
            Some(PropertyValue::from("a"))
        );
        assert_eq!(store.last_committed_tx(), committed);
        assert_eq!(store.transaction_log().len(), log);
        assert!(store.verify_counts().is_empty());
        Ok(())
    }

    #[test]
    fn batches_may_touch_what_they_create() -> Result<()> {
        let store = InMemoryStore::new();
        let a = person(&store, "a")?;
        let rule = IndexRule {
            id: store.reserve_rule_id(),
            descriptor: IndexDescriptor::new(LabelId(0), PropKeyId(1)),
            provider: IN_MEMORY_PROVIDER.to_owned(),
            kind: IndexRuleKind::ConstraintIndex { owner: None },
        };
        let rel = RelationshipData {
            id: store.reserve_relationship_id(),
            ty: TypeId(0),
            start: a,
            end: a,
        };
        store.commit(batch(vec![
            Command::CreateIndexRule(rule.clone()),
            Command::SetConstraintIndexOwner {
                index: rule.id,
                owner: RuleId(50),
            },
            Command::CreateRelationship(rel),
            Command::SetRelationshipProperty {
                relationship: rel.id,
                key: PropKeyId(0),
                value: PropertyValue::from(3i64),
            },
        ]))?;
        assert_eq!(
            store.index_rule(&rule.descriptor).and_then(|rule| rule.owning_constraint()),
            Some(RuleId(50))
        );
        Ok(())
    }

    #[test]
    fn index_rule_populates_and_tracks_updates() -> Result<()> {
        let store = InMemoryStore::new();
        let a = person(&store, "a")?;
        let descriptor = IndexDescriptor::new(LabelId(0), PropKeyId(0));
        let rule = IndexRule {
            id: store.reserve_rule_id(),
            descriptor,
            provider: IN_MEMORY_PROVIDER.to_owned(),
            kind: IndexRuleKind::General,
        };
        store.commit(batch(vec![Command::CreateIndexRule(rule.clone())]))?;
        assert_eq!(store.index_get_state(&descriptor)?, IndexState::Online);
        assert_eq!(store.index_seek(&descriptor, &PropertyValue::from("a"))?, vec![a]);

        let b = person(&store, "b")?;
        assert_eq!(store.index_scan(&descriptor)?, vec![a, b]);
        let stats = store.counts_get(&CountsKey::IndexStatistics { index: rule.id });
        assert_eq!(stats, CountsValue::new(1, 2));
        assert!(store.verify_counts().is_empty());
        Ok(())
    }

    #[test]
    fn replay_rebuilds_identical_state() -> Result<()> {
        let store = InMemoryStore::new();
        let label = store.token_get_or_create(TokenKind::Label, "Person")?;
        assert_eq!(label, 0);
        let a = person(&store, "a")?;
        person(&store, "b")?;
        store.commit(batch(vec![Command::RemoveNodeProperty {
            node: a,
            key: PropKeyId(0),
        }]))?;

        let copy = InMemoryStore::replay(store.transaction_log())?;
        assert_eq!(copy.nodes_get_all(), store.nodes_get_all());
        assert_eq!(copy.node_get_all_properties(a)?, Vec::new());
        assert_eq!(copy.counts(), store.counts());
        assert_eq!(copy.token_get_for_name(TokenKind::Label, "Person"), Some(0));
        assert_eq!(copy.last_committed_tx(), store.last_committed_tx());
        Ok(())
    }

    #[test]
    fn released_ids_are_reused() {
        let store = InMemoryStore::new();
        let first = store.reserve_node_id();
        let second = store.reserve_node_id();
        store.release_node_id(first);
        assert_eq!(store.reserve_node_id(), first);
        assert_ne!(first, second);
    }
}
