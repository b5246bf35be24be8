use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::model::{Edge, Node};
use crate::rules::{Rule, RuleEngine};
use crate::storage::PersistentGraphStore;

use super::event::GraphEvent;
use super::maindb::{
    edge_attrs_entry, node_attrs_entry, node_edges_entry, MAINDB_EDGE_KINDS, MAINDB_NODE_KINDS,
    MAINDB_PARTS,
};
use super::trans::{check_partition, Trans};

/// Relationship spec matching any role and any kind in either direction.
pub const ANY_RELATIONSHIP: &str = ":::";

/// Traversal capability provided by the surrounding graph engine.
pub trait Traversal: Send + Sync {
    /// Follows every relationship of the node `(key, kind)` in `part` that
    /// matches `spec`. Returns neighbors and connecting edges as parallel
    /// sequences. `all_data` asks for fully loaded nodes and edges.
    fn traverse_multi(
        &self,
        part: &str,
        key: &str,
        kind: &str,
        spec: &str,
        all_data: bool,
    ) -> Result<(Vec<Node>, Vec<Edge>)>;
}

/// Entry point the graph engine uses to run rules and reach persistence.
///
/// Cloning through [`GraphManager::read_only_clone`] shares storage, rules
/// and traversal but allocates a fresh lock; rules only ever see such clones.
pub struct GraphManager {
    storage: Arc<PersistentGraphStore>,
    rules: Arc<RuleEngine>,
    traversal: Arc<dyn Traversal>,
    lock: RwLock<()>,
    read_only: bool,
}

impl GraphManager {
    /// Creates a manager with the system rules registered.
    pub fn new(storage: Arc<PersistentGraphStore>, traversal: Arc<dyn Traversal>) -> Self {
        Self::with_engine(storage, traversal, Arc::new(RuleEngine::with_system_rules()))
    }

    /// Creates a manager around an existing rule engine.
    pub fn with_engine(
        storage: Arc<PersistentGraphStore>,
        traversal: Arc<dyn Traversal>,
        rules: Arc<RuleEngine>,
    ) -> Self {
        Self {
            storage,
            rules,
            traversal,
            lock: RwLock::new(()),
            read_only: false,
        }
    }

    /// Shares all state with `self` except the lock.
    pub fn read_only_clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            rules: Arc::clone(&self.rules),
            traversal: Arc::clone(&self.traversal),
            lock: RwLock::new(()),
            read_only: true,
        }
    }

    /// True for clones handed to rules.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Storage root backing this manager.
    pub fn storage(&self) -> &Arc<PersistentGraphStore> {
        &self.storage
    }

    /// Rule engine shared by this manager and its clones.
    pub fn rules(&self) -> &Arc<RuleEngine> {
        &self.rules
    }

    /// Takes the shared lock.
    pub fn read_lock(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    /// Takes the exclusive lock for a structural write.
    ///
    /// On a read-only clone this never blocks: it fails while a rule holds
    /// the clone's shared lock.
    pub fn write_lock(&self) -> Result<RwLockWriteGuard<'_, ()>> {
        if self.read_only {
            return self
                .lock
                .try_write()
                .ok_or(GraphError::ReadOnly("structural write attempted from a graph rule"));
        }
        Ok(self.lock.write())
    }

    /// Registers a rule, replacing any rule with the same name.
    pub fn set_graph_rule(&self, rule: Arc<dyn Rule>) {
        self.rules.set_rule(rule);
    }

    /// Sorted names of all registered rules.
    pub fn graph_rules(&self) -> Vec<String> {
        self.rules.rule_names()
    }

    /// Runs every rule subscribed to the event against `trans`.
    pub fn dispatch(&self, trans: &mut Trans, event: &GraphEvent) -> Result<()> {
        self.rules.dispatch(self, trans, event)
    }

    /// Follows relationships of a node through the traversal collaborator.
    pub fn traverse_multi(
        &self,
        part: &str,
        key: &str,
        kind: &str,
        spec: &str,
        all_data: bool,
    ) -> Result<(Vec<Node>, Vec<Edge>)> {
        check_partition(part)?;
        let (nodes, edges) = self
            .traversal
            .traverse_multi(part, key, kind, spec, all_data)?;
        if nodes.len() != edges.len() {
            return Err(GraphError::InvalidData(format!(
                "traversal returned {} nodes for {} edges",
                nodes.len(),
                edges.len()
            )));
        }
        debug!(part, key, kind, spec, found = edges.len(), "graph.traverse");
        Ok((nodes, edges))
    }

    /// Known partitions.
    pub fn partitions(&self) -> Vec<String> {
        self.metadata_set(MAINDB_PARTS)
    }

    /// Known node kinds.
    pub fn node_kinds(&self) -> Vec<String> {
        self.metadata_set(MAINDB_NODE_KINDS)
    }

    /// Known edge kinds.
    pub fn edge_kinds(&self) -> Vec<String> {
        self.metadata_set(MAINDB_EDGE_KINDS)
    }

    /// Attribute names seen on nodes of `kind`.
    pub fn node_attrs(&self, kind: &str) -> Vec<String> {
        self.metadata_set(&node_attrs_entry(kind))
    }

    /// Attribute names seen on edges of `kind`.
    pub fn edge_attrs(&self, kind: &str) -> Vec<String> {
        self.metadata_set(&edge_attrs_entry(kind))
    }

    /// Relationship specs seen on nodes of `kind`.
    pub fn node_edges(&self, kind: &str) -> Vec<String> {
        self.metadata_set(&node_edges_entry(kind))
    }

    fn metadata_set(&self, entry: &str) -> Vec<String> {
        self.storage
            .metadata()
            .get(entry)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for GraphManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphManager")
            .field("storage", &self.storage.name())
            .field("rules", &self.rules.rule_names())
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}
