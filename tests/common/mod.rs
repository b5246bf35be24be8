#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rulegraph::graph::ANY_RELATIONSHIP;
use rulegraph::model::EndSide;
use rulegraph::storage::{StorageManager, StoreFactory};
use rulegraph::{
    Edge, GraphError, GraphManager, Node, PersistentGraphStore, Result, StorageOptions, Traversal,
};

/// Edge list standing in for the graph engine's traversal.
#[derive(Default)]
pub struct MemoryTraversal {
    edges: Mutex<Vec<(String, Edge)>>,
}

impl MemoryTraversal {
    pub fn add_edge(&self, part: &str, edge: Edge) {
        self.edges.lock().push((part.to_owned(), edge));
    }
}

impl Traversal for MemoryTraversal {
    fn traverse_multi(
        &self,
        part: &str,
        key: &str,
        kind: &str,
        spec: &str,
        _all_data: bool,
    ) -> Result<(Vec<Node>, Vec<Edge>)> {
        if spec != ANY_RELATIONSHIP {
            return Err(GraphError::InvalidData(format!("unsupported spec {spec}")));
        }
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for (edge_part, edge) in self.edges.lock().iter() {
            if edge_part != part {
                continue;
            }
            let Some(side) = edge.side_of(key, kind) else {
                continue;
            };
            let other = match side {
                EndSide::End1 => &edge.end2,
                EndSide::End2 => &edge.end1,
            };
            nodes.push(Node::new(other.key.clone(), other.kind.clone()));
            edges.push(edge.clone());
        }
        Ok((nodes, edges))
    }
}

pub fn test_options() -> StorageOptions {
    StorageOptions::new().sync_on_flush(false)
}

pub fn open_manager(root: &Path) -> Result<(GraphManager, Arc<MemoryTraversal>)> {
    let storage = Arc::new(PersistentGraphStore::open_with(root, test_options())?);
    let traversal = Arc::new(MemoryTraversal::default());
    let manager = GraphManager::new(storage, traversal.clone());
    Ok((manager, traversal))
}

/// In-memory object store that can be told to fail on close.
pub struct ScriptedStore {
    name: String,
    fail_close: bool,
    closes: Arc<AtomicUsize>,
    records: Mutex<BTreeMap<u64, Vec<u8>>>,
}

impl StorageManager for ScriptedStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, data: &[u8]) -> Result<u64> {
        let mut records = self.records.lock();
        let loc = records.len() as u64 + 1;
        records.insert(loc, data.to_vec());
        Ok(loc)
    }

    fn update(&self, loc: u64, data: &[u8]) -> Result<()> {
        self.records.lock().insert(loc, data.to_vec());
        Ok(())
    }

    fn fetch(&self, loc: u64) -> Result<Option<Vec<u8>>> {
        Ok(self.records.lock().get(&loc).cloned())
    }

    fn free(&self, loc: u64) -> Result<()> {
        self.records.lock().remove(&loc);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(GraphError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("cannot close {}", self.name),
            )));
        }
        Ok(())
    }
}

/// Factory producing [`ScriptedStore`]s; names listed in `failing` fail to close.
#[derive(Default)]
pub struct ScriptedFactory {
    pub failing: Vec<String>,
    pub opened: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|name| name.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl StoreFactory for ScriptedFactory {
    fn exists(&self, _path: &Path) -> bool {
        false
    }

    fn open(&self, name: &str, _path: &Path) -> Result<Box<dyn StorageManager>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedStore {
            name: name.to_owned(),
            fail_close: self.failing.iter().any(|failing| failing == name),
            closes: Arc::clone(&self.closes),
            records: Mutex::new(BTreeMap::new()),
        }))
    }
}
