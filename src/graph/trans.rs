use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::{GraphError, Result};
use crate::model::{Edge, Node};

/// A staged graph operation.
#[derive(Clone, Debug, PartialEq)]
pub enum TxOp {
    /// Store (create or replace) a node.
    StoreNode {
        /// Target partition.
        part: String,
        /// Node to store.
        node: Node,
    },
    /// Remove a node.
    RemoveNode {
        /// Target partition.
        part: String,
        /// Node key.
        key: String,
        /// Node kind.
        kind: String,
    },
    /// Store (create or replace) an edge.
    StoreEdge {
        /// Target partition.
        part: String,
        /// Edge to store.
        edge: Edge,
    },
    /// Remove an edge.
    RemoveEdge {
        /// Target partition.
        part: String,
        /// Edge key.
        key: String,
        /// Edge kind.
        kind: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Target {
    Node,
    Edge,
}

// Stores and removals of the same element share an identity.
type Identity = (Target, String, String, String);

impl TxOp {
    fn identity(&self) -> Identity {
        let (target, part, kind, key) = match self {
            TxOp::StoreNode { part, node } => (Target::Node, part, &node.kind, &node.key),
            TxOp::RemoveNode { part, key, kind } => (Target::Node, part, kind, key),
            TxOp::StoreEdge { part, edge } => (Target::Edge, part, &edge.kind, &edge.key),
            TxOp::RemoveEdge { part, key, kind } => (Target::Edge, part, kind, key),
        };
        (target, part.clone(), kind.clone(), key.clone())
    }
}

/// An ordered batch of graph operations that have not been committed yet.
///
/// Rules stage into the same instance that triggered them, so their changes
/// commit together with the triggering mutation. Only the last operation
/// staged for an element survives: a removal cancels an earlier store of the
/// same node or edge and vice versa.
#[derive(Clone, Debug, Default)]
pub struct Trans {
    slots: Vec<Option<TxOp>>,
    index: FxHashMap<Identity, usize>,
}

impl Trans {
    /// Creates an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages storing a node.
    pub fn store_node(&mut self, part: &str, node: Node) -> Result<()> {
        check_partition(part)?;
        self.stage(TxOp::StoreNode {
            part: part.to_owned(),
            node,
        });
        Ok(())
    }

    /// Stages removing a node.
    pub fn remove_node(&mut self, part: &str, key: &str, kind: &str) -> Result<()> {
        check_partition(part)?;
        self.stage(TxOp::RemoveNode {
            part: part.to_owned(),
            key: key.to_owned(),
            kind: kind.to_owned(),
        });
        Ok(())
    }

    /// Stages storing an edge.
    pub fn store_edge(&mut self, part: &str, edge: Edge) -> Result<()> {
        check_partition(part)?;
        self.stage(TxOp::StoreEdge {
            part: part.to_owned(),
            edge,
        });
        Ok(())
    }

    /// Stages removing an edge.
    pub fn remove_edge(&mut self, part: &str, key: &str, kind: &str) -> Result<()> {
        check_partition(part)?;
        self.stage(TxOp::RemoveEdge {
            part: part.to_owned(),
            key: key.to_owned(),
            kind: kind.to_owned(),
        });
        Ok(())
    }

    /// Staged operations in staging order.
    pub fn ops(&self) -> impl Iterator<Item = &TxOp> {
        self.slots.iter().flatten()
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Hands the staged operations to the committer.
    pub fn into_ops(self) -> Vec<TxOp> {
        self.slots.into_iter().flatten().collect()
    }

    fn stage(&mut self, op: TxOp) {
        let identity = op.identity();
        trace!(op = ?identity, "trans.stage");
        if let Some(previous) = self.index.insert(identity, self.slots.len()) {
            self.slots[previous] = None;
        }
        self.slots.push(Some(op));
    }
}

/// Partition names are restricted to ASCII letters and digits.
pub fn check_partition(part: &str) -> Result<()> {
    if part.is_empty() || !part.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(GraphError::InvalidData(format!(
            "partition name {part:?} is not alphanumeric"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_partition_is_rejected() {
        let mut trans = Trans::new();
        assert!(matches!(
            trans.remove_node("bad part", "k", "Person"),
            Err(GraphError::InvalidData(_))
        ));
        assert!(trans.remove_node("", "k", "Person").is_err());
        assert!(trans.is_empty());
    }

    #[test]
    fn last_staged_operation_wins() -> Result<()> {
        let mut trans = Trans::new();
        trans.remove_edge("main", "e1", "Knows")?;
        trans.store_node("main", Node::new("n1", "Person"))?;
        trans.remove_edge("main", "e1", "Knows")?;
        trans.store_node("main", Node::new("n1", "Person").with_attr("age", 3i64))?;
        assert_eq!(trans.len(), 2);
        match trans.ops().last() {
            Some(TxOp::StoreNode { node, .. }) => assert!(node.attrs.contains_key("age")),
            other => panic!("unexpected op {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn removal_cancels_earlier_store() -> Result<()> {
        let mut trans = Trans::new();
        trans.remove_node("main", "n1", "Person")?;
        trans.store_node("main", Node::new("n1", "Person"))?;
        trans.remove_node("main", "n1", "Person")?;
        let ops = trans.into_ops();
        assert_eq!(
            ops,
            vec![TxOp::RemoveNode {
                part: "main".into(),
                key: "n1".into(),
                kind: "Person".into(),
            }]
        );
        Ok(())
    }

    #[test]
    fn store_after_removal_keeps_the_element() -> Result<()> {
        let mut trans = Trans::new();
        trans.store_node("main", Node::new("n1", "Person"))?;
        trans.remove_node("main", "n1", "Person")?;
        trans.store_node("main", Node::new("n1", "Person"))?;
        // a node and an edge may share kind and key
        trans.remove_edge("main", "n1", "Person")?;
        let ops: Vec<_> = trans.ops().collect();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], TxOp::StoreNode { .. }));
        assert!(matches!(ops[1], TxOp::RemoveEdge { .. }));
        Ok(())
    }
}
