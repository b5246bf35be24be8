use std::fmt;

use crate::model::{Edge, Node};

/// Kinds of mutation events rules can subscribe to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum EventKind {
    /// A node was created.
    NodeCreated,
    /// An existing node was updated.
    NodeUpdated,
    /// A node was deleted.
    NodeDeleted,
    /// An edge was created.
    EdgeCreated,
    /// An existing edge was updated.
    EdgeUpdated,
    /// An edge was deleted.
    EdgeDeleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::NodeCreated => "node.created",
            EventKind::NodeUpdated => "node.updated",
            EventKind::NodeDeleted => "node.deleted",
            EventKind::EdgeCreated => "edge.created",
            EventKind::EdgeUpdated => "edge.updated",
            EventKind::EdgeDeleted => "edge.deleted",
        };
        f.write_str(name)
    }
}

/// A graph mutation together with the partition it happened in.
#[derive(Clone, Debug)]
pub enum GraphEvent {
    /// A node was created.
    NodeCreated {
        /// Partition of the node.
        part: String,
        /// The new node.
        node: Node,
    },
    /// A node was updated.
    NodeUpdated {
        /// Partition of the node.
        part: String,
        /// The node after the update.
        node: Node,
        /// The node before the update.
        old: Node,
    },
    /// A node was deleted.
    NodeDeleted {
        /// Partition of the node.
        part: String,
        /// The deleted node.
        node: Node,
    },
    /// An edge was created.
    EdgeCreated {
        /// Partition of the edge.
        part: String,
        /// The new edge.
        edge: Edge,
    },
    /// An edge was updated.
    EdgeUpdated {
        /// Partition of the edge.
        part: String,
        /// The edge after the update.
        edge: Edge,
        /// The edge before the update.
        old: Edge,
    },
    /// An edge was deleted.
    EdgeDeleted {
        /// Partition of the edge.
        part: String,
        /// The deleted edge.
        edge: Edge,
    },
}

impl GraphEvent {
    /// Discriminant used to look up subscribed rules.
    pub fn kind(&self) -> EventKind {
        match self {
            GraphEvent::NodeCreated { .. } => EventKind::NodeCreated,
            GraphEvent::NodeUpdated { .. } => EventKind::NodeUpdated,
            GraphEvent::NodeDeleted { .. } => EventKind::NodeDeleted,
            GraphEvent::EdgeCreated { .. } => EventKind::EdgeCreated,
            GraphEvent::EdgeUpdated { .. } => EventKind::EdgeUpdated,
            GraphEvent::EdgeDeleted { .. } => EventKind::EdgeDeleted,
        }
    }

    /// Partition the event happened in.
    pub fn part(&self) -> &str {
        match self {
            GraphEvent::NodeCreated { part, .. }
            | GraphEvent::NodeUpdated { part, .. }
            | GraphEvent::NodeDeleted { part, .. }
            | GraphEvent::EdgeCreated { part, .. }
            | GraphEvent::EdgeUpdated { part, .. }
            | GraphEvent::EdgeDeleted { part, .. } => part,
        }
    }

    /// The affected node for node events.
    pub fn node(&self) -> Option<&Node> {
        match self {
            GraphEvent::NodeCreated { node, .. }
            | GraphEvent::NodeUpdated { node, .. }
            | GraphEvent::NodeDeleted { node, .. } => Some(node),
            _ => None,
        }
    }

    /// The affected edge for edge events.
    pub fn edge(&self) -> Option<&Edge> {
        match self {
            GraphEvent::EdgeCreated { edge, .. }
            | GraphEvent::EdgeUpdated { edge, .. }
            | GraphEvent::EdgeDeleted { edge, .. } => Some(edge),
            _ => None,
        }
    }
}
