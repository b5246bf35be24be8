//! Names of the metadata entries maintained for the graph.

/// Set of all known partitions.
pub const MAINDB_PARTS: &str = "part";
/// Set of all known node kinds.
pub const MAINDB_NODE_KINDS: &str = "nodekind";
/// Set of all known edge kinds.
pub const MAINDB_EDGE_KINDS: &str = "edgekind";
/// Prefix of the per-kind node attribute name sets.
pub const MAINDB_NODE_ATTRS: &str = "nodeattr";
/// Prefix of the per-kind edge attribute name sets.
pub const MAINDB_EDGE_ATTRS: &str = "edgeattr";
/// Prefix of the per-node-kind relationship spec sets.
pub const MAINDB_NODE_EDGES: &str = "nodeedge";

/// Entry holding attribute names of nodes of `kind`.
pub fn node_attrs_entry(kind: &str) -> String {
    format!("{MAINDB_NODE_ATTRS}{kind}")
}

/// Entry holding attribute names of edges of `kind`.
pub fn edge_attrs_entry(kind: &str) -> String {
    format!("{MAINDB_EDGE_ATTRS}{kind}")
}

/// Entry holding relationship specs of nodes of `kind`.
pub fn node_edges_entry(kind: &str) -> String {
    format!("{MAINDB_NODE_EDGES}{kind}")
}
