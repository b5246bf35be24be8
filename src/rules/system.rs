use tracing::{debug, trace};

use crate::error::Result;
use crate::graph::maindb::{
    edge_attrs_entry, node_attrs_entry, node_edges_entry, MAINDB_EDGE_KINDS, MAINDB_NODE_KINDS,
    MAINDB_PARTS,
};
use crate::graph::{EventKind, GraphEvent, GraphManager, Trans, ANY_RELATIONSHIP};
use crate::model::EndSide;
use crate::storage::MetadataStore;

use super::Rule;

/// Removes every edge of a deleted node.
///
/// When the edge is cascading on the deleted node's end, the node at the
/// other end is removed as well.
#[derive(Clone, Copy, Debug, Default)]
pub struct CascadeDeleteEdges;

impl CascadeDeleteEdges {
    /// Registered rule name.
    pub const NAME: &'static str = "system.deletenodeedges";
}

impl Rule for CascadeDeleteEdges {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handles(&self) -> &[EventKind] {
        &[EventKind::NodeDeleted]
    }

    fn handle(&self, gm: &GraphManager, trans: &mut Trans, event: &GraphEvent) -> Result<()> {
        let GraphEvent::NodeDeleted { part, node } = event else {
            return Ok(());
        };

        let (neighbors, edges) =
            gm.traverse_multi(part, &node.key, &node.kind, ANY_RELATIONSHIP, false)?;

        let mut cascaded = 0usize;
        for (neighbor, edge) in neighbors.iter().zip(&edges) {
            trans.remove_edge(part, &edge.key, &edge.kind)?;

            let cascading = edge
                .side_of(&node.key, &node.kind)
                .is_some_and(|side| edge.end(side).cascading);
            if cascading {
                // Only a bad partition name can fail here and traversal already accepted it.
                let _ = trans.remove_node(part, &neighbor.key, &neighbor.kind);
                cascaded += 1;
            }
        }

        debug!(
            part = %part,
            key = %node.key,
            kind = %node.kind,
            edges = edges.len(),
            cascaded,
            "rules.cascade_delete"
        );
        Ok(())
    }
}

/// Records partitions, kinds, attribute names and relationship specs in the
/// in-memory metadata store.
///
/// Nothing is written to disk here: the committer flushes the store with the
/// transaction, or rolls it back when the commit fails. Known names leave the
/// store clean, so the next flush is skipped.
#[derive(Clone, Copy, Debug, Default)]
pub struct MaintainMetadataIndex;

impl MaintainMetadataIndex {
    /// Registered rule name.
    pub const NAME: &'static str = "system.updatenodestats";
}

impl Rule for MaintainMetadataIndex {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handles(&self) -> &[EventKind] {
        &[
            EventKind::NodeCreated,
            EventKind::NodeUpdated,
            EventKind::EdgeCreated,
            EventKind::EdgeUpdated,
        ]
    }

    fn handle(&self, gm: &GraphManager, _trans: &mut Trans, event: &GraphEvent) -> Result<()> {
        let mut metadata = gm.storage().metadata();
        let changed = match event {
            GraphEvent::NodeCreated { part, node } => {
                let mut changed = metadata.insert(MAINDB_PARTS, part);
                changed |= metadata.insert(MAINDB_NODE_KINDS, &node.kind);
                changed |= record_attrs(
                    &mut metadata,
                    &node_attrs_entry(&node.kind),
                    node.attr_names(),
                );
                changed
            }
            GraphEvent::NodeUpdated { node, .. } => {
                record_attrs(&mut metadata, &node_attrs_entry(&node.kind), node.attr_names())
            }
            GraphEvent::EdgeCreated { part, edge } => {
                let mut changed = false;
                for side in [EndSide::End1, EndSide::End2] {
                    changed |= metadata
                        .insert(&node_edges_entry(&edge.end(side).kind), &edge.spec(side));
                }
                changed |= metadata.insert(MAINDB_PARTS, part);
                changed |= metadata.insert(MAINDB_EDGE_KINDS, &edge.kind);
                changed |= record_attrs(
                    &mut metadata,
                    &edge_attrs_entry(&edge.kind),
                    edge.attr_names(),
                );
                changed
            }
            GraphEvent::EdgeUpdated { edge, .. } => {
                record_attrs(&mut metadata, &edge_attrs_entry(&edge.kind), edge.attr_names())
            }
            GraphEvent::NodeDeleted { .. } | GraphEvent::EdgeDeleted { .. } => false,
        };

        if changed {
            trace!(event = %event.kind(), part = event.part(), "rules.metadata.updated");
        }
        Ok(())
    }
}

fn record_attrs<'a>(
    metadata: &mut MetadataStore,
    entry: &str,
    names: impl Iterator<Item = &'a str>,
) -> bool {
    metadata.extend(entry, names) > 0
}
