//! Rule engine and storage lifecycle core of a graph database.
//!
//! Graph mutations are reported to a [`rules::RuleEngine`] which runs every
//! subscribed [`rules::Rule`] against the triggering [`graph::Trans`]. Rules
//! stage follow-up operations (such as removing the edges of a deleted node)
//! and maintain the metadata indexes kept by a
//! [`storage::PersistentGraphStore`].

#![warn(missing_docs)]

pub mod error;
pub mod graph;
pub mod model;
pub mod rules;
pub mod storage;

pub use error::{GraphError, Result};
pub use graph::{EventKind, GraphEvent, GraphManager, Trans, Traversal, TxOp};
pub use model::{AttrValue, Edge, EdgeEnd, Node};
pub use rules::{CascadeDeleteEdges, MaintainMetadataIndex, Rule, RuleEngine};
pub use storage::{PersistentGraphStore, StorageManager, StorageOptions};
