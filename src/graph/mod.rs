//! Graph manager surface consumed by rules: events, staged transactions,
//! traversal and metadata queries.

mod event;
pub mod maindb;
mod manager;
mod trans;

pub use event::{EventKind, GraphEvent};
pub use manager::{GraphManager, Traversal, ANY_RELATIONSHIP};
pub use trans::{check_partition, Trans, TxOp};
