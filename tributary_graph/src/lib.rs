//! tributary_graph: typed sync DAG definitions, structural validation and
//! entity routing.

#![forbid(unsafe_code)]

pub mod definition;
pub mod error;
pub mod router;
pub mod validate;

pub use definition::{DagEdge, DagNode, NodeType, SyncDagDefinition};
pub use error::{GraphError, Result};
pub use router::SyncDagRouter;
pub use validate::{ValidatedDag, validate};
