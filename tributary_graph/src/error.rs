use thiserror::Error;
use uuid::Uuid;

use crate::definition::NodeType;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Structural defects in a sync DAG definition.
///
/// Every variant carries the node/edge ids needed to locate the defect; none of
/// them is ever repaired silently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("dag definition has no nodes")]
    Empty,

    #[error("duplicate node id '{node_id}'")]
    DuplicateNode { node_id: Uuid },

    #[error("edge '{edge_id}' references node '{node_id}' which is not part of the dag")]
    DanglingEdge { edge_id: Uuid, node_id: Uuid },

    #[error("{node_type} node '{node_id}': {message}")]
    InvalidNode {
        node_id: Uuid,
        node_type: NodeType,
        message: String,
    },

    #[error("cycle detected: {}", join_ids(.node_ids, " -> "))]
    Cycle { node_ids: Vec<Uuid> },

    #[error("nodes not reachable from any source: {}", join_ids(.node_ids, ", "))]
    Unreachable { node_ids: Vec<Uuid> },

    #[error(
        "transformer node '{node_id}' needs incoming and outgoing edges (in={in_degree}, out={out_degree})"
    )]
    TransformerDegree {
        node_id: Uuid,
        in_degree: usize,
        out_degree: usize,
    },

    #[error("routing error: {0}")]
    Routing(String),
}

impl GraphError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn invalid_node(node_id: Uuid, node_type: NodeType, message: impl Into<String>) -> Self {
        Self::InvalidNode {
            node_id,
            node_type,
            message: message.into(),
        }
    }

    pub fn routing(message: impl Into<String>) -> Self {
        Self::Routing(message.into())
    }
}

fn join_ids(ids: &[Uuid], sep: &str) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}
