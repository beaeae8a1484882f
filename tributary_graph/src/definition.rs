use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::error::GraphError;

/// Role a node plays in the data flow of a sync.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Source,
    Destination,
    Transformer,
    Entity,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Source => "source",
            NodeType::Destination => "destination",
            NodeType::Transformer => "transformer",
            NodeType::Entity => "entity",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of a sync DAG.
///
/// `source`/`destination` nodes point at a connection, `entity` nodes at an
/// entity definition, and `transformer` nodes carry their own `config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagNode {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub connection_id: Option<Uuid>,
    #[serde(default)]
    pub entity_definition_id: Option<Uuid>,
}

impl DagNode {
    pub fn source(id: Uuid, name: impl Into<String>, connection_id: Uuid) -> Self {
        Self {
            id,
            node_type: NodeType::Source,
            name: name.into(),
            config: None,
            connection_id: Some(connection_id),
            entity_definition_id: None,
        }
    }

    pub fn destination(id: Uuid, name: impl Into<String>, connection_id: Uuid) -> Self {
        Self {
            id,
            node_type: NodeType::Destination,
            name: name.into(),
            config: None,
            connection_id: Some(connection_id),
            entity_definition_id: None,
        }
    }

    pub fn transformer(id: Uuid, name: impl Into<String>, config: Value) -> Self {
        Self {
            id,
            node_type: NodeType::Transformer,
            name: name.into(),
            config: Some(config),
            connection_id: None,
            entity_definition_id: None,
        }
    }

    pub fn entity(id: Uuid, name: impl Into<String>, entity_definition_id: Uuid) -> Self {
        Self {
            id,
            node_type: NodeType::Entity,
            name: name.into(),
            config: None,
            connection_id: None,
            entity_definition_id: Some(entity_definition_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagEdge {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub from_node_id: Uuid,
    pub to_node_id: Uuid,
}

impl DagEdge {
    pub fn new(from_node_id: Uuid, to_node_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_node_id,
            to_node_id,
        }
    }
}

/// Declared (unvalidated) data flow of one sync.
///
/// Node order is significant: it breaks ties in the topological order of the
/// validated DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncDagDefinition {
    pub id: Uuid,
    pub sync_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<DagNode>,
    #[serde(default)]
    pub edges: Vec<DagEdge>,
}

impl SyncDagDefinition {
    pub fn new(sync_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sync_id,
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: DagNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, from_node_id: Uuid, to_node_id: Uuid) -> Self {
        self.edges.push(DagEdge::new(from_node_id, to_node_id));
        self
    }

    /// Parse a definition from YAML (JSON documents are accepted as well).
    pub fn from_yaml_str(doc: &str) -> Result<Self, GraphError> {
        serde_yaml::from_str(doc)
            .map_err(|e| GraphError::bad_request(format!("invalid dag definition: {e}")))
    }

    pub fn from_value(value: Value) -> Result<Self, GraphError> {
        serde_json::from_value(value)
            .map_err(|e| GraphError::bad_request(format!("invalid dag definition: {e}")))
    }
}
