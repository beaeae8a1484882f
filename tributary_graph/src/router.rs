use std::collections::HashMap;

use uuid::Uuid;

use crate::definition::NodeType;
use crate::error::{GraphError, Result};
use crate::validate::ValidatedDag;

/// Decides which node receives an entity emitted by a producer node.
///
/// Built once per sync run from a validated DAG; lookups never touch the
/// definition again.
#[derive(Debug, Clone)]
pub struct SyncDagRouter {
    successors: HashMap<Uuid, Vec<Uuid>>,
    node_types: HashMap<Uuid, NodeType>,
    // (producer, entity_definition_id) -> entity node directly downstream.
    entity_routes: HashMap<(Uuid, Uuid), Uuid>,
}

impl SyncDagRouter {
    pub fn new(dag: &ValidatedDag) -> Self {
        let mut successors = HashMap::new();
        let mut node_types = HashMap::new();
        let mut entity_routes = HashMap::new();

        for node in &dag.definition().nodes {
            let next = dag.successors(node.id).to_vec();
            for target in &next {
                let Some(target_node) = dag.node(*target) else {
                    continue;
                };
                if let (NodeType::Entity, Some(definition_id)) =
                    (target_node.node_type, target_node.entity_definition_id)
                {
                    entity_routes
                        .entry((node.id, definition_id))
                        .or_insert(target_node.id);
                }
            }
            successors.insert(node.id, next);
            node_types.insert(node.id, node.node_type);
        }

        Self {
            successors,
            node_types,
            entity_routes,
        }
    }

    pub fn successors(&self, node_id: Uuid) -> Result<&[Uuid]> {
        self.successors
            .get(&node_id)
            .map(Vec::as_slice)
            .ok_or_else(|| GraphError::routing(format!("unknown node '{node_id}'")))
    }

    /// Node that should receive an entity of `entity_definition_id` produced
    /// by `producer`.
    ///
    /// A matching entity node downstream of the producer always wins. Failing
    /// that, non-source producers forward to their sole successor.
    pub fn route(&self, producer: Uuid, entity_definition_id: Uuid) -> Result<Uuid> {
        if let Some(target) = self.entity_routes.get(&(producer, entity_definition_id)) {
            return Ok(*target);
        }

        let node_type = self
            .node_types
            .get(&producer)
            .copied()
            .ok_or_else(|| GraphError::routing(format!("unknown node '{producer}'")))?;
        if node_type == NodeType::Source {
            return Err(GraphError::routing(format!(
                "source '{producer}' has no entity node for definition '{entity_definition_id}'"
            )));
        }

        match self.successors.get(&producer).map(Vec::as_slice) {
            Some([only]) => Ok(*only),
            Some([]) | None => Err(GraphError::routing(format!(
                "node '{producer}' has no successors"
            ))),
            Some(many) => Err(GraphError::routing(format!(
                "node '{producer}' has {} successors and none is an entity node for '{entity_definition_id}'",
                many.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{DagNode, SyncDagDefinition};
    use crate::validate::validate;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    // S -> bucket entity -> D
    //   -> object entity -> chunker -> D
    fn s3_dag() -> ValidatedDag {
        let def = SyncDagDefinition::new(id(100), "s3")
            .with_node(DagNode::source(id(1), "S3", id(50)))
            .with_node(DagNode::entity(id(2), "buckets", id(70)))
            .with_node(DagNode::entity(id(3), "objects", id(71)))
            .with_node(DagNode::transformer(
                id(4),
                "chunker",
                serde_json::json!({"max_chars": 400}),
            ))
            .with_node(DagNode::destination(id(5), "pgvector", id(51)))
            .with_edge(id(1), id(2))
            .with_edge(id(1), id(3))
            .with_edge(id(2), id(5))
            .with_edge(id(3), id(4))
            .with_edge(id(4), id(5));
        validate(&def).unwrap()
    }

    #[test]
    fn source_routes_by_entity_definition() {
        let router = SyncDagRouter::new(&s3_dag());
        assert_eq!(router.route(id(1), id(70)).unwrap(), id(2));
        assert_eq!(router.route(id(1), id(71)).unwrap(), id(3));
    }

    #[test]
    fn source_without_matching_entity_node_fails() {
        let router = SyncDagRouter::new(&s3_dag());
        let err = router.route(id(1), id(99)).unwrap_err();
        assert!(matches!(err, GraphError::Routing(_)));
    }

    #[test]
    fn intermediate_nodes_forward_to_sole_successor() {
        let router = SyncDagRouter::new(&s3_dag());
        assert_eq!(router.route(id(3), id(71)).unwrap(), id(4));
        assert_eq!(router.route(id(4), id(71)).unwrap(), id(5));
    }

    #[test]
    fn destination_has_nowhere_to_route() {
        let router = SyncDagRouter::new(&s3_dag());
        assert!(router.route(id(5), id(71)).is_err());
        assert!(router.successors(id(5)).unwrap().is_empty());
    }

    #[test]
    fn unknown_producer_is_a_routing_error() {
        let router = SyncDagRouter::new(&s3_dag());
        assert!(router.successors(id(42)).is_err());
        assert!(router.route(id(42), id(70)).is_err());
    }
}
