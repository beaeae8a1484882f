//! Structural validation of sync DAG definitions.
//!
//! Checks run in a fixed order (ids, edge endpoints, node references,
//! acyclicity, reachability, transformer degree) and stop at the first defect,
//! so reference mismatches are reported before any traversal happens.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use serde_json::Value;
use uuid::Uuid;

use crate::definition::{DagNode, NodeType, SyncDagDefinition};
use crate::error::{GraphError, Result};

/// A definition that passed every structural check, plus its precomputed
/// adjacency and a deterministic topological order.
#[derive(Debug, Clone)]
pub struct ValidatedDag {
    definition: SyncDagDefinition,
    positions: HashMap<Uuid, usize>,
    order: Vec<Uuid>,
    successors: Vec<Vec<Uuid>>,
    predecessors: Vec<Vec<Uuid>>,
}

impl ValidatedDag {
    pub fn definition(&self) -> &SyncDagDefinition {
        &self.definition
    }

    pub fn id(&self) -> Uuid {
        self.definition.id
    }

    pub fn sync_id(&self) -> Uuid {
        self.definition.sync_id
    }

    /// Node ids in processing order. Independent branches keep the order in
    /// which their nodes were declared.
    pub fn topological_order(&self) -> &[Uuid] {
        &self.order
    }

    pub fn node(&self, id: Uuid) -> Option<&DagNode> {
        self.positions.get(&id).map(|&i| &self.definition.nodes[i])
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &DagNode> {
        self.definition
            .nodes
            .iter()
            .filter(move |n| n.node_type == node_type)
    }

    pub fn successors(&self, id: Uuid) -> &[Uuid] {
        self.positions
            .get(&id)
            .map(|&i| self.successors[i].as_slice())
            .unwrap_or(&[])
    }

    pub fn predecessors(&self, id: Uuid) -> &[Uuid] {
        self.positions
            .get(&id)
            .map(|&i| self.predecessors[i].as_slice())
            .unwrap_or(&[])
    }

    pub fn into_definition(self) -> SyncDagDefinition {
        self.definition
    }
}

/// Validate a definition and compute its processing order.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(dag_id = %definition.id, sync_id = %definition.sync_id)
)]
pub fn validate(definition: &SyncDagDefinition) -> Result<ValidatedDag> {
    let positions = index_nodes(definition)?;
    let adjacency = Adjacency::build(definition, &positions)?;

    for node in &definition.nodes {
        check_node_reference(node)?;
    }

    let order = topological_order(&adjacency.successors).map_err(|cycle| GraphError::Cycle {
        node_ids: cycle.into_iter().map(|i| definition.nodes[i].id).collect(),
    })?;

    check_reachability(definition, &adjacency)?;
    check_transformer_degrees(definition, &adjacency)?;

    let ids = |list: &Vec<usize>| -> Vec<Uuid> {
        list.iter().map(|&i| definition.nodes[i].id).collect()
    };
    let successors = adjacency.successors.iter().map(ids).collect();
    let predecessors = adjacency.predecessors.iter().map(ids).collect();
    let order = order.into_iter().map(|i| definition.nodes[i].id).collect();

    tracing::debug!(
        nodes = definition.nodes.len(),
        edges = definition.edges.len(),
        "dag validated"
    );

    Ok(ValidatedDag {
        definition: definition.clone(),
        positions,
        order,
        successors,
        predecessors,
    })
}

struct Adjacency {
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl Adjacency {
    fn build(definition: &SyncDagDefinition, positions: &HashMap<Uuid, usize>) -> Result<Self> {
        let n = definition.nodes.len();
        let mut successors = vec![Vec::new(); n];
        let mut predecessors = vec![Vec::new(); n];
        for edge in &definition.edges {
            let from = *positions
                .get(&edge.from_node_id)
                .ok_or(GraphError::DanglingEdge {
                    edge_id: edge.id,
                    node_id: edge.from_node_id,
                })?;
            let to = *positions
                .get(&edge.to_node_id)
                .ok_or(GraphError::DanglingEdge {
                    edge_id: edge.id,
                    node_id: edge.to_node_id,
                })?;
            successors[from].push(to);
            predecessors[to].push(from);
        }
        Ok(Self {
            successors,
            predecessors,
        })
    }
}

fn index_nodes(definition: &SyncDagDefinition) -> Result<HashMap<Uuid, usize>> {
    if definition.nodes.is_empty() {
        return Err(GraphError::Empty);
    }
    let mut positions = HashMap::with_capacity(definition.nodes.len());
    for (idx, node) in definition.nodes.iter().enumerate() {
        if positions.insert(node.id, idx).is_some() {
            return Err(GraphError::DuplicateNode { node_id: node.id });
        }
    }
    Ok(positions)
}

fn check_node_reference(node: &DagNode) -> Result<()> {
    let has_connection = node.connection_id.is_some();
    let has_entity = node.entity_definition_id.is_some();
    let fail = |message: &str| Err(GraphError::invalid_node(node.id, node.node_type, message));

    match node.node_type {
        NodeType::Source | NodeType::Destination => {
            if !has_connection {
                return fail("connection_id is required");
            }
            if has_entity {
                return fail("entity_definition_id must not be set");
            }
        }
        NodeType::Entity => {
            if !has_entity {
                return fail("entity_definition_id is required");
            }
            if has_connection {
                return fail("connection_id must not be set");
            }
        }
        NodeType::Transformer => {
            if has_connection || has_entity {
                return fail("transformers must not reference a connection or entity definition");
            }
            if matches!(node.config, None | Some(Value::Null)) {
                return fail("config is required");
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm with a min-heap on declared position, so ties resolve the
/// same way on every run. On failure returns the node indices of one cycle.
fn topological_order(successors: &[Vec<usize>]) -> std::result::Result<Vec<usize>, Vec<usize>> {
    let n = successors.len();
    let mut indegree = vec![0usize; n];
    for targets in successors {
        for &t in targets {
            indegree[t] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| indegree[i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for &t in &successors[i] {
            indegree[t] -= 1;
            if indegree[t] == 0 {
                ready.push(Reverse(t));
            }
        }
    }

    if order.len() == n {
        return Ok(order);
    }
    let remaining: Vec<bool> = indegree.iter().map(|&d| d > 0).collect();
    Err(find_cycle(successors, &remaining))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

fn find_cycle(successors: &[Vec<usize>], remaining: &[bool]) -> Vec<usize> {
    let mut state = vec![Visit::New; successors.len()];
    for start in 0..successors.len() {
        if !remaining[start] || state[start] != Visit::New {
            continue;
        }
        if let Some(cycle) = dfs_cycle(start, successors, remaining, &mut state) {
            return cycle;
        }
    }
    // Unreachable in practice: leftover nodes after Kahn always contain a back edge.
    (0..remaining.len()).filter(|&i| remaining[i]).collect()
}

/// Depth-first search from `start` for a back edge among `remaining` nodes.
/// Each frame is a node on the current path and the index of its next successor.
fn dfs_cycle(
    start: usize,
    successors: &[Vec<usize>],
    remaining: &[bool],
    state: &mut [Visit],
) -> Option<Vec<usize>> {
    let mut path: Vec<(usize, usize)> = vec![(start, 0)];
    state[start] = Visit::Active;

    while let Some(frame) = path.last_mut() {
        let (node, cursor) = *frame;
        let Some(&next) = successors[node].get(cursor) else {
            state[node] = Visit::Done;
            path.pop();
            continue;
        };
        frame.1 += 1;
        if !remaining[next] {
            continue;
        }
        match state[next] {
            Visit::Active => {
                if let Some(pos) = path.iter().position(|&(item, _)| item == next) {
                    return Some(path[pos..].iter().map(|&(item, _)| item).collect());
                }
            }
            Visit::New => {
                state[next] = Visit::Active;
                path.push((next, 0));
            }
            Visit::Done => {}
        }
    }
    None
}

fn check_reachability(definition: &SyncDagDefinition, adjacency: &Adjacency) -> Result<()> {
    let mut reached = vec![false; definition.nodes.len()];
    let mut queue: VecDeque<usize> = definition
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.node_type == NodeType::Source)
        .map(|(i, _)| i)
        .collect();
    for &i in &queue {
        reached[i] = true;
    }
    while let Some(i) = queue.pop_front() {
        for &next in &adjacency.successors[i] {
            if !reached[next] {
                reached[next] = true;
                queue.push_back(next);
            }
        }
    }

    let unreachable: Vec<Uuid> = definition
        .nodes
        .iter()
        .zip(&reached)
        .filter(|(_, r)| !**r)
        .map(|(n, _)| n.id)
        .collect();
    if !unreachable.is_empty() {
        return Err(GraphError::Unreachable {
            node_ids: unreachable,
        });
    }
    Ok(())
}

fn check_transformer_degrees(definition: &SyncDagDefinition, adjacency: &Adjacency) -> Result<()> {
    for (i, node) in definition.nodes.iter().enumerate() {
        if node.node_type != NodeType::Transformer {
            continue;
        }
        let in_degree = adjacency.predecessors[i].len();
        let out_degree = adjacency.successors[i].len();
        if in_degree == 0 || out_degree == 0 {
            return Err(GraphError::TransformerDegree {
                node_id: node.id,
                in_degree,
                out_degree,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DagEdge;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn linear_dag() -> SyncDagDefinition {
        SyncDagDefinition::new(id(100), "linear")
            .with_node(DagNode::source(id(1), "S", id(50)))
            .with_node(DagNode::transformer(
                id(2),
                "T",
                serde_json::json!({"max_chars": 500}),
            ))
            .with_node(DagNode::destination(id(3), "D", id(51)))
            .with_edge(id(1), id(2))
            .with_edge(id(2), id(3))
    }

    #[test]
    fn linear_pipeline_orders_source_transformer_destination() {
        let dag = validate(&linear_dag()).unwrap();
        assert_eq!(dag.topological_order(), &[id(1), id(2), id(3)]);
        assert_eq!(dag.successors(id(1)), &[id(2)]);
        assert_eq!(dag.predecessors(id(3)), &[id(2)]);
        assert_eq!(dag.nodes_of_type(NodeType::Destination).count(), 1);
    }

    #[test]
    fn removing_last_edge_leaves_destination_unreachable() {
        let mut def = linear_dag();
        def.edges.retain(|e| e.to_node_id != id(3));
        let err = validate(&def).unwrap_err();
        assert_eq!(
            err,
            GraphError::Unreachable {
                node_ids: vec![id(3)]
            }
        );
    }

    #[test]
    fn cycle_between_transformers_is_reported() {
        let config = serde_json::json!({});
        let def = SyncDagDefinition::new(id(100), "cyclic")
            .with_node(DagNode::source(id(1), "S", id(50)))
            .with_node(DagNode::transformer(id(2), "T1", config.clone()))
            .with_node(DagNode::transformer(id(3), "T2", config))
            .with_node(DagNode::destination(id(4), "D", id(51)))
            .with_edge(id(1), id(2))
            .with_edge(id(2), id(3))
            .with_edge(id(3), id(2))
            .with_edge(id(3), id(4));
        let err = validate(&def).unwrap_err();
        let GraphError::Cycle { node_ids } = err else {
            panic!("expected cycle error, got {err:?}");
        };
        assert!(node_ids.contains(&id(2)));
        assert!(node_ids.contains(&id(3)));
        assert!(!node_ids.contains(&id(1)));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let def = linear_dag().with_edge(id(2), id(2));
        let err = validate(&def).unwrap_err();
        assert_eq!(
            err,
            GraphError::Cycle {
                node_ids: vec![id(2)]
            }
        );
    }

    #[test]
    fn long_cycle_is_found_without_deep_recursion() {
        const LEN: u128 = 100_000;
        let config = serde_json::json!({});
        let mut def = SyncDagDefinition::new(id(0), "ring")
            .with_node(DagNode::source(id(1), "S", id(50)))
            .with_edge(id(1), id(1_000));
        for i in 0..LEN {
            let node = id(1_000 + i);
            let next = id(1_000 + (i + 1) % LEN);
            def = def
                .with_node(DagNode::transformer(node, "T", config.clone()))
                .with_edge(node, next);
        }

        let err = validate(&def).unwrap_err();
        let GraphError::Cycle { node_ids } = err else {
            panic!("expected cycle error, got {err:?}");
        };
        assert_eq!(node_ids.len(), LEN as usize);
        assert!(!node_ids.contains(&id(1)));
    }

    #[test]
    fn reference_mismatch_fails_before_cycle_detection() {
        let mut def = linear_dag().with_edge(id(3), id(1));
        def.nodes[1].connection_id = Some(id(52));
        let err = validate(&def).unwrap_err();
        assert!(matches!(
            err,
            GraphError::InvalidNode {
                node_type: NodeType::Transformer,
                ..
            }
        ));
    }

    #[test]
    fn source_without_connection_is_rejected() {
        let mut def = linear_dag();
        def.nodes[0].connection_id = None;
        let err = validate(&def).unwrap_err();
        assert_eq!(
            err,
            GraphError::invalid_node(id(1), NodeType::Source, "connection_id is required")
        );
    }

    #[test]
    fn entity_node_requires_definition_and_no_connection() {
        let mut entity = DagNode::entity(id(9), "E", id(70));
        entity.connection_id = Some(id(50));
        let def = linear_dag().with_node(entity);
        assert!(matches!(
            validate(&def).unwrap_err(),
            GraphError::InvalidNode {
                node_type: NodeType::Entity,
                ..
            }
        ));
    }

    #[test]
    fn transformer_without_config_is_rejected() {
        let mut def = linear_dag();
        def.nodes[1].config = None;
        assert!(matches!(
            validate(&def).unwrap_err(),
            GraphError::InvalidNode { .. }
        ));
    }

    #[test]
    fn dangling_edge_names_missing_node() {
        let mut def = linear_dag();
        let edge = DagEdge::new(id(1), id(77));
        let edge_id = edge.id;
        def.edges.push(edge);
        assert_eq!(
            validate(&def).unwrap_err(),
            GraphError::DanglingEdge {
                edge_id,
                node_id: id(77)
            }
        );
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let def = linear_dag().with_node(DagNode::destination(id(3), "D2", id(51)));
        assert_eq!(
            validate(&def).unwrap_err(),
            GraphError::DuplicateNode { node_id: id(3) }
        );
    }

    #[test]
    fn empty_definition_is_rejected() {
        let def = SyncDagDefinition::new(id(100), "empty");
        assert_eq!(validate(&def).unwrap_err(), GraphError::Empty);
    }

    #[test]
    fn dangling_transformer_output_is_rejected() {
        let def = linear_dag()
            .with_node(DagNode::transformer(id(4), "T2", serde_json::json!({})))
            .with_edge(id(1), id(4));
        assert_eq!(
            validate(&def).unwrap_err(),
            GraphError::TransformerDegree {
                node_id: id(4),
                in_degree: 1,
                out_degree: 0
            }
        );
    }

    #[test]
    fn independent_branches_follow_declared_order() {
        let def = SyncDagDefinition::new(id(100), "fan-out")
            .with_node(DagNode::source(id(1), "S", id(50)))
            .with_node(DagNode::entity(id(20), "B", id(71)))
            .with_node(DagNode::entity(id(10), "A", id(70)))
            .with_node(DagNode::destination(id(3), "D", id(51)))
            .with_edge(id(1), id(10))
            .with_edge(id(1), id(20))
            .with_edge(id(10), id(3))
            .with_edge(id(20), id(3));

        let first = validate(&def).unwrap();
        assert_eq!(first.topological_order(), &[id(1), id(20), id(10), id(3)]);

        let second = validate(&def).unwrap();
        assert_eq!(first.topological_order(), second.topological_order());

        let pos = |n: Uuid| {
            first
                .topological_order()
                .iter()
                .position(|x| *x == n)
                .unwrap()
        };
        for edge in &def.edges {
            assert!(pos(edge.from_node_id) < pos(edge.to_node_id));
        }
    }
}
