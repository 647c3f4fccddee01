// DAG Parser & Validator (C3)
//
// Cycle detection walks the graph and flags back-edges using a textbook
// white/gray/black DFS colouring. Node identity here is the DAG itself,
// not a place graph that is allowed to contain cycles, so any back-edge
// found during the walk is a validation error rather than a legal loop.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{FlowDefinition, NodeId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub entry_points: Vec<NodeId>,
    pub exit_points: Vec<NodeId>,
    pub execution_order: Vec<NodeId>,
    pub dependencies: HashMap<NodeId, Vec<NodeId>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Gray,
    Black,
}

pub fn parse(definition: &FlowDefinition) -> ParseResult {
    let mut result = ParseResult::default();

    if definition.nodes.is_empty() {
        result.errors.push("Flow has no nodes".to_string());
        result.valid = false;
        return result;
    }

    let node_ids: HashSet<&NodeId> = definition.nodes.iter().map(|n| &n.id).collect();

    for edge in &definition.edges {
        if !node_ids.contains(&edge.source) {
            result
                .errors
                .push(format!("Edge {} references unknown source node {}", edge.id, edge.source));
        }
        if !node_ids.contains(&edge.target) {
            result
                .errors
                .push(format!("Edge {} references unknown target node {}", edge.id, edge.target));
        }
        if edge.source == edge.target {
            result
                .errors
                .push(format!("Self-loop on node {} is not allowed", edge.source));
        }
    }

    for node in &definition.nodes {
        match &node.node_type {
            None => result.warnings.push(format!("Node {} has no type", node.id)),
            Some(t) if t.is_empty() => result.warnings.push(format!("Node {} has no type", node.id)),
            Some(_) => {}
        }
    }

    if !result.errors.is_empty() {
        result.valid = false;
        return result;
    }

    // Build adjacency + indegree for Kahn's algorithm.
    let mut out_edges: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    let mut indegree: HashMap<&NodeId, usize> = definition.nodes.iter().map(|n| (&n.id, 0)).collect();
    let mut dependencies: HashMap<NodeId, Vec<NodeId>> =
        definition.nodes.iter().map(|n| (n.id.clone(), Vec::new())).collect();

    for edge in &definition.edges {
        out_edges.entry(&edge.source).or_default().push(&edge.target);
        *indegree.get_mut(&edge.target).unwrap() += 1;
        dependencies.get_mut(&edge.target).unwrap().push(edge.source.clone());
    }

    if let Some(cycle_node) = find_cycle(definition, &out_edges) {
        result.errors.push(format!("Cycle detected involving node {}", cycle_node));
        result.valid = false;
        return result;
    }

    result.entry_points = definition.entry_points();
    result.exit_points = definition.exit_points();
    result.dependencies = dependencies;

    result.execution_order = topological_order(definition, &out_edges, indegree);

    let reachable = reachable_from_entries(definition, &out_edges, &result.entry_points);
    for node in &definition.nodes {
        if !reachable.contains(&node.id) {
            result.warnings.push(format!("Node {} is unreachable from any entry point", node.id));
        }
    }

    result.valid = true;
    result
}

fn find_cycle<'a>(
    definition: &'a FlowDefinition,
    out_edges: &HashMap<&'a NodeId, Vec<&'a NodeId>>,
) -> Option<&'a NodeId> {
    let mut colour: HashMap<&NodeId, Colour> =
        definition.nodes.iter().map(|n| (&n.id, Colour::White)).collect();

    fn visit<'a>(
        node: &'a NodeId,
        out_edges: &HashMap<&'a NodeId, Vec<&'a NodeId>>,
        colour: &mut HashMap<&'a NodeId, Colour>,
    ) -> Option<&'a NodeId> {
        colour.insert(node, Colour::Gray);
        if let Some(children) = out_edges.get(node) {
            for &child in children {
                match colour.get(child) {
                    Some(Colour::Gray) => return Some(child),
                    Some(Colour::White) | None => {
                        if let Some(found) = visit(child, out_edges, colour) {
                            return Some(found);
                        }
                    }
                    Some(Colour::Black) => {}
                }
            }
        }
        colour.insert(node, Colour::Black);
        None
    }

    for node in &definition.nodes {
        if colour.get(&node.id) == Some(&Colour::White) {
            if let Some(found) = visit(&node.id, out_edges, &mut colour) {
                return Some(found);
            }
        }
    }
    None
}

fn topological_order<'a>(
    definition: &'a FlowDefinition,
    out_edges: &HashMap<&'a NodeId, Vec<&'a NodeId>>,
    mut indegree: HashMap<&'a NodeId, usize>,
) -> Vec<NodeId> {
    let mut ready: BTreeSet<&NodeId> = indegree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut order = Vec::with_capacity(definition.nodes.len());

    while let Some(&node) = ready.iter().next() {
        ready.remove(node);
        order.push(node.clone());
        if let Some(children) = out_edges.get(node) {
            for &child in children {
                let deg = indegree.get_mut(child).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(child);
                }
            }
        }
    }

    order
}

fn reachable_from_entries<'a>(
    definition: &'a FlowDefinition,
    out_edges: &HashMap<&'a NodeId, Vec<&'a NodeId>>,
    entry_points: &[NodeId],
) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut stack: Vec<&NodeId> = entry_points.iter().collect();
    while let Some(node) = stack.pop() {
        if seen.insert(node.clone()) {
            if let Some(children) = out_edges.get(node) {
                stack.extend(children.iter().copied());
            }
        }
    }
    // Keep borrow lifetime tied to the definition even though the result is owned.
    let _ = definition;
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EdgeDefinition, EdgeId, NodeData, NodeDefinition};
    use serde_json::Value;

    fn node(id: &str) -> NodeDefinition {
        NodeDefinition {
            id: NodeId::from(id),
            node_type: Some("noop".to_string()),
            position: (0.0, 0.0),
            data: NodeData {
                label: id.to_string(),
                config: Value::Null,
                credential_id: None,
            },
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> EdgeDefinition {
        EdgeDefinition {
            id: EdgeId::from(id),
            source: NodeId::from(source),
            target: NodeId::from(target),
            source_handle: None,
            target_handle: None,
        }
    }

    #[test]
    fn empty_flow_is_invalid() {
        let result = parse(&FlowDefinition::default());
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("no nodes")));
    }

    #[test]
    fn linear_flow_orders_by_dependency() {
        let def = FlowDefinition {
            nodes: vec![node("a"), node("b"), node("c")],
            edges: vec![edge("e1", "a", "b"), edge("e2", "b", "c")],
        };
        let result = parse(&def);
        assert!(result.valid);
        assert_eq!(
            result.execution_order,
            vec![NodeId::from("a"), NodeId::from("b"), NodeId::from("c")]
        );
    }

    #[test]
    fn diamond_respects_partial_order() {
        let def = FlowDefinition {
            nodes: vec![node("s"), node("l"), node("r"), node("j")],
            edges: vec![
                edge("e1", "s", "l"),
                edge("e2", "s", "r"),
                edge("e3", "l", "j"),
                edge("e4", "r", "j"),
            ],
        };
        let result = parse(&def);
        assert!(result.valid);
        let pos = |id: &str| result.execution_order.iter().position(|n| n.as_str() == id).unwrap();
        assert!(pos("s") < pos("l"));
        assert!(pos("s") < pos("r"));
        assert!(pos("l") < pos("j"));
        assert!(pos("r") < pos("j"));
    }

    #[test]
    fn cycle_is_rejected() {
        let def = FlowDefinition {
            nodes: vec![node("a"), node("b")],
            edges: vec![edge("e1", "a", "b"), edge("e2", "b", "a")],
        };
        let result = parse(&def);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("Cycle detected")));
    }

    #[test]
    fn self_loop_is_rejected() {
        let def = FlowDefinition {
            nodes: vec![node("a")],
            edges: vec![edge("e1", "a", "a")],
        };
        let result = parse(&def);
        assert!(!result.valid);
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let def = FlowDefinition {
            nodes: vec![node("a")],
            edges: vec![edge("e1", "a", "missing")],
        };
        let result = parse(&def);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("unknown target")));
    }

    #[test]
    fn disconnected_node_is_its_own_entry_point() {
        // In an acyclic graph every node is reachable from some entry point
        // by construction (walk predecessors back to an indegree-0 node),
        // so a disconnected node surfaces as an extra entry point rather
        // than an unreachable warning.
        let def = FlowDefinition {
            nodes: vec![node("a"), node("b"), node("orphan")],
            edges: vec![edge("e1", "a", "b")],
        };
        let result = parse(&def);
        assert!(result.valid);
        assert!(result.entry_points.contains(&NodeId::from("orphan")));
        assert!(result.warnings.is_empty());
    }
}
