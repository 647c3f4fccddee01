// Flow graph definitions - the DAG authored by a user
//
// A `Flow` is the stable identity; a `FlowVersion` is a snapshot of its
// graph. Only one version per flow may be `Published` at a time, so
// triggering a flow by id always resolves to a single unambiguous graph.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{EdgeId, FlowId, NodeId, UserId, VersionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Private,
    Shared,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionStatus {
    Draft,
    Published,
    Deprecated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub id: FlowId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub visibility: Visibility,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flow {
    pub fn new<S: Into<String>>(id: FlowId, name: S, owner_id: UserId) -> Self {
        let now = Utc::now();
        Flow {
            id,
            name: name.into(),
            description: None,
            owner_id,
            visibility: Visibility::Private,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
    pub config: Value,
    pub credential_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub position: (f64, f64),
    pub data: NodeData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FlowDefinition {
    pub nodes: Vec<NodeDefinition>,
    pub edges: Vec<EdgeDefinition>,
}

impl FlowDefinition {
    pub fn node(&self, id: &NodeId) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn outgoing_edges<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a EdgeDefinition> {
        self.edges.iter().filter(move |e| &e.source == id)
    }

    pub fn incoming_edges<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a EdgeDefinition> {
        self.edges.iter().filter(move |e| &e.target == id)
    }

    /// Nodes with no inbound edges - candidate trigger/entry nodes.
    pub fn entry_points(&self) -> Vec<NodeId> {
        let with_incoming: HashSet<&NodeId> = self.edges.iter().map(|e| &e.target).collect();
        self.nodes
            .iter()
            .map(|n| &n.id)
            .filter(|id| !with_incoming.contains(id))
            .cloned()
            .collect()
    }

    /// Nodes with no outbound edges.
    pub fn exit_points(&self) -> Vec<NodeId> {
        let with_outgoing: HashSet<&NodeId> = self.edges.iter().map(|e| &e.source).collect();
        self.nodes
            .iter()
            .map(|n| &n.id)
            .filter(|id| !with_outgoing.contains(id))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowVersion {
    pub id: VersionId,
    pub flow_id: FlowId,
    pub version: String,
    pub status: VersionStatus,
    pub definition: FlowDefinition,
    pub settings: Option<Value>,
    pub pinned_data: HashMap<NodeId, Value>,
    pub created_at: DateTime<Utc>,
}

impl FlowVersion {
    pub fn new(id: VersionId, flow_id: FlowId, version: impl Into<String>, definition: FlowDefinition) -> Self {
        FlowVersion {
            id,
            flow_id,
            version: version.into(),
            status: VersionStatus::Draft,
            definition,
            settings: None,
            pinned_data: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn continue_on_error(&self, node_id: &NodeId) -> bool {
        self.settings
            .as_ref()
            .and_then(|s| s.get("continueOnError"))
            .and_then(|v| v.as_array())
            .map(|ids| ids.iter().any(|v| v.as_str() == Some(node_id.as_str())))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn entry_and_exit_points_are_indegree_outdegree_zero() {
        let def = FlowDefinition {
            nodes: vec![node("a"), node("b"), node("c")],
            edges: vec![edge("e1", "a", "b"), edge("e2", "b", "c")],
        };
        assert_eq!(def.entry_points(), vec![NodeId::from("a")]);
        assert_eq!(def.exit_points(), vec![NodeId::from("c")]);
    }

    #[test]
    fn continue_on_error_reads_settings() {
        let mut version = FlowVersion::new(
            VersionId::from("v1"),
            FlowId::from("f1"),
            "1",
            FlowDefinition::default(),
        );
        version.settings = Some(serde_json::json!({ "continueOnError": ["b"] }));
        assert!(version.continue_on_error(&NodeId::from("b")));
        assert!(!version.continue_on_error(&NodeId::from("a")));
    }
}
