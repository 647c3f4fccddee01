// Node handler contracts - the uniform interface every node type implements

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{ExecutionId, FlowId, NodeId, UserId, VersionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    FlowControl,
    Triggers,
    DataTransform,
    Ai,
    Communication,
    Messaging,
    Database,
    Storage,
    Files,
    Network,
    Tools,
    Output,
    SocialMedia,
    Integrations,
    Automation,
    Agent,
    Actions,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerInfo {
    pub node_type: String,
    pub display_name: String,
    pub description: String,
    pub category: NodeCategory,
    pub icon: String,
    pub is_trigger: bool,
    pub supports_async: bool,
    pub config_schema: Value,
}

/// Everything a handler needs to execute one node of one execution.
#[derive(Debug, Clone)]
pub struct NodeExecutionContext {
    pub execution_id: ExecutionId,
    pub node_id: NodeId,
    pub flow_id: FlowId,
    pub version_id: VersionId,
    pub user_id: UserId,
    pub config: Value,
    pub input: HashMap<String, Value>,
    pub global_context: Value,
    pub previous_outputs: HashMap<NodeId, Value>,
}

impl NodeExecutionContext {
    pub fn output_of(&self, node_id: &NodeId) -> Option<&Value> {
        self.previous_outputs.get(node_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeExecutionResult {
    pub success: bool,
    pub output: HashMap<String, Value>,
    pub error: Option<String>,
    pub error_stack: Option<String>,
    pub branches_to_follow: Option<Vec<String>>,
    pub duration_ms: u64,
    pub pause_requested: bool,
    pub pause_reason: Option<String>,
    pub resume_condition: Option<Value>,
    pub partial_output: Option<HashMap<String, Value>>,
}

impl NodeExecutionResult {
    pub fn success(output: HashMap<String, Value>, duration_ms: u64) -> Self {
        NodeExecutionResult {
            success: true,
            output,
            duration_ms,
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        NodeExecutionResult {
            success: false,
            error: Some(error.into()),
            duration_ms,
            ..Default::default()
        }
    }

    pub fn pause(reason: impl Into<String>, resume_condition: Value) -> Self {
        NodeExecutionResult {
            success: true,
            pause_requested: true,
            pause_reason: Some(reason.into()),
            resume_condition: Some(resume_condition),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_result_carries_output() {
        let mut out = HashMap::new();
        out.insert("x".to_string(), Value::from(1));
        let result = NodeExecutionResult::success(out.clone(), 5);
        assert!(result.success);
        assert_eq!(result.output, out);
        assert!(!result.pause_requested);
    }

    #[test]
    fn pause_result_sets_resume_condition() {
        let result = NodeExecutionResult::pause("awaiting approval", Value::from("approval-1"));
        assert!(result.pause_requested);
        assert_eq!(result.resume_condition, Some(Value::from("approval-1")));
    }
}
