// Execution state - one run of a flow version
//
// An Execution carries per-node state plus enough of the triggering
// payload and output to be replayed or inspected after the fact without
// going back to the flow definition.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::ids::{ExecutionId, FlowId, NodeId, UserId, VersionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Pending,
    Running,
    Waiting,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeCondition {
    pub condition_type: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionState {
    pub node_id: NodeId,
    pub state: NodeState,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub resume_condition: Option<ResumeCondition>,
}

impl NodeExecutionState {
    pub fn pending(node_id: NodeId) -> Self {
        NodeExecutionState {
            node_id,
            state: NodeState::Pending,
            output: None,
            error: None,
            started_at: None,
            completed_at: None,
            resume_condition: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionEventType {
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    ExecutionCancelled,
    ExecutionPaused,
    ExecutionResumed,
    NodeStarted,
    NodeCompleted,
    NodeFailed,
    NodeSkipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub id: Uuid,
    pub event_type: ExecutionEventType,
    pub execution_id: ExecutionId,
    pub node_id: Option<NodeId>,
    pub data: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionEvent {
    pub fn new(event_type: ExecutionEventType, execution_id: ExecutionId) -> Self {
        ExecutionEvent {
            id: Uuid::new_v4(),
            event_type,
            execution_id,
            node_id: None,
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub flow_id: FlowId,
    pub version_id: VersionId,
    pub user_id: UserId,
    pub status: ExecutionStatus,
    pub trigger_payload: Value,
    pub node_states: HashMap<NodeId, NodeExecutionState>,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn new(flow_id: FlowId, version_id: VersionId, user_id: UserId, trigger_payload: Value) -> Self {
        Execution {
            id: ExecutionId::from(Uuid::new_v4().to_string()),
            flow_id,
            version_id,
            user_id,
            status: ExecutionStatus::Pending,
            trigger_payload,
            node_states: HashMap::new(),
            output: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_execution_starts_pending_with_no_node_states() {
        let exec = Execution::new(
            FlowId::from("f1"),
            VersionId::from("v1"),
            UserId::from("u1"),
            Value::Null,
        );
        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert!(exec.node_states.is_empty());
        assert!(!exec.is_terminal());
    }

    #[test]
    fn terminal_statuses_are_recognised() {
        let mut exec = Execution::new(
            FlowId::from("f1"),
            VersionId::from("v1"),
            UserId::from("u1"),
            Value::Null,
        );
        exec.status = ExecutionStatus::Failed;
        assert!(exec.is_terminal());
        exec.status = ExecutionStatus::Waiting;
        assert!(!exec.is_terminal());
    }
}
