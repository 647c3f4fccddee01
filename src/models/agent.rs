// AI flow-builder models: intent, draft mutation state, and streaming events
//
// `AgentStreamEvent` separates a "thinking" phase from a final structured
// result so a UI can render an agent's reasoning as it streams in, rather
// than waiting on the whole turn before showing anything.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::flow::FlowDefinition;
use super::ids::{AgentId, ConversationId, ExecutionId, FlowId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentType {
    SearchNode,
    GetDocumentation,
    FindExamples,
    CreateFlow,
    AddNode,
    RemoveNode,
    ConnectNodes,
    ConfigureNode,
    ModifyFlow,
    OptimizeFlow,
    Explain,
    Clarify,
    Confirm,
    Compound,
    Chitchat,
    Unknown,
}

impl IntentType {
    /// Intents that require mutating the working draft, as opposed to pure
    /// question-answering or conversational intents.
    pub fn is_builder_intent(&self) -> bool {
        matches!(
            self,
            IntentType::CreateFlow
                | IntentType::AddNode
                | IntentType::RemoveNode
                | IntentType::ConnectNodes
                | IntentType::ConfigureNode
                | IntentType::ModifyFlow
                | IntentType::OptimizeFlow
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub intent_type: IntentType,
    pub confidence: f32,
    pub understanding: String,
    pub entities: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingChangeKind {
    AddNode,
    RemoveNode,
    ModifyNode,
    ConnectNodes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingChange {
    pub id: String,
    pub kind: PendingChangeKind,
    pub description: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub applied: bool,
}

/// Shared mutable graph state for one AI turn. Owned exclusively by the
/// `AgentContext` that created it; agents mutate it serially, never in
/// parallel, so no synchronisation is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkingFlowDraft {
    pub definition: FlowDefinition,
    pub next_node_seq: u64,
    pub pending_changes: Vec<PendingChange>,
}

impl WorkingFlowDraft {
    pub fn from_definition(definition: FlowDefinition) -> Self {
        WorkingFlowDraft {
            definition,
            next_node_seq: 0,
            pending_changes: vec![],
        }
    }

    /// Generates the next `node_N` id, the same scheme the frontend draft
    /// store used for nodes created without a user-supplied name.
    pub fn next_node_id(&mut self) -> String {
        self.next_node_seq += 1;
        format!("node_{}", self.next_node_seq)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub flow_id: FlowId,
    pub utterance: String,
    pub intent: Option<Intent>,
    pub draft: Option<WorkingFlowDraft>,
    pub working_memory: HashMap<String, Value>,
    pub tool_results: Vec<ToolResult>,
    pub visited_agents: HashSet<AgentId>,
    pub iteration: u32,
    pub max_iterations: u32,
}

impl AgentContext {
    pub fn new(conversation_id: ConversationId, user_id: UserId, flow_id: FlowId, utterance: impl Into<String>) -> Self {
        AgentContext {
            conversation_id,
            user_id,
            flow_id,
            utterance: utterance.into(),
            intent: None,
            draft: None,
            working_memory: HashMap::new(),
            tool_results: vec![],
            visited_agents: HashSet::new(),
            iteration: 0,
            max_iterations: 10,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.iteration >= self.max_iterations
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub success: bool,
    pub data: Value,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_id: AgentId,
    pub draft: Option<WorkingFlowDraft>,
    pub next_action: Option<AgentId>,
    pub summary: String,
}

/// Streaming events emitted during one agent (or agent chain) invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    Thinking { text: String },
    Text { delta: String },
    Structured { payload: Value },
    Error { message: String },
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecution {
    pub execution_id: ExecutionId,
    pub agent_id: AgentId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub iterations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_intents_are_classified_correctly() {
        assert!(IntentType::AddNode.is_builder_intent());
        assert!(!IntentType::Chitchat.is_builder_intent());
        assert!(!IntentType::Explain.is_builder_intent());
    }

    #[test]
    fn draft_generates_sequential_node_ids() {
        let mut draft = WorkingFlowDraft::default();
        assert_eq!(draft.next_node_id(), "node_1");
        assert_eq!(draft.next_node_id(), "node_2");
    }

    #[test]
    fn context_tracks_iteration_cap() {
        let mut ctx = AgentContext::new(
            ConversationId::from("c1"),
            UserId::from("u1"),
            FlowId::from("f1"),
            "build me a flow",
        );
        ctx.iteration = 10;
        assert!(ctx.exhausted());
    }
}
