// AI Multi-Agent Flow Builder (C6)
//
// A Supervisor routes one AI turn through a table of specialised sub-agents
// (discovery, builder, validator) instead of a single monolithic prompt.
// Every mutation a sub-agent wants to make goes through a `Tool` that
// records a `PendingChange` rather than touching the flow directly -
// nothing the AI proposes is applied without a human approving it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::engine::dag;
use crate::engine::registry::HandlerRegistry;
use crate::models::{
    AgentContext, AgentId, AgentResult, AgentStreamEvent, EdgeDefinition, EdgeId, Intent,
    IntentType, NodeData, NodeDefinition, NodeId, PendingChange, PendingChangeKind, ToolResult,
    WorkingFlowDraft,
};
use crate::{EngineError, Result};

// ---------------------------------------------------------------------
// Agent contract
// ---------------------------------------------------------------------

#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> AgentId;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn capabilities(&self) -> &[&str];

    async fn execute(&self, ctx: &mut AgentContext, events: &UnboundedSender<AgentStreamEvent>) -> Result<AgentResult>;
}

#[derive(Default)]
pub struct AgentRegistry {
    agents: DashMap<AgentId, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        AgentRegistry::default()
    }

    pub fn register(&self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.id(), agent);
    }

    pub fn find_agent(&self, id: &AgentId) -> Option<Arc<dyn Agent>> {
        self.agents.get(id).map(|a| a.clone())
    }

    pub fn list_agents(&self) -> Vec<AgentId> {
        self.agents.iter().map(|a| a.key().clone()).collect()
    }

    pub fn find_agents_by_capability(&self, capability: &str) -> Vec<Arc<dyn Agent>> {
        self.agents.iter().filter(|a| a.capabilities().contains(&capability)).map(|a| a.clone()).collect()
    }
}

// ---------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn requires_confirmation(&self) -> bool {
        true
    }
    async fn execute(&self, params: Value, draft: &mut WorkingFlowDraft) -> Result<ToolResult>;
}

fn new_pending_change(kind: PendingChangeKind, description: impl Into<String>, before: Option<Value>, after: Option<Value>) -> PendingChange {
    PendingChange {
        id: uuid::Uuid::new_v4().to_string(),
        kind,
        description: description.into(),
        before,
        after,
        applied: false,
    }
}

pub struct AddNodeTool;

#[async_trait]
impl Tool for AddNodeTool {
    fn name(&self) -> &str {
        "add_node"
    }
    fn description(&self) -> &str {
        "Adds a new node to the working draft, pending user confirmation"
    }

    async fn execute(&self, params: Value, draft: &mut WorkingFlowDraft) -> Result<ToolResult> {
        let node_type = params
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Validation("add_node requires a 'type' parameter".to_string()))?
            .to_string();
        let label = params.get("label").and_then(Value::as_str).unwrap_or(&node_type).to_string();
        let config = params.get("config").cloned().unwrap_or(Value::Null);

        let node_id = NodeId::from(draft.next_node_id());
        let node = NodeDefinition {
            id: node_id.clone(),
            node_type: Some(node_type.clone()),
            position: (0.0, 0.0),
            data: NodeData { label: label.clone(), config, credential_id: None },
        };

        let after = serde_json::to_value(&node).unwrap_or(Value::Null);
        draft.pending_changes.push(new_pending_change(
            PendingChangeKind::AddNode,
            format!("Add {} node \"{}\"", node_type, label),
            None,
            Some(after.clone()),
        ));

        Ok(ToolResult {
            tool_name: self.name().to_string(),
            success: true,
            data: serde_json::json!({ "nodeId": node_id.as_str() }),
            message: Some(format!("Proposed adding node {}", node_id)),
        })
    }
}

pub struct RemoveNodeTool;

impl RemoveNodeTool {
    fn resolve_node_id(draft: &WorkingFlowDraft, params: &Value) -> Option<NodeId> {
        if let Some(id) = params.get("nodeId").and_then(Value::as_str) {
            return Some(NodeId::from(id));
        }
        let label = params.get("nodeLabel").and_then(Value::as_str)?;
        draft
            .definition
            .nodes
            .iter()
            .find(|n| n.data.label.eq_ignore_ascii_case(label))
            .or_else(|| draft.definition.nodes.iter().find(|n| n.data.label.to_lowercase().contains(&label.to_lowercase())))
            .map(|n| n.id.clone())
    }
}

#[async_trait]
impl Tool for RemoveNodeTool {
    fn name(&self) -> &str {
        "remove_node"
    }
    fn description(&self) -> &str {
        "Removes a node (and its incident edges) from the working draft, pending confirmation"
    }

    async fn execute(&self, params: Value, draft: &mut WorkingFlowDraft) -> Result<ToolResult> {
        let node_id = Self::resolve_node_id(draft, &params)
            .ok_or_else(|| EngineError::NotFound("no node matched nodeId/nodeLabel".to_string()))?;

        let before = draft
            .definition
            .node(&node_id)
            .map(|n| serde_json::to_value(n).unwrap_or(Value::Null));

        draft.pending_changes.push(new_pending_change(
            PendingChangeKind::RemoveNode,
            format!("Remove node {}", node_id),
            before,
            None,
        ));

        Ok(ToolResult {
            tool_name: self.name().to_string(),
            success: true,
            data: serde_json::json!({ "nodeId": node_id.as_str() }),
            message: Some(format!("Proposed removing node {}", node_id)),
        })
    }
}

pub struct ConnectNodesTool;

#[async_trait]
impl Tool for ConnectNodesTool {
    fn name(&self) -> &str {
        "connect_nodes"
    }
    fn description(&self) -> &str {
        "Proposes an edge between two nodes in the working draft"
    }

    async fn execute(&self, params: Value, draft: &mut WorkingFlowDraft) -> Result<ToolResult> {
        let source = params.get("source").and_then(Value::as_str).ok_or_else(|| {
            EngineError::Validation("connect_nodes requires a 'source' parameter".to_string())
        })?;
        let target = params.get("target").and_then(Value::as_str).ok_or_else(|| {
            EngineError::Validation("connect_nodes requires a 'target' parameter".to_string())
        })?;

        let edge = EdgeDefinition {
            id: EdgeId::from(uuid::Uuid::new_v4().to_string()),
            source: NodeId::from(source),
            target: NodeId::from(target),
            source_handle: params.get("sourceHandle").and_then(Value::as_str).map(String::from),
            target_handle: None,
        };

        draft.pending_changes.push(new_pending_change(
            PendingChangeKind::ConnectNodes,
            format!("Connect {} -> {}", source, target),
            None,
            Some(serde_json::to_value(&edge).unwrap_or(Value::Null)),
        ));

        Ok(ToolResult {
            tool_name: self.name().to_string(),
            success: true,
            data: serde_json::json!({ "edgeId": edge.id.as_str() }),
            message: Some(format!("Proposed connecting {} to {}", source, target)),
        })
    }
}

pub struct ConfigureNodeTool;

#[async_trait]
impl Tool for ConfigureNodeTool {
    fn name(&self) -> &str {
        "configure_node"
    }
    fn description(&self) -> &str {
        "Proposes a configuration change for an existing node"
    }

    async fn execute(&self, params: Value, draft: &mut WorkingFlowDraft) -> Result<ToolResult> {
        let node_id = params.get("nodeId").and_then(Value::as_str).map(NodeId::from).ok_or_else(|| {
            EngineError::Validation("configure_node requires a 'nodeId' parameter".to_string())
        })?;
        let config = params
            .get("config")
            .cloned()
            .ok_or_else(|| EngineError::Validation("configure_node requires a 'config' parameter".to_string()))?;

        let before = draft.definition.node(&node_id).map(|n| n.data.config.clone());

        draft.pending_changes.push(new_pending_change(
            PendingChangeKind::ModifyNode,
            format!("Reconfigure node {}", node_id),
            before,
            Some(config),
        ));

        Ok(ToolResult {
            tool_name: self.name().to_string(),
            success: true,
            data: serde_json::json!({ "nodeId": node_id.as_str() }),
            message: Some(format!("Proposed reconfiguring node {}", node_id)),
        })
    }
}

/// Checks missing handler registrations, a trigger's presence, orphan
/// nodes, cycles, and a small per-type required-config table.
pub struct ValidateFlowTool {
    registry: Arc<HandlerRegistry>,
}

impl ValidateFlowTool {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        ValidateFlowTool { registry }
    }

    fn required_config_keys(node_type: &str) -> &'static [&'static str] {
        match node_type {
            "httpRequest" => &["url"],
            "scheduleTrigger" => &["cronExpression"],
            _ => &[],
        }
    }
}

#[async_trait]
impl Tool for ValidateFlowTool {
    fn name(&self) -> &str {
        "validate_flow"
    }
    fn description(&self) -> &str {
        "Validates the working draft's structure and node configuration"
    }
    fn requires_confirmation(&self) -> bool {
        false
    }

    async fn execute(&self, _params: Value, draft: &mut WorkingFlowDraft) -> Result<ToolResult> {
        let mut errors: Vec<String> = Vec::new();
        let parsed = dag::parse(&draft.definition);
        errors.extend(parsed.errors.clone());

        for node in &draft.definition.nodes {
            match &node.node_type {
                Some(t) if !self.registry.has_handler(t) => {
                    errors.push(format!("Node {} references unregistered node type {}", node.id, t));
                }
                Some(t) => {
                    for key in Self::required_config_keys(t) {
                        if node.data.config.get(key).is_none() {
                            errors.push(format!("Node {} ({}) is missing required config key '{}'", node.id, t, key));
                        }
                    }
                }
                None => {}
            }
        }

        if draft.definition.nodes.len() > 1 && parsed.valid && !parsed.entry_points.iter().any(|id| {
            draft
                .definition
                .node(id)
                .and_then(|n| n.node_type.as_deref())
                .map(|t| self.registry.trigger_handlers().iter().any(|h| h.node_type == t))
                .unwrap_or(false)
        }) {
            errors.push("No trigger node found among the flow's entry points".to_string());
        }

        let valid = errors.is_empty();
        Ok(ToolResult {
            tool_name: self.name().to_string(),
            success: valid,
            data: serde_json::json!({ "errors": errors, "warnings": parsed.warnings }),
            message: if valid { None } else { Some(errors.join("; ")) },
        })
    }
}

// ---------------------------------------------------------------------
// Intent analysis
// ---------------------------------------------------------------------

#[async_trait]
pub trait IntentAnalyzer: Send + Sync {
    async fn analyze(&self, ctx: &AgentContext) -> Result<Intent>;
}

/// Deterministic keyword table covering English and Chinese verbs, used
/// when the LLM provider is unavailable or its structured-JSON response
/// fails to parse.
pub struct RuleBasedIntentAnalyzer;

#[async_trait]
impl IntentAnalyzer for RuleBasedIntentAnalyzer {
    async fn analyze(&self, ctx: &AgentContext) -> Result<Intent> {
        let text = ctx.utterance.to_lowercase();
        let table: &[(&[&str], IntentType)] = &[
            (&["create a flow", "build a flow", "new flow", "创建流程", "新建流程"], IntentType::CreateFlow),
            (&["add a node", "add node", "添加节点"], IntentType::AddNode),
            (&["remove node", "delete node", "删除节点"], IntentType::RemoveNode),
            (&["connect", "link node", "连接节点"], IntentType::ConnectNodes),
            (&["configure", "set up", "配置节点"], IntentType::ConfigureNode),
            (&["change the flow", "modify the flow", "修改流程"], IntentType::ModifyFlow),
            (&["optimi", "优化"], IntentType::OptimizeFlow),
            (&["explain", "why does", "解释"], IntentType::Explain),
            (&["what do you mean", "clarify", "澄清"], IntentType::Clarify),
            (&["yes", "confirm", "确认", "好的"], IntentType::Confirm),
            (&["search for", "find a node", "查找节点"], IntentType::SearchNode),
            (&["docs for", "documentation", "文档"], IntentType::GetDocumentation),
            (&["example of", "show me an example", "示例"], IntentType::FindExamples),
        ];

        for (keywords, intent_type) in table {
            if keywords.iter().any(|k| text.contains(k)) {
                return Ok(Intent {
                    intent_type: intent_type.clone(),
                    confidence: 0.6,
                    understanding: format!("Matched keyword rule for {:?}", intent_type),
                    entities: HashMap::new(),
                });
            }
        }

        Ok(Intent {
            intent_type: IntentType::Unknown,
            confidence: 0.2,
            understanding: "No keyword rule matched".to_string(),
            entities: HashMap::new(),
        })
    }
}

/// Tries `primary` (expected to be LLM-backed) first; any error or a
/// confidence the primary itself reports as unreliable falls back to the
/// deterministic rule table rather than surfacing the failure to the user.
pub struct FallbackIntentAnalyzer {
    primary: Arc<dyn IntentAnalyzer>,
    fallback: RuleBasedIntentAnalyzer,
}

impl FallbackIntentAnalyzer {
    pub fn new(primary: Arc<dyn IntentAnalyzer>) -> Self {
        FallbackIntentAnalyzer { primary, fallback: RuleBasedIntentAnalyzer }
    }
}

#[async_trait]
impl IntentAnalyzer for FallbackIntentAnalyzer {
    async fn analyze(&self, ctx: &AgentContext) -> Result<Intent> {
        match self.primary.analyze(ctx).await {
            Ok(intent) => Ok(intent),
            Err(_) => self.fallback.analyze(ctx).await,
        }
    }
}

// ---------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------

pub struct RouterEngine;

impl RouterEngine {
    pub fn new() -> Self {
        RouterEngine
    }

    /// Table-driven by intent type; skips agents already visited this turn
    /// to prevent routing loops.
    pub fn route(&self, intent: &Intent, ctx: &AgentContext) -> Option<AgentId> {
        if ctx.exhausted() {
            return None;
        }
        let candidates: &[&str] = match intent.intent_type {
            IntentType::CreateFlow | IntentType::SearchNode | IntentType::FindExamples | IntentType::GetDocumentation => {
                &["discovery", "builder"]
            }
            IntentType::AddNode
            | IntentType::RemoveNode
            | IntentType::ConnectNodes
            | IntentType::ConfigureNode
            | IntentType::ModifyFlow
            | IntentType::OptimizeFlow => &["builder", "validator"],
            IntentType::Explain | IntentType::Clarify | IntentType::Confirm | IntentType::Compound | IntentType::Chitchat | IntentType::Unknown => &[],
        };

        candidates.iter().map(|id| AgentId::from(*id)).find(|id| !ctx.visited_agents.contains(id))
    }

    pub fn should_continue(&self, sub_result: &AgentResult, ctx: &AgentContext) -> bool {
        sub_result.next_action.is_some() && !ctx.exhausted()
    }
}

impl Default for RouterEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------
// Sub-agents
// ---------------------------------------------------------------------

/// Maps a described outcome to candidate node types. Used as the
/// deterministic fallback when the LLM nomination call is unavailable;
/// also usable standalone for tests.
fn keyword_node_recommendations(utterance: &str) -> Vec<&'static str> {
    let text = utterance.to_lowercase();
    let table: &[(&[&str], &str)] = &[
        (&["email", "邮件"], "sendEmail"),
        (&["database", "数据库"], "database"),
        (&["http", "api", "webhook", "请求"], "httpRequest"),
        (&["slack"], "slack"),
        (&["telegram"], "telegram"),
        (&["schedule", "cron", "定时"], "scheduleTrigger"),
    ];
    table.iter().filter(|(keywords, _)| keywords.iter().any(|k| text.contains(k))).map(|(_, node)| *node).collect()
}

pub struct DiscoveryAgent {
    registry: Arc<HandlerRegistry>,
}

impl DiscoveryAgent {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        DiscoveryAgent { registry }
    }
}

#[async_trait]
impl Agent for DiscoveryAgent {
    fn id(&self) -> AgentId {
        AgentId::from("discovery")
    }
    fn name(&self) -> &str {
        "Discovery Agent"
    }
    fn description(&self) -> &str {
        "Recommends node types for a described outcome"
    }
    fn capabilities(&self) -> &[&str] {
        &["search_nodes", "recommend_nodes"]
    }

    async fn execute(&self, ctx: &mut AgentContext, events: &UnboundedSender<AgentStreamEvent>) -> Result<AgentResult> {
        let _ = events.send(AgentStreamEvent::Thinking { text: "Looking for relevant node types...".to_string() });

        let recommended = keyword_node_recommendations(&ctx.utterance);
        let known: Vec<&str> = recommended.iter().filter(|t| self.registry.has_handler(t)).copied().collect();

        ctx.working_memory.insert("discoveryResults".to_string(), serde_json::json!(known));
        let _ = events.send(AgentStreamEvent::Structured { payload: serde_json::json!({ "discoveryResults": known }) });

        Ok(AgentResult {
            agent_id: self.id(),
            draft: ctx.draft.clone(),
            next_action: Some(AgentId::from("builder")),
            summary: format!("Recommended {} node type(s)", known.len()),
        })
    }
}

pub struct BuilderAgent {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl BuilderAgent {
    pub fn new() -> Self {
        let mut tools: HashMap<String, Arc<dyn Tool>> = HashMap::new();
        tools.insert("add_node".to_string(), Arc::new(AddNodeTool));
        tools.insert("remove_node".to_string(), Arc::new(RemoveNodeTool));
        tools.insert("connect_nodes".to_string(), Arc::new(ConnectNodesTool));
        tools.insert("configure_node".to_string(), Arc::new(ConfigureNodeTool));
        BuilderAgent { tools }
    }

    /// Applies one tool call against the turn's draft, initialising the
    /// draft from the current flow snapshot if this is the first builder
    /// mutation of the turn.
    pub async fn call_tool(&self, tool_name: &str, params: Value, ctx: &mut AgentContext) -> Result<ToolResult> {
        let draft = ctx.draft.get_or_insert_with(WorkingFlowDraft::default);
        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| EngineError::NotFound(format!("tool {}", tool_name)))?;
        let result = tool.execute(params, draft).await?;
        ctx.tool_results.push(result.clone());
        Ok(result)
    }
}

impl Default for BuilderAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for BuilderAgent {
    fn id(&self) -> AgentId {
        AgentId::from("builder")
    }
    fn name(&self) -> &str {
        "Builder Agent"
    }
    fn description(&self) -> &str {
        "Mutates the working draft via tools, producing pending changes"
    }
    fn capabilities(&self) -> &[&str] {
        &["add_node", "remove_node", "connect_nodes", "configure_node"]
    }

    async fn execute(&self, ctx: &mut AgentContext, events: &UnboundedSender<AgentStreamEvent>) -> Result<AgentResult> {
        let _ = events.send(AgentStreamEvent::Thinking { text: "Drafting flow changes...".to_string() });

        let recommended = ctx
            .working_memory
            .get("discoveryResults")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_str())
            .map(String::from);

        if let Some(node_type) = recommended {
            self.call_tool("add_node", serde_json::json!({ "type": node_type }), ctx).await?;
        }

        let payload = serde_json::json!({ "pendingChanges": ctx.draft.as_ref().map(|d| d.pending_changes.len()).unwrap_or(0) });
        let _ = events.send(AgentStreamEvent::Structured { payload });

        Ok(AgentResult {
            agent_id: self.id(),
            draft: ctx.draft.clone(),
            next_action: Some(AgentId::from("validator")),
            summary: "Proposed draft changes".to_string(),
        })
    }
}

pub struct ValidatorAgent {
    tool: ValidateFlowTool,
}

impl ValidatorAgent {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        ValidatorAgent { tool: ValidateFlowTool::new(registry) }
    }
}

#[async_trait]
impl Agent for ValidatorAgent {
    fn id(&self) -> AgentId {
        AgentId::from("validator")
    }
    fn name(&self) -> &str {
        "Validator Agent"
    }
    fn description(&self) -> &str {
        "Validates the working draft's structure and configuration"
    }
    fn capabilities(&self) -> &[&str] {
        &["validate_flow"]
    }

    async fn execute(&self, ctx: &mut AgentContext, events: &UnboundedSender<AgentStreamEvent>) -> Result<AgentResult> {
        let _ = events.send(AgentStreamEvent::Thinking { text: "Validating the draft...".to_string() });

        let draft = ctx.draft.get_or_insert_with(WorkingFlowDraft::default);
        let result = self.tool.execute(Value::Null, draft).await?;
        let _ = events.send(AgentStreamEvent::Structured { payload: result.data.clone() });

        Ok(AgentResult {
            agent_id: self.id(),
            draft: ctx.draft.clone(),
            next_action: None,
            summary: if result.success { "Draft is valid".to_string() } else { result.message.clone().unwrap_or_default() },
        })
    }
}

// ---------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------

pub struct Supervisor {
    agents: Arc<AgentRegistry>,
    router: RouterEngine,
    analyzer: Arc<dyn IntentAnalyzer>,
}

impl Supervisor {
    pub fn new(agents: Arc<AgentRegistry>, analyzer: Arc<dyn IntentAnalyzer>) -> Self {
        Supervisor { agents, router: RouterEngine::new(), analyzer }
    }

    /// Runs one AI turn to completion, returning every streamed event plus
    /// the final draft (if the turn produced one). Wraps the last
    /// sub-agent's output as a single `structured({action: "update_flow",
    /// flowDefinition})` event before `done`, per the streaming contract.
    pub async fn run_turn(&self, ctx: &mut AgentContext) -> Result<Vec<AgentStreamEvent>> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut events = Vec::new();

        let intent = self.analyzer.analyze(ctx).await?;
        ctx.intent = Some(intent.clone());

        if intent.intent_type.is_builder_intent() && ctx.draft.is_none() {
            ctx.draft = Some(WorkingFlowDraft::default());
        }

        let mut current_intent = intent;
        loop {
            let Some(agent_id) = self.router.route(&current_intent, ctx) else { break };
            let Some(agent) = self.agents.find_agent(&agent_id) else { break };

            ctx.visited_agents.insert(agent_id.clone());
            ctx.iteration += 1;

            let result = agent.execute(ctx, &tx).await?;
            ctx.draft = result.draft.clone();

            if !self.router.should_continue(&result, ctx) {
                break;
            }

            current_intent = Intent {
                intent_type: current_intent.intent_type.clone(),
                confidence: current_intent.confidence,
                understanding: current_intent.understanding.clone(),
                entities: current_intent.entities.clone(),
            };
        }

        drop(tx);
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        if let Some(draft) = &ctx.draft {
            if !draft.pending_changes.is_empty() || !draft.definition.nodes.is_empty() {
                events.push(AgentStreamEvent::Structured {
                    payload: serde_json::json!({ "action": "update_flow", "flowDefinition": draft.definition }),
                });
            }
        }
        events.push(AgentStreamEvent::Done);

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationId, FlowId, UserId};

    fn registry_with_builtins() -> Arc<HandlerRegistry> {
        Arc::new(HandlerRegistry::with_builtins())
    }

    #[tokio::test]
    async fn rule_based_analyzer_matches_create_flow_keyword() {
        let analyzer = RuleBasedIntentAnalyzer;
        let ctx = AgentContext::new(ConversationId::from("c1"), UserId::from("u1"), FlowId::from("f1"), "please build a flow for me");
        let intent = analyzer.analyze(&ctx).await.unwrap();
        assert_eq!(intent.intent_type, IntentType::CreateFlow);
    }

    #[test]
    fn router_skips_already_visited_agents() {
        let router = RouterEngine::new();
        let mut ctx = AgentContext::new(ConversationId::from("c1"), UserId::from("u1"), FlowId::from("f1"), "add a node");
        ctx.visited_agents.insert(AgentId::from("builder"));
        let intent = Intent { intent_type: IntentType::AddNode, confidence: 1.0, understanding: String::new(), entities: HashMap::new() };
        assert_eq!(router.route(&intent, &ctx), Some(AgentId::from("validator")));
    }

    #[test]
    fn router_stops_once_iterations_are_exhausted() {
        let router = RouterEngine::new();
        let mut ctx = AgentContext::new(ConversationId::from("c1"), UserId::from("u1"), FlowId::from("f1"), "add a node");
        ctx.iteration = ctx.max_iterations;
        let intent = Intent { intent_type: IntentType::AddNode, confidence: 1.0, understanding: String::new(), entities: HashMap::new() };
        assert_eq!(router.route(&intent, &ctx), None);
    }

    #[tokio::test]
    async fn add_node_tool_proposes_a_pending_change_without_mutating_definition() {
        let tool = AddNodeTool;
        let mut draft = WorkingFlowDraft::default();
        let result = tool.execute(serde_json::json!({ "type": "httpRequest", "label": "Call API" }), &mut draft).await.unwrap();
        assert!(result.success);
        assert!(draft.definition.nodes.is_empty());
        assert_eq!(draft.pending_changes.len(), 1);
    }

    #[tokio::test]
    async fn validate_flow_tool_flags_unregistered_node_type() {
        let tool = ValidateFlowTool::new(registry_with_builtins());
        let mut draft = WorkingFlowDraft::from_definition(crate::models::FlowDefinition {
            nodes: vec![NodeDefinition {
                id: NodeId::from("n1"),
                node_type: Some("totallyUnknownType".to_string()),
                position: (0.0, 0.0),
                data: NodeData { label: "n1".to_string(), config: Value::Null, credential_id: None },
            }],
            edges: vec![],
        });
        let result = tool.execute(Value::Null, &mut draft).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn supervisor_runs_a_builder_turn_end_to_end() {
        let registry = registry_with_builtins();
        let agents = Arc::new(AgentRegistry::new());
        agents.register(Arc::new(DiscoveryAgent::new(registry.clone())));
        agents.register(Arc::new(BuilderAgent::new()));
        agents.register(Arc::new(ValidatorAgent::new(registry)));

        let supervisor = Supervisor::new(agents, Arc::new(RuleBasedIntentAnalyzer));
        let mut ctx = AgentContext::new(ConversationId::from("c1"), UserId::from("u1"), FlowId::from("f1"), "build a flow that sends an email");

        let events = supervisor.run_turn(&mut ctx).await.unwrap();
        assert!(matches!(events.last(), Some(AgentStreamEvent::Done)));
        assert!(ctx.visited_agents.contains(&AgentId::from("discovery")));
    }
}
