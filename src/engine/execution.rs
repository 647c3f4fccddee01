// Execution Engine (C4)
//
// Schedules a validated DAG: nodes enter a ready-set when every predecessor
// has reached a terminal state, independent branches run concurrently up to
// a configured cap, and every scheduling decision is published on the
// execution event bus. The indegree bookkeeping is the runtime twin of
// `dag::parse`'s topological sort - it drives a live ready-set instead of a
// static order, because a conditional node's `branches_to_follow` is only
// known once it has actually executed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::credentials::CredentialResolver;
use crate::engine::dag;
use crate::engine::events::ExecutionEventBus;
use crate::engine::expression::ExpressionEvaluator;
use crate::engine::registry::HandlerRegistry;
use crate::engine::storage::FlowStorage;
use crate::models::{
    Execution, ExecutionId, ExecutionStatus, FlowId, NodeExecutionContext, NodeExecutionState,
    NodeId, NodeState, ResumeCondition, UserId, VersionId,
};
use crate::{EngineError, Result};

pub struct ExecutionEngine {
    registry: Arc<HandlerRegistry>,
    evaluator: Arc<ExpressionEvaluator>,
    credentials: Option<Arc<CredentialResolver>>,
    events: Arc<ExecutionEventBus>,
    storage: Arc<dyn FlowStorage>,
    concurrency: usize,
    cancellations: dashmap::DashMap<String, CancellationToken>,
}

impl ExecutionEngine {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        evaluator: Arc<ExpressionEvaluator>,
        credentials: Option<Arc<CredentialResolver>>,
        events: Arc<ExecutionEventBus>,
        storage: Arc<dyn FlowStorage>,
        concurrency: usize,
    ) -> Self {
        ExecutionEngine {
            registry,
            evaluator,
            credentials,
            events,
            storage,
            concurrency: concurrency.max(1),
            cancellations: dashmap::DashMap::new(),
        }
    }

    /// Triggers and runs a flow version to completion (or to its first
    /// pause point). Returns once the execution reaches a terminal or
    /// `Waiting` state.
    pub async fn trigger(
        &self,
        flow_id: FlowId,
        version_id: VersionId,
        user_id: UserId,
        payload: Value,
    ) -> Result<Execution> {
        let version = self
            .storage
            .get_version(&version_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("flow version {}", version_id)))?;

        let parsed = dag::parse(&version.definition);
        if !parsed.valid {
            return Err(EngineError::Validation(parsed.errors.join("; ")));
        }

        let mut execution = Execution::new(flow_id, version_id.clone(), user_id, payload);
        for node in &version.definition.nodes {
            execution
                .node_states
                .insert(node.id.clone(), NodeExecutionState::pending(node.id.clone()));
        }
        execution.status = ExecutionStatus::Running;
        execution = self.storage.create_execution(execution).await?;

        let token = CancellationToken::new();
        self.cancellations.insert(execution.id.as_str().to_string(), token.clone());

        self.events.emit_execution_started(&execution.id).await?;

        self.run_scheduler(execution, &version, &parsed, token).await
    }

    /// Resumes a `Waiting` execution whose paused node's `resume_condition`
    /// matches. Only defined for `Waiting` executions; resuming a terminal
    /// execution is rejected.
    pub async fn resume(&self, execution_id: &ExecutionId, resume_payload: Value) -> Result<Execution> {
        let mut execution = self
            .storage
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("execution {}", execution_id)))?;

        if execution.status != ExecutionStatus::Waiting {
            return Err(EngineError::Validation(format!(
                "execution {} is not waiting for resume (status: {:?})",
                execution_id, execution.status
            )));
        }

        let version = self
            .storage
            .get_version(&execution.version_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("flow version {}", execution.version_id)))?;
        let parsed = dag::parse(&version.definition);

        let paused_node = execution
            .node_states
            .values()
            .find(|s| s.state == NodeState::Paused)
            .map(|s| s.node_id.clone())
            .ok_or_else(|| EngineError::Internal("waiting execution has no paused node".to_string()))?;

        let state = execution.node_states.get_mut(&paused_node).unwrap();
        state.state = NodeState::Completed;
        state.output = Some(resume_payload);
        state.completed_at = Some(chrono::Utc::now());
        state.resume_condition = None;

        execution.status = ExecutionStatus::Running;
        self.events.emit_execution_resumed(&execution.id).await?;

        let token = self
            .cancellations
            .get(execution.id.as_str())
            .map(|t| t.clone())
            .unwrap_or_else(CancellationToken::new);

        self.run_scheduler(execution, &version, &parsed, token).await
    }

    pub async fn cancel(&self, execution_id: &ExecutionId) -> Result<()> {
        if let Some(token) = self.cancellations.get(execution_id.as_str()) {
            token.cancel();
        }
        if let Some(mut execution) = self.storage.get_execution(execution_id).await? {
            if !execution.is_terminal() {
                for state in execution.node_states.values_mut() {
                    if !matches!(state.state, NodeState::Completed | NodeState::Failed | NodeState::Skipped) {
                        state.state = NodeState::Failed;
                    }
                }
                execution.status = ExecutionStatus::Cancelled;
                self.storage.update_execution(execution).await?;
            }
        }
        self.events.emit_execution_cancelled(execution_id).await
    }

    async fn run_scheduler(
        &self,
        mut execution: Execution,
        version: &crate::models::FlowVersion,
        parsed: &dag::ParseResult,
        token: CancellationToken,
    ) -> Result<Execution> {
        let definition = &version.definition;
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut indegree: HashMap<NodeId, usize> = definition
            .nodes
            .iter()
            .map(|n| (n.id.clone(), parsed.dependencies.get(&n.id).map(Vec::len).unwrap_or(0)))
            .collect();
        // Tracks, per node, how many inbound edges actually ran (as opposed
        // to being resolved by a skip). A node whose indegree reaches zero
        // without ever receiving a live edge has no path that can still
        // reach it and is skipped rather than scheduled.
        let mut live: HashMap<NodeId, usize> = definition.nodes.iter().map(|n| (n.id.clone(), 0)).collect();

        // Resolve indegree for predecessors already completed/skipped on resume.
        for edge in &definition.edges {
            if let Some(src_state) = execution.node_states.get(&edge.source) {
                match src_state.state {
                    NodeState::Completed => {
                        if let Some(deg) = indegree.get_mut(&edge.target) {
                            *deg = deg.saturating_sub(1);
                        }
                        *live.entry(edge.target.clone()).or_insert(0) += 1;
                    }
                    NodeState::Skipped => {
                        if let Some(deg) = indegree.get_mut(&edge.target) {
                            *deg = deg.saturating_sub(1);
                        }
                    }
                    _ => {}
                }
            }
        }

        let mut ready: HashSet<NodeId> = indegree
            .iter()
            .filter(|(id, &deg)| {
                deg == 0
                    && execution
                        .node_states
                        .get(*id)
                        .map(|s| s.state == NodeState::Pending)
                        .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut in_flight = FuturesUnordered::new();
        let mut failed = false;

        loop {
            if token.is_cancelled() {
                execution.status = ExecutionStatus::Cancelled;
                break;
            }

            for node_id in ready.drain().collect::<Vec<_>>() {
                let state = execution.node_states.get_mut(&node_id).unwrap();
                state.state = NodeState::Running;
                state.started_at = Some(chrono::Utc::now());

                let node = definition.node(&node_id).unwrap().clone();
                let pinned = version.pinned_data.get(&node_id).cloned();

                let ctx = self.build_context(&execution, &node, definition);
                let registry = self.registry.clone();
                let evaluator = self.evaluator.clone();
                let events = self.events.clone();
                let execution_id = execution.id.clone();
                let permit = semaphore.clone();

                self.events.emit_node_started(&execution_id, &node_id).await?;

                in_flight.push(Box::pin(async move {
                    let _permit = permit.acquire_owned().await;
                    if let Some(pinned_output) = pinned {
                        return (node_id, Ok(node_success_from_value(pinned_output)));
                    }

                    let config = evaluator.evaluate_config(&node.data.config, &ctx);
                    let mut ctx = ctx;
                    ctx.config = config;

                    let outcome = match node.node_type.as_deref().and_then(|t| registry.find_handler(t)) {
                        Some(handler) => handler.execute(ctx).await,
                        None => Err(EngineError::Validation(format!(
                            "no handler registered for node type on node {}",
                            node_id
                        ))),
                    };

                    if let Ok(result) = &outcome {
                        let _ = events.emit_node_completed(&execution_id, &node_id, serde_json::to_value(&result.output).unwrap_or(Value::Null)).await;
                    }

                    (node_id, outcome)
                }));
            }

            if in_flight.is_empty() {
                break;
            }

            let (node_id, outcome) = match in_flight.next().await {
                Some(v) => v,
                None => break,
            };

            match outcome {
                Ok(result) if result.pause_requested => {
                    let state = execution.node_states.get_mut(&node_id).unwrap();
                    state.state = NodeState::Paused;
                    state.resume_condition = result.resume_condition.map(|payload| ResumeCondition {
                        condition_type: "paused".to_string(),
                        payload,
                    });
                    execution.status = ExecutionStatus::Waiting;
                    self.events.emit_execution_paused(&execution.id, &node_id).await?;
                    self.storage.update_execution(execution.clone()).await?;
                    return Ok(execution);
                }
                Ok(result) if result.success => {
                    let output_value = serde_json::to_value(&result.output).unwrap_or(Value::Null);
                    let state = execution.node_states.get_mut(&node_id).unwrap();
                    state.state = NodeState::Completed;
                    state.output = Some(output_value);
                    state.completed_at = Some(chrono::Utc::now());

                    self.propagate(
                        &node_id,
                        &result.branches_to_follow,
                        definition,
                        &mut execution,
                        &mut indegree,
                        &mut live,
                        &mut ready,
                    )
                    .await?;
                }
                Ok(result) => {
                    let state = execution.node_states.get_mut(&node_id).unwrap();
                    state.state = NodeState::Failed;
                    state.error = result.error.clone();
                    warn!(node = %node_id, error = ?result.error, "node failed");
                    self.events.emit_node_failed(&execution.id, &node_id, result.error.as_deref().unwrap_or("unknown error")).await?;

                    let version = self.storage.get_version(&execution.version_id).await?;
                    let continue_on_error = version.map(|v| v.continue_on_error(&node_id)).unwrap_or(false);
                    if continue_on_error {
                        self.skip_downstream(&node_id, definition, &mut execution).await?;
                    } else {
                        failed = true;
                        execution.error = result.error;
                    }
                }
                Err(err) => {
                    let state = execution.node_states.get_mut(&node_id).unwrap();
                    state.state = NodeState::Failed;
                    state.error = Some(err.to_string());
                    self.events.emit_node_failed(&execution.id, &node_id, &err.to_string()).await?;
                    failed = true;
                    execution.error = Some(err.to_string());
                }
            }

            if failed {
                break;
            }
        }

        execution.status = if execution.status == ExecutionStatus::Cancelled {
            ExecutionStatus::Cancelled
        } else if failed || execution.node_states.values().any(|s| s.state == NodeState::Failed) {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };
        execution.completed_at = Some(chrono::Utc::now());

        match execution.status {
            ExecutionStatus::Completed => {
                self.events.emit_execution_completed(&execution.id, execution.output.clone()).await?;
            }
            ExecutionStatus::Failed => {
                self.events
                    .emit_execution_failed(&execution.id, execution.error.as_deref().unwrap_or("unknown error"))
                    .await?;
            }
            _ => {}
        }

        self.storage.update_execution(execution.clone()).await?;
        Ok(execution)
    }

    fn build_context(
        &self,
        execution: &Execution,
        node: &crate::models::NodeDefinition,
        definition: &crate::models::FlowDefinition,
    ) -> NodeExecutionContext {
        let mut previous_outputs = HashMap::new();
        for edge in definition.incoming_edges(&node.id) {
            if let Some(state) = execution.node_states.get(&edge.source) {
                if let Some(output) = &state.output {
                    previous_outputs.insert(edge.source.clone(), output.clone());
                }
            }
        }

        let input = previous_outputs
            .values()
            .next()
            .and_then(|v| v.as_object())
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        NodeExecutionContext {
            execution_id: execution.id.clone(),
            node_id: node.id.clone(),
            flow_id: execution.flow_id.clone(),
            version_id: execution.version_id.clone(),
            user_id: execution.user_id.clone(),
            config: node.data.config.clone(),
            input,
            global_context: execution.trigger_payload.clone(),
            previous_outputs,
        }
    }

    /// Resolves a completed node's outgoing edges. A selected edge both
    /// drops the target's indegree and marks it `live`; an edge on a branch
    /// that was not taken drops the indegree without marking it live. Once a
    /// target's indegree reaches zero, it is scheduled if it ever received a
    /// live edge, and skipped (transitively, since it never runs) otherwise -
    /// this is how a downstream node behind an `if` node's untaken branch
    /// gets marked `Skipped` instead of being stuck `Pending` forever.
    async fn propagate(
        &self,
        node_id: &NodeId,
        branches_to_follow: &Option<Vec<String>>,
        definition: &crate::models::FlowDefinition,
        execution: &mut Execution,
        indegree: &mut HashMap<NodeId, usize>,
        live: &mut HashMap<NodeId, usize>,
        ready: &mut HashSet<NodeId>,
    ) -> Result<()> {
        let mut skip_queue: Vec<NodeId> = Vec::new();

        for edge in definition.outgoing_edges(node_id) {
            let edge_selected = match (branches_to_follow, &edge.source_handle) {
                (Some(branches), Some(handle)) => branches.contains(handle),
                (Some(_), None) => false,
                (None, _) => true,
            };

            Self::resolve_inbound_edge(&edge.target, edge_selected, execution, indegree, live, ready, &mut skip_queue);
        }

        while let Some(skipped_id) = skip_queue.pop() {
            let was_pending = execution
                .node_states
                .get(&skipped_id)
                .map(|s| s.state == NodeState::Pending)
                .unwrap_or(false);
            if !was_pending {
                continue;
            }
            if let Some(state) = execution.node_states.get_mut(&skipped_id) {
                state.state = NodeState::Skipped;
            }
            self.events.emit_node_skipped(&execution.id, &skipped_id).await?;

            for edge in definition.outgoing_edges(&skipped_id) {
                Self::resolve_inbound_edge(&edge.target, false, execution, indegree, live, ready, &mut skip_queue);
            }
        }

        Ok(())
    }

    fn resolve_inbound_edge(
        target: &NodeId,
        edge_live: bool,
        execution: &Execution,
        indegree: &mut HashMap<NodeId, usize>,
        live: &mut HashMap<NodeId, usize>,
        ready: &mut HashSet<NodeId>,
        skip_queue: &mut Vec<NodeId>,
    ) {
        if edge_live {
            *live.entry(target.clone()).or_insert(0) += 1;
        }

        let deg = match indegree.get_mut(target) {
            Some(deg) => deg,
            None => return,
        };
        *deg = deg.saturating_sub(1);
        if *deg != 0 {
            return;
        }

        let is_pending = execution
            .node_states
            .get(target)
            .map(|s| s.state == NodeState::Pending)
            .unwrap_or(false);
        if !is_pending {
            return;
        }

        if live.get(target).copied().unwrap_or(0) > 0 {
            ready.insert(target.clone());
        } else {
            skip_queue.push(target.clone());
        }
    }

    async fn skip_downstream(
        &self,
        node_id: &NodeId,
        definition: &crate::models::FlowDefinition,
        execution: &mut Execution,
    ) -> Result<()> {
        let mut stack = vec![node_id.clone()];
        let mut visited = HashSet::new();
        while let Some(current) = stack.pop() {
            for edge in definition.outgoing_edges(&current) {
                if visited.insert(edge.target.clone()) {
                    if let Some(state) = execution.node_states.get_mut(&edge.target) {
                        if state.state == NodeState::Pending {
                            state.state = NodeState::Skipped;
                            self.events.emit_node_skipped(&execution.id, &edge.target).await?;
                        }
                    }
                    stack.push(edge.target.clone());
                }
            }
        }
        info!(node = %node_id, "propagated skip downstream after continue-on-error");
        Ok(())
    }
}

fn node_success_from_value(value: Value) -> crate::models::NodeExecutionResult {
    let output = value
        .as_object()
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    crate::models::NodeExecutionResult::success(output, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::registry::HandlerRegistry;
    use crate::engine::storage::InMemoryFlowStorage;
    use crate::models::{EdgeDefinition, EdgeId, Flow, FlowDefinition, FlowVersion, NodeData, NodeDefinition};
    use serde_json::json;

    fn node(id: &str, node_type: &str, config: Value) -> NodeDefinition {
        NodeDefinition {
            id: NodeId::from(id),
            node_type: Some(node_type.to_string()),
            position: (0.0, 0.0),
            data: NodeData {
                label: id.to_string(),
                config,
                credential_id: None,
            },
        }
    }

    fn edge(id: &str, source: &str, target: &str, source_handle: Option<&str>) -> EdgeDefinition {
        EdgeDefinition {
            id: EdgeId::from(id),
            source: NodeId::from(source),
            target: NodeId::from(target),
            source_handle: source_handle.map(|s| s.to_string()),
            target_handle: None,
        }
    }

    /// `start -> if`, with `if`'s "true" branch going to `a` and its "false"
    /// branch going to `b`; both `a` and `b` feed into `join`, whose only
    /// other inbound edge does not exist - `join` depends solely on the
    /// untaken branch.
    fn diamond_behind_if(condition: bool) -> FlowDefinition {
        FlowDefinition {
            nodes: vec![
                node("start", "manualTrigger", Value::Null),
                node("if", "if", json!({ "condition": condition })),
                node("a", "set", json!({ "values": { "branch": "a" } })),
                node("b", "set", json!({ "values": { "branch": "b" } })),
                node("join", "set", json!({ "values": { "joined": true } })),
            ],
            edges: vec![
                edge("e0", "start", "if", None),
                edge("e1", "if", "a", Some("true")),
                edge("e2", "if", "b", Some("false")),
                edge("e3", "a", "join", None),
                edge("e4", "b", "join", None),
            ],
        }
    }

    async fn engine_with_storage() -> (ExecutionEngine, std::sync::Arc<dyn FlowStorage>) {
        let storage: Arc<dyn FlowStorage> = Arc::new(InMemoryFlowStorage::default());
        let engine = ExecutionEngine::new(
            Arc::new(HandlerRegistry::with_builtins()),
            Arc::new(ExpressionEvaluator::new()),
            None,
            Arc::new(ExecutionEventBus::new()),
            storage.clone(),
            4,
        );
        (engine, storage)
    }

    #[tokio::test]
    async fn branch_not_taken_skips_join_node_reachable_only_through_it() {
        let (engine, storage) = engine_with_storage().await;

        let user_id = UserId::from("u1");
        let flow = Flow::new(FlowId::from("f1"), "diamond", user_id.clone());
        storage.create_flow(flow.clone()).await.unwrap();
        let version = storage
            .create_version(FlowVersion::new(VersionId::from("v1"), flow.id.clone(), "1", diamond_behind_if(true)))
            .await
            .unwrap();

        let execution = engine
            .trigger(flow.id, version.id, user_id, Value::Null)
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.node_states.get(&NodeId::from("a")).unwrap().state, NodeState::Completed);
        assert_eq!(execution.node_states.get(&NodeId::from("b")).unwrap().state, NodeState::Skipped);
        assert_eq!(execution.node_states.get(&NodeId::from("join")).unwrap().state, NodeState::Completed);
    }

    #[tokio::test]
    async fn pinned_data_short_circuits_the_handler() {
        let (engine, storage) = engine_with_storage().await;

        let user_id = UserId::from("u1");
        let flow = Flow::new(FlowId::from("f2"), "pinned", user_id.clone());
        storage.create_flow(flow.clone()).await.unwrap();

        let definition = FlowDefinition {
            nodes: vec![node("start", "manualTrigger", Value::Null)],
            edges: vec![],
        };
        let mut version = FlowVersion::new(VersionId::from("v2"), flow.id.clone(), "1", definition);
        version.pinned_data.insert(NodeId::from("start"), json!({ "pinned": true }));
        let version = storage.create_version(version).await.unwrap();

        let execution = engine
            .trigger(flow.id, version.id, user_id, Value::Null)
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Completed);
        let output = execution.node_states.get(&NodeId::from("start")).unwrap().output.clone().unwrap();
        assert_eq!(output.get("pinned"), Some(&Value::Bool(true)));
    }
}
