// Node Handler Registry (C1)
//
// A process-wide, read-mostly map of node type -> handler, backed by
// `dashmap` for concurrent in-memory lookups. A handful of built-in
// handlers ship so the engine is runnable without any plugin container
// installed.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::models::{HandlerInfo, NodeCategory, NodeExecutionContext, NodeExecutionResult};
use crate::{EngineError, Result};

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[async_trait]
pub trait Handler: Send + Sync {
    fn info(&self) -> HandlerInfo;

    async fn execute(&self, ctx: NodeExecutionContext) -> Result<NodeExecutionResult>;

    fn validate_config(&self, _config: &Value) -> ValidationResult {
        ValidationResult { valid: true, errors: vec![] }
    }
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, std::sync::Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry::default()
    }

    /// Populates the registry with the built-in handlers that ship
    /// in-process, so the engine is testable without a container runtime.
    pub fn with_builtins() -> Self {
        let registry = HandlerRegistry::new();
        registry.register(std::sync::Arc::new(NoopHandler)).expect("builtin registration");
        registry.register(std::sync::Arc::new(ManualTriggerHandler)).expect("builtin registration");
        registry.register(std::sync::Arc::new(IfHandler)).expect("builtin registration");
        registry.register(std::sync::Arc::new(SetHandler)).expect("builtin registration");
        registry
    }

    pub fn register(&self, handler: std::sync::Arc<dyn Handler>) -> Result<()> {
        let info = handler.info();
        if self.handlers.contains_key(&info.node_type) {
            return Err(EngineError::Fatal(format!(
                "duplicate handler registration for node type {}",
                info.node_type
            )));
        }
        self.handlers.insert(info.node_type.clone(), handler);
        Ok(())
    }

    /// Plugin containers replace a prior handler for the same type on
    /// reinstall; unlike static registration this is allowed to overwrite.
    pub fn register_dynamic(&self, handler: std::sync::Arc<dyn Handler>) {
        let info = handler.info();
        self.handlers.insert(info.node_type, handler);
    }

    pub fn find_handler(&self, node_type: &str) -> Option<std::sync::Arc<dyn Handler>> {
        self.handlers.get(node_type).map(|h| h.clone())
    }

    pub fn has_handler(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }

    pub fn list_handler_info(&self) -> Vec<HandlerInfo> {
        self.handlers.iter().map(|h| h.info()).collect()
    }

    pub fn handlers_by_category(&self, category: &NodeCategory) -> Vec<HandlerInfo> {
        self.handlers
            .iter()
            .map(|h| h.info())
            .filter(|info| &info.category == category)
            .collect()
    }

    pub fn trigger_handlers(&self) -> Vec<HandlerInfo> {
        self.handlers.iter().map(|h| h.info()).filter(|info| info.is_trigger).collect()
    }
}

struct NoopHandler;

#[async_trait]
impl Handler for NoopHandler {
    fn info(&self) -> HandlerInfo {
        HandlerInfo {
            node_type: "noop".to_string(),
            display_name: "No Operation".to_string(),
            description: "Passes its input through unchanged".to_string(),
            category: NodeCategory::FlowControl,
            icon: "circle".to_string(),
            is_trigger: false,
            supports_async: false,
            config_schema: Value::Null,
        }
    }

    async fn execute(&self, ctx: NodeExecutionContext) -> Result<NodeExecutionResult> {
        Ok(NodeExecutionResult::success(ctx.input, 0))
    }
}

struct ManualTriggerHandler;

#[async_trait]
impl Handler for ManualTriggerHandler {
    fn info(&self) -> HandlerInfo {
        HandlerInfo {
            node_type: "manualTrigger".to_string(),
            display_name: "Manual Trigger".to_string(),
            description: "Starts an execution when launched by a user".to_string(),
            category: NodeCategory::Triggers,
            icon: "play".to_string(),
            is_trigger: true,
            supports_async: false,
            config_schema: Value::Null,
        }
    }

    async fn execute(&self, ctx: NodeExecutionContext) -> Result<NodeExecutionResult> {
        let mut output = HashMap::new();
        output.insert("json".to_string(), ctx.global_context.clone());
        Ok(NodeExecutionResult::success(output, 0))
    }
}

struct IfHandler;

#[async_trait]
impl Handler for IfHandler {
    fn info(&self) -> HandlerInfo {
        HandlerInfo {
            node_type: "if".to_string(),
            display_name: "If".to_string(),
            description: "Routes execution down a true or false branch".to_string(),
            category: NodeCategory::FlowControl,
            icon: "fork".to_string(),
            is_trigger: false,
            supports_async: false,
            config_schema: Value::Null,
        }
    }

    async fn execute(&self, ctx: NodeExecutionContext) -> Result<NodeExecutionResult> {
        let condition = ctx.config.get("condition").and_then(Value::as_bool).unwrap_or(false);
        let mut result = NodeExecutionResult::success(ctx.input, 0);
        result.branches_to_follow = Some(vec![if condition { "true" } else { "false" }.to_string()]);
        Ok(result)
    }
}

struct SetHandler;

#[async_trait]
impl Handler for SetHandler {
    fn info(&self) -> HandlerInfo {
        HandlerInfo {
            node_type: "set".to_string(),
            display_name: "Set".to_string(),
            description: "Merges static values into the current item".to_string(),
            category: NodeCategory::DataTransform,
            icon: "pencil".to_string(),
            is_trigger: false,
            supports_async: false,
            config_schema: Value::Null,
        }
    }

    async fn execute(&self, ctx: NodeExecutionContext) -> Result<NodeExecutionResult> {
        let mut output = ctx.input.clone();
        if let Some(values) = ctx.config.get("values").and_then(Value::as_object) {
            for (key, value) in values {
                output.insert(key.clone(), value.clone());
            }
        }
        Ok(NodeExecutionResult::success(output, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExecutionId, FlowId, NodeId, UserId, VersionId};

    fn ctx(config: Value) -> NodeExecutionContext {
        NodeExecutionContext {
            execution_id: ExecutionId::from("e1"),
            node_id: NodeId::from("n1"),
            flow_id: FlowId::from("f1"),
            version_id: VersionId::from("v1"),
            user_id: UserId::from("u1"),
            config,
            input: HashMap::new(),
            global_context: Value::Null,
            previous_outputs: HashMap::new(),
        }
    }

    #[test]
    fn builtins_register_without_collision() {
        let registry = HandlerRegistry::with_builtins();
        assert!(registry.has_handler("noop"));
        assert!(registry.has_handler("manualTrigger"));
        assert_eq!(registry.trigger_handlers().len(), 1);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = HandlerRegistry::with_builtins();
        let err = registry.register(std::sync::Arc::new(NoopHandler));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn if_handler_selects_branch_from_condition() {
        let handler = IfHandler;
        let result = handler.execute(ctx(serde_json::json!({"condition": true}))).await.unwrap();
        assert_eq!(result.branches_to_follow, Some(vec!["true".to_string()]));
    }

    #[tokio::test]
    async fn set_handler_merges_values_into_input() {
        let handler = SetHandler;
        let result = handler.execute(ctx(serde_json::json!({"values": {"x": 1}}))).await.unwrap();
        assert_eq!(result.output.get("x"), Some(&Value::from(1)));
    }
}
