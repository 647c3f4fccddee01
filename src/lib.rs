// n3n - Flow Execution Engine
// A DAG-based workflow automation engine with AI-assisted flow authoring

//! # n3n
//!
//! Library root for the flow execution engine. A `Flow` is a directed
//! acyclic graph of nodes; a `FlowVersion` is a snapshot of that graph that
//! can be triggered, producing an `Execution`. Six components cooperate to
//! make that happen:
//!
//! - the node handler registry (`engine::registry`)
//! - the expression evaluator and credential resolver (`engine::expression`, `engine::credentials`)
//! - the DAG parser and validator (`engine::dag`)
//! - the execution engine (`engine::execution`)
//! - the plugin container orchestrator (`engine::orchestrator`)
//! - the AI multi-agent flow builder (`engine::agents`)

pub mod engine;
pub mod llm;
pub mod models;

pub use models::{
    Execution, ExecutionId, ExecutionStatus, Flow, FlowDefinition, FlowId, FlowVersion, NodeId,
    UserId, VersionId,
};

pub use engine::{
    ContainerOrchestrator, CredentialResolver, ExecutionEngine, ExecutionEventBus,
    ExpressionEvaluator, FlowStorage, HandlerRegistry, InMemoryFlowStorage,
};

use thiserror::Error;

/// Error type shared across the engine.
///
/// A flat enum of domain errors plus `#[from]` conversions for the
/// infrastructure errors that cross the boundary most often (JSON, generic
/// storage, config), so call sites can use `?` without manual mapping.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("handler error: {0}")]
    HandlerError(String),

    #[error("transient error, retry: {0}")]
    Transient(String),

    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}

/// Type alias for Results that use [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;
