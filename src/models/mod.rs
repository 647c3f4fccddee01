// Core domain models for the flow execution engine
// Generic, language-agnostic data structures shared by every engine component

//! # Domain Models
//!
//! Models are split by concern: identifiers (`ids`), the flow graph itself
//! (`flow`), per-node execution contracts (`node`), run-time execution state
//! (`execution`), container orchestration (`container`), the AI flow builder
//! (`agent`, `conversation`), and process configuration (`config`).

pub mod agent;
pub mod config;
pub mod container;
pub mod conversation;
pub mod execution;
pub mod flow;
pub mod ids;
pub mod node;

pub use agent::{
    AgentContext, AgentResult, AgentStreamEvent, Intent, IntentType, PendingChange,
    PendingChangeKind, ToolResult, WorkingFlowDraft,
};
pub use config::EngineConfig;
pub use container::{
    BackoffStrategy, ContainerConfig, ContainerInfo, ContainerMount, ContainerState,
    ContainerStatus, ResourceLimits, RetryCondition, RetryConfig,
};
pub use conversation::{Conversation, ConversationMessage, MessageRole};
pub use execution::{
    Execution, ExecutionEvent, ExecutionEventType, ExecutionStatus, NodeExecutionState,
    NodeState, ResumeCondition,
};
pub use flow::{
    EdgeDefinition, Flow, FlowDefinition, FlowVersion, NodeData, NodeDefinition, Visibility,
    VersionStatus,
};
pub use ids::{
    AgentId, ConversationId, EdgeId, ExecutionId, FlowId, NodeId, SessionId, UserId, VersionId,
};
pub use node::{HandlerInfo, NodeCategory, NodeExecutionContext, NodeExecutionResult};
