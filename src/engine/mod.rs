// Flow execution engine
//
// Six components, leaves-first: the Node Handler Registry and Expression
// Evaluator/Credential Resolver are pure lookups; the DAG validator turns a
// flow definition into an execution order; the Execution Engine schedules
// nodes against that order; the Container Orchestrator backs dynamic
// (plugin) handlers; the Agent/Supervisor stack is an orthogonal surface
// that mutates a flow draft rather than executing one.

pub mod agents;
pub mod conversation;
pub mod credentials;
pub mod dag;
pub mod events;
pub mod execution;
pub mod expression;
pub mod orchestrator;
pub mod rate_limit;
pub mod registry;
pub mod session;
pub mod storage;

pub use agents::{Agent, AgentRegistry, RouterEngine, Supervisor};
pub use conversation::ConversationSummarizer;
pub use credentials::{CredentialResolver, CredentialStore};
pub use dag::{parse, ParseResult};
pub use events::ExecutionEventBus;
pub use execution::ExecutionEngine;
pub use expression::ExpressionEvaluator;
pub use orchestrator::{ContainerOrchestrator, DockerOrchestrator, KubernetesOrchestrator};
pub use rate_limit::AiRateLimiter;
pub use registry::{Handler, HandlerRegistry};
pub use session::SessionIsolator;
pub use storage::{FlowStorage, InMemoryFlowStorage};
