// n3n engine runner
//
// Boots the registries, storage, and execution engine, then triggers one
// flow from a JSON file and prints the resulting execution. Exists to
// exercise the core end-to-end locally; the real control plane is not a
// CLI.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use n3n::engine::{ExecutionEngine, ExecutionEventBus, ExpressionEvaluator, FlowStorage, HandlerRegistry, InMemoryFlowStorage};
use n3n::models::{EngineConfig, Flow, FlowVersion, UserId, VersionId};

#[derive(Parser)]
#[command(name = "n3n-engine")]
#[command(about = "Runs a flow definition to completion against an in-process engine")]
struct Cli {
    /// Path to a JSON file containing a `FlowDefinition`
    flow_file: String,

    /// JSON trigger payload; defaults to `{}`
    #[arg(long, default_value = "{}")]
    payload: String,

    /// User id to attribute the execution to
    #[arg(long, default_value = "local-user")]
    user_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenv::dotenv() {
        eprintln!("no .env file loaded: {}", e);
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = EngineConfig::load().unwrap_or_else(|e| {
        error!(error = %e, "falling back to default configuration");
        EngineConfig::default()
    });

    let definition_json = std::fs::read_to_string(&cli.flow_file)?;
    let definition: n3n::models::FlowDefinition = serde_json::from_str(&definition_json)?;
    let payload: serde_json::Value = serde_json::from_str(&cli.payload)?;

    let registry = Arc::new(HandlerRegistry::with_builtins());
    let evaluator = Arc::new(ExpressionEvaluator::new());
    let events = Arc::new(ExecutionEventBus::new());
    let storage: Arc<dyn FlowStorage> = Arc::new(InMemoryFlowStorage::default());

    let user_id = UserId::from(cli.user_id);
    let flow = Flow::new(n3n::models::FlowId::from("local"), "local flow", user_id.clone());
    storage.create_flow(flow.clone()).await?;

    let version = FlowVersion::new(VersionId::from("local-v1"), flow.id.clone(), "1", definition);
    let version = storage.create_version(version).await?;

    info!(concurrency = config.execution_concurrency, "starting engine");
    let engine = ExecutionEngine::new(registry, evaluator, None, events, storage, config.execution_concurrency);

    let execution = engine.trigger(flow.id, version.id, user_id, payload).await?;
    info!(status = ?execution.status, execution_id = %execution.id, "execution finished");
    println!("{}", serde_json::to_string_pretty(&execution)?);

    Ok(())
}
