// n3n-ctl - small CLI for inspecting and controlling flow executions
//
// Talks to an in-process engine handle built from the same in-memory
// storage/registry an `n3n-engine` run would use; this is not a client for
// a remote control plane, just a way to exercise the engine's operations
// (trigger, resume, cancel) from the command line.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use n3n::engine::{ExecutionEngine, ExecutionEventBus, ExpressionEvaluator, FlowStorage, HandlerRegistry, InMemoryFlowStorage};
use n3n::models::{EngineConfig, Flow, FlowVersion, UserId, VersionId};

#[derive(Parser)]
#[command(name = "n3n-ctl")]
#[command(about = "Inspect and control flow executions against an in-process engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger a flow definition loaded from a JSON file
    Trigger {
        flow_file: String,
        #[arg(long, default_value = "{}")]
        payload: String,
    },

    /// Resume a previously triggered execution with a JSON resume payload
    Resume {
        execution_id: String,
        #[arg(long, default_value = "{}")]
        payload: String,
    },

    /// Cancel a running execution
    Cancel { execution_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenv::dotenv() {
        eprintln!("no .env file loaded: {}", e);
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = EngineConfig::load().unwrap_or_default();

    let registry = Arc::new(HandlerRegistry::with_builtins());
    let evaluator = Arc::new(ExpressionEvaluator::new());
    let events = Arc::new(ExecutionEventBus::new());
    let storage: Arc<dyn FlowStorage> = Arc::new(InMemoryFlowStorage::default());
    let engine = ExecutionEngine::new(
        registry,
        evaluator,
        None,
        events,
        storage.clone(),
        config.execution_concurrency,
    );

    match cli.command {
        Commands::Trigger { flow_file, payload } => {
            let definition: n3n::models::FlowDefinition = serde_json::from_str(&std::fs::read_to_string(flow_file)?)?;
            let payload: serde_json::Value = serde_json::from_str(&payload)?;

            let user_id = UserId::from("ctl-user");
            let flow = Flow::new(n3n::models::FlowId::from("ctl"), "ctl flow", user_id.clone());
            storage.create_flow(flow.clone()).await?;
            let version = storage
                .create_version(FlowVersion::new(VersionId::from("ctl-v1"), flow.id.clone(), "1", definition))
                .await?;

            let execution = engine.trigger(flow.id, version.id, user_id, payload).await?;
            info!(status = ?execution.status, "triggered");
            println!("{}", serde_json::to_string_pretty(&execution)?);
        }
        Commands::Resume { execution_id, payload } => {
            let payload: serde_json::Value = serde_json::from_str(&payload)?;
            let execution = engine
                .resume(&n3n::models::ExecutionId::from(execution_id), payload)
                .await?;
            println!("{}", serde_json::to_string_pretty(&execution)?);
        }
        Commands::Cancel { execution_id } => {
            engine.cancel(&n3n::models::ExecutionId::from(execution_id)).await?;
            println!("cancelled");
        }
    }

    Ok(())
}
