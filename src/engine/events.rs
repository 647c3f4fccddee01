// Execution event bus
//
// A thin wrapper over `tokio::sync::broadcast` so any number of observers
// (loggers, a UI, the CLI binaries) can subscribe to an execution's
// progress without the engine itself knowing who is listening.

use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{ExecutionEvent, ExecutionEventType, ExecutionId, NodeId};
use crate::Result;
use serde_json::Value;

pub struct ExecutionEventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl ExecutionEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        ExecutionEventBus { sender }
    }

    pub async fn publish(&self, event: ExecutionEvent) -> Result<()> {
        debug!(event_type = ?event.event_type, execution_id = %event.execution_id, "publishing execution event");
        let _ = self.sender.send(event);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub async fn emit_execution_started(&self, execution_id: &ExecutionId) -> Result<()> {
        self.publish(ExecutionEvent::new(ExecutionEventType::ExecutionStarted, execution_id.clone()))
            .await
    }

    pub async fn emit_execution_completed(&self, execution_id: &ExecutionId, output: Option<Value>) -> Result<()> {
        let mut event = ExecutionEvent::new(ExecutionEventType::ExecutionCompleted, execution_id.clone());
        if let Some(output) = output {
            event = event.with_data(output);
        }
        self.publish(event).await
    }

    pub async fn emit_execution_failed(&self, execution_id: &ExecutionId, error: &str) -> Result<()> {
        self.publish(
            ExecutionEvent::new(ExecutionEventType::ExecutionFailed, execution_id.clone())
                .with_data(Value::from(error)),
        )
        .await
    }

    pub async fn emit_execution_cancelled(&self, execution_id: &ExecutionId) -> Result<()> {
        self.publish(ExecutionEvent::new(ExecutionEventType::ExecutionCancelled, execution_id.clone()))
            .await
    }

    pub async fn emit_execution_paused(&self, execution_id: &ExecutionId, node_id: &NodeId) -> Result<()> {
        self.publish(
            ExecutionEvent::new(ExecutionEventType::ExecutionPaused, execution_id.clone()).with_node(node_id.clone()),
        )
        .await
    }

    pub async fn emit_execution_resumed(&self, execution_id: &ExecutionId) -> Result<()> {
        self.publish(ExecutionEvent::new(ExecutionEventType::ExecutionResumed, execution_id.clone()))
            .await
    }

    pub async fn emit_node_started(&self, execution_id: &ExecutionId, node_id: &NodeId) -> Result<()> {
        self.publish(ExecutionEvent::new(ExecutionEventType::NodeStarted, execution_id.clone()).with_node(node_id.clone()))
            .await
    }

    pub async fn emit_node_completed(&self, execution_id: &ExecutionId, node_id: &NodeId, output: Value) -> Result<()> {
        self.publish(
            ExecutionEvent::new(ExecutionEventType::NodeCompleted, execution_id.clone())
                .with_node(node_id.clone())
                .with_data(output),
        )
        .await
    }

    pub async fn emit_node_failed(&self, execution_id: &ExecutionId, node_id: &NodeId, error: &str) -> Result<()> {
        self.publish(
            ExecutionEvent::new(ExecutionEventType::NodeFailed, execution_id.clone())
                .with_node(node_id.clone())
                .with_data(Value::from(error)),
        )
        .await
    }

    pub async fn emit_node_skipped(&self, execution_id: &ExecutionId, node_id: &NodeId) -> Result<()> {
        self.publish(ExecutionEvent::new(ExecutionEventType::NodeSkipped, execution_id.clone()).with_node(node_id.clone()))
            .await
    }
}

impl Default for ExecutionEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ExecutionEventBus {
    fn clone(&self) -> Self {
        ExecutionEventBus {
            sender: self.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = ExecutionEventBus::new();
        let mut rx = bus.subscribe();
        bus.emit_execution_started(&ExecutionId::from("e1")).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, ExecutionEventType::ExecutionStarted);
    }
}
