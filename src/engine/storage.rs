// Flow & execution storage abstraction
//
// An async trait so a database-backed implementation can be swapped in
// without touching callers, plus an `RwLock`-guarded in-memory map for
// development and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::models::{Execution, ExecutionId, Flow, FlowId, FlowVersion, VersionId};
use crate::{EngineError, Result};

#[async_trait]
pub trait FlowStorage: Send + Sync {
    async fn create_flow(&self, flow: Flow) -> Result<Flow>;
    async fn get_flow(&self, id: &FlowId) -> Result<Option<Flow>>;
    async fn list_flows(&self) -> Result<Vec<Flow>>;

    async fn create_version(&self, version: FlowVersion) -> Result<FlowVersion>;
    async fn get_version(&self, id: &VersionId) -> Result<Option<FlowVersion>>;
    async fn published_version(&self, flow_id: &FlowId) -> Result<Option<FlowVersion>>;
    /// Publishes `version_id`, atomically deprecating any previously
    /// published version of the same flow.
    async fn publish_version(&self, flow_id: &FlowId, version_id: &VersionId) -> Result<()>;

    async fn create_execution(&self, execution: Execution) -> Result<Execution>;
    async fn get_execution(&self, id: &ExecutionId) -> Result<Option<Execution>>;
    async fn update_execution(&self, execution: Execution) -> Result<Execution>;
}

#[derive(Default)]
pub struct InMemoryFlowStorage {
    flows: RwLock<HashMap<String, Flow>>,
    versions: RwLock<HashMap<String, FlowVersion>>,
    executions: RwLock<HashMap<String, Execution>>,
}

#[async_trait]
impl FlowStorage for InMemoryFlowStorage {
    async fn create_flow(&self, flow: Flow) -> Result<Flow> {
        let mut flows = self.flows.write().unwrap();
        flows.insert(flow.id.as_str().to_string(), flow.clone());
        Ok(flow)
    }

    async fn get_flow(&self, id: &FlowId) -> Result<Option<Flow>> {
        Ok(self.flows.read().unwrap().get(id.as_str()).cloned())
    }

    async fn list_flows(&self) -> Result<Vec<Flow>> {
        Ok(self.flows.read().unwrap().values().cloned().collect())
    }

    async fn create_version(&self, version: FlowVersion) -> Result<FlowVersion> {
        let mut versions = self.versions.write().unwrap();
        versions.insert(version.id.as_str().to_string(), version.clone());
        Ok(version)
    }

    async fn get_version(&self, id: &VersionId) -> Result<Option<FlowVersion>> {
        Ok(self.versions.read().unwrap().get(id.as_str()).cloned())
    }

    async fn published_version(&self, flow_id: &FlowId) -> Result<Option<FlowVersion>> {
        use crate::models::VersionStatus;
        Ok(self
            .versions
            .read()
            .unwrap()
            .values()
            .find(|v| &v.flow_id == flow_id && v.status == VersionStatus::Published)
            .cloned())
    }

    async fn publish_version(&self, flow_id: &FlowId, version_id: &VersionId) -> Result<()> {
        use crate::models::VersionStatus;
        let mut versions = self.versions.write().unwrap();

        if !versions.contains_key(version_id.as_str()) {
            return Err(EngineError::NotFound(format!("version {}", version_id)));
        }

        for version in versions.values_mut() {
            if &version.flow_id == flow_id && version.status == VersionStatus::Published {
                version.status = VersionStatus::Deprecated;
            }
        }
        versions.get_mut(version_id.as_str()).unwrap().status = VersionStatus::Published;
        Ok(())
    }

    async fn create_execution(&self, execution: Execution) -> Result<Execution> {
        let mut executions = self.executions.write().unwrap();
        executions.insert(execution.id.as_str().to_string(), execution.clone());
        Ok(execution)
    }

    async fn get_execution(&self, id: &ExecutionId) -> Result<Option<Execution>> {
        Ok(self.executions.read().unwrap().get(id.as_str()).cloned())
    }

    async fn update_execution(&self, execution: Execution) -> Result<Execution> {
        let mut executions = self.executions.write().unwrap();
        executions.insert(execution.id.as_str().to_string(), execution.clone());
        Ok(execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlowDefinition, UserId, VersionStatus};

    #[tokio::test]
    async fn publishing_deprecates_the_previous_published_version() {
        let storage = InMemoryFlowStorage::default();
        let flow_id = FlowId::from("f1");

        let mut v1 = FlowVersion::new(VersionId::from("v1"), flow_id.clone(), "1", FlowDefinition::default());
        v1.status = VersionStatus::Published;
        storage.create_version(v1).await.unwrap();

        let v2 = FlowVersion::new(VersionId::from("v2"), flow_id.clone(), "2", FlowDefinition::default());
        storage.create_version(v2).await.unwrap();

        storage.publish_version(&flow_id, &VersionId::from("v2")).await.unwrap();

        let v1_after = storage.get_version(&VersionId::from("v1")).await.unwrap().unwrap();
        let v2_after = storage.get_version(&VersionId::from("v2")).await.unwrap().unwrap();
        assert_eq!(v1_after.status, VersionStatus::Deprecated);
        assert_eq!(v2_after.status, VersionStatus::Published);
    }

    #[tokio::test]
    async fn publishing_unknown_version_fails() {
        let storage = InMemoryFlowStorage::default();
        let result = storage.publish_version(&FlowId::from("f1"), &VersionId::from("missing")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn flow_round_trips_through_storage() {
        let storage = InMemoryFlowStorage::default();
        let flow = Flow::new(FlowId::from("f1"), "My Flow", UserId::from("u1"));
        storage.create_flow(flow.clone()).await.unwrap();
        let fetched = storage.get_flow(&FlowId::from("f1")).await.unwrap().unwrap();
        assert_eq!(fetched.name, "My Flow");
    }
}
