// Plugin container configuration and lifecycle records
//
// Resource caps, mounts, and retry/backoff configuration for a plugin
// container - the sandboxing constraints a third-party node handler has
// to run under regardless of which orchestrator backend starts it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerMount {
    pub host_path: String,
    pub container_path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpu_limit: String,
    pub memory_limit: String,
    /// Set equal to `memory_limit` so containers cannot swap their way past the cap.
    pub memory_swap_limit: String,
    pub pids_limit: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        ResourceLimits {
            cpu_limit: "1.0".to_string(),
            memory_limit: "256m".to_string(),
            memory_swap_limit: "256m".to_string(),
            pids_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryCondition {
    pub on_exit_codes: Vec<i32>,
    pub on_timeout: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    pub base_delay_ms: u64,
    pub condition: RetryCondition,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential,
            base_delay_ms: 500,
            condition: RetryCondition {
                on_exit_codes: vec![],
                on_timeout: true,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub image: String,
    pub tag: String,
    pub env: HashMap<String, String>,
    pub mounts: Vec<ContainerMount>,
    pub resource_limits: ResourceLimits,
    pub retry: RetryConfig,
}

impl ContainerConfig {
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    Pending,
    Starting,
    Running,
    Exited,
    Dead,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub container_id: String,
    pub port: Option<u16>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub info: ContainerInfo,
    pub state: ContainerState,
    pub labels: HashMap<String, String>,
    pub image: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resource_limits_cap_swap_at_memory_limit() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.memory_limit, limits.memory_swap_limit);
    }

    #[test]
    fn image_ref_joins_image_and_tag() {
        let cfg = ContainerConfig {
            image: "ghcr.io/n3n/http-request".to_string(),
            tag: "1.2.0".to_string(),
            env: HashMap::new(),
            mounts: vec![],
            resource_limits: ResourceLimits::default(),
            retry: RetryConfig::default(),
        };
        assert_eq!(cfg.image_ref(), "ghcr.io/n3n/http-request:1.2.0");
    }
}
