// Process-wide configuration, loaded once at startup via `config` + `dotenv`

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrchestratorType {
    Docker,
    Kubernetes,
    Auto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub orchestrator_type: OrchestratorType,
    pub trusted_registries: Vec<String>,
    pub docker_content_trust: bool,
    pub cpu_limit: String,
    pub memory_limit: String,
    pub pids_limit: u32,
    pub health_check_timeout_seconds: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            orchestrator_type: OrchestratorType::Auto,
            trusted_registries: vec!["docker.io".to_string(), "ghcr.io/n3n".to_string()],
            docker_content_trust: true,
            cpu_limit: "1.0".to_string(),
            memory_limit: "256m".to_string(),
            pids_limit: 50,
            health_check_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub default_requests_per_window: u32,
    pub default_tokens_per_window: u32,
    pub burst_multiplier: f32,
    pub fail_close: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            default_requests_per_window: 60,
            default_tokens_per_window: 100_000,
            burst_multiplier: 1.5,
            fail_close: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub max_context_messages: usize,
    pub recent_to_keep: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        ConversationConfig {
            max_context_messages: 20,
            recent_to_keep: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub orchestrator: OrchestratorConfig,
    pub rate_limit: RateLimitConfig,
    pub conversation: ConversationConfig,
    pub agent_max_iterations: u32,
    pub execution_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            orchestrator: OrchestratorConfig::default(),
            rate_limit: RateLimitConfig::default(),
            conversation: ConversationConfig::default(),
            agent_max_iterations: 10,
            execution_concurrency: num_cpus_fallback(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration layered as defaults < config file < environment,
    /// mirroring the `config`/`dotenv` pattern the CLI entry points use.
    pub fn load() -> crate::Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var("N3N_CONFIG_FILE") {
            builder = builder.add_source(config::File::with_name(&path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("N3N")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        cfg.try_deserialize().or_else(|_| Ok(EngineConfig::default()))
    }
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_concurrency() {
        let cfg = EngineConfig::default();
        assert!(cfg.execution_concurrency >= 1);
        assert_eq!(cfg.orchestrator.orchestrator_type, OrchestratorType::Auto);
    }
}
