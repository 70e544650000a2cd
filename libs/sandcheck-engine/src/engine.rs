/// Sandbox Executor - Docker backend
///
/// **Core Responsibility:**
/// Run one generated harness in a fresh container and hand back the combined
/// output, or a classified failure.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (image, limits, container lifecycle)
/// - Engine does NOT know test cases, types or verdicts
/// - Engine returns raw output for the parser and comparator
///
/// **Container Rules:**
/// 1. One container per harness, never reused
/// 2. Network disabled, memory capped without swap, CPU throttled by CFS quota
/// 3. Read-only root filesystem, writable tmpfs working directory only
/// 4. Unprivileged user, all capabilities dropped, pid limit
/// 5. Hard wall-clock timeout; the container is killed when it expires
/// 6. Container removed on every exit path, with a drop guard as backstop

use crate::config::{SandboxConfig, CPU_PERIOD_US};
use crate::sandbox::{SandboxBackend, SandboxError, SandboxOutput};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, ListContainersOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Kernel limit for a single `NAME=value` environment string, NUL included.
const MAX_ENV_ENTRY_BYTES: usize = 128 * 1024;

pub const MANAGED_LABEL: &str = "sandcheck.managed";
const HARNESS_ENV: &str = "SANDCHECK_HARNESS";
const SANDBOX_USER: &str = "65534:65534";

const BOOTSTRAP: &str = "import base64, os; \
src = base64.b64decode(os.environ.pop('SANDCHECK_HARNESS')).decode('utf-8'); \
exec(compile(src, 'solution.py', 'exec'), {'__name__': '__main__'})";

/// Container cleanup guard - removes the container if the owning future is
/// dropped (panic or cancellation) before `release` runs.
struct ContainerGuard {
    docker: Docker,
    container_id: String,
    released: bool,
}

impl ContainerGuard {
    fn new(docker: Docker, container_id: String) -> Self {
        Self {
            docker,
            container_id,
            released: false,
        }
    }

    async fn release(mut self) -> Result<(), bollard::errors::Error> {
        self.released = true;
        self.docker
            .remove_container(&self.container_id, Some(force_remove()))
            .await
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let container_id = self.container_id.clone();
        let docker = self.docker.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = docker.remove_container(&container_id, Some(force_remove())).await {
                        warn!(container_id = %container_id, error = %e, "Failed to cleanup container");
                    }
                });
            }
            Err(_) => {
                warn!(container_id = %container_id, "No runtime available to cleanup container");
            }
        }
    }
}

/// Whether a harness of `len` bytes still fits in one environment entry once
/// base64-encoded.
fn harness_fits(len: usize) -> bool {
    base64::encoded_len(len, true)
        .map(|encoded| HARNESS_ENV.len() + 1 + encoded + 1 <= MAX_ENV_ENTRY_BYTES)
        .unwrap_or(false)
}

/// Accumulates container output up to a byte cap.
struct OutputCollector {
    output: String,
    limit: usize,
    truncated: bool,
}

impl OutputCollector {
    fn new(limit: usize) -> Self {
        Self {
            output: String::new(),
            limit,
            truncated: false,
        }
    }

    /// Append a chunk. Returns false once the cap has been reached.
    fn push(&mut self, chunk: &[u8]) -> bool {
        if self.truncated {
            return false;
        }

        let remaining = self.limit.saturating_sub(self.output.len());
        if chunk.len() <= remaining {
            self.output.push_str(&String::from_utf8_lossy(chunk));
            return true;
        }

        self.output.push_str(&String::from_utf8_lossy(&chunk[..remaining]));
        self.output
            .push_str(&format!("\n[Output truncated after {} bytes]", self.limit));
        self.truncated = true;
        false
    }

    fn finish(self) -> String {
        self.output
    }
}

fn force_remove() -> RemoveContainerOptions {
    RemoveContainerOptions {
        force: true,
        ..Default::default()
    }
}

fn managed_filter() -> HashMap<String, Vec<String>> {
    HashMap::from([(
        "label".to_string(),
        vec![format!("{}=true", MANAGED_LABEL)],
    )])
}

/// Docker-based sandbox backend.
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
    config: SandboxConfig,
}

impl DockerEngine {
    /// Connect to the local Docker daemon (honours `DOCKER_HOST`).
    pub fn new(config: SandboxConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker daemon")?;
        Ok(Self { docker, config })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Pull the sandbox image if it is not cached locally.
    async fn ensure_image(&self) -> Result<(), bollard::errors::Error> {
        let image = self.config.image.as_str();

        if self.docker.inspect_image(image).await.is_ok() {
            debug!(image = image, "Image cache hit");
            return Ok(());
        }

        warn!(image = image, "Image cache miss, pulling now");

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            result?;
        }

        info!(image = image, "Image pulled successfully");
        Ok(())
    }

    fn container_config(&self, harness: &str) -> Config<String> {
        let env = vec![
            format!("{}={}", HARNESS_ENV, general_purpose::STANDARD.encode(harness)),
            "PYTHONDONTWRITEBYTECODE=1".to_string(),
            "PYTHONIOENCODING=utf-8".to_string(),
        ];

        let tmpfs = HashMap::from([(
            self.config.working_dir.clone(),
            format!("rw,nosuid,nodev,size={}m,mode=1777", self.config.tmpfs_size_mb),
        )]);

        let labels = HashMap::from([(MANAGED_LABEL.to_string(), "true".to_string())]);

        Config {
            image: Some(self.config.image.clone()),
            cmd: Some(vec![
                "python".to_string(),
                "-u".to_string(),
                "-B".to_string(),
                "-c".to_string(),
                BOOTSTRAP.to_string(),
            ]),
            entrypoint: Some(vec![]),
            env: Some(env),
            labels: Some(labels),
            user: Some(SANDBOX_USER.to_string()),
            working_dir: Some(self.config.working_dir.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            network_disabled: Some(true),
            host_config: Some(HostConfig {
                memory: Some(self.config.memory_limit_bytes()),
                memory_swap: Some(self.config.memory_limit_bytes()),
                cpu_period: Some(CPU_PERIOD_US),
                cpu_quota: Some(self.config.cpu_quota_us()),
                pids_limit: Some(self.config.pids_limit),
                network_mode: Some("none".to_string()),
                readonly_rootfs: Some(true),
                tmpfs: Some(tmpfs),
                cap_drop: Some(vec!["ALL".to_string()]),
                security_opt: Some(vec!["no-new-privileges".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Start the container, collect its output and exit code under the hard
    /// timeout. The caller owns removal.
    async fn run_container(&self, container_id: &str) -> Result<SandboxOutput, SandboxError> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| SandboxError::Setup(format!("Failed to start container: {}", e)))?;

        let start_time = Instant::now();
        let timeout_ms = self.config.timeout_ms;

        let execution_future = async {
            let mut collector = OutputCollector::new(self.config.max_output_bytes);

            let logs_options = Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                follow: true,
                ..Default::default()
            });

            let mut logs_stream = self.docker.logs(container_id, logs_options);
            while let Some(chunk) = logs_stream.next().await {
                match chunk {
                    Ok(LogOutput::StdOut { message })
                    | Ok(LogOutput::StdErr { message })
                    | Ok(LogOutput::Console { message }) => {
                        if !collector.push(&message) {
                            warn!(
                                container_id = container_id,
                                limit = self.config.max_output_bytes,
                                "Output cap reached, no longer reading logs"
                            );
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(container_id = container_id, error = %e, "Error reading container logs");
                        break;
                    }
                }
            }

            let wait_options = Some(WaitContainerOptions {
                condition: "not-running",
            });
            let mut wait_stream = self.docker.wait_container(container_id, wait_options);

            // bollard reports a non-zero exit as a wait error carrying the code.
            let exit_code = match wait_stream.next().await {
                Some(Ok(response)) => Ok(response.status_code),
                Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
                Some(Err(e)) => Err(SandboxError::Api(format!("Failed to wait for container: {}", e))),
                None => Err(SandboxError::Unexpected("No wait response from container".to_string())),
            };

            exit_code.map(|code| (collector.finish(), code))
        };

        let timeout_result =
            tokio::time::timeout(Duration::from_millis(timeout_ms), execution_future).await;
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        match timeout_result {
            Ok(Ok((output, 0))) => {
                debug!(container_id = container_id, execution_ms = execution_time_ms, "Container exited successfully");
                Ok(SandboxOutput {
                    output,
                    exit_code: 0,
                    execution_time_ms,
                })
            }
            Ok(Ok((mut output, exit_code))) => {
                if exit_code == 137 {
                    output.push_str("\n[Container killed: likely OOM or exceeded memory limit]");
                } else if exit_code == 139 {
                    output.push_str("\n[Container killed: segmentation fault]");
                }
                warn!(
                    container_id = container_id,
                    exit_code = exit_code,
                    execution_ms = execution_time_ms,
                    "Container exited with runtime error"
                );
                Err(SandboxError::RuntimeCrash {
                    exit_code,
                    output: output.trim_end().to_string(),
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(
                    container_id = container_id,
                    timeout_ms = timeout_ms,
                    "Execution timed out, killing container"
                );
                if let Err(e) = self
                    .docker
                    .kill_container(container_id, None::<KillContainerOptions<String>>)
                    .await
                {
                    warn!(container_id = container_id, error = %e, "Failed to kill timed-out container");
                }
                Err(SandboxError::Timeout { timeout_ms })
            }
        }
    }

    /// Ids of sandbox containers currently known to the daemon.
    pub async fn live_sandboxes(&self) -> anyhow::Result<Vec<String>> {
        let options = Some(ListContainersOptions::<String> {
            all: true,
            filters: managed_filter(),
            ..Default::default()
        });

        let containers = self.docker.list_containers(options).await?;
        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }

    /// Force-remove sandbox containers left behind by a crashed process.
    pub async fn reap_orphans(&self) -> anyhow::Result<usize> {
        let mut removed = 0;
        for container_id in self.live_sandboxes().await? {
            match self
                .docker
                .remove_container(&container_id, Some(force_remove()))
                .await
            {
                Ok(()) => removed += 1,
                Err(e) => warn!(container_id = %container_id, error = %e, "Failed to reap container"),
            }
        }
        if removed > 0 {
            info!(removed = removed, "Reaped leftover sandbox containers");
        }
        Ok(removed)
    }
}

#[async_trait]
impl SandboxBackend for DockerEngine {
    #[tracing::instrument(skip(self, harness), fields(image = %self.config.image, harness_bytes = harness.len()))]
    async fn execute(&self, harness: &str) -> Result<SandboxOutput, SandboxError> {
        if !harness_fits(harness.len()) {
            return Err(SandboxError::Setup(format!(
                "Generated harness of {} bytes is too large to pass to the sandbox",
                harness.len()
            )));
        }

        self.ensure_image().await.map_err(|e| {
            SandboxError::Setup(format!(
                "Failed to ensure Docker image '{}' is available: {}",
                self.config.image, e
            ))
        })?;

        let container_name = format!("sandcheck-{}", uuid::Uuid::new_v4());
        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), self.container_config(harness))
            .await
            .map_err(|e| SandboxError::Setup(format!("Failed to create container: {}", e)))?;

        // Guard immediately after creation so cancellation cannot leak it.
        let guard = ContainerGuard::new(self.docker.clone(), container.id.clone());

        let outcome = self.run_container(&container.id).await;

        if let Err(e) = guard.release().await {
            warn!(container_id = %container.id, error = %e, "Failed to remove container");
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Option<DockerEngine> {
        DockerEngine::new(SandboxConfig::default()).ok()
    }

    #[tokio::test]
    async fn test_container_config_limits() {
        // Docker::connect_with_local_defaults does not contact the daemon.
        let Some(engine) = engine() else { return };
        let config = engine.container_config("print(1)");

        let host = config.host_config.unwrap();
        assert_eq!(host.memory, Some(128 * 1024 * 1024));
        assert_eq!(host.memory_swap, host.memory);
        assert_eq!(host.cpu_period, Some(100_000));
        assert_eq!(host.cpu_quota, Some(50_000));
        assert_eq!(host.network_mode.as_deref(), Some("none"));
        assert_eq!(host.readonly_rootfs, Some(true));
        assert!(host.tmpfs.unwrap().contains_key("/tmp"));
        assert_eq!(config.network_disabled, Some(true));
        assert_eq!(config.working_dir.as_deref(), Some("/tmp"));
        assert_eq!(config.labels.unwrap().get(MANAGED_LABEL).map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn test_container_config_encodes_harness() {
        let Some(engine) = engine() else { return };
        let config = engine.container_config("print('hi')");

        let env = config.env.unwrap();
        let encoded = env
            .iter()
            .find_map(|e| e.strip_prefix("SANDCHECK_HARNESS="))
            .unwrap();
        let decoded = general_purpose::STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded, b"print('hi')");
    }

    #[tokio::test]
    async fn test_oversized_harness_is_setup_error() {
        let Some(engine) = engine() else { return };
        let harness = "#".repeat(96 * 1024);

        let err = engine.execute(&harness).await.unwrap_err();
        assert!(matches!(err, SandboxError::Setup(_)));
    }

    #[test]
    fn test_harness_size_limit_counts_encoding() {
        // 98289 bytes encode to 131052 base64 bytes, the largest that fits.
        assert!(harness_fits(0));
        assert!(harness_fits(98_289));
        assert!(!harness_fits(98_290));
        assert!(!harness_fits(96 * 1024));
    }

    #[test]
    fn test_output_collector_under_limit() {
        let mut collector = OutputCollector::new(16);
        assert!(collector.push(b"hello "));
        assert!(collector.push(b"world"));
        assert_eq!(collector.finish(), "hello world");
    }

    #[test]
    fn test_output_collector_truncates() {
        let mut collector = OutputCollector::new(8);
        assert!(collector.push(b"abcde"));
        assert!(!collector.push(b"fghijk"));
        assert!(!collector.push(b"more"));

        let output = collector.finish();
        assert!(output.starts_with("abcdefgh\n"));
        assert!(output.ends_with("[Output truncated after 8 bytes]"));
        assert!(!output.contains("more"));
    }
}
