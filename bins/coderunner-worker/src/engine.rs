/// Isolation Engine - Capability Seam
///
/// **Core Responsibility:**
/// Create, exec into, and force-remove locked-down sandboxes.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to isolate (Docker today)
/// - Engine does NOT know compile/run protocols
/// - Engine does NOT evaluate correctness
///
/// Everything above this trait works against any engine offering the same
/// three operations.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use coderunner_common::config::RunnerConfig;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Read-only bind mount of the staging directory
pub const WORKSPACE_MOUNT: &str = "/workspace";
/// Writable tmpfs where compilation and execution happen
pub const SCRATCH_DIR: &str = "/scratch";

const SANDBOX_LABEL: &str = "coderunner.sandbox";

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Engine unreachable, or it refused to create/start a sandbox
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("engine operation failed: {0}")]
    Operation(String),
}

/// Everything the engine needs to create one sandbox
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxSpec {
    pub image: String,
    pub staging_dir: PathBuf,
    pub memory_limit_bytes: i64,
    pub nano_cpus: i64,
    pub pids_limit: i64,
    pub scratch_size_mb: u64,
}

impl SandboxSpec {
    pub fn new(image: &str, staging_dir: &Path, config: &RunnerConfig) -> Self {
        Self {
            image: image.to_string(),
            staging_dir: staging_dir.to_path_buf(),
            memory_limit_bytes: config.memory_limit_bytes(),
            nano_cpus: config.nano_cpus(),
            pids_limit: config.pids_limit,
            scratch_size_mb: config.scratch_size_mb,
        }
    }
}

/// Exit status plus stdout and stderr interleaved as one stream
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub output: Vec<u8>,
}

impl ExecOutput {
    /// Lossy UTF-8 view; undecodable bytes become U+FFFD
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

#[async_trait]
pub trait SandboxEngine: Send + Sync {
    /// Create and start a sandbox, returning its handle
    async fn create(&self, spec: &SandboxSpec) -> Result<String, EngineError>;

    async fn exec(
        &self,
        container_id: &str,
        command: &str,
        workdir: &str,
    ) -> Result<ExecOutput, EngineError>;

    /// Forcibly terminate and remove
    async fn remove(&self, container_id: &str) -> Result<(), EngineError>;
}

/// Host security posture for one sandbox
pub fn host_config(spec: &SandboxSpec) -> HostConfig {
    let scratch_opts = format!("rw,exec,nosuid,nodev,size={}m", spec.scratch_size_mb);
    let mut tmpfs = HashMap::new();
    tmpfs.insert(SCRATCH_DIR.to_string(), scratch_opts);
    tmpfs.insert("/tmp".to_string(), "rw,nosuid,nodev,size=16m".to_string());

    HostConfig {
        binds: Some(vec![format!(
            "{}:{}:ro",
            spec.staging_dir.display(),
            WORKSPACE_MOUNT
        )]),
        network_mode: Some("none".to_string()),
        readonly_rootfs: Some(true),
        tmpfs: Some(tmpfs),
        security_opt: Some(vec!["no-new-privileges".to_string()]),
        cap_drop: Some(vec!["ALL".to_string()]),
        memory: Some(spec.memory_limit_bytes),
        memory_swap: Some(spec.memory_limit_bytes),
        nano_cpus: Some(spec.nano_cpus),
        pids_limit: Some(spec.pids_limit),
        ..Default::default()
    }
}

/// Idle interactive shell kept alive for the lifetime of the submission
pub fn container_config(spec: &SandboxSpec) -> Config<String> {
    let mut labels = HashMap::new();
    labels.insert(SANDBOX_LABEL.to_string(), "true".to_string());

    Config {
        image: Some(spec.image.clone()),
        cmd: Some(vec!["/bin/sh".to_string()]),
        entrypoint: Some(vec![]),
        tty: Some(true),
        open_stdin: Some(true),
        working_dir: Some(SCRATCH_DIR.to_string()),
        network_disabled: Some(true),
        labels: Some(labels),
        host_config: Some(host_config(spec)),
        ..Default::default()
    }
}

/// Docker-backed engine (local socket or `DOCKER_HOST`)
pub struct DockerEngine {
    docker: Docker,
    pull_missing_images: bool,
}

impl DockerEngine {
    pub fn connect(pull_missing_images: bool) -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Unavailable(format!("Failed to connect to Docker daemon: {}", e)))?;

        Ok(Self {
            docker,
            pull_missing_images,
        })
    }

    pub async fn ping(&self) -> Result<(), EngineError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Unavailable(format!("Docker daemon not responding: {}", e)))
    }

    /// Pull the image if it is not cached locally
    async fn ensure_image(&self, image: &str) -> Result<(), EngineError> {
        if self.docker.inspect_image(image).await.is_ok() {
            debug!(image = %image, "Image cache hit");
            return Ok(());
        }

        warn!(image = %image, "Image cache miss, pulling");

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| {
                EngineError::Unavailable(format!("Failed to pull image '{}': {}", image, e))
            })?;
        }

        info!(image = %image, "Image pulled");
        Ok(())
    }
}

#[async_trait]
impl SandboxEngine for DockerEngine {
    async fn create(&self, spec: &SandboxSpec) -> Result<String, EngineError> {
        if self.pull_missing_images {
            self.ensure_image(&spec.image).await?;
        }

        let container_name = format!("coderunner-{}", uuid::Uuid::new_v4());
        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), container_config(spec))
            .await
            .map_err(|e| EngineError::Unavailable(format!("Failed to create container: {}", e)))?;

        if let Err(e) = self
            .docker
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await
        {
            // Created but never started: nobody else holds this handle
            if let Err(remove_err) = self.remove(&container.id).await {
                warn!(container_id = %container.id, error = %remove_err, "Failed to remove unstarted container");
            }
            return Err(EngineError::Unavailable(format!(
                "Failed to start container: {}",
                e
            )));
        }

        debug!(container_id = %container.id, name = %container_name, "Container started");
        Ok(container.id)
    }

    async fn exec(
        &self,
        container_id: &str,
        command: &str,
        workdir: &str,
    ) -> Result<ExecOutput, EngineError> {
        let exec_config = CreateExecOptions {
            cmd: Some(vec!["/bin/sh", "-c", command]),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            working_dir: Some(workdir),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(container_id, exec_config)
            .await
            .map_err(|e| EngineError::Operation(format!("Failed to create exec: {}", e)))?;

        let start_config = StartExecOptions {
            detach: false,
            ..Default::default()
        };

        let started = self
            .docker
            .start_exec(&exec.id, Some(start_config))
            .await
            .map_err(|e| EngineError::Operation(format!("Failed to start exec: {}", e)))?;

        let mut output = Vec::new();
        match started {
            StartExecResults::Attached { output: mut stream, .. } => {
                while let Some(msg) = stream.next().await {
                    match msg {
                        Ok(LogOutput::StdOut { message })
                        | Ok(LogOutput::StdErr { message })
                        | Ok(LogOutput::Console { message })
                        | Ok(LogOutput::StdIn { message }) => {
                            output.extend_from_slice(&message);
                        }
                        Err(e) => {
                            return Err(EngineError::Operation(format!(
                                "Failed to read exec output: {}",
                                e
                            )));
                        }
                    }
                }
            }
            StartExecResults::Detached => {
                return Err(EngineError::Operation(
                    "Exec started detached; no output stream".to_string(),
                ));
            }
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| EngineError::Operation(format!("Failed to inspect exec: {}", e)))?;

        Ok(ExecOutput {
            exit_code: inspect.exit_code.unwrap_or(-1),
            output,
        })
    }

    async fn remove(&self, container_id: &str) -> Result<(), EngineError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_container(container_id, Some(options))
            .await
            .map_err(|e| EngineError::Operation(format!("Failed to remove container: {}", e)))
    }
}
