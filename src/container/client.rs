//! Docker/Podman client wrapper.
//!
//! Provides the bollard-backed [`RuntimeClient`] with automatic connection
//! handling and fallback strategies.

use crate::container::runtime::{
    ContainerInfo, ExecAttachment, ExecFlags, RuntimeClient, VolumeInfo,
};
use crate::container::{ContainerError, Result};
use async_trait::async_trait;
use bollard::Docker;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Container client configuration.
#[derive(Debug, Clone)]
pub struct ContainerClientConfig {
    /// Socket to try before the local defaults, e.g. `unix:///run/user/1000/docker.sock`
    pub socket: Option<String>,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for ContainerClientConfig {
    fn default() -> Self {
        Self {
            socket: None,
            timeout: 120,
        }
    }
}

/// Docker/Podman API client wrapper.
#[derive(Clone)]
pub struct ContainerClient {
    docker: Arc<Docker>,
}

impl ContainerClient {
    /// Connect to the local Docker daemon, or Podman when Docker is absent.
    ///
    /// # Errors
    ///
    /// Returns error if neither runtime answers.
    pub async fn new() -> Result<Self> {
        Self::with_config(ContainerClientConfig::default()).await
    }

    /// Connect using `config`, keeping the first runtime that answers a ping.
    ///
    /// # Errors
    ///
    /// Returns error if no candidate endpoint answers.
    pub async fn with_config(config: ContainerClientConfig) -> Result<Self> {
        let docker = Self::connect(&config).await?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Candidates, in order:
    /// 1. The configured socket
    /// 2. Local defaults (DOCKER_HOST, the Docker socket or named pipe)
    /// 3. Rootless then system Podman socket
    async fn connect(config: &ContainerClientConfig) -> Result<Docker> {
        let timeout = Duration::from_secs(config.timeout);

        if let Some(ref socket) = config.socket {
            let attempt =
                Docker::connect_with_socket(socket, config.timeout, bollard::API_DEFAULT_VERSION);
            if let Some(docker) = Self::probe(socket, attempt).await {
                return Ok(docker);
            }
        }

        let local = Docker::connect_with_local_defaults().map(|d| d.with_timeout(timeout));
        if let Some(docker) = Self::probe("local defaults", local).await {
            return Ok(docker);
        }

        #[cfg(unix)]
        for socket in podman_sockets() {
            let attempt =
                Docker::connect_with_socket(&socket, config.timeout, bollard::API_DEFAULT_VERSION);
            if let Some(docker) = Self::probe(&socket, attempt).await {
                return Ok(docker);
            }
        }

        Err(ContainerError::Other(
            "no Docker or Podman endpoint answered; is the daemon (or podman.socket) running?"
                .to_string(),
        ))
    }

    async fn probe(
        endpoint: &str,
        attempt: std::result::Result<Docker, bollard::errors::Error>,
    ) -> Option<Docker> {
        let docker = match attempt {
            Ok(docker) => docker,
            Err(e) => {
                debug!("Cannot use {}: {}", endpoint, e);
                return None;
            }
        };

        match docker.ping().await {
            Ok(_) => {
                info!("Connected to container runtime via {}", endpoint);
                Some(docker)
            }
            Err(e) => {
                debug!("{} did not answer: {}", endpoint, e);
                None
            }
        }
    }

    /// Underlying bollard client, for operations outside [`RuntimeClient`].
    pub fn docker(&self) -> &Arc<Docker> {
        &self.docker
    }

    /// Check the runtime still answers.
    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await?;
        Ok(())
    }

    /// Version report of the runtime.
    pub async fn version(&self) -> Result<bollard::models::SystemVersion> {
        Ok(self.docker.version().await?)
    }

    /// Check if the runtime is Docker or Podman.
    ///
    /// # Errors
    ///
    /// Returns error if the version query fails.
    pub async fn runtime_type(&self) -> Result<RuntimeType> {
        let version = self.version().await?;

        let is_podman = version
            .components
            .unwrap_or_default()
            .iter()
            .any(|c| c.name.to_lowercase().contains("podman"));

        if is_podman {
            Ok(RuntimeType::Podman)
        } else {
            Ok(RuntimeType::Docker)
        }
    }

    /// Pull `image`, passing every progress update to `on_progress`.
    ///
    /// # Errors
    ///
    /// Returns error if the pull fails or `on_progress` fails.
    pub async fn pull_image<F>(&self, image: &str, mut on_progress: F) -> Result<()>
    where
        F: FnMut(&str) -> std::io::Result<()>,
    {
        info!("Pulling image: {}", image);

        let mut stream = self.docker.create_image(
            Some(bollard::image::CreateImageOptions {
                from_image: image,
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(result) = stream.next().await {
            let info = result?;
            if let Some(line) = progress_line(&info) {
                on_progress(&line)?;
            }
        }

        info!("Successfully pulled image: {}", image);
        Ok(())
    }
}

/// Podman API sockets: the rootless one under XDG_RUNTIME_DIR, then the system one.
#[cfg(unix)]
fn podman_sockets() -> Vec<String> {
    let mut sockets = Vec::new();
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        sockets.push(format!("unix://{}/podman/podman.sock", runtime_dir));
    }
    sockets.push("unix:///run/podman/podman.sock".to_string());
    sockets
}

/// One progress line for a pull update, `None` for updates without a status.
fn progress_line(info: &bollard::models::CreateImageInfo) -> Option<String> {
    let status = info.status.as_deref()?;

    let mut line = match info.id.as_deref() {
        Some(id) => format!("{}: {}", id, status),
        None => status.to_string(),
    };
    if let Some(progress) = info.progress.as_deref() {
        line.push(' ');
        line.push_str(progress);
    }
    Some(line)
}

fn map_not_found(e: bollard::errors::Error, what: &str) -> ContainerError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => ContainerError::NotFound(what.to_string()),
        e => ContainerError::Api(e),
    }
}

fn name_filter(name: &str) -> HashMap<String, Vec<String>> {
    HashMap::from([("name".to_string(), vec![name.to_string()])])
}

#[async_trait]
impl RuntimeClient for ContainerClient {
    async fn create_exec(
        &self,
        container: &str,
        command: &[String],
        flags: &ExecFlags,
    ) -> Result<String> {
        let options = CreateExecOptions {
            cmd: Some(command.to_vec()),
            env: if flags.env.is_empty() {
                None
            } else {
                Some(flags.env.clone())
            },
            working_dir: flags.working_dir.clone(),
            user: flags.user.clone(),
            attach_stdin: Some(flags.attach_stdin),
            attach_stdout: Some(flags.attach_stdout),
            attach_stderr: Some(flags.attach_stderr),
            tty: Some(flags.tty),
            privileged: Some(flags.privileged),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(container, options)
            .await
            .map_err(|e| map_not_found(e, container))?;

        debug!("Created exec session {} in {}", exec.id, container);
        Ok(exec.id)
    }

    async fn attach_exec(&self, session_id: &str, tty: bool) -> Result<ExecAttachment> {
        let results = self
            .docker
            .start_exec(
                session_id,
                Some(StartExecOptions {
                    detach: false,
                    tty,
                    ..Default::default()
                }),
            )
            .await?;

        match results {
            StartExecResults::Attached { output, input } => Ok(ExecAttachment {
                output: output
                    .map(|chunk| {
                        chunk
                            .map(|log| log.into_bytes().to_vec())
                            .map_err(std::io::Error::other)
                    })
                    .boxed(),
                input,
            }),
            StartExecResults::Detached => Err(ContainerError::ExecutionError(
                "Unexpected detached execution".to_string(),
            )),
        }
    }

    async fn inspect_exec(&self, session_id: &str) -> Result<Option<i64>> {
        let inspect = self.docker.inspect_exec(session_id).await?;
        Ok(inspect.exit_code)
    }

    async fn remove_container(&self, container_id: &str) -> Result<()> {
        debug!("Removing container: {}", container_id);

        self.docker
            .remove_container(
                container_id,
                Some(bollard::container::RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| map_not_found(e, container_id))?;

        info!("Removed container: {}", container_id);
        Ok(())
    }

    async fn remove_volume(&self, volume_id: &str) -> Result<()> {
        debug!("Removing volume: {}", volume_id);

        self.docker
            .remove_volume(
                volume_id,
                Some(bollard::volume::RemoveVolumeOptions { force: true }),
            )
            .await
            .map_err(|e| map_not_found(e, volume_id))?;

        info!("Removed volume: {}", volume_id);
        Ok(())
    }

    async fn list_containers(&self, name: &str) -> Result<Vec<ContainerInfo>> {
        let containers = self
            .docker
            .list_containers(Some(bollard::container::ListContainersOptions {
                all: true,
                filters: name_filter(name),
                ..Default::default()
            }))
            .await?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerInfo {
                id: c.id.unwrap_or_default(),
                names: c
                    .names
                    .unwrap_or_default()
                    .into_iter()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .collect(),
                image: c.image.unwrap_or_default(),
                state: c.state.map(|s| s.to_string()).unwrap_or_default(),
                created: c.created.unwrap_or_default(),
            })
            .collect())
    }

    async fn list_volumes(&self, name: &str) -> Result<Vec<VolumeInfo>> {
        let response = self
            .docker
            .list_volumes(Some(bollard::volume::ListVolumesOptions {
                filters: name_filter(name),
            }))
            .await?;

        Ok(response
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|v| VolumeInfo {
                name: v.name,
                driver: v.driver,
                mountpoint: v.mountpoint,
            })
            .collect())
    }
}

/// Type of container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeType {
    /// Docker runtime
    Docker,
    /// Podman runtime
    Podman,
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "Docker"),
            RuntimeType::Podman => write!(f, "Podman"),
        }
    }
}
