//! Runtime capability consumed by the rest of the container module.
//!
//! Everything that needs to talk to Docker/Podman goes through
//! [`RuntimeClient`], so the bridge, the discovery helpers and the cleanup
//! coordinator can be driven by an in-memory implementation in tests.

use crate::container::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use std::pin::Pin;
use tokio::io::AsyncWrite;

/// Options for creating an exec session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecFlags {
    pub privileged: bool,
    pub tty: bool,
    pub attach_stdin: bool,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    /// `KEY=value` pairs
    pub env: Vec<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
}

/// Streams attached to an exec session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachedStreams {
    pub stdin: bool,
    pub stdout: bool,
    pub stderr: bool,
}

impl AttachedStreams {
    /// Output streams are always attached; stdin only for interactive use.
    pub fn for_mode(interactive: bool) -> Self {
        Self {
            stdin: interactive,
            stdout: true,
            stderr: true,
        }
    }
}

/// A command invocation inside a container, as tracked by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecSession {
    /// Identifier issued by the runtime
    pub id: String,
    pub command: Vec<String>,
    pub tty_requested: bool,
    pub streams: AttachedStreams,
    /// Present only once the session has been inspected after termination
    pub exit_code: Option<i64>,
}

/// Duplex byte channel attached to an exec session.
pub struct ExecAttachment {
    /// Session stdout/stderr as raw chunks
    pub output: BoxStream<'static, std::io::Result<Vec<u8>>>,
    /// Session stdin
    pub input: Pin<Box<dyn AsyncWrite + Send>>,
}

impl fmt::Debug for ExecAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecAttachment").finish_non_exhaustive()
    }
}

/// Kind of a resource created during a provisioning workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Container,
    Volume,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Container => write!(f, "container"),
            ResourceKind::Volume => write!(f, "volume"),
        }
    }
}

/// A created resource, identified by a handle the runtime understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub identifier: String,
}

impl ResourceRecord {
    pub fn container(identifier: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Container,
            identifier: identifier.into(),
        }
    }

    pub fn volume(identifier: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Volume,
            identifier: identifier.into(),
        }
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.identifier)
    }
}

/// Container summary returned by discovery.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContainerInfo {
    pub id: String,
    /// Names without the leading `/` the runtime reports
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
    /// Unix timestamp (seconds)
    pub created: i64,
}

/// Volume summary returned by discovery.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VolumeInfo {
    pub name: String,
    pub driver: String,
    pub mountpoint: String,
}

/// Capability to manage exec sessions and created resources in a container
/// runtime.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Create an exec session inside `container` and return its identifier.
    async fn create_exec(
        &self,
        container: &str,
        command: &[String],
        flags: &ExecFlags,
    ) -> Result<String>;

    /// Start the session and attach its standard streams.
    async fn attach_exec(&self, session_id: &str, tty: bool) -> Result<ExecAttachment>;

    /// Exit code of the session, `None` while it is still running.
    async fn inspect_exec(&self, session_id: &str) -> Result<Option<i64>>;

    /// Forcibly remove a container.
    async fn remove_container(&self, container_id: &str) -> Result<()>;

    /// Forcibly remove a volume.
    async fn remove_volume(&self, volume_id: &str) -> Result<()>;

    /// All containers, running or not, matching the runtime's name filter.
    async fn list_containers(&self, name_filter: &str) -> Result<Vec<ContainerInfo>>;

    /// All volumes matching the runtime's name filter.
    async fn list_volumes(&self, name_filter: &str) -> Result<Vec<VolumeInfo>>;
}
