//! Container runtime tooling.
//!
//! This module talks to Docker/Podman via the bollard API and provides the
//! operator-facing building blocks of `dockhand`: prefix discovery, one-shot and
//! interactive command execution, and best-effort rollback of resources created
//! by a provisioning workflow.
//!
//! ## Architecture
//!
//! - [`runtime`]: the [`RuntimeClient`] capability the rest of the module consumes
//! - [`client`]: bollard-backed [`RuntimeClient`] with connection fallback
//! - [`terminal`]: controlling-console abstraction and raw-mode guard
//! - [`interactive`]: the terminal bridge for interactive sessions
//! - [`executor`]: one-shot command execution
//! - [`discovery`]: container and volume lookup by name prefix
//! - [`cleanup`]: the resource cleanup coordinator
//! - [`progress`]: line-oriented progress rendering
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dockhand::container::{ContainerClient, HostConsole, run_interactive};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ContainerClient::new().await?;
//!     let mut console = HostConsole::new();
//!
//!     let exit_code = run_interactive(
//!         &client,
//!         "dev-web",
//!         vec!["/bin/sh".to_string()],
//!         &mut console,
//!     )
//!     .await?;
//!
//!     std::process::exit(exit_code as i32);
//! }
//! ```

pub mod cleanup;
pub mod client;
pub mod discovery;
pub mod executor;
pub mod interactive;
pub mod progress;
pub mod runtime;
pub mod terminal;

pub use cleanup::{
    CleanupCoordinator, CleanupHandle, RollbackSink, WriterSink, provision, rollback,
};
pub use client::{ContainerClient, ContainerClientConfig, RuntimeType};
pub use discovery::{
    find_service_container, prefixed_containers, prefixed_volumes, validate_prefix,
};
pub use executor::{ExecSpec, ExecSpecBuilder, exec_to_writer};
pub use interactive::{TerminalBridge, UNKNOWN_EXIT_CODE, exit_status, run_interactive};
pub use progress::{ProgressMode, ProgressReporter};
pub use runtime::{
    AttachedStreams, ContainerInfo, ExecAttachment, ExecFlags, ExecSession, ResourceKind,
    ResourceRecord, RuntimeClient, VolumeInfo,
};
pub use terminal::{Console, HostConsole, RawModeGuard};

/// Container runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Docker/Podman API error
    #[error("Container API error: {0}")]
    Api(#[from] bollard::errors::Error),

    /// Container or volume not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Exec session error
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Terminal control error
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// General error
    #[error("Container error: {0}")]
    Other(String),
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

#[cfg(test)]
pub(crate) mod testing;
