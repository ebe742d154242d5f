//! # dockhand
//!
//! Operator tooling around a Docker/Podman container runtime.
//!
//! ## Architecture Overview
//!
//! - **[`container`]**: runtime capability, terminal bridge, one-shot exec,
//!   prefix discovery, cleanup coordinator and progress rendering
//! - **[`cli`]**: argument parsing and configuration discovery for the binary
//! - **[`env`]**: path constants and defaults
//!
//! ## Rolling back a failed provisioning workflow
//!
//! ```rust,no_run
//! use dockhand::container::{ContainerClient, WriterSink, provision};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(ContainerClient::new().await?);
//!
//!     provision(client, WriterSink::stdio(), |cleanup| async move {
//!         // create resources with your own tooling, then report them
//!         cleanup.register_volume("dev-data");
//!         cleanup.register_container("dev-web");
//!         Ok(())
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod container;
pub mod env;

pub use container::{
    CleanupCoordinator, Console, ContainerClient, ContainerError, HostConsole, RuntimeClient,
    TerminalBridge, run_interactive,
};
