//! Command line argument parsing
//!
//! Subcommands:
//! - `ps`: List containers by name prefix
//! - `volumes`: List volumes by name prefix
//! - `find`: Resolve the container of a service under a prefix
//! - `exec`: Run a one-shot command inside a container
//! - `shell`: Run a command interactively, bridging the terminal
//! - `purge`: Force-remove every container and volume under a prefix
//! - `pull`: Pull an image with progress output
//! - `show-config` / `init-config`: Configuration discovery helpers

use clap::{Parser, Subcommand};
use std::borrow::Cow;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dockhand")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Operator tooling for container runtimes: discovery, exec bridging and cleanup"
)]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Configuration file path (skips discovery)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List containers whose name starts with the prefix
    Ps {
        /// Name prefix (defaults to the configured prefix)
        #[arg(short = 'p', long = "prefix")]
        prefix: Option<String>,
        /// Print JSON instead of a table
        #[arg(long = "json")]
        json: bool,
    },
    /// List volumes whose name starts with the prefix
    Volumes {
        /// Name prefix (defaults to the configured prefix)
        #[arg(short = 'p', long = "prefix")]
        prefix: Option<String>,
        /// Print JSON instead of a table
        #[arg(long = "json")]
        json: bool,
    },
    /// Print the id of the `<prefix>-<service>` container
    Find {
        /// Service name
        service: String,
        /// Name prefix (defaults to the configured prefix)
        #[arg(short = 'p', long = "prefix")]
        prefix: Option<String>,
    },
    /// Run a command inside a container and report success
    Exec {
        /// Container name or id
        container: String,
        /// Command and arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        cmd: Vec<String>,
    },
    /// Run a command interactively inside a container
    Shell {
        /// Container name or id
        container: String,
        /// Do not request privileged execution
        #[arg(long = "unprivileged")]
        unprivileged: bool,
        /// Command and arguments (defaults to the configured shell)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        cmd: Vec<String>,
    },
    /// Force-remove containers, then volumes, whose name starts with the prefix
    Purge {
        /// Name prefix (defaults to the configured prefix)
        #[arg(short = 'p', long = "prefix")]
        prefix: Option<String>,
        /// Actually remove; without this only the plan is printed
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
    /// Pull an image, rendering progress
    Pull {
        /// Image reference, e.g. alpine:3.20
        image: String,
    },
    /// Show configuration discovery information
    ShowConfig,
    /// Write a default configuration to ~/.dockhand/config.toml
    InitConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }
}

/// Render a command line for logs, quoting arguments the shell would split.
pub fn render_command(cmd: &[String]) -> String {
    cmd.iter()
        .map(|arg| shell_escape::escape(Cow::from(arg.as_str())).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
