//! CLI-specific functionality for dockhand
//!
//! This module contains argument parsing and configuration discovery.

pub mod args;
pub mod config;

pub use args::{Args, Commands, render_command};
pub use config::{ConfigDiscovery, ConfigSource, DockhandConfig};
