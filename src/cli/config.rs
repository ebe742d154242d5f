//! Configuration file format and lookup.
//!
//! The first existing file wins:
//! 1. Current directory: ./dockhand.toml or ./.dockhand/config.toml
//! 2. User config: ~/.dockhand/config.toml
//! 3. System config: /etc/dockhand/config.toml
//! 4. Built-in defaults

use crate::container::ContainerClientConfig;
use crate::env;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Complete dockhand configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockhandConfig {
    pub runtime: RuntimeSection,
    pub exec: ExecSection,
    pub discovery: DiscoverySection,
    pub logging: LoggingSection,
}

/// How to reach the container runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Socket tried before the local defaults
    pub socket: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            socket: None,
            timeout_secs: env::defaults::TIMEOUT_SECS,
        }
    }
}

/// Defaults for `exec` and `shell`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecSection {
    pub privileged: bool,
    /// Command started by `shell` when none is given
    pub shell: Vec<String>,
    pub user: Option<String>,
    pub working_dir: Option<String>,
}

impl Default for ExecSection {
    fn default() -> Self {
        Self {
            privileged: true,
            shell: vec![env::defaults::SHELL.to_string()],
            user: None,
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    /// Name prefix used when a command is not given one
    pub prefix: String,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            prefix: env::defaults::PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing_subscriber::EnvFilter` directive, overridden by RUST_LOG
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: env::DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl DockhandConfig {
    /// Client settings derived from the runtime section.
    pub fn client_config(&self) -> ContainerClientConfig {
        ContainerClientConfig {
            socket: self.runtime.socket.clone(),
            timeout: self.runtime.timeout_secs,
        }
    }

    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let config: DockhandConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {:?}", path))?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Given with `--config`
    Explicit(PathBuf),
    /// First existing file in the discovery hierarchy
    Discovered(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Explicit(path) => write!(f, "{} (--config)", path.display()),
            ConfigSource::Discovered(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Locates and loads the configuration file.
///
/// Loading runs before logging is set up, so it reports through the returned
/// [`ConfigSource`] instead of log events.
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load `explicit` if given, otherwise discover using the hierarchy.
    pub fn load(explicit: Option<&Path>) -> Result<(DockhandConfig, ConfigSource)> {
        match explicit {
            Some(path) => Ok((
                DockhandConfig::from_toml_file(path)?,
                ConfigSource::Explicit(path.to_path_buf()),
            )),
            None => Self::discover_config(),
        }
    }

    /// Load the first configuration file found, or the defaults.
    pub fn discover_config() -> Result<(DockhandConfig, ConfigSource)> {
        match Self::find_config_file() {
            Some(path) => Ok((
                DockhandConfig::from_toml_file(&path)?,
                ConfigSource::Discovered(path),
            )),
            None => Ok((DockhandConfig::default(), ConfigSource::Defaults)),
        }
    }

    pub fn find_config_file() -> Option<PathBuf> {
        Self::first_existing(Self::get_config_candidates())
    }

    fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
        candidates.into_iter().find(|candidate| candidate.is_file())
    }

    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(env::project_config_file_path(&current_dir));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(env::system_config_file_path());

        candidates
    }

    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Write `~/.dockhand/config.toml` with defaults unless it exists.
    pub fn create_default_user_config() -> Result<PathBuf> {
        let home_dir = Self::get_home_dir().context("Could not determine home directory")?;
        Self::create_default_config_in(&home_dir)
    }

    fn create_default_config_in(home_dir: &Path) -> Result<PathBuf> {
        let config_dir = env::user_config_dir_path(home_dir);
        let config_path = env::user_config_file_path(home_dir);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if !config_path.exists() {
            DockhandConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        } else {
            warn!("Configuration file already exists: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Print every candidate with its state, then the file actually in use.
    pub fn show_discovery_info(explicit: Option<&Path>) {
        println!("Configuration files, highest priority first:");
        for (rank, candidate) in Self::get_config_candidates().iter().enumerate() {
            println!(
                "  {}. {} [{}]",
                rank + 1,
                candidate.display(),
                candidate_state(candidate)
            );
        }

        let active = match explicit {
            Some(path) => ConfigSource::Explicit(path.to_path_buf()),
            None => Self::find_config_file()
                .map(ConfigSource::Discovered)
                .unwrap_or(ConfigSource::Defaults),
        };
        println!();
        println!("In use: {}", active);
    }
}

fn candidate_state(path: &Path) -> &'static str {
    if path.is_file() {
        "found"
    } else if path.exists() {
        "not a file"
    } else {
        "missing"
    }
}
