//! Environment constants and path utilities for dockhand.
//!
//! This module centralizes the hardcoded paths and names used throughout the
//! application, making them easier to maintain and modify.

use std::path::{Path, PathBuf};

/// Hidden configuration directory name (like .git, .vscode)
pub const DOCKHAND_DIR_NAME: &str = ".dockhand";

/// Configuration file name inside the configuration directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name at the root of a project directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "dockhand.toml";

/// System-wide configuration directory (Unix-like systems)
pub const SYSTEM_CONFIG_DIR: &str = "/etc/dockhand";

/// Log filter used when neither RUST_LOG nor the configuration sets one
pub const DEFAULT_LOG_FILTER: &str = "dockhand=info";

/// Log filter used with `--verbose`
pub const VERBOSE_LOG_FILTER: &str = "dockhand=debug";

/// Defaults for runtime interaction
pub mod defaults {
    /// Name prefix used when none is configured
    pub const PREFIX: &str = "dev";

    /// Command started by `shell` when none is given
    pub const SHELL: &str = "/bin/sh";

    /// Runtime request timeout in seconds
    pub const TIMEOUT_SECS: u64 = 120;
}

/// Test-related constants
pub mod test {
    /// Prefix for resources created by integration tests
    pub const TEST_PREFIX: &str = "dockhand-test";

    /// Small image used by integration tests
    pub const TEST_IMAGE: &str = "alpine:3.20";
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(DOCKHAND_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build project config file path (`./dockhand.toml`)
pub fn project_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(LOCAL_CONFIG_FILE_NAME)
}

/// Build local config file path (`./.dockhand/config.toml`)
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(DOCKHAND_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Build system config file path
pub fn system_config_file_path() -> PathBuf {
    Path::new(SYSTEM_CONFIG_DIR).join(CONFIG_FILE_NAME)
}
