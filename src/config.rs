//! User configuration for the script runner.
//!
//! Settings live in an optional `config.toml` inside the per-user config
//! directory, next to the history and favorites files. Every key is optional;
//! CLI flags take precedence over whatever the file provides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::launcher::PackageManager;

/// Environment variable that relocates the per-user config directory.
pub const CONFIG_DIR_ENV: &str = "SCRIPTRUNNER_CONFIG_DIR";
/// File name of the optional configuration file.
pub const CONFIG_FILE: &str = "config.toml";

/// Top-level structure of `config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Lines of output kept in memory per background process.
    pub max_log_lines: Option<usize>,
    /// Maximum number of entries kept in the run history.
    pub history_limit: Option<usize>,
    /// How many recent runs of the current directory count as "recent".
    pub recent_limit: Option<usize>,
    /// Lines shown by the background log view.
    pub log_view_lines: Option<usize>,
    /// Package manager to use instead of lockfile detection.
    pub package_manager: Option<PackageManager>,
    /// Whether to use Unicode markers in menus (default: true).
    pub symbols: Option<bool>,
}

/// Resolves the per-user config directory.
///
/// `SCRIPTRUNNER_CONFIG_DIR` wins; otherwise `~/.config/scriptrunner`. Falls
/// back to a relative `.scriptrunner` directory when no home is known.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".config").join("scriptrunner"),
        None => PathBuf::from(".scriptrunner"),
    }
}

/// Loads and parses the configuration from a file path.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Loads the config file from the default location if it exists.
pub fn load_default_config(dir: &Path) -> Result<Config> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() {
        load_config(&path)
    } else {
        Ok(Config::default())
    }
}
