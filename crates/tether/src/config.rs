use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tether_runtime::{BridgeConfig, LogFormat};

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_PATH: &str = "tether.toml";

#[derive(Debug, Deserialize, Serialize)]
pub struct TetherConfig {
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HostConfig {
    #[serde(default)]
    pub dev_mode: bool,

    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_plugin_dir() -> String {
    ".".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            plugin_dir: default_plugin_dir(),
        }
    }
}

impl HostConfig {
    /// Plugin directory with `~` expanded
    pub fn plugin_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.plugin_dir).as_ref())
    }
}

/// Load config from `path`, or from `tether.toml` in the working directory
pub fn load_config(path: Option<&Path>) -> Result<TetherConfig> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    let content = fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read config file: {:?} (run `tether init` to create one)",
            path
        )
    })?;

    toml::from_str(&content).context("Failed to parse TOML config")
}
