use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Output format for `init_logging`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Bridge settings for one plugin and its native core
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Name the host registered the plugin under
    pub plugin_name: String,

    /// Native core filename inside the plugin directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_library: Option<String>,

    #[serde(default = "default_reload_delay_ms")]
    pub reload_delay_ms: u64,

    #[serde(default = "default_notification_secs")]
    pub notification_secs: u64,

    /// Leading frames dropped from the crash snapshot (channel + classifier frames)
    #[serde(default = "default_fatal_frame_skip")]
    pub fatal_frame_skip: usize,
}

fn default_reload_delay_ms() -> u64 {
    100
}

fn default_notification_secs() -> u64 {
    5
}

fn default_fatal_frame_skip() -> usize {
    2
}

impl BridgeConfig {
    pub fn new(plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            core_library: None,
            reload_delay_ms: default_reload_delay_ms(),
            notification_secs: default_notification_secs(),
            fatal_frame_skip: default_fatal_frame_skip(),
        }
    }

    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bridge config: {:?}", path))?;
        Self::from_toml_str(&content).with_context(|| format!("Failed to parse {:?}", path))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML bridge config")
    }

    /// Filename of the native core, defaulting to the platform name of `<plugin>_core`
    pub fn core_library_name(&self) -> String {
        match &self.core_library {
            Some(name) => name.clone(),
            None => {
                let stem = format!("{}_core", self.plugin_name.to_lowercase().replace('-', "_"));
                libloading::library_filename(stem)
                    .to_string_lossy()
                    .into_owned()
            }
        }
    }

    /// Where the native core lives inside `plugin_dir`
    pub fn core_path(&self, plugin_dir: &Path) -> PathBuf {
        plugin_dir.join(self.core_library_name())
    }

    pub fn reload_delay(&self) -> Duration {
        Duration::from_millis(self.reload_delay_ms)
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_secs(self.notification_secs)
    }
}
