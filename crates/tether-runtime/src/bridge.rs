use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::channel::LogChannel;
use crate::config::BridgeConfig;
use crate::crash::CrashClassifier;
use crate::ffi::{self, ChannelSlotGuard};
use crate::host::HostServices;
use crate::native::{NativeCore, NativeLibrary};
use crate::watcher::{HotReloadWatcher, WatcherState};

/// A plugin's bridge to its native core.
///
/// Drop order matters: the watcher and the callback slot are released before the
/// native core, so no callback can reach a channel whose library is gone.
pub struct Bridge {
    watcher: Option<HotReloadWatcher>,
    slot: Option<ChannelSlotGuard>,
    channel: Arc<LogChannel>,
    classifier: Arc<CrashClassifier>,
    config: BridgeConfig,
    core: Box<dyn NativeCore>,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("plugin", &self.config.plugin_name)
            .field("core", &self.core.describe())
            .field("unloading", &self.is_unloading())
            .field("watcher", &self.watcher_state())
            .finish()
    }
}

impl Bridge {
    /// Load the native core from the plugin directory, then construct the bridge.
    pub fn load(config: BridgeConfig, services: HostServices) -> Result<Self> {
        let path = config.core_path(&services.environment.plugin_dir);
        let core = NativeLibrary::load(&path)
            .with_context(|| format!("Plugin '{}' cannot start", config.plugin_name))?;
        Self::new(config, Box::new(core), services)
    }

    /// Install the log channel, initialize the native core once, and arm the hot
    /// reload watcher when the host runs in development mode.
    pub fn new(
        config: BridgeConfig,
        core: Box<dyn NativeCore>,
        services: HostServices,
    ) -> Result<Self> {
        let classifier = Arc::new(CrashClassifier::new(
            config.plugin_name.clone(),
            services.logger.clone(),
            services.notifier.clone(),
            services.plugins.clone(),
            config.notification_duration(),
        ));
        let channel = Arc::new(LogChannel::new(
            services.logger.clone(),
            classifier.clone(),
            config.fatal_frame_skip,
        ));

        let slot = ffi::install_channel(channel.clone());
        core.initialize(ffi::log_trampoline).with_context(|| {
            format!(
                "Failed to initialize native core {} for '{}'",
                core.describe(),
                config.plugin_name
            )
        })?;
        info!(plugin = %config.plugin_name, core = %core.describe(), "Native core initialized");

        let watcher = if services.environment.dev_mode {
            let core_path = config.core_path(&services.environment.plugin_dir);
            match HotReloadWatcher::arm(
                config.plugin_name.clone(),
                &core_path,
                config.reload_delay(),
                services.plugins.clone(),
            ) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    warn!(plugin = %config.plugin_name, error = %e, "Hot reload unavailable");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            watcher,
            slot: Some(slot),
            channel,
            classifier,
            config,
            core,
        })
    }

    pub fn plugin_name(&self) -> &str {
        &self.config.plugin_name
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The channel native callbacks are routed to
    pub fn channel(&self) -> &Arc<LogChannel> {
        &self.channel
    }

    pub fn is_unloading(&self) -> bool {
        self.classifier.is_unloading()
    }

    pub fn watcher(&self) -> Option<&HotReloadWatcher> {
        self.watcher.as_ref()
    }

    pub fn watcher_state(&self) -> WatcherState {
        self.watcher
            .as_ref()
            .map(HotReloadWatcher::state)
            .unwrap_or(WatcherState::Disabled)
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.is_none()
    }

    /// Cancel pending reloads, stop watching and detach the callback slot.
    /// The native core stays loaded until the bridge is dropped. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(watcher) = self.watcher.as_mut() {
            watcher.dispose();
        }
        if self.slot.take().is_some() {
            info!(plugin = %self.config.plugin_name, "Bridge disposed");
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.dispose();
    }
}
