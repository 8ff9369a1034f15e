use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use anyhow::{anyhow, bail, Result};
use tether_runtime::{
    Bridge, BridgeConfig, HostEnvironment, HostLogger, HostServices, NativeCore, NativeLibrary,
    Notifier, PluginManager, PluginRef,
};
use tracing::{info, warn};

/// Opens the native core at a path
pub type CoreFactory = Box<dyn Fn(&Path) -> Result<Box<dyn NativeCore>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
    NotLoaded,
    Loaded,
    Unloaded,
    Disabled,
}

struct HostState {
    status: PluginStatus,
    active: Option<Bridge>,
    /// Bridges unloaded while their library may still be executing. Kept mapped
    /// until shutdown.
    retired: Vec<Bridge>,
}

/// In-process plugin manager hosting a single plugin's bridge.
///
/// The state lock is never held while a bridge is built: native `initialize` may
/// report a fatal error, which calls back into `unload`/`disable`.
pub struct LocalHost {
    config: BridgeConfig,
    environment: HostEnvironment,
    logger: Arc<dyn HostLogger>,
    notifier: Arc<dyn Notifier>,
    open_core: CoreFactory,
    state: Mutex<HostState>,
    this: Weak<LocalHost>,
}

impl LocalHost {
    pub fn new(
        config: BridgeConfig,
        environment: HostEnvironment,
        logger: Arc<dyn HostLogger>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Self::with_core_factory(
            config,
            environment,
            logger,
            notifier,
            Box::new(|path: &Path| -> Result<Box<dyn NativeCore>> {
                Ok(Box::new(NativeLibrary::load(path)?))
            }),
        )
    }

    pub fn with_core_factory(
        config: BridgeConfig,
        environment: HostEnvironment,
        logger: Arc<dyn HostLogger>,
        notifier: Arc<dyn Notifier>,
        open_core: CoreFactory,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            config,
            environment,
            logger,
            notifier,
            open_core,
            state: Mutex::new(HostState {
                status: PluginStatus::NotLoaded,
                active: None,
                retired: Vec::new(),
            }),
            this: this.clone(),
        })
    }

    pub fn plugin_name(&self) -> &str {
        &self.config.plugin_name
    }

    pub fn status(&self) -> PluginStatus {
        self.lock().status
    }

    /// Load the native core and bring the plugin up
    pub fn start(&self) -> Result<()> {
        if self.status() == PluginStatus::Disabled {
            bail!("Plugin '{}' is disabled", self.config.plugin_name);
        }
        let bridge = self.build_bridge()?;
        self.activate(bridge)
    }

    /// Dispose every bridge and release the native libraries
    pub fn shutdown(&self) {
        let (active, retired) = {
            let mut state = self.lock();
            (state.active.take(), std::mem::take(&mut state.retired))
        };
        drop(active);
        drop(retired);
        info!(plugin = %self.config.plugin_name, "Host shut down");
    }

    fn build_bridge(&self) -> Result<Bridge> {
        let path = self.config.core_path(&self.environment.plugin_dir);
        let core = (self.open_core)(&path)?;
        Bridge::new(self.config.clone(), core, self.services()?)
    }

    fn activate(&self, mut bridge: Bridge) -> Result<()> {
        let mut state = self.lock();
        if state.status == PluginStatus::Disabled || bridge.is_unloading() {
            // Faulted during initialize; the crash sequence already ran
            bridge.dispose();
            state.retired.push(bridge);
            bail!(
                "Plugin '{}' faulted during initialization",
                self.config.plugin_name
            );
        }
        state.active = Some(bridge);
        state.status = PluginStatus::Loaded;
        info!(plugin = %self.config.plugin_name, "Plugin loaded");
        Ok(())
    }

    fn services(&self) -> Result<HostServices> {
        let plugins: Arc<dyn PluginManager> = self
            .this
            .upgrade()
            .ok_or_else(|| anyhow!("Host is shutting down"))?;
        Ok(HostServices {
            plugins,
            logger: self.logger.clone(),
            notifier: self.notifier.clone(),
            environment: self.environment.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn retired_count(&self) -> usize {
        self.lock().retired.len()
    }
}

impl PluginManager for LocalHost {
    fn find_plugin(&self, name: &str) -> Result<PluginRef> {
        if name != self.config.plugin_name {
            bail!("No installed plugin named '{}'", name);
        }
        Ok(PluginRef::new(name))
    }

    fn unload(&self, plugin: &PluginRef, forced: bool) -> Result<()> {
        let mut state = self.lock();
        // Retire rather than drop: the caller may be a native thread still running
        // code from this bridge's library
        if let Some(mut bridge) = state.active.take() {
            bridge.dispose();
            state.retired.push(bridge);
        }
        if state.status != PluginStatus::Disabled {
            state.status = PluginStatus::Unloaded;
        }
        info!(plugin = %plugin.name(), forced, "Plugin unloaded");
        Ok(())
    }

    fn disable(&self, plugin: &PluginRef) -> Result<()> {
        self.lock().status = PluginStatus::Disabled;
        warn!(plugin = %plugin.name(), "Plugin disabled");
        Ok(())
    }

    fn reload(&self, plugin: &PluginRef) -> Result<()> {
        let previous = {
            let mut state = self.lock();
            if state.status == PluginStatus::Disabled {
                bail!("Plugin '{}' is disabled and will not reload", plugin.name());
            }
            state.status = PluginStatus::Unloaded;
            state.active.take()
        };
        // Old library is released before the rebuilt file is opened
        drop(previous);

        info!(plugin = %plugin.name(), "Reloading plugin");
        let bridge = self.build_bridge()?;
        self.activate(bridge)
    }
}
