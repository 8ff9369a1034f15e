//! Hot reload of the native core (development mode only).
//!
//! Watches the plugin directory for writes to the native core's file. The first
//! change disarms the watcher, waits a short delay so the writer can finish flushing,
//! then asks the host to reload the plugin. The watcher never re-arms itself; the
//! reloaded plugin constructs a fresh one.
//!
//! Known limitation: reloading a native library while the host keeps running is racy,
//! since threads of the old core may still be executing its code. The single-shot,
//! delayed trigger narrows the window but does not close it.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::host::PluginManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WatcherState {
    /// Not observing (development mode off, setup failed, or disposed)
    Disabled = 0,
    /// Observing the native core for changes
    Armed = 1,
    /// A change was seen; reload is pending or done
    Triggered = 2,
}

impl WatcherState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WatcherState::Armed,
            2 => WatcherState::Triggered,
            _ => WatcherState::Disabled,
        }
    }
}

struct WatcherShared {
    plugin_name: String,
    file_name: OsString,
    reload_delay: Duration,
    state: AtomicU8,
    plugins: Arc<dyn PluginManager>,
    runtime: Handle,
    shutdown_rx: watch::Receiver<bool>,
}

impl WatcherShared {
    fn state(&self) -> WatcherState {
        WatcherState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// A write to the core file, or a new file landing under its name.
    /// Renames away, metadata and access events do not count.
    fn is_relevant(&self, event: &Event) -> bool {
        let targets: &[PathBuf] = match event.kind {
            EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => &event.paths,
            // Paths are [from, to]; only the destination is the new core
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                event.paths.get(1..).unwrap_or_default()
            }
            _ => return false,
        };
        targets
            .iter()
            .any(|p| p.file_name() == Some(self.file_name.as_os_str()))
    }

    /// Armed -> Triggered; true only for the caller that won the transition
    fn trigger(&self) -> bool {
        self.state
            .compare_exchange(
                WatcherState::Armed as u8,
                WatcherState::Triggered as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    fn handle_event(self: &Arc<Self>, res: notify::Result<Event>) {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                warn!(plugin = %self.plugin_name, error = %e, "File watcher error");
                return;
            }
        };

        if !self.is_relevant(&event) {
            return;
        }
        if !self.trigger() {
            debug!(plugin = %self.plugin_name, "Native core change ignored, reload already pending");
            return;
        }

        info!(
            plugin = %self.plugin_name,
            delay_ms = self.reload_delay.as_millis() as u64,
            "Native core changed, scheduling reload"
        );
        let shared = self.clone();
        self.runtime.spawn(async move { shared.delayed_reload().await });
    }

    async fn delayed_reload(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.reload_delay) => {}
            _ = shutdown_rx.changed() => {
                debug!(plugin = %self.plugin_name, "Reload cancelled, bridge disposed");
                return;
            }
        }
        if self.is_shutdown() {
            debug!(plugin = %self.plugin_name, "Reload cancelled, bridge disposed");
            return;
        }

        let shared = self.clone();
        let result = tokio::task::spawn_blocking(move || shared.reload_now()).await;

        match result {
            Ok(Ok(true)) => info!(plugin = %self.plugin_name, "Plugin reloaded"),
            Ok(Ok(false)) => debug!(plugin = %self.plugin_name, "Reload cancelled, bridge disposed"),
            Ok(Err(e)) => warn!(plugin = %self.plugin_name, error = %e, "Failed to reload plugin"),
            Err(e) => warn!(plugin = %self.plugin_name, error = %e, "Reload task failed"),
        }
    }

    /// Ask the host to reload, unless the watcher was disposed while this task
    /// waited for a blocking thread. Returns whether a reload was requested.
    fn reload_now(&self) -> Result<bool> {
        if self.is_shutdown() {
            return Ok(false);
        }
        let plugin = self.plugins.find_plugin(&self.plugin_name)?;
        self.plugins.reload(&plugin)?;
        Ok(true)
    }
}

/// Single-shot watcher over the native core file
pub struct HotReloadWatcher {
    shared: Arc<WatcherShared>,
    shutdown_tx: watch::Sender<bool>,
    fs_watcher: Option<RecommendedWatcher>,
}

impl fmt::Debug for HotReloadWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotReloadWatcher")
            .field("plugin", &self.shared.plugin_name)
            .field("file", &self.shared.file_name)
            .field("state", &self.state())
            .finish()
    }
}

impl HotReloadWatcher {
    /// Start observing `core_path` (non-recursively, in its parent directory).
    ///
    /// Needs a tokio runtime: the delayed reload runs as a task on it.
    pub fn arm(
        plugin_name: impl Into<String>,
        core_path: &Path,
        reload_delay: Duration,
        plugins: Arc<dyn PluginManager>,
    ) -> Result<Self> {
        let mut watcher = Self::unobserved(plugin_name, core_path, reload_delay, plugins)?;
        let dir = core_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let shared = watcher.shared.clone();
        let mut inner = notify::recommended_watcher(move |res: notify::Result<Event>| {
            shared.handle_event(res);
        })
        .context("Failed to create file watcher")?;
        inner
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch plugin directory {}", dir.display()))?;

        info!(
            plugin = %watcher.shared.plugin_name,
            dir = %dir.display(),
            file = ?watcher.shared.file_name,
            "Watching native core for changes"
        );
        watcher.fs_watcher = Some(inner);
        Ok(watcher)
    }

    /// Armed watcher that only sees events passed to `handle_event`
    fn unobserved(
        plugin_name: impl Into<String>,
        core_path: &Path,
        reload_delay: Duration,
        plugins: Arc<dyn PluginManager>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().context("Hot reload requires a tokio runtime")?;
        let file_name = core_path
            .file_name()
            .with_context(|| format!("Native core path has no file name: {}", core_path.display()))?
            .to_os_string();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            shared: Arc::new(WatcherShared {
                plugin_name: plugin_name.into(),
                file_name,
                reload_delay,
                state: AtomicU8::new(WatcherState::Armed as u8),
                plugins,
                runtime,
                shutdown_rx,
            }),
            shutdown_tx,
            fs_watcher: None,
        })
    }

    pub fn state(&self) -> WatcherState {
        self.shared.state()
    }

    /// Feed one filesystem notification through the watcher
    pub fn handle_event(&self, res: notify::Result<Event>) {
        self.shared.handle_event(res);
    }

    /// Stop observing and cancel a pending reload. Idempotent.
    pub fn dispose(&mut self) {
        let _ = self.shutdown_tx.send(true);
        // Armed -> Disabled; a Triggered watcher keeps its state for inspection
        let _ = self.shared.state.compare_exchange(
            WatcherState::Armed as u8,
            WatcherState::Disabled as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if self.fs_watcher.take().is_some() {
            debug!(plugin = %self.shared.plugin_name, "Stopped watching native core");
        }
    }
}

impl Drop for HotReloadWatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}
