//! Host collaborators the bridge depends on.
//!
//! The host owns plugin management, logging and user notifications. The bridge only
//! sees them through these traits, so each concrete host binds whatever it exposes
//! (public API or name-based lookup of internals) behind one narrow seam.

use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Registration record of a plugin inside the host, found by name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginRef {
    name: String,
}

impl PluginRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Host plugin-management surface.
///
/// Implementations must tolerate calls from any thread, including native threads
/// that are still inside a log callback.
pub trait PluginManager: Send + Sync {
    /// Locate a plugin's registration by name
    fn find_plugin(&self, name: &str) -> Result<PluginRef>;

    /// Unload the plugin; `forced` skips graceful teardown
    fn unload(&self, plugin: &PluginRef, forced: bool) -> Result<()>;

    /// Keep the plugin from loading again until re-enabled
    fn disable(&self, plugin: &PluginRef) -> Result<()>;

    /// Unload and load again, re-running bridge construction
    fn reload(&self, plugin: &PluginRef) -> Result<()>;
}

/// Host logging facility
pub trait HostLogger: Send + Sync {
    fn log(&self, line: &str);

    fn error(&self, line: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Transient user-facing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub kind: NotificationKind,
    pub duration: Duration,
}

/// Host notification facility
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Facts the host provides at construction time
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    /// Host runs plugins in development mode (enables hot reload)
    pub dev_mode: bool,
    /// Directory the plugin was loaded from
    pub plugin_dir: PathBuf,
}

/// Everything a bridge needs from its host
#[derive(Clone)]
pub struct HostServices {
    pub plugins: Arc<dyn PluginManager>,
    pub logger: Arc<dyn HostLogger>,
    pub notifier: Arc<dyn Notifier>,
    pub environment: HostEnvironment,
}

impl fmt::Debug for HostServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostServices")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

/// `HostLogger` that forwards to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl HostLogger for TracingLogger {
    fn log(&self, line: &str) {
        tracing::info!(target: "tether::native", "{}", line);
    }

    fn error(&self, line: &str) {
        tracing::error!(target: "tether::native", "{}", line);
    }
}
