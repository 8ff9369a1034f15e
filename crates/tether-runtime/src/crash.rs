//! Fatal-fault handling: the self-unload sequence.
//!
//! On the first fatal report the classifier logs the message with a filtered stack
//! snapshot, tells the user, and asks the host to unload and then disable the plugin.
//! The sequence runs at most once per bridge; later fatal reports are no-ops.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::host::{HostLogger, Notification, NotificationKind, Notifier, PluginManager};
use crate::stack::StackSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadOutcome {
    /// This call ran the self-unload sequence
    Unloaded,
    /// A previous fatal report already started it
    AlreadyUnloading,
}

pub struct CrashClassifier {
    plugin_name: String,
    unloading: AtomicBool,
    logger: Arc<dyn HostLogger>,
    notifier: Arc<dyn Notifier>,
    plugins: Arc<dyn PluginManager>,
    notification_duration: Duration,
}

impl fmt::Debug for CrashClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrashClassifier")
            .field("plugin_name", &self.plugin_name)
            .field("unloading", &self.is_unloading())
            .finish()
    }
}

impl CrashClassifier {
    pub fn new(
        plugin_name: impl Into<String>,
        logger: Arc<dyn HostLogger>,
        notifier: Arc<dyn Notifier>,
        plugins: Arc<dyn PluginManager>,
        notification_duration: Duration,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            unloading: AtomicBool::new(false),
            logger,
            notifier,
            plugins,
            notification_duration,
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn is_unloading(&self) -> bool {
        self.unloading.load(Ordering::Acquire)
    }

    /// Text of the user notification shown after a fatal fault
    pub fn failure_message(&self) -> String {
        format!(
            "{} has encountered an error and has been unloaded",
            self.plugin_name
        )
    }

    /// Handle a fatal report from the native core.
    ///
    /// `frames_to_skip` leading frames (counted from this function) are left out of the
    /// stack snapshot. Errors mean the host's plugin-management surface could not
    /// carry out the unload.
    pub fn on_fatal(&self, message: &str, frames_to_skip: usize) -> Result<UnloadOutcome> {
        if self
            .unloading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(plugin = %self.plugin_name, fault = message, "Fatal report during unload ignored");
            return Ok(UnloadOutcome::AlreadyUnloading);
        }

        let snapshot = StackSnapshot::capture(frames_to_skip);
        error!(
            plugin = %self.plugin_name,
            fault = message,
            frames = snapshot.frames().len(),
            "Native core reported a fatal error"
        );
        self.logger.error(&format!("\n\t{}\n{}", message, snapshot));

        self.notifier.notify(Notification {
            message: self.failure_message(),
            kind: NotificationKind::Error,
            duration: self.notification_duration,
        });

        self.unload_self()?;
        info!(plugin = %self.plugin_name, "Plugin unloaded and disabled after fatal error");
        Ok(UnloadOutcome::Unloaded)
    }

    fn unload_self(&self) -> Result<()> {
        let plugin = self
            .plugins
            .find_plugin(&self.plugin_name)
            .with_context(|| format!("Plugin '{}' not registered with host", self.plugin_name))?;

        // Disable even if unload failed: a faulted plugin must not come back on its own
        let unloaded = self
            .plugins
            .unload(&plugin, false)
            .with_context(|| format!("Failed to unload plugin '{}'", self.plugin_name));
        let disabled = self
            .plugins
            .disable(&plugin)
            .with_context(|| format!("Failed to disable plugin '{}'", self.plugin_name));

        unloaded.and(disabled)
    }
}
