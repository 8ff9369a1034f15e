pub mod bridge;
pub mod channel;
pub mod config;
pub mod crash;
pub mod ffi;
pub mod host;
pub mod native;
pub mod stack;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

pub use bridge::Bridge;
pub use channel::{LogChannel, Severity};
pub use config::{BridgeConfig, LogFormat};
pub use crash::{CrashClassifier, UnloadOutcome};
pub use ffi::{FfiStr, LogCallback, FATAL_SEVERITY};
pub use host::{
    HostEnvironment, HostLogger, HostServices, Notification, NotificationKind, Notifier,
    PluginManager, PluginRef, TracingLogger,
};
pub use native::{NativeCore, NativeLibrary};
pub use stack::{StackFrame, StackSnapshot};
pub use watcher::{HotReloadWatcher, WatcherState};

/// Initialize structured logging
pub fn init_logging(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => fmt().pretty().with_env_filter(filter).init(),
    }
}
