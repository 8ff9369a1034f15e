use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use crate::channel::LogChannel;
use crate::crash::CrashClassifier;
use crate::ffi::LogCallback;
use crate::host::{HostLogger, Notification, Notifier, PluginManager, PluginRef};
use crate::native::NativeCore;

static SLOT_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that go through the process-wide callback slot
pub(crate) fn slot_lock() -> MutexGuard<'static, ()> {
    SLOT_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HostCall {
    Log(String),
    Error(String),
    Notify(Notification),
    Find(String),
    Unload(String, bool),
    Disable(String),
    Reload(String),
}

/// Host double recording logger, notifier and plugin-manager calls in one ordered log
pub(crate) struct RecordingHost {
    plugin_name: String,
    calls: Mutex<Vec<HostCall>>,
    fail_lookup: AtomicBool,
    fail_unload: AtomicBool,
}

impl RecordingHost {
    pub(crate) fn new(plugin_name: &str) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            calls: Mutex::new(Vec::new()),
            fail_lookup: AtomicBool::new(false),
            fail_unload: AtomicBool::new(false),
        }
    }

    pub(crate) fn fail_lookup(&self) {
        self.fail_lookup.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_unload(&self) {
        self.fail_unload.store(true, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub(crate) fn unload_requested(&self) -> bool {
        self.count(|c| matches!(c, HostCall::Unload(..))) > 0
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl HostLogger for RecordingHost {
    fn log(&self, line: &str) {
        self.record(HostCall::Log(line.to_string()));
    }

    fn error(&self, line: &str) {
        self.record(HostCall::Error(line.to_string()));
    }
}

impl Notifier for RecordingHost {
    fn notify(&self, notification: Notification) {
        self.record(HostCall::Notify(notification));
    }
}

impl PluginManager for RecordingHost {
    fn find_plugin(&self, name: &str) -> Result<PluginRef> {
        self.record(HostCall::Find(name.to_string()));
        if self.fail_lookup.load(Ordering::SeqCst) || name != self.plugin_name {
            bail!("no installed plugin named '{}'", name);
        }
        Ok(PluginRef::new(name))
    }

    fn unload(&self, plugin: &PluginRef, forced: bool) -> Result<()> {
        self.record(HostCall::Unload(plugin.name().to_string(), forced));
        if self.fail_unload.load(Ordering::SeqCst) {
            return Err(anyhow!("unload hung"));
        }
        Ok(())
    }

    fn disable(&self, plugin: &PluginRef) -> Result<()> {
        self.record(HostCall::Disable(plugin.name().to_string()));
        Ok(())
    }

    fn reload(&self, plugin: &PluginRef) -> Result<()> {
        self.record(HostCall::Reload(plugin.name().to_string()));
        Ok(())
    }
}

/// Channel wired to a fresh recording host
pub(crate) fn recording_channel(plugin_name: &str) -> (Arc<LogChannel>, Arc<RecordingHost>) {
    let host = Arc::new(RecordingHost::new(plugin_name));
    let classifier = Arc::new(CrashClassifier::new(
        plugin_name,
        host.clone(),
        host.clone(),
        host.clone(),
        Duration::from_secs(5),
    ));
    let channel = Arc::new(LogChannel::new(host.clone(), classifier, 2));
    (channel, host)
}

/// Native core double that records the callback it was initialized with
#[derive(Clone, Default)]
pub(crate) struct FakeCore {
    callbacks: Arc<Mutex<Vec<LogCallback>>>,
    fail: bool,
}

impl FakeCore {
    pub(crate) fn failing() -> Self {
        Self {
            callbacks: Arc::default(),
            fail: true,
        }
    }

    pub(crate) fn callbacks(&self) -> Vec<LogCallback> {
        self.callbacks.lock().unwrap().clone()
    }
}

impl NativeCore for FakeCore {
    fn initialize(&self, log: LogCallback) -> Result<()> {
        if self.fail {
            bail!("initialize refused");
        }
        self.callbacks.lock().unwrap().push(log);
        Ok(())
    }

    fn describe(&self) -> String {
        "fake core".to_string()
    }
}
