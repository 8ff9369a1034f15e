use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Result};
use notify::event::{DataChange, ModifyKind};
use notify::{Event, EventKind};
use tether_runtime::{
    HostEnvironment, HostLogger, HostServices, LogCallback, NativeCore, Notification, Notifier,
    PluginManager, PluginRef,
};

static SLOT_LOCK: Mutex<()> = Mutex::new(());

/// Bridges share one process-wide callback slot
pub fn serial() -> MutexGuard<'static, ()> {
    SLOT_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Log(String),
    Error(String),
    Notify(Notification),
    Find(String),
    Unload(String, bool),
    Disable(String),
    Reload(String),
}

pub struct MockHost {
    name: String,
    calls: Mutex<Vec<Call>>,
}

impl MockHost {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Log(line) | Call::Error(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn services(self: &Arc<Self>, dev_mode: bool, plugin_dir: PathBuf) -> HostServices {
        HostServices {
            plugins: self.clone(),
            logger: self.clone(),
            notifier: self.clone(),
            environment: HostEnvironment {
                dev_mode,
                plugin_dir,
            },
        }
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl HostLogger for MockHost {
    fn log(&self, line: &str) {
        self.push(Call::Log(line.to_string()));
    }

    fn error(&self, line: &str) {
        self.push(Call::Error(line.to_string()));
    }
}

impl Notifier for MockHost {
    fn notify(&self, notification: Notification) {
        self.push(Call::Notify(notification));
    }
}

impl PluginManager for MockHost {
    fn find_plugin(&self, name: &str) -> Result<PluginRef> {
        self.push(Call::Find(name.to_string()));
        if name != self.name {
            bail!("no installed plugin named '{}'", name);
        }
        Ok(PluginRef::new(name))
    }

    fn unload(&self, plugin: &PluginRef, forced: bool) -> Result<()> {
        self.push(Call::Unload(plugin.name().to_string(), forced));
        Ok(())
    }

    fn disable(&self, plugin: &PluginRef) -> Result<()> {
        self.push(Call::Disable(plugin.name().to_string()));
        Ok(())
    }

    fn reload(&self, plugin: &PluginRef) -> Result<()> {
        self.push(Call::Reload(plugin.name().to_string()));
        Ok(())
    }
}

/// Native core stand-in that keeps the callback it was given
#[derive(Clone, Default)]
pub struct MockCore {
    callback: Arc<Mutex<Option<LogCallback>>>,
}

impl MockCore {
    pub fn callback(&self) -> LogCallback {
        self.callback.lock().unwrap().expect("core not initialized")
    }
}

impl NativeCore for MockCore {
    fn initialize(&self, log: LogCallback) -> Result<()> {
        *self.callback.lock().unwrap() = Some(log);
        Ok(())
    }

    fn describe(&self) -> String {
        "mock core".to_string()
    }
}

/// Content write to `path`, as the OS watcher reports it
pub fn modified_event(path: impl Into<PathBuf>) -> Event {
    Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path.into())
}
