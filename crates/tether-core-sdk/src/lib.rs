//! Tether core SDK
//!
//! The native half of the bridge contract. A core crate (built as a `cdylib`) declares
//! its entry point with [`declare_core!`] and reports through [`log`], [`info`] and
//! [`fatal`]. A panic anywhere in the core is reported as a fatal error.

use std::panic::{self, catch_unwind, AssertUnwindSafe};
use std::sync::{Once, RwLock};

pub use anyhow::Result;
pub use tether_runtime::{FfiStr, LogCallback, FATAL_SEVERITY};

/// Severity for routine messages
pub const INFO_SEVERITY: u8 = 0;

static CALLBACK: RwLock<Option<LogCallback>> = RwLock::new(None);
static PANIC_HOOK: Once = Once::new();

/// Send one message to the host. Dropped if the core was never initialized.
pub fn log(severity: u8, message: &str) {
    let callback = *CALLBACK.read().unwrap_or_else(|e| e.into_inner());
    if let Some(callback) = callback {
        callback(severity, FfiStr::new(message));
    }
}

pub fn info(message: &str) {
    log(INFO_SEVERITY, message);
}

/// Report an unrecoverable error. The host unloads the plugin in response.
pub fn fatal(message: &str) {
    log(FATAL_SEVERITY, message);
}

#[macro_export]
macro_rules! core_info {
    ($($arg:tt)*) => {
        $crate::info(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! core_fatal {
    ($($arg:tt)*) => {
        $crate::fatal(&format!($($arg)*))
    };
}

/// Store the host callback and hook panics into the fatal path
pub fn install(callback: LogCallback) {
    *CALLBACK.write().unwrap_or_else(|e| e.into_inner()) = Some(callback);

    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let payload = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "Box<dyn Any>".to_string());
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "unknown location".to_string());
            fatal(&format!("native panic: {} at {}", payload, location));
            previous(info);
        }));
    });
}

/// Run an exported entry point body, keeping unwinds from crossing `extern "C"`.
///
/// The panic hook has already reported the panic by the time this returns.
pub fn guarded<T: Default>(f: impl FnOnce() -> T) -> T {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_default()
}

/// Body of the exported `initialize`. Use [`declare_core!`] rather than calling this.
#[doc(hidden)]
pub fn run_initialize(callback: LogCallback, init: impl FnOnce() -> Result<()>) {
    install(callback);
    guarded(|| {
        if let Err(e) = init() {
            fatal(&format!("initialization failed: {:#}", e));
        }
    });
}

/// Export the `initialize` entry point the bridge resolves.
///
/// ```ignore
/// use tether_core_sdk::*;
///
/// fn start() -> Result<()> {
///     core_info!("core ready");
///     Ok(())
/// }
///
/// declare_core!(start);
/// ```
#[macro_export]
macro_rules! declare_core {
    ($init:path) => {
        #[no_mangle]
        pub extern "C" fn initialize(log: $crate::LogCallback) {
            $crate::run_initialize(log, $init);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    static RECEIVED: Mutex<Vec<(u8, String)>> = Mutex::new(Vec::new());
    static SERIAL: Mutex<()> = Mutex::new(());

    extern "C" fn record(severity: u8, message: FfiStr) {
        let text = unsafe { message.to_str_lossy() }.into_owned();
        RECEIVED.lock().unwrap().push((severity, text));
    }

    fn fresh() -> MutexGuard<'static, ()> {
        let guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        *CALLBACK.write().unwrap() = None;
        RECEIVED.lock().unwrap().clear();
        guard
    }

    fn received() -> Vec<(u8, String)> {
        RECEIVED.lock().unwrap().clone()
    }

    #[test]
    fn test_messages_before_install_are_dropped() {
        let _serial = fresh();
        info("too early");
        assert!(received().is_empty());
    }

    #[test]
    fn test_log_macros_reach_callback() {
        let _serial = fresh();
        install(record);

        core_info!("loaded {} mods", 3);
        log(42, "custom");
        core_fatal!("index {} out of range", 7);

        assert_eq!(
            received(),
            vec![
                (INFO_SEVERITY, "loaded 3 mods".to_string()),
                (42, "custom".to_string()),
                (FATAL_SEVERITY, "index 7 out of range".to_string()),
            ]
        );
    }

    #[test]
    fn test_panic_reports_fatal_and_guarded_returns_default() {
        let _serial = fresh();
        install(record);

        let value: u32 = guarded(|| panic!("boom"));

        assert_eq!(value, 0);
        let got = received();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0, FATAL_SEVERITY);
        assert!(got[0].1.starts_with("native panic: boom at "));
        assert!(got[0].1.contains("lib.rs:"));
    }

    #[test]
    fn test_initialize_reports_init_error() {
        let _serial = fresh();
        run_initialize(record, || anyhow::bail!("missing config"));

        assert_eq!(
            received(),
            vec![(FATAL_SEVERITY, "initialization failed: missing config".to_string())]
        );
    }

    #[test]
    fn test_declared_entry_point_runs_init() {
        fn start() -> Result<()> {
            core_info!("core ready");
            Ok(())
        }
        declare_core!(start);

        let _serial = fresh();
        initialize(record);
        assert_eq!(received(), vec![(INFO_SEVERITY, "core ready".to_string())]);
    }
}
