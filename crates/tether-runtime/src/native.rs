//! Native core loading via libloading.
//!
//! **Constraint:** the library must export `initialize` with the [`InitializeFn`] ABI.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use libloading::Library;

use crate::ffi::{InitializeFn, LogCallback, INITIALIZE_SYMBOL};

/// A loaded native core the bridge can initialize
pub trait NativeCore: Send + Sync {
    /// Hand the log callback to the core. Called exactly once per bridge.
    fn initialize(&self, log: LogCallback) -> Result<()>;

    /// Human-readable identity for logs
    fn describe(&self) -> String;
}

/// Native core loaded from a shared library (.so/.dylib/.dll).
///
/// Drop order matters: `initialize` points into `_library` and must not outlive it.
pub struct NativeLibrary {
    path: PathBuf,
    initialize: InitializeFn,
    _library: Library,
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .finish()
    }
}

impl NativeLibrary {
    /// Load a native core and resolve its `initialize` export
    pub fn load(path: &Path) -> Result<Self> {
        // SAFETY: loading runs the library's static constructors; the native core
        // is trusted code shipped alongside the plugin.
        let library = unsafe { Library::new(path) }
            .with_context(|| format!("Failed to load native core: {}", path.display()))?;

        // SAFETY: the symbol type matches the exported initializer ABI
        let initialize = unsafe { library.get::<InitializeFn>(INITIALIZE_SYMBOL) }
            .map(|symbol| *symbol)
            .with_context(|| format!("Symbol initialize not found in {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            initialize,
            _library: library,
        })
    }
}

impl NativeCore for NativeLibrary {
    fn initialize(&self, log: LogCallback) -> Result<()> {
        // SAFETY: `initialize` was resolved from `_library`, which is still loaded
        catch_unwind(AssertUnwindSafe(|| unsafe { (self.initialize)(log) }))
            .map_err(|_| anyhow!("Native core panicked during initialize: {}", self.path.display()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
