//! ABI shared with the native core.
//!
//! The native core exports `initialize(log: LogCallback)` and keeps the callback for
//! its whole lifetime. The pointer handed over is [`log_trampoline`], a `'static`
//! exported function: it is never moved or freed, so the pointer stays valid even
//! after the bridge that installed it is gone.
//!
//! The trampoline finds the live [`LogChannel`] through a process-wide slot. A bridge
//! installs its channel at construction and clears it on dispose; callbacks that
//! arrive while the slot is empty are dropped.
//!
//! # Safety contract
//!
//! - `message` points at `len` bytes owned by the native side, valid only for the
//!   duration of the call. The bridge copies them and never retains the pointer.
//! - The native side must not call the callback after its library has been unloaded.

use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::{error, warn};

use crate::channel::LogChannel;

/// Severity the native core uses for an unrecoverable fault
pub const FATAL_SEVERITY: u8 = 255;

/// Symbol name of the native initializer
pub const INITIALIZE_SYMBOL: &[u8] = b"initialize\0";

/// Borrowed UTF-8 text passed across the boundary
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiStr {
    ptr: *const u8,
    len: usize,
}

impl FfiStr {
    /// Borrow `s` for the duration of one call
    pub fn new(s: &str) -> Self {
        Self {
            ptr: s.as_ptr(),
            len: s.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.ptr.is_null() || self.len == 0
    }

    /// Read the text, replacing invalid UTF-8. A null pointer reads as "".
    ///
    /// # Safety
    /// `ptr` must be null or point at `len` readable bytes that outlive `'a`.
    pub unsafe fn to_str_lossy<'a>(&self) -> Cow<'a, str> {
        if self.is_empty() {
            return Cow::Borrowed("");
        }
        let bytes = std::slice::from_raw_parts(self.ptr, self.len);
        String::from_utf8_lossy(bytes)
    }
}

/// Callback signature the native core invokes
pub type LogCallback = extern "C" fn(severity: u8, message: FfiStr);

/// Signature of the exported native initializer
pub type InitializeFn = unsafe extern "C" fn(log: LogCallback);

static ACTIVE_CHANNEL: RwLock<Option<Arc<LogChannel>>> = RwLock::new(None);

/// Keeps a channel installed in the callback slot until dropped
#[derive(Debug)]
pub(crate) struct ChannelSlotGuard {
    channel: Arc<LogChannel>,
}

/// Make `channel` the target of [`log_trampoline`]
pub(crate) fn install_channel(channel: Arc<LogChannel>) -> ChannelSlotGuard {
    let mut slot = ACTIVE_CHANNEL.write().unwrap_or_else(|e| e.into_inner());
    if let Some(previous) = slot.as_ref() {
        warn!(
            previous = %previous.plugin_name(),
            next = %channel.plugin_name(),
            "Replacing installed log channel"
        );
    }
    *slot = Some(channel.clone());
    ChannelSlotGuard { channel }
}

impl Drop for ChannelSlotGuard {
    fn drop(&mut self) {
        let mut slot = ACTIVE_CHANNEL.write().unwrap_or_else(|e| e.into_inner());
        if slot
            .as_ref()
            .is_some_and(|installed| Arc::ptr_eq(installed, &self.channel))
        {
            *slot = None;
        }
    }
}

fn active_channel() -> Option<Arc<LogChannel>> {
    // Clone out so the lock is not held while the channel runs: the crash
    // sequence may dispose the bridge, which clears this slot.
    ACTIVE_CHANNEL
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// The callback handed to the native core's `initialize`
pub extern "C" fn log_trampoline(severity: u8, message: FfiStr) {
    let result = catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: the native side guarantees `message` is valid for this call
        let text = unsafe { message.to_str_lossy() };
        match active_channel() {
            Some(channel) => channel.report(severity, &text),
            None => warn!(severity, text = %text, "Native log arrived with no bridge installed"),
        }
    }));

    if result.is_err() {
        error!(severity, "Panic while handling native log callback");
    }
}
