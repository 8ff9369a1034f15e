use std::fmt;
use std::sync::Arc;

use tracing::error;

use crate::crash::CrashClassifier;
use crate::ffi::FATAL_SEVERITY;
use crate::host::HostLogger;

/// Severity byte sent by the native core
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Severity(pub u8);

impl Severity {
    pub const FATAL: Severity = Severity(FATAL_SEVERITY);

    pub fn is_fatal(self) -> bool {
        self == Self::FATAL
    }
}

impl From<u8> for Severity {
    fn from(value: u8) -> Self {
        Severity(value)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fatal() {
            f.write_str("fatal")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Receives every native log callback and routes it.
///
/// Informational severities go to the host logger verbatim; the fatal sentinel goes to
/// the crash classifier. Safe to call concurrently from any thread; never fails back
/// into the native caller.
pub struct LogChannel {
    logger: Arc<dyn HostLogger>,
    classifier: Arc<CrashClassifier>,
    fatal_frame_skip: usize,
}

impl fmt::Debug for LogChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogChannel")
            .field("plugin", &self.classifier.plugin_name())
            .field("fatal_frame_skip", &self.fatal_frame_skip)
            .finish()
    }
}

impl LogChannel {
    pub fn new(
        logger: Arc<dyn HostLogger>,
        classifier: Arc<CrashClassifier>,
        fatal_frame_skip: usize,
    ) -> Self {
        Self {
            logger,
            classifier,
            fatal_frame_skip,
        }
    }

    pub fn plugin_name(&self) -> &str {
        self.classifier.plugin_name()
    }

    pub fn report(&self, severity: u8, message: &str) {
        if Severity(severity).is_fatal() {
            // Frames skipped: this call and `on_fatal` itself
            if let Err(e) = self.classifier.on_fatal(message, self.fatal_frame_skip) {
                error!(plugin = %self.plugin_name(), error = %e, "Self-unload failed");
                self.logger
                    .error(&format!("{} failed to unload itself: {:#}", self.plugin_name(), e));
            }
        } else {
            self.logger.log(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{recording_channel, HostCall};

    #[test]
    fn test_all_non_fatal_severities_pass_through() {
        let (channel, host) = recording_channel("Aetherment");
        for severity in 0..=254u8 {
            channel.report(severity, &format!("message {}", severity));
        }

        let calls = host.calls();
        assert_eq!(calls.len(), 255);
        for (severity, call) in calls.iter().enumerate() {
            assert_eq!(call, &HostCall::Log(format!("message {}", severity)));
        }
        assert!(!host.unload_requested());
    }

    #[test]
    fn test_fatal_triggers_unload() {
        let (channel, host) = recording_channel("Aetherment");
        channel.report(255, "native panic: index out of range");

        assert!(host.unload_requested());
        assert!(matches!(&host.calls()[0], HostCall::Error(text) if text.contains("index out of range")));
    }

    #[test]
    fn test_host_failure_is_reported_not_raised() {
        let (channel, host) = recording_channel("Aetherment");
        host.fail_lookup();

        channel.report(255, "native panic");

        let calls = host.calls();
        assert!(matches!(calls.last(), Some(HostCall::Error(text)) if text.contains("failed to unload")));
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity(3).to_string(), "3");
        assert_eq!(Severity::FATAL.to_string(), "fatal");
        assert!(Severity::from(255).is_fatal());
        assert!(!Severity(254).is_fatal());
    }
}
