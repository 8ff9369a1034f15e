use tether_runtime::{Notification, NotificationKind, Notifier};
use tracing::{error, info, warn};

/// Prints notifications to stderr, standing in for a host's toast surface
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        eprintln!("[{}] {}", label(notification.kind), notification.message);

        let duration_ms = notification.duration.as_millis() as u64;
        match notification.kind {
            NotificationKind::Error => {
                error!(duration_ms, "Notification: {}", notification.message)
            }
            NotificationKind::Warning => {
                warn!(duration_ms, "Notification: {}", notification.message)
            }
            NotificationKind::Info | NotificationKind::Success => {
                info!(duration_ms, "Notification: {}", notification.message)
            }
        }
    }
}

fn label(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Info => "info",
        NotificationKind::Success => "success",
        NotificationKind::Warning => "warning",
        NotificationKind::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(label(NotificationKind::Error), "error");
        assert_eq!(label(NotificationKind::Success), "success");
    }
}
