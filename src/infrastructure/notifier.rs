// Notifier adapter - user notifications rendered as log events
use crate::application::ports::{Notification, Notifier};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, notification: Notification) {
        match notification.duration {
            None => tracing::error!(
                title = %notification.title,
                sticky = true,
                "{}",
                notification.message
            ),
            Some(duration) => tracing::warn!(
                title = %notification.title,
                duration_ms = duration.as_millis() as u64,
                "{}",
                notification.message
            ),
        }
    }
}
