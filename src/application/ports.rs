// Ports for the navigable location and user notifications
use std::time::Duration;

/// Reads and writes the `edit` flag of the current location so a reload
/// comes back in the same mode.
pub trait LocationService: Send + Sync {
    fn edit_flag(&self) -> bool;

    fn set_edit_flag(&self, editing: bool);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// `None` keeps the notification until the user dismisses it.
    pub duration: Option<Duration>,
}

impl Notification {
    pub fn sticky(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            duration: None,
        }
    }

    pub fn timed(title: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            duration: Some(duration),
        }
    }
}

/// Fire-and-forget error notifications.
pub trait Notifier: Send + Sync {
    fn error(&self, notification: Notification);
}
