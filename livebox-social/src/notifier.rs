//! Desktop notifications.
//!
//! Best-effort: a notifier never blocks and its failures are only logged.

use thiserror::Error;

/// Permission state of the desktop notification API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationPermission {
    /// The user allowed notifications.
    Granted,
    /// The user refused notifications.
    Denied,
    /// The user was not asked yet.
    #[default]
    Default,
}

/// Error reported by a notifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("desktop notification failed: {0}")]
pub struct NotifierError(pub String);

/// Shows desktop notifications.
pub trait DesktopNotifier: Send + Sync {
    /// Current permission.
    fn permission(&self) -> NotificationPermission;

    /// Shows a notification. Must return without waiting for the user.
    fn show(&self, title: &str, body: &str) -> Result<(), NotifierError>;
}

/// Notifier that shows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl DesktopNotifier for NoopNotifier {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Denied
    }

    fn show(&self, _title: &str, _body: &str) -> Result<(), NotifierError> {
        Ok(())
    }
}
