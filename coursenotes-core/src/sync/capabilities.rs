use std::fmt;
use std::sync::Arc;

use crate::models::EntityId;

/// Kind of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeKind::Success => write!(f, "success"),
            NoticeKind::Error => write!(f, "error"),
        }
    }
}

/// The signed-in user as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: EntityId,
    pub username: String,
}

/// Source of the current identity.
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<CurrentUser>;

    /// Ends the session after the account is deleted.
    fn logout(&self);
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str);
}

/// Leaves the current view after a destructive flat delete.
pub trait Navigator: Send + Sync {
    fn navigate_home(&self);
}

/// Everything the controller needs from its host.
#[derive(Clone)]
pub struct Capabilities {
    pub auth: Arc<dyn AuthProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
}

impl Capabilities {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            auth,
            notifier,
            navigator,
        }
    }
}
